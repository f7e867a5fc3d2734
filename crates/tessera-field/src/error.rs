//! Field codec error types.
//!
//! Out-of-range and truncated values are not errors: they are clamped and
//! reported through [`crate::Diagnostics`]. The variants here are the hard
//! failures that abort the statement.

use thiserror::Error;

use tessera_common::error::{ErrorCode, TesseraError};

/// Field codec error type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldError {
    /// Text is not a valid UUID.
    #[error("invalid UUID value '{value}' for column '{field}'")]
    InvalidUuid {
        /// Column name.
        field: String,
        /// The rejected text.
        value: String,
    },

    /// Value kind cannot be stored in the column type.
    #[error("cannot store {value_kind} value in column '{field}'")]
    TypeMismatch {
        /// Column name.
        field: String,
        /// Kind of the rejected value.
        value_kind: &'static str,
    },

    /// NULL stored into a NOT NULL column.
    #[error("column '{field}' cannot be null")]
    NullNotAllowed {
        /// Column name.
        field: String,
    },

    /// Input ended before a complete value was read.
    #[error("buffer too short: need {needed} bytes, have {available}")]
    BufferTooShort {
        /// Bytes required.
        needed: usize,
        /// Bytes available.
        available: usize,
    },

    /// A packed column cannot be decoded into the target column.
    #[error("column '{field}' is incompatible with source column: {reason}")]
    IncompatibleField {
        /// Target column name.
        field: String,
        /// Description of the mismatch.
        reason: String,
    },

    /// Column definition is invalid.
    #[error("invalid field definition: {message}")]
    InvalidDefinition {
        /// Error message.
        message: String,
    },

    /// Column index does not exist in the record layout.
    #[error("column index {index} out of bounds ({count} columns)")]
    ColumnOutOfBounds {
        /// Requested index.
        index: usize,
        /// Number of columns.
        count: usize,
    },

    /// A store warning escalated to an error by strict mode.
    #[error("{message} for column '{field}' at row {row}")]
    Strict {
        /// Column name.
        field: String,
        /// Code of the escalated warning.
        code: ErrorCode,
        /// Warning text.
        message: String,
        /// Row number within the statement.
        row: u64,
    },
}

impl FieldError {
    /// Returns the error code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidUuid { .. } => ErrorCode::InvalidUuid,
            Self::TypeMismatch { .. } => ErrorCode::WrongValue,
            Self::NullNotAllowed { .. } | Self::ColumnOutOfBounds { .. } => {
                ErrorCode::InvalidArgument
            }
            Self::BufferTooShort { .. } => ErrorCode::BufferTooShort,
            Self::IncompatibleField { .. } => ErrorCode::IncompatibleField,
            Self::InvalidDefinition { .. } => ErrorCode::InvalidFieldDefinition,
            Self::Strict { code, .. } => *code,
        }
    }

    pub(crate) fn invalid_definition(message: impl Into<String>) -> Self {
        Self::InvalidDefinition {
            message: message.into(),
        }
    }

    pub(crate) fn check_len(needed: usize, available: usize) -> FieldResult<()> {
        if available < needed {
            return Err(Self::BufferTooShort { needed, available });
        }
        Ok(())
    }
}

impl From<FieldError> for TesseraError {
    fn from(err: FieldError) -> Self {
        TesseraError::component(err.code(), err.to_string())
    }
}

/// Result type for field codec operations.
pub type FieldResult<T> = Result<T, FieldError>;
