//! Store outcomes and the per-session diagnostics area.

use std::fmt;

use tracing::debug;

use tessera_common::error::ErrorCode;

use crate::error::{FieldError, FieldResult};

/// Outcome of storing a value into a column.
///
/// Every variant except `Ok` stores *something*: the clamped, rounded or
/// truncated value. Only the variants whose level is
/// [`WarningLevel::Warning`] are escalated by strict mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreStatus {
    /// Value stored exactly.
    Ok,
    /// Fractional digits beyond the column scale were rounded away.
    Rounded,
    /// Only trailing spaces were cut from a string.
    TrailingSpaces,
    /// Significant data was cut (string overflow, trailing garbage).
    Truncated,
    /// Numeric value outside the column range; clamped to the nearest bound.
    OutOfRange,
    /// Text could not be interpreted as a number; zero was stored.
    WrongValue,
}

impl StoreStatus {
    /// Returns true if the value was stored exactly.
    #[inline]
    #[must_use]
    pub const fn is_ok(self) -> bool {
        matches!(self, Self::Ok)
    }

    /// Returns the severity of the condition, if any.
    #[must_use]
    pub const fn level(self) -> Option<WarningLevel> {
        match self {
            Self::Ok => None,
            Self::Rounded | Self::TrailingSpaces => Some(WarningLevel::Note),
            Self::Truncated | Self::OutOfRange | Self::WrongValue => Some(WarningLevel::Warning),
        }
    }

    /// Returns the error code reported for the condition.
    #[must_use]
    pub const fn code(self) -> Option<ErrorCode> {
        match self {
            Self::Ok => None,
            Self::Rounded | Self::TrailingSpaces | Self::Truncated => Some(ErrorCode::Truncated),
            Self::OutOfRange => Some(ErrorCode::OutOfRange),
            Self::WrongValue => Some(ErrorCode::WrongValue),
        }
    }

    /// Returns the more severe of two outcomes.
    #[must_use]
    pub fn max(self, other: Self) -> Self {
        if other.rank() > self.rank() {
            other
        } else {
            self
        }
    }

    const fn rank(self) -> u8 {
        match self {
            Self::Ok => 0,
            Self::Rounded => 1,
            Self::TrailingSpaces => 2,
            Self::Truncated => 3,
            Self::OutOfRange => 4,
            Self::WrongValue => 5,
        }
    }

    const fn message(self) -> &'static str {
        match self {
            Self::Ok => "",
            Self::Rounded | Self::TrailingSpaces | Self::Truncated => "Data truncated",
            Self::OutOfRange => "Out of range value",
            Self::WrongValue => "Incorrect value",
        }
    }
}

/// Severity of a diagnostics entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum WarningLevel {
    /// Informational.
    Note,
    /// Data was altered.
    Warning,
    /// The statement failed.
    Error,
}

impl fmt::Display for WarningLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Note => write!(f, "Note"),
            Self::Warning => write!(f, "Warning"),
            Self::Error => write!(f, "Error"),
        }
    }
}

/// A diagnostics entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    /// Severity.
    pub level: WarningLevel,
    /// Stable error code.
    pub code: ErrorCode,
    /// Column the condition was raised for.
    pub field: String,
    /// Human readable text.
    pub message: String,
    /// Row number within the statement (1-based).
    pub row: u64,
}

/// Per-session diagnostics area.
///
/// Collects the notes and warnings raised while storing values. In strict
/// mode a warning-level condition is recorded as an error and returned as
/// [`FieldError::Strict`] so the statement fails.
#[derive(Debug, Clone)]
pub struct Diagnostics {
    strict: bool,
    row: u64,
    entries: Vec<Warning>,
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::new(false)
    }
}

impl Diagnostics {
    /// Creates an empty diagnostics area.
    #[must_use]
    pub fn new(strict: bool) -> Self {
        Self {
            strict,
            row: 1,
            entries: Vec::new(),
        }
    }

    /// Returns true if warnings abort the statement.
    #[must_use]
    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Enables or disables strict mode.
    pub fn set_strict(&mut self, strict: bool) {
        self.strict = strict;
    }

    /// Returns the current row number.
    #[must_use]
    pub fn row(&self) -> u64 {
        self.row
    }

    /// Advances to the next row of the statement.
    pub fn next_row(&mut self) {
        self.row += 1;
    }

    /// Records the outcome of a store.
    ///
    /// # Errors
    ///
    /// Returns [`FieldError::Strict`] for a warning-level outcome when
    /// strict mode is on.
    pub fn report(&mut self, field: &str, status: StoreStatus) -> FieldResult<StoreStatus> {
        let (Some(level), Some(code)) = (status.level(), status.code()) else {
            return Ok(status);
        };

        if self.strict && level == WarningLevel::Warning {
            self.push(WarningLevel::Error, code, field, status.message());
            return Err(FieldError::Strict {
                field: field.to_string(),
                code,
                message: status.message().to_string(),
                row: self.row,
            });
        }

        self.push(level, code, field, status.message());
        Ok(status)
    }

    /// Appends an entry.
    pub fn push(&mut self, level: WarningLevel, code: ErrorCode, field: &str, message: &str) {
        debug!(field, %code, %level, row = self.row, "{}", message);
        self.entries.push(Warning {
            level,
            code,
            field: field.to_string(),
            message: message.to_string(),
            row: self.row,
        });
    }

    /// Returns all entries in the order they were raised.
    #[must_use]
    pub fn entries(&self) -> &[Warning] {
        &self.entries
    }

    /// Returns the number of warning and error entries.
    #[must_use]
    pub fn warning_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|w| w.level >= WarningLevel::Warning)
            .count()
    }

    /// Returns the number of notes.
    #[must_use]
    pub fn note_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|w| w.level == WarningLevel::Note)
            .count()
    }

    /// Returns true if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Clears the area at the start of a new statement.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.row = 1;
    }
}
