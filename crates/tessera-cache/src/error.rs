//! Registry errors.

use std::fmt;

use thiserror::Error;

use tessera_common::{ErrorCode, TesseraError};

/// Outcome of a failed [`crate::Registry::find`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LookupError {
    /// The key is not registered.
    DoesNotExist,
    /// The key is reserved by a placeholder; someone is building the value.
    NoLock,
}

impl LookupError {
    /// Returns the error code for this outcome.
    #[must_use]
    pub const fn code(self) -> ErrorCode {
        match self {
            Self::DoesNotExist => ErrorCode::DoesNotExist,
            Self::NoLock => ErrorCode::NoLock,
        }
    }
}

impl fmt::Display for LookupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DoesNotExist => f.write_str("does not exist"),
            Self::NoLock => f.write_str("registration in progress"),
        }
    }
}

impl std::error::Error for LookupError {}

/// Errors returned by the catalog and XID caches.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    /// The key is not registered.
    #[error("{kind} '{key}' does not exist")]
    DoesNotExist {
        /// Kind of entry ("catalog", "xid").
        kind: &'static str,
        /// The key.
        key: String,
    },

    /// Another session is registering the key.
    #[error("{kind} '{key}' is being registered by another session")]
    NoLock {
        /// Kind of entry.
        kind: &'static str,
        /// The key.
        key: String,
    },

    /// The key already holds a value.
    #[error("{kind} '{key}' already exists")]
    AlreadyExists {
        /// Kind of entry.
        kind: &'static str,
        /// The key.
        key: String,
    },

    /// Building the value failed; the reservation was dropped.
    #[error("failed to create {kind} '{key}': {message}")]
    CreateFailed {
        /// Kind of entry.
        kind: &'static str,
        /// The key.
        key: String,
        /// Reason reported by the builder.
        message: String,
    },
}

impl CacheError {
    /// Maps a lookup failure to an error for `key`.
    pub fn from_lookup(err: LookupError, kind: &'static str, key: impl fmt::Display) -> Self {
        let key = key.to_string();
        match err {
            LookupError::DoesNotExist => Self::DoesNotExist { kind, key },
            LookupError::NoLock => Self::NoLock { kind, key },
        }
    }

    /// Returns the error code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::DoesNotExist { .. } => ErrorCode::DoesNotExist,
            Self::NoLock { .. } => ErrorCode::NoLock,
            Self::AlreadyExists { .. } => ErrorCode::AlreadyExists,
            Self::CreateFailed { .. } => ErrorCode::Internal,
        }
    }

    /// Returns true if retrying later may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::NoLock { .. })
    }
}

impl From<CacheError> for TesseraError {
    fn from(err: CacheError) -> Self {
        TesseraError::component(err.code(), err.to_string())
    }
}

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;
