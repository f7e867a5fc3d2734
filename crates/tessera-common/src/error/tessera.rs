//! Tessera error types.
//!
//! Every tessera crate reports failures through its own error enum, but all
//! of them map onto the stable [`ErrorCode`] table defined here so callers
//! can handle errors programmatically without knowing which layer raised
//! them.

use std::fmt;
use thiserror::Error;

/// Error codes for categorizing errors.
///
/// These codes can be used for programmatic error handling and
/// are stable across versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum ErrorCode {
    // General errors (0x0000 - 0x00FF)
    /// Unknown or unspecified error.
    Unknown = 0x0000,
    /// Internal error (bug).
    Internal = 0x0001,
    /// Operation not supported.
    NotSupported = 0x0002,
    /// Invalid argument provided.
    InvalidArgument = 0x0003,
    /// Operation was cancelled.
    Cancelled = 0x0004,
    /// Invalid configuration.
    InvalidConfig = 0x0005,

    // I/O errors (0x0100 - 0x01FF)
    /// General I/O error.
    Io = 0x0100,
    /// Data corruption detected.
    Corruption = 0x0101,

    // Field errors (0x0200 - 0x02FF)
    /// Numeric value outside the column range.
    OutOfRange = 0x0200,
    /// Value was truncated on store.
    Truncated = 0x0201,
    /// Value could not be interpreted for the column type.
    WrongValue = 0x0202,
    /// Malformed UUID text.
    InvalidUuid = 0x0203,
    /// Input buffer ended before the value was complete.
    BufferTooShort = 0x0204,
    /// Source column metadata is incompatible with the target column.
    IncompatibleField = 0x0205,
    /// Field definition is invalid (precision, scale or length).
    InvalidFieldDefinition = 0x0206,

    // Transaction errors (0x0300 - 0x03FF)
    /// A storage engine failed to start a transaction or statement.
    EngineStartFailed = 0x0300,
    /// The transaction was rolled back.
    TransactionRolledBack = 0x0301,
    /// Deadlock detected by a storage engine.
    Deadlock = 0x0302,
    /// Lock wait timed out inside a storage engine.
    LockWaitTimeout = 0x0303,
    /// A storage engine refused a write.
    ReadOnly = 0x0304,
    /// A storage engine ran out of resources.
    OutOfResources = 0x0305,
    /// A storage engine reported an unrecoverable error.
    EngineFatal = 0x0306,
    /// Commit failed after a successful prepare; engines may disagree.
    CommitInconsistent = 0x0307,
    /// Savepoint does not exist.
    SavepointNotFound = 0x0308,
    /// Storage engine is not registered.
    EngineNotFound = 0x0309,
    /// No free engine slot.
    TooManyEngines = 0x030A,
    /// A storage engine with that name is already registered.
    DuplicateEngine = 0x030B,
    /// Session was killed.
    Killed = 0x030C,

    // XA errors (0x0400 - 0x04FF)
    /// XID is malformed.
    InvalidXid = 0x0400,
    /// A participant vetoed prepare; the branch was rolled back.
    XaRollback = 0x0401,
    /// Unknown XID.
    XaNotFound = 0x0402,
    /// Command is not valid in the current XA state.
    XaInvalidState = 0x0403,
    /// XID already exists.
    XaDuplicate = 0x0404,
    /// Prepared local transactions were found but no recovery decision
    /// was available.
    RecoveryRequired = 0x0405,

    // Cache errors (0x0500 - 0x05FF)
    /// Key is not present.
    DoesNotExist = 0x0500,
    /// Key is reserved by a registration in progress.
    NoLock = 0x0501,
    /// Key already holds a value.
    AlreadyExists = 0x0502,
}

impl ErrorCode {
    /// Returns the numeric code.
    #[inline]
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// Returns the error category name.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match (*self as u16) >> 8 {
            0x00 => "General",
            0x01 => "I/O",
            0x02 => "Field",
            0x03 => "Transaction",
            0x04 => "XA",
            0x05 => "Cache",
            _ => "Unknown",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// The main error type for tessera.
///
/// Component crates keep their own richer error enums and convert into
/// [`TesseraError::Component`] when crossing crate boundaries.
///
/// # Example
///
/// ```rust
/// use tessera_common::error::{ErrorCode, TesseraError, TesseraResult};
///
/// fn parse_server_id(raw: &str) -> TesseraResult<u32> {
///     raw.parse()
///         .map_err(|_| TesseraError::invalid_argument(format!("bad server id '{raw}'")))
/// }
///
/// let err = parse_server_id("x").unwrap_err();
/// assert_eq!(err.code(), ErrorCode::InvalidArgument);
/// ```
#[derive(Debug, Error)]
pub enum TesseraError {
    // ==========================================================================
    // General Errors
    // ==========================================================================
    /// Internal error - this indicates a bug.
    #[error("internal error: {message}")]
    Internal {
        /// Error message.
        message: String,
    },

    /// Operation not supported.
    #[error("operation not supported: {operation}")]
    NotSupported {
        /// The unsupported operation.
        operation: String,
    },

    /// Invalid argument provided.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Error message.
        message: String,
    },

    /// Operation was cancelled.
    #[error("operation was cancelled")]
    Cancelled,

    /// Invalid configuration.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Error message.
        message: String,
    },

    // ==========================================================================
    // I/O Errors
    // ==========================================================================
    /// I/O error from the underlying system.
    #[error("I/O error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Data corruption detected.
    #[error("data corruption detected: {message}")]
    Corruption {
        /// Description of the corruption.
        message: String,
    },

    // ==========================================================================
    // XA Errors
    // ==========================================================================
    /// XID is malformed.
    #[error("invalid XID: {reason}")]
    InvalidXid {
        /// Why the XID was rejected.
        reason: String,
    },

    // ==========================================================================
    // Component Errors
    // ==========================================================================
    /// Error raised by a component crate (field codec, cache, coordinator).
    #[error("{code}: {message}")]
    Component {
        /// Stable error code.
        code: ErrorCode,
        /// Rendered component error.
        message: String,
    },
}

impl TesseraError {
    /// Returns the error code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Internal { .. } => ErrorCode::Internal,
            Self::NotSupported { .. } => ErrorCode::NotSupported,
            Self::InvalidArgument { .. } => ErrorCode::InvalidArgument,
            Self::Cancelled => ErrorCode::Cancelled,
            Self::InvalidConfig { .. } => ErrorCode::InvalidConfig,
            Self::Io { .. } => ErrorCode::Io,
            Self::Corruption { .. } => ErrorCode::Corruption,
            Self::InvalidXid { .. } => ErrorCode::InvalidXid,
            Self::Component { code, .. } => *code,
        }
    }

    /// Returns true if retrying the whole transaction may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self.code(),
            ErrorCode::Deadlock
                | ErrorCode::LockWaitTimeout
                | ErrorCode::NoLock
                | ErrorCode::XaRollback
                | ErrorCode::TransactionRolledBack
        )
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Creates an invalid argument error.
    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates an invalid configuration error.
    #[must_use]
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Creates an invalid XID error.
    #[must_use]
    pub fn invalid_xid(reason: impl Into<String>) -> Self {
        Self::InvalidXid {
            reason: reason.into(),
        }
    }

    /// Wraps a component error under its stable code.
    #[must_use]
    pub fn component(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Component {
            code,
            message: message.into(),
        }
    }
}

impl From<toml::de::Error> for TesseraError {
    fn from(err: toml::de::Error) -> Self {
        Self::invalid_config(err.to_string())
    }
}

impl From<toml::ser::Error> for TesseraError {
    fn from(err: toml::ser::Error) -> Self {
        Self::invalid_config(err.to_string())
    }
}
