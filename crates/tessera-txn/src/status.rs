//! Status codes returned by storage engine calls.

use std::fmt;

use tessera_common::ErrorCode;

/// Result of a storage engine call.
///
/// Variants are ordered by severity so that the outcome of a call fanned
/// out to several engines is the maximum of the individual statuses.
///
/// ```text
/// Ok < LockWaitTimeout < Deadlock < ReadOnly < OutOfResources < Io < Fatal
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum EngineStatus {
    /// The call succeeded.
    #[default]
    Ok,
    /// A lock wait inside the engine timed out.
    LockWaitTimeout,
    /// The engine chose this session as a deadlock victim.
    Deadlock,
    /// The engine refuses writes.
    ReadOnly,
    /// The engine ran out of memory, file handles or similar.
    OutOfResources,
    /// An I/O operation failed.
    Io,
    /// Unrecoverable engine failure.
    Fatal,
}

impl EngineStatus {
    /// Returns true for [`EngineStatus::Ok`].
    #[inline]
    pub fn is_ok(self) -> bool {
        self == EngineStatus::Ok
    }

    /// Returns the error code reported for a failed call, or `None` for
    /// success.
    pub fn code(self) -> Option<ErrorCode> {
        match self {
            EngineStatus::Ok => None,
            EngineStatus::LockWaitTimeout => Some(ErrorCode::LockWaitTimeout),
            EngineStatus::Deadlock => Some(ErrorCode::Deadlock),
            EngineStatus::ReadOnly => Some(ErrorCode::ReadOnly),
            EngineStatus::OutOfResources => Some(ErrorCode::OutOfResources),
            EngineStatus::Io => Some(ErrorCode::Io),
            EngineStatus::Fatal => Some(ErrorCode::EngineFatal),
        }
    }

    /// Returns the most severe of the given statuses, `Ok` if empty.
    pub fn worst(statuses: impl IntoIterator<Item = EngineStatus>) -> EngineStatus {
        statuses.into_iter().max().unwrap_or_default()
    }
}

impl fmt::Display for EngineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineStatus::Ok => write!(f, "ok"),
            EngineStatus::LockWaitTimeout => write!(f, "lock wait timeout"),
            EngineStatus::Deadlock => write!(f, "deadlock"),
            EngineStatus::ReadOnly => write!(f, "read only"),
            EngineStatus::OutOfResources => write!(f, "out of resources"),
            EngineStatus::Io => write!(f, "i/o error"),
            EngineStatus::Fatal => write!(f, "fatal"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worst_status_wins() {
        assert_eq!(EngineStatus::worst([]), EngineStatus::Ok);
        assert_eq!(
            EngineStatus::worst([
                EngineStatus::Ok,
                EngineStatus::Io,
                EngineStatus::Deadlock
            ]),
            EngineStatus::Io
        );
        assert!(EngineStatus::Fatal > EngineStatus::Io);
        assert!(EngineStatus::LockWaitTimeout > EngineStatus::Ok);
    }

    #[test]
    fn test_codes() {
        assert!(EngineStatus::Ok.is_ok());
        assert_eq!(EngineStatus::Ok.code(), None);
        assert_eq!(EngineStatus::Fatal.code(), Some(ErrorCode::EngineFatal));
        assert_eq!(EngineStatus::Deadlock.to_string(), "deadlock");
    }
}
