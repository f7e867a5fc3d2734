//! Transaction coordinator errors.

use thiserror::Error;

use tessera_cache::CacheError;
use tessera_common::{ErrorCode, TesseraError, XaState};

use crate::status::EngineStatus;

/// Errors returned by [`crate::TransactionServices`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransactionError {
    /// An engine call failed; the statement fails but the transaction can
    /// still be rolled back cleanly.
    #[error("engine '{engine}' failed to {operation}: {status}")]
    EngineFailed {
        /// Engine name.
        engine: String,
        /// What the coordinator asked the engine to do.
        operation: &'static str,
        /// Most severe status returned.
        status: EngineStatus,
    },

    /// The whole transaction was rolled back.
    #[error("transaction rolled back: {reason}")]
    RolledBack {
        /// Why the transaction was rolled back.
        reason: String,
    },

    /// Commit failed after every participant voted yes. Engines may now
    /// disagree until the recovery sweep runs.
    #[error("commit failed after prepare on engines {engines:?}; recovery required")]
    CommitInconsistent {
        /// Engines whose commit failed.
        engines: Vec<String>,
    },

    /// No savepoint with this name.
    #[error("savepoint '{name}' does not exist")]
    SavepointNotFound {
        /// The savepoint name.
        name: String,
    },

    /// No engine with this name or slot.
    #[error("storage engine '{name}' is not registered")]
    EngineNotFound {
        /// Engine name or slot.
        name: String,
    },

    /// Every engine slot is taken.
    #[error("cannot register more than {max} storage engines")]
    TooManyEngines {
        /// Configured slot count.
        max: usize,
    },

    /// An engine with this name is already registered.
    #[error("storage engine '{name}' is already registered")]
    DuplicateEngine {
        /// Engine name.
        name: String,
    },

    /// The session was killed before the transaction reached PREPARE.
    #[error("session killed")]
    Killed,

    /// A participant vetoed XA PREPARE; the branch was rolled back.
    #[error("XA branch {xid} rolled back: {reason}")]
    XaRollback {
        /// The branch.
        xid: String,
        /// Why it was rolled back.
        reason: String,
    },

    /// Unknown XID.
    #[error("unknown XID {xid}")]
    XaNotFound {
        /// The XID.
        xid: String,
    },

    /// The XA command is not allowed in the current branch state.
    #[error("XA {command} is not allowed in state {state}")]
    XaInvalidState {
        /// The command attempted.
        command: &'static str,
        /// Current branch state.
        state: XaState,
    },

    /// The XID is already in use.
    #[error("XID {xid} already exists")]
    XaDuplicate {
        /// The XID.
        xid: String,
    },

    /// Recovery found prepared local transactions but had neither a commit
    /// log nor a heuristic decision.
    #[error("found {count} prepared transactions; run recovery with a commit log or a heuristic decision")]
    RecoveryRequired {
        /// Number of prepared local transactions.
        count: usize,
    },

    /// Registry failure.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// Coordinator invariant violated.
    #[error("internal error: {0}")]
    Internal(String),
}

impl TransactionError {
    /// Returns the error code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            TransactionError::EngineFailed { status, .. } => {
                status.code().unwrap_or(ErrorCode::EngineStartFailed)
            }
            TransactionError::RolledBack { .. } => ErrorCode::TransactionRolledBack,
            TransactionError::CommitInconsistent { .. } => ErrorCode::CommitInconsistent,
            TransactionError::SavepointNotFound { .. } => ErrorCode::SavepointNotFound,
            TransactionError::EngineNotFound { .. } => ErrorCode::EngineNotFound,
            TransactionError::TooManyEngines { .. } => ErrorCode::TooManyEngines,
            TransactionError::DuplicateEngine { .. } => ErrorCode::DuplicateEngine,
            TransactionError::Killed => ErrorCode::Killed,
            TransactionError::XaRollback { .. } => ErrorCode::XaRollback,
            TransactionError::XaNotFound { .. } => ErrorCode::XaNotFound,
            TransactionError::XaInvalidState { .. } => ErrorCode::XaInvalidState,
            TransactionError::XaDuplicate { .. } => ErrorCode::XaDuplicate,
            TransactionError::RecoveryRequired { .. } => ErrorCode::RecoveryRequired,
            TransactionError::Cache(e) => e.code(),
            TransactionError::Internal(_) => ErrorCode::Internal,
        }
    }

    /// Returns true if the error ended the whole transaction rather than
    /// only the current statement.
    pub fn is_transaction_rollback(&self) -> bool {
        matches!(
            self,
            TransactionError::RolledBack { .. }
                | TransactionError::XaRollback { .. }
                | TransactionError::Killed
        )
    }

    pub(crate) fn engine(engine: &str, operation: &'static str, status: EngineStatus) -> Self {
        TransactionError::EngineFailed {
            engine: engine.to_string(),
            operation,
            status,
        }
    }
}

impl From<TransactionError> for TesseraError {
    fn from(err: TransactionError) -> Self {
        TesseraError::component(err.code(), err.to_string())
    }
}

/// Result type for transaction operations.
pub type TxnResult<T> = Result<T, TransactionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rollback_is_distinguishable() {
        let rollback = TransactionError::RolledBack {
            reason: "prepare vetoed".into(),
        };
        let statement = TransactionError::engine("heap", "start transaction", EngineStatus::Io);
        assert!(rollback.is_transaction_rollback());
        assert!(!statement.is_transaction_rollback());
        assert_ne!(rollback.code(), statement.code());
        assert_eq!(statement.code(), ErrorCode::Io);
    }

    #[test]
    fn test_display() {
        let err = TransactionError::XaInvalidState {
            command: "PREPARE",
            state: XaState::Active,
        };
        assert_eq!(err.to_string(), "XA PREPARE is not allowed in state ACTIVE");
        let err: TesseraError = TransactionError::Killed.into();
        assert_eq!(err.code(), ErrorCode::Killed);
    }
}
