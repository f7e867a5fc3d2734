//! # tessera-txn
//!
//! Transaction coordination across pluggable storage engines.
//!
//! This crate provides:
//!
//! - **Engine capabilities**: the [`TransactionalStorageEngine`] and
//!   [`XaResourceManager`] traits a storage engine implements, and the
//!   process-wide [`EngineRegistry`].
//!
//! - **Session state**: per-engine [`ResourceContext`]s for the statement
//!   and the normal transaction, savepoints and the XA branch state.
//!
//! - **Coordination**: one-phase commit for single-writer transactions,
//!   two-phase commit when several engines modified data, and rollback on
//!   any prepare veto.
//!
//! - **XA and recovery**: externally coordinated branches and the crash
//!   recovery sweep over prepared transactions.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                    TransactionServices                        │
//! │                            │                                  │
//! │      ┌─────────────────────┼──────────────────────┐           │
//! │      │                     │                      │           │
//! │      ▼                     ▼                      ▼           │
//! │ ┌───────────────┐   ┌──────────────┐    ┌────────────────┐   │
//! │ │EngineRegistry │   │   Session    │    │    XidCache    │   │
//! │ │ (slot order)  │   │ stmt │ normal│    │(tessera-cache) │   │
//! │ └───────────────┘   └──────────────┘    └────────────────┘   │
//! │         │                  │                                  │
//! │         ▼                  ▼                                  │
//! │ ┌──────────────────────────────────────┐                      │
//! │ │ Transactional engine / XA manager    │                      │
//! │ └──────────────────────────────────────┘                      │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use tessera_common::{config::KernelConfig, SessionId};
//! use tessera_txn::{Completion, EngineCapabilities, TransactionServices};
//!
//! let services = TransactionServices::new(KernelConfig::default());
//! let heap = services
//!     .engines()
//!     .add("heap", EngineCapabilities::xa(Arc::new(MyEngine::default())))?;
//!
//! let mut session = services.create_session(SessionId::new(1));
//! session.set_autocommit(false);
//!
//! services.start_statement(&mut session, &[heap.clone()], true)?;
//! services.mark_modified(&mut session, &heap)?;
//! services.autocommit_or_rollback(&mut session, true)?;
//!
//! services.end_transaction(&mut session, Completion::Commit)?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Per-engine participation state.
///
/// This module provides:
/// - [`context::ResourceContext`]: registration and modification tracking
/// - [`context::ContextState`]: the context state machine
pub mod context;

/// Session-facing coordination.
///
/// This module provides:
/// - [`coordinator::TransactionServices`]: commit, rollback, savepoints, XA
/// - [`coordinator::RecoveryReport`]: outcome of the recovery sweep
pub mod coordinator;

/// Storage engine capabilities.
///
/// This module provides:
/// - [`engine::TransactionalStorageEngine`]: transaction lifecycle
/// - [`engine::XaResourceManager`]: two-phase commit and recovery
/// - [`engine::EngineRegistry`]: registered engines
pub mod engine;

pub mod error;

/// Session transaction state.
///
/// This module provides:
/// - [`session::Session`]: statement and normal transactions of a connection
/// - [`session::KillSwitch`]: cross-thread interruption
pub mod session;

pub mod stats;
pub mod status;

#[cfg(test)]
mod testing;

// Re-export commonly used types

pub use context::{ContextState, ResourceContext};
pub use coordinator::{Completion, RecoveryReport, TransactionServices};
pub use engine::{
    EngineCapabilities, EngineHandle, EngineRegistry, StartOptions, TransactionalStorageEngine,
    XaResourceManager,
};
pub use error::{TransactionError, TxnResult};
pub use session::{KillSwitch, Savepoint, Session, TransactionList};
pub use stats::TransactionStats;
pub use status::EngineStatus;
