//! Storage engine capability traits.
//!
//! A storage engine plugs into the coordinator through two independent
//! capabilities:
//!
//! - [`TransactionalStorageEngine`]: statement and transaction lifecycle
//! - [`XaResourceManager`]: two-phase commit and recovery by XID
//!
//! An engine value may implement either or both. The coordinator only sees
//! the [`EngineHandle`] produced by [`EngineRegistry::add`], which carries
//! the capabilities the engine registered with.

mod registry;

pub use registry::EngineRegistry;

use std::fmt;
use std::sync::Arc;

use tessera_common::{EngineSlot, Xid};

use crate::session::Session;
use crate::status::EngineStatus;

/// Options for [`TransactionalStorageEngine::do_start_transaction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StartOptions {
    /// Take the read view at transaction start rather than at first read.
    pub with_consistent_snapshot: bool,
}

impl StartOptions {
    /// Options for `START TRANSACTION WITH CONSISTENT SNAPSHOT`.
    pub fn consistent_snapshot() -> Self {
        Self {
            with_consistent_snapshot: true,
        }
    }
}

/// Statement and transaction lifecycle of a transactional engine.
///
/// `normal_transaction` is true when the call ends the whole transaction
/// and false when it ends only the current statement.
///
/// Calls are made without any coordinator lock held; an engine manages its
/// own internal concurrency.
pub trait TransactionalStorageEngine: Send + Sync {
    /// Called once per transaction, the first time the session touches the
    /// engine.
    fn do_start_transaction(&self, session: &Session, options: StartOptions) -> EngineStatus;

    /// Called at the start of every statement that touches the engine.
    fn do_start_statement(&self, _session: &Session) {}

    /// Called when a statement that touched the engine ends, before its
    /// commit or rollback.
    fn do_end_statement(&self, _session: &Session) {}

    /// Commits the statement or the transaction.
    fn do_commit(&self, session: &Session, normal_transaction: bool) -> EngineStatus;

    /// Rolls back the statement or the transaction.
    fn do_rollback(&self, session: &Session, normal_transaction: bool) -> EngineStatus;

    /// Sets a savepoint.
    fn do_set_savepoint(&self, _session: &Session, _name: &str) -> EngineStatus {
        EngineStatus::Ok
    }

    /// Rolls back to a savepoint.
    fn do_rollback_to_savepoint(&self, _session: &Session, _name: &str) -> EngineStatus {
        EngineStatus::Ok
    }

    /// Releases a savepoint.
    fn do_release_savepoint(&self, _session: &Session, _name: &str) -> EngineStatus {
        EngineStatus::Ok
    }

    /// Releases latches that must not be held while the session waits on
    /// the network.
    fn do_release_temporary_latches(&self, _session: &Session) {}

    /// Called when the session disconnects.
    fn close_connection(&self, _session: &Session) {}
}

/// Two-phase commit capability.
pub trait XaResourceManager: Send + Sync {
    /// Votes on the outcome; anything but `Ok` vetoes the commit.
    fn do_xa_prepare(&self, session: &Session, normal_transaction: bool) -> EngineStatus;

    /// Commits a prepared transaction of a live session.
    fn do_xa_commit(&self, session: &Session, normal_transaction: bool) -> EngineStatus;

    /// Rolls back an active or prepared transaction of a live session.
    fn do_xa_rollback(&self, session: &Session, normal_transaction: bool) -> EngineStatus;

    /// Commits a prepared transaction whose session is gone.
    fn do_xa_commit_xid(&self, xid: &Xid) -> EngineStatus;

    /// Rolls back a prepared transaction whose session is gone.
    fn do_xa_rollback_xid(&self, xid: &Xid) -> EngineStatus;

    /// Returns up to `limit` prepared XIDs.
    fn do_xa_recover(&self, limit: usize) -> Vec<Xid>;
}

/// Capabilities an engine registers with.
#[derive(Clone, Default)]
pub struct EngineCapabilities {
    /// Transaction lifecycle, if the engine takes part in SQL transactions.
    pub transactional: Option<Arc<dyn TransactionalStorageEngine>>,
    /// Two-phase commit, if the engine is an XA resource manager.
    pub xa: Option<Arc<dyn XaResourceManager>>,
}

impl EngineCapabilities {
    /// A non-transactional engine.
    pub fn none() -> Self {
        Self::default()
    }

    /// A transactional engine without two-phase commit.
    pub fn transactional(engine: Arc<dyn TransactionalStorageEngine>) -> Self {
        Self {
            transactional: Some(engine),
            xa: None,
        }
    }

    /// An engine implementing both capabilities on one value.
    pub fn xa<E>(engine: Arc<E>) -> Self
    where
        E: TransactionalStorageEngine + XaResourceManager + 'static,
    {
        Self {
            transactional: Some(Arc::clone(&engine) as Arc<dyn TransactionalStorageEngine>),
            xa: Some(engine as Arc<dyn XaResourceManager>),
        }
    }
}

/// A registered engine.
#[derive(Clone)]
pub struct EngineHandle {
    name: String,
    slot: EngineSlot,
    capabilities: EngineCapabilities,
}

impl EngineHandle {
    pub(crate) fn new(name: String, slot: EngineSlot, capabilities: EngineCapabilities) -> Self {
        Self {
            name,
            slot,
            capabilities,
        }
    }

    /// Returns the engine name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the slot of the engine's resource contexts.
    pub fn slot(&self) -> EngineSlot {
        self.slot
    }

    /// Returns true if the engine takes part in SQL transactions.
    pub fn participates_in_sql_transaction(&self) -> bool {
        self.capabilities.transactional.is_some()
    }

    /// Returns true if the engine is an XA resource manager.
    pub fn participates_in_xa_transaction(&self) -> bool {
        self.capabilities.xa.is_some()
    }

    /// Returns true if the engine can take part in a prepare round.
    pub fn has_two_phase_commit(&self) -> bool {
        self.participates_in_sql_transaction() && self.participates_in_xa_transaction()
    }

    /// Returns the transactional capability.
    pub fn transactional(&self) -> Option<&Arc<dyn TransactionalStorageEngine>> {
        self.capabilities.transactional.as_ref()
    }

    /// Returns the XA capability.
    pub fn xa(&self) -> Option<&Arc<dyn XaResourceManager>> {
        self.capabilities.xa.as_ref()
    }
}

impl fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineHandle")
            .field("name", &self.name)
            .field("slot", &self.slot)
            .field("transactional", &self.participates_in_sql_transaction())
            .field("xa", &self.participates_in_xa_transaction())
            .finish()
    }
}

impl PartialEq for EngineHandle {
    fn eq(&self, other: &Self) -> bool {
        self.slot == other.slot && self.name == other.name
    }
}

impl Eq for EngineHandle {}
