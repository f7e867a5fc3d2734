//! Session transaction state.
//!
//! Every session carries two transactions at once:
//!
//! - the *statement* transaction, covering the statement in progress
//! - the *normal* transaction, covering everything since `BEGIN` (empty in
//!   autocommit mode, where each statement is its own transaction)
//!
//! Each has its own participant list and its own [`ResourceContext`] per
//! engine slot. A session is owned by one thread; only its [`KillSwitch`]
//! is shared.

mod kill;
mod list;

pub use kill::KillSwitch;
pub use list::{Savepoint, TransactionList};

use std::cell::Cell;
use std::fmt;
use std::sync::Arc;

use tessera_common::{EngineSlot, QueryId, SessionId, XaState, Xid, XidState};
use tessera_field::Diagnostics;

use crate::context::ResourceContext;
use crate::engine::{EngineHandle, StartOptions};
use crate::error::{TransactionError, TxnResult};

const STATEMENT: usize = 0;
const NORMAL: usize = 1;

#[inline]
fn list_index(normal: bool) -> usize {
    if normal {
        NORMAL
    } else {
        STATEMENT
    }
}

/// Connection-level transaction state.
pub struct Session {
    id: SessionId,
    query_id: QueryId,
    autocommit: bool,
    explicit_transaction: bool,
    start_options: StartOptions,
    in_transaction: bool,
    kill: KillSwitch,
    diagnostics: Diagnostics,
    contexts: Vec<[ResourceContext; 2]>,
    lists: [TransactionList; 2],
    xid_state: XidState,
    savepoints: Vec<Savepoint>,
    rollback_requested: Cell<bool>,
}

impl Session {
    /// Creates a session with room for `max_engines` engine slots.
    pub fn new(id: SessionId, max_engines: usize, strict: bool) -> Self {
        Self {
            id,
            query_id: QueryId::INVALID,
            autocommit: true,
            explicit_transaction: false,
            start_options: StartOptions::default(),
            in_transaction: false,
            kill: KillSwitch::new(),
            diagnostics: Diagnostics::new(strict),
            contexts: vec![Default::default(); max_engines],
            lists: Default::default(),
            xid_state: XidState::default(),
            savepoints: Vec::new(),
            rollback_requested: Cell::new(false),
        }
    }

    /// Returns the session id.
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Returns the id of the statement in progress.
    pub fn query_id(&self) -> QueryId {
        self.query_id
    }

    pub(crate) fn set_query_id(&mut self, query_id: QueryId) {
        self.query_id = query_id;
    }

    /// Returns true in autocommit mode.
    pub fn autocommit(&self) -> bool {
        self.autocommit
    }

    /// Enables or disables autocommit.
    pub fn set_autocommit(&mut self, autocommit: bool) {
        self.autocommit = autocommit;
    }

    /// Returns true between `BEGIN` and the end of that transaction.
    pub fn is_explicit_transaction(&self) -> bool {
        self.explicit_transaction
    }

    /// Returns true if statements should also register in the normal
    /// transaction.
    pub fn uses_normal_transaction(&self) -> bool {
        !self.autocommit || self.explicit_transaction
    }

    pub(crate) fn begin_explicit(&mut self, options: StartOptions) {
        self.explicit_transaction = true;
        self.start_options = options;
    }

    /// Returns the options handed to engines started lazily inside the
    /// current transaction.
    pub fn start_options(&self) -> StartOptions {
        self.start_options
    }

    /// Returns the server status flag: true while a normal transaction
    /// holds registered engines.
    pub fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    /// Returns a handle that can kill this session from another thread.
    pub fn kill_switch(&self) -> KillSwitch {
        self.kill.clone()
    }

    /// Returns true once the session was killed.
    pub fn is_killed(&self) -> bool {
        self.kill.is_killed()
    }

    /// Returns the diagnostics area.
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Returns the diagnostics area for writing.
    pub fn diagnostics_mut(&mut self) -> &mut Diagnostics {
        &mut self.diagnostics
    }

    /// Returns the XID of the current transaction (null outside one).
    pub fn xid(&self) -> &Xid {
        &self.xid_state.xid
    }

    /// Returns the XA state of the session.
    pub fn xid_state(&self) -> &XidState {
        &self.xid_state
    }

    /// Returns the XA state.
    pub fn xa_state(&self) -> XaState {
        self.xid_state.xa_state
    }

    pub(crate) fn xid_state_mut(&mut self) -> &mut XidState {
        &mut self.xid_state
    }

    /// Asks the coordinator to roll back the normal transaction when the
    /// current statement ends. Engines call this after choosing the session
    /// as a deadlock victim.
    pub fn request_rollback(&self) {
        self.rollback_requested.set(true);
    }

    /// Returns true if a rollback was requested.
    pub fn is_rollback_requested(&self) -> bool {
        self.rollback_requested.get()
    }

    /// Returns the statement (`normal == false`) or normal transaction.
    pub fn transaction(&self, normal: bool) -> &TransactionList {
        &self.lists[list_index(normal)]
    }

    pub(crate) fn transaction_mut(&mut self, normal: bool) -> &mut TransactionList {
        &mut self.lists[list_index(normal)]
    }

    /// Returns the context of `slot` in the statement or normal
    /// transaction.
    pub fn context(&self, slot: EngineSlot, normal: bool) -> Option<&ResourceContext> {
        self.contexts.get(slot.index()).map(|c| &c[list_index(normal)])
    }

    pub(crate) fn context_mut(
        &mut self,
        slot: EngineSlot,
        normal: bool,
    ) -> TxnResult<&mut ResourceContext> {
        self.contexts
            .get_mut(slot.index())
            .map(|c| &mut c[list_index(normal)])
            .ok_or_else(|| {
                TransactionError::Internal(format!("engine slot {slot} has no resource context"))
            })
    }

    /// Returns true if `engine` is registered in the statement or normal
    /// transaction.
    pub fn is_registered(&self, engine: &EngineHandle, normal: bool) -> bool {
        self.context(engine.slot(), normal)
            .is_some_and(ResourceContext::is_started)
    }

    /// Returns the savepoints, oldest first.
    pub fn savepoints(&self) -> &[Savepoint] {
        &self.savepoints
    }

    pub(crate) fn savepoints_mut(&mut self) -> &mut Vec<Savepoint> {
        &mut self.savepoints
    }

    /// Registers `engine` in a transaction. Returns false if it already was.
    pub(crate) fn register(&mut self, engine: &Arc<EngineHandle>, normal: bool) -> TxnResult<bool> {
        let ctx = self.context_mut(engine.slot(), normal)?;
        if ctx.is_started() {
            return Ok(false);
        }
        ctx.register(Arc::clone(engine));
        self.transaction_mut(normal).push(Arc::clone(engine));
        if normal {
            self.in_transaction = true;
        }
        Ok(true)
    }

    /// Clears the per-transaction state after the normal transaction ends.
    pub(crate) fn end_normal_transaction(&mut self) {
        self.in_transaction = false;
        self.explicit_transaction = false;
        self.start_options = StartOptions::default();
        self.savepoints.clear();
        self.rollback_requested.set(false);
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("query_id", &self.query_id)
            .field("autocommit", &self.autocommit)
            .field("in_transaction", &self.in_transaction)
            .field("statement", &self.lists[STATEMENT].len())
            .field("normal", &self.lists[NORMAL].len())
            .field("xa_state", &self.xid_state.xa_state)
            .finish()
    }
}
