//! A storage engine that records what the coordinator asks of it.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use tessera_common::Xid;
use tessera_txn::{
    EngineStatus, Session, StartOptions, TransactionalStorageEngine, XaResourceManager,
};

/// One engine call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    /// Engine that received the call.
    pub engine: String,
    /// Operation name, e.g. `xa_prepare` or `commit_statement`.
    pub op: &'static str,
}

impl fmt::Display for Call {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.engine, self.op)
    }
}

/// Call log shared by every engine of a test.
#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<Call>>>);

impl CallLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, engine: &str, op: &'static str) {
        self.0.lock().push(Call {
            engine: engine.to_string(),
            op,
        });
    }

    /// Returns every call in order.
    pub fn calls(&self) -> Vec<Call> {
        self.0.lock().clone()
    }

    /// Returns the operations received by `engine`, in order.
    pub fn ops(&self, engine: &str) -> Vec<&'static str> {
        self.0
            .lock()
            .iter()
            .filter(|c| c.engine == engine)
            .map(|c| c.op)
            .collect()
    }

    /// Returns how often `engine` received `op`.
    pub fn count(&self, engine: &str, op: &str) -> usize {
        self.0
            .lock()
            .iter()
            .filter(|c| c.engine == engine && c.op == op)
            .count()
    }

    /// Returns the position of the first `op` call on any engine.
    pub fn first(&self, op: &str) -> Option<usize> {
        self.0.lock().iter().position(|c| c.op == op)
    }

    /// Returns the position of the last `op` call on any engine.
    pub fn last(&self, op: &str) -> Option<usize> {
        self.0.lock().iter().rposition(|c| c.op == op)
    }

    /// Forgets every recorded call.
    pub fn clear(&self) {
        self.0.lock().clear();
    }
}

impl fmt::Debug for CallLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.0.lock().iter().map(ToString::to_string))
            .finish()
    }
}

/// Engine with configurable outcomes that logs every call it receives.
///
/// It also keeps a list of prepared XIDs, filled by `do_xa_prepare` with
/// the session's XID or directly with [`RecordingEngine::add_prepared`],
/// and drained by the by-XID commit and rollback calls.
pub struct RecordingEngine {
    name: String,
    log: CallLog,
    start_status: Mutex<EngineStatus>,
    prepare_status: Mutex<EngineStatus>,
    commit_status: Mutex<EngineStatus>,
    rollback_status: Mutex<EngineStatus>,
    prepared: Mutex<Vec<Xid>>,
    deadlock_victim: AtomicBool,
}

impl RecordingEngine {
    /// Creates an engine logging into `log`.
    pub fn new(name: &str, log: &CallLog) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            log: log.clone(),
            start_status: Mutex::new(EngineStatus::Ok),
            prepare_status: Mutex::new(EngineStatus::Ok),
            commit_status: Mutex::new(EngineStatus::Ok),
            rollback_status: Mutex::new(EngineStatus::Ok),
            prepared: Mutex::new(Vec::new()),
            deadlock_victim: AtomicBool::new(false),
        })
    }

    /// Returns the engine name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sets the status returned by `do_start_transaction`.
    pub fn fail_start(&self, status: EngineStatus) {
        *self.start_status.lock() = status;
    }

    /// Sets the status returned by `do_xa_prepare`.
    pub fn fail_prepare(&self, status: EngineStatus) {
        *self.prepare_status.lock() = status;
    }

    /// Sets the status returned by `do_commit` and `do_xa_commit`.
    pub fn fail_commit(&self, status: EngineStatus) {
        *self.commit_status.lock() = status;
    }

    /// Sets the status returned by rollbacks.
    pub fn fail_rollback(&self, status: EngineStatus) {
        *self.rollback_status.lock() = status;
    }

    /// Makes the next statement start pick the session as a deadlock
    /// victim.
    pub fn choose_victim(&self) {
        self.deadlock_victim.store(true, Ordering::SeqCst);
    }

    /// Adds an XID as if it had survived a crash in prepared state.
    pub fn add_prepared(&self, xid: Xid) {
        self.prepared.lock().push(xid);
    }

    /// Returns the XIDs currently prepared in this engine.
    pub fn prepared(&self) -> Vec<Xid> {
        self.prepared.lock().clone()
    }

    fn record(&self, op: &'static str) {
        self.log.push(&self.name, op);
    }

    fn resolve(&self, xid: &Xid) -> EngineStatus {
        let mut prepared = self.prepared.lock();
        match prepared.iter().position(|x| x == xid) {
            Some(pos) => {
                prepared.remove(pos);
                EngineStatus::Ok
            }
            None => EngineStatus::Fatal,
        }
    }

    fn forget(&self, xid: &Xid) {
        self.prepared.lock().retain(|x| x != xid);
    }
}

impl fmt::Debug for RecordingEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordingEngine")
            .field("name", &self.name)
            .field("prepared", &self.prepared.lock().len())
            .finish()
    }
}

impl TransactionalStorageEngine for RecordingEngine {
    fn do_start_transaction(&self, _session: &Session, options: StartOptions) -> EngineStatus {
        self.record(if options.with_consistent_snapshot {
            "start_snapshot"
        } else {
            "start_transaction"
        });
        *self.start_status.lock()
    }

    fn do_start_statement(&self, session: &Session) {
        self.record("start_statement");
        if self.deadlock_victim.swap(false, Ordering::SeqCst) {
            session.request_rollback();
        }
    }

    fn do_end_statement(&self, _session: &Session) {
        self.record("end_statement");
    }

    fn do_commit(&self, _session: &Session, normal_transaction: bool) -> EngineStatus {
        self.record(if normal_transaction {
            "commit"
        } else {
            "commit_statement"
        });
        *self.commit_status.lock()
    }

    fn do_rollback(&self, _session: &Session, normal_transaction: bool) -> EngineStatus {
        self.record(if normal_transaction {
            "rollback"
        } else {
            "rollback_statement"
        });
        *self.rollback_status.lock()
    }

    fn do_set_savepoint(&self, _session: &Session, _name: &str) -> EngineStatus {
        self.record("set_savepoint");
        EngineStatus::Ok
    }

    fn do_rollback_to_savepoint(&self, _session: &Session, _name: &str) -> EngineStatus {
        self.record("rollback_to_savepoint");
        EngineStatus::Ok
    }

    fn do_release_savepoint(&self, _session: &Session, _name: &str) -> EngineStatus {
        self.record("release_savepoint");
        EngineStatus::Ok
    }

    fn do_release_temporary_latches(&self, _session: &Session) {
        self.record("release_latches");
    }

    fn close_connection(&self, _session: &Session) {
        self.record("close");
    }
}

impl XaResourceManager for RecordingEngine {
    fn do_xa_prepare(&self, session: &Session, _normal_transaction: bool) -> EngineStatus {
        self.record("xa_prepare");
        let status = *self.prepare_status.lock();
        if status.is_ok() {
            self.prepared.lock().push(session.xid().clone());
        }
        status
    }

    fn do_xa_commit(&self, session: &Session, _normal_transaction: bool) -> EngineStatus {
        self.record("xa_commit");
        let status = *self.commit_status.lock();
        if status.is_ok() {
            self.forget(session.xid());
        }
        status
    }

    fn do_xa_rollback(&self, session: &Session, _normal_transaction: bool) -> EngineStatus {
        self.record("xa_rollback");
        self.forget(session.xid());
        *self.rollback_status.lock()
    }

    fn do_xa_commit_xid(&self, xid: &Xid) -> EngineStatus {
        self.record("commit_xid");
        self.resolve(xid)
    }

    fn do_xa_rollback_xid(&self, xid: &Xid) -> EngineStatus {
        self.record("rollback_xid");
        self.resolve(xid)
    }

    fn do_xa_recover(&self, limit: usize) -> Vec<Xid> {
        self.record("recover");
        self.prepared.lock().iter().take(limit).cloned().collect()
    }
}
