//! In-crate engine stub for unit tests.

use std::sync::Arc;

use parking_lot::Mutex;

use tessera_common::Xid;

use crate::engine::{StartOptions, TransactionalStorageEngine, XaResourceManager};
use crate::session::Session;
use crate::status::EngineStatus;

#[derive(Default)]
pub(crate) struct StubEngine {
    calls: Mutex<Vec<&'static str>>,
    start_status: Mutex<EngineStatus>,
    prepare_status: Mutex<EngineStatus>,
    commit_status: Mutex<EngineStatus>,
    prepared: Mutex<Vec<Xid>>,
}

impl StubEngine {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn set_start_status(&self, status: EngineStatus) {
        *self.start_status.lock() = status;
    }

    pub(crate) fn set_prepare_status(&self, status: EngineStatus) {
        *self.prepare_status.lock() = status;
    }

    pub(crate) fn set_commit_status(&self, status: EngineStatus) {
        *self.commit_status.lock() = status;
    }

    pub(crate) fn add_prepared(&self, xid: Xid) {
        self.prepared.lock().push(xid);
    }

    pub(crate) fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().clone()
    }

    pub(crate) fn count(&self, call: &str) -> usize {
        self.calls.lock().iter().filter(|c| **c == call).count()
    }

    fn record(&self, call: &'static str) {
        self.calls.lock().push(call);
    }
}

impl TransactionalStorageEngine for StubEngine {
    fn do_start_transaction(&self, _session: &Session, _options: StartOptions) -> EngineStatus {
        self.record("start_transaction");
        *self.start_status.lock()
    }

    fn do_start_statement(&self, _session: &Session) {
        self.record("start_statement");
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
        EngineStatus::Ok
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

impl XaResourceManager for StubEngine {
    fn do_xa_prepare(&self, _session: &Session, _normal_transaction: bool) -> EngineStatus {
        self.record("xa_prepare");
        *self.prepare_status.lock()
    }

    fn do_xa_commit(&self, _session: &Session, _normal_transaction: bool) -> EngineStatus {
        self.record("xa_commit");
        *self.commit_status.lock()
    }

    fn do_xa_rollback(&self, _session: &Session, _normal_transaction: bool) -> EngineStatus {
        self.record("xa_rollback");
        EngineStatus::Ok
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

impl StubEngine {
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
}
