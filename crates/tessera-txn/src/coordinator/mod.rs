//! Transaction coordinator.
//!
//! [`TransactionServices`] drives every registered storage engine through
//! the statement and transaction lifecycle of a session and decides, at
//! commit time, whether a prepare round is needed.
//!
//! # Commit
//!
//! ```text
//!            participants with modified data
//!                         │
//!          ┌──────────────┼───────────────────┐
//!          │ 0            │ 1                 │ > 1, all XA capable
//!          ▼              ▼                   ▼
//!      reset only    do_commit          do_xa_prepare on each
//!                                             │
//!                               ┌─────────────┴─────────────┐
//!                          all Ok                       any veto
//!                               │                           │
//!                               ▼                           ▼
//!                       do_xa_commit on each      do_xa_rollback on each
//! ```
//!
//! Participants that only read are never contacted at commit or rollback;
//! their contexts are reset.

mod recovery;
mod xa;

pub use recovery::RecoveryReport;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{debug, error, warn};

use tessera_cache::XidCache;
use tessera_common::config::KernelConfig;
use tessera_common::{QueryId, SessionId, XaState};

use crate::engine::{EngineHandle, EngineRegistry, StartOptions};
use crate::error::{TransactionError, TxnResult};
use crate::session::{Savepoint, Session};
use crate::stats::TransactionStats;
use crate::status::EngineStatus;

/// How a `COMMIT` or `ROLLBACK` statement ends the transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// `COMMIT`
    Commit,
    /// `COMMIT AND CHAIN`: a new transaction starts immediately.
    CommitAndChain,
    /// `COMMIT RELEASE`: the session disconnects afterwards.
    CommitRelease,
    /// `ROLLBACK`
    Rollback,
    /// `ROLLBACK AND CHAIN`
    RollbackAndChain,
    /// `ROLLBACK RELEASE`
    RollbackRelease,
}

impl Completion {
    fn is_commit(self) -> bool {
        matches!(
            self,
            Completion::Commit | Completion::CommitAndChain | Completion::CommitRelease
        )
    }
}

/// Tracks the most severe failure of a fan-out call.
#[derive(Default)]
struct Failure {
    worst: Option<(String, EngineStatus)>,
    engines: Vec<String>,
}

impl Failure {
    fn record(&mut self, engine: &EngineHandle, status: EngineStatus) {
        if status.is_ok() {
            return;
        }
        self.engines.push(engine.name().to_string());
        if self.worst.as_ref().map_or(true, |(_, w)| status > *w) {
            self.worst = Some((engine.name().to_string(), status));
        }
    }

    fn into_result(self, operation: &'static str) -> TxnResult<()> {
        match self.worst {
            Some((engine, status)) => Err(TransactionError::engine(&engine, operation, status)),
            None => Ok(()),
        }
    }
}

/// Session-facing transaction orchestration.
pub struct TransactionServices {
    config: KernelConfig,
    engines: Arc<EngineRegistry>,
    xid_cache: Arc<XidCache>,
    stats: TransactionStats,
    next_query_id: AtomicU64,
}

impl TransactionServices {
    /// Creates a coordinator with empty registries.
    pub fn new(config: KernelConfig) -> Self {
        let engines = Arc::new(EngineRegistry::new(config.max_engines));
        let xid_cache = Arc::new(XidCache::new(config.cache.xid_capacity));
        Self::with_registries(config, engines, xid_cache)
    }

    /// Creates a coordinator over existing registries.
    pub fn with_registries(
        config: KernelConfig,
        engines: Arc<EngineRegistry>,
        xid_cache: Arc<XidCache>,
    ) -> Self {
        Self {
            config,
            engines,
            xid_cache,
            stats: TransactionStats::new(),
            next_query_id: AtomicU64::new(1),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    /// Returns the engine registry.
    pub fn engines(&self) -> &Arc<EngineRegistry> {
        &self.engines
    }

    /// Returns the XID cache.
    pub fn xid_cache(&self) -> &Arc<XidCache> {
        &self.xid_cache
    }

    /// Returns the statistics.
    pub fn stats(&self) -> &TransactionStats {
        &self.stats
    }

    /// Creates a session sized for the engine registry.
    pub fn create_session(&self, id: SessionId) -> Session {
        let mut session = Session::new(id, self.config.max_engines, self.config.strict_mode);
        session.set_query_id(self.next_query_id());
        session
    }

    fn next_query_id(&self) -> QueryId {
        QueryId::new(self.next_query_id.fetch_add(1, Ordering::SeqCst))
    }

    /// Registers `engine` in the statement (`normal == false`) or normal
    /// transaction. Registering twice is a no-op.
    ///
    /// The first registration of a transaction generates its local XID
    /// from the server id and the current query id.
    ///
    /// # Errors
    ///
    /// Returns `Internal` if the engine slot is outside the session's
    /// context pool.
    pub fn register_engine(
        &self,
        session: &mut Session,
        normal: bool,
        engine: &Arc<EngineHandle>,
    ) -> TxnResult<()> {
        let first = session.transaction(normal).is_empty()
            && (normal || session.transaction(true).is_empty());
        if !session.register(engine, normal)? {
            return Ok(());
        }
        if first {
            TransactionStats::bump(&self.stats.started);
        }
        if session.xid().is_null() {
            let query_id = session.query_id();
            session
                .xid_state_mut()
                .xid
                .set_local(self.config.server_id, query_id);
        }
        debug!(
            session = %session.id(),
            engine = engine.name(),
            normal,
            "engine registered"
        );
        Ok(())
    }

    /// Starts a transaction in each engine not yet registered in the
    /// statement or normal transaction, then registers it.
    ///
    /// Engines that fail to start are not registered; engines already
    /// started stay registered and are rolled back with the transaction.
    ///
    /// # Errors
    ///
    /// Returns `EngineFailed` carrying the most severe start status.
    pub fn start_transaction(
        &self,
        session: &mut Session,
        engines: &[Arc<EngineHandle>],
        options: StartOptions,
        normal: bool,
    ) -> TxnResult<()> {
        let mut failure = Failure::default();
        for engine in engines {
            let Some(txn) = engine.transactional() else {
                continue;
            };
            if session.is_registered(engine, normal) {
                continue;
            }
            let status = txn.do_start_transaction(session, options);
            if status.is_ok() {
                self.register_engine(session, normal, engine)?;
            } else {
                warn!(
                    session = %session.id(),
                    engine = engine.name(),
                    %status,
                    "start transaction failed"
                );
                failure.record(engine, status);
            }
        }
        failure.into_result("start transaction")
    }

    /// Starts an explicit transaction (`BEGIN`).
    ///
    /// An open normal transaction is committed first. With a consistent
    /// snapshot every transactional engine is started immediately;
    /// otherwise engines start as statements touch them.
    ///
    /// # Errors
    ///
    /// Fails inside an XA branch, or as [`TransactionServices::commit`]
    /// and [`TransactionServices::start_transaction`].
    pub fn begin(&self, session: &mut Session, options: StartOptions) -> TxnResult<()> {
        if session.xa_state() != XaState::NotInTransaction {
            return Err(TransactionError::XaInvalidState {
                command: "BEGIN",
                state: session.xa_state(),
            });
        }
        if !session.transaction(true).is_empty() {
            self.commit(session, true)?;
        }
        session.begin_explicit(options);
        if options.with_consistent_snapshot {
            let engines = self.engines.transactional();
            self.start_transaction(session, &engines, options, true)?;
        }
        Ok(())
    }

    /// Registers engines touched by the current statement.
    ///
    /// `normal` says whether the statement runs inside a multi-statement
    /// transaction; it is decided by the caller. Inside one, each engine is
    /// started once in the normal transaction; in autocommit mode the
    /// statement is the transaction and the engine is started per
    /// statement. Either way `do_start_statement` follows.
    ///
    /// A call with no statement participants yet opens a new statement:
    /// the session gets a fresh query id and an empty diagnostics area.
    ///
    /// # Errors
    ///
    /// Returns `EngineFailed` carrying the most severe start status.
    pub fn start_statement(
        &self,
        session: &mut Session,
        engines: &[Arc<EngineHandle>],
        normal: bool,
    ) -> TxnResult<()> {
        if session.transaction(false).is_empty() {
            let query_id = self.next_query_id();
            session.set_query_id(query_id);
            session.diagnostics_mut().clear();
        }

        let mut failure = Failure::default();
        for engine in engines {
            let Some(txn) = engine.transactional() else {
                continue;
            };
            if normal && !session.is_registered(engine, true) {
                let options = session.start_options();
                let status = txn.do_start_transaction(session, options);
                if !status.is_ok() {
                    failure.record(engine, status);
                    continue;
                }
                self.register_engine(session, true, engine)?;
            }
            if session.is_registered(engine, false) {
                continue;
            }
            if !normal {
                let status = txn.do_start_transaction(session, StartOptions::default());
                if !status.is_ok() {
                    failure.record(engine, status);
                    continue;
                }
            }
            self.register_engine(session, false, engine)?;
            txn.do_start_statement(session);
        }
        failure.into_result("start statement")
    }

    /// Flags that `engine` modified data in the current statement. The
    /// flag reaches the normal transaction when the statement commits.
    ///
    /// # Errors
    ///
    /// Returns `Internal` if the engine is not registered.
    pub fn mark_modified(&self, session: &mut Session, engine: &EngineHandle) -> TxnResult<()> {
        let normal = if session.is_registered(engine, false) {
            false
        } else if session.is_registered(engine, true) {
            true
        } else {
            return Err(TransactionError::Internal(format!(
                "engine '{}' modified data without being registered",
                engine.name()
            )));
        };
        session
            .context_mut(engine.slot(), normal)?
            .mark_modified_data();
        Ok(())
    }

    fn is_modified(session: &Session, engine: &EngineHandle, normal: bool) -> bool {
        session
            .context(engine.slot(), normal)
            .is_some_and(|c| c.has_modified_data())
    }

    /// Counts participants with modified data and, for a statement, folds
    /// each statement context into the normal context of the same engine.
    ///
    /// Returns the participants with modified data.
    fn check_and_coalesce(
        &self,
        session: &mut Session,
        normal: bool,
    ) -> TxnResult<Vec<Arc<EngineHandle>>> {
        let participants = session.transaction(normal).participants().to_vec();
        let mut modified = Vec::new();
        for engine in participants {
            if !Self::is_modified(session, &engine, normal) {
                continue;
            }
            if !normal && session.is_registered(&engine, true) {
                let statement = session.context_mut(engine.slot(), false)?.clone();
                session
                    .context_mut(engine.slot(), true)?
                    .coalesce_with(&statement);
            }
            modified.push(engine);
        }
        Ok(modified)
    }

    /// Commits the statement (`normal == false`) or normal transaction.
    ///
    /// A real transaction (the normal one, or a statement in autocommit
    /// mode) with more than one modified participant runs a prepare round
    /// when every such participant supports two-phase commit. The kill
    /// flag is checked before each prepare; once every participant voted
    /// yes the commit runs to completion.
    ///
    /// # Errors
    ///
    /// - `RolledBack` if a participant vetoed prepare (everything was
    ///   rolled back)
    /// - `Killed` if the session was killed before prepare completed
    /// - `CommitInconsistent` if a commit failed after prepare
    /// - `EngineFailed` if a one-phase commit failed
    pub fn commit(&self, session: &mut Session, normal: bool) -> TxnResult<()> {
        if session.transaction(normal).is_empty() {
            if normal {
                session.end_normal_transaction();
            }
            return Ok(());
        }

        let is_real = normal || session.transaction(true).is_empty();
        let modified = self.check_and_coalesce(session, normal)?;
        let two_phase_capable = modified.iter().all(|e| e.has_two_phase_commit());
        if is_real && modified.len() > 1 && !two_phase_capable {
            warn!(
                session = %session.id(),
                engines = modified.len(),
                "transaction spans engines without two-phase commit; committing in one phase"
            );
        }
        let two_phase = is_real && modified.len() > 1 && two_phase_capable;

        if two_phase {
            if let Some(err) = self.prepare_round(session, normal, &modified) {
                self.rollback_participants(session, normal, true)?;
                return Err(err);
            }
        }

        self.commit_participants(session, normal, two_phase)
    }

    /// Asks each participant to prepare. Returns the veto, if any.
    fn prepare_round(
        &self,
        session: &Session,
        normal: bool,
        participants: &[Arc<EngineHandle>],
    ) -> Option<TransactionError> {
        for engine in participants {
            if session.is_killed() {
                warn!(session = %session.id(), "session killed before prepare completed");
                return Some(TransactionError::Killed);
            }
            let Some(xa) = engine.xa() else {
                continue;
            };
            TransactionStats::bump(&self.stats.prepares);
            let status = xa.do_xa_prepare(session, normal);
            if !status.is_ok() {
                warn!(
                    session = %session.id(),
                    engine = engine.name(),
                    %status,
                    "prepare vetoed; rolling back"
                );
                return Some(TransactionError::RolledBack {
                    reason: format!("engine '{}' failed to prepare: {status}", engine.name()),
                });
            }
        }
        None
    }

    /// Commits without a prepare round.
    ///
    /// # Errors
    ///
    /// Returns `EngineFailed` if a participant failed to commit.
    pub fn commit_one_phase(&self, session: &mut Session, normal: bool) -> TxnResult<()> {
        self.check_and_coalesce(session, normal)?;
        self.commit_participants(session, normal, false)
    }

    fn commit_participants(
        &self,
        session: &mut Session,
        normal: bool,
        prepared: bool,
    ) -> TxnResult<()> {
        let is_real = normal || session.transaction(true).is_empty();
        let participants = session.transaction(normal).participants().to_vec();
        let mut failure = Failure::default();

        for engine in &participants {
            if Self::is_modified(session, engine, normal) {
                let status = match (prepared, engine.xa(), engine.transactional()) {
                    (true, Some(xa), _) => xa.do_xa_commit(session, normal),
                    // Engines without two-phase commit were never prepared.
                    (_, _, Some(txn)) => txn.do_commit(session, normal),
                    _ => EngineStatus::Ok,
                };
                if !status.is_ok() {
                    TransactionStats::bump(&self.stats.commit_failures);
                    if prepared {
                        error!(
                            session = %session.id(),
                            engine = engine.name(),
                            xid = %session.xid(),
                            %status,
                            "commit failed after prepare; engines may disagree until recovery"
                        );
                    } else {
                        warn!(
                            session = %session.id(),
                            engine = engine.name(),
                            %status,
                            "commit failed"
                        );
                    }
                    failure.record(engine, status);
                }
            }
            session.context_mut(engine.slot(), normal)?.reset();
        }

        self.finish(session, normal, is_real);
        if is_real && failure.worst.is_none() {
            TransactionStats::bump(&self.stats.committed);
            if prepared {
                TransactionStats::bump(&self.stats.two_phase_commits);
            } else {
                TransactionStats::bump(&self.stats.one_phase_commits);
            }
        }

        if prepared && !failure.engines.is_empty() {
            return Err(TransactionError::CommitInconsistent {
                engines: failure.engines,
            });
        }
        failure.into_result("commit")
    }

    /// Rolls back the statement (`normal == false`) or normal transaction.
    ///
    /// # Errors
    ///
    /// Returns `EngineFailed` if a participant failed to roll back. Every
    /// participant is still contacted and every context reset.
    pub fn rollback(&self, session: &mut Session, normal: bool) -> TxnResult<()> {
        let prepared = session.xa_state() == XaState::Prepared;
        self.rollback_participants(session, normal, prepared)
    }

    fn rollback_participants(
        &self,
        session: &mut Session,
        normal: bool,
        use_xa: bool,
    ) -> TxnResult<()> {
        if session.transaction(normal).is_empty() {
            if normal {
                session.end_normal_transaction();
            }
            return Ok(());
        }

        let is_real = normal || session.transaction(true).is_empty();
        let participants = session.transaction(normal).participants().to_vec();
        let mut failure = Failure::default();

        for engine in &participants {
            if Self::is_modified(session, engine, normal) {
                let status = match (use_xa, engine.xa(), engine.transactional()) {
                    (true, Some(xa), _) => xa.do_xa_rollback(session, normal),
                    (_, _, Some(txn)) => txn.do_rollback(session, normal),
                    _ => EngineStatus::Ok,
                };
                if !status.is_ok() {
                    error!(
                        session = %session.id(),
                        engine = engine.name(),
                        %status,
                        "rollback failed"
                    );
                    failure.record(engine, status);
                }
            }
            session.context_mut(engine.slot(), normal)?.reset();
        }

        self.finish(session, normal, is_real);
        if is_real {
            TransactionStats::bump(&self.stats.rolled_back);
        }
        failure.into_result("roll back")
    }

    /// Clears a transaction list after its participants were contacted.
    fn finish(&self, session: &mut Session, normal: bool, is_real: bool) {
        session.transaction_mut(normal).clear();
        if is_real && session.xa_state() == XaState::NotInTransaction {
            session.xid_state_mut().xid.set_null();
        }
        if normal {
            session.end_normal_transaction();
        }
    }

    /// Resets a transaction's contexts without contacting any engine.
    fn forget(&self, session: &mut Session, normal: bool) -> TxnResult<()> {
        let participants = session.transaction(normal).participants().to_vec();
        for engine in &participants {
            session.context_mut(engine.slot(), normal)?.reset();
        }
        session.transaction_mut(normal).clear();
        if normal {
            session.end_normal_transaction();
        }
        Ok(())
    }

    /// Ends the current statement: commits it if it succeeded, rolls it
    /// back otherwise.
    ///
    /// If an engine requested a rollback (deadlock victim) the normal
    /// transaction is rolled back as well.
    ///
    /// # Errors
    ///
    /// Returns the commit or rollback error, or `RolledBack` if the normal
    /// transaction was rolled back on request.
    pub fn autocommit_or_rollback(
        &self,
        session: &mut Session,
        statement_ok: bool,
    ) -> TxnResult<()> {
        let mut result = Ok(());
        if !session.transaction(false).is_empty() {
            let participants = session.transaction(false).participants().to_vec();
            for engine in &participants {
                if let Some(txn) = engine.transactional() {
                    txn.do_end_statement(session);
                }
            }
            result = if statement_ok {
                self.commit(session, false)
            } else {
                self.rollback(session, false)
            };
        }

        if session.is_rollback_requested() {
            warn!(session = %session.id(), "rolling back transaction on engine request");
            self.rollback(session, true)?;
            return Err(TransactionError::RolledBack {
                reason: "storage engine requested rollback".to_string(),
            });
        }
        result
    }

    /// Handles `COMMIT` and `ROLLBACK` statements.
    ///
    /// # Errors
    ///
    /// Fails inside an XA branch (use the XA commands), or as
    /// [`TransactionServices::commit`] and
    /// [`TransactionServices::rollback`].
    pub fn end_transaction(&self, session: &mut Session, completion: Completion) -> TxnResult<()> {
        if session.xa_state() != XaState::NotInTransaction {
            return Err(TransactionError::XaInvalidState {
                command: if completion.is_commit() {
                    "COMMIT"
                } else {
                    "ROLLBACK"
                },
                state: session.xa_state(),
            });
        }
        if !session.transaction(false).is_empty() {
            return Err(TransactionError::Internal(
                "transaction ended while a statement is open".to_string(),
            ));
        }

        let options = session.start_options();
        let result = if completion.is_commit() {
            self.commit(session, true)
        } else {
            self.rollback(session, true)
        };

        match completion {
            Completion::CommitAndChain | Completion::RollbackAndChain if result.is_ok() => {
                session.begin_explicit(options);
            }
            Completion::CommitRelease | Completion::RollbackRelease => {
                session.kill_switch().kill();
            }
            _ => {}
        }
        result
    }

    /// Sets a savepoint in every engine of the normal transaction. A
    /// savepoint with the same name is replaced.
    ///
    /// # Errors
    ///
    /// Returns `EngineFailed` if an engine failed to set it.
    pub fn set_savepoint(&self, session: &mut Session, name: &str) -> TxnResult<()> {
        if let Some(pos) = session.savepoints().iter().position(|s| s.is_named(name)) {
            session.savepoints_mut().remove(pos);
        }

        let participants = session.transaction(true).participants().to_vec();
        let mut failure = Failure::default();
        for engine in &participants {
            if let Some(txn) = engine.transactional() {
                failure.record(engine, txn.do_set_savepoint(session, name));
            }
        }
        failure.into_result("set savepoint")?;

        session
            .savepoints_mut()
            .push(Savepoint::new(name, participants.len()));
        TransactionStats::bump(&self.stats.savepoints);
        Ok(())
    }

    fn find_savepoint(session: &Session, name: &str) -> TxnResult<(usize, Savepoint)> {
        session
            .savepoints()
            .iter()
            .enumerate()
            .rev()
            .find(|(_, s)| s.is_named(name))
            .map(|(i, s)| (i, s.clone()))
            .ok_or_else(|| TransactionError::SavepointNotFound {
                name: name.to_string(),
            })
    }

    /// Rolls back to a savepoint.
    ///
    /// Engines registered before the savepoint roll back to it; engines
    /// registered after it roll back their whole transaction and leave it.
    /// Newer savepoints are discarded; this one is kept.
    ///
    /// # Errors
    ///
    /// Returns `SavepointNotFound` or `EngineFailed`.
    pub fn rollback_to_savepoint(&self, session: &mut Session, name: &str) -> TxnResult<()> {
        let (index, savepoint) = Self::find_savepoint(session, name)?;
        let participants = session.transaction(true).participants().to_vec();
        let kept = savepoint.participants().min(participants.len());
        let mut failure = Failure::default();

        for engine in &participants[..kept] {
            if let Some(txn) = engine.transactional() {
                failure.record(engine, txn.do_rollback_to_savepoint(session, name));
            }
        }
        for engine in &participants[kept..] {
            if Self::is_modified(session, engine, true) {
                if let Some(txn) = engine.transactional() {
                    failure.record(engine, txn.do_rollback(session, true));
                }
            }
            session.context_mut(engine.slot(), true)?.reset();
        }
        session.transaction_mut(true).truncate(kept);
        session.savepoints_mut().truncate(index + 1);
        failure.into_result("roll back to savepoint")
    }

    /// Releases a savepoint and every newer one.
    ///
    /// # Errors
    ///
    /// Returns `SavepointNotFound` or `EngineFailed`.
    pub fn release_savepoint(&self, session: &mut Session, name: &str) -> TxnResult<()> {
        let (index, savepoint) = Self::find_savepoint(session, name)?;
        let participants = session.transaction(true).participants().to_vec();
        let kept = savepoint.participants().min(participants.len());
        let mut failure = Failure::default();

        for engine in &participants[..kept] {
            if let Some(txn) = engine.transactional() {
                failure.record(engine, txn.do_release_savepoint(session, name));
            }
        }
        session.savepoints_mut().truncate(index);
        failure.into_result("release savepoint")
    }

    /// Lets every transactional engine drop latches before the session
    /// blocks on the network. Never fails.
    pub fn release_temporary_latches(&self, session: &Session) {
        for engine in self.engines.transactional() {
            if let Some(txn) = engine.transactional() {
                txn.do_release_temporary_latches(session);
            }
        }
    }

    /// Tears down a disconnecting session.
    ///
    /// Open work is rolled back, except a prepared XA branch, which stays
    /// in the XID cache for an external `XA COMMIT`/`XA ROLLBACK`.
    ///
    /// # Errors
    ///
    /// Returns the first rollback error; every engine is still told the
    /// connection closed.
    pub fn close_session(&self, session: &mut Session) -> TxnResult<()> {
        let mut result = self.rollback(session, false);

        let outcome = match session.xa_state() {
            XaState::Prepared => {
                let xid = session.xid().clone();
                debug!(session = %session.id(), xid = %xid, "detaching prepared XA branch");
                let detached = self.xid_cache.detach(&xid).map_err(TransactionError::from);
                *session.xid_state_mut() = Default::default();
                self.forget(session, true).and(detached)
            }
            XaState::Active | XaState::Idle => {
                let xid = session.xid().clone();
                let rolled_back = self.rollback(session, true);
                self.xid_cache.delete(&xid);
                *session.xid_state_mut() = Default::default();
                rolled_back
            }
            XaState::NotInTransaction => self.rollback(session, true),
        };
        result = result.and(outcome);

        for engine in self.engines.transactional() {
            if let Some(txn) = engine.transactional() {
                txn.close_connection(session);
            }
        }
        result
    }
}

impl std::fmt::Debug for TransactionServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionServices")
            .field("engines", &self.engines.len())
            .field("xids", &self.xid_cache.len())
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineCapabilities;
    use crate::testing::StubEngine;
    use std::sync::atomic::Ordering;

    fn create_services() -> TransactionServices {
        TransactionServices::new(KernelConfig::for_testing())
    }

    fn add_xa(services: &TransactionServices, name: &str) -> (Arc<StubEngine>, Arc<EngineHandle>) {
        let stub = StubEngine::new();
        let handle = services
            .engines()
            .add(name, EngineCapabilities::xa(Arc::clone(&stub)))
            .unwrap();
        (stub, handle)
    }

    fn add_plain(
        services: &TransactionServices,
        name: &str,
    ) -> (Arc<StubEngine>, Arc<EngineHandle>) {
        let stub = StubEngine::new();
        let handle = services
            .engines()
            .add(
                name,
                EngineCapabilities::transactional(Arc::clone(&stub) as _),
            )
            .unwrap();
        (stub, handle)
    }

    /// Runs one statement in an explicit transaction, modifying `writes`.
    fn run_statement(
        services: &TransactionServices,
        session: &mut Session,
        touched: &[Arc<EngineHandle>],
        writes: &[&Arc<EngineHandle>],
    ) {
        services.start_statement(session, touched, true).unwrap();
        for engine in writes {
            services.mark_modified(session, engine).unwrap();
        }
        services.autocommit_or_rollback(session, true).unwrap();
    }

    #[test]
    fn test_registration_is_idempotent() {
        let services = create_services();
        let (stub, heap) = add_xa(&services, "heap");
        let mut session = services.create_session(SessionId::new(1));

        let engines = [Arc::clone(&heap)];
        services
            .start_transaction(&mut session, &engines, StartOptions::default(), true)
            .unwrap();
        services
            .start_transaction(&mut session, &engines, StartOptions::default(), true)
            .unwrap();
        services.register_engine(&mut session, true, &heap).unwrap();

        assert_eq!(stub.count("start_transaction"), 1);
        assert_eq!(session.transaction(true).len(), 1);
        assert!(session.in_transaction());
        assert_eq!(session.xid().local_trx_id(), Some(session.query_id()));
        assert_eq!(services.stats().started.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_start_failure_keeps_started_engines() {
        let services = create_services();
        let (_, good) = add_xa(&services, "good");
        let (bad_stub, bad) = add_xa(&services, "bad");
        let (worse_stub, worse) = add_xa(&services, "worse");
        bad_stub.set_start_status(EngineStatus::Deadlock);
        worse_stub.set_start_status(EngineStatus::Io);
        let mut session = services.create_session(SessionId::new(1));

        let err = services
            .start_transaction(
                &mut session,
                &[Arc::clone(&good), bad, worse],
                StartOptions::default(),
                true,
            )
            .unwrap_err();
        assert_eq!(
            err,
            TransactionError::engine("worse", "start transaction", EngineStatus::Io)
        );
        assert!(session.is_registered(&good, true));
        assert_eq!(session.transaction(true).len(), 1);
    }

    #[test]
    fn test_read_only_participant_is_skipped() {
        let services = create_services();
        let (a_stub, a) = add_xa(&services, "a");
        let (b_stub, b) = add_xa(&services, "b");
        let mut session = services.create_session(SessionId::new(1));
        session.set_autocommit(false);

        let both = [Arc::clone(&a), Arc::clone(&b)];
        run_statement(&services, &mut session, &both, &[&a]);
        services.end_transaction(&mut session, Completion::Commit).unwrap();

        assert_eq!(a_stub.count("commit"), 1);
        assert_eq!(a_stub.count("xa_prepare"), 0);
        assert!(!b_stub
            .calls()
            .iter()
            .any(|c| c.contains("commit") || c.contains("rollback") || c.contains("prepare")));
        assert!(!session.in_transaction());
        assert!(session.xid().is_null());
        assert_eq!(services.stats().one_phase_commits.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_two_modified_engines_use_two_phase_commit() {
        let services = create_services();
        let (a_stub, a) = add_xa(&services, "a");
        let (b_stub, b) = add_xa(&services, "b");
        let mut session = services.create_session(SessionId::new(1));
        session.set_autocommit(false);

        let both = [Arc::clone(&a), Arc::clone(&b)];
        run_statement(&services, &mut session, &both, &[&a, &b]);
        services.commit(&mut session, true).unwrap();

        for stub in [&a_stub, &b_stub] {
            let calls = stub.calls();
            let prepare = calls.iter().position(|c| *c == "xa_prepare").unwrap();
            let commit = calls.iter().position(|c| *c == "xa_commit").unwrap();
            assert!(prepare < commit);
            assert_eq!(stub.count("commit"), 0);
        }
        assert_eq!(services.stats().prepares.load(Ordering::Relaxed), 2);
        assert_eq!(services.stats().two_phase_commits.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_prepare_veto_rolls_back_everyone() {
        let services = create_services();
        let (a_stub, a) = add_xa(&services, "a");
        let (b_stub, b) = add_xa(&services, "b");
        b_stub.set_prepare_status(EngineStatus::Io);
        let mut session = services.create_session(SessionId::new(1));

        let both = [Arc::clone(&a), Arc::clone(&b)];
        run_statement(&services, &mut session, &both, &[&a, &b]);
        let err = services.commit(&mut session, true).unwrap_err();

        assert!(err.is_transaction_rollback());
        for stub in [&a_stub, &b_stub] {
            assert_eq!(stub.count("xa_commit"), 0);
            assert_eq!(stub.count("commit"), 0);
            assert_eq!(stub.count("xa_rollback"), 1);
        }
        assert!(session.transaction(true).is_empty());
        assert_eq!(services.stats().rolled_back.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_commit_failure_after_prepare_is_inconsistent() {
        let services = create_services();
        let (a_stub, a) = add_xa(&services, "a");
        let (b_stub, b) = add_xa(&services, "b");
        let mut session = services.create_session(SessionId::new(1));

        let both = [Arc::clone(&a), Arc::clone(&b)];
        run_statement(&services, &mut session, &both, &[&a, &b]);
        a_stub.set_commit_status(EngineStatus::Io);
        let err = services.commit(&mut session, true).unwrap_err();

        assert_eq!(
            err,
            TransactionError::CommitInconsistent {
                engines: vec!["a".to_string()]
            }
        );
        // The other participant is still committed.
        assert_eq!(b_stub.count("xa_commit"), 1);
        assert_eq!(services.stats().commit_failures.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_kill_before_prepare_rolls_back() {
        let services = create_services();
        let (a_stub, a) = add_xa(&services, "a");
        let (b_stub, b) = add_xa(&services, "b");
        let mut session = services.create_session(SessionId::new(1));

        let both = [Arc::clone(&a), Arc::clone(&b)];
        run_statement(&services, &mut session, &both, &[&a, &b]);
        session.kill_switch().kill();
        let err = services.commit(&mut session, true).unwrap_err();

        assert_eq!(err, TransactionError::Killed);
        for stub in [&a_stub, &b_stub] {
            assert_eq!(stub.count("xa_prepare"), 0);
            assert_eq!(stub.count("xa_rollback"), 1);
        }
    }

    #[test]
    fn test_engine_without_two_phase_commit_commits_in_one_phase() {
        let services = create_services();
        let (a_stub, a) = add_xa(&services, "a");
        let (p_stub, p) = add_plain(&services, "plain");
        let mut session = services.create_session(SessionId::new(1));

        let both = [Arc::clone(&a), Arc::clone(&p)];
        run_statement(&services, &mut session, &both, &[&a, &p]);
        assert!(session.transaction(true).no_2pc());
        services.commit(&mut session, true).unwrap();

        assert_eq!(a_stub.count("xa_prepare"), 0);
        assert_eq!(a_stub.count("commit"), 1);
        assert_eq!(p_stub.count("commit"), 1);
    }

    #[test]
    fn test_autocommit_statement_is_the_transaction() {
        let services = create_services();
        let (a_stub, a) = add_xa(&services, "a");
        let mut session = services.create_session(SessionId::new(1));

        services
            .start_statement(&mut session, &[Arc::clone(&a)], false)
            .unwrap();
        services.mark_modified(&mut session, &a).unwrap();
        assert!(!session.xid().is_null());
        services.autocommit_or_rollback(&mut session, true).unwrap();

        assert_eq!(
            a_stub.calls(),
            vec!["start_transaction", "start_statement", "commit_statement"]
        );
        assert!(session.xid().is_null());
        assert!(!session.in_transaction());
        assert_eq!(services.stats().committed.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_failed_statement_keeps_transaction() {
        let services = create_services();
        let (a_stub, a) = add_xa(&services, "a");
        let mut session = services.create_session(SessionId::new(1));
        let engines = [Arc::clone(&a)];

        run_statement(&services, &mut session, &engines, &[&a]);
        services.start_statement(&mut session, &engines, true).unwrap();
        services.mark_modified(&mut session, &a).unwrap();
        services.autocommit_or_rollback(&mut session, false).unwrap();

        assert_eq!(a_stub.count("rollback_statement"), 1);
        assert_eq!(a_stub.count("start_transaction"), 1);
        assert!(session.in_transaction());
        assert!(session
            .context(a.slot(), true)
            .is_some_and(|c| c.has_modified_data()));
    }

    #[test]
    fn test_rollback_request_rolls_back_transaction() {
        let services = create_services();
        let (a_stub, a) = add_xa(&services, "a");
        let mut session = services.create_session(SessionId::new(1));
        let engines = [Arc::clone(&a)];

        run_statement(&services, &mut session, &engines, &[&a]);
        services.start_statement(&mut session, &engines, true).unwrap();
        session.request_rollback();
        let err = services
            .autocommit_or_rollback(&mut session, false)
            .unwrap_err();

        assert!(err.is_transaction_rollback());
        assert_eq!(a_stub.count("rollback"), 1);
        assert!(!session.in_transaction());
        assert!(!session.is_rollback_requested());
    }

    #[test]
    fn test_savepoints() {
        let services = create_services();
        let (a_stub, a) = add_xa(&services, "a");
        let (b_stub, b) = add_xa(&services, "b");
        let mut session = services.create_session(SessionId::new(1));

        run_statement(&services, &mut session, &[Arc::clone(&a)], &[&a]);
        services.set_savepoint(&mut session, "sp1").unwrap();
        run_statement(&services, &mut session, &[Arc::clone(&b)], &[&b]);
        services.set_savepoint(&mut session, "sp2").unwrap();

        services.rollback_to_savepoint(&mut session, "SP1").unwrap();
        assert_eq!(a_stub.count("rollback_to_savepoint"), 1);
        assert_eq!(b_stub.count("rollback"), 1);
        assert_eq!(b_stub.count("rollback_to_savepoint"), 0);
        assert_eq!(session.transaction(true).len(), 1);
        assert!(!session.is_registered(&b, true));
        assert_eq!(session.savepoints().len(), 1);

        services.release_savepoint(&mut session, "sp1").unwrap();
        assert_eq!(a_stub.count("release_savepoint"), 1);
        assert!(session.savepoints().is_empty());
        assert!(matches!(
            services.rollback_to_savepoint(&mut session, "sp1"),
            Err(TransactionError::SavepointNotFound { .. })
        ));
        assert_eq!(services.stats().savepoints.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_commit_and_chain_and_release() {
        let services = create_services();
        let (_, a) = add_xa(&services, "a");
        let mut session = services.create_session(SessionId::new(1));

        services
            .begin(&mut session, StartOptions::consistent_snapshot())
            .unwrap();
        assert!(session.is_registered(&a, true));
        services
            .end_transaction(&mut session, Completion::CommitAndChain)
            .unwrap();
        assert!(session.is_explicit_transaction());
        assert!(session.start_options().with_consistent_snapshot);

        services
            .end_transaction(&mut session, Completion::RollbackRelease)
            .unwrap();
        assert!(!session.is_explicit_transaction());
        assert!(session.is_killed());
    }

    #[test]
    fn test_release_latches_and_close() {
        let services = create_services();
        let (a_stub, a) = add_xa(&services, "a");
        let mut session = services.create_session(SessionId::new(1));

        run_statement(&services, &mut session, &[Arc::clone(&a)], &[&a]);
        services.release_temporary_latches(&session);
        services.close_session(&mut session).unwrap();

        assert_eq!(a_stub.count("release_latches"), 1);
        assert_eq!(a_stub.count("rollback"), 1);
        assert_eq!(a_stub.count("close"), 1);
        assert!(!session.in_transaction());
    }
}
