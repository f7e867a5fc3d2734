//! XA commands for externally coordinated transactions.

use tracing::{debug, info, warn};

use tessera_cache::CacheError;
use tessera_common::{XaState, Xid, XidState};

use super::TransactionServices;
use crate::engine::StartOptions;
use crate::error::{TransactionError, TxnResult};
use crate::session::Session;
use crate::stats::TransactionStats;

impl TransactionServices {
    /// `XA START`: opens a branch owned by `session`.
    ///
    /// # Errors
    ///
    /// `XaInvalidState` if the session already has a branch or a normal
    /// transaction, `XaDuplicate` if the XID is in use.
    pub fn xa_start(&self, session: &mut Session, xid: &Xid) -> TxnResult<()> {
        if session.xa_state() != XaState::NotInTransaction || session.in_transaction() {
            return Err(TransactionError::XaInvalidState {
                command: "START",
                state: session.xa_state(),
            });
        }
        self.xid_cache
            .insert(XidState::new(xid.clone(), XaState::Active))
            .map_err(|e| match e {
                CacheError::AlreadyExists { .. } => TransactionError::XaDuplicate {
                    xid: xid.to_string(),
                },
                other => other.into(),
            })?;
        *session.xid_state_mut() = XidState::new(xid.clone(), XaState::Active);
        session.begin_explicit(StartOptions::default());
        debug!(session = %session.id(), xid = %xid, "XA branch started");
        Ok(())
    }

    /// `XA END`: the branch stops accepting work.
    ///
    /// # Errors
    ///
    /// `XaNotFound` for a foreign XID, `XaInvalidState` unless active.
    pub fn xa_end(&self, session: &mut Session, xid: &Xid) -> TxnResult<()> {
        self.check_branch(session, xid, "END", XaState::Active)?;
        self.set_branch_state(session, XaState::Idle)
    }

    /// `XA PREPARE`: every participant with modified data votes.
    ///
    /// A veto rolls the branch back and removes it.
    ///
    /// # Errors
    ///
    /// `XaRollback` on a veto or kill, `XaNotFound` or `XaInvalidState`
    /// for a wrong branch.
    pub fn xa_prepare(&self, session: &mut Session, xid: &Xid) -> TxnResult<()> {
        self.check_branch(session, xid, "PREPARE", XaState::Idle)?;

        if session.transaction(true).no_2pc() {
            warn!(
                session = %session.id(),
                xid = %xid,
                "branch includes engines without two-phase commit; they commit in one phase"
            );
        }

        let modified = self.check_and_coalesce(session, true)?;
        if let Some(veto) = self.prepare_round(session, true, &modified) {
            let rolled_back = self.rollback_participants(session, true, true);
            self.end_branch(session, xid);
            rolled_back?;
            return Err(TransactionError::XaRollback {
                xid: xid.to_string(),
                reason: veto.to_string(),
            });
        }

        self.set_branch_state(session, XaState::Prepared)?;
        info!(session = %session.id(), xid = %xid, "XA branch prepared");
        Ok(())
    }

    /// `XA COMMIT`.
    ///
    /// With `one_phase` the idle branch commits directly (running a prepare
    /// round if it spans several engines). Otherwise the branch must be
    /// prepared. A prepared branch whose session is gone is committed by
    /// XID.
    ///
    /// # Errors
    ///
    /// `XaNotFound`, `XaInvalidState`, `XaRollback` if a one-phase commit
    /// was vetoed, or the commit error.
    pub fn xa_commit(&self, session: &mut Session, xid: &Xid, one_phase: bool) -> TxnResult<()> {
        if !self.owns_branch(session, xid) {
            return self.resolve_detached(xid, true, "COMMIT");
        }

        let result = match (session.xa_state(), one_phase) {
            (XaState::Idle, true) => self.commit(session, true).map_err(|e| match e {
                TransactionError::RolledBack { reason } => TransactionError::XaRollback {
                    xid: xid.to_string(),
                    reason,
                },
                other => other,
            }),
            (XaState::Prepared, false) => self.commit_participants(session, true, true),
            (state, _) => {
                return Err(TransactionError::XaInvalidState {
                    command: "COMMIT",
                    state,
                })
            }
        };
        self.end_branch(session, xid);
        result
    }

    /// `XA ROLLBACK` of an idle or prepared branch, or of a prepared
    /// branch whose session is gone.
    ///
    /// # Errors
    ///
    /// `XaNotFound`, `XaInvalidState`, or the rollback error.
    pub fn xa_rollback(&self, session: &mut Session, xid: &Xid) -> TxnResult<()> {
        if !self.owns_branch(session, xid) {
            return self.resolve_detached(xid, false, "ROLLBACK");
        }
        match session.xa_state() {
            XaState::Idle | XaState::Prepared => {
                let result = self.rollback_participants(session, true, true);
                self.end_branch(session, xid);
                result
            }
            state => Err(TransactionError::XaInvalidState {
                command: "ROLLBACK",
                state,
            }),
        }
    }

    /// `XA RECOVER`: lists prepared branches.
    pub fn prepared_xids(&self) -> Vec<Xid> {
        self.xid_cache.prepared()
    }

    /// Commits or rolls back a prepared transaction by XID in every XA
    /// resource manager.
    ///
    /// # Errors
    ///
    /// `XaNotFound` if no engine knew the XID.
    pub fn commit_or_rollback_by_xid(&self, xid: &Xid, commit: bool) -> TxnResult<()> {
        let mut resolved = false;
        for engine in self.engines.xa_engines() {
            let Some(xa) = engine.xa() else {
                continue;
            };
            let status = if commit {
                xa.do_xa_commit_xid(xid)
            } else {
                xa.do_xa_rollback_xid(xid)
            };
            if status.is_ok() {
                resolved = true;
            } else {
                debug!(engine = engine.name(), xid = %xid, %status, "engine did not resolve XID");
            }
        }
        self.xid_cache.delete(xid);

        if !resolved {
            return Err(TransactionError::XaNotFound {
                xid: xid.to_string(),
            });
        }
        info!(xid = %xid, commit, "prepared transaction resolved");
        if commit {
            TransactionStats::bump(&self.stats.committed);
        } else {
            TransactionStats::bump(&self.stats.rolled_back);
        }
        Ok(())
    }

    fn owns_branch(&self, session: &Session, xid: &Xid) -> bool {
        session.xa_state() != XaState::NotInTransaction && session.xid() == xid
    }

    fn check_branch(
        &self,
        session: &Session,
        xid: &Xid,
        command: &'static str,
        expected: XaState,
    ) -> TxnResult<()> {
        if !self.owns_branch(session, xid) {
            return Err(TransactionError::XaNotFound {
                xid: xid.to_string(),
            });
        }
        if session.xa_state() != expected {
            return Err(TransactionError::XaInvalidState {
                command,
                state: session.xa_state(),
            });
        }
        Ok(())
    }

    fn set_branch_state(&self, session: &mut Session, state: XaState) -> TxnResult<()> {
        let xid = session.xid().clone();
        self.xid_cache.set_state(&xid, state)?;
        session.xid_state_mut().xa_state = state;
        Ok(())
    }

    /// Drops a finished branch from the session and the cache.
    fn end_branch(&self, session: &mut Session, xid: &Xid) {
        self.xid_cache.delete(xid);
        *session.xid_state_mut() = XidState::default();
        session.end_normal_transaction();
    }

    /// Resolves a prepared branch left behind by another session.
    fn resolve_detached(&self, xid: &Xid, commit: bool, command: &'static str) -> TxnResult<()> {
        match self.xid_cache.search(xid) {
            Some(state) if state.xa_state == XaState::Prepared && !state.in_session => {
                self.commit_or_rollback_by_xid(xid, commit)
            }
            Some(state) => Err(TransactionError::XaInvalidState {
                command,
                state: state.xa_state,
            }),
            None => Err(TransactionError::XaNotFound {
                xid: xid.to_string(),
            }),
        }
    }
}
