//! Crash recovery of prepared transactions.

use std::collections::HashSet;

use tracing::{error, info, warn};

use tessera_common::config::HeuristicRecover;
use tessera_common::{QueryId, Xid};

use super::TransactionServices;
use crate::engine::{EngineHandle, XaResourceManager};
use crate::error::{TransactionError, TxnResult};

/// Outcome of [`TransactionServices::recover`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Local transactions committed.
    pub committed: Vec<Xid>,
    /// Local transactions rolled back.
    pub rolled_back: Vec<Xid>,
    /// Foreign transactions left prepared for their coordinator.
    pub foreign: Vec<Xid>,
    /// Local transactions found without a decision (dry run).
    pub pending: Vec<Xid>,
    /// Local transactions an engine failed to resolve.
    pub failed: Vec<Xid>,
}

impl RecoveryReport {
    /// Returns true if nothing needed recovery.
    pub fn is_empty(&self) -> bool {
        self.committed.is_empty()
            && self.rolled_back.is_empty()
            && self.foreign.is_empty()
            && self.pending.is_empty()
            && self.failed.is_empty()
    }
}

/// How local prepared transactions are resolved.
enum Decision<'a> {
    CommitLog(&'a HashSet<QueryId>),
    Heuristic(bool),
    DryRun,
}

fn push_unique(list: &mut Vec<Xid>, xid: &Xid) {
    if !list.contains(xid) {
        list.push(xid.clone());
    }
}

impl TransactionServices {
    /// Resolves transactions left prepared by a crash.
    ///
    /// Each XA resource manager is asked for prepared XIDs in batches of
    /// the configured size. Local XIDs commit if their transaction id is in
    /// `commit_log` and roll back otherwise. Without a commit log the
    /// configured heuristic decides; without either, nothing is resolved
    /// and finding a local XID is an error. Foreign XIDs are recorded as
    /// prepared in the XID cache for `XA COMMIT` or `XA ROLLBACK`.
    ///
    /// # Errors
    ///
    /// Returns `RecoveryRequired` if a dry run found local prepared
    /// transactions.
    pub fn recover(&self, commit_log: Option<&HashSet<QueryId>>) -> TxnResult<RecoveryReport> {
        let heuristic = self.config.xa.heuristic_recover;
        let decision = match (commit_log, heuristic) {
            (Some(log), HeuristicRecover::None) => Decision::CommitLog(log),
            (Some(log), _) => {
                warn!(?heuristic, "commit log available; ignoring heuristic recovery setting");
                Decision::CommitLog(log)
            }
            (None, HeuristicRecover::Commit) => Decision::Heuristic(true),
            (None, HeuristicRecover::Rollback) => Decision::Heuristic(false),
            (None, HeuristicRecover::None) => Decision::DryRun,
        };

        let mut report = RecoveryReport::default();
        if self.engines.xa_capable_count() == 0 {
            return Ok(report);
        }

        let batch = self.config.xa.effective_batch_size();
        info!(batch, "starting recovery of prepared transactions");

        for engine in self.engines.xa_engines() {
            let Some(xa) = engine.xa() else {
                continue;
            };
            let mut seen = HashSet::new();
            loop {
                let xids = xa.do_xa_recover(batch);
                let got = xids.len();
                let mut fresh = 0;
                for xid in xids {
                    if !seen.insert(xid.clone()) {
                        continue;
                    }
                    fresh += 1;
                    self.resolve_recovered(&engine, xa.as_ref(), xid, &decision, &mut report);
                }
                // Unresolved XIDs come back on every call.
                if got < batch || fresh == 0 {
                    break;
                }
            }
        }

        if !report.foreign.is_empty() {
            warn!(
                count = report.foreign.len(),
                "prepared XA transactions left for their coordinator"
            );
        }
        if matches!(decision, Decision::DryRun) && !report.pending.is_empty() {
            error!(
                count = report.pending.len(),
                "found prepared transactions; restart with a commit log or heuristic_recover"
            );
            return Err(TransactionError::RecoveryRequired {
                count: report.pending.len(),
            });
        }
        info!(
            committed = report.committed.len(),
            rolled_back = report.rolled_back.len(),
            failed = report.failed.len(),
            "recovery finished"
        );
        Ok(report)
    }

    fn resolve_recovered(
        &self,
        engine: &EngineHandle,
        xa: &dyn XaResourceManager,
        xid: Xid,
        decision: &Decision<'_>,
        report: &mut RecoveryReport,
    ) {
        let Some(trx_id) = xid.local_trx_id() else {
            if self.xid_cache.insert_prepared(xid.clone()).is_ok() {
                info!(engine = engine.name(), xid = %xid, "foreign prepared transaction found");
            }
            push_unique(&mut report.foreign, &xid);
            return;
        };

        let commit = match decision {
            Decision::DryRun => {
                push_unique(&mut report.pending, &xid);
                return;
            }
            Decision::CommitLog(log) => log.contains(&trx_id),
            Decision::Heuristic(commit) => *commit,
        };

        let status = if commit {
            xa.do_xa_commit_xid(&xid)
        } else {
            xa.do_xa_rollback_xid(&xid)
        };
        if !status.is_ok() {
            error!(
                engine = engine.name(),
                xid = %xid,
                %status,
                commit,
                "failed to resolve prepared transaction"
            );
            push_unique(&mut report.failed, &xid);
            return;
        }
        info!(
            engine = engine.name(),
            xid = %xid,
            "{} prepared transaction",
            if commit { "committed" } else { "rolled back" }
        );
        if commit {
            push_unique(&mut report.committed, &xid);
        } else {
            push_unique(&mut report.rolled_back, &xid);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineCapabilities;
    use crate::testing::StubEngine;
    use std::sync::Arc;
    use tessera_common::config::KernelConfig;
    use tessera_common::ServerId;

    fn setup(heuristic: HeuristicRecover) -> (TransactionServices, Arc<StubEngine>) {
        let config = KernelConfig::builder()
            .max_engines(4)
            .heuristic_recover(heuristic)
            .build();
        let services = TransactionServices::new(config);
        let stub = StubEngine::new();
        services
            .engines()
            .add("heap", EngineCapabilities::xa(Arc::clone(&stub)))
            .unwrap();
        (services, stub)
    }

    fn local(trx: u64) -> Xid {
        Xid::from_local(ServerId::new(1), QueryId::new(trx))
    }

    #[test]
    fn test_commit_log_decides() {
        let (services, stub) = setup(HeuristicRecover::None);
        stub.add_prepared(local(10));
        stub.add_prepared(local(11));
        let foreign = Xid::new(7, b"remote", b"b").unwrap();
        stub.add_prepared(foreign.clone());

        let log: HashSet<QueryId> = [QueryId::new(10)].into_iter().collect();
        let report = services.recover(Some(&log)).unwrap();

        assert_eq!(report.committed, vec![local(10)]);
        assert_eq!(report.rolled_back, vec![local(11)]);
        assert_eq!(report.foreign, vec![foreign.clone()]);
        assert_eq!(services.prepared_xids(), vec![foreign]);
    }

    #[test]
    fn test_dry_run_with_local_xids_fails() {
        let (services, stub) = setup(HeuristicRecover::None);
        stub.add_prepared(local(3));
        let err = services.recover(None).unwrap_err();
        assert_eq!(err, TransactionError::RecoveryRequired { count: 1 });
        assert_eq!(stub.count("commit_xid") + stub.count("rollback_xid"), 0);
    }

    #[test]
    fn test_heuristic_rollback() {
        let (services, stub) = setup(HeuristicRecover::Rollback);
        stub.add_prepared(local(3));
        let report = services.recover(None).unwrap();
        assert_eq!(report.rolled_back, vec![local(3)]);
        assert_eq!(stub.count("rollback_xid"), 1);
    }

    #[test]
    fn test_nothing_to_recover() {
        let (services, _) = setup(HeuristicRecover::None);
        assert!(services.recover(None).unwrap().is_empty());
    }
}
