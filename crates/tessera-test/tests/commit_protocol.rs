//! End-to-end commit protocol tests.
//!
//! Each test drives the coordinator the way a session would: statements
//! register the engines they touch, flag the ones they write, and end
//! with an autocommit or an explicit `COMMIT`/`ROLLBACK`. Every engine
//! logs into one shared call log so ordering across engines can be
//! checked.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use tessera_test::Harness;
use tessera_txn::{Completion, EngineStatus, StartOptions, TransactionError};

/// Read-only participants are never asked to commit.
#[test]
fn test_autocommit_skips_read_only_engine() {
    let h = Harness::new();
    let (_, a) = h.add_xa("a").unwrap();
    let (_, b) = h.add_xa("b").unwrap();
    let mut session = h.session(1);

    h.run_statement(&mut session, &[Arc::clone(&a), Arc::clone(&b)], &[&a], true)
        .unwrap();

    assert_eq!(
        h.log.ops("a"),
        vec!["start_transaction", "start_statement", "end_statement", "commit_statement"]
    );
    assert_eq!(
        h.log.ops("b"),
        vec!["start_transaction", "start_statement", "end_statement"]
    );
    assert_eq!(h.log.first("xa_prepare"), None);

    let stats = h.services.stats();
    assert_eq!(stats.committed.load(Ordering::Relaxed), 1);
    assert_eq!(stats.one_phase_commits.load(Ordering::Relaxed), 1);
    assert!(session.transaction(false).is_empty());
    assert!(session.xid().is_null());
}

/// Every participant prepares before any participant commits.
#[test]
fn test_two_phase_commit_ordering() {
    let h = Harness::new();
    let (a_engine, a) = h.add_xa("a").unwrap();
    let (b_engine, b) = h.add_xa("b").unwrap();
    let mut session = h.session(1);

    h.services.begin(&mut session, StartOptions::default()).unwrap();
    h.run_statement(&mut session, &[Arc::clone(&a)], &[&a], true).unwrap();
    h.run_statement(&mut session, &[Arc::clone(&b)], &[&b], true).unwrap();
    assert!(session.in_transaction());
    assert_eq!(session.transaction(true).len(), 2);

    h.services
        .end_transaction(&mut session, Completion::Commit)
        .unwrap();

    let last_prepare = h.log.last("xa_prepare").unwrap();
    let first_commit = h.log.first("xa_commit").unwrap();
    assert!(last_prepare < first_commit, "log: {:?}", h.log);
    assert_eq!(h.log.count("a", "xa_prepare"), 1);
    assert_eq!(h.log.count("b", "xa_commit"), 1);
    assert!(a_engine.prepared().is_empty());
    assert!(b_engine.prepared().is_empty());

    let stats = h.services.stats();
    assert_eq!(stats.two_phase_commits.load(Ordering::Relaxed), 1);
    assert_eq!(stats.prepares.load(Ordering::Relaxed), 2);
    assert!(!session.in_transaction());
    assert!(!session.is_explicit_transaction());
}

/// A prepare veto rolls back every participant and commits none.
#[test]
fn test_prepare_veto_rolls_back_all() {
    let h = Harness::new();
    let (a_engine, a) = h.add_xa("a").unwrap();
    let (b_engine, b) = h.add_xa("b").unwrap();
    b_engine.fail_prepare(EngineStatus::Deadlock);
    let mut session = h.session(1);

    h.services.begin(&mut session, StartOptions::default()).unwrap();
    h.run_statement(&mut session, &[Arc::clone(&a), Arc::clone(&b)], &[&a, &b], true)
        .unwrap();

    let err = h
        .services
        .end_transaction(&mut session, Completion::Commit)
        .unwrap_err();
    assert!(matches!(err, TransactionError::RolledBack { .. }));
    assert!(err.is_transaction_rollback());

    assert_eq!(h.log.first("xa_commit"), None);
    assert_eq!(h.log.first("commit"), None);
    assert_eq!(h.log.count("a", "xa_rollback"), 1);
    assert_eq!(h.log.count("b", "xa_rollback"), 1);
    assert!(a_engine.prepared().is_empty());
    assert!(!session.in_transaction());
    assert_eq!(h.services.stats().rolled_back.load(Ordering::Relaxed), 1);
}

#[test]
fn test_kill_before_prepare() {
    let h = Harness::new();
    let (_, a) = h.add_xa("a").unwrap();
    let (_, b) = h.add_xa("b").unwrap();
    let mut session = h.session(1);

    h.services.begin(&mut session, StartOptions::default()).unwrap();
    h.run_statement(&mut session, &[Arc::clone(&a), Arc::clone(&b)], &[&a, &b], true)
        .unwrap();

    let switch = session.kill_switch();
    std::thread::spawn(move || switch.kill()).join().unwrap();

    let err = h
        .services
        .end_transaction(&mut session, Completion::Commit)
        .unwrap_err();
    assert_eq!(err, TransactionError::Killed);
    assert_eq!(h.log.first("xa_prepare"), None);
    assert_eq!(h.log.count("a", "xa_rollback"), 1);
    assert_eq!(h.log.count("b", "xa_rollback"), 1);
}

/// A commit failure after a successful prepare is reported, but the
/// remaining participants still commit.
#[test]
fn test_commit_failure_after_prepare() {
    let h = Harness::new();
    let (_, a) = h.add_xa("a").unwrap();
    let (b_engine, b) = h.add_xa("b").unwrap();
    let (_, c) = h.add_xa("c").unwrap();
    let mut session = h.session(1);

    h.services.begin(&mut session, StartOptions::default()).unwrap();
    let all = [Arc::clone(&a), Arc::clone(&b), Arc::clone(&c)];
    h.run_statement(&mut session, &all, &[&a, &b, &c], true).unwrap();
    b_engine.fail_commit(EngineStatus::Io);

    let err = h
        .services
        .end_transaction(&mut session, Completion::Commit)
        .unwrap_err();
    assert_eq!(
        err,
        TransactionError::CommitInconsistent {
            engines: vec!["b".to_string()]
        }
    );
    assert_eq!(h.log.count("a", "xa_commit"), 1);
    assert_eq!(h.log.count("c", "xa_commit"), 1);
    assert_eq!(h.services.stats().commit_failures.load(Ordering::Relaxed), 1);
    assert!(!session.in_transaction());
}

/// An engine without two-phase commit forces a one-phase commit.
#[test]
fn test_mixed_engines_commit_in_one_phase() {
    let h = Harness::new();
    let (_, a) = h.add_xa("a").unwrap();
    let (_, heap) = h.add_one_phase("heap").unwrap();
    let mut session = h.session(1);
    session.set_autocommit(false);

    h.run_statement(
        &mut session,
        &[Arc::clone(&a), Arc::clone(&heap)],
        &[&a, &heap],
        true,
    )
    .unwrap();
    assert!(session.transaction(true).no_2pc());

    h.services.commit(&mut session, true).unwrap();
    assert_eq!(h.log.first("xa_prepare"), None);
    assert_eq!(h.log.count("a", "commit"), 1);
    assert_eq!(h.log.count("heap", "commit"), 1);
}

/// A failed statement is undone without ending the transaction.
#[test]
fn test_failed_statement_keeps_transaction() {
    let h = Harness::new();
    let (_, a) = h.add_xa("a").unwrap();
    let (_, b) = h.add_xa("b").unwrap();
    let mut session = h.session(1);

    h.services.begin(&mut session, StartOptions::default()).unwrap();
    h.run_statement(&mut session, &[Arc::clone(&a)], &[&a], true).unwrap();
    h.run_statement(&mut session, &[Arc::clone(&b)], &[&b], false).unwrap();

    assert_eq!(h.log.count("b", "rollback_statement"), 1);
    assert!(session.in_transaction());

    h.services
        .end_transaction(&mut session, Completion::Commit)
        .unwrap();
    assert_eq!(h.log.count("a", "commit"), 1);
    assert_eq!(h.log.count("b", "commit"), 0);
    assert_eq!(h.log.first("xa_prepare"), None);
}

/// An engine picking the session as a deadlock victim rolls back the
/// whole transaction at the end of the statement.
#[test]
fn test_deadlock_victim_rolls_back_transaction() {
    let h = Harness::new();
    let (a_engine, a) = h.add_xa("a").unwrap();
    let mut session = h.session(1);

    h.services.begin(&mut session, StartOptions::default()).unwrap();
    h.run_statement(&mut session, &[Arc::clone(&a)], &[&a], true).unwrap();

    a_engine.choose_victim();
    let err = h
        .run_statement(&mut session, &[Arc::clone(&a)], &[&a], true)
        .unwrap_err();
    assert!(matches!(err, TransactionError::RolledBack { .. }));
    assert_eq!(h.log.count("a", "rollback"), 1);
    assert!(!session.in_transaction());
    assert!(!session.is_rollback_requested());
}

#[test]
fn test_savepoint_drops_later_engines() {
    let h = Harness::new();
    let (_, a) = h.add_xa("a").unwrap();
    let (_, b) = h.add_xa("b").unwrap();
    let mut session = h.session(1);

    h.services.begin(&mut session, StartOptions::default()).unwrap();
    h.run_statement(&mut session, &[Arc::clone(&a)], &[&a], true).unwrap();
    h.services.set_savepoint(&mut session, "sp1").unwrap();
    h.run_statement(&mut session, &[Arc::clone(&b)], &[&b], true).unwrap();

    h.services.rollback_to_savepoint(&mut session, "SP1").unwrap();
    assert_eq!(h.log.count("a", "rollback_to_savepoint"), 1);
    assert_eq!(h.log.count("b", "rollback"), 1);
    assert_eq!(session.transaction(true).len(), 1);
    assert_eq!(session.savepoints().len(), 1);

    h.services
        .end_transaction(&mut session, Completion::Commit)
        .unwrap();
    assert_eq!(h.log.count("a", "commit"), 1);
    assert!(session.savepoints().is_empty());

    let err = h
        .services
        .rollback_to_savepoint(&mut session, "sp1")
        .unwrap_err();
    assert!(matches!(err, TransactionError::SavepointNotFound { .. }));
}

#[test]
fn test_consistent_snapshot_starts_every_engine() {
    let h = Harness::new();
    h.add_xa("a").unwrap();
    h.add_one_phase("heap").unwrap();
    let mut session = h.session(1);

    h.services
        .begin(&mut session, StartOptions::consistent_snapshot())
        .unwrap();
    assert_eq!(h.log.ops("a"), vec!["start_snapshot"]);
    assert_eq!(h.log.ops("heap"), vec!["start_snapshot"]);
    assert_eq!(session.transaction(true).len(), 2);

    h.services
        .end_transaction(&mut session, Completion::Rollback)
        .unwrap();
    // Nothing was modified, so no engine is asked to roll back.
    assert_eq!(h.log.first("rollback"), None);
    assert!(!session.in_transaction());
}

#[test]
fn test_start_failure_reports_worst_status() {
    let h = Harness::new();
    let (_, a) = h.add_xa("a").unwrap();
    let (b_engine, b) = h.add_xa("b").unwrap();
    b_engine.fail_start(EngineStatus::OutOfResources);
    let mut session = h.session(1);

    let err = h
        .services
        .start_statement(&mut session, &[Arc::clone(&a), Arc::clone(&b)], false)
        .unwrap_err();
    assert!(matches!(
        err,
        TransactionError::EngineFailed {
            status: EngineStatus::OutOfResources,
            ..
        }
    ));
    assert!(session.is_registered(&a, false));
    assert!(!session.is_registered(&b, false));

    h.services.autocommit_or_rollback(&mut session, false).unwrap();
    assert!(session.transaction(false).is_empty());
}

#[test]
fn test_close_session_rolls_back_open_work() {
    let h = Harness::new();
    let (_, a) = h.add_xa("a").unwrap();
    h.add_one_phase("heap").unwrap();
    let mut session = h.session(1);

    h.services.begin(&mut session, StartOptions::default()).unwrap();
    h.run_statement(&mut session, &[Arc::clone(&a)], &[&a], true).unwrap();

    h.services.release_temporary_latches(&session);
    h.services.close_session(&mut session).unwrap();

    assert_eq!(h.log.count("a", "rollback"), 1);
    assert_eq!(h.log.count("a", "release_latches"), 1);
    assert_eq!(h.log.count("a", "close"), 1);
    assert_eq!(h.log.count("heap", "close"), 1);
    assert!(!session.in_transaction());
}
