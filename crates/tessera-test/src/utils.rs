//! Harness helpers shared by the scenario tests.

use std::sync::{Arc, Once};

use tracing_subscriber::EnvFilter;

use tessera_common::config::KernelConfig;
use tessera_common::SessionId;
use tessera_txn::{EngineCapabilities, EngineHandle, Session, TransactionServices, TxnResult};

use crate::engine::{CallLog, RecordingEngine};

static TRACING: Once = Once::new();

/// Installs a test-friendly subscriber once per process.
///
/// The filter comes from `RUST_LOG`, defaulting to warnings from the
/// tessera crates.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("tessera_txn=warn,tessera_cache=warn,tessera_field=warn")
        });
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .try_init();
    });
}

/// Transaction services plus a call log shared by every engine added
/// through the harness.
pub struct Harness {
    /// The coordinator under test.
    pub services: TransactionServices,
    /// Log of every engine call.
    pub log: CallLog,
}

impl Harness {
    /// Creates a harness with the test configuration.
    pub fn new() -> Self {
        Self::with_config(KernelConfig::for_testing())
    }

    /// Creates a harness with `config`.
    pub fn with_config(config: KernelConfig) -> Self {
        init_tracing();
        Self {
            services: TransactionServices::new(config),
            log: CallLog::new(),
        }
    }

    /// Registers an engine with two-phase commit.
    ///
    /// # Errors
    ///
    /// Fails if the registry rejects the engine.
    pub fn add_xa(&self, name: &str) -> TxnResult<(Arc<RecordingEngine>, Arc<EngineHandle>)> {
        let engine = RecordingEngine::new(name, &self.log);
        let handle = self
            .services
            .engines()
            .add(name, EngineCapabilities::xa(Arc::clone(&engine)))?;
        Ok((engine, handle))
    }

    /// Registers a transactional engine without two-phase commit.
    ///
    /// # Errors
    ///
    /// Fails if the registry rejects the engine.
    pub fn add_one_phase(
        &self,
        name: &str,
    ) -> TxnResult<(Arc<RecordingEngine>, Arc<EngineHandle>)> {
        let engine = RecordingEngine::new(name, &self.log);
        let handle = self
            .services
            .engines()
            .add(name, EngineCapabilities::transactional(Arc::clone(&engine) as _))?;
        Ok((engine, handle))
    }

    /// Opens a session.
    pub fn session(&self, id: u64) -> Session {
        self.services.create_session(SessionId::new(id))
    }

    /// Runs one statement: registers `touched`, flags `writes` as having
    /// modified data, then ends the statement as `statement_ok` says.
    ///
    /// # Errors
    ///
    /// Returns the first coordinator error.
    pub fn run_statement(
        &self,
        session: &mut Session,
        touched: &[Arc<EngineHandle>],
        writes: &[&Arc<EngineHandle>],
        statement_ok: bool,
    ) -> TxnResult<()> {
        let normal = session.uses_normal_transaction();
        self.services.start_statement(session, touched, normal)?;
        for engine in writes {
            self.services.mark_modified(session, engine)?;
        }
        self.services.autocommit_or_rollback(session, statement_ok)
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}
