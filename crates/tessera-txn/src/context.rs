//! Per-session, per-engine participation state.

use std::sync::Arc;

use crate::engine::EngineHandle;

/// Where a [`ResourceContext`] is in its transaction lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    /// The engine has not been touched in this transaction.
    Unregistered,
    /// The engine is registered and has only read.
    RegisteredClean,
    /// The engine is registered and has outstanding changes.
    RegisteredModified,
}

/// Tracks whether one engine takes part in one of a session's
/// transactions, and whether it has modified data.
///
/// ```text
/// Unregistered ──register──▶ RegisteredClean ──mark_modified_data──▶ RegisteredModified
///      ▲                                                                    │
///      └───────────────────────────── reset ───────────────────────────────┘
/// ```
#[derive(Debug, Clone, Default)]
pub struct ResourceContext {
    engine: Option<Arc<EngineHandle>>,
    modified_data: bool,
}

impl ResourceContext {
    /// Creates an unregistered context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `engine`, moving the context to `RegisteredClean`.
    pub fn register(&mut self, engine: Arc<EngineHandle>) {
        self.engine = Some(engine);
        self.modified_data = false;
    }

    /// Returns true once the engine is registered.
    #[inline]
    pub fn is_started(&self) -> bool {
        self.engine.is_some()
    }

    /// Flags outstanding changes. Idempotent.
    #[inline]
    pub fn mark_modified_data(&mut self) {
        debug_assert!(self.is_started());
        self.modified_data = true;
    }

    /// Returns true if the engine has outstanding changes.
    #[inline]
    pub fn has_modified_data(&self) -> bool {
        self.modified_data
    }

    /// Folds a statement context into this transaction context. Never
    /// clears the modified flag.
    pub fn coalesce_with(&mut self, statement: &ResourceContext) {
        if statement.modified_data {
            self.mark_modified_data();
        }
    }

    /// Returns the context to `Unregistered`.
    pub fn reset(&mut self) {
        self.engine = None;
        self.modified_data = false;
    }

    /// Returns the registered engine.
    pub fn engine(&self) -> Option<&Arc<EngineHandle>> {
        self.engine.as_ref()
    }

    /// Returns the current state.
    pub fn state(&self) -> ContextState {
        match (self.is_started(), self.modified_data) {
            (false, _) => ContextState::Unregistered,
            (true, false) => ContextState::RegisteredClean,
            (true, true) => ContextState::RegisteredModified,
        }
    }
}
