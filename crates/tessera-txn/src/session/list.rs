//! Transaction participant lists and savepoints.

use std::sync::Arc;

use crate::engine::EngineHandle;

/// Engines registered in one of a session's two transactions, in
/// registration order.
#[derive(Debug, Clone, Default)]
pub struct TransactionList {
    participants: Vec<Arc<EngineHandle>>,
    no_2pc: bool,
}

impl TransactionList {
    /// Returns the participants in registration order.
    pub fn participants(&self) -> &[Arc<EngineHandle>] {
        &self.participants
    }

    /// Returns true if some participant cannot take part in a prepare
    /// round.
    pub fn no_2pc(&self) -> bool {
        self.no_2pc
    }

    /// Returns the number of participants.
    pub fn len(&self) -> usize {
        self.participants.len()
    }

    /// Returns true if no engine is registered.
    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    pub(crate) fn push(&mut self, engine: Arc<EngineHandle>) {
        self.no_2pc |= !engine.has_two_phase_commit();
        self.participants.push(engine);
    }

    /// Drops the participants registered after the first `len` and
    /// recomputes the 2PC flag.
    pub(crate) fn truncate(&mut self, len: usize) -> Vec<Arc<EngineHandle>> {
        let dropped = self.participants.split_off(len.min(self.participants.len()));
        self.no_2pc = self.participants.iter().any(|e| !e.has_two_phase_commit());
        dropped
    }

    pub(crate) fn clear(&mut self) {
        self.participants.clear();
        self.no_2pc = false;
    }
}

/// A named point inside the normal transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Savepoint {
    name: String,
    participants: usize,
}

impl Savepoint {
    pub(crate) fn new(name: &str, participants: usize) -> Self {
        Self {
            name: name.to_string(),
            participants,
        }
    }

    /// Returns the savepoint name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns how many engines were registered in the normal transaction
    /// when the savepoint was set.
    pub fn participants(&self) -> usize {
        self.participants
    }

    /// Savepoint names compare case-insensitively.
    pub(crate) fn is_named(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}
