//! Process-wide list of storage engines.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use tessera_common::EngineSlot;

use super::{EngineCapabilities, EngineHandle};
use crate::error::{TransactionError, TxnResult};

/// Registered storage engines, in slot order.
///
/// Slots are dense and never reused, so a slot doubles as the index of the
/// engine's resource contexts in every session.
#[derive(Debug)]
pub struct EngineRegistry {
    engines: RwLock<Vec<Arc<EngineHandle>>>,
    max_engines: usize,
}

impl EngineRegistry {
    /// Creates an empty registry with `max_engines` slots.
    pub fn new(max_engines: usize) -> Self {
        Self {
            engines: RwLock::new(Vec::with_capacity(max_engines)),
            max_engines,
        }
    }

    /// Registers an engine and assigns it the next slot.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateEngine` if the name is taken (names compare
    /// case-insensitively) and `TooManyEngines` if every slot is used.
    pub fn add(
        &self,
        name: &str,
        capabilities: EngineCapabilities,
    ) -> TxnResult<Arc<EngineHandle>> {
        let mut engines = self.engines.write();
        if engines.iter().any(|e| e.name().eq_ignore_ascii_case(name)) {
            return Err(TransactionError::DuplicateEngine {
                name: name.to_string(),
            });
        }
        if engines.len() >= self.max_engines {
            return Err(TransactionError::TooManyEngines {
                max: self.max_engines,
            });
        }
        let slot = u32::try_from(engines.len()).map_err(|_| TransactionError::TooManyEngines {
            max: self.max_engines,
        })?;
        let handle = Arc::new(EngineHandle::new(
            name.to_string(),
            EngineSlot::new(slot),
            capabilities,
        ));
        engines.push(Arc::clone(&handle));
        info!(
            engine = name,
            slot,
            transactional = handle.participates_in_sql_transaction(),
            xa = handle.participates_in_xa_transaction(),
            "storage engine registered"
        );
        Ok(handle)
    }

    /// Looks up an engine by name.
    pub fn find(&self, name: &str) -> Option<Arc<EngineHandle>> {
        self.engines
            .read()
            .iter()
            .find(|e| e.name().eq_ignore_ascii_case(name))
            .cloned()
    }

    /// Looks up an engine by name.
    ///
    /// # Errors
    ///
    /// Returns `EngineNotFound` for an unknown name.
    pub fn get(&self, name: &str) -> TxnResult<Arc<EngineHandle>> {
        self.find(name).ok_or_else(|| TransactionError::EngineNotFound {
            name: name.to_string(),
        })
    }

    /// Looks up an engine by slot.
    pub fn by_slot(&self, slot: EngineSlot) -> Option<Arc<EngineHandle>> {
        self.engines.read().get(slot.index()).cloned()
    }

    /// Returns every engine in slot order.
    pub fn all(&self) -> Vec<Arc<EngineHandle>> {
        self.engines.read().clone()
    }

    /// Returns the engines that take part in SQL transactions.
    pub fn transactional(&self) -> Vec<Arc<EngineHandle>> {
        self.engines
            .read()
            .iter()
            .filter(|e| e.participates_in_sql_transaction())
            .cloned()
            .collect()
    }

    /// Returns the XA resource managers.
    pub fn xa_engines(&self) -> Vec<Arc<EngineHandle>> {
        self.engines
            .read()
            .iter()
            .filter(|e| e.participates_in_xa_transaction())
            .cloned()
            .collect()
    }

    /// Returns the number of XA resource managers.
    pub fn xa_capable_count(&self) -> usize {
        self.engines
            .read()
            .iter()
            .filter(|e| e.participates_in_xa_transaction())
            .count()
    }

    /// Returns the number of registered engines.
    pub fn len(&self) -> usize {
        self.engines.read().len()
    }

    /// Returns true if no engine is registered.
    pub fn is_empty(&self) -> bool {
        self.engines.read().is_empty()
    }

    /// Returns the slot count.
    pub fn max_engines(&self) -> usize {
        self.max_engines
    }
}
