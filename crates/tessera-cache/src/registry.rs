//! Generic mutex-guarded registry with placeholder reservations.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

use parking_lot::Mutex;
use tracing::trace;

use crate::error::LookupError;
use crate::stats::CacheStats;

/// A concurrent map from key to value where a key can be reserved before
/// its value exists.
///
/// A `None` entry is a placeholder. The map never holds two entries for a
/// key, so at most one caller builds the value of a key at a time.
pub struct Registry<K, V> {
    name: &'static str,
    map: Mutex<HashMap<K, Option<V>>>,
    stats: CacheStats,
}

impl<K, V> Registry<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Creates an empty registry. `name` labels log output.
    pub fn new(name: &'static str) -> Self {
        Self::with_capacity(name, 0)
    }

    /// Creates an empty registry with room for `capacity` entries.
    pub fn with_capacity(name: &'static str, capacity: usize) -> Self {
        Self {
            name,
            map: Mutex::new(HashMap::with_capacity(capacity)),
            stats: CacheStats::new(),
        }
    }

    /// Returns the registry name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Looks up a key.
    ///
    /// # Errors
    ///
    /// Returns `DoesNotExist` if the key is absent and `NoLock` if it is
    /// reserved by a placeholder.
    pub fn find(&self, key: &K) -> Result<V, LookupError> {
        let map = self.map.lock();
        match map.get(key) {
            Some(Some(value)) => {
                self.stats.record_hit();
                Ok(value.clone())
            }
            Some(None) => {
                self.stats.record_placeholder_hit();
                Err(LookupError::NoLock)
            }
            None => {
                self.stats.record_miss();
                Err(LookupError::DoesNotExist)
            }
        }
    }

    /// Reserves `key` with a placeholder if it is absent.
    ///
    /// Returns false if the key already exists, as a placeholder or with a
    /// value.
    pub fn lock(&self, key: K) -> bool {
        let mut map = self.map.lock();
        if map.contains_key(&key) {
            return false;
        }
        map.insert(key, None);
        self.stats.record_lock();
        trace!(registry = self.name, "placeholder reserved");
        true
    }

    /// Stores `value` under `key`, completing a placeholder if one exists.
    ///
    /// Returns false if the key already holds a value.
    pub fn insert(&self, key: K, value: V) -> bool {
        let mut map = self.map.lock();
        match map.get_mut(&key) {
            Some(Some(_)) => false,
            Some(slot) => {
                *slot = Some(value);
                self.stats.record_insert();
                true
            }
            None => {
                map.insert(key, Some(value));
                self.stats.record_insert();
                true
            }
        }
    }

    /// Drops a placeholder that was never completed.
    ///
    /// Returns false if the key is absent or holds a value.
    pub fn unlock(&self, key: &K) -> bool {
        let mut map = self.map.lock();
        if !matches!(map.get(key), Some(None)) {
            return false;
        }
        map.remove(key);
        self.stats.record_removal();
        trace!(registry = self.name, "placeholder dropped");
        true
    }

    /// Removes a completed entry.
    ///
    /// Returns false if the key is absent or only reserved.
    pub fn erase(&self, key: &K) -> bool {
        let mut map = self.map.lock();
        if !matches!(map.get(key), Some(Some(_))) {
            return false;
        }
        map.remove(key);
        self.stats.record_removal();
        true
    }

    /// Applies `f` to the value of `key` under the registry mutex.
    ///
    /// # Errors
    ///
    /// As [`Registry::find`].
    pub fn update<R>(&self, key: &K, f: impl FnOnce(&mut V) -> R) -> Result<R, LookupError> {
        let mut map = self.map.lock();
        match map.get_mut(key) {
            Some(Some(value)) => Ok(f(value)),
            Some(None) => Err(LookupError::NoLock),
            None => Err(LookupError::DoesNotExist),
        }
    }

    /// Returns the number of entries, placeholders included.
    pub fn len(&self) -> usize {
        self.map.lock().len()
    }

    /// Returns true if the registry has no entries.
    pub fn is_empty(&self) -> bool {
        self.map.lock().is_empty()
    }

    /// Returns the keys of completed entries.
    pub fn keys(&self) -> Vec<K> {
        self.map
            .lock()
            .iter()
            .filter(|(_, v)| v.is_some())
            .map(|(k, _)| k.clone())
            .collect()
    }

    /// Returns a copy of every completed entry.
    pub fn snapshot(&self) -> Vec<(K, V)> {
        self.map
            .lock()
            .iter()
            .filter_map(|(k, v)| v.as_ref().map(|v| (k.clone(), v.clone())))
            .collect()
    }

    /// Returns the registry statistics.
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }
}

impl<K, V> fmt::Debug for Registry<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("name", &self.name)
            .field("len", &self.map.lock().len())
            .finish()
    }
}
