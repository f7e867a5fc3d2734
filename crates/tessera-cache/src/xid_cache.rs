//! XID cache.
//!
//! Holds the XA branches known to the server, keyed by [`Xid::key`], so
//! that a branch can be found by XID after the session that started it is
//! gone (a disconnect after `XA PREPARE`, or crash recovery).

use tracing::debug;

use tessera_common::{XaState, Xid, XidState};

use crate::error::{CacheError, CacheResult, LookupError};
use crate::registry::Registry;
use crate::stats::CacheStats;

const KIND: &str = "xid";

/// Process-wide XID cache.
#[derive(Debug)]
pub struct XidCache {
    registry: Registry<Vec<u8>, XidState>,
}

impl XidCache {
    /// Creates an empty cache.
    pub fn new(capacity: usize) -> Self {
        Self {
            registry: Registry::with_capacity(KIND, capacity),
        }
    }

    /// Adds a branch.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyExists` if the XID is already known.
    pub fn insert(&self, state: XidState) -> CacheResult<()> {
        let key = state.xid.key();
        let xid = state.xid.clone();
        if !self.registry.insert(key, state) {
            return Err(CacheError::AlreadyExists {
                kind: KIND,
                key: xid.to_string(),
            });
        }
        debug!(xid = %xid, "xid registered");
        Ok(())
    }

    /// Adds a prepared branch without an owning session, as found by
    /// recovery.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyExists` if the XID is already known.
    pub fn insert_prepared(&self, xid: Xid) -> CacheResult<()> {
        self.insert(XidState::detached(xid, XaState::Prepared))
    }

    /// Looks up a branch.
    pub fn search(&self, xid: &Xid) -> Option<XidState> {
        self.registry.find(&xid.key()).ok()
    }

    /// Changes the state of a known branch.
    ///
    /// # Errors
    ///
    /// Returns `DoesNotExist` for an unknown XID.
    pub fn set_state(&self, xid: &Xid, xa_state: XaState) -> CacheResult<()> {
        self.registry
            .update(&xid.key(), |s| s.xa_state = xa_state)
            .map_err(|e| CacheError::from_lookup(e, KIND, xid))
    }

    /// Detaches a branch from its session, keeping it in the cache.
    ///
    /// # Errors
    ///
    /// Returns `DoesNotExist` for an unknown XID.
    pub fn detach(&self, xid: &Xid) -> CacheResult<()> {
        self.registry
            .update(&xid.key(), |s| s.in_session = false)
            .map_err(|e| CacheError::from_lookup(e, KIND, xid))
    }

    /// Removes a branch. Returns false if it was unknown.
    pub fn delete(&self, xid: &Xid) -> bool {
        let removed = self.registry.erase(&xid.key());
        if removed {
            debug!(xid = %xid, "xid removed");
        }
        removed
    }

    /// Returns true if the XID is known.
    pub fn contains(&self, xid: &Xid) -> bool {
        !matches!(
            self.registry.find(&xid.key()),
            Err(LookupError::DoesNotExist)
        )
    }

    /// Returns every prepared branch.
    pub fn prepared(&self) -> Vec<Xid> {
        let mut xids: Vec<Xid> = self
            .registry
            .snapshot()
            .into_iter()
            .filter(|(_, s)| s.xa_state == XaState::Prepared)
            .map(|(_, s)| s.xid)
            .collect();
        xids.sort_by_key(Xid::key);
        xids
    }

    /// Returns the number of branches.
    pub fn len(&self) -> usize {
        self.registry.len()
    }

    /// Returns true if no branch is known.
    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    /// Returns the cache statistics.
    pub fn stats(&self) -> &CacheStats {
        self.registry.stats()
    }
}

impl Default for XidCache {
    fn default() -> Self {
        Self::new(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn xid(gtrid: &[u8]) -> Xid {
        Xid::new(7, gtrid, b"b1").unwrap()
    }

    #[test]
    fn test_insert_and_search() {
        let cache = XidCache::default();
        cache.insert(XidState::new(xid(b"g1"), XaState::Active)).unwrap();
        let found = cache.search(&xid(b"g1")).unwrap();
        assert_eq!(found.xa_state, XaState::Active);
        assert!(found.in_session);
        assert!(cache.search(&xid(b"g2")).is_none());
    }

    #[test]
    fn test_duplicate_insert_fails() {
        let cache = XidCache::default();
        cache.insert_prepared(xid(b"g1")).unwrap();
        let err = cache.insert_prepared(xid(b"g1")).unwrap_err();
        assert!(matches!(err, CacheError::AlreadyExists { .. }));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_state_changes_and_prepared_list() {
        let cache = XidCache::default();
        cache.insert(XidState::new(xid(b"g2"), XaState::Idle)).unwrap();
        cache.insert(XidState::new(xid(b"g1"), XaState::Active)).unwrap();
        assert!(cache.prepared().is_empty());

        cache.set_state(&xid(b"g1"), XaState::Prepared).unwrap();
        cache.set_state(&xid(b"g2"), XaState::Prepared).unwrap();
        cache.detach(&xid(b"g1")).unwrap();
        assert!(!cache.search(&xid(b"g1")).unwrap().in_session);
        assert_eq!(cache.prepared(), vec![xid(b"g1"), xid(b"g2")]);

        assert!(cache.set_state(&xid(b"zz"), XaState::Idle).is_err());
    }

    #[test]
    fn test_delete() {
        let cache = XidCache::default();
        cache.insert_prepared(xid(b"g1")).unwrap();
        assert!(cache.contains(&xid(b"g1")));
        assert!(cache.delete(&xid(b"g1")));
        assert!(!cache.delete(&xid(b"g1")));
        assert!(!cache.contains(&xid(b"g1")));
        assert!(cache.is_empty());
    }
}
