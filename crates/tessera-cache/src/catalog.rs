//! Catalog cache.
//!
//! Maps a catalog name to its shared [`Catalog`] instance. Catalog names
//! compare case-insensitively.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::{CacheError, CacheResult, LookupError};
use crate::registry::Registry;
use crate::stats::CacheStats;

const KIND: &str = "catalog";

/// Normalised catalog name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CatalogId(String);

impl CatalogId {
    /// Creates an id, folding the name to lower case.
    pub fn new(name: &str) -> Self {
        Self(name.to_lowercase())
    }

    /// Returns the normalised name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CatalogId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CatalogId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// A loaded catalog.
#[derive(Debug, PartialEq, Eq)]
pub struct Catalog {
    id: CatalogId,
    schemas: Vec<String>,
}

impl Catalog {
    /// Creates an empty catalog.
    pub fn new(id: CatalogId) -> Self {
        Self {
            id,
            schemas: Vec::new(),
        }
    }

    /// Creates a catalog with the given schema names.
    pub fn with_schemas(id: CatalogId, schemas: Vec<String>) -> Self {
        Self { id, schemas }
    }

    /// Returns the catalog id.
    pub fn id(&self) -> &CatalogId {
        &self.id
    }

    /// Returns the schema names.
    pub fn schemas(&self) -> &[String] {
        &self.schemas
    }
}

/// Process-wide catalog cache.
#[derive(Debug)]
pub struct CatalogCache {
    registry: Registry<CatalogId, Arc<Catalog>>,
}

impl CatalogCache {
    /// Creates an empty cache.
    pub fn new(capacity: usize) -> Self {
        Self {
            registry: Registry::with_capacity(KIND, capacity),
        }
    }

    /// Looks up a catalog.
    ///
    /// # Errors
    ///
    /// Returns `DoesNotExist` or, while another session is loading it,
    /// `NoLock`.
    pub fn find(&self, id: &CatalogId) -> CacheResult<Arc<Catalog>> {
        self.registry
            .find(id)
            .map_err(|e| CacheError::from_lookup(e, KIND, id))
    }

    /// Returns the cached catalog or builds it with `build`.
    ///
    /// `build` runs without the cache mutex held, under a placeholder that
    /// makes concurrent callers for the same id fail with `NoLock` instead
    /// of building a second instance. A failed build drops the placeholder.
    ///
    /// # Errors
    ///
    /// Returns `NoLock` if another session is loading the catalog and
    /// `CreateFailed` if `build` fails.
    pub fn get_or_create<F, E>(&self, id: &CatalogId, build: F) -> CacheResult<Arc<Catalog>>
    where
        F: FnOnce(&CatalogId) -> Result<Catalog, E>,
        E: fmt::Display,
    {
        match self.registry.find(id) {
            Ok(catalog) => return Ok(catalog),
            Err(LookupError::NoLock) => {
                return Err(CacheError::from_lookup(LookupError::NoLock, KIND, id))
            }
            Err(LookupError::DoesNotExist) => {}
        }

        if !self.registry.lock(id.clone()) {
            // Lost the race between find and lock.
            return self.find(id);
        }

        match build(id) {
            Ok(catalog) => {
                let catalog = Arc::new(catalog);
                if !self.registry.insert(id.clone(), Arc::clone(&catalog)) {
                    return Err(CacheError::AlreadyExists {
                        kind: KIND,
                        key: id.to_string(),
                    });
                }
                debug!(catalog = %id, "catalog loaded");
                Ok(catalog)
            }
            Err(e) => {
                self.registry.unlock(id);
                warn!(catalog = %id, error = %e, "catalog load failed");
                Err(CacheError::CreateFailed {
                    kind: KIND,
                    key: id.to_string(),
                    message: e.to_string(),
                })
            }
        }
    }

    /// Reserves `id` before creating a catalog.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyExists` if the id is loaded or reserved.
    pub fn lock(&self, id: &CatalogId) -> CacheResult<()> {
        if self.registry.lock(id.clone()) {
            Ok(())
        } else {
            Err(CacheError::AlreadyExists {
                kind: KIND,
                key: id.to_string(),
            })
        }
    }

    /// Drops a reservation made with [`CatalogCache::lock`].
    pub fn unlock(&self, id: &CatalogId) -> bool {
        self.registry.unlock(id)
    }

    /// Publishes a catalog, completing a reservation if one exists.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyExists` if the id already holds a catalog.
    pub fn insert(&self, catalog: Catalog) -> CacheResult<Arc<Catalog>> {
        let id = catalog.id().clone();
        let catalog = Arc::new(catalog);
        if self.registry.insert(id.clone(), Arc::clone(&catalog)) {
            Ok(catalog)
        } else {
            Err(CacheError::AlreadyExists {
                kind: KIND,
                key: id.to_string(),
            })
        }
    }

    /// Removes a loaded catalog.
    ///
    /// # Errors
    ///
    /// Returns `DoesNotExist` if the catalog is not loaded.
    pub fn remove(&self, id: &CatalogId) -> CacheResult<()> {
        if self.registry.erase(id) {
            debug!(catalog = %id, "catalog removed");
            Ok(())
        } else {
            Err(CacheError::DoesNotExist {
                kind: KIND,
                key: id.to_string(),
            })
        }
    }

    /// Returns the ids of loaded catalogs, sorted.
    pub fn list(&self) -> Vec<CatalogId> {
        let mut ids = self.registry.keys();
        ids.sort();
        ids
    }

    /// Returns the number of entries, reservations included.
    pub fn len(&self) -> usize {
        self.registry.len()
    }

    /// Returns true if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    /// Returns the cache statistics.
    pub fn stats(&self) -> &CacheStats {
        self.registry.stats()
    }
}

impl Default for CatalogCache {
    fn default() -> Self {
        Self::new(0)
    }
}
