//! Process-wide registries for tessera.
//!
//! Catalog and XID registration is rare compared to row work, so every map
//! here is guarded by a single coarse mutex. Expensive values are built
//! outside that mutex with a placeholder protocol:
//!
//! 1. [`Registry::lock`] reserves the key with an empty placeholder
//! 2. the caller builds the value without holding the mutex
//! 3. [`Registry::insert`] completes the entry, or [`Registry::unlock`]
//!    drops the reservation if construction failed
//!
//! While a key is reserved, [`Registry::find`] reports
//! [`LookupError::NoLock`].
//!
//! # Example
//!
//! ```rust
//! use tessera_cache::{LookupError, Registry};
//!
//! let registry: Registry<String, u32> = Registry::new("example");
//! assert!(registry.lock("a".to_string()));
//! assert_eq!(registry.find(&"a".to_string()), Err(LookupError::NoLock));
//! assert!(registry.insert("a".to_string(), 7));
//! assert_eq!(registry.find(&"a".to_string()), Ok(7));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod catalog;
pub mod error;
pub mod registry;
pub mod stats;
pub mod xid_cache;

pub use catalog::{Catalog, CatalogCache, CatalogId};
pub use error::{CacheError, CacheResult, LookupError};
pub use registry::Registry;
pub use stats::CacheStats;
pub use xid_cache::XidCache;
