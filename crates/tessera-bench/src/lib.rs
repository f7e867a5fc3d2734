//! Tessera Performance Benchmarks
//!
//! This crate contains benchmarks for:
//! - Field store, pack and sort-key paths
//! - Row pack/unpack across byte orders
//! - One-phase and two-phase commit through the coordinator
//! - Catalog and XID cache lookups
//!
//! Run benchmarks with:
//! ```bash
//! cargo bench -p tessera-bench
//! ```

pub mod utils;
