//! # tessera-test
//!
//! Integration tests for tessera.
//!
//! This crate contains:
//! - A recording storage engine that logs every call into a log shared
//!   across engines, so tests can check cross-engine ordering
//! - Harness helpers for services, sessions and statements
//! - Scenario tests for commit, XA, recovery, caches and the row codec
//!   (under `tests/`)

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Recording storage engine
pub mod engine;

/// Test utilities and helpers
pub mod utils;

pub use engine::{Call, CallLog, RecordingEngine};
pub use utils::{init_tracing, Harness};
