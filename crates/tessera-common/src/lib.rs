//! # tessera-common
//!
//! Common types, errors, and configuration for tessera.
//!
//! This crate provides the foundational types shared by the field codec,
//! the resource registries and the transaction coordinator:
//!
//! - **Types**: Core identifiers (`SessionId`, `QueryId`, `EngineSlot`,
//!   `ServerId`) and the XA transaction identifier (`Xid`)
//! - **Errors**: Stable error codes and the `TesseraError` umbrella type
//! - **Config**: Kernel configuration loaded from TOML
//! - **Constants**: XID layout and codec limits
//!
//! ## Example
//!
//! ```rust
//! use tessera_common::types::{QueryId, ServerId, Xid};
//!
//! let xid = Xid::from_local(ServerId::new(7), QueryId::new(42));
//! assert_eq!(xid.local_trx_id(), Some(QueryId::new(42)));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod constants;
pub mod error;
pub mod types;

// Re-export commonly used items at the crate root
pub use constants::*;
pub use error::{ErrorCode, TesseraError, TesseraResult};
pub use types::{EngineSlot, QueryId, ServerId, SessionId, XaState, Xid, XidState};
