//! Error handling for tessera.
//!
//! This module provides the stable error codes shared by every tessera
//! crate and the umbrella error type used by the common layer.

mod tessera;

pub use tessera::{ErrorCode, TesseraError};

/// Result type alias for tessera operations.
pub type TesseraResult<T> = std::result::Result<T, TesseraError>;
