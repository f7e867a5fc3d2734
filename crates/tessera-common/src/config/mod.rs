//! Configuration for tessera.
//!
//! This module contains the kernel configuration consumed by the field
//! codec, the registries and the transaction coordinator.

mod kernel;

pub use kernel::{
    CacheConfig, CodecConfig, HeuristicRecover, KernelConfig, KernelConfigBuilder, XaConfig,
};
