//! Kernel configuration structures.
//!
//! A single [`KernelConfig`] is loaded at startup and handed to every
//! component explicitly; nothing reads configuration from globals.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_MAX_ENGINES, MAX_XID_LIST_SIZE, MIN_XID_LIST_SIZE};
use crate::error::{TesseraError, TesseraResult};
use crate::types::ServerId;

/// Main kernel configuration.
///
/// # Example
///
/// ```rust
/// use tessera_common::config::KernelConfig;
///
/// let config = KernelConfig::builder().server_id(9).strict_mode(true).build();
/// assert!(config.strict_mode);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KernelConfig {
    /// Server id embedded in locally generated XIDs.
    #[serde(default = "default_server_id")]
    pub server_id: ServerId,

    /// Turn field store warnings into statement errors.
    #[serde(default)]
    pub strict_mode: bool,

    /// Maximum number of storage engines that can be registered.
    #[serde(default = "default_max_engines")]
    pub max_engines: usize,

    /// Row codec configuration.
    #[serde(default)]
    pub codec: CodecConfig,

    /// Two-phase commit and recovery configuration.
    #[serde(default)]
    pub xa: XaConfig,

    /// Registry configuration.
    #[serde(default)]
    pub cache: CacheConfig,
}

fn default_server_id() -> ServerId {
    ServerId::new(1)
}

fn default_max_engines() -> usize {
    DEFAULT_MAX_ENGINES
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            server_id: default_server_id(),
            strict_mode: false,
            max_engines: default_max_engines(),
            codec: CodecConfig::default(),
            xa: XaConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

impl KernelConfig {
    /// Creates a new default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a small configuration for tests.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            max_engines: 8,
            xa: XaConfig {
                recover_batch_size: MIN_XID_LIST_SIZE,
                ..Default::default()
            },
            cache: CacheConfig {
                catalog_capacity: 4,
                xid_capacity: 4,
            },
            ..Default::default()
        }
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` describing the first offending setting.
    pub fn validate(&self) -> TesseraResult<()> {
        if self.max_engines == 0 {
            return Err(TesseraError::invalid_config("max_engines must be at least 1"));
        }
        if u32::try_from(self.max_engines).is_err() {
            return Err(TesseraError::invalid_config("max_engines does not fit a slot id"));
        }
        if self.xa.recover_batch_size == 0 {
            return Err(TesseraError::invalid_config(
                "xa.recover_batch_size must be at least 1",
            ));
        }
        Ok(())
    }

    /// Loads configuration from a file.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be read, or `InvalidConfig`
    /// if it is not valid TOML or fails validation.
    pub fn from_file(path: &Path) -> TesseraResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Saves configuration to a file.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be written.
    pub fn save(&self, path: &Path) -> TesseraResult<()> {
        let content = self.to_toml()?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Converts configuration to TOML string.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if serialization fails.
    pub fn to_toml(&self) -> TesseraResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Creates a builder for configuration.
    #[must_use]
    pub fn builder() -> KernelConfigBuilder {
        KernelConfigBuilder::new()
    }
}

/// Row codec configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodecConfig {
    /// Byte order of multi-byte numbers in record buffers.
    /// Default: true (little-endian)
    #[serde(default = "default_true")]
    pub db_low_byte_first: bool,

    /// Byte order used when packing rows for replication.
    /// Default: true (little-endian)
    #[serde(default = "default_true")]
    pub wire_low_byte_first: bool,
}

fn default_true() -> bool {
    true
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            db_low_byte_first: true,
            wire_low_byte_first: true,
        }
    }
}

/// Decision applied to prepared local transactions found during recovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeuristicRecover {
    /// Consult the commit log.
    #[default]
    None,
    /// Commit every prepared transaction.
    Commit,
    /// Roll back every prepared transaction.
    Rollback,
}

/// Two-phase commit configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct XaConfig {
    /// Heuristic decision for recovery.
    /// Default: none
    #[serde(default)]
    pub heuristic_recover: HeuristicRecover,

    /// Number of XIDs requested from an engine per recovery call.
    /// Default: 128 * 1024
    #[serde(default = "default_recover_batch_size")]
    pub recover_batch_size: usize,
}

fn default_recover_batch_size() -> usize {
    MAX_XID_LIST_SIZE
}

impl Default for XaConfig {
    fn default() -> Self {
        Self {
            heuristic_recover: HeuristicRecover::None,
            recover_batch_size: default_recover_batch_size(),
        }
    }
}

impl XaConfig {
    /// Returns the recovery batch size clamped to the supported range.
    #[must_use]
    pub fn effective_batch_size(&self) -> usize {
        self.recover_batch_size
            .clamp(MIN_XID_LIST_SIZE, MAX_XID_LIST_SIZE)
    }
}

/// Registry configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Initial capacity of the catalog cache.
    /// Default: 16
    #[serde(default = "default_catalog_capacity")]
    pub catalog_capacity: usize,

    /// Initial capacity of the XID cache.
    /// Default: 128
    #[serde(default = "default_xid_capacity")]
    pub xid_capacity: usize,
}

fn default_catalog_capacity() -> usize {
    16
}

fn default_xid_capacity() -> usize {
    128
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            catalog_capacity: default_catalog_capacity(),
            xid_capacity: default_xid_capacity(),
        }
    }
}

/// Builder for kernel configuration.
#[derive(Default)]
pub struct KernelConfigBuilder {
    config: KernelConfig,
}

impl KernelConfigBuilder {
    /// Creates a new builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the server id.
    #[must_use]
    pub fn server_id(mut self, id: u32) -> Self {
        self.config.server_id = ServerId::new(id);
        self
    }

    /// Enables strict mode.
    #[must_use]
    pub fn strict_mode(mut self, enabled: bool) -> Self {
        self.config.strict_mode = enabled;
        self
    }

    /// Sets the maximum number of engines.
    #[must_use]
    pub fn max_engines(mut self, max: usize) -> Self {
        self.config.max_engines = max;
        self
    }

    /// Sets the record buffer byte order.
    #[must_use]
    pub fn db_low_byte_first(mut self, low_byte_first: bool) -> Self {
        self.config.codec.db_low_byte_first = low_byte_first;
        self
    }

    /// Sets the replication byte order.
    #[must_use]
    pub fn wire_low_byte_first(mut self, low_byte_first: bool) -> Self {
        self.config.codec.wire_low_byte_first = low_byte_first;
        self
    }

    /// Sets the heuristic recovery decision.
    #[must_use]
    pub fn heuristic_recover(mut self, decision: HeuristicRecover) -> Self {
        self.config.xa.heuristic_recover = decision;
        self
    }

    /// Sets the recovery batch size.
    #[must_use]
    pub fn recover_batch_size(mut self, size: usize) -> Self {
        self.config.xa.recover_batch_size = size;
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> KernelConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = KernelConfig::default();
        assert_eq!(config.server_id, ServerId::new(1));
        assert!(!config.strict_mode);
        assert_eq!(config.max_engines, DEFAULT_MAX_ENGINES);
        assert!(config.codec.db_low_byte_first);
        assert_eq!(config.xa.heuristic_recover, HeuristicRecover::None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = KernelConfig::builder()
            .server_id(12)
            .strict_mode(true)
            .wire_low_byte_first(false)
            .heuristic_recover(HeuristicRecover::Rollback)
            .build();

        assert_eq!(config.server_id, ServerId::new(12));
        assert!(config.strict_mode);
        assert!(!config.codec.wire_low_byte_first);
        assert_eq!(config.xa.heuristic_recover, HeuristicRecover::Rollback);
    }

    #[test]
    fn test_validate_rejects_zero_engines() {
        let config = KernelConfig::builder().max_engines(0).build();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_batch_size_is_clamped() {
        let small = KernelConfig::builder().recover_batch_size(1).build();
        assert_eq!(small.xa.effective_batch_size(), MIN_XID_LIST_SIZE);

        let large = KernelConfig::builder().recover_batch_size(usize::MAX).build();
        assert_eq!(large.xa.effective_batch_size(), MAX_XID_LIST_SIZE);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: KernelConfig = toml::from_str(
            r#"
            server_id = 4

            [xa]
            heuristic_recover = "commit"
            "#,
        )
        .unwrap();

        assert_eq!(config.server_id, ServerId::new(4));
        assert_eq!(config.xa.heuristic_recover, HeuristicRecover::Commit);
        assert_eq!(config.xa.recover_batch_size, MAX_XID_LIST_SIZE);
        assert_eq!(config.cache, CacheConfig::default());
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("tessera.toml");

        let config = KernelConfig::builder().server_id(77).strict_mode(true).build();
        config.save(&path).unwrap();

        let loaded = KernelConfig::from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_from_file_invalid() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bad.toml");
        std::fs::write(&path, "max_engines = 0").unwrap();

        assert!(KernelConfig::from_file(&path).is_err());
    }
}
