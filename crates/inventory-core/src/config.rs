//! Configuration loading and typed config structures for the inventory service.
//!
//! The canonical configuration lives in `inventory-config.yaml`. This module
//! defines strongly-typed structs that mirror the YAML structure, and
//! provides a loader that reads, overrides from the environment, and
//! validates the file. Every field has a default, so an empty document is a
//! valid configuration.

use std::path::{Path, PathBuf};

use inventory_types::Kind;
use serde::Deserialize;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A value is out of range or malformed.
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level service configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct InventoryConfig {
    /// HTTP listener settings.
    #[serde(default)]
    pub server: ServerSection,

    /// Identity of the provider whose inventory is served.
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Watch subscription settings.
    #[serde(default)]
    pub watch: WatchConfig,

    /// Tree materialization settings.
    #[serde(default)]
    pub tree: TreeConfig,

    /// Store settings.
    #[serde(default)]
    pub store: StoreConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl InventoryConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override YAML values:
    /// - `INVENTORY_HOST` overrides `server.host`
    /// - `INVENTORY_PORT` overrides `server.port`
    /// - `INVENTORY_SEED` overrides `store.seed_path`
    /// - `INVENTORY_LOG` overrides `logging.level`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value fails validation.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string, applying environment
    /// overrides and validation.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value fails validation.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yml::from_str(yaml)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Override settings with environment variables when set.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if `INVENTORY_PORT` is not a port.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(val) = std::env::var("INVENTORY_HOST") {
            self.server.host = val;
        }
        if let Ok(val) = std::env::var("INVENTORY_PORT") {
            self.server.port = val
                .parse()
                .map_err(|e| ConfigError::Invalid(format!("INVENTORY_PORT={val}: {e}")))?;
        }
        if let Ok(val) = std::env::var("INVENTORY_SEED") {
            self.store.seed_path = Some(PathBuf::from(val));
        }
        if let Ok(val) = std::env::var("INVENTORY_LOG") {
            self.logging.level = val;
        }
        Ok(())
    }

    /// Reject values the engines cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.watch.queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "watch.queue_capacity must be at least 1".to_owned(),
            ));
        }
        if self.tree.max_depth == 0 {
            return Err(ConfigError::Invalid(
                "tree.max_depth must be at least 1".to_owned(),
            ));
        }
        if self.provider.uid.is_empty() {
            return Err(ConfigError::Invalid("provider.uid must not be empty".to_owned()));
        }
        Ok(())
    }
}

/// HTTP listener configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerSection {
    /// Address to bind.
    #[serde(default = "default_host")]
    pub host: String,

    /// TCP port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Provider identity.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProviderConfig {
    /// Provider UID; the `{provider}` segment of every route.
    #[serde(default = "default_provider_uid")]
    pub uid: String,

    /// Human-readable provider name.
    #[serde(default = "default_provider_name")]
    pub name: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            uid: default_provider_uid(),
            name: default_provider_name(),
        }
    }
}

/// Watch subscription configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WatchConfig {
    /// Bounded outbound queue size per subscription. A subscriber that
    /// falls this far behind is disconnected as a slow consumer.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Kinds that may be watched.
    #[serde(default = "default_watch_kinds")]
    pub kinds: Vec<Kind>,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            kinds: default_watch_kinds(),
        }
    }
}

/// Tree materialization configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TreeConfig {
    /// Maximum expansion depth below a root before a build is aborted.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
        }
    }
}

/// Store configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct StoreConfig {
    /// YAML inventory fixture loaded at startup.
    #[serde(default)]
    pub seed_path: Option<PathBuf>,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive (trace, debug, info, warn, error), used
    /// when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit newline-delimited JSON instead of human-readable lines.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

fn default_host() -> String {
    "0.0.0.0".to_owned()
}

const fn default_port() -> u16 {
    8080
}

fn default_provider_uid() -> String {
    "local".to_owned()
}

fn default_provider_name() -> String {
    "local inventory".to_owned()
}

const fn default_queue_capacity() -> usize {
    256
}

fn default_watch_kinds() -> Vec<Kind> {
    Kind::ALL.to_vec()
}

const fn default_max_depth() -> usize {
    64
}

fn default_log_level() -> String {
    "info".to_owned()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = InventoryConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.watch.queue_capacity, 256);
        assert_eq!(config.watch.kinds.len(), 8);
        assert_eq!(config.tree.max_depth, 64);
        assert_eq!(config.provider.uid, "local");
        assert!(config.store.seed_path.is_none());
    }

    #[test]
    fn parse_full_yaml() {
        let yaml = r#"
server:
  host: "127.0.0.1"
  port: 9090

provider:
  uid: "ovirt-east"
  name: "East oVirt"

watch:
  queue_capacity: 32
  kinds:
    - Host
    - VM

tree:
  max_depth: 8

store:
  seed_path: "fixtures/inventory.yaml"

logging:
  level: "debug"
  json: true
"#;
        let config: InventoryConfig = serde_yml::from_str(yaml).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.provider.uid, "ovirt-east");
        assert_eq!(config.watch.queue_capacity, 32);
        assert_eq!(config.watch.kinds, vec![Kind::Host, Kind::Vm]);
        assert_eq!(config.tree.max_depth, 8);
        assert_eq!(
            config.store.seed_path.as_deref(),
            Some(Path::new("fixtures/inventory.yaml"))
        );
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json);
    }

    #[test]
    fn empty_document_uses_defaults() {
        let config: InventoryConfig = serde_yml::from_str("{}").unwrap();
        assert_eq!(config, InventoryConfig::default());
    }

    #[test]
    fn zero_queue_capacity_is_rejected() {
        let config: InventoryConfig =
            serde_yml::from_str("watch:\n  queue_capacity: 0\n").unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn zero_tree_depth_is_rejected() {
        let config: InventoryConfig = serde_yml::from_str("tree:\n  max_depth: 0\n").unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn unknown_kind_is_a_parse_error() {
        let parsed: Result<InventoryConfig, _> =
            serde_yml::from_str("watch:\n  kinds: [Teapot]\n");
        assert!(parsed.is_err());
    }
}
