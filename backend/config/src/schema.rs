//! voxledger runtime configuration schema.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::defaults;

/// Root configuration. Every section falls back to its defaults when absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VoxLedgerConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub accounting: AccountingConfig,
    #[serde(default)]
    pub discord: DiscordConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "defaults::bind_address")]
    pub bind_address: String,
    #[serde(default = "defaults::port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: defaults::bind_address(),
            port: defaults::port(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Sqlite,
    /// Nothing survives a restart.
    Memory,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    #[serde(default = "defaults::db_path")]
    pub db_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            db_path: defaults::db_path(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountingConfig {
    /// Quiet period after a mutation before the record is written.
    #[serde(default = "defaults::debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default = "defaults::tick_interval_ms")]
    pub tick_interval_ms: u64,
    #[serde(default = "defaults::enabled")]
    pub ticker_enabled: bool,
    #[serde(default = "defaults::broadcast_capacity")]
    pub broadcast_capacity: usize,
    #[serde(default = "defaults::command_buffer")]
    pub command_buffer: usize,
}

impl AccountingConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

impl Default for AccountingConfig {
    fn default() -> Self {
        Self {
            debounce_ms: defaults::debounce_ms(),
            tick_interval_ms: defaults::tick_interval_ms(),
            ticker_enabled: defaults::enabled(),
            broadcast_capacity: defaults::broadcast_capacity(),
            command_buffer: defaults::command_buffer(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiscordConfig {
    /// Bot token. Without one no presence source runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Only track voice activity in this guild.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, e.g. `info` or `voxledger_ledger=debug`.
    #[serde(default = "defaults::log_level")]
    pub level: String,
    /// Directory for rotated JSON log files. Console only when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
            dir: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_yaml_gives_defaults() {
        let config: VoxLedgerConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config, VoxLedgerConfig::default());
        assert_eq!(config.server.port, 10_000);
        assert_eq!(config.accounting.debounce(), Duration::from_secs(2));
        assert_eq!(config.storage.backend, StorageBackend::Sqlite);
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let yaml = "accounting:\n  debounce_ms: 500\nstorage:\n  backend: memory\n";
        let config: VoxLedgerConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.accounting.debounce_ms, 500);
        assert_eq!(config.accounting.tick_interval_ms, 1_000);
        assert!(config.accounting.ticker_enabled);
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.storage.db_path, "voxledger.db");
    }
}
