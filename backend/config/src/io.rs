//! Locating and reading the config file.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::fs;
use tracing::{debug, info};

use crate::schema::VoxLedgerConfig;

const CONFIG_FILE_NAME: &str = "config.yaml";

/// Resolve the voxledger config directory.
/// Priority: `VOXLEDGER_CONFIG_DIR` env > `~/.voxledger/`.
pub fn config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("VOXLEDGER_CONFIG_DIR") {
        return PathBuf::from(dir);
    }
    match dirs::home_dir() {
        Some(home) => home.join(".voxledger"),
        None => PathBuf::from(".voxledger"),
    }
}

pub fn config_file_path(config_dir: &Path) -> PathBuf {
    config_dir.join(CONFIG_FILE_NAME)
}

/// `VOXLEDGER_CONFIG` if set, else `config.yaml` in [`config_dir`].
pub fn resolve_config_path(env: &HashMap<String, String>) -> PathBuf {
    match env.get("VOXLEDGER_CONFIG").filter(|p| !p.trim().is_empty()) {
        Some(path) => PathBuf::from(path),
        None => config_file_path(&config_dir()),
    }
}

/// Load and parse the config from disk.
///
/// Returns defaults if the file doesn't exist.
pub async fn load_config(path: &Path) -> Result<VoxLedgerConfig> {
    if !path.exists() {
        debug!(path = %path.display(), "Config file does not exist; using defaults");
        return Ok(VoxLedgerConfig::default());
    }

    let raw = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config = if raw.trim().is_empty() {
        VoxLedgerConfig::default()
    } else {
        serde_yaml::from_str(&raw)
            .with_context(|| format!("Failed to parse config YAML at: {}", path.display()))?
    };

    info!(path = %path.display(), "Loaded config");
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("voxledger-config-{}-{name}", std::process::id()))
    }

    #[tokio::test]
    async fn test_missing_file_gives_defaults() {
        let config = load_config(&temp_path("absent.yaml")).await.unwrap();
        assert_eq!(config, VoxLedgerConfig::default());
    }

    #[tokio::test]
    async fn test_reads_yaml_file() {
        let path = temp_path("present.yaml");
        fs::write(&path, "server:\n  port: 9000\n").await.unwrap();
        let config = load_config(&path).await.unwrap();
        let _ = fs::remove_file(&path).await;
        assert_eq!(config.server.port, 9000);
    }

    #[tokio::test]
    async fn test_malformed_yaml_is_an_error() {
        let path = temp_path("broken.yaml");
        fs::write(&path, "server: [port").await.unwrap();
        let result = load_config(&path).await;
        let _ = fs::remove_file(&path).await;
        assert!(result.is_err());
    }

    #[test]
    fn test_explicit_config_path_wins() {
        let env: HashMap<_, _> = [("VOXLEDGER_CONFIG".to_string(), "/etc/vox.yaml".to_string())]
            .into_iter()
            .collect();
        assert_eq!(resolve_config_path(&env), PathBuf::from("/etc/vox.yaml"));
        assert!(resolve_config_path(&HashMap::new()).ends_with("config.yaml"));
    }
}
