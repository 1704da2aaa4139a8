//! `voxledger-config`: typed runtime configuration.
//!
//! Provides:
//! - Typed config schema with per-field defaults
//! - YAML loading from `VOXLEDGER_CONFIG` or the config directory
//! - `${ENV_VAR}` substitution and environment overrides
//! - Validation with errors and warnings

pub mod defaults;
pub mod env;
pub mod io;
pub mod schema;
pub mod validation;

pub use env::{apply_env_overrides, resolve_env_vars, MissingEnvVarError};
pub use io::{config_dir, config_file_path, load_config, resolve_config_path};
pub use schema::{
    AccountingConfig, DiscordConfig, LoggingConfig, ServerConfig, StorageBackend, StorageConfig,
    VoxLedgerConfig,
};
pub use validation::{validate, ConfigValidationError, ValidationReport};

use std::collections::HashMap;

use anyhow::{bail, Context, Result};

/// Locate, load, substitute, override and validate the runtime config,
/// reading the process environment. Returns the config with its validation
/// warnings so they can be logged once logging is up.
pub async fn load_from_env() -> Result<(VoxLedgerConfig, Vec<ConfigValidationError>)> {
    let env: HashMap<String, String> = std::env::vars().collect();
    let path = resolve_config_path(&env);
    let raw = load_config(&path).await?;
    prepare(raw, &env)
}

/// Everything after the file read: substitution, overrides, validation.
/// Validation errors abort with every error in the message; warnings are
/// handed back to the caller.
pub fn prepare(
    raw: VoxLedgerConfig,
    env: &HashMap<String, String>,
) -> Result<(VoxLedgerConfig, Vec<ConfigValidationError>)> {
    let value = serde_json::to_value(&raw).context("Failed to serialize config for processing")?;
    let value = resolve_env_vars(&value, env).context("Failed to resolve env vars in config")?;
    let config: VoxLedgerConfig =
        serde_json::from_value(value).context("Failed to deserialize config after processing")?;
    let config = apply_env_overrides(config, env)?;

    let report = validate(&config);
    if !report.is_valid() {
        let messages: Vec<String> = report.errors.iter().map(ToString::to_string).collect();
        bail!("Invalid config:\n  {}", messages.join("\n  "));
    }
    Ok((config, report.warnings))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_prepare_substitutes_then_overrides() {
        let mut raw = VoxLedgerConfig::default();
        raw.storage.db_path = "${DATA}/vox.db".into();
        raw.discord.token = Some("${BOT}".into());

        let (config, warnings) =
            prepare(raw, &env(&[("DATA", "/srv"), ("BOT", "abc"), ("VOXLEDGER_PORT", "7000")]))
                .unwrap();
        assert!(warnings.is_empty());
        assert_eq!(config.storage.db_path, "/srv/vox.db");
        assert_eq!(config.discord.token.as_deref(), Some("abc"));
        assert_eq!(config.server.port, 7000);
    }

    #[test]
    fn test_prepare_rejects_invalid_config() {
        let mut raw = VoxLedgerConfig::default();
        raw.accounting.tick_interval_ms = 0;
        raw.server.port = 0;
        let err = prepare(raw, &HashMap::new()).unwrap_err().to_string();
        assert!(err.contains("accounting.tick_interval_ms"));
        assert!(err.contains("server.port"));
    }

    #[test]
    fn test_prepare_hands_back_warnings() {
        let (_, warnings) = prepare(VoxLedgerConfig::default(), &HashMap::new()).unwrap();
        let paths: Vec<_> = warnings.iter().map(|w| w.path.as_str()).collect();
        assert_eq!(paths, ["discord.token"]);
    }
}
