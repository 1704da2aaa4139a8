//! Environment handling: `${VAR}` substitution inside string values, then
//! direct overrides from well-known variables.
//!
//! Only uppercase `[A-Z_][A-Z0-9_]*` names are substituted. `$${VAR}` is an
//! escape for a literal `${VAR}`.

use std::collections::HashMap;

use anyhow::{bail, Context, Result};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::Value;
use tracing::debug;

use crate::schema::VoxLedgerConfig;

static ENV_REF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$(\$?)\{([A-Z_][A-Z0-9_]*)\}").expect("static regex"));

#[derive(Debug, thiserror::Error)]
#[error("Missing env var \"{var_name}\" referenced at config path: {config_path}")]
pub struct MissingEnvVarError {
    pub var_name: String,
    pub config_path: String,
}

/// Substitute `${VAR}` references in every string leaf of `value`.
/// Unset or empty variables are an error.
pub fn resolve_env_vars(value: &Value, env: &HashMap<String, String>) -> Result<Value> {
    substitute(value, env, "")
}

fn substitute(value: &Value, env: &HashMap<String, String>, path: &str) -> Result<Value> {
    Ok(match value {
        Value::String(s) => Value::String(substitute_str(s, env, path)?),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .enumerate()
                .map(|(i, v)| substitute(v, env, &format!("{path}[{i}]")))
                .collect::<Result<_>>()?,
        ),
        Value::Object(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (key, v) in map {
                let child = if path.is_empty() {
                    key.clone()
                } else {
                    format!("{path}.{key}")
                };
                out.insert(key.clone(), substitute(v, env, &child)?);
            }
            Value::Object(out)
        }
        other => other.clone(),
    })
}

fn substitute_str(s: &str, env: &HashMap<String, String>, path: &str) -> Result<String> {
    if !s.contains('$') {
        return Ok(s.to_string());
    }
    let mut missing = None;
    let out = ENV_REF.replace_all(s, |caps: &Captures| {
        let name = &caps[2];
        if !caps[1].is_empty() {
            return format!("${{{name}}}");
        }
        match env.get(name).filter(|v| !v.is_empty()) {
            Some(v) => v.clone(),
            None => {
                missing.get_or_insert_with(|| name.to_string());
                String::new()
            }
        }
    });
    if let Some(var_name) = missing {
        bail!(MissingEnvVarError {
            var_name,
            config_path: path.to_string(),
        });
    }
    Ok(out.into_owned())
}

/// Apply overrides from `VOXLEDGER_PORT`, `VOXLEDGER_BIND`, `VOXLEDGER_DB`,
/// `DISCORD_TOKEN` and `RUST_LOG`.
pub fn apply_env_overrides(
    mut config: VoxLedgerConfig,
    env: &HashMap<String, String>,
) -> Result<VoxLedgerConfig> {
    let get = |key: &str| env.get(key).map(|v| v.trim()).filter(|v| !v.is_empty());

    if let Some(port) = get("VOXLEDGER_PORT") {
        config.server.port = port
            .parse()
            .with_context(|| format!("VOXLEDGER_PORT is not a valid port: {port}"))?;
        debug!(port = config.server.port, "Port overridden from environment");
    }
    if let Some(bind) = get("VOXLEDGER_BIND") {
        config.server.bind_address = bind.to_string();
    }
    if let Some(db) = get("VOXLEDGER_DB") {
        config.storage.db_path = db.to_string();
    }
    if let Some(token) = get("DISCORD_TOKEN") {
        config.discord.token = Some(token.to_string());
    }
    if let Some(level) = get("RUST_LOG") {
        config.logging.level = level.to_string();
    }
    Ok(config)
}
