//! Config validation with field paths in every message.

use std::net::IpAddr;

use thiserror::Error;

use crate::schema::{StorageBackend, VoxLedgerConfig};

#[derive(Debug, Error)]
#[error("Config validation error at '{path}': {message}")]
pub struct ConfigValidationError {
    pub path: String,
    pub message: String,
}

/// Errors and warnings found in one pass.
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, path: &str, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            path: path.to_string(),
            message: message.into(),
        });
    }

    fn warn(&mut self, path: &str, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            path: path.to_string(),
            message: message.into(),
        });
    }
}

pub fn validate(config: &VoxLedgerConfig) -> ValidationReport {
    let mut report = ValidationReport::default();
    validate_server(config, &mut report);
    validate_storage(config, &mut report);
    validate_accounting(config, &mut report);
    validate_discord(config, &mut report);
    report
}

fn validate_server(config: &VoxLedgerConfig, report: &mut ValidationReport) {
    if config.server.port == 0 {
        report.error("server.port", "Port must be non-zero");
    }
    if config.server.bind_address.parse::<IpAddr>().is_err() {
        report.error(
            "server.bind_address",
            format!("'{}' is not an IP address", config.server.bind_address),
        );
    }
}

fn validate_storage(config: &VoxLedgerConfig, report: &mut ValidationReport) {
    match config.storage.backend {
        StorageBackend::Sqlite if config.storage.db_path.trim().is_empty() => {
            report.error("storage.db_path", "SQLite backend needs a database path");
        }
        StorageBackend::Memory => {
            report.warn("storage.backend", "In-memory storage: voice time is lost on restart");
        }
        _ => {}
    }
}

fn validate_accounting(config: &VoxLedgerConfig, report: &mut ValidationReport) {
    let acc = &config.accounting;
    if acc.tick_interval_ms == 0 {
        report.error("accounting.tick_interval_ms", "Tick interval must be non-zero");
    }
    if acc.broadcast_capacity == 0 {
        report.error("accounting.broadcast_capacity", "Broadcast capacity must be non-zero");
    }
    if acc.command_buffer == 0 {
        report.error("accounting.command_buffer", "Command buffer must be non-zero");
    }
    if acc.debounce_ms == 0 {
        report.warn("accounting.debounce_ms", "No debounce: every change is written immediately");
    }
}

fn validate_discord(config: &VoxLedgerConfig, report: &mut ValidationReport) {
    match &config.discord.token {
        None => report.warn("discord.token", "No Discord token; no presence events will arrive"),
        Some(token) if token.trim().is_empty() => {
            report.error("discord.token", "Token is set but empty")
        }
        _ => {}
    }
}
