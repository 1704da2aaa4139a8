//! Structured logger.
//!
//! Console output plus, when a directory is configured, a daily-rotated
//! NDJSON file. `RUST_LOG` takes precedence over the configured level.

use std::path::Path;

use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const LOG_FILE_PREFIX: &str = "voxledger.log";

/// Level filter: `RUST_LOG` if it parses, else `level`, else `info`.
pub fn build_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize the global logger. Later calls are no-ops.
///
/// With `log_dir`, the console gets human-readable lines and the directory
/// gets `voxledger.log.YYYY-MM-DD` NDJSON files. Without it, the console
/// gets JSON lines.
pub fn init_logger(log_dir: Option<&Path>, level: &str) {
    let filter = build_filter(level);

    let (console_layer, file_layer) = match log_dir {
        Some(dir) => {
            let appender = RollingFileAppender::new(Rotation::DAILY, dir, LOG_FILE_PREFIX);
            let file = fmt::layer()
                .json()
                .with_writer(appender)
                .with_ansi(false)
                .boxed();
            let console = fmt::layer()
                .with_writer(std::io::stdout)
                .with_target(false)
                .with_ansi(true)
                .boxed();
            (console, Some(file))
        }
        None => {
            let console = fmt::layer()
                .json()
                .with_writer(std::io::stdout)
                .boxed();
            (console, None)
        }
    };

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bad_level_falls_back() {
        // Must not panic on a directive that does not parse.
        let _ = build_filter("not a [valid directive");
        let _ = build_filter("voxledger_ledger=debug,info");
    }

    #[test]
    fn test_init_twice_is_harmless() {
        init_logger(None, "warn");
        init_logger(None, "debug");
        tracing::info!("still fine");
    }
}
