mod export_cmd;
mod serve;
mod status_cmd;

use anyhow::Result;
use clap::{Parser, Subcommand};

use voxledger_logging::init_logger;

#[derive(Parser)]
#[command(name = "voxledger")]
#[command(about = "voxledger: voice presence time accounting")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Track voice presence and serve the HTTP/WebSocket API
    Serve {
        /// Port to bind the HTTP server to
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Ask a running server for its health
    Status {
        /// Port the server listens on
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Print every persisted record as JSON
    Export {
        /// Database to read instead of the configured one
        #[arg(long)]
        db: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let (mut config, warnings) = voxledger_config::load_from_env().await?;

    init_logger(
        config.logging.dir.as_deref().map(std::path::Path::new),
        &config.logging.level,
    );
    for warning in warnings {
        tracing::warn!(path = %warning.path, message = %warning.message, "Config warning");
    }

    match cli.command {
        Commands::Serve { port } => {
            if let Some(port) = port {
                config.server.port = port;
            }
            serve::run(config).await?;
        }
        Commands::Status { port } => {
            status_cmd::run(port.unwrap_or(config.server.port)).await?;
        }
        Commands::Export { db } => {
            if let Some(db) = db {
                config.storage.db_path = db;
            }
            export_cmd::run(&config).await?;
        }
    }

    Ok(())
}
