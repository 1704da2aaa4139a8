//! `voxledger serve`: wire store, ledger, presence source and gateway
//! together, and shut them down in order on Ctrl-C.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use voxledger_channels::{DiscordSource, PresenceSource};
use voxledger_config::{StorageBackend, StorageConfig, VoxLedgerConfig};
use voxledger_core::{Clock, PresenceEvent, RecordStore, SystemClock};
use voxledger_gateway::{start_server, GatewayState};
use voxledger_ledger::{LedgerConfig, LedgerHandle};
use voxledger_store::{InMemoryRecordStore, SqliteRecordStore};

pub fn open_store(storage: &StorageConfig) -> Result<Arc<dyn RecordStore>> {
    Ok(match storage.backend {
        StorageBackend::Sqlite => Arc::new(
            SqliteRecordStore::open(&storage.db_path)
                .with_context(|| format!("opening {}", storage.db_path))?,
        ),
        StorageBackend::Memory => Arc::new(InMemoryRecordStore::new()),
    })
}

pub fn ledger_config(config: &VoxLedgerConfig) -> LedgerConfig {
    let acc = &config.accounting;
    LedgerConfig {
        debounce: acc.debounce(),
        tick_interval: acc.tick_interval(),
        ticker_enabled: acc.ticker_enabled,
        broadcast_capacity: acc.broadcast_capacity,
        command_buffer: acc.command_buffer,
    }
}

pub async fn run(config: VoxLedgerConfig) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.server.bind_address, config.server.port)
        .parse()
        .context("invalid bind address")?;
    info!(
        port = config.server.port,
        bind = %config.server.bind_address,
        backend = ?config.storage.backend,
        db = %config.storage.db_path,
        "Starting voxledger"
    );

    let store = open_store(&config.storage)?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let (ledger, ledger_task) =
        voxledger_ledger::start(store, Arc::clone(&clock), ledger_config(&config)).await;

    let intake = start_intake(&config, ledger.clone());

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let state = GatewayState::new(ledger.clone(), clock);
    let mut server = tokio::spawn(start_server(addr, state, async move {
        let _ = stop_rx.await;
    }));

    let mut server_done = false;
    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                error!(error = %e, "Failed to listen for Ctrl-C");
            }
            info!("Shutdown requested");
        }
        result = &mut server => {
            server_done = true;
            match result {
                Ok(Ok(())) => warn!("HTTP server exited on its own"),
                Ok(Err(e)) => error!(error = %e, "HTTP server failed"),
                Err(e) => error!(error = %e, "HTTP server task panicked"),
            }
        }
    }

    // Stop intake first so nothing mutates the ledger after the final flush.
    for task in intake {
        task.abort();
    }
    match ledger.shutdown().await {
        Ok(report) => info!(written = report.written, failed = report.failed, "Pending writes flushed"),
        Err(e) => error!(error = %e, "Ledger was already stopped"),
    }
    let _ = stop_tx.send(());
    if !server_done {
        if let Ok(Err(e)) = server.await {
            error!(error = %e, "HTTP server error");
        }
    }
    let _ = ledger_task.await;

    info!("voxledger stopped");
    Ok(())
}

/// Spawn the presence source and the task forwarding its events into the ledger.
fn start_intake(config: &VoxLedgerConfig, ledger: LedgerHandle) -> Vec<JoinHandle<()>> {
    let Some(token) = config.discord.token.clone() else {
        warn!("No Discord token configured; running without a presence source");
        return Vec::new();
    };

    let (tx, mut rx) = mpsc::channel::<PresenceEvent>(config.accounting.command_buffer.max(1));
    let source = DiscordSource::new(token).with_guild(config.discord.guild_id);

    let source_task = tokio::spawn(async move {
        if let Err(e) = source.start(tx).await {
            error!(source = source.name(), error = %e, "Presence source stopped");
        }
    });

    let forward_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if ledger.ingest(event).await.is_err() {
                warn!("Ledger stopped, dropping presence events");
                break;
            }
        }
    });

    vec![source_task, forward_task]
}
