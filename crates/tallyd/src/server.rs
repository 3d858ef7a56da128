//! Server mode — the metrics collector.
//!
//! Assembles the store, optional restore, the snapshot discipline (periodic
//! loop or sync-on-update), and the HTTP API with graceful shutdown.

use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::watch;
use tracing::info;

use tally_store::{MetricStore, StoreConfig};

pub async fn run_server(
    addr: String,
    snapshot_path: PathBuf,
    snapshot_interval: u64,
    restore: bool,
) -> anyhow::Result<()> {
    info!("tally collector starting");

    // Interval 0 means snapshot synchronously on every update.
    let sync_on_update = snapshot_interval == 0;
    let store = MetricStore::new(StoreConfig {
        snapshot_path,
        sync_on_update,
    });

    // A malformed snapshot file is fatal here; a missing one is a normal
    // first run.
    if restore {
        store.restore().await?;
    }

    // ── Shutdown signal ────────────────────────────────────────
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // ── Periodic snapshot loop ─────────────────────────────────
    let snapshot_handle = if !sync_on_update {
        let store = store.clone();
        let shutdown = shutdown_rx.clone();
        Some(tokio::spawn(async move {
            store
                .run_periodic_snapshots(Duration::from_secs(snapshot_interval), shutdown)
                .await;
        }))
    } else {
        info!("sync-on-update snapshots enabled");
        None
    };

    // ── HTTP API ───────────────────────────────────────────────
    let router = tally_api::build_router(store);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "collector listening");

    let server = axum::serve(listener, router).with_graceful_shutdown(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install CTRL+C handler");
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    server.await?;

    // Wait for the snapshot loop to take its final snapshot.
    if let Some(handle) = snapshot_handle {
        let _ = handle.await;
    }

    info!("collector stopped");
    Ok(())
}
