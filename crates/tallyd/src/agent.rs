//! Agent mode — runtime sampler plus metric reporter.
//!
//! Two background loops share the local agent state; ctrl-c signals both to
//! stop and the daemon drains any in-flight report cycle before returning.

use tokio::sync::watch;
use tracing::info;

use tally_agent::{AgentConfig, AgentState, CollectorClient, Reporter, Sampler, SystemSource};

pub async fn run_agent(config: AgentConfig) -> anyhow::Result<()> {
    info!(collector = %config.collector_addr, "tally agent starting");

    let state = AgentState::new_shared();

    let sampler = Sampler::new(state.clone(), SystemSource::new(), config.poll_interval);
    let client = CollectorClient::new(config.collector_addr.clone(), config.compress);
    let reporter = Reporter::new(
        state,
        client,
        config.report_interval,
        config.max_in_flight,
    );

    // ── Shutdown signal ────────────────────────────────────────
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sampler_shutdown = shutdown_rx.clone();
    let reporter_shutdown = shutdown_rx;

    let sampler_handle = tokio::spawn(async move {
        sampler.run(sampler_shutdown).await;
    });
    let reporter_handle = tokio::spawn(async move {
        reporter.run(reporter_shutdown).await;
    });

    // ── Wait for shutdown ──────────────────────────────────────
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install CTRL+C handler");
    info!("shutdown signal received");
    let _ = shutdown_tx.send(true);

    // Drain both loops; the reporter finishes its in-flight cycle first.
    let _ = sampler_handle.await;
    let _ = reporter_handle.await;

    info!("agent stopped");
    Ok(())
}
