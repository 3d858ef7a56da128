//! Reporter — bounded-concurrency fan-out of the agent's current state.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Semaphore};
use tracing::{info, warn};

use crate::client::CollectorClient;
use crate::state::SharedState;

/// Periodically copies the agent state and sends one update per metric,
/// gated by a counting semaphore.
///
/// Individual send failures are logged and dropped; they never block other
/// metrics or abort the cycle. On shutdown the gate is closed so no new
/// sends start, and the current cycle is drained before the loop returns.
pub struct Reporter {
    state: SharedState,
    client: CollectorClient,
    interval: Duration,
    gate: Arc<Semaphore>,
}

impl Reporter {
    pub fn new(
        state: SharedState,
        client: CollectorClient,
        interval: Duration,
        max_in_flight: usize,
    ) -> Self {
        Self {
            state,
            client,
            interval,
            gate: Arc::new(Semaphore::new(max_in_flight)),
        }
    }

    /// Run the report loop until the shutdown signal.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_secs = self.interval.as_secs_f64(),
            max_in_flight = self.gate.available_permits(),
            "reporter started"
        );

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {
                    self.report_all(shutdown.clone()).await;
                }
                _ = shutdown.changed() => {
                    // Refuse any sends still waiting on a permit.
                    self.gate.close();
                    info!("reporter shutting down");
                    break;
                }
            }
        }
    }

    /// Send every current metric concurrently and wait for the cycle to
    /// finish.
    pub async fn report_all(&self, shutdown: watch::Receiver<bool>) {
        let records = {
            let state = self.state.lock().await;
            state.to_records()
        };

        let mut tasks = Vec::with_capacity(records.len());
        for record in records {
            let gate = Arc::clone(&self.gate);
            let client = self.client.clone();
            let mut shutdown = shutdown.clone();

            tasks.push(tokio::spawn(async move {
                // Acquire-before-send; a closed gate or a shutdown signal
                // means this send never starts.
                let _permit = tokio::select! {
                    permit = gate.acquire_owned() => match permit {
                        Ok(permit) => permit,
                        Err(_) => return,
                    },
                    _ = shutdown.changed() => return,
                };

                if let Err(e) = client.send_update(&record).await {
                    warn!(metric = %record.id, error = %e, "metric report failed");
                }
            }));
        }

        for task in tasks {
            let _ = task.await;
        }
    }
}
