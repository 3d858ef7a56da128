//! Sampler — periodic capture of runtime gauges into agent state.

use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info};

use crate::source::SampleSource;
use crate::state::SharedState;

/// Periodically captures a gauge batch from its source and writes it into
/// the shared agent state in a single critical section.
pub struct Sampler<S> {
    state: SharedState,
    source: S,
    interval: Duration,
}

impl<S: SampleSource> Sampler<S> {
    pub fn new(state: SharedState, source: S, interval: Duration) -> Self {
        Self {
            state,
            source,
            interval,
        }
    }

    /// Run the sample loop until the shutdown signal.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(interval_secs = self.interval.as_secs_f64(), "sampler started");

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {
                    self.sample_once().await;
                }
                _ = shutdown.changed() => {
                    info!("sampler shutting down");
                    break;
                }
            }
        }
    }

    /// Capture one batch and apply it atomically.
    pub async fn sample_once(&mut self) {
        let batch = self.source.gauges();
        let mut state = self.state.lock().await;
        state.apply_batch(batch);
        debug!(poll_count = state.poll_count(), "sample batch applied");
    }
}
