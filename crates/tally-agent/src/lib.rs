//! tally-agent — samples runtime gauges and reports them to the collector.
//!
//! Two independent loops share one locked [`state::AgentState`]:
//!
//! ```text
//! Sampler (poll interval)
//!   └── SampleSource::gauges() → one atomic batch write + poll_count += 1
//!
//! Reporter (report interval)
//!   └── copy state → one POST /update per metric,
//!       bounded by a semaphore admission gate
//! ```
//!
//! Send failures are logged and dropped; the poll counter is monotonic and
//! never reset, so a dropped report is superseded by the next, larger value.

pub mod client;
pub mod reporter;
pub mod sampler;
pub mod source;
pub mod state;

use std::time::Duration;

pub use client::CollectorClient;
pub use reporter::Reporter;
pub use sampler::Sampler;
pub use source::{SampleSource, SystemSource};
pub use state::{AgentState, SharedState};

/// Agent construction parameters.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Collector address (`host:port`).
    pub collector_addr: String,
    /// Interval between runtime samples.
    pub poll_interval: Duration,
    /// Interval between report fan-outs.
    pub report_interval: Duration,
    /// Maximum simultaneous in-flight reports.
    pub max_in_flight: usize,
    /// Gzip-compress request bodies.
    pub compress: bool,
}
