//! Agent-local metric state.
//!
//! Two maps under one lock, written in bulk by the sampler and read in bulk
//! by the reporter. Lives for the process lifetime and is never reset: gauges
//! are overwritten on each sample, the poll counter only grows.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use tally_model::{Metric, MetricRecord};

/// Name of the agent's monotonic sample counter.
pub const POLL_COUNT: &str = "poll_count";

/// Agent state shared between the sampler and reporter loops.
pub type SharedState = Arc<Mutex<AgentState>>;

/// The agent's local gauge and counter maps.
#[derive(Debug, Default)]
pub struct AgentState {
    gauges: HashMap<String, f64>,
    counters: HashMap<String, i64>,
}

impl AgentState {
    /// Fresh shared state for wiring sampler and reporter together.
    pub fn new_shared() -> SharedState {
        Arc::new(Mutex::new(AgentState::default()))
    }

    /// Apply one sample batch: overwrite every gauge, bump the poll counter.
    ///
    /// Callers hold the state lock, so readers observe either all of this
    /// batch or none of it.
    pub fn apply_batch(&mut self, gauges: Vec<(String, f64)>) {
        for (name, value) in gauges {
            self.gauges.insert(name, value);
        }
        *self.counters.entry(POLL_COUNT.to_string()).or_insert(0) += 1;
    }

    /// Wire records for every current gauge and counter.
    pub fn to_records(&self) -> Vec<MetricRecord> {
        let mut records = Vec::with_capacity(self.gauges.len() + self.counters.len());
        for (name, value) in &self.gauges {
            records.push(MetricRecord::from(&Metric::gauge(name.clone(), *value)));
        }
        for (name, delta) in &self.counters {
            records.push(MetricRecord::from(&Metric::counter(name.clone(), *delta)));
        }
        records
    }

    /// Current poll counter value.
    pub fn poll_count(&self) -> i64 {
        self.counters.get(POLL_COUNT).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_model::MetricKind;

    #[test]
    fn batches_overwrite_gauges_and_accumulate_poll_count() {
        let mut state = AgentState::default();

        state.apply_batch(vec![("mem_used".to_string(), 10.0)]);
        state.apply_batch(vec![("mem_used".to_string(), 20.0)]);

        assert_eq!(state.poll_count(), 2);
        let records = state.to_records();
        assert_eq!(records.len(), 2);

        let gauge = records.iter().find(|r| r.id == "mem_used").unwrap();
        assert_eq!(gauge.kind, MetricKind::Gauge);
        assert_eq!(gauge.value, Some(20.0));

        let counter = records.iter().find(|r| r.id == POLL_COUNT).unwrap();
        assert_eq!(counter.kind, MetricKind::Counter);
        assert_eq!(counter.delta, Some(2));
    }
}
