//! Sampling sources.
//!
//! The sampler reads its gauges from a [`SampleSource`] rather than from the
//! OS directly, so tests can substitute a scripted source.

use sysinfo::System;

/// Produces one batch of named gauge readings per sample tick.
pub trait SampleSource: Send {
    /// The current gauge batch. The set of names is fixed per source.
    fn gauges(&mut self) -> Vec<(String, f64)>;
}

/// Host gauges from sysinfo plus one random gauge.
pub struct SystemSource {
    system: System,
}

impl SystemSource {
    pub fn new() -> Self {
        Self {
            system: System::new(),
        }
    }
}

impl Default for SystemSource {
    fn default() -> Self {
        Self::new()
    }
}

impl SampleSource for SystemSource {
    fn gauges(&mut self) -> Vec<(String, f64)> {
        self.system.refresh_memory();
        let load = System::load_average();

        vec![
            ("mem_total".to_string(), self.system.total_memory() as f64),
            ("mem_used".to_string(), self.system.used_memory() as f64),
            (
                "mem_available".to_string(),
                self.system.available_memory() as f64,
            ),
            ("mem_free".to_string(), self.system.free_memory() as f64),
            ("swap_total".to_string(), self.system.total_swap() as f64),
            ("swap_used".to_string(), self.system.used_swap() as f64),
            ("load_1".to_string(), load.one),
            ("load_5".to_string(), load.five),
            ("load_15".to_string(), load.fifteen),
            ("uptime_seconds".to_string(), System::uptime() as f64),
            ("random_value".to_string(), rand::random::<f64>()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_source_reports_a_fixed_gauge_set() {
        let mut source = SystemSource::new();
        let first: Vec<String> = source.gauges().into_iter().map(|(n, _)| n).collect();
        let second: Vec<String> = source.gauges().into_iter().map(|(n, _)| n).collect();
        assert_eq!(first, second);
        assert!(first.contains(&"mem_total".to_string()));
        assert!(first.contains(&"random_value".to_string()));
    }
}
