//! tally-model — the metric data model shared by agent and collector.
//!
//! A metric is identified by `(kind, name)`; the kind fully determines the
//! payload: counters carry an integer delta, gauges a float value. The wire
//! and snapshot representation is [`MetricRecord`], a flat JSON object with
//! optional payload fields; converting a record into a [`Metric`] validates
//! that the payload matching the kind is present.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced when validating wire data against the model.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("unknown metric kind: {0}")]
    UnknownKind(String),

    #[error("counter {0} is missing a delta")]
    MissingDelta(String),

    #[error("gauge {0} is missing a value")]
    MissingValue(String),
}

/// The two metric kinds.
///
/// Counters accumulate deltas into a running total; gauges are overwritten
/// by every update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Counter,
    Gauge,
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricKind::Counter => f.write_str("counter"),
            MetricKind::Gauge => f.write_str("gauge"),
        }
    }
}

impl FromStr for MetricKind {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "counter" => Ok(MetricKind::Counter),
            "gauge" => Ok(MetricKind::Gauge),
            other => Err(ModelError::UnknownKind(other.to_string())),
        }
    }
}

/// A metric payload. Exactly one shape per kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricValue {
    /// Accumulated counter delta.
    Counter(i64),
    /// Last observed gauge value.
    Gauge(f64),
}

/// Store identity of a metric: same name under different kinds is a
/// distinct entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MetricKey {
    pub kind: MetricKind,
    pub name: String,
}

/// A named, typed metric reading.
#[derive(Debug, Clone, PartialEq)]
pub struct Metric {
    pub name: String,
    pub value: MetricValue,
}

impl Metric {
    /// Counter metric carrying a delta.
    pub fn counter(name: impl Into<String>, delta: i64) -> Self {
        Self {
            name: name.into(),
            value: MetricValue::Counter(delta),
        }
    }

    /// Gauge metric carrying a value.
    pub fn gauge(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value: MetricValue::Gauge(value),
        }
    }

    pub fn kind(&self) -> MetricKind {
        match self.value {
            MetricValue::Counter(_) => MetricKind::Counter,
            MetricValue::Gauge(_) => MetricKind::Gauge,
        }
    }

    pub fn key(&self) -> MetricKey {
        MetricKey {
            kind: self.kind(),
            name: self.name.clone(),
        }
    }
}

/// Wire and snapshot representation of a metric.
///
/// `delta` is populated for counters, `value` for gauges; the absent field
/// is omitted from the JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: MetricKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
}

impl From<&Metric> for MetricRecord {
    fn from(m: &Metric) -> Self {
        let (delta, value) = match m.value {
            MetricValue::Counter(d) => (Some(d), None),
            MetricValue::Gauge(v) => (None, Some(v)),
        };
        Self {
            id: m.name.clone(),
            kind: m.kind(),
            delta,
            value,
        }
    }
}

impl TryFrom<MetricRecord> for Metric {
    type Error = ModelError;

    fn try_from(rec: MetricRecord) -> Result<Self, Self::Error> {
        match rec.kind {
            MetricKind::Counter => {
                let delta = rec.delta.ok_or(ModelError::MissingDelta(rec.id.clone()))?;
                Ok(Metric::counter(rec.id, delta))
            }
            MetricKind::Gauge => {
                let value = rec.value.ok_or(ModelError::MissingValue(rec.id.clone()))?;
                Ok(Metric::gauge(rec.id, value))
            }
        }
    }
}
