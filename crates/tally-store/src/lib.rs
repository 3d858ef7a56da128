//! tally-store — the collector's in-memory metric store.
//!
//! Holds the latest value per `(kind, name)` under a single read/write lock,
//! applies counter-merge/gauge-overwrite semantics, and persists its full
//! contents to a JSON snapshot file (either synchronously on every update or
//! from a periodic background loop).

pub mod error;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use store::{MetricStore, StoreConfig};
