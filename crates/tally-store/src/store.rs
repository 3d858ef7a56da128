//! MetricStore — last-value metric storage with snapshot/restore.
//!
//! All mutation goes through [`MetricStore::update`] and
//! [`MetricStore::restore`] under the write lock, all reads through
//! [`MetricStore::get`] and [`MetricStore::list`] under the read lock. The
//! backing map is never exposed; `list` hands out an independent copy.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex, RwLock};
use tracing::{debug, info, warn};

use tally_model::{Metric, MetricKey, MetricKind, MetricRecord, MetricValue};

use crate::error::{StoreError, StoreResult};

/// Convert any `Display` error into a `StoreError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StoreError::$variant(e.to_string())
    };
}

/// Store construction parameters.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Path of the JSON snapshot file.
    pub snapshot_path: PathBuf,
    /// Snapshot synchronously on every update instead of on a timer.
    pub sync_on_update: bool,
}

/// Thread-safe metric store keyed by `(kind, name)`.
#[derive(Clone)]
pub struct MetricStore {
    metrics: Arc<RwLock<HashMap<MetricKey, Metric>>>,
    snapshot_path: Arc<PathBuf>,
    /// Serializes snapshot writers: the temp path is shared, so only one
    /// write+rename may be in flight at a time.
    snapshot_lock: Arc<Mutex<()>>,
    sync_on_update: bool,
}

impl MetricStore {
    /// Create an empty store.
    pub fn new(config: StoreConfig) -> Self {
        Self {
            metrics: Arc::new(RwLock::new(HashMap::new())),
            snapshot_path: Arc::new(config.snapshot_path),
            snapshot_lock: Arc::new(Mutex::new(())),
            sync_on_update: config.sync_on_update,
        }
    }

    /// Apply an update and return the post-merge metric.
    ///
    /// Counters add the incoming delta to the stored delta (0 if absent);
    /// gauges overwrite unconditionally. With sync-on-update enabled, a
    /// snapshot is taken before returning and its failure surfaced — the
    /// in-memory update itself is never rolled back.
    pub async fn update(&self, metric: Metric) -> StoreResult<Metric> {
        let merged = {
            let mut metrics = self.metrics.write().await;
            let key = metric.key();
            let merged = match (metrics.get(&key), metric.value) {
                (Some(current), MetricValue::Counter(delta)) => {
                    let MetricValue::Counter(stored) = current.value else {
                        // Entries are keyed by kind, so a counter slot only
                        // ever holds a counter.
                        unreachable!("counter entry holds non-counter value");
                    };
                    Metric::counter(metric.name, stored.saturating_add(delta))
                }
                _ => metric,
            };
            metrics.insert(key, merged.clone());
            merged
        };

        if self.sync_on_update {
            self.snapshot().await?;
        }
        Ok(merged)
    }

    /// Look up a metric by its exact `(kind, name)` identity.
    pub async fn get(&self, kind: MetricKind, name: &str) -> StoreResult<Metric> {
        let metrics = self.metrics.read().await;
        let key = MetricKey {
            kind,
            name: name.to_string(),
        };
        metrics
            .get(&key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("{kind}/{name}")))
    }

    /// Point-in-time copy of all stored metrics.
    pub async fn list(&self) -> HashMap<MetricKey, Metric> {
        let metrics = self.metrics.read().await;
        metrics.clone()
    }

    /// Serialize the full store contents to the snapshot file.
    ///
    /// The records are written to a temp file and renamed over the target,
    /// so a failed write never leaves a mix of old and new content. Writers
    /// are serialized by the snapshot lock; the map is read only after the
    /// lock is held, so later snapshots carry later state.
    pub async fn snapshot(&self) -> StoreResult<()> {
        let _writer = self.snapshot_lock.lock().await;

        let records = {
            let metrics = self.metrics.read().await;
            let mut records: Vec<(MetricKey, MetricRecord)> = metrics
                .iter()
                .map(|(key, m)| (key.clone(), MetricRecord::from(m)))
                .collect();
            // Stable file contents for identical store states.
            records.sort_by(|(a, _), (b, _)| a.cmp(b));
            records
                .into_iter()
                .map(|(_, rec)| rec)
                .collect::<Vec<MetricRecord>>()
        };

        let data = serde_json::to_vec(&records).map_err(map_err!(Serialize))?;

        let tmp_path = self.snapshot_path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, &data).await.map_err(map_err!(Io))?;
        tokio::fs::rename(&tmp_path, self.snapshot_path.as_ref())
            .await
            .map_err(map_err!(Io))?;

        debug!(path = ?self.snapshot_path, metrics = records.len(), "snapshot written");
        Ok(())
    }

    /// Replace the store contents from the snapshot file.
    ///
    /// A missing file is a normal first run and leaves the store empty;
    /// malformed content is an error for the caller to judge.
    pub async fn restore(&self) -> StoreResult<()> {
        let data = match tokio::fs::read(self.snapshot_path.as_ref()).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = ?self.snapshot_path, "no snapshot file, starting empty");
                return Ok(());
            }
            Err(e) => return Err(StoreError::Io(e.to_string())),
        };

        let records: Vec<MetricRecord> =
            serde_json::from_slice(&data).map_err(map_err!(Deserialize))?;

        let mut restored = HashMap::with_capacity(records.len());
        for rec in records {
            let metric = Metric::try_from(rec)?;
            restored.insert(metric.key(), metric);
        }

        let mut metrics = self.metrics.write().await;
        let count = restored.len();
        *metrics = restored;
        info!(path = ?self.snapshot_path, metrics = count, "store restored from snapshot");
        Ok(())
    }

    /// Run the periodic snapshot loop until the shutdown signal.
    ///
    /// Snapshot failures are logged and the loop continues; a final snapshot
    /// is attempted on shutdown.
    pub async fn run_periodic_snapshots(
        &self,
        interval: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!(interval_secs = interval.as_secs(), "periodic snapshot loop started");

        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {
                    if let Err(e) = self.snapshot().await {
                        warn!(error = %e, "periodic snapshot failed");
                    }
                }
                _ = shutdown.changed() => {
                    info!("snapshot loop shutting down");
                    if let Err(e) = self.snapshot().await {
                        warn!(error = %e, "final snapshot failed");
                    }
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_store(dir: &TempDir, sync_on_update: bool) -> MetricStore {
        MetricStore::new(StoreConfig {
            snapshot_path: dir.path().join("metrics.json"),
            sync_on_update,
        })
    }

    // ── Merge semantics ────────────────────────────────────────────

    #[tokio::test]
    async fn counter_updates_accumulate() {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir, false);

        store.update(Metric::counter("hits", 5)).await.unwrap();
        let merged = store.update(Metric::counter("hits", 3)).await.unwrap();
        assert_eq!(merged, Metric::counter("hits", 8));

        let stored = store.get(MetricKind::Counter, "hits").await.unwrap();
        assert_eq!(stored, Metric::counter("hits", 8));
    }

    #[tokio::test]
    async fn gauge_updates_overwrite() {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir, false);

        store.update(Metric::gauge("temp", 1.5)).await.unwrap();
        let merged = store.update(Metric::gauge("temp", 2.75)).await.unwrap();
        assert_eq!(merged, Metric::gauge("temp", 2.75));

        let stored = store.get(MetricKind::Gauge, "temp").await.unwrap();
        assert_eq!(stored, Metric::gauge("temp", 2.75));
    }

    #[tokio::test]
    async fn same_name_different_kinds_are_distinct() {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir, false);

        store.update(Metric::counter("load", 2)).await.unwrap();
        store.update(Metric::gauge("load", 0.5)).await.unwrap();

        assert_eq!(
            store.get(MetricKind::Counter, "load").await.unwrap(),
            Metric::counter("load", 2)
        );
        assert_eq!(
            store.get(MetricKind::Gauge, "load").await.unwrap(),
            Metric::gauge("load", 0.5)
        );
    }

    #[tokio::test]
    async fn get_missing_is_not_found() {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir, false);

        let err = store.get(MetricKind::Counter, "missing").await.unwrap_err();
        assert!(err.is_not_found());
        assert!(store.list().await.is_empty());

        // A same-named gauge does not satisfy a counter lookup.
        store.update(Metric::gauge("missing", 1.0)).await.unwrap();
        let err = store.get(MetricKind::Counter, "missing").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn list_returns_independent_copy() {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir, false);

        store.update(Metric::counter("hits", 1)).await.unwrap();
        let listed = store.list().await;
        assert_eq!(listed.len(), 1);

        store.update(Metric::counter("hits", 9)).await.unwrap();
        store.update(Metric::gauge("temp", 3.0)).await.unwrap();

        // The earlier copy is unaffected by later mutation.
        assert_eq!(listed.len(), 1);
        let key = MetricKey {
            kind: MetricKind::Counter,
            name: "hits".to_string(),
        };
        assert_eq!(listed.get(&key), Some(&Metric::counter("hits", 1)));
    }

    // ── Snapshot / restore ─────────────────────────────────────────

    #[tokio::test]
    async fn snapshot_restore_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir, false);

        store.update(Metric::counter("hits", 8)).await.unwrap();
        store.update(Metric::gauge("temp", 2.75)).await.unwrap();
        store.update(Metric::gauge("mem_used", 1024.0)).await.unwrap();
        store.snapshot().await.unwrap();

        let restored = test_store(&dir, false);
        restored.restore().await.unwrap();
        assert_eq!(restored.list().await, store.list().await);
    }

    #[tokio::test]
    async fn restore_missing_file_starts_empty() {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir, false);

        store.restore().await.unwrap();
        assert!(store.list().await.is_empty());
    }

    #[tokio::test]
    async fn restore_malformed_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("metrics.json"), b"not json").unwrap();

        let store = test_store(&dir, false);
        let err = store.restore().await.unwrap_err();
        assert!(matches!(err, StoreError::Deserialize(_)));
    }

    #[tokio::test]
    async fn restore_replaces_existing_contents() {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir, false);
        store.update(Metric::counter("hits", 8)).await.unwrap();
        store.snapshot().await.unwrap();

        store.update(Metric::counter("hits", 100)).await.unwrap();
        store.update(Metric::gauge("temp", 1.0)).await.unwrap();

        store.restore().await.unwrap();
        let listed = store.list().await;
        assert_eq!(listed.len(), 1);
        assert_eq!(
            store.get(MetricKind::Counter, "hits").await.unwrap(),
            Metric::counter("hits", 8)
        );
    }

    #[tokio::test]
    async fn sync_on_update_writes_file_per_update() {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir, true);
        let path = dir.path().join("metrics.json");

        store.update(Metric::counter("hits", 5)).await.unwrap();
        assert!(path.exists());

        let restored = test_store(&dir, false);
        restored.restore().await.unwrap();
        assert_eq!(
            restored.get(MetricKind::Counter, "hits").await.unwrap(),
            Metric::counter("hits", 5)
        );
    }

    #[tokio::test]
    async fn snapshots_of_equal_state_are_byte_identical() {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir, false);
        store.update(Metric::counter("b", 1)).await.unwrap();
        store.update(Metric::gauge("a", 2.0)).await.unwrap();

        store.snapshot().await.unwrap();
        let first = std::fs::read(dir.path().join("metrics.json")).unwrap();
        store.snapshot().await.unwrap();
        let second = std::fs::read(dir.path().join("metrics.json")).unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn sync_on_update_surfaces_write_failure_without_rollback() {
        let dir = TempDir::new().unwrap();
        let store = MetricStore::new(StoreConfig {
            // Unwritable: the parent directory does not exist.
            snapshot_path: dir.path().join("missing").join("metrics.json"),
            sync_on_update: true,
        });

        let err = store.update(Metric::counter("hits", 5)).await.unwrap_err();
        assert!(matches!(err, StoreError::Io(_)));

        // Durability failure is reported, not undone.
        assert_eq!(
            store.get(MetricKind::Counter, "hits").await.unwrap(),
            Metric::counter("hits", 5)
        );
    }

    // ── Concurrency ────────────────────────────────────────────────

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_sync_on_update_snapshots_never_interleave() {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir, true);

        // Every update snapshots; concurrent writers must not splice bytes
        // into each other's temp file or rename it out from under them.
        let mut tasks = Vec::new();
        for name_idx in 0..20 {
            for _ in 0..5 {
                let store = store.clone();
                tasks.push(tokio::spawn(async move {
                    store
                        .update(Metric::counter(format!("c{name_idx}"), 1))
                        .await
                        .unwrap();
                }));
            }
        }
        for t in tasks {
            t.await.unwrap();
        }

        // The final file is one coherent snapshot of the final state.
        let restored = test_store(&dir, false);
        restored.restore().await.unwrap();
        for name_idx in 0..20 {
            assert_eq!(
                restored
                    .get(MetricKind::Counter, &format!("c{name_idx}"))
                    .await
                    .unwrap(),
                Metric::counter(format!("c{name_idx}"), 5)
            );
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_counter_updates_lose_nothing() {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir, false);

        let mut tasks = Vec::new();
        for name_idx in 0..100 {
            for _ in 0..10 {
                let store = store.clone();
                tasks.push(tokio::spawn(async move {
                    store
                        .update(Metric::counter(format!("c{name_idx}"), 1))
                        .await
                        .unwrap();
                }));
            }
        }
        for t in tasks {
            t.await.unwrap();
        }

        for name_idx in 0..100 {
            let stored = store
                .get(MetricKind::Counter, &format!("c{name_idx}"))
                .await
                .unwrap();
            assert_eq!(stored.value, MetricValue::Counter(10));
        }
    }
}
