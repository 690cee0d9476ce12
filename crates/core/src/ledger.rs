// Copyright 2025 Crrow
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::{path::PathBuf, sync::Arc};

use snafu::ResultExt;
use tokio::fs;
use tracing::warn;

use crate::{
    error::{GateError, LedgerWriteSnafu},
    store::GateStore,
    types::TrafficTotals,
};

/// Durable traffic accounting.
///
/// Counters live in the [`GateStore`]; this type owns the load/save contract
/// against the on-disk JSON record and the decision of when the streaming
/// path has to flush. Increment-under-lock and serialize-to-disk are two
/// separate steps: the guard is released before any file I/O happens.
#[derive(Clone)]
pub struct TrafficLedger {
    store: Arc<GateStore>,
    path:  Arc<PathBuf>,
}

impl TrafficLedger {
    #[must_use]
    pub fn new(store: Arc<GateStore>, path: PathBuf) -> Self {
        Self {
            store,
            path: Arc::new(path),
        }
    }

    /// Load persisted totals from `path`.
    ///
    /// A missing or unparsable record initializes both counters to zero —
    /// this is never fatal.
    pub async fn load(path: &std::path::Path) -> TrafficTotals {
        match fs::read_to_string(path).await {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|err| {
                warn!(path = %path.display(), %err, "traffic ledger unparsable, starting from zero");
                TrafficTotals::default()
            }),
            Err(_) => TrafficTotals::default(),
        }
    }

    /// Record `n` transmitted bytes under the store guard.
    ///
    /// Returns a totals snapshot when the increment crossed a flush-interval
    /// boundary (default 1 MiB); the caller performs the durable write after
    /// the guard is gone. Safe to call once per 8 KiB chunk.
    #[must_use]
    pub fn record_bytes(&self, n: u64) -> Option<TrafficTotals> {
        let interval = self.store.config().flush_interval.as_bytes();
        let mut inner = self.store.guard();
        let before = inner.totals.total_bytes;
        inner.totals.total_bytes += n;
        if interval > 0 && before / interval != inner.totals.total_bytes / interval {
            Some(inner.totals)
        } else {
            None
        }
    }

    /// Persist a totals snapshot.
    pub async fn save(&self, totals: TrafficTotals) -> Result<(), GateError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await.context(LedgerWriteSnafu {
                path: self.path.as_ref().clone(),
            })?;
        }

        let raw = serde_json::to_string_pretty(&totals).expect("totals serialize to json");
        fs::write(self.path.as_ref(), raw)
            .await
            .context(LedgerWriteSnafu {
                path: self.path.as_ref().clone(),
            })
    }

    /// Persist a totals snapshot, logging and swallowing failures.
    ///
    /// Persistence trouble must never abort an in-flight download; the
    /// in-memory counters stay authoritative until the next successful
    /// flush.
    pub async fn save_or_log(&self, totals: TrafficTotals) {
        if let Err(err) = self.save(totals).await {
            warn!(%err, "traffic ledger flush failed, keeping in-memory totals");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tempfile::TempDir;

    use super::*;
    use crate::config::GateConfig;

    fn test_store() -> Arc<GateStore> {
        Arc::new(GateStore::new(GateConfig::default(), TrafficTotals::default()))
    }

    #[tokio::test]
    async fn test_load_missing_file_is_zero() {
        let dir = TempDir::new().unwrap();
        let totals = TrafficLedger::load(&dir.path().join("absent.json")).await;
        assert_eq!(totals, TrafficTotals::default());
    }

    #[tokio::test]
    async fn test_load_corrupt_file_is_zero() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ledger.json");
        tokio::fs::write(&path, "{not json").await.unwrap();
        let totals = TrafficLedger::load(&path).await;
        assert_eq!(totals, TrafficTotals::default());
    }

    #[tokio::test]
    async fn test_save_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("ledger.json");
        let ledger = TrafficLedger::new(test_store(), path.clone());

        let totals = TrafficTotals {
            total_bytes:     2 * 1024 * 1024,
            total_downloads: 7,
        };
        ledger.save(totals).await.unwrap();
        assert_eq!(TrafficLedger::load(&path).await, totals);
    }

    #[tokio::test]
    async fn test_record_bytes_flushes_on_boundary_crossings_only() {
        let store = test_store();
        let ledger = TrafficLedger::new(Arc::clone(&store), PathBuf::from("unused.json"));
        let chunk = 8192u64;
        let chunks_per_mib = (1024 * 1024) / chunk;

        let mut flushes = 0;
        for _ in 0..chunks_per_mib * 3 {
            if ledger.record_bytes(chunk).is_some() {
                flushes += 1;
            }
        }

        assert_eq!(flushes, 3);
        assert_eq!(store.totals().total_bytes, 3 * 1024 * 1024);
    }

    #[tokio::test]
    async fn test_record_bytes_flushes_with_irregular_chunks() {
        let store = test_store();
        let ledger = TrafficLedger::new(Arc::clone(&store), PathBuf::from("unused.json"));

        // A tail chunk that jumps past the boundary without landing on an
        // exact multiple still triggers a flush.
        assert!(ledger.record_bytes(1024 * 1024 - 100).is_none());
        assert!(ledger.record_bytes(300).is_some());
    }
}
