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

use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard},
};

use crate::{
    config::GateConfig,
    types::{ClientQuotaState, ClientSpeedState, TrafficTotals},
};

/// Shared mutable state for the gating core: the per-client quota and speed
/// maps plus the traffic totals, all behind a single lock.
///
/// The store is an explicit owned value passed by `Arc` into the components
/// that need it; there is no ambient/static state. Every mutation is a point
/// operation performed while holding the guard — the guard is never held
/// across chunk reads, pacing sleeps, or ledger file writes, so one
/// throttled client cannot stall another's bookkeeping.
///
/// Per-client entries are created lazily on first access and live for the
/// process lifetime; client cardinality is bounded by realistic traffic.
pub struct GateStore {
    config: GateConfig,
    inner:  Mutex<StoreInner>,
}

pub(crate) struct StoreInner {
    pub(crate) quota:  HashMap<String, ClientQuotaState>,
    pub(crate) speed:  HashMap<String, ClientSpeedState>,
    pub(crate) totals: TrafficTotals,
}

/// Point-in-time view of the store for the stats surface.
#[derive(Debug, Clone, Copy)]
pub struct StoreStats {
    /// Distinct clients with a speed-tracking entry
    pub tracked_clients: usize,
    /// Distinct clients with a quota entry
    pub quota_clients:   usize,
    /// Cumulative traffic totals
    pub totals:          TrafficTotals,
}

impl GateStore {
    #[must_use]
    pub fn new(config: GateConfig, totals: TrafficTotals) -> Self {
        Self {
            config,
            inner: Mutex::new(StoreInner {
                quota: HashMap::new(),
                speed: HashMap::new(),
                totals,
            }),
        }
    }

    #[must_use]
    pub const fn config(&self) -> &GateConfig { &self.config }

    /// Acquire the store guard for a point operation.
    pub(crate) fn guard(&self) -> MutexGuard<'_, StoreInner> {
        self.inner.lock().expect("gate store lock poisoned")
    }

    /// Current traffic totals.
    #[must_use]
    pub fn totals(&self) -> TrafficTotals { self.guard().totals }

    /// Snapshot for the stats surface.
    #[must_use]
    pub fn stats(&self) -> StoreStats {
        let inner = self.guard();
        StoreStats {
            tracked_clients: inner.speed.len(),
            quota_clients:   inner.quota.len(),
            totals:          inner.totals,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_snapshot_starts_empty() {
        let store = GateStore::new(GateConfig::default(), TrafficTotals::default());
        let stats = store.stats();
        assert_eq!(stats.tracked_clients, 0);
        assert_eq!(stats.quota_clients, 0);
        assert_eq!(stats.totals, TrafficTotals::default());
    }

    #[test]
    fn test_store_loads_persisted_totals() {
        let totals = TrafficTotals {
            total_bytes:     1024,
            total_downloads: 3,
        };
        let store = GateStore::new(GateConfig::default(), totals);
        assert_eq!(store.totals(), totals);
    }
}
