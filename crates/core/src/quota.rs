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

use std::sync::Arc;

use jiff::{SignedDuration, Timestamp};

use crate::{ledger::TrafficLedger, store::GateStore, types::ClientQuotaState};

/// Length of the rolling quota window.
pub(crate) const QUOTA_WINDOW: SignedDuration = SignedDuration::from_secs(3600);

/// Outcome of a quota consumption attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaDecision {
    /// A download slot was granted (and counted, for ordinary clients)
    Granted,
    /// The client is out of slots until the window resets
    Denied { retry_after: SignedDuration },
}

impl QuotaDecision {
    #[must_use]
    pub const fn is_granted(&self) -> bool { matches!(self, Self::Granted) }
}

/// Per-client sliding-window admission control.
///
/// Grants at most `max_downloads_per_hour` download starts per client per
/// rolling hour. The window resets lazily when an access observes it expired
/// — boundaries are per-client and irregular, which is the documented
/// behavior, not an accident.
#[derive(Clone)]
pub struct QuotaLimiter {
    store:  Arc<GateStore>,
    ledger: TrafficLedger,
}

impl QuotaLimiter {
    #[must_use]
    pub const fn new(store: Arc<GateStore>, ledger: TrafficLedger) -> Self {
        Self { store, ledger }
    }

    /// Test-and-increment one download slot for `client_id`.
    ///
    /// Privileged clients are always granted and never touch quota state or
    /// the ledger's download count. For ordinary clients the window reset,
    /// the limit check, the count increment, and the ledger download-count
    /// increment all happen inside one critical section, so concurrent
    /// requests from the same identity can never both take the last slot.
    /// The ledger flush for an accepted start happens after the guard is
    /// released.
    pub async fn try_consume(&self, client_id: &str, is_privileged: bool) -> QuotaDecision {
        if is_privileged {
            return QuotaDecision::Granted;
        }

        let max = self.store.config().max_downloads_per_hour;
        let (decision, flush) = {
            let now = Timestamp::now();
            let mut inner = self.store.guard();
            let entry = inner
                .quota
                .entry(client_id.to_string())
                .or_insert_with(|| ClientQuotaState::new(now));

            let elapsed = now.duration_since(entry.window_start);
            if elapsed >= QUOTA_WINDOW {
                entry.count = 0;
                entry.window_start = now;
            }

            if entry.count >= max {
                let retry_after = QUOTA_WINDOW - now.duration_since(entry.window_start);
                (QuotaDecision::Denied { retry_after }, None)
            } else {
                entry.count += 1;
                inner.totals.total_downloads += 1;
                (QuotaDecision::Granted, Some(inner.totals))
            }
        };

        // Accepted starts are flushed synchronously, outside the guard.
        if let Some(totals) = flush {
            self.ledger.save_or_log(totals).await;
        }

        decision
    }
}
