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

use std::fmt;

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

/// Per-client download-count window.
///
/// The window resets lazily on access once it is an hour old; a client that
/// never comes back keeps its stale window until the next request observes
/// it.
#[derive(Debug, Clone, Copy)]
pub struct ClientQuotaState {
    /// When the current window started
    pub window_start: Timestamp,
    /// Download starts granted inside the current window
    pub count:        u32,
}

impl ClientQuotaState {
    #[must_use]
    pub const fn new(now: Timestamp) -> Self {
        Self {
            window_start: now,
            count:        0,
        }
    }
}

/// Per-client pacing window, reset lazily once it is a second old.
///
/// `bytes_sent` feeds introspection only; the pacing delay is computed from
/// the per-chunk ratio alone.
#[derive(Debug, Clone, Copy)]
pub struct ClientSpeedState {
    /// When the current window started
    pub window_start: Timestamp,
    /// Bytes emitted to this client inside the current window
    pub bytes_sent:   u64,
}

impl ClientSpeedState {
    #[must_use]
    pub const fn new(now: Timestamp) -> Self {
        Self {
            window_start: now,
            bytes_sent:   0,
        }
    }
}

/// Cumulative traffic counters, both monotonic.
///
/// This is the durable shape of the ledger: it round-trips through the
/// persisted JSON record. Missing fields load as zero so a partial or absent
/// record is never fatal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrafficTotals {
    /// Total bytes handed to client transports since first start
    pub total_bytes:     u64,
    /// Total accepted download starts since first start
    pub total_downloads: u64,
}

/// The speed class applied to a single delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeedClass {
    /// No pacing applied (sponsor)
    Unlimited,
    /// Paced to the fixed Mbps ceiling
    Limited { mbps: u64 },
}

impl fmt::Display for SpeedClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unlimited => f.write_str("unlimited"),
            Self::Limited { mbps } => write!(f, "{mbps}Mbps"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_totals_load_with_missing_fields() {
        let totals: TrafficTotals = serde_json::from_str("{\"total_bytes\": 42}").unwrap();
        assert_eq!(totals.total_bytes, 42);
        assert_eq!(totals.total_downloads, 0);

        let empty: TrafficTotals = serde_json::from_str("{}").unwrap();
        assert_eq!(empty, TrafficTotals::default());
    }

    #[test]
    fn test_speed_class_display() {
        assert_eq!(SpeedClass::Unlimited.to_string(), "unlimited");
        assert_eq!(SpeedClass::Limited { mbps: 10 }.to_string(), "10Mbps");
    }
}
