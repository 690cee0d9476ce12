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

use std::{sync::Arc, time::Duration};

use jiff::{SignedDuration, Timestamp};

use crate::{store::GateStore, types::ClientSpeedState};

/// Length of the rolling speed window.
pub(crate) const SPEED_WINDOW: SignedDuration = SignedDuration::from_secs(1);

/// Per-client pacing toward the fixed bandwidth ceiling.
///
/// The delay for a chunk is the per-chunk ratio `chunk_size /
/// max_bytes_per_second`, independent of how many bytes the client already
/// received in the current window. Pacing therefore approximates the target
/// rate rather than capping it exactly; the window's `bytes_sent` tally is
/// kept for introspection. The 1 s window resets lazily on access, so its
/// true length is "at least one second".
#[derive(Clone)]
pub struct SpeedThrottle {
    store: Arc<GateStore>,
}

impl SpeedThrottle {
    #[must_use]
    pub const fn new(store: Arc<GateStore>) -> Self { Self { store } }

    /// Compute the delay to apply before emitting a chunk to `client_id`,
    /// and account the chunk into the client's speed window.
    ///
    /// Privileged clients get zero delay and never touch speed state. The
    /// caller sleeps outside any lock.
    #[must_use]
    pub fn pace_chunk(&self, client_id: &str, chunk_size: usize, is_privileged: bool) -> Duration {
        if is_privileged {
            return Duration::ZERO;
        }

        let max_bytes_per_second = self.store.config().max_bytes_per_second();
        if max_bytes_per_second == 0 {
            return Duration::ZERO;
        }

        let now = Timestamp::now();
        let mut inner = self.store.guard();
        let entry = inner
            .speed
            .entry(client_id.to_string())
            .or_insert_with(|| ClientSpeedState::new(now));

        if now.duration_since(entry.window_start) >= SPEED_WINDOW {
            entry.bytes_sent = 0;
            entry.window_start = now;
        }

        #[allow(clippy::cast_precision_loss)]
        let delay = Duration::from_secs_f64(chunk_size as f64 / max_bytes_per_second as f64);
        entry.bytes_sent += chunk_size as u64;
        delay
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{GateConfig, TrafficTotals};

    fn throttle_with_mbps(mbps: u64) -> (SpeedThrottle, Arc<GateStore>) {
        let config = GateConfig {
            max_speed_mbps: mbps,
            ..GateConfig::default()
        };
        let store = Arc::new(GateStore::new(config, TrafficTotals::default()));
        (SpeedThrottle::new(Arc::clone(&store)), store)
    }

    #[test]
    fn test_delay_matches_chunk_ratio() {
        let (throttle, _store) = throttle_with_mbps(10);

        // 10 Mbps => 1_250_000 bytes/second; 8 KiB chunk ~ 6.55 ms.
        let delay = throttle.pace_chunk("10.0.0.1", 8192, false);
        let expected = 8192.0 / 1_250_000.0;
        assert!((delay.as_secs_f64() - expected).abs() < 1e-9);
    }

    #[test]
    fn test_delay_scales_linearly_with_chunk_size() {
        let (throttle, _store) = throttle_with_mbps(10);

        let small = throttle.pace_chunk("10.0.0.1", 4096, false);
        let large = throttle.pace_chunk("10.0.0.1", 8192, false);
        assert!((large.as_secs_f64() - 2.0 * small.as_secs_f64()).abs() < 1e-9);
    }

    #[test]
    fn test_delay_inverse_in_ceiling() {
        let (slow, _s1) = throttle_with_mbps(10);
        let (fast, _s2) = throttle_with_mbps(20);

        let slow_delay = slow.pace_chunk("10.0.0.1", 8192, false);
        let fast_delay = fast.pace_chunk("10.0.0.1", 8192, false);
        assert!((slow_delay.as_secs_f64() - 2.0 * fast_delay.as_secs_f64()).abs() < 1e-9);
    }

    #[test]
    fn test_privileged_is_unthrottled_and_untracked() {
        let (throttle, store) = throttle_with_mbps(10);

        assert_eq!(throttle.pace_chunk("10.0.0.1", 8192, true), Duration::ZERO);
        assert_eq!(store.stats().tracked_clients, 0);
    }

    #[test]
    fn test_bytes_accumulate_within_window() {
        let (throttle, store) = throttle_with_mbps(10);

        let _ = throttle.pace_chunk("10.0.0.1", 8192, false);
        let _ = throttle.pace_chunk("10.0.0.1", 8192, false);

        let inner = store.guard();
        assert_eq!(inner.speed.get("10.0.0.1").unwrap().bytes_sent, 16384);
    }

    #[test]
    fn test_expired_window_resets_tally() {
        let (throttle, store) = throttle_with_mbps(10);

        let _ = throttle.pace_chunk("10.0.0.1", 8192, false);
        {
            let mut inner = store.guard();
            let entry = inner.speed.get_mut("10.0.0.1").unwrap();
            entry.window_start -= SignedDuration::from_secs(2);
        }
        let _ = throttle.pace_chunk("10.0.0.1", 100, false);

        let inner = store.guard();
        assert_eq!(inner.speed.get("10.0.0.1").unwrap().bytes_sent, 100);
    }
}
