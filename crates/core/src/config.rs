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

use std::path::PathBuf;

use bon::Builder;
use jiff::SignedDuration;
use smart_default::SmartDefault;
use tollgate_base::readable_size::ReadableSize;

use crate::types::SpeedClass;

/// Configuration for the gating-and-streaming core.
#[derive(Debug, Clone, SmartDefault, Builder)]
pub struct GateConfig {
    /// Bandwidth ceiling for ordinary clients, in megabits per second
    /// (default: 10)
    #[default = 10]
    pub max_speed_mbps: u64,

    /// Download-start quota per client per rolling hour (default: 5)
    #[default = 5]
    pub max_downloads_per_hour: u32,

    /// Size of each chunk read from disk and emitted to the client
    /// (default: 8KiB)
    #[default(ReadableSize::kb(8))]
    pub chunk_size: ReadableSize,

    /// Cumulative byte interval between durable ledger flushes on the
    /// streaming path (default: 1MiB)
    #[default(ReadableSize::mb(1))]
    pub flush_interval: ReadableSize,

    /// Endpoint of the external sponsor verification service
    #[default = "http://127.0.0.1:5001/verify"]
    pub verify_url: String,

    /// Timeout for the sponsor verification call
    #[default(SignedDuration::from_secs(5))]
    pub verify_timeout: SignedDuration,

    /// Path of the durable traffic ledger
    #[default(PathBuf::from("data/traffic_stats.json"))]
    pub ledger_path: PathBuf,

    /// Path of the resource catalog file
    #[default(PathBuf::from("data/resources.json"))]
    pub catalog_path: PathBuf,
}

impl GateConfig {
    /// The byte-per-second budget derived from the configured Mbps ceiling.
    #[must_use]
    pub const fn max_bytes_per_second(&self) -> u64 { self.max_speed_mbps * 1_000_000 / 8 }

    /// The speed class applied to a request.
    #[must_use]
    pub const fn speed_class(&self, is_privileged: bool) -> SpeedClass {
        if is_privileged {
            SpeedClass::Unlimited
        } else {
            SpeedClass::Limited {
                mbps: self.max_speed_mbps,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_budget() {
        let config = GateConfig::default();
        assert_eq!(config.max_bytes_per_second(), 1_250_000);
        assert_eq!(config.chunk_size.as_bytes(), 8192);
    }

    #[test]
    fn test_speed_class() {
        let config = GateConfig::default();
        assert_eq!(config.speed_class(true).to_string(), "unlimited");
        assert_eq!(config.speed_class(false).to_string(), "10Mbps");
    }
}
