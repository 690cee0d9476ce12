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

mod catalog;
mod config;
mod delivery;
mod error;
mod ledger;
mod quota;
mod sponsor;
mod store;
mod throttle;
mod types;

pub use catalog::{Resource, ResourceCatalog};
pub use config::GateConfig;
pub use delivery::{Delivery, DeliveryEngine};
pub use error::GateError;
pub use ledger::TrafficLedger;
pub use quota::{QuotaDecision, QuotaLimiter};
pub use sponsor::SponsorAuthorizer;
pub use store::{GateStore, StoreStats};
pub use throttle::SpeedThrottle;
pub use types::{ClientQuotaState, ClientSpeedState, SpeedClass, TrafficTotals};
