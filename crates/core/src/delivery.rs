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

use bytes::Bytes;
use futures::stream::{self, BoxStream, Stream, StreamExt};
use snafu::ResultExt;
use tokio::{fs::File, io::AsyncReadExt};
use tracing::debug;

use crate::{
    catalog::ResourceCatalog,
    config::GateConfig,
    error::{FileMissingSnafu, FileReadSnafu, GateError, QuotaExceededSnafu, ResourceNotFoundSnafu},
    ledger::TrafficLedger,
    quota::{QuotaDecision, QuotaLimiter},
    sponsor::SponsorAuthorizer,
    store::GateStore,
    throttle::SpeedThrottle,
    types::{SpeedClass, TrafficTotals},
};

/// A granted download, ready to be handed to the transport.
pub struct Delivery {
    /// Size of the underlying file, known up front
    pub file_size:    u64,
    /// Name the client should save the file as
    pub display_name: String,
    /// Speed class applied to this delivery
    pub speed_class:  SpeedClass,
    /// The chunked file body
    pub stream:       BoxStream<'static, Result<Bytes, std::io::Error>>,
}

impl std::fmt::Debug for Delivery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Delivery")
            .field("file_size", &self.file_size)
            .field("display_name", &self.display_name)
            .field("speed_class", &self.speed_class)
            .field("stream", &"<stream>")
            .finish()
    }
}

/// Orchestrates a download request through authorization, admission, and the
/// paced streaming loop.
///
/// Components:
/// - `SponsorAuthorizer`: per-request credential check against the external
///   verification service
/// - `QuotaLimiter`: hourly download-count admission, skipped for sponsors
/// - `SpeedThrottle`: per-chunk pacing toward the bandwidth ceiling, skipped
///   for sponsors
/// - `TrafficLedger`: cumulative accounting with periodic durable flushes
///
/// A request moves through `Requested → Authorized → QuotaChecked →
/// Streaming → Completed | Aborted`; the first three phases happen inside
/// [`DeliveryEngine::deliver`], the streaming phase lives in the returned
/// body and ends when it is drained or dropped. Accounting already applied
/// when a client disconnects mid-stream is deliberately kept: counts record
/// attempted, not fully delivered, downloads.
pub struct DeliveryEngine {
    store:    Arc<GateStore>,
    catalog:  Arc<ResourceCatalog>,
    ledger:   TrafficLedger,
    quota:    QuotaLimiter,
    throttle: SpeedThrottle,
    sponsor:  SponsorAuthorizer,
}

impl DeliveryEngine {
    /// Load persisted state and assemble the engine.
    pub async fn open(config: GateConfig) -> Self {
        let totals = TrafficLedger::load(&config.ledger_path).await;
        let catalog = Arc::new(ResourceCatalog::load(&config.catalog_path).await);
        Self::with_catalog(config, catalog, totals)
    }

    /// Assemble the engine around an already-built catalog.
    #[must_use]
    pub fn with_catalog(
        config: GateConfig,
        catalog: Arc<ResourceCatalog>,
        totals: TrafficTotals,
    ) -> Self {
        let sponsor = SponsorAuthorizer::new(&config);
        let ledger_path = config.ledger_path.clone();
        let store = Arc::new(GateStore::new(config, totals));
        let ledger = TrafficLedger::new(Arc::clone(&store), ledger_path);
        let quota = QuotaLimiter::new(Arc::clone(&store), ledger.clone());
        let throttle = SpeedThrottle::new(Arc::clone(&store));

        Self {
            store,
            catalog,
            ledger,
            quota,
            throttle,
            sponsor,
        }
    }

    #[must_use]
    pub const fn store(&self) -> &Arc<GateStore> { &self.store }

    #[must_use]
    pub const fn catalog(&self) -> &Arc<ResourceCatalog> { &self.catalog }

    #[must_use]
    pub const fn sponsor(&self) -> &SponsorAuthorizer { &self.sponsor }

    #[must_use]
    pub fn config(&self) -> &GateConfig { self.store.config() }

    /// Run a download request up to the streaming phase.
    ///
    /// Resolves the resource, consults the authorizer (at most one external
    /// call), and takes a quota slot. On success the returned [`Delivery`]
    /// carries the paced body; nothing has been read from disk yet. On
    /// denial no bytes are sent and — for a missing resource — no state is
    /// mutated at all.
    pub async fn deliver(
        &self,
        resource_id: usize,
        credential: Option<&str>,
        client_id: &str,
    ) -> Result<Delivery, GateError> {
        // Requested: resolve the id before touching any shared state.
        let Some(resource) = self.catalog.resolve(resource_id) else {
            return ResourceNotFoundSnafu { id: resource_id }.fail();
        };
        let Ok(metadata) = tokio::fs::metadata(&resource.file_path).await else {
            return FileMissingSnafu {
                path: resource.file_path.clone(),
            }
            .fail();
        };

        // Authorized: a failed or unreachable verification downgrades to
        // ordinary treatment, it never rejects the request.
        let is_privileged = self.sponsor.authorize(credential, client_id).await;

        // QuotaChecked: denial carries the time until the window resets.
        match self.quota.try_consume(client_id, is_privileged).await {
            QuotaDecision::Granted => {}
            QuotaDecision::Denied { retry_after } => {
                return QuotaExceededSnafu { retry_after }.fail();
            }
        }

        let file = File::open(&resource.file_path).await.context(FileReadSnafu)?;
        debug!(
            resource_id,
            client = client_id,
            privileged = is_privileged,
            size = metadata.len(),
            "streaming delivery started"
        );

        let stream = self.stream_chunks(file, client_id.to_string(), is_privileged);
        Ok(Delivery {
            file_size:    metadata.len(),
            display_name: resource.display_name.clone(),
            speed_class:  self.store.config().speed_class(is_privileged),
            stream:       stream.boxed(),
        })
    }

    /// The streaming phase: fixed-size chunks, each accounted in the ledger
    /// and paced through the throttle before emission.
    ///
    /// Ledger flushes and pacing sleeps happen outside the store guard.
    /// Dropping the stream mid-flight closes the file and keeps the
    /// accounting already applied.
    fn stream_chunks(
        &self,
        file: File,
        client_id: String,
        is_privileged: bool,
    ) -> impl Stream<Item = Result<Bytes, std::io::Error>> + Send + 'static {
        #[allow(clippy::cast_possible_truncation)]
        let chunk_size = self.store.config().chunk_size.as_bytes() as usize;
        let ledger = self.ledger.clone();
        let throttle = self.throttle.clone();

        stream::try_unfold(file, move |mut file| {
            let ledger = ledger.clone();
            let throttle = throttle.clone();
            let client_id = client_id.clone();
            async move {
                let mut buf = vec![0u8; chunk_size];
                let n = file.read(&mut buf).await?;
                if n == 0 {
                    // Completed: end of file.
                    return Ok(None);
                }
                buf.truncate(n);

                if let Some(snapshot) = ledger.record_bytes(n as u64) {
                    ledger.save_or_log(snapshot).await;
                }

                let delay = throttle.pace_chunk(&client_id, n, is_privileged);
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }

                Ok(Some((Bytes::from(buf), file)))
            }
        })
    }
}
