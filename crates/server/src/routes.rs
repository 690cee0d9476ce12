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

use std::{net::SocketAddr, sync::Arc};

use axum::{
    Json, Router,
    body::Body,
    extract::{ConnectInfo, Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::{Deserialize, Serialize};
use tollgate_base::readable_size::ReadableSize;
use tollgate_core::DeliveryEngine;

use crate::error::{ApiError, ApiResult};

/// Header carrying the sponsor credential.
pub const SPONSOR_KEY_HEADER: &str = "x-sponsor-key";

/// Header reporting the speed class applied to a delivery.
pub const DOWNLOAD_SPEED_HEADER: &str = "x-download-speed";

/// The attr-char set of RFC 5987: everything else is percent-encoded in the
/// `filename*` disposition parameter.
const RFC5987_ENCODE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'!')
    .remove(b'#')
    .remove(b'$')
    .remove(b'&')
    .remove(b'+')
    .remove(b'-')
    .remove(b'.')
    .remove(b'^')
    .remove(b'_')
    .remove(b'`')
    .remove(b'|')
    .remove(b'~');

/// Register the gate API on a router.
///
/// Shaped for [`crate::http::start_rest_server`]'s route-handler registry:
/// the returned closure merges the stateful API routes into the server's
/// base router.
pub fn gate_routes(
    engine: Arc<DeliveryEngine>,
) -> impl Fn(Router) -> Router + Send + Sync + 'static {
    move |router: Router| {
        let api = Router::new()
            .route("/api/resources", get(list_resources))
            .route("/api/download/{id}", get(download_resource))
            .route("/api/verify-key", post(verify_key))
            .route("/api/stats", get(stats))
            .with_state(Arc::clone(&engine));
        router.merge(api)
    }
}

/// The identity per-client limits key on: the first `X-Forwarded-For` hop
/// when present (the gateway normally sits behind a reverse proxy), else the
/// peer socket address. Not authenticated.
fn client_identifier(headers: &HeaderMap, peer: SocketAddr) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map_or_else(|| peer.ip().to_string(), ToString::to_string)
}

fn credential_from(headers: &HeaderMap, query_key: Option<String>) -> Option<String> {
    headers
        .get(SPONSOR_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(ToString::to_string)
        .or(query_key)
}

#[derive(Debug, Deserialize)]
struct DownloadQuery {
    key: Option<String>,
}

/// `GET /api/download/{id}` — the gated delivery endpoint.
async fn download_resource(
    State(engine): State<Arc<DeliveryEngine>>,
    Path(id): Path<usize>,
    Query(query): Query<DownloadQuery>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let client_id = client_identifier(&headers, peer);
    let credential = credential_from(&headers, query.key);

    let delivery = engine
        .deliver(id, credential.as_deref(), &client_id)
        .await?;

    let filename = utf8_percent_encode(&delivery.display_name, RFC5987_ENCODE);
    let disposition = format!("attachment; filename*=UTF-8''{filename}");

    let mut response = Response::new(Body::from_stream(delivery.stream));
    let response_headers = response.headers_mut();
    response_headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/octet-stream"),
    );
    response_headers.insert(
        header::CONTENT_LENGTH,
        HeaderValue::from_str(&delivery.file_size.to_string()).map_err(|_| ApiError::Internal)?,
    );
    response_headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_str(&disposition).map_err(|_| ApiError::Internal)?,
    );
    response_headers.insert(
        DOWNLOAD_SPEED_HEADER,
        HeaderValue::from_str(&delivery.speed_class.to_string())
            .map_err(|_| ApiError::Internal)?,
    );
    Ok(response)
}

#[derive(Debug, Serialize)]
struct ResourceSummary {
    id:                  usize,
    display_name:        String,
    category:            Vec<String>,
    description:         String,
    file_size:           u64,
    file_size_formatted: String,
    available:           bool,
}

#[derive(Debug, Serialize)]
struct ResourceListResponse {
    resources: Vec<ResourceSummary>,
}

/// `GET /api/resources` — the catalog, decorated with on-disk sizes.
async fn list_resources(State(engine): State<Arc<DeliveryEngine>>) -> Json<ResourceListResponse> {
    let mut resources = Vec::with_capacity(engine.catalog().len());
    for (id, resource) in engine.catalog().list().iter().enumerate() {
        let size = tokio::fs::metadata(&resource.file_path)
            .await
            .ok()
            .map(|metadata| metadata.len());
        resources.push(ResourceSummary {
            id,
            display_name: resource.display_name.clone(),
            category: resource.category.clone(),
            description: resource.description.clone(),
            file_size: size.unwrap_or(0),
            file_size_formatted: size
                .map_or_else(|| "missing".to_string(), |n| ReadableSize(n).to_string()),
            available: size.is_some(),
        });
    }
    Json(ResourceListResponse { resources })
}

#[derive(Debug, Deserialize)]
struct VerifyKeyRequest {
    key: Option<String>,
}

#[derive(Debug, Serialize)]
struct VerifyKeyResponse {
    valid:   bool,
    message: String,
}

/// `POST /api/verify-key` — credential pre-check for clients.
///
/// Same authorizer path as a download, so the answer here matches what a
/// download would decide right now; it is not a grant that outlives the
/// response.
async fn verify_key(
    State(engine): State<Arc<DeliveryEngine>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(request): Json<VerifyKeyRequest>,
) -> Json<VerifyKeyResponse> {
    let client_id = client_identifier(&headers, peer);
    let valid = match request.key.as_deref() {
        None | Some("") => false,
        key => engine.sponsor().authorize(key, &client_id).await,
    };

    let message = if valid {
        "verification passed, downloads are unthrottled".to_string()
    } else {
        "verification failed, standard limits apply".to_string()
    };
    Json(VerifyKeyResponse { valid, message })
}

#[derive(Debug, Serialize)]
struct TotalTraffic {
    total_bytes:           u64,
    total_downloads:       u64,
    total_bytes_formatted: String,
}

#[derive(Debug, Serialize)]
struct StatsResponse {
    tracked_clients: usize,
    quota_clients:   usize,
    total_traffic:   TotalTraffic,
}

/// `GET /api/stats` — distinct-client counts and cumulative totals.
async fn stats(State(engine): State<Arc<DeliveryEngine>>) -> Json<StatsResponse> {
    let stats = engine.store().stats();
    Json(StatsResponse {
        tracked_clients: stats.tracked_clients,
        quota_clients:   stats.quota_clients,
        total_traffic:   TotalTraffic {
            total_bytes:           stats.totals.total_bytes,
            total_downloads:       stats.totals.total_downloads,
            total_bytes_formatted: ReadableSize(stats.totals.total_bytes).to_string(),
        },
    })
}
