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

use tracing::debug;

use crate::config::GateConfig;

/// Checks a client-supplied credential against the external verification
/// service.
///
/// The decision is per-request and never cached: the same key may verify on
/// one request and fail on the next, and that is the service's call to make.
/// Every failure mode — absent key, non-success status, transport error,
/// timeout — degrades to "ordinary client"; verification trouble is never an
/// error the download path sees.
#[derive(Clone)]
pub struct SponsorAuthorizer {
    client:     reqwest::Client,
    verify_url: String,
}

impl SponsorAuthorizer {
    /// Build an authorizer from the gate configuration.
    ///
    /// The HTTP client is constructed once and reused across requests.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client fails to build (should never happen with
    /// valid config)
    #[must_use]
    pub fn new(config: &GateConfig) -> Self {
        let timeout: std::time::Duration = config
            .verify_timeout
            .try_into()
            .expect("verify timeout must be non-negative");

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("tollgate/", env!("CARGO_PKG_VERSION")))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            verify_url: config.verify_url.clone(),
        }
    }

    /// Verify `credential` for `client_id`, issuing at most one outbound
    /// request.
    ///
    /// An absent or empty credential short-circuits to `false` without any
    /// network I/O. Any 2xx response from the verification service means
    /// privileged; everything else means ordinary.
    pub async fn authorize(&self, credential: Option<&str>, client_id: &str) -> bool {
        let Some(key) = credential.filter(|key| !key.is_empty()) else {
            return false;
        };

        let response = self
            .client
            .get(&self.verify_url)
            .header("key", key)
            .header("X-Client-IP", client_id)
            .send()
            .await;

        match response {
            Ok(response) => response.status().is_success(),
            Err(err) => {
                debug!(%err, "sponsor verification unavailable, treating as ordinary client");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::{Router, http::StatusCode, routing::get};
    use axum_test::TestServer;
    use jiff::SignedDuration;

    use super::*;

    fn verify_server(status: StatusCode) -> TestServer {
        let app = Router::new().route("/verify", get(move || async move { status }));
        TestServer::builder()
            .http_transport()
            .try_build(app)
            .expect("failed to create test server")
    }

    fn authorizer_for(server: &TestServer) -> SponsorAuthorizer {
        let base = server.server_address().unwrap().to_string();
        let config = GateConfig {
            verify_url: format!("{}verify", base),
            ..GateConfig::default()
        };
        SponsorAuthorizer::new(&config)
    }

    #[tokio::test]
    async fn test_absent_credential_is_ordinary() {
        let server = verify_server(StatusCode::OK);
        let authorizer = authorizer_for(&server);

        assert!(!authorizer.authorize(None, "10.0.0.1").await);
        assert!(!authorizer.authorize(Some(""), "10.0.0.1").await);
    }

    #[tokio::test]
    async fn test_success_status_is_privileged() {
        let server = verify_server(StatusCode::OK);
        let authorizer = authorizer_for(&server);

        assert!(authorizer.authorize(Some("sponsor-key"), "10.0.0.1").await);
    }

    #[tokio::test]
    async fn test_non_success_status_is_ordinary() {
        for status in [
            StatusCode::UNAUTHORIZED,
            StatusCode::FORBIDDEN,
            StatusCode::INTERNAL_SERVER_ERROR,
        ] {
            let server = verify_server(status);
            let authorizer = authorizer_for(&server);
            assert!(!authorizer.authorize(Some("sponsor-key"), "10.0.0.1").await);
        }
    }

    #[tokio::test]
    async fn test_unreachable_service_is_ordinary() {
        let config = GateConfig {
            verify_url: "http://127.0.0.1:1/verify".to_string(),
            verify_timeout: SignedDuration::from_secs(1),
            ..GateConfig::default()
        };
        let authorizer = SponsorAuthorizer::new(&config);

        assert!(!authorizer.authorize(Some("sponsor-key"), "10.0.0.1").await);
    }
}
