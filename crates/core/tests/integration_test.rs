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

use std::path::Path;

use axum::{Router, http::StatusCode, routing::get};
use axum_test::TestServer;
use futures::StreamExt;
use tempfile::TempDir;
use tollgate_core::{DeliveryEngine, GateConfig, GateError, SpeedClass, TrafficLedger};

const MIB: u64 = 1024 * 1024;

/// Spin up a stand-in for the sponsor verification service.
fn verify_server(status: StatusCode) -> TestServer {
    let app = Router::new().route("/verify", get(move || async move { status }));
    TestServer::builder()
        .http_transport()
        .try_build(app)
        .expect("failed to create test server")
}

fn verify_url(server: &TestServer) -> String {
    let base = server
        .server_address()
        .expect("server should have HTTP address")
        .to_string();
    if base.ends_with('/') {
        format!("{base}verify")
    } else {
        format!("{base}/verify")
    }
}

async fn write_catalog(dir: &Path, file_name: &str, display_name: &str, content: &[u8]) {
    let file_path = dir.join(file_name);
    tokio::fs::write(&file_path, content).await.unwrap();

    let catalog = serde_json::json!([{
        "file_path": file_path,
        "display_name": display_name,
        "category": ["test"],
        "description": "integration fixture",
    }]);
    tokio::fs::write(dir.join("resources.json"), catalog.to_string())
        .await
        .unwrap();
}

fn gate_config(dir: &Path) -> GateConfig {
    GateConfig {
        // Keep tests fast; pacing math is covered by unit tests.
        max_speed_mbps: 1000,
        ledger_path: dir.join("traffic_stats.json"),
        catalog_path: dir.join("resources.json"),
        ..GateConfig::default()
    }
}

async fn collect(delivery: tollgate_core::Delivery) -> Vec<u8> {
    let mut body = Vec::new();
    let mut stream = delivery.stream;
    while let Some(chunk) = stream.next().await {
        body.extend_from_slice(&chunk.unwrap());
    }
    body
}

#[tokio::test]
async fn stream_accounts_every_byte_and_flushes_per_mib() {
    let dir = TempDir::new().unwrap();
    let content = vec![7u8; (2 * MIB + MIB / 2) as usize];
    write_catalog(dir.path(), "payload.bin", "payload.bin", &content).await;

    let config = gate_config(dir.path());
    let ledger_path = config.ledger_path.clone();
    let engine = DeliveryEngine::open(config).await;

    let delivery = engine.deliver(0, None, "10.1.1.1").await.unwrap();
    assert_eq!(delivery.file_size, content.len() as u64);
    assert_eq!(delivery.speed_class, SpeedClass::Limited { mbps: 1000 });

    let body = collect(delivery).await;
    assert_eq!(body, content);

    // In-memory totals carry the full size.
    let totals = engine.store().totals();
    assert_eq!(totals.total_bytes, content.len() as u64);
    assert_eq!(totals.total_downloads, 1);

    // The durable record saw the last 1 MiB boundary crossing (the tail
    // half-MiB stays unflushed until the next crossing).
    let persisted = TrafficLedger::load(&ledger_path).await;
    assert_eq!(persisted.total_bytes, 2 * MIB);
    assert_eq!(persisted.total_downloads, 1);
}

#[tokio::test]
async fn ledger_survives_restart() {
    let dir = TempDir::new().unwrap();
    let content = vec![1u8; MIB as usize];
    write_catalog(dir.path(), "payload.bin", "payload.bin", &content).await;

    let config = gate_config(dir.path());
    let engine = DeliveryEngine::open(config.clone()).await;
    let delivery = engine.deliver(0, None, "10.1.1.1").await.unwrap();
    let _ = collect(delivery).await;
    drop(engine);

    // A fresh engine starts from the persisted record.
    let reopened = DeliveryEngine::open(config).await;
    let totals = reopened.store().totals();
    assert_eq!(totals.total_downloads, 1);
    assert_eq!(totals.total_bytes, MIB);
}

#[tokio::test]
async fn unknown_resource_mutates_nothing() {
    let dir = TempDir::new().unwrap();
    write_catalog(dir.path(), "payload.bin", "payload.bin", b"content").await;

    let engine = DeliveryEngine::open(gate_config(dir.path())).await;
    let err = engine.deliver(42, None, "10.1.1.1").await.unwrap_err();
    assert!(matches!(err, GateError::ResourceNotFound { id: 42 }));

    let stats = engine.store().stats();
    assert_eq!(stats.quota_clients, 0);
    assert_eq!(stats.tracked_clients, 0);
    assert_eq!(stats.totals.total_bytes, 0);
    assert_eq!(stats.totals.total_downloads, 0);
}

#[tokio::test]
async fn missing_file_mutates_nothing() {
    let dir = TempDir::new().unwrap();
    write_catalog(dir.path(), "payload.bin", "payload.bin", b"content").await;
    tokio::fs::remove_file(dir.path().join("payload.bin"))
        .await
        .unwrap();

    let engine = DeliveryEngine::open(gate_config(dir.path())).await;
    let err = engine.deliver(0, None, "10.1.1.1").await.unwrap_err();
    assert!(matches!(err, GateError::FileMissing { .. }));
    assert_eq!(engine.store().stats().quota_clients, 0);
}

#[tokio::test]
async fn quota_denial_sends_no_bytes() {
    let dir = TempDir::new().unwrap();
    write_catalog(dir.path(), "payload.bin", "payload.bin", b"content").await;

    let engine = DeliveryEngine::open(gate_config(dir.path())).await;
    for _ in 0..5 {
        let delivery = engine.deliver(0, None, "10.1.1.1").await.unwrap();
        let _ = collect(delivery).await;
    }

    let err = engine.deliver(0, None, "10.1.1.1").await.unwrap_err();
    let GateError::QuotaExceeded { retry_after } = err else {
        panic!("sixth download must be quota-denied");
    };
    assert!(retry_after.as_secs() <= 3600);

    // Denial happened before any read: totals stay at five files' worth.
    let totals = engine.store().totals();
    assert_eq!(totals.total_bytes, 7 * 5);
    assert_eq!(totals.total_downloads, 5);
}

#[tokio::test]
async fn sponsor_bypasses_quota_and_throttle() {
    let dir = TempDir::new().unwrap();
    write_catalog(dir.path(), "payload.bin", "payload.bin", b"sponsored").await;
    let verify = verify_server(StatusCode::OK);

    let config = GateConfig {
        verify_url: verify_url(&verify),
        ..gate_config(dir.path())
    };
    let engine = DeliveryEngine::open(config).await;

    // Well past the ordinary five-per-hour limit.
    for _ in 0..8 {
        let delivery = engine
            .deliver(0, Some("sponsor-key"), "10.1.1.1")
            .await
            .unwrap();
        assert_eq!(delivery.speed_class, SpeedClass::Unlimited);
        let _ = collect(delivery).await;
    }

    let stats = engine.store().stats();
    assert_eq!(stats.quota_clients, 0);
    assert_eq!(stats.tracked_clients, 0);
    // Sponsor traffic still counts toward total bytes.
    assert_eq!(stats.totals.total_bytes, 9 * 8);
    // Sponsor starts are not metered as quota downloads.
    assert_eq!(stats.totals.total_downloads, 0);
}

#[tokio::test]
async fn failed_verification_downgrades_to_ordinary() {
    let dir = TempDir::new().unwrap();
    write_catalog(dir.path(), "payload.bin", "payload.bin", b"content").await;
    let verify = verify_server(StatusCode::UNAUTHORIZED);

    let config = GateConfig {
        verify_url: verify_url(&verify),
        ..gate_config(dir.path())
    };
    let engine = DeliveryEngine::open(config).await;

    // The download still proceeds, just without privileges.
    let delivery = engine
        .deliver(0, Some("stale-key"), "10.1.1.1")
        .await
        .unwrap();
    assert_eq!(delivery.speed_class, SpeedClass::Limited { mbps: 1000 });
    let _ = collect(delivery).await;
    assert_eq!(engine.store().stats().quota_clients, 1);
}

#[tokio::test]
async fn dropped_stream_keeps_applied_accounting() {
    let dir = TempDir::new().unwrap();
    let content = vec![3u8; 64 * 1024];
    write_catalog(dir.path(), "payload.bin", "payload.bin", &content).await;

    let engine = DeliveryEngine::open(gate_config(dir.path())).await;
    let delivery = engine.deliver(0, None, "10.1.1.1").await.unwrap();

    // Take a couple of chunks, then hang up.
    let mut stream = delivery.stream;
    let first = stream.next().await.unwrap().unwrap();
    let second = stream.next().await.unwrap().unwrap();
    drop(stream);

    let totals = engine.store().totals();
    assert_eq!(totals.total_bytes, (first.len() + second.len()) as u64);
    // The download start stays counted: attempted, not fully delivered.
    assert_eq!(totals.total_downloads, 1);
}
