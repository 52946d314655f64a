//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{StatusCode, Uri};
use axum::Router;
use forecast_service::config::ServiceConfig;
use forecast_service::observability::{logging, Telemetry};
use tokio::net::TcpListener;
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::util::SubscriberInitExt;

/// How the mock collector answers export requests.
#[derive(Debug, Clone, Copy)]
#[allow(dead_code)]
pub enum Behavior {
    Accept,
    Reject(u16),
    Hang,
}

#[derive(Debug, Clone)]
pub struct Received {
    pub path: String,
    pub body: Bytes,
}

#[derive(Clone)]
struct CollectorState {
    behavior: Behavior,
    received: Arc<Mutex<Vec<Received>>>,
}

/// A mock OTLP/HTTP collector recording every request.
pub struct MockCollector {
    pub addr: SocketAddr,
    received: Arc<Mutex<Vec<Received>>>,
}

#[allow(dead_code)]
impl MockCollector {
    pub fn endpoint(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn received(&self) -> Vec<Received> {
        self.received.lock().unwrap().clone()
    }

    pub fn bodies_for(&self, path: &str) -> Vec<Bytes> {
        self.received()
            .into_iter()
            .filter(|r| r.path == path)
            .map(|r| r.body)
            .collect()
    }

    /// Wait until every path in `paths` has been hit at least once.
    pub async fn wait_for(&self, paths: &[&str], timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let received = self.received();
            if paths.iter().all(|p| received.iter().any(|r| r.path == *p)) {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }
}

async fn record(State(state): State<CollectorState>, uri: Uri, body: Bytes) -> StatusCode {
    state.received.lock().unwrap().push(Received {
        path: uri.path().to_string(),
        body,
    });

    match state.behavior {
        Behavior::Accept => StatusCode::OK,
        Behavior::Reject(code) => {
            StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
        }
        Behavior::Hang => std::future::pending().await,
    }
}

/// Start a mock collector on an ephemeral port.
pub async fn start_collector(behavior: Behavior) -> MockCollector {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let received = Arc::new(Mutex::new(Vec::new()));

    let app = Router::new().fallback(record).with_state(CollectorState {
        behavior,
        received: received.clone(),
    });
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    MockCollector { addr, received }
}

/// An endpoint nothing listens on.
#[allow(dead_code)]
pub async fn unreachable_endpoint() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

/// Config exporting to `endpoint` with short timers and fast retries.
#[allow(dead_code)]
pub fn test_config(endpoint: &str) -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.telemetry.exporter.endpoint = Some(endpoint.to_string());
    config.telemetry.exporter.timeout_ms = 1_000;
    config.telemetry.exporter.retry.max_attempts = 3;
    config.telemetry.exporter.retry.base_delay_ms = 5;
    config.telemetry.exporter.retry.max_delay_ms = 20;
    config.telemetry.batch.scheduled_delay_ms = 50;
    config.telemetry.metrics.interval_ms = 50;
    config.telemetry.drain_timeout_ms = 500;
    config
}

/// Config with telemetry switched off.
#[allow(dead_code)]
pub fn offline_config() -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.telemetry.enabled = false;
    config
}

/// Route this thread's `tracing` output through the telemetry bridges.
#[allow(dead_code)]
pub fn bridge(config: &ServiceConfig, telemetry: &Telemetry) -> DefaultGuard {
    logging::subscriber(config, telemetry).set_default()
}
