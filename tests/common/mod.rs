// tests/common/mod.rs
//
// Shared fixtures: an in-process HTTP server standing in for the external
// APIs, and scripted `SourceClient`s for aggregator/scheduler tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use devops_status_aggregator::aggregate::Snapshot;
use devops_status_aggregator::config::SourceConfig;
use devops_status_aggregator::render::Renderer;
use devops_status_aggregator::sources::types::{
    FetchError, RawResponse, SourceClient, SourceKind,
};
use serde_json::{json, Value};

/// Bind `127.0.0.1:0`, build the router with the resulting base URL and serve it.
pub async fn serve_with<F>(build: F) -> String
where
    F: FnOnce(String) -> Router,
{
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("should bind to random port");
    let base = format!("http://{}", listener.local_addr().expect("local addr"));
    let router = build(base.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    base
}

pub async fn serve(router: Router) -> String {
    serve_with(|_| router).await
}

/// Base URL of a port nobody listens on.
pub async fn closed_base_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("should bind to random port");
    let port = listener.local_addr().expect("local addr").port();
    drop(listener);
    format!("http://127.0.0.1:{port}")
}

pub const TS_MS: i64 = 1_700_000_000_000;

pub fn build_detail(number: i64) -> Value {
    json!({
        "number": number,
        "result": "SUCCESS",
        "duration": number * 1_000,
        "timestamp": TS_MS + number,
        "building": false,
    })
}

/// A well-formed payload for `kind` with a few rows.
pub fn sample_payload(kind: SourceKind) -> Value {
    match kind {
        SourceKind::Jenkins => json!({ "builds": [build_detail(3), build_detail(2)] }),
        SourceKind::ArgoCd => json!({ "items": [
            { "metadata": { "name": "api" },
              "status": { "sync": { "status": "Synced" }, "health": { "status": "Healthy" } } }
        ]}),
        SourceKind::DockerHub => json!({ "results": [
            { "name": "latest", "last_updated": "2024-05-01T10:20:30Z" },
            { "name": "1.2.0", "last_updated": "2024-04-28T08:00:00Z" }
        ]}),
        SourceKind::Cluster => json!({ "items": [
            { "status": { "phase": "Running" } },
            { "status": { "phase": "Running" } },
            { "status": { "phase": "Pending" } }
        ]}),
    }
}

pub fn config_for(kind: SourceKind, timeout_ms: u64) -> SourceConfig {
    SourceConfig::new(kind, Some(format!("http://fake/{}", kind.id())), timeout_ms)
}

pub fn all_configs(timeout_ms: u64) -> Vec<SourceConfig> {
    SourceKind::ALL
        .iter()
        .map(|k| config_for(*k, timeout_ms))
        .collect()
}

pub enum Script {
    Answer,
    Fail(FetchError),
    Panic,
}

/// Scripted client: optional delay, then answer, fail or panic.
pub struct FakeClient {
    pub kind: SourceKind,
    pub delay: Duration,
    pub script: Script,
    pub calls: Arc<AtomicUsize>,
}

impl FakeClient {
    pub fn answering(kind: SourceKind) -> Self {
        Self {
            kind,
            delay: Duration::ZERO,
            script: Script::Answer,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_script(mut self, script: Script) -> Self {
        self.script = script;
        self
    }

    pub fn with_counter(mut self, calls: Arc<AtomicUsize>) -> Self {
        self.calls = calls;
        self
    }
}

#[async_trait::async_trait]
impl SourceClient for FakeClient {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    async fn fetch_raw(&self, _cfg: &SourceConfig) -> Result<RawResponse, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match &self.script {
            Script::Answer => Ok(sample_payload(self.kind)),
            Script::Fail(e) => Err(e.clone()),
            Script::Panic => panic!("scripted client panic"),
        }
    }
}

/// Records every snapshot it is handed.
#[derive(Default)]
pub struct CollectingRenderer {
    pub seen: Mutex<Vec<Snapshot>>,
}

impl CollectingRenderer {
    pub fn count(&self) -> usize {
        self.seen.lock().unwrap().len()
    }
}

impl Renderer for CollectingRenderer {
    fn render(&self, snapshot: Snapshot) {
        self.seen.lock().unwrap().push(snapshot);
    }
}
