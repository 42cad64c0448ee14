//! Test fixtures for integration tests.
//!
//! Provides helpers for:
//! - Building stores with instant operation timings
//! - Driving worker rounds in-process
//! - Issuing requests against the router and decoding JSON bodies
//! - Running a live server on an ephemeral port

use std::net::SocketAddr;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use calcflow::api;
use calcflow::config::OperationTimings;
use calcflow::core::{Task, TaskOutcome, TaskReport};
use calcflow::orchestration::{ExpressionStore, WorkerProtocol};

pub const LONG_LEASE: Duration = Duration::from_secs(30);

/// Store with a long lease and zero operation times.
pub fn test_store() -> ExpressionStore {
    ExpressionStore::new(LONG_LEASE, OperationTimings::instant())
}

pub fn store_with_lease(lease: Duration) -> ExpressionStore {
    ExpressionStore::new(lease, OperationTimings::instant())
}

/// Evaluate a task the way an honest worker would.
pub fn compute(task: &Task) -> TaskReport {
    match task.evaluate() {
        TaskOutcome::Value(v) => TaskReport::value(task.id, v),
        TaskOutcome::Failed(reason) => TaskReport::failed(task.id, &reason),
    }
}

/// Pull and report tasks until nothing is ready. Returns the tasks seen.
pub async fn drain(protocol: &WorkerProtocol) -> Vec<Task> {
    let mut tasks = Vec::new();
    while let Some(task) = protocol.request_task().await {
        protocol
            .submit_result(compute(&task))
            .await
            .expect("report rejected");
        tasks.push(task);
    }
    tasks
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn post_raw(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Send one request through a fresh clone of `app`.
pub async fn send(app: &Router, req: Request<Body>) -> (StatusCode, serde_json::Value) {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), 1024 * 1024)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or_else(
        |_| serde_json::json!({ "raw": String::from_utf8_lossy(&bytes).to_string() }),
    );
    (status, json)
}

/// A server bound to an ephemeral localhost port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub store: ExpressionStore,
    pub cancel: CancellationToken,
    handle: tokio::task::JoinHandle<calcflow::Result<()>>,
}

impl TestServer {
    pub async fn start(store: ExpressionStore) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test listener");
        let addr = listener.local_addr().unwrap();
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(api::serve_on(listener, store.clone(), cancel.clone()));
        Self {
            addr,
            store,
            cancel,
            handle,
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub async fn stop(self) {
        self.cancel.cancel();
        self.handle
            .await
            .expect("server task panicked")
            .expect("server returned an error");
    }
}
