//! HTTP surface.
//!
//! Public routes live under `/api/v1`, the worker pull protocol under
//! `/internal`. Every handler shares one [`WorkerProtocol`] as router state.

mod handlers;
mod payload;

use std::net::SocketAddr;
use std::time::Instant;

use axum::extract::Request;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::orchestration::{ExpressionStore, WorkerProtocol};
use crate::{clog, clog_debug, Result};

pub use handlers::{ApiError, ApiResult};
pub use payload::{
    Accepted, CalculateRequest, CalculateResponse, ErrorBody, ExpressionEnvelope, ExpressionList,
    TaskEnvelope, TaskResultRequest,
};

pub const CALCULATE_PATH: &str = "/api/v1/calculate";
pub const EXPRESSIONS_PATH: &str = "/api/v1/expressions";
pub const TASK_PATH: &str = "/internal/task";

/// Error text of the 404 returned when the ready queue is empty.
pub const NO_TASK_AVAILABLE: &str = "no task available";

/// Build the router over `store`.
pub fn router(store: ExpressionStore) -> Router {
    Router::new()
        .route(CALCULATE_PATH, post(handlers::calculate))
        .route(EXPRESSIONS_PATH, get(handlers::list_expressions))
        .route("/api/v1/expressions/:id", get(handlers::get_expression))
        .route(
            TASK_PATH,
            get(handlers::request_task).post(handlers::submit_result),
        )
        .layer(middleware::from_fn(log_request))
        .with_state(WorkerProtocol::new(store))
}

/// Serve the API on `addr` until `cancel` fires.
pub async fn serve(addr: SocketAddr, store: ExpressionStore, cancel: CancellationToken) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;
    serve_on(listener, store, cancel).await
}

/// Serve the API on an already bound listener.
pub async fn serve_on(
    listener: TcpListener,
    store: ExpressionStore,
    cancel: CancellationToken,
) -> Result<()> {
    let local = listener.local_addr()?;
    clog!("Orchestrator listening on http://{}", local);

    axum::serve(listener, router(store))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await?;

    clog!("Orchestrator on {} stopped", local);
    Ok(())
}

async fn log_request(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let started = Instant::now();

    let response = next.run(req).await;

    clog_debug!(
        "{} {} -> {} ({:?})",
        method,
        path,
        response.status().as_u16(),
        started.elapsed()
    );
    response
}
