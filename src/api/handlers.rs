//! Route handlers.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::core::{ExpressionId, TaskReport};
use crate::orchestration::WorkerProtocol;
use crate::{clog_error, clog_warn, Error};

use super::payload::{
    Accepted, CalculateRequest, CalculateResponse, ErrorBody, ExpressionEnvelope, ExpressionList,
    TaskEnvelope, TaskResultRequest,
};

/// Error returned from a handler, rendered as `{"error": ...}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let status = match &err {
            Error::Parse(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Error::ExpressionNotFound(_) | Error::UnknownOperation(_) => StatusCode::NOT_FOUND,
            Error::InvalidReport(_) | Error::Json(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            clog_error!("Request failed: {}", err);
        }
        Self::new(status, err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        clog_warn!("Rejected request body: {}", rejection.body_text());
        Self::bad_request(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

fn parse_expression_id(raw: &str) -> ApiResult<ExpressionId> {
    raw.parse()
        .map_err(|_| ApiError::not_found(format!("Expression not found: {}", raw)))
}

pub async fn calculate(
    State(protocol): State<WorkerProtocol>,
    body: Result<Json<CalculateRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<CalculateResponse>)> {
    let Json(req) = body?;
    let id = protocol.store().submit(&req.expression).await?;
    Ok((StatusCode::CREATED, Json(CalculateResponse { id })))
}

pub async fn list_expressions(State(protocol): State<WorkerProtocol>) -> Json<ExpressionList> {
    let expressions = protocol.store().list_expressions().await;
    Json(ExpressionList { expressions })
}

pub async fn get_expression(
    State(protocol): State<WorkerProtocol>,
    Path(raw_id): Path<String>,
) -> ApiResult<Json<ExpressionEnvelope>> {
    let id = parse_expression_id(&raw_id)?;
    let expression = protocol.store().get_expression(&id).await?;
    Ok(Json(ExpressionEnvelope { expression }))
}

pub async fn request_task(
    State(protocol): State<WorkerProtocol>,
) -> ApiResult<Json<TaskEnvelope>> {
    match protocol.request_task().await {
        Some(task) => Ok(Json(TaskEnvelope { task })),
        None => Err(ApiError::not_found(super::NO_TASK_AVAILABLE)),
    }
}

pub async fn submit_result(
    State(protocol): State<WorkerProtocol>,
    body: Result<Json<TaskResultRequest>, JsonRejection>,
) -> ApiResult<Json<Accepted>> {
    let Json(req) = body?;
    let report = TaskReport::try_from(req)?;
    protocol.submit_result(report).await?;
    Ok(Json(Accepted::new()))
}
