//! JSON request and response bodies.

use serde::{Deserialize, Serialize};

use crate::core::{Expression, ExpressionId, Task, TaskId, TaskReport};
use crate::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CalculateRequest {
    pub expression: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalculateResponse {
    pub id: ExpressionId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpressionEnvelope {
    pub expression: Expression,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpressionList {
    pub expressions: Vec<Expression>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskEnvelope {
    pub task: Task,
}

/// A worker's report. Exactly one of `result` and `error` must be set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskResultRequest {
    pub id: TaskId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TaskResultRequest {
    pub fn from_report(report: &TaskReport) -> Self {
        match &report.outcome {
            crate::core::TaskOutcome::Value(v) => Self {
                id: report.id,
                result: Some(*v),
                error: None,
            },
            crate::core::TaskOutcome::Failed(reason) => Self {
                id: report.id,
                result: None,
                error: Some(reason.clone()),
            },
        }
    }
}

impl TryFrom<TaskResultRequest> for TaskReport {
    type Error = Error;

    fn try_from(req: TaskResultRequest) -> Result<Self> {
        match (req.result, req.error) {
            (Some(value), None) => Ok(TaskReport::value(req.id, value)),
            (None, Some(reason)) => Ok(TaskReport::failed(req.id, &reason)),
            (Some(_), Some(_)) => Err(Error::InvalidReport(
                "report must carry either 'result' or 'error', not both".to_string(),
            )),
            (None, None) => Err(Error::InvalidReport(
                "report must carry 'result' or 'error'".to_string(),
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Accepted {
    pub status: String,
}

impl Accepted {
    pub fn new() -> Self {
        Self {
            status: "accepted".to_string(),
        }
    }
}

impl Default for Accepted {
    fn default() -> Self {
        Self::new()
    }
}
