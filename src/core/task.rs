//! Task data model for the worker protocol.
//!
//! A task is the dispatchable snapshot of one ready operation. Each dispatch
//! mints a fresh `TaskId`, which also identifies the lease: a report carrying
//! the id of an expired lease no longer matches anything.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::expression::ExpressionId;
use super::operation::{OperationId, Operator};

/// Unique identifier for one dispatch of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub Uuid);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Return first 8 characters of the UUID for display.
    pub fn short(&self) -> String {
        self.0.to_string()[..8].to_string()
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for TaskId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// A unit of work handed to a worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub expression_id: ExpressionId,
    pub operation_id: OperationId,
    pub arg1: f64,
    pub arg2: f64,
    pub operation: Operator,
    /// Simulated execution time in milliseconds.
    pub operation_time: u64,
}

impl Task {
    /// Compute the task locally.
    pub fn evaluate(&self) -> TaskOutcome {
        match self.operation.apply(self.arg1, self.arg2) {
            Ok(value) if value.is_finite() => TaskOutcome::Value(value),
            Ok(value) => TaskOutcome::Failed(format!("result is not a finite number: {}", value)),
            Err(e) => TaskOutcome::Failed(e.to_string()),
        }
    }
}

/// What a worker reports back for a task.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome {
    Value(f64),
    Failed(String),
}

/// A worker's report for one task.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskReport {
    pub id: TaskId,
    pub outcome: TaskOutcome,
}

impl TaskReport {
    pub fn value(id: TaskId, value: f64) -> Self {
        Self {
            id,
            outcome: TaskOutcome::Value(value),
        }
    }

    pub fn failed(id: TaskId, reason: &str) -> Self {
        Self {
            id,
            outcome: TaskOutcome::Failed(reason.to_string()),
        }
    }
}
