//! Expression data model.
//!
//! An expression is one user submission and its evaluation lifecycle. It is
//! created by the store on submission and only ever moves forward through
//! `pending -> in_progress -> done | failed`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::operation::OperationId;

/// Unique identifier for a submitted expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExpressionId(pub Uuid);

impl ExpressionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Return first 8 characters of the UUID for display.
    pub fn short(&self) -> String {
        self.0.to_string()[..8].to_string()
    }
}

impl Default for ExpressionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ExpressionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ExpressionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpressionStatus {
    /// Submitted, no operation dispatched yet.
    Pending,
    /// At least one operation has been handed to a worker.
    InProgress,
    Done,
    Failed,
}

impl ExpressionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ExpressionStatus::Done | ExpressionStatus::Failed)
    }
}

impl std::fmt::Display for ExpressionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExpressionStatus::Pending => write!(f, "pending"),
            ExpressionStatus::InProgress => write!(f, "in_progress"),
            ExpressionStatus::Done => write!(f, "done"),
            ExpressionStatus::Failed => write!(f, "failed"),
        }
    }
}

/// A submitted expression as exposed to status polling and listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expression {
    pub id: ExpressionId,
    /// Original source text.
    #[serde(rename = "expression")]
    pub source: String,
    pub status: ExpressionStatus,
    /// Final value, present only when `done`.
    pub result: Option<f64>,
    /// Failure reason, present only when `failed`.
    pub error: Option<String>,
    /// Operation whose result is the expression's result. `None` for a bare literal.
    #[serde(skip)]
    pub root: Option<OperationId>,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Expression {
    pub fn new(source: &str, root: Option<OperationId>) -> Self {
        Self {
            id: ExpressionId::new(),
            source: source.to_string(),
            status: ExpressionStatus::Pending,
            result: None,
            error: None,
            root,
            created_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Transition `pending -> in_progress`. No-op in any other state.
    pub fn start(&mut self) {
        if self.status == ExpressionStatus::Pending {
            self.status = ExpressionStatus::InProgress;
        }
    }

    pub fn complete(&mut self, value: f64) {
        self.status = ExpressionStatus::Done;
        self.result = Some(value);
        self.finished_at = Some(Utc::now());
    }

    pub fn fail(&mut self, reason: &str) {
        self.status = ExpressionStatus::Failed;
        self.error = Some(reason.to_string());
        self.finished_at = Some(Utc::now());
    }

    pub fn is_finished(&self) -> bool {
        self.status.is_terminal()
    }
}
