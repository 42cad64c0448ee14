//! Worker protocol façade.
//!
//! The two calls a worker makes: pull a task, and report what happened to
//! it. Reports are validated here; everything else is delegated to the
//! store.

use crate::core::{Task, TaskOutcome, TaskReport};
use crate::orchestration::store::ExpressionStore;
use crate::{clog_debug, clog_warn, Error, Result};

#[derive(Clone, Debug)]
pub struct WorkerProtocol {
    store: ExpressionStore,
}

impl WorkerProtocol {
    pub fn new(store: ExpressionStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &ExpressionStore {
        &self.store
    }

    /// Next ready task, or `None` when nothing is ready. Never waits.
    pub async fn request_task(&self) -> Option<Task> {
        let task = self.store.dispatch().await;
        if task.is_none() {
            clog_debug!("Task requested, none available");
        }
        task
    }

    /// Apply a worker's report.
    pub async fn submit_result(&self, report: TaskReport) -> Result<()> {
        if let Err(e) = validate(&report) {
            clog_warn!("Rejected report for task {}: {}", report.id, e);
            return Err(e);
        }

        let outcome = match &report.outcome {
            TaskOutcome::Value(value) => self.store.complete_operation(&report.id, *value).await,
            TaskOutcome::Failed(reason) => self.store.fail_operation(&report.id, reason).await,
        };

        if let Err(e) = &outcome {
            clog_warn!("Rejected report for task {}: {}", report.id, e);
        }
        outcome
    }
}

fn validate(report: &TaskReport) -> Result<()> {
    match &report.outcome {
        TaskOutcome::Value(value) if !value.is_finite() => Err(Error::InvalidReport(format!(
            "result must be a finite number, got {}",
            value
        ))),
        TaskOutcome::Failed(reason) if reason.trim().is_empty() => Err(Error::InvalidReport(
            "failure reason must not be empty".to_string(),
        )),
        _ => Ok(()),
    }
}
