//! Compute agent.
//!
//! Runs a fixed number of worker loops against a remote orchestrator. Each
//! loop pulls one task at a time, waits out the task's simulated operation
//! time, computes it and posts the outcome back.

use std::time::Duration;

use reqwest::StatusCode;
use tokio_util::sync::CancellationToken;

use crate::api::{ErrorBody, TaskEnvelope, TaskResultRequest, NO_TASK_AVAILABLE, TASK_PATH};
use crate::config::Config;
use crate::core::{Task, TaskOutcome, TaskReport};
use crate::{clog, clog_debug, clog_warn, Error, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(500);
const ERROR_BACKOFF: Duration = Duration::from_secs(2);

#[derive(Clone)]
pub struct Agent {
    client: reqwest::Client,
    base_url: String,
    workers: usize,
    poll_interval: Duration,
    error_backoff: Duration,
}

impl Agent {
    pub fn new(base_url: &str, workers: usize) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            workers,
            poll_interval: POLL_INTERVAL,
            error_backoff: ERROR_BACKOFF,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.orchestrator_url, config.computing_power)
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_error_backoff(mut self, backoff: Duration) -> Self {
        self.error_backoff = backoff;
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    fn task_url(&self) -> String {
        format!("{}{}", self.base_url, TASK_PATH)
    }

    /// Pull one task. `None` when the orchestrator has nothing ready.
    ///
    /// A 404 that is not the empty-queue reply (a wrong base URL, say) is an
    /// error rather than an idle poll.
    pub async fn fetch_task(&self) -> Result<Option<Task>> {
        let response = self.client.get(self.task_url()).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            let body = response.text().await?;
            return match serde_json::from_str::<ErrorBody>(&body) {
                Ok(err) if err.error == NO_TASK_AVAILABLE => Ok(None),
                _ => Err(Error::UnexpectedResponse(format!(
                    "404 from {}: {}",
                    self.task_url(),
                    body
                ))),
            };
        }
        let envelope: TaskEnvelope = response.error_for_status()?.json().await?;
        Ok(Some(envelope.task))
    }

    /// Post a report for a previously fetched task.
    pub async fn send_result(&self, report: &TaskReport) -> Result<()> {
        let response = self
            .client
            .post(self.task_url())
            .json(&TaskResultRequest::from_report(report))
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::NOT_FOUND => Err(Error::UnknownOperation(report.id)),
            StatusCode::BAD_REQUEST => Err(Error::InvalidReport(response.text().await?)),
            _ => {
                response.error_for_status()?;
                Ok(())
            }
        }
    }

    /// Compute a task after its simulated operation time.
    pub async fn execute(task: &Task) -> TaskReport {
        if task.operation_time > 0 {
            tokio::time::sleep(Duration::from_millis(task.operation_time)).await;
        }
        match task.evaluate() {
            TaskOutcome::Value(value) => TaskReport::value(task.id, value),
            TaskOutcome::Failed(reason) => TaskReport::failed(task.id, &reason),
        }
    }

    /// Run all worker loops until `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) {
        clog!(
            "Agent starting {} workers against {}",
            self.workers,
            self.base_url
        );

        let loops = (0..self.workers).map(|n| self.worker_loop(n + 1, cancel.clone()));
        futures::future::join_all(loops).await;

        clog!("Agent stopped");
    }

    async fn worker_loop(&self, worker: usize, cancel: CancellationToken) {
        clog_debug!("Worker {} starting", worker);

        while !cancel.is_cancelled() {
            let pause = match self.step(worker).await {
                Ok(true) => Duration::ZERO,
                Ok(false) => self.poll_interval,
                Err(e) => {
                    clog_warn!("Worker {}: {}", worker, e);
                    self.error_backoff
                }
            };

            if pause.is_zero() {
                continue;
            }
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(pause) => {}
            }
        }

        clog_debug!("Worker {} stopped", worker);
    }

    /// One pull-compute-report round. Returns `false` if there was no task.
    async fn step(&self, worker: usize) -> Result<bool> {
        let Some(task) = self.fetch_task().await? else {
            return Ok(false);
        };

        clog_debug!(
            "Worker {} got task {}: {} {} {}",
            worker,
            task.id.short(),
            task.arg1,
            task.operation,
            task.arg2
        );

        let report = Self::execute(&task).await;
        match self.send_result(&report).await {
            Ok(()) => {}
            // Lease expired while computing; the task has been handed out again.
            Err(Error::UnknownOperation(id)) => {
                clog_warn!("Worker {}: report for task {} was stale", worker, id.short());
            }
            Err(e) => return Err(e),
        }
        Ok(true)
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("base_url", &self.base_url)
            .field("workers", &self.workers)
            .finish()
    }
}
