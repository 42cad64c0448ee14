//! Expression state store.
//!
//! The store is the single source of truth for submitted expressions, their
//! operation graphs, the ready queue and the outstanding leases. All of it
//! sits behind one `RwLock`, so every mutation observes and leaves a
//! consistent state. Each mutating method validates everything it needs
//! before changing anything.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::RwLock;

use crate::config::OperationTimings;
use crate::core::{
    Expression, ExpressionId, ExpressionStatus, Operation, OperationGraph, OperationStatus,
    Task, TaskId,
};
use crate::orchestration::scheduler::{Lease, OperationRef, Scheduler};
use crate::parser;
use crate::{clog, clog_debug, clog_warn, Error, Result};

struct ExpressionRecord {
    expression: Expression,
    graph: OperationGraph,
}

struct StoreState {
    /// Submission order.
    records: Vec<ExpressionRecord>,
    index: HashMap<ExpressionId, usize>,
    scheduler: Scheduler,
}

impl StoreState {
    fn record(&self, id: &ExpressionId) -> Option<&ExpressionRecord> {
        self.index.get(id).map(|&i| &self.records[i])
    }

    fn record_mut(&mut self, id: &ExpressionId) -> Option<&mut ExpressionRecord> {
        match self.index.get(id) {
            Some(&i) => self.records.get_mut(i),
            None => None,
        }
    }

    /// Resolve a task identifier to its lease, checking that the leased
    /// operation is still dispatched in a live expression.
    fn dispatched(&self, task_id: &TaskId) -> Result<Lease> {
        let lease = *self
            .scheduler
            .lease_for(task_id)
            .ok_or(Error::UnknownOperation(*task_id))?;

        let record = self
            .record(&lease.target.expression)
            .ok_or(Error::UnknownOperation(*task_id))?;
        if record.expression.is_finished() {
            return Err(Error::UnknownOperation(*task_id));
        }
        match record.graph.get(lease.target.operation) {
            Some(op) if op.status == OperationStatus::Dispatched => Ok(lease),
            _ => Err(Error::UnknownOperation(*task_id)),
        }
    }
}

/// Counters describing the store at one instant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub expressions: usize,
    pub pending: usize,
    pub in_progress: usize,
    pub done: usize,
    pub failed: usize,
    pub ready_operations: usize,
    pub leased_operations: usize,
}

/// Shared handle to the expression store. Cheap to clone.
#[derive(Clone)]
pub struct ExpressionStore {
    state: Arc<RwLock<StoreState>>,
    timings: OperationTimings,
}

impl ExpressionStore {
    pub fn new(lease_duration: Duration, timings: OperationTimings) -> Self {
        Self {
            state: Arc::new(RwLock::new(StoreState {
                records: Vec::new(),
                index: HashMap::new(),
                scheduler: Scheduler::new(lease_duration),
            })),
            timings,
        }
    }

    /// Parse `source`, register its operations and enqueue the ready ones.
    ///
    /// A parse error creates nothing. A bare literal is recorded as `done`
    /// immediately.
    pub async fn submit(&self, source: &str) -> Result<ExpressionId> {
        let ast = parser::parse(source)?;
        let mut graph = OperationGraph::from_expr(&ast);
        let ready = graph.ready_operations();

        let mut expression = Expression::new(source, graph.root());
        if let Some(value) = graph.literal() {
            expression.complete(value);
        }
        let id = expression.id;

        let mut state = self.state.write().await;
        for op in &ready {
            state.scheduler.enqueue(OperationRef::new(id, *op));
        }
        let position = state.records.len();
        state.records.push(ExpressionRecord { expression, graph });
        state.index.insert(id, position);
        drop(state);

        clog!(
            "Submitted expression {} '{}' ({} ready)",
            id.short(),
            source,
            ready.len()
        );
        Ok(id)
    }

    pub async fn get_expression(&self, id: &ExpressionId) -> Result<Expression> {
        let state = self.state.read().await;
        state
            .record(id)
            .map(|record| record.expression.clone())
            .ok_or(Error::ExpressionNotFound(*id))
    }

    /// All expressions in submission order.
    pub async fn list_expressions(&self) -> Vec<Expression> {
        let state = self.state.read().await;
        state
            .records
            .iter()
            .map(|record| record.expression.clone())
            .collect()
    }

    /// Snapshot of an expression's operations in identifier order.
    pub async fn operations(&self, id: &ExpressionId) -> Result<Vec<Operation>> {
        let state = self.state.read().await;
        let record = state.record(id).ok_or(Error::ExpressionNotFound(*id))?;
        Ok(record.graph.operations().into_iter().cloned().collect())
    }

    /// Hand out the next ready operation as a task, or `None` if nothing is
    /// ready.
    pub async fn dispatch(&self) -> Option<Task> {
        self.dispatch_at(Instant::now()).await
    }

    pub async fn dispatch_at(&self, now: Instant) -> Option<Task> {
        let mut guard = self.state.write().await;
        let state = &mut *guard;

        while let Some(target) = state.scheduler.next_ready() {
            let Some(&position) = state.index.get(&target.expression) else {
                continue;
            };
            let record = &mut state.records[position];
            if record.expression.is_finished() {
                continue;
            }
            let Some(op) = record.graph.get_mut(target.operation) else {
                continue;
            };
            if op.status != OperationStatus::Ready {
                continue;
            }
            let Some((arg1, arg2)) = op.operand_values() else {
                continue;
            };

            op.dispatch();
            let operation = op.operator;
            let dispatch_count = op.dispatch_count;
            record.expression.start();

            let task_id = state.scheduler.lease(target, now);
            let task = Task {
                id: task_id,
                expression_id: target.expression,
                operation_id: target.operation,
                arg1,
                arg2,
                operation,
                operation_time: self.timings.for_operator(operation).as_millis() as u64,
            };

            clog_debug!(
                "Dispatched {} as task {} (attempt {}): {} {} {}",
                target,
                task_id.short(),
                dispatch_count,
                arg1,
                operation,
                arg2
            );
            return Some(task);
        }

        None
    }

    /// Record the result of a dispatched task and propagate it.
    ///
    /// Fails with `UnknownOperation` if `task_id` is not an outstanding
    /// lease; nothing changes in that case.
    pub async fn complete_operation(&self, task_id: &TaskId, value: f64) -> Result<()> {
        let mut guard = self.state.write().await;
        let state = &mut *guard;

        let lease = state.dispatched(task_id)?;
        let target = lease.target;

        let Some(&position) = state.index.get(&target.expression) else {
            return Err(Error::UnknownOperation(*task_id));
        };
        let record = &mut state.records[position];
        let Some(newly_ready) = record.graph.complete(target.operation, value) else {
            return Err(Error::UnknownOperation(*task_id));
        };
        state.scheduler.release(task_id);

        for op in &newly_ready {
            state
                .scheduler
                .enqueue(OperationRef::new(target.expression, *op));
        }

        clog_debug!(
            "Task {} completed {} = {} ({} newly ready)",
            task_id.short(),
            target,
            value,
            newly_ready.len()
        );

        if record.expression.root == Some(target.operation) {
            record.expression.complete(value);
            clog!(
                "Expression {} done: {} = {}",
                target.expression.short(),
                record.expression.source,
                value
            );
        }
        Ok(())
    }

    /// Record a worker-reported failure. The expression fails and none of
    /// its remaining operations are dispatched.
    pub async fn fail_operation(&self, task_id: &TaskId, reason: &str) -> Result<()> {
        let mut guard = self.state.write().await;
        let state = &mut *guard;

        let lease = state.dispatched(task_id)?;
        let target = lease.target;

        let Some(record) = state.record_mut(&target.expression) else {
            return Err(Error::UnknownOperation(*task_id));
        };
        record.graph.fail(target.operation, reason);
        record.expression.fail(reason);

        let purged = state.scheduler.forget_expression(target.expression);

        clog_warn!(
            "Expression {} failed at {}: {} ({} queued entries dropped)",
            target.expression.short(),
            target.operation,
            reason,
            purged.saturating_sub(1)
        );
        Ok(())
    }

    /// Return every operation whose lease has expired to the ready queue.
    pub async fn requeue_expired(&self) -> usize {
        self.requeue_expired_at(Instant::now()).await
    }

    pub async fn requeue_expired_at(&self, now: Instant) -> usize {
        let mut guard = self.state.write().await;
        let state = &mut *guard;

        let expired = state.scheduler.take_expired(now);
        let mut requeued = 0;

        for (task_id, lease) in expired {
            let target = lease.target;
            let Some(&position) = state.index.get(&target.expression) else {
                continue;
            };
            let record = &mut state.records[position];
            if record.expression.is_finished() {
                continue;
            }
            let Some(op) = record.graph.get_mut(target.operation) else {
                continue;
            };
            if op.status != OperationStatus::Dispatched {
                continue;
            }

            op.mark_ready();
            state.scheduler.enqueue(target);
            requeued += 1;
            clog_warn!(
                "Lease {} on {} expired, operation requeued",
                task_id.short(),
                target
            );
        }

        requeued
    }

    pub async fn stats(&self) -> StoreStats {
        let state = self.state.read().await;
        let mut stats = StoreStats {
            expressions: state.records.len(),
            ready_operations: state.scheduler.ready_len(),
            leased_operations: state.scheduler.leased_len(),
            ..StoreStats::default()
        };
        for record in &state.records {
            match record.expression.status {
                ExpressionStatus::Pending => stats.pending += 1,
                ExpressionStatus::InProgress => stats.in_progress += 1,
                ExpressionStatus::Done => stats.done += 1,
                ExpressionStatus::Failed => stats.failed += 1,
            }
        }
        stats
    }
}

impl std::fmt::Debug for ExpressionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpressionStore")
            .field("timings", &self.timings)
            .finish_non_exhaustive()
    }
}
