//! Ready queue and lease table.
//!
//! The scheduler owns the FIFO of operations waiting for a worker and the
//! table of outstanding leases. It knows nothing about operation status; the
//! store validates every entry it pulls from here before acting on it.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use crate::core::{ExpressionId, OperationId, TaskId};

/// Address of one operation across all expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OperationRef {
    pub expression: ExpressionId,
    pub operation: OperationId,
}

impl OperationRef {
    pub fn new(expression: ExpressionId, operation: OperationId) -> Self {
        Self {
            expression,
            operation,
        }
    }
}

impl std::fmt::Display for OperationRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.expression.short(), self.operation)
    }
}

/// An outstanding dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lease {
    pub target: OperationRef,
    pub expires_at: Instant,
}

impl Lease {
    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

pub struct Scheduler {
    ready: VecDeque<OperationRef>,
    leases: HashMap<TaskId, Lease>,
    lease_duration: Duration,
}

impl Scheduler {
    pub fn new(lease_duration: Duration) -> Self {
        Self {
            ready: VecDeque::new(),
            leases: HashMap::new(),
            lease_duration,
        }
    }


    /// Append an operation to the tail of the ready queue.
    pub fn enqueue(&mut self, target: OperationRef) {
        self.ready.push_back(target);
    }

    /// Pop the head of the ready queue.
    pub fn next_ready(&mut self) -> Option<OperationRef> {
        self.ready.pop_front()
    }

    /// Open a lease on `target` and return the task identifier naming it.
    pub fn lease(&mut self, target: OperationRef, now: Instant) -> TaskId {
        let id = TaskId::new();
        self.leases.insert(
            id,
            Lease {
                target,
                expires_at: now + self.lease_duration,
            },
        );
        id
    }

    pub fn lease_for(&self, id: &TaskId) -> Option<&Lease> {
        self.leases.get(id)
    }

    /// Close a lease. Returns it if it was outstanding.
    pub fn release(&mut self, id: &TaskId) -> Option<Lease> {
        self.leases.remove(id)
    }

    /// Remove and return every lease expired at `now`, oldest first.
    pub fn take_expired(&mut self, now: Instant) -> Vec<(TaskId, Lease)> {
        let expired_ids: Vec<TaskId> = self
            .leases
            .iter()
            .filter(|(_, lease)| lease.is_expired(now))
            .map(|(id, _)| *id)
            .collect();

        let mut expired: Vec<(TaskId, Lease)> = expired_ids
            .into_iter()
            .filter_map(|id| self.leases.remove(&id).map(|lease| (id, lease)))
            .collect();
        expired.sort_by_key(|(_, lease)| (lease.expires_at, lease.target.operation));
        expired
    }

    /// Drop every queued entry and lease belonging to `expression`.
    ///
    /// Returns the number of entries removed.
    pub fn forget_expression(&mut self, expression: ExpressionId) -> usize {
        let before = self.ready.len() + self.leases.len();
        self.ready.retain(|target| target.expression != expression);
        self.leases
            .retain(|_, lease| lease.target.expression != expression);
        before - (self.ready.len() + self.leases.len())
    }

    pub fn ready_len(&self) -> usize {
        self.ready.len()
    }

    pub fn leased_len(&self) -> usize {
        self.leases.len()
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("ready", &self.ready.len())
            .field("leased", &self.leases.len())
            .field("lease_duration", &self.lease_duration)
            .finish()
    }
}
