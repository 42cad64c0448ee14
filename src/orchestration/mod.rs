//! Orchestration layer.
//!
//! Holds the expression store with its ready queue and lease table, the
//! background lease sweeper, and the worker protocol built on top of them.

mod lease;
mod scheduler;
mod store;
mod worker;

pub use lease::{LeaseSweeper, SweeperHandle};
pub use scheduler::{Lease, OperationRef, Scheduler};
pub use store::{ExpressionStore, StoreStats};
pub use worker::WorkerProtocol;
