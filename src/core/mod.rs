//! Core domain models for calcflow.
//!
//! Expressions, the operations they flatten into, the per-expression
//! operation graph, and the tasks handed to workers.

pub mod expression;
pub mod graph;
pub mod operation;
pub mod task;

pub use expression::{Expression, ExpressionId, ExpressionStatus};
pub use graph::OperationGraph;
pub use operation::{
    ArithmeticError, Operand, Operation, OperationId, OperationStatus, Operator, Side,
};
pub use task::{Task, TaskId, TaskOutcome, TaskReport};
