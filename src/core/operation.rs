//! Operation data model for the expression graph.
//!
//! An operation is one elementary binary computation. Its operands are either
//! literal values or references to the results of other operations in the
//! same expression.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identifier of an operation, unique within its expression.
///
/// Assigned in post-order while the graph is built, so it doubles as the
/// operation's index in the graph arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationId(pub u32);

impl OperationId {
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for OperationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Failure raised while evaluating an operator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArithmeticError {
    #[error("division by zero")]
    DivisionByZero,
}

/// The four supported binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = "+")]
    Add,
    #[serde(rename = "-")]
    Subtract,
    #[serde(rename = "*")]
    Multiply,
    #[serde(rename = "/")]
    Divide,
}

impl Operator {
    pub fn symbol(&self) -> char {
        match self {
            Operator::Add => '+',
            Operator::Subtract => '-',
            Operator::Multiply => '*',
            Operator::Divide => '/',
        }
    }

    pub fn from_symbol(c: char) -> Option<Self> {
        match c {
            '+' => Some(Operator::Add),
            '-' => Some(Operator::Subtract),
            '*' => Some(Operator::Multiply),
            '/' => Some(Operator::Divide),
            _ => None,
        }
    }

    /// Binding strength; higher binds tighter.
    pub fn precedence(&self) -> u8 {
        match self {
            Operator::Add | Operator::Subtract => 1,
            Operator::Multiply | Operator::Divide => 2,
        }
    }

    /// Evaluate `lhs <op> rhs`.
    pub fn apply(&self, lhs: f64, rhs: f64) -> Result<f64, ArithmeticError> {
        match self {
            Operator::Add => Ok(lhs + rhs),
            Operator::Subtract => Ok(lhs - rhs),
            Operator::Multiply => Ok(lhs * rhs),
            Operator::Divide => {
                if rhs == 0.0 {
                    Err(ArithmeticError::DivisionByZero)
                } else {
                    Ok(lhs / rhs)
                }
            }
        }
    }
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// One side of an operation: a known value or a pending reference.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operand {
    Value(f64),
    Result(OperationId),
}

impl Operand {
    pub fn value(&self) -> Option<f64> {
        match self {
            Operand::Value(v) => Some(*v),
            Operand::Result(_) => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Operand::Value(_))
    }
}

impl std::fmt::Display for Operand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operand::Value(v) => write!(f, "{}", v),
            Operand::Result(id) => write!(f, "{}", id),
        }
    }
}

/// Which operand slot a dependency feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Left,
    Right,
}

/// Operation status in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum OperationStatus {
    /// Waiting on at least one operand.
    Pending,
    /// Both operands known, waiting in the ready queue.
    Ready,
    /// Handed to a worker under a lease.
    Dispatched,
    /// Result recorded.
    Done,
    /// Worker reported an error.
    Failed {
        /// Reason reported by the worker.
        error: String,
    },
}

impl std::fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationStatus::Pending => write!(f, "pending"),
            OperationStatus::Ready => write!(f, "ready"),
            OperationStatus::Dispatched => write!(f, "dispatched"),
            OperationStatus::Done => write!(f, "done"),
            OperationStatus::Failed { error } => write!(f, "failed: {}", error),
        }
    }
}

/// A single binary operation in an expression graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub id: OperationId,
    pub operator: Operator,
    pub left: Operand,
    pub right: Operand,
    pub status: OperationStatus,
    /// Present only when `status` is `Done`.
    pub result: Option<f64>,
    /// Number of times the operation was handed to a worker.
    pub dispatch_count: u32,
}

impl Operation {
    pub fn new(id: OperationId, operator: Operator, left: Operand, right: Operand) -> Self {
        Self {
            id,
            operator,
            left,
            right,
            status: OperationStatus::Pending,
            result: None,
            dispatch_count: 0,
        }
    }

    /// Both operands are literal values.
    pub fn operands_resolved(&self) -> bool {
        self.left.is_resolved() && self.right.is_resolved()
    }

    /// Resolved operand values, if both are known.
    pub fn operand_values(&self) -> Option<(f64, f64)> {
        Some((self.left.value()?, self.right.value()?))
    }

    /// Substitute `value` for the operand that references `dependency`.
    ///
    /// Returns `true` if this substitution made the operation ready.
    pub fn resolve(&mut self, dependency: OperationId, value: f64) -> bool {
        if self.left == Operand::Result(dependency) {
            self.left = Operand::Value(value);
        }
        if self.right == Operand::Result(dependency) {
            self.right = Operand::Value(value);
        }
        if self.status == OperationStatus::Pending && self.operands_resolved() {
            self.status = OperationStatus::Ready;
            return true;
        }
        false
    }

    pub fn mark_ready(&mut self) {
        self.status = OperationStatus::Ready;
    }

    pub fn dispatch(&mut self) {
        self.status = OperationStatus::Dispatched;
        self.dispatch_count += 1;
    }

    pub fn complete(&mut self, value: f64) {
        self.status = OperationStatus::Done;
        self.result = Some(value);
    }

    pub fn fail(&mut self, error: &str) {
        self.status = OperationStatus::Failed {
            error: error.to_string(),
        };
    }

    pub fn is_finished(&self) -> bool {
        matches!(
            self.status,
            OperationStatus::Done | OperationStatus::Failed { .. }
        )
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} = {} {} {}",
            self.id, self.left, self.operator, self.right
        )
    }
}
