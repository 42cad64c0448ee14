use crate::core::Operator;

/// Abstract syntax tree of an arithmetic expression.
///
/// Parentheses only regroup; they leave no node behind.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number {
        value: f64,
        position: usize,
    },
    Negate {
        operand: Box<Expr>,
        position: usize,
    },
    Binary {
        op: Operator,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        position: usize,
    },
}

impl Expr {
    pub fn position(&self) -> usize {
        match self {
            Expr::Number { position, .. }
            | Expr::Negate { position, .. }
            | Expr::Binary { position, .. } => *position,
        }
    }

    /// Value of a literal, looking through unary minus.
    pub fn literal_value(&self) -> Option<f64> {
        match self {
            Expr::Number { value, .. } => Some(*value),
            Expr::Negate { operand, .. } => operand.literal_value().map(|v| -v),
            Expr::Binary { .. } => None,
        }
    }

    /// Number of binary nodes in the tree.
    pub fn binary_count(&self) -> usize {
        match self {
            Expr::Number { .. } => 0,
            Expr::Negate { operand, .. } => operand.binary_count(),
            Expr::Binary { lhs, rhs, .. } => 1 + lhs.binary_count() + rhs.binary_count(),
        }
    }
}

impl std::fmt::Display for Expr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expr::Number { value, .. } => write!(f, "{}", value),
            Expr::Negate { operand, .. } => write!(f, "(-{})", operand),
            Expr::Binary { op, lhs, rhs, .. } => write!(f, "({} {} {})", lhs, op, rhs),
        }
    }
}
