use thiserror::Error;

/// Syntax errors raised while parsing an expression.
///
/// Positions are byte offsets into the source string.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("expression is empty")]
    EmptyExpression,

    #[error("unexpected {found} at position {position}")]
    UnexpectedToken { found: String, position: usize },

    #[error("unbalanced parentheses at position {position}")]
    UnbalancedParentheses { position: usize },

    #[error("division by zero at position {position}")]
    DivisionByZero { position: usize },

    #[error("expression nested too deeply at position {position}")]
    NestingTooDeep { position: usize },

    #[error("number '{literal}' at position {position} is out of range")]
    NumberOutOfRange { literal: String, position: usize },
}

impl ParseError {
    /// Offending byte offset, if the error points at one.
    pub fn position(&self) -> Option<usize> {
        match self {
            ParseError::EmptyExpression => None,
            ParseError::UnexpectedToken { position, .. }
            | ParseError::UnbalancedParentheses { position }
            | ParseError::DivisionByZero { position }
            | ParseError::NestingTooDeep { position }
            | ParseError::NumberOutOfRange { position, .. } => Some(*position),
        }
    }
}
