//! Expression parser.
//!
//! Turns infix source text into an [`Expr`] tree. The grammar is the usual
//! one for the four arithmetic operators:
//!
//! ```text
//! expression := unary (binary_op unary)*      precedence climbing, left-assoc
//! unary      := '-' unary | primary
//! primary    := NUMBER | '(' expression ')'
//! ```
//!
//! A divisor that is a literal zero is rejected here. Zero divisors that only
//! appear at runtime are left for the worker to report.

mod ast;
mod error;
mod lexer;

pub use ast::Expr;
pub use error::ParseError;
pub use lexer::{tokenize, Token, TokenKind};

use crate::core::Operator;

/// Maximum nesting of parentheses and unary minus.
pub const MAX_DEPTH: usize = 256;

/// Parse `source` into a syntax tree.
pub fn parse(source: &str) -> Result<Expr, ParseError> {
    let tokens = tokenize(source)?;
    if tokens.len() == 1 {
        return Err(ParseError::EmptyExpression);
    }

    let mut parser = Parser {
        tokens,
        cursor: 0,
        depth: 0,
        open_parens: Vec::new(),
    };
    let expr = parser.expression(0)?;

    let next = parser.peek();
    match next.kind {
        TokenKind::End => Ok(expr),
        TokenKind::RightParen => Err(ParseError::UnbalancedParentheses {
            position: next.position,
        }),
        other => Err(ParseError::UnexpectedToken {
            found: other.describe(),
            position: next.position,
        }),
    }
}

struct Parser {
    tokens: Vec<Token>,
    cursor: usize,
    depth: usize,
    /// Positions of the currently open '(' tokens.
    open_parens: Vec<usize>,
}

impl Parser {
    fn peek(&self) -> Token {
        self.tokens[self.cursor]
    }

    fn advance(&mut self) -> Token {
        let token = self.tokens[self.cursor];
        if token.kind != TokenKind::End {
            self.cursor += 1;
        }
        token
    }

    fn enter(&mut self, position: usize) -> Result<(), ParseError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(ParseError::NestingTooDeep { position });
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    /// Precedence climbing over binary operators binding at least `min_prec`.
    fn expression(&mut self, min_prec: u8) -> Result<Expr, ParseError> {
        let mut lhs = self.unary()?;

        loop {
            let token = self.peek();
            let op = match token.kind {
                TokenKind::Operator(op) if op.precedence() >= min_prec => op,
                _ => break,
            };
            self.advance();

            // Left associativity: the right side only takes tighter operators.
            let rhs = self.expression(op.precedence() + 1)?;
            if op == Operator::Divide && rhs.literal_value() == Some(0.0) {
                return Err(ParseError::DivisionByZero {
                    position: rhs.position(),
                });
            }

            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                position: token.position,
            };
        }

        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr, ParseError> {
        let token = self.peek();
        if token.kind == TokenKind::Operator(Operator::Subtract) {
            self.advance();
            self.enter(token.position)?;
            let operand = self.unary()?;
            self.leave();
            return Ok(Expr::Negate {
                operand: Box::new(operand),
                position: token.position,
            });
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expr, ParseError> {
        let token = self.advance();
        match token.kind {
            TokenKind::Number(value) => Ok(Expr::Number {
                value,
                position: token.position,
            }),
            TokenKind::LeftParen => {
                self.enter(token.position)?;
                self.open_parens.push(token.position);
                let inner = self.expression(0)?;
                let close = self.advance();
                match close.kind {
                    TokenKind::RightParen => {}
                    TokenKind::End => {
                        return Err(ParseError::UnbalancedParentheses {
                            position: token.position,
                        })
                    }
                    other => {
                        return Err(ParseError::UnexpectedToken {
                            found: other.describe(),
                            position: close.position,
                        })
                    }
                }
                self.open_parens.pop();
                self.leave();
                Ok(inner)
            }
            TokenKind::RightParen if self.open_parens.is_empty() => {
                Err(ParseError::UnbalancedParentheses {
                    position: token.position,
                })
            }
            TokenKind::End => match self.open_parens.last() {
                Some(&open) => Err(ParseError::UnbalancedParentheses { position: open }),
                None => Err(ParseError::UnexpectedToken {
                    found: token.kind.describe(),
                    position: token.position,
                }),
            },
            other => Err(ParseError::UnexpectedToken {
                found: other.describe(),
                position: token.position,
            }),
        }
    }
}
