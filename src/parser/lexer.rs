//! Tokenizer for arithmetic expressions.

use super::error::ParseError;
use crate::core::Operator;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TokenKind {
    Number(f64),
    Operator(Operator),
    LeftParen,
    RightParen,
    End,
}

impl TokenKind {
    /// Human-readable description used in error messages.
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Number(v) => format!("number {}", v),
            TokenKind::Operator(op) => format!("'{}'", op),
            TokenKind::LeftParen => "'('".to_string(),
            TokenKind::RightParen => "')'".to_string(),
            TokenKind::End => "end of input".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Byte offset of the token's first character.
    pub position: usize,
}

/// Split `source` into tokens. The last token is always `End`.
pub fn tokenize(source: &str) -> Result<Vec<Token>, ParseError> {
    let mut tokens = Vec::new();
    let mut chars = source.char_indices().peekable();

    while let Some(&(position, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }

        if c.is_ascii_digit() || c == '.' {
            let mut end = position;
            while let Some(&(i, d)) = chars.peek() {
                if d.is_ascii_digit() || d == '.' {
                    end = i + d.len_utf8();
                    chars.next();
                } else {
                    break;
                }
            }
            let text = &source[position..end];
            let value: f64 = text.parse().map_err(|_| ParseError::UnexpectedToken {
                found: format!("number '{}'", text),
                position,
            })?;
            if !value.is_finite() {
                return Err(ParseError::NumberOutOfRange {
                    literal: text.to_string(),
                    position,
                });
            }
            tokens.push(Token {
                kind: TokenKind::Number(value),
                position,
            });
            continue;
        }

        let kind = match c {
            '(' => TokenKind::LeftParen,
            ')' => TokenKind::RightParen,
            _ => match Operator::from_symbol(c) {
                Some(op) => TokenKind::Operator(op),
                None => {
                    return Err(ParseError::UnexpectedToken {
                        found: format!("character '{}'", c),
                        position,
                    })
                }
            },
        };
        tokens.push(Token { kind, position });
        chars.next();
    }

    tokens.push(Token {
        kind: TokenKind::End,
        position: source.len(),
    });
    Ok(tokens)
}
