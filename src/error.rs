use thiserror::Error;

use crate::core::{ExpressionId, TaskId};
use crate::parser::ParseError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid expression: {0}")]
    Parse(#[from] ParseError),

    #[error("Expression not found: {0}")]
    ExpressionNotFound(ExpressionId),

    #[error("Unknown operation: task {0} is not currently dispatched")]
    UnknownOperation(TaskId),

    #[error("Invalid task report: {0}")]
    InvalidReport(String),

    #[error("Unexpected orchestrator response: {0}")]
    UnexpectedResponse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("No home directory")]
    NoHomeDir,
}

pub type Result<T> = std::result::Result<T, Error>;
