pub mod agent;
pub mod api;
pub mod config;
pub mod core;
pub mod error;
pub mod log;
pub mod orchestration;
pub mod parser;

pub use error::{Error, Result};
