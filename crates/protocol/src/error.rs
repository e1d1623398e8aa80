//! Protocol error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("tool call arguments are not valid JSON: {0}")]
    InvalidArguments(String),
}

pub type Result<T> = std::result::Result<T, Error>;
