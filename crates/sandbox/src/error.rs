//! Sandbox error types.
//!
//! These cover engine malfunction only. Failures of the evaluated program
//! are not errors; they are classified into [`protocol::Outcome`].

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to boot sandbox context: {0}")]
    Bootstrap(String),

    #[error("failed to install interceptors: {0}")]
    Install(String),

    #[error("tool name {0:?} is not usable as a sandbox global")]
    InvalidToolName(String),
}

pub type Result<T> = std::result::Result<T, Error>;
