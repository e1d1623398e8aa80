//! Runtime error types.

use crate::backend::ModelError;
use crate::history::HistoryError;
use thiserror::Error;

/// Runtime errors.
///
/// Everything here is fatal for the current `serve` call: protocol
/// violations in the supplied history, engine malfunction, backend failure,
/// or a runaway conversation. Failures of the evaluated program itself are
/// not errors; they travel back to the caller as `code-result` messages.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The client history violates the code-block protocol.
    #[error(transparent)]
    History(#[from] HistoryError),

    /// The LLM backend failed.
    #[error(transparent)]
    Model(#[from] ModelError),

    /// The sandbox engine malfunctioned.
    #[error(transparent)]
    Sandbox(#[from] sandbox::Error),

    /// The operation is invalid for the current state.
    #[error("invalid state: {0}")]
    InvalidState(String),
}

pub type Result<T> = std::result::Result<T, Error>;
