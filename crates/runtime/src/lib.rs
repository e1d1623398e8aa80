//! Capstan runtime — history transcoding and the code-mode orchestration loop.
//!
//! The runtime lets a language model express multi-tool workflows as one
//! TypeScript program instead of a sequence of discrete tool calls, while
//! the server stays stateless and tool execution stays on the client.
//!
//! # How a turn flows
//!
//! 1. The client sends its visible history. [`history::classify`] decides
//!    whether the last code block is still open.
//! 2. An open block is advanced one replay pass in the sandbox. New pending
//!    tool calls go back to the client as a standard assistant tool-call
//!    message; a settled program becomes a `code-result` message.
//! 3. With every block closed, the history is projected to the model view
//!    (one `run_typescript` tool call per block) and the backend produces
//!    the next assistant message, which is projected back.
//!
//! The server holds nothing between calls: the client-visible history *is*
//! the state, and the sandbox reconstructs each code block's progress from
//! the tool messages recorded inside its bracket.
//!
//! # Re-exports
//!
//! - **Error handling:** [`Error`], [`Result`]
//! - **Orchestration:** [`Orchestrator`]
//! - **Backends:** [`Backend`], [`ModelError`], [`OpenAiBackend`],
//!   [`ScriptedBackend`]

mod error;
mod orchestrator;

pub mod backend;
pub mod history;

pub use backend::{Backend, ModelError, OpenAiBackend, ScriptedBackend};
pub use error::{Error, Result};
pub use orchestrator::Orchestrator;
