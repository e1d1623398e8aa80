//! Shared protocol types for the capstan runtime.
//!
//! This crate defines the data model the other crates exchange:
//!
//! - **Messages** — the client-visible history (with `code` / `code-result`
//!   roles) and the model-visible history (plain single-tool conversation).
//! - **Tools** — client-owned tool definitions and the per-block tool-state
//!   the replay sandbox accumulates.
//! - **Outcomes** — the classification of one replay pass: success, runtime
//!   error, or partial (pending tool calls).
//!
//! Everything here is plain serde-serializable data; no behavior beyond
//! construction and normalization helpers lives in this crate.

mod error;
mod message;
mod tool;

pub use error::{Error, Result};
pub use message::{
    AssistantReply, ClientMessage, EvalResult, FunctionCall, ModelMessage, ToolCallRequest,
};
pub use tool::{CodeBlock, Outcome, PartialEvaluation, ToolDefinition, ToolEntry, ToolState};
