//! LLM backend abstraction.
//!
//! A backend turns a model-visible history plus the single virtual tool
//! into the next assistant message. The HTTP implementation speaks the
//! prevailing chat-completions function-calling dialect; the scripted
//! implementation replays canned replies for tests and demos.

mod openai;
mod scripted;

pub use openai::{OpenAiBackend, OpenAiBackendBuilder};
pub use scripted::ScriptedBackend;

use protocol::{AssistantReply, ModelMessage, ToolDefinition};
use std::future::Future;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("network: {0}")]
    Network(String),

    #[error("provider api: {0}")]
    Api(String),

    #[error("invalid provider response: {0}")]
    InvalidResponse(String),

    #[error("no scripted reply left")]
    Exhausted,
}

/// Trait for LLM completion backends.
pub trait Backend: Send + Sync {
    fn complete(
        &self,
        messages: &[ModelMessage],
        tools: &[ToolDefinition],
    ) -> impl Future<Output = Result<AssistantReply, ModelError>> + Send;
}
