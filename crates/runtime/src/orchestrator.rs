//! The driver loop.
//!
//! `serve` alternates between two moves until the conversation settles: if
//! the history ends in an open code block, advance it one replay pass in the
//! sandbox; otherwise project the history to the model view and ask the
//! backend for the next assistant message. The loop hands control back to
//! the caller either with pending tool calls to answer or with a terminal
//! assistant reply.

use protocol::{ClientMessage, EvalResult, ModelMessage, Outcome, ToolDefinition};
use sandbox::{typegen, EngineConfig};
use tracing::debug;

use crate::backend::Backend;
use crate::history::{self, Turn};
use crate::{Error, Result};

/// Maximum driver iterations per `serve` call. A single well-behaved turn
/// closes each code block once and asks the model once per block, so this
/// only trips on runaway conversations.
const MAX_TURNS: usize = 32;

/// A stateless code-mode orchestrator over one tool set.
pub struct Orchestrator<B> {
    backend: B,
    tools: Vec<ToolDefinition>,
    engine: EngineConfig,
    system_message: String,
    run_typescript: ToolDefinition,
}

impl<B: Backend> Orchestrator<B> {
    pub fn new(backend: B, tools: Vec<ToolDefinition>) -> Self {
        Self::with_engine(backend, tools, EngineConfig::default())
    }

    pub fn with_engine(backend: B, tools: Vec<ToolDefinition>, engine: EngineConfig) -> Self {
        let system_message = typegen::system_message(&tools);
        let run_typescript = typegen::run_typescript_tool();
        Self {
            backend,
            tools,
            engine,
            system_message,
            run_typescript,
        }
    }

    /// Advance the conversation and return the new message suffix.
    ///
    /// The suffix is non-empty and ends either in an assistant message with
    /// pending tool calls (the client must answer them before calling
    /// again) or in a terminal assistant message with plain content. The
    /// input history is never mutated.
    pub async fn serve(&self, history: &[ClientMessage]) -> Result<Vec<ClientMessage>> {
        let mut suffix: Vec<ClientMessage> = Vec::new();

        for _ in 0..MAX_TURNS {
            let combined: Vec<ClientMessage> =
                history.iter().chain(suffix.iter()).cloned().collect();

            match history::classify(&combined)? {
                Turn::Code { block, tool_state } => {
                    let id = block.id.clone();
                    debug!(block = %id, entries = tool_state.len(), "advancing code block");

                    let engine = self.engine.clone();
                    let tools = self.tools.clone();
                    let outcome = tokio::task::spawn_blocking(move || {
                        sandbox::evaluate(&engine, &block, &tool_state, &tools)
                    })
                    .await
                    .map_err(|e| Error::InvalidState(format!("sandbox task failed: {e}")))??;

                    match outcome {
                        Outcome::Success { value } => suffix.push(ClientMessage::CodeResult {
                            id,
                            result: EvalResult::Success { data: value },
                        }),
                        Outcome::Error { error } => suffix.push(ClientMessage::CodeResult {
                            id,
                            result: EvalResult::Error { error },
                        }),
                        Outcome::Partial { partial } => {
                            suffix.push(history::pending_to_client(&partial.tool_state));
                            return Ok(suffix);
                        }
                    }
                }
                Turn::Llm {
                    history: model_history,
                } => {
                    let mut messages = Vec::with_capacity(model_history.len() + 1);
                    messages.push(ModelMessage::System {
                        content: self.system_message.clone(),
                    });
                    messages.extend(model_history);

                    let reply = self
                        .backend
                        .complete(&messages, std::slice::from_ref(&self.run_typescript))
                        .await?;
                    debug!(tool_calls = reply.tool_calls.len(), "model replied");

                    let terminal = !reply.has_tool_calls();
                    suffix.push(history::model_to_client(&reply)?);
                    if terminal {
                        return Ok(suffix);
                    }
                }
            }
        }

        Err(Error::InvalidState(format!(
            "conversation did not settle within {MAX_TURNS} turns"
        )))
    }

    /// The system message generated for this orchestrator's tool set.
    pub fn system_message(&self) -> &str {
        &self.system_message
    }
}
