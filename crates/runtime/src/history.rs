//! The history transcoder.
//!
//! A client-visible history carries explicit `code` / `code-result`
//! brackets with standard tool-call traffic inside them. The transcoder
//! classifies such a history into the next action (advance the open code
//! block, or ask the model) and projects between the client view and the
//! model view, where each closed bracket collapses into one `run_typescript`
//! tool call and its tool result.

use protocol::{
    AssistantReply, ClientMessage, CodeBlock, ModelMessage, ToolCallRequest, ToolEntry, ToolState,
};
use sandbox::RUN_TYPESCRIPT;
use serde_json::{json, Value};
use thiserror::Error;

/// Protocol violations in a client history. All of these are fatal; none is
/// retried or papered over.
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("code-result {id} has no open code block")]
    ResultWithoutCode { id: String },

    #[error("code-result id mismatch: open block is {open}, got {got}")]
    MismatchedResult { open: String, got: String },

    #[error("code block {id} opened while block {open} is still open")]
    NestedCode { open: String, id: String },

    #[error("{role} message inside open code block {open}")]
    ForeignMessageInBlock { open: String, role: &'static str },

    #[error("tool message {tool_call_id} outside a code block")]
    StrayTool { tool_call_id: String },

    #[error("assistant calls tool {name}; only run_typescript is valid outside a code block")]
    ForeignToolCall { name: String },

    #[error("tool message {tool_call_id} content is not JSON: {reason}")]
    InvalidToolContent { tool_call_id: String, reason: String },

    #[error("tool call {id} arguments are malformed: {reason}")]
    InvalidArguments { id: String, reason: String },

    #[error("run_typescript call {id} carries no code string")]
    MissingCode { id: String },

    #[error("history ends inside open code block {id}")]
    UnclosedCode { id: String },
}

/// The next action for a classified history.
#[derive(Debug, Clone, PartialEq)]
pub enum Turn {
    /// The last code block is open; advance it in the sandbox.
    Code {
        block: CodeBlock,
        tool_state: ToolState,
    },
    /// Every block is closed; ask the model.
    Llm { history: Vec<ModelMessage> },
}

/// Classify a client history.
///
/// Returns [`Turn::Code`] with the open block and the tool-state rebuilt
/// from the messages after its marker, or [`Turn::Llm`] with the model-view
/// projection when every block is closed.
pub fn classify(messages: &[ClientMessage]) -> Result<Turn, HistoryError> {
    let mut open: Option<(usize, CodeBlock)> = None;

    for (index, message) in messages.iter().enumerate() {
        match message {
            ClientMessage::Code { id, code } => {
                if let Some((_, block)) = open.as_ref() {
                    return Err(HistoryError::NestedCode {
                        open: block.id.clone(),
                        id: id.clone(),
                    });
                }
                open = Some((index, CodeBlock::new(id.clone(), code.clone())));
            }
            ClientMessage::CodeResult { id, .. } => {
                let Some((_, block)) = open.as_ref() else {
                    return Err(HistoryError::ResultWithoutCode { id: id.clone() });
                };
                if id != &block.id {
                    return Err(HistoryError::MismatchedResult {
                        open: block.id.clone(),
                        got: id.clone(),
                    });
                }
                open = None;
            }
            ClientMessage::Tool { tool_call_id, .. } => {
                if open.is_none() {
                    return Err(HistoryError::StrayTool {
                        tool_call_id: tool_call_id.clone(),
                    });
                }
            }
            ClientMessage::System { .. } | ClientMessage::User { .. } => {
                if let Some((_, block)) = open.as_ref() {
                    let role = match message {
                        ClientMessage::System { .. } => "system",
                        _ => "user",
                    };
                    return Err(HistoryError::ForeignMessageInBlock {
                        open: block.id.clone(),
                        role,
                    });
                }
            }
            ClientMessage::Assistant { .. } => {}
        }
    }

    match open {
        Some((index, block)) => {
            let tool_state = tool_state_from_slice(&messages[index + 1..])?;
            Ok(Turn::Code { block, tool_state })
        }
        None => Ok(Turn::Llm {
            history: client_to_model(messages)?,
        }),
    }
}

/// Rebuild the tool-state of an open block from the messages after its
/// `code` marker.
///
/// Tool calls are taken from assistant messages after the latest assistant
/// message *without* tool calls (the whole slice when none exists). A call
/// answered by a `tool` message becomes a resolved entry carrying the
/// JSON-parsed content; an unanswered call stays pending. Ill-formed tool
/// content is fatal.
fn tool_state_from_slice(slice: &[ClientMessage]) -> Result<ToolState, HistoryError> {
    let cut = slice
        .iter()
        .rposition(|message| {
            matches!(
                message,
                ClientMessage::Assistant { tool_calls, .. } if tool_calls.is_empty()
            )
        })
        .map(|index| index + 1)
        .unwrap_or(0);
    let slice = &slice[cut..];

    let mut state = ToolState::new();
    for message in slice {
        let ClientMessage::Assistant { tool_calls, .. } = message else {
            continue;
        };
        for call in tool_calls {
            let answer = slice.iter().find_map(|message| match message {
                ClientMessage::Tool {
                    tool_call_id,
                    content,
                } if tool_call_id == &call.id => Some(content),
                _ => None,
            });
            match answer {
                Some(content) => {
                    let result: Value = serde_json::from_str(content).map_err(|e| {
                        HistoryError::InvalidToolContent {
                            tool_call_id: call.id.clone(),
                            reason: e.to_string(),
                        }
                    })?;
                    state.push(ToolEntry::Resolved {
                        id: call.id.clone(),
                        result,
                    });
                }
                None => {
                    let arguments = call.function.arguments_value().map_err(|e| {
                        HistoryError::InvalidArguments {
                            id: call.id.clone(),
                            reason: e.to_string(),
                        }
                    })?;
                    state.push(ToolEntry::Pending {
                        id: call.id.clone(),
                        name: call.function.name.clone(),
                        arguments,
                    });
                }
            }
        }
    }
    Ok(state)
}

/// Project a client history with closed brackets into the model view.
pub fn client_to_model(messages: &[ClientMessage]) -> Result<Vec<ModelMessage>, HistoryError> {
    let mut output = Vec::new();
    let mut open: Option<String> = None;

    for message in messages {
        match message {
            ClientMessage::System { content } => {
                if let Some(open_id) = open.as_ref() {
                    return Err(HistoryError::ForeignMessageInBlock {
                        open: open_id.clone(),
                        role: "system",
                    });
                }
                output.push(ModelMessage::System {
                    content: content.clone(),
                });
            }
            ClientMessage::User { content } => {
                if let Some(open_id) = open.as_ref() {
                    return Err(HistoryError::ForeignMessageInBlock {
                        open: open_id.clone(),
                        role: "user",
                    });
                }
                output.push(ModelMessage::User {
                    content: content.clone(),
                });
            }
            ClientMessage::Assistant {
                content,
                tool_calls,
            } => {
                // Inside a bracket this is intermediate tool-call traffic,
                // invisible to the model.
                if open.is_some() {
                    continue;
                }
                if let Some(call) = tool_calls
                    .iter()
                    .find(|call| call.function.name != RUN_TYPESCRIPT)
                {
                    return Err(HistoryError::ForeignToolCall {
                        name: call.function.name.clone(),
                    });
                }
                output.push(ModelMessage::Assistant {
                    content: content.clone(),
                    tool_calls: tool_calls.clone(),
                });
            }
            ClientMessage::Tool { tool_call_id, .. } => {
                if open.is_none() {
                    return Err(HistoryError::StrayTool {
                        tool_call_id: tool_call_id.clone(),
                    });
                }
            }
            ClientMessage::Code { id, code } => {
                if let Some(open_id) = open.as_ref() {
                    return Err(HistoryError::NestedCode {
                        open: open_id.clone(),
                        id: id.clone(),
                    });
                }
                output.push(ModelMessage::Assistant {
                    content: None,
                    tool_calls: vec![ToolCallRequest::new(
                        id.clone(),
                        RUN_TYPESCRIPT,
                        json!({ "code": code }),
                    )],
                });
                open = Some(id.clone());
            }
            ClientMessage::CodeResult { id, result } => {
                let Some(open_id) = open.as_ref() else {
                    return Err(HistoryError::ResultWithoutCode { id: id.clone() });
                };
                if id != open_id {
                    return Err(HistoryError::MismatchedResult {
                        open: open_id.clone(),
                        got: id.clone(),
                    });
                }
                output.push(ModelMessage::Tool {
                    tool_call_id: id.clone(),
                    content: serde_json::to_string(result)
                        .unwrap_or_else(|_| "null".to_string()),
                });
                open = None;
            }
        }
    }

    if let Some(id) = open {
        return Err(HistoryError::UnclosedCode { id });
    }
    Ok(output)
}

/// Project a model reply back into the client view: a `run_typescript` call
/// becomes a `code` message, anything else a plain assistant message.
pub fn model_to_client(reply: &AssistantReply) -> Result<ClientMessage, HistoryError> {
    let Some(call) = reply.tool_calls.first() else {
        return Ok(ClientMessage::Assistant {
            content: reply.content.clone(),
            tool_calls: Vec::new(),
        });
    };

    if call.function.name != RUN_TYPESCRIPT {
        return Err(HistoryError::ForeignToolCall {
            name: call.function.name.clone(),
        });
    }

    let arguments = call
        .function
        .arguments_value()
        .map_err(|e| HistoryError::InvalidArguments {
            id: call.id.clone(),
            reason: e.to_string(),
        })?;
    let code = arguments
        .get("code")
        .and_then(Value::as_str)
        .ok_or_else(|| HistoryError::MissingCode {
            id: call.id.clone(),
        })?;

    Ok(ClientMessage::Code {
        id: call.id.clone(),
        code: code.to_string(),
    })
}

/// Surface a partial outcome as one assistant message carrying exactly the
/// pending tool calls. Resolved and rejected entries are omitted; the client
/// has already seen them.
pub fn pending_to_client(tool_state: &ToolState) -> ClientMessage {
    let tool_calls = tool_state
        .pending()
        .filter_map(|entry| match entry {
            ToolEntry::Pending {
                id,
                name,
                arguments,
            } => Some(ToolCallRequest::new(
                id.clone(),
                name.clone(),
                arguments.clone(),
            )),
            _ => None,
        })
        .collect();

    ClientMessage::Assistant {
        content: None,
        tool_calls,
    }
}
