//! Conversation message types.
//!
//! Two views of the same conversation exist. The *client-visible* history
//! carries explicit `code` / `code-result` messages bracketing a code
//! evaluation, with standard tool-call traffic interleaved inside the
//! bracket. The *model-visible* history is a conventional single-tool
//! conversation: the bracket collapses into one `run_typescript` tool call
//! and its tool result.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A tool call carried on an assistant message.
///
/// Follows the prevailing function-calling wire shape:
/// `{id, function: {name, arguments}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub id: String,
    pub function: FunctionCall,
}

impl ToolCallRequest {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            function: FunctionCall {
                name: name.into(),
                arguments,
            },
        }
    }
}

/// The function half of a tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// Arguments as a JSON value, or as JSON text wrapped in a string.
    /// Providers disagree on which form they emit; [`FunctionCall::arguments_value`]
    /// normalizes both.
    pub arguments: Value,
}

impl FunctionCall {
    /// Decode the arguments, parsing the string form if necessary.
    pub fn arguments_value(&self) -> Result<Value> {
        match &self.arguments {
            Value::String(text) => {
                serde_json::from_str(text).map_err(|e| Error::InvalidArguments(e.to_string()))
            }
            other => Ok(other.clone()),
        }
    }
}

/// The result of evaluating a code block, as carried by a `code-result` message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EvalResult {
    Success { data: Value },
    Error { error: Value },
}

/// A message in the client-visible history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "kebab-case")]
pub enum ClientMessage {
    System {
        content: String,
    },
    User {
        content: String,
    },
    Assistant {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<String>,
        #[serde(
            default,
            rename = "toolCalls",
            skip_serializing_if = "Vec::is_empty"
        )]
        tool_calls: Vec<ToolCallRequest>,
    },
    Tool {
        #[serde(rename = "toolCallId")]
        tool_call_id: String,
        content: String,
    },
    Code {
        id: String,
        code: String,
    },
    CodeResult {
        id: String,
        result: EvalResult,
    },
}

impl ClientMessage {
    /// Create a plain assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::Assistant {
            content: Some(content.into()),
            tool_calls: Vec::new(),
        }
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::User {
            content: content.into(),
        }
    }

    /// Create a tool result message.
    pub fn tool(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::Tool {
            tool_call_id: tool_call_id.into(),
            content: content.into(),
        }
    }
}

/// A message in the model-visible history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum ModelMessage {
    System {
        content: String,
    },
    User {
        content: String,
    },
    Assistant {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<String>,
        #[serde(
            default,
            rename = "toolCalls",
            skip_serializing_if = "Vec::is_empty"
        )]
        tool_calls: Vec<ToolCallRequest>,
    },
    Tool {
        #[serde(rename = "toolCallId")]
        tool_call_id: String,
        content: String,
    },
}

/// An assistant reply produced by an LLM backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssistantReply {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Vec<ToolCallRequest>,
}

impl AssistantReply {
    /// A plain text reply.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            tool_calls: Vec::new(),
        }
    }

    /// A reply carrying a single tool call.
    pub fn tool_call(call: ToolCallRequest) -> Self {
        Self {
            content: None,
            tool_calls: vec![call],
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}
