//! Request and response bodies for the out-of-process sandbox service.
//!
//! Two operations exist: `convert-tools` turns a tool list into the virtual
//! tool plus system message, and `evaluate` advances a partial evaluation by
//! one replay pass. Both are plain JSON bodies; transport framing is the
//! caller's concern.

use protocol::{Outcome, PartialEvaluation, ToolDefinition};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::engine::{evaluate, EngineConfig};
use crate::typegen;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvertToolsRequest {
    pub tools: Vec<ToolDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertToolsResponse {
    pub run_typescript_tool: ToolDefinition,
    pub system_message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluateRequest {
    pub partial: PartialEvaluation,
    pub tools: Vec<ToolDefinition>,
}

/// Wire form of an evaluation outcome, with engine failures folded in as a
/// fourth tag so the transport never has to invent its own error channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EvaluateResponse {
    Success { value: Value },
    Error { error: Value },
    Partial { partial: PartialEvaluation },
    EngineError { reason: String },
}

impl From<Outcome> for EvaluateResponse {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Success { value } => Self::Success { value },
            Outcome::Error { error } => Self::Error { error },
            Outcome::Partial { partial } => Self::Partial { partial },
        }
    }
}

pub fn convert_tools(request: &ConvertToolsRequest) -> ConvertToolsResponse {
    ConvertToolsResponse {
        run_typescript_tool: typegen::run_typescript_tool(),
        system_message: typegen::system_message(&request.tools),
    }
}

pub fn evaluate_request(config: &EngineConfig, request: &EvaluateRequest) -> EvaluateResponse {
    match evaluate(
        config,
        &request.partial.code,
        &request.partial.tool_state,
        &request.tools,
    ) {
        Ok(outcome) => outcome.into(),
        Err(error) => EvaluateResponse::EngineError {
            reason: error.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn convert_tools_returns_virtual_tool_and_prompt() {
        let request = ConvertToolsRequest {
            tools: vec![ToolDefinition::new(
                "webSearch",
                "Search the web",
                json!({"type": "object"}),
            )],
        };
        let response = convert_tools(&request);
        assert_eq!(response.run_typescript_tool.name, typegen::RUN_TYPESCRIPT);
        assert!(response.system_message.contains("webSearch"));
    }

    #[test]
    fn engine_error_serializes_with_reason() {
        let response = EvaluateResponse::EngineError {
            reason: "boom".into(),
        };
        let text = serde_json::to_string(&response).unwrap();
        assert!(text.contains("\"kind\":\"engine_error\""));
        assert!(text.contains("\"reason\":\"boom\""));
    }

    #[test]
    fn invalid_tool_name_is_an_engine_error() {
        let request = EvaluateRequest {
            partial: PartialEvaluation::new(
                protocol::CodeBlock::new("b1", "async function main() { return 1; }"),
                protocol::ToolState::new(),
            ),
            tools: vec![ToolDefinition::new("not a name", "", json!({}))],
        };
        let response = evaluate_request(&EngineConfig::default(), &request);
        assert!(matches!(response, EvaluateResponse::EngineError { .. }));
    }
}
