//! Line-delimited JSON-RPC framing for the stdio sandbox service.
//!
//! Each request line carries one call to `convert-tools` or `evaluate`; each
//! response line carries the matching result or error.

use sandbox::service::{self, ConvertToolsRequest, EvaluateRequest};
use sandbox::EngineConfig;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const PARSE_ERROR: i32 = -32700;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;

/// JSON-RPC 2.0 request.
#[derive(Debug, Clone, Deserialize)]
pub struct Request {
    pub id: RequestId,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
}

/// JSON-RPC 2.0 response.
#[derive(Debug, Clone, Serialize)]
pub struct Response {
    pub jsonrpc: &'static str,
    pub id: Option<RequestId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ResponseError>,
}

impl Response {
    fn result(id: RequestId, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id: Some(id),
            result: Some(result),
            error: None,
        }
    }

    fn error(id: Option<RequestId>, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(ResponseError {
                code,
                message: message.into(),
            }),
        }
    }

    /// Response for a line that did not parse as a request. Per JSON-RPC the
    /// id is null.
    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::error(None, PARSE_ERROR, message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::error(None, INTERNAL_ERROR, message)
    }
}

/// JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Serialize)]
pub struct ResponseError {
    pub code: i32,
    pub message: String,
}

/// Request ID (can be string or number).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    String(String),
    Number(i64),
}

/// Dispatch one request against the sandbox service.
pub fn dispatch(engine: &EngineConfig, request: Request) -> Response {
    let params = request.params.unwrap_or(Value::Null);
    match request.method.as_str() {
        "convert-tools" => match serde_json::from_value::<ConvertToolsRequest>(params) {
            Ok(body) => {
                let response = service::convert_tools(&body);
                Response::result(
                    request.id,
                    serde_json::to_value(response).unwrap_or(Value::Null),
                )
            }
            Err(e) => Response::error(Some(request.id), INVALID_PARAMS, e.to_string()),
        },
        "evaluate" => match serde_json::from_value::<EvaluateRequest>(params) {
            Ok(body) => {
                let response = service::evaluate_request(engine, &body);
                Response::result(
                    request.id,
                    serde_json::to_value(response).unwrap_or(Value::Null),
                )
            }
            Err(e) => Response::error(Some(request.id), INVALID_PARAMS, e.to_string()),
        },
        other => Response::error(
            Some(request.id),
            METHOD_NOT_FOUND,
            format!("unknown method: {other}"),
        ),
    }
}
