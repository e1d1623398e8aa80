//! The replay cursor.
//!
//! The cursor is the host-side dispatcher behind every intercepted tool
//! function. It walks the input tool-state with a monotonic index and tells
//! the in-sandbox shim whether to resolve or reject the promise it hands
//! back to the program, recording the output tool-state as it goes.

use protocol::{ToolEntry, ToolState};
use serde::Serialize;
use serde_json::{json, Value};
use uuid::Uuid;

/// Marker key on control values that abort a replay pass.
pub(crate) const CONTROL_KEY: &str = "__capstanControl";
const NEW_TOOL_CALL: &str = "new_tool_call";
const UNEXPECTED_PENDING: &str = "unexpected_pending_tool";

/// What the interceptor shim should do with the promise it returns.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub(crate) enum Instruction {
    Resolve { value: Value },
    Reject { value: Value },
}

/// Whether a settled error value is the new-tool-call control value.
pub(crate) fn is_new_tool_call(value: &Value) -> bool {
    value.get(CONTROL_KEY).and_then(Value::as_str) == Some(NEW_TOOL_CALL)
}

fn new_tool_call_control(id: &str, name: &str) -> Value {
    json!({ CONTROL_KEY: NEW_TOOL_CALL, "toolCallId": id, "name": name })
}

fn unexpected_pending_control(id: &str) -> Value {
    json!({ CONTROL_KEY: UNEXPECTED_PENDING, "toolCallId": id })
}

#[derive(Debug)]
pub(crate) struct ReplayCursor {
    input: Vec<ToolEntry>,
    output: Vec<ToolEntry>,
    position: usize,
    new_pending: usize,
}

impl ReplayCursor {
    pub(crate) fn new(input: &ToolState) -> Self {
        Self {
            input: input.entries().to_vec(),
            output: Vec::new(),
            position: 0,
            new_pending: 0,
        }
    }

    /// Answer one interceptor call.
    ///
    /// Past the end of the input a fresh pending entry is recorded and the
    /// call rejects with the new-tool-call control value, aborting the pass
    /// once the program runs out of work that resolved entries can satisfy.
    /// A pending entry in the *input* is an invariant violation (inputs must
    /// be fully answered); the call rejects without consuming it.
    pub(crate) fn dispatch(&mut self, name: &str, arguments: Value) -> Instruction {
        match self.input.get(self.position).cloned() {
            None => {
                let id = Uuid::new_v4().to_string();
                let control = new_tool_call_control(&id, name);
                self.output.push(ToolEntry::Pending {
                    id,
                    name: name.to_string(),
                    arguments,
                });
                self.position += 1;
                self.new_pending += 1;
                Instruction::Reject { value: control }
            }
            Some(ToolEntry::Resolved { id, result }) => {
                self.position += 1;
                self.output.push(ToolEntry::Resolved {
                    id,
                    result: result.clone(),
                });
                Instruction::Resolve { value: result }
            }
            Some(ToolEntry::Rejected { id, error }) => {
                self.position += 1;
                self.output.push(ToolEntry::Rejected {
                    id,
                    error: error.clone(),
                });
                Instruction::Reject { value: error }
            }
            Some(ToolEntry::Pending { id, .. }) => Instruction::Reject {
                value: unexpected_pending_control(&id),
            },
        }
    }

    /// Whether this pass recorded at least one new pending entry.
    pub(crate) fn recorded_new_pending(&self) -> bool {
        self.new_pending > 0
    }

    pub(crate) fn output(&self) -> ToolState {
        ToolState::from(self.output.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolved(id: &str, result: Value) -> ToolEntry {
        ToolEntry::Resolved {
            id: id.into(),
            result,
        }
    }

    #[test]
    fn empty_input_records_pending_and_rejects() {
        let mut cursor = ReplayCursor::new(&ToolState::new());
        let instruction = cursor.dispatch("webSearch", json!({"query": "news"}));

        let Instruction::Reject { value } = instruction else {
            panic!("expected reject, got {instruction:?}");
        };
        assert!(is_new_tool_call(&value));
        assert!(cursor.recorded_new_pending());

        let output = cursor.output();
        assert_eq!(output.len(), 1);
        match &output.entries()[0] {
            ToolEntry::Pending { name, arguments, .. } => {
                assert_eq!(name, "webSearch");
                assert_eq!(arguments, &json!({"query": "news"}));
            }
            other => panic!("expected pending entry, got {other:?}"),
        }
    }

    #[test]
    fn resolved_input_is_consumed_in_order() {
        let input = ToolState::from(vec![
            resolved("a", json!(1)),
            resolved("b", json!(2)),
        ]);
        let mut cursor = ReplayCursor::new(&input);

        assert_eq!(
            cursor.dispatch("first", Value::Null),
            Instruction::Resolve { value: json!(1) }
        );
        assert_eq!(
            cursor.dispatch("second", Value::Null),
            Instruction::Resolve { value: json!(2) }
        );
        assert!(!cursor.recorded_new_pending());
        assert!(cursor.output().extends(&input));
    }

    #[test]
    fn rejected_input_rejects_with_client_error() {
        let input = ToolState::from(vec![ToolEntry::Rejected {
            id: "a".into(),
            error: json!({"message": "rate limited"}),
        }]);
        let mut cursor = ReplayCursor::new(&input);

        let instruction = cursor.dispatch("webSearch", Value::Null);
        assert_eq!(
            instruction,
            Instruction::Reject {
                value: json!({"message": "rate limited"})
            }
        );
        assert!(!cursor.recorded_new_pending());
    }

    #[test]
    fn pending_input_is_an_invariant_violation() {
        let input = ToolState::from(vec![ToolEntry::Pending {
            id: "a".into(),
            name: "webSearch".into(),
            arguments: Value::Null,
        }]);
        let mut cursor = ReplayCursor::new(&input);

        let Instruction::Reject { value } = cursor.dispatch("webSearch", Value::Null) else {
            panic!("expected reject");
        };
        assert!(!is_new_tool_call(&value));
        assert_eq!(value[CONTROL_KEY], UNEXPECTED_PENDING);
        // The entry is not consumed and nothing is appended.
        assert!(cursor.output().is_empty());
    }

    #[test]
    fn fresh_ids_are_unique_within_a_pass() {
        let mut cursor = ReplayCursor::new(&ToolState::new());
        cursor.dispatch("a", Value::Null);
        cursor.dispatch("b", Value::Null);
        let output = cursor.output();
        let ids: Vec<&str> = output.entries().iter().map(ToolEntry::id).collect();
        assert_ne!(ids[0], ids[1]);
    }
}
