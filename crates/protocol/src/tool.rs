//! Tool definitions, replay tool-state and evaluation outcomes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A tool implemented on the client side, described to the runtime by its
/// schemas only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<Value>,
}

impl ToolDefinition {
    pub fn new(name: impl Into<String>, description: impl Into<String>, input_schema: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
            output_schema: None,
        }
    }

    pub fn with_output_schema(mut self, schema: Value) -> Self {
        self.output_schema = Some(schema);
        self
    }
}

/// A model-emitted program, expected to define `async function main()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeBlock {
    pub id: String,
    pub code: String,
}

impl CodeBlock {
    pub fn new(id: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            code: code.into(),
        }
    }
}

/// One intercepted tool invocation, in one of its three states.
///
/// Entries are ordered by first observation during replay. Once an entry is
/// resolved or rejected it never changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ToolEntry {
    Pending {
        id: String,
        name: String,
        arguments: Value,
    },
    Resolved {
        id: String,
        result: Value,
    },
    Rejected {
        id: String,
        error: Value,
    },
}

impl ToolEntry {
    pub fn id(&self) -> &str {
        match self {
            Self::Pending { id, .. } | Self::Resolved { id, .. } | Self::Rejected { id, .. } => id,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending { .. })
    }
}

/// The ordered sequence of tool entries observed so far for one code block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToolState {
    entries: Vec<ToolEntry>,
}

impl ToolState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[ToolEntry] {
        &self.entries
    }

    pub fn push(&mut self, entry: ToolEntry) {
        self.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The pending entries, in observation order.
    pub fn pending(&self) -> impl Iterator<Item = &ToolEntry> {
        self.entries.iter().filter(|e| e.is_pending())
    }

    pub fn has_pending(&self) -> bool {
        self.entries.iter().any(ToolEntry::is_pending)
    }

    /// Whether `self` extends `prefix` without mutating any of its entries.
    pub fn extends(&self, prefix: &ToolState) -> bool {
        self.entries.len() >= prefix.entries.len()
            && self
                .entries
                .iter()
                .zip(prefix.entries.iter())
                .all(|(a, b)| a == b)
    }
}

impl From<Vec<ToolEntry>> for ToolState {
    fn from(entries: Vec<ToolEntry>) -> Self {
        Self { entries }
    }
}

impl<'a> IntoIterator for &'a ToolState {
    type Item = &'a ToolEntry;
    type IntoIter = std::slice::Iter<'a, ToolEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// A code block paired with its tool-state: the complete input for one
/// deterministic replay. There is no hidden state; identical partials
/// replay identically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialEvaluation {
    pub code: CodeBlock,
    pub tool_state: ToolState,
}

impl PartialEvaluation {
    pub fn new(code: CodeBlock, tool_state: ToolState) -> Self {
        Self { code, tool_state }
    }
}

/// The outcome of one sandbox replay pass.
///
/// Engine malfunction (context bootstrap, interceptor installation) is not an
/// outcome; it surfaces as the sandbox crate's error type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outcome {
    /// `main` resolved with a value.
    Success { value: Value },
    /// `main` rejected with a genuine runtime failure of the program.
    Error { error: Value },
    /// The program called at least one tool whose result is not yet known.
    Partial { partial: PartialEvaluation },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn resolved(id: &str) -> ToolEntry {
        ToolEntry::Resolved {
            id: id.into(),
            result: json!([1, 2]),
        }
    }

    #[test]
    fn tool_entry_serializes_with_state_tag() {
        let entry = ToolEntry::Pending {
            id: "c1".into(),
            name: "webSearch".into(),
            arguments: json!({"query": "news"}),
        };
        let text = serde_json::to_string(&entry).unwrap();
        assert!(text.contains("\"state\":\"pending\""));
    }

    #[test]
    fn tool_state_extends_itself_and_prefixes() {
        let shorter = ToolState::from(vec![resolved("a")]);
        let longer = ToolState::from(vec![
            resolved("a"),
            ToolEntry::Pending {
                id: "b".into(),
                name: "getWeather".into(),
                arguments: json!({"location": "Paris"}),
            },
        ]);
        assert!(longer.extends(&shorter));
        assert!(longer.extends(&longer));
        assert!(!shorter.extends(&longer));
    }

    #[test]
    fn extends_rejects_mutated_entries() {
        let original = ToolState::from(vec![resolved("a")]);
        let mutated = ToolState::from(vec![ToolEntry::Resolved {
            id: "a".into(),
            result: json!("changed"),
        }]);
        assert!(!mutated.extends(&original));
    }

    #[test]
    fn outcome_wire_tags() {
        let outcome = Outcome::Partial {
            partial: PartialEvaluation::new(
                CodeBlock::new("b1", "async function main() {}"),
                ToolState::new(),
            ),
        };
        let text = serde_json::to_string(&outcome).unwrap();
        assert!(text.contains("\"kind\":\"partial\""));
        assert!(text.contains("\"toolState\":[]"));
    }
}
