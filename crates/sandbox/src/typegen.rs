//! Tool schemas rendered as TypeScript declarations.
//!
//! The system prompt is the only way the model learns about the client's
//! tools; the completion call itself advertises nothing but the single
//! virtual `run_typescript` tool.

use protocol::ToolDefinition;
use serde_json::{json, Map, Value};

/// Name of the virtual tool the model sees.
pub const RUN_TYPESCRIPT: &str = "run_typescript";

const PROMPT_PREAMBLE: &str = "You orchestrate the user's tools by writing a TypeScript program.\n\
Write all of your logic inside `async function main()`. Do not invoke `main` \
yourself; the runtime calls it. Call the declared tools as ordinary async \
functions and `await` their results; independent calls may be combined with \
`Promise.all`. The value returned from `main` is the result of the program.\n\n\
The following tools are available:";

/// The single tool definition advertised to the model.
pub fn run_typescript_tool() -> ToolDefinition {
    ToolDefinition::new(
        RUN_TYPESCRIPT,
        "Run a TypeScript program that orchestrates the declared tools.",
        json!({
            "type": "object",
            "properties": {
                "code": { "type": "string" }
            },
            "required": ["code"]
        }),
    )
}

/// The full system message for a tool list.
pub fn system_message(tools: &[ToolDefinition]) -> String {
    format!(
        "{PROMPT_PREAMBLE}\n\n```typescript\n{}```",
        declarations(tools)
    )
}

/// Type aliases and function signatures for every tool.
pub fn declarations(tools: &[ToolDefinition]) -> String {
    let mut out = String::new();
    for tool in tools {
        if !tool.description.is_empty() {
            out.push_str(&format!("/** {} */\n", tool.description));
        }

        let arg_alias = alias(&tool.name, "Args");
        out.push_str(&format!(
            "type {arg_alias} = {};\n",
            render_type(&tool.input_schema, 0)
        ));

        let return_type = match &tool.output_schema {
            Some(schema) => {
                let return_alias = alias(&tool.name, "Result");
                out.push_str(&format!(
                    "type {return_alias} = {};\n",
                    render_type(schema, 0)
                ));
                return_alias
            }
            None => "unknown".to_string(),
        };

        out.push_str(&format!(
            "declare async function {}(arg: {arg_alias}): Promise<{return_type}>;\n\n",
            tool.name
        ));
    }
    out
}

/// PascalCase alias for a tool name, e.g. `webSearch` -> `WebSearchArgs`.
fn alias(name: &str, suffix: &str) -> String {
    let mut out = String::new();
    for segment in name.split(|c: char| !c.is_ascii_alphanumeric()) {
        let mut chars = segment.chars();
        if let Some(head) = chars.next() {
            out.extend(head.to_uppercase());
            out.push_str(chars.as_str());
        }
    }
    out.push_str(suffix);
    out
}

fn render_type(schema: &Value, indent: usize) -> String {
    let Value::Object(schema) = schema else {
        return "unknown".to_string();
    };

    if let Some(Value::Array(options)) = schema.get("enum") {
        let literals: Vec<String> = options.iter().map(Value::to_string).collect();
        if !literals.is_empty() {
            return literals.join(" | ");
        }
    }

    for key in ["oneOf", "anyOf"] {
        if let Some(Value::Array(options)) = schema.get(key) {
            let rendered: Vec<String> = options
                .iter()
                .map(|option| render_type(option, indent))
                .collect();
            if !rendered.is_empty() {
                return rendered.join(" | ");
            }
        }
    }

    match schema.get("type").and_then(Value::as_str) {
        Some("string") => "string".to_string(),
        Some("number") | Some("integer") => "number".to_string(),
        Some("boolean") => "boolean".to_string(),
        Some("null") => "null".to_string(),
        Some("array") => {
            let item = schema
                .get("items")
                .map(|items| render_type(items, indent))
                .unwrap_or_else(|| "unknown".to_string());
            if item.contains(' ') {
                format!("({item})[]")
            } else {
                format!("{item}[]")
            }
        }
        Some("object") => render_object(schema, indent),
        None if schema.contains_key("properties") => render_object(schema, indent),
        _ => "unknown".to_string(),
    }
}

fn render_object(schema: &Map<String, Value>, indent: usize) -> String {
    let properties = match schema.get("properties") {
        Some(Value::Object(properties)) if !properties.is_empty() => properties,
        _ => {
            return match schema.get("additionalProperties") {
                Some(extra @ Value::Object(_)) => {
                    format!("Record<string, {}>", render_type(extra, indent))
                }
                _ => "Record<string, unknown>".to_string(),
            };
        }
    };

    let required: Vec<&str> = schema
        .get("required")
        .and_then(Value::as_array)
        .map(|names| names.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    let pad = "  ".repeat(indent + 1);
    let mut body = String::from("{\n");
    for (name, property) in properties {
        let marker = if required.contains(&name.as_str()) {
            ""
        } else {
            "?"
        };
        body.push_str(&format!(
            "{pad}{}{marker}: {};\n",
            property_key(name),
            render_type(property, indent + 1)
        ));
    }
    body.push_str(&"  ".repeat(indent));
    body.push('}');
    body
}

/// Property names that are not plain identifiers get quoted.
fn property_key(name: &str) -> String {
    let plain = !name.is_empty()
        && name
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '$')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$');
    if plain {
        name.to_string()
    } else {
        Value::String(name.to_string()).to_string()
    }
}
