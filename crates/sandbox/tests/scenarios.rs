//! End-to-end replay scenarios against the QuickJS engine.

use protocol::{CodeBlock, Outcome, PartialEvaluation, ToolDefinition, ToolEntry, ToolState};
use sandbox::EngineConfig;
use serde_json::{json, Value};
use std::time::Duration;

fn web_search() -> ToolDefinition {
    ToolDefinition::new(
        "webSearch",
        "Search the web",
        json!({
            "type": "object",
            "properties": { "query": { "type": "string" } },
            "required": ["query"]
        }),
    )
}

fn get_weather() -> ToolDefinition {
    ToolDefinition::new(
        "getWeather",
        "Current weather for a location",
        json!({
            "type": "object",
            "properties": { "location": { "type": "string" } },
            "required": ["location"]
        }),
    )
}

fn summarize() -> ToolDefinition {
    ToolDefinition::new(
        "summarize",
        "Summarize a document",
        json!({
            "type": "object",
            "properties": { "url": { "type": "string" } },
            "required": ["url"]
        }),
    )
}

fn run(code: &str, state: &ToolState, tools: &[ToolDefinition]) -> Outcome {
    let block = CodeBlock::new("block-1", code);
    sandbox::evaluate(&EngineConfig::default(), &block, state, tools).expect("engine failure")
}

fn expect_partial(outcome: Outcome) -> PartialEvaluation {
    match outcome {
        Outcome::Partial { partial } => partial,
        other => panic!("expected partial outcome, got {other:?}"),
    }
}

fn expect_success(outcome: Outcome) -> Value {
    match outcome {
        Outcome::Success { value } => value,
        other => panic!("expected success outcome, got {other:?}"),
    }
}

fn expect_error(outcome: Outcome) -> Value {
    match outcome {
        Outcome::Error { error } => error,
        other => panic!("expected error outcome, got {other:?}"),
    }
}

fn pending_calls(state: &ToolState) -> Vec<(String, String, Value)> {
    state
        .pending()
        .map(|entry| match entry {
            ToolEntry::Pending {
                id,
                name,
                arguments,
            } => (id.clone(), name.clone(), arguments.clone()),
            other => panic!("not pending: {other:?}"),
        })
        .collect()
}

#[test]
fn single_tool_call_success() {
    let code = r#"async function main() {
  const r = await webSearch({ query: "news today" });
  return r.filter((x) => x.title.includes("news"));
}"#;
    let tools = [web_search()];

    let partial = expect_partial(run(code, &ToolState::new(), &tools));
    let pending = pending_calls(&partial.tool_state);
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].1, "webSearch");
    assert_eq!(pending[0].2, json!({"query": "news today"}));

    let resolved = ToolState::from(vec![ToolEntry::Resolved {
        id: pending[0].0.clone(),
        result: json!([
            {"title": "news today", "url": "u1"},
            {"title": "news this week", "url": "u2"},
            {"title": "not relevant", "url": "u3"}
        ]),
    }]);
    let value = expect_success(run(code, &resolved, &tools));
    assert_eq!(
        value,
        json!([
            {"title": "news today", "url": "u1"},
            {"title": "news this week", "url": "u2"}
        ])
    );
}

#[test]
fn parallel_fan_out_records_both_pendings_in_order() {
    let code = r#"async function main() {
  return Promise.all([
    webSearch({ query: "sport news" }),
    webSearch({ query: "international affaires news" }),
  ]);
}"#;
    let partial = expect_partial(run(code, &ToolState::new(), &[web_search()]));
    let pending = pending_calls(&partial.tool_state);
    assert_eq!(pending.len(), 2);
    assert_eq!(pending[0].2, json!({"query": "sport news"}));
    assert_eq!(pending[1].2, json!({"query": "international affaires news"}));
}

#[test]
fn sequential_chain_advances_one_call_per_pass() {
    let code = r#"async function main() {
  const a = await webSearch({ query: "sport news" });
  const b = await webSearch({ query: "international affaires news" });
  return { a, b };
}"#;
    let tools = [web_search()];

    let first = expect_partial(run(code, &ToolState::new(), &tools));
    let pending = pending_calls(&first.tool_state);
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].2, json!({"query": "sport news"}));

    let mut answered = ToolState::from(vec![ToolEntry::Resolved {
        id: pending[0].0.clone(),
        result: json!(["s1"]),
    }]);
    let second = expect_partial(run(code, &answered, &tools));
    assert_eq!(second.tool_state.len(), 2);
    assert!(second.tool_state.extends(&answered));
    let pending = pending_calls(&second.tool_state);
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].2, json!({"query": "international affaires news"}));

    answered.push(ToolEntry::Resolved {
        id: pending[0].0.clone(),
        result: json!(["i1"]),
    });
    let value = expect_success(run(code, &answered, &tools));
    assert_eq!(value, json!({"a": ["s1"], "b": ["i1"]}));
}

#[test]
fn sequential_loop_extends_state_by_one_pending_per_pass() {
    let code = r#"async function main() {
  const out = [];
  for (const location of ["Paris", "London", "New York"]) {
    out.push(await getWeather({ location }));
  }
  return out;
}"#;
    let tools = [get_weather()];
    let mut state = ToolState::new();

    for (index, expected) in ["Paris", "London", "New York"].iter().enumerate() {
        let partial = expect_partial(run(code, &state, &tools));
        assert_eq!(partial.tool_state.len(), index + 1);
        assert!(partial.tool_state.extends(&state));

        let pending = pending_calls(&partial.tool_state);
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].2, json!({"location": expected}));

        state.push(ToolEntry::Resolved {
            id: pending[0].0.clone(),
            result: json!({"location": expected, "celsius": 11}),
        });
    }

    let value = expect_success(run(code, &state, &tools));
    assert_eq!(value.as_array().map(Vec::len), Some(3));
}

#[test]
fn post_processing_filters_before_fan_out() {
    let code = r#"async function main() {
  const results = await webSearch({ query: "rust" });
  const kept = results.filter((x) => x.tags.includes("lang"));
  return Promise.all(kept.map((x) => summarize({ url: x.url })));
}"#;
    let tools = [web_search(), summarize()];

    let first = expect_partial(run(code, &ToolState::new(), &tools));
    let pending = pending_calls(&first.tool_state);
    let answered = ToolState::from(vec![ToolEntry::Resolved {
        id: pending[0].0.clone(),
        result: json!([
            {"url": "u1", "tags": ["lang"]},
            {"url": "u2", "tags": ["cooking"]},
            {"url": "u3", "tags": ["lang", "systems"]}
        ]),
    }]);

    let second = expect_partial(run(code, &answered, &tools));
    let pending = pending_calls(&second.tool_state);
    assert_eq!(pending.len(), 2);
    assert!(pending.iter().all(|(_, name, _)| name == "summarize"));
    assert_eq!(pending[0].2, json!({"url": "u1"}));
    assert_eq!(pending[1].2, json!({"url": "u3"}));
}

#[test]
fn runtime_error_in_user_code() {
    let code = r#"async function main() { throw new Error("oops"); }"#;
    let outcome = run(code, &ToolState::new(), &[web_search()]);
    let error = expect_error(outcome);
    assert_eq!(error["message"], "oops");
}

#[test]
fn runtime_error_records_no_pending_calls() {
    let code = r#"async function main() { throw new Error("oops"); }"#;
    let block = CodeBlock::new("block-1", code);
    let outcome =
        sandbox::evaluate(&EngineConfig::default(), &block, &ToolState::new(), &[]).unwrap();
    assert!(matches!(outcome, Outcome::Error { .. }));
}

#[test]
fn synchronous_throw_before_trailer_is_a_runtime_error() {
    let code = r#"throw new Error("early");
async function main() { return 1; }"#;
    let error = expect_error(run(code, &ToolState::new(), &[]));
    assert!(error.as_str().is_some_and(|text| text.contains("early")));
}

#[test]
fn syntax_error_is_a_runtime_error() {
    let error = expect_error(run("async function main( {", &ToolState::new(), &[]));
    assert!(error.is_string());
}

#[test]
fn missing_main_is_a_runtime_error() {
    let error = expect_error(run("const x = 1;", &ToolState::new(), &[]));
    assert_eq!(error["name"], "ReferenceError");
}

#[test]
fn client_rejection_propagates_and_can_be_caught() {
    let tools = [web_search()];
    let rejected = ToolState::from(vec![ToolEntry::Rejected {
        id: "c1".into(),
        error: json!({"message": "rate limited"}),
    }]);

    let uncaught = r#"async function main() {
  return await webSearch({ query: "x" });
}"#;
    let error = expect_error(run(uncaught, &rejected, &tools));
    assert_eq!(error, json!({"message": "rate limited"}));

    let caught = r#"async function main() {
  try {
    return await webSearch({ query: "x" });
  } catch (e) {
    return { fallback: true, reason: e.message };
  }
}"#;
    let value = expect_success(run(caught, &rejected, &tools));
    assert_eq!(value, json!({"fallback": true, "reason": "rate limited"}));
}

#[test]
fn swallowed_interception_still_counts_as_success() {
    // A program that catches the control rejection and returns anyway has
    // settled; the recorded pending entry does not demote the outcome.
    let code = r#"async function main() {
  try { await webSearch({ query: "x" }); } catch (_) {}
  return "done";
}"#;
    let value = expect_success(run(code, &ToolState::new(), &[web_search()]));
    assert_eq!(value, json!("done"));
}

#[test]
fn pending_entry_in_input_is_a_runtime_error() {
    let state = ToolState::from(vec![ToolEntry::Pending {
        id: "c1".into(),
        name: "webSearch".into(),
        arguments: json!({"query": "x"}),
    }]);
    let code = r#"async function main() { return await webSearch({ query: "x" }); }"#;
    let error = expect_error(run(code, &state, &[web_search()]));
    assert_eq!(error["__capstanControl"], "unexpected_pending_tool");
}

#[test]
fn replay_is_deterministic_up_to_minted_ids() {
    let code = r#"async function main() {
  const a = await webSearch({ query: "q1" });
  const b = await webSearch({ query: "q2" });
  return [a, b];
}"#;
    let tools = [web_search()];
    let state = ToolState::from(vec![
        ToolEntry::Resolved {
            id: "c1".into(),
            result: json!(1),
        },
        ToolEntry::Resolved {
            id: "c2".into(),
            result: json!(2),
        },
    ]);

    let first = run(code, &state, &tools);
    let second = run(code, &state, &tools);
    assert_eq!(first, second);
    assert_eq!(expect_success(first), json!([1, 2]));
}

#[test]
fn partial_replays_agree_up_to_ids() {
    let code = r#"async function main() { return await webSearch({ query: "q" }); }"#;
    let tools = [web_search()];

    let first = expect_partial(run(code, &ToolState::new(), &tools));
    let second = expect_partial(run(code, &ToolState::new(), &tools));

    let first_calls = pending_calls(&first.tool_state);
    let second_calls = pending_calls(&second.tool_state);
    assert_eq!(first_calls.len(), second_calls.len());
    for (a, b) in first_calls.iter().zip(&second_calls) {
        assert_eq!(a.1, b.1);
        assert_eq!(a.2, b.2);
        assert_ne!(a.0, b.0);
    }
}

#[test]
fn memory_cap_exhaustion_is_a_runtime_error() {
    let code = r#"async function main() {
  let s = "x";
  for (let i = 0; i < 40; i++) s += s;
  return s.length;
}"#;
    let outcome = run(code, &ToolState::new(), &[]);
    assert!(matches!(outcome, Outcome::Error { .. }));
}

#[test]
fn wall_clock_cap_is_a_runtime_error() {
    let config = EngineConfig {
        eval_timeout: Some(Duration::from_millis(50)),
        ..EngineConfig::default()
    };
    let block = CodeBlock::new("block-1", "async function main() { for (;;) {} }");
    let outcome = sandbox::evaluate(&config, &block, &ToolState::new(), &[]).unwrap();
    assert!(matches!(outcome, Outcome::Error { .. }));
}

#[test]
fn unparked_main_is_a_runtime_error() {
    let code = r#"async function main() { await new Promise(() => {}); }"#;
    let outcome = run(code, &ToolState::new(), &[]);
    assert!(matches!(outcome, Outcome::Error { .. }));
}

#[test]
fn invalid_tool_name_is_an_engine_error() {
    let block = CodeBlock::new("block-1", "async function main() {}");
    let tools = [ToolDefinition::new("web search", "", json!({}))];
    let result = sandbox::evaluate(&EngineConfig::default(), &block, &ToolState::new(), &tools);
    assert!(matches!(result, Err(sandbox::Error::InvalidToolName(_))));
}
