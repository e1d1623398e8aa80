//! The QuickJS replay engine.
//!
//! Each [`evaluate`] call boots a fresh QuickJS runtime, installs one global
//! interceptor function per declared tool, runs the program, and classifies
//! how it settled. The interceptors forward to the [`ReplayCursor`]; values
//! cross the host boundary as JSON text only, so nothing of the host can
//! leak into the sandbox. The runtime and its heap are dropped on every exit
//! path.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use protocol::{CodeBlock, Outcome, PartialEvaluation, ToolDefinition, ToolState};
use rquickjs::{CatchResultExt, CaughtError, Context, Function, Runtime};
use serde_json::Value;
use tracing::debug;

use crate::cursor::{is_new_tool_call, ReplayCursor};
use crate::error::{Error, Result};

/// Default heap cap for one evaluation.
pub const DEFAULT_MEMORY_LIMIT: usize = 8 * 1024 * 1024;

const DEFAULT_MAX_STACK_SIZE: usize = 256 * 1024;

/// Limits applied to every evaluation.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Heap cap in bytes.
    pub memory_limit: usize,
    /// Stack cap in bytes.
    pub max_stack_size: usize,
    /// Optional wall-clock cap on one evaluation. Expiry surfaces as a
    /// runtime-error outcome, not an engine error.
    pub eval_timeout: Option<Duration>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            memory_limit: DEFAULT_MEMORY_LIMIT,
            max_stack_size: DEFAULT_MAX_STACK_SIZE,
            eval_timeout: None,
        }
    }
}

/// How the composed script reported back, if it did.
#[derive(Debug, Clone)]
enum Settlement {
    Success(Value),
    Error(Value),
}

/// Run one replay pass of `block` against `input`.
///
/// Returns an [`Outcome`] for everything the program itself did, including
/// crashing; `Err` is reserved for engine malfunction (context bootstrap,
/// interceptor installation).
pub fn evaluate(
    config: &EngineConfig,
    block: &CodeBlock,
    input: &ToolState,
    tools: &[ToolDefinition],
) -> Result<Outcome> {
    let script = compose_script(tools, &block.code)?;

    let runtime = Runtime::new().map_err(|e| Error::Bootstrap(e.to_string()))?;
    runtime.set_memory_limit(config.memory_limit);
    runtime.set_max_stack_size(config.max_stack_size);

    let deadline = config.eval_timeout.map(|limit| Instant::now() + limit);
    if let Some(deadline) = deadline {
        runtime.set_interrupt_handler(Some(Box::new(move || Instant::now() >= deadline)));
    }

    let context = Context::full(&runtime).map_err(|e| Error::Bootstrap(e.to_string()))?;

    let cursor = Rc::new(RefCell::new(ReplayCursor::new(input)));
    let settlement: Rc<RefCell<Option<Settlement>>> = Rc::new(RefCell::new(None));
    install_bindings(&context, Rc::clone(&cursor), Rc::clone(&settlement))?;

    debug!(block = %block.id, entries = input.len(), "replaying code block");

    let thrown = context.with(|ctx| {
        ctx.eval::<(), _>(script)
            .catch(&ctx)
            .err()
            .map(|caught| Value::String(describe_caught(&caught)))
    });

    // Pump queued promise reactions to quiescence; the trailer's settlement
    // handlers run here. A job that raises is consumed like any other.
    loop {
        match runtime.execute_pending_job() {
            Ok(true) => {}
            Ok(false) => break,
            Err(_) => {}
        }
    }

    let settled = settlement.borrow().clone();
    let outcome = classify(config, block, &cursor.borrow(), settled, thrown, deadline);
    debug!(block = %block.id, outcome = outcome_tag(&outcome), "replay pass settled");
    Ok(outcome)
}

fn classify(
    config: &EngineConfig,
    block: &CodeBlock,
    cursor: &ReplayCursor,
    settlement: Option<Settlement>,
    thrown: Option<Value>,
    deadline: Option<Instant>,
) -> Outcome {
    match settlement {
        Some(Settlement::Success(value)) => Outcome::Success { value },
        Some(Settlement::Error(error)) => {
            if is_new_tool_call(&error) && cursor.recorded_new_pending() {
                Outcome::Partial {
                    partial: PartialEvaluation::new(block.clone(), cursor.output()),
                }
            } else {
                Outcome::Error { error }
            }
        }
        None => {
            // The script threw before the settlement handlers could run, the
            // interrupt handler fired, or the program parked forever.
            let error = if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                let millis = config
                    .eval_timeout
                    .map(|limit| limit.as_millis())
                    .unwrap_or_default();
                Value::String(format!("evaluation timed out after {millis}ms"))
            } else {
                thrown.unwrap_or_else(|| {
                    Value::String("program finished without settling main()".to_string())
                })
            };
            Outcome::Error { error }
        }
    }
}

fn install_bindings(
    context: &Context,
    cursor: Rc<RefCell<ReplayCursor>>,
    settlement: Rc<RefCell<Option<Settlement>>>,
) -> Result<()> {
    context
        .with(|ctx| -> std::result::Result<(), rquickjs::Error> {
            let globals = ctx.globals();

            let dispatch = Function::new(
                ctx.clone(),
                move |name: String, arguments: String| -> String {
                    let arguments: Value = serde_json::from_str(&arguments).unwrap_or(Value::Null);
                    let instruction = cursor.borrow_mut().dispatch(&name, arguments);
                    serde_json::to_string(&instruction)
                        .unwrap_or_else(|_| r#"{"kind":"reject","value":null}"#.to_string())
                },
            )?;
            globals.set("__capstan_dispatch", dispatch)?;

            let settle = Function::new(ctx.clone(), move |tag: String, payload: String| {
                let value: Value = serde_json::from_str(&payload).unwrap_or(Value::Null);
                let mut slot = settlement.borrow_mut();
                if slot.is_none() {
                    *slot = Some(match tag.as_str() {
                        "success" => Settlement::Success(value),
                        _ => Settlement::Error(value),
                    });
                }
            })?;
            globals.set("__capstan_settle", settle)?;

            Ok(())
        })
        .map_err(|e| Error::Install(e.to_string()))
}

/// Assemble the script: marshalling helpers, one shim per tool, the model's
/// code verbatim, and the trailer that calls `main()` and reports settlement.
fn compose_script(tools: &[ToolDefinition], code: &str) -> Result<String> {
    let mut script = String::new();
    script.push_str(
        r#"globalThis.__capstan_json = (v) => {
  try {
    const s = JSON.stringify(v === undefined ? null : v);
    return s === undefined ? "null" : s;
  } catch (_) {
    return JSON.stringify(String(v));
  }
};
globalThis.__capstan_describe = (e) => {
  if (e instanceof Error) {
    const out = { name: e.name, message: e.message };
    if (typeof e.stack === "string") out.stack = e.stack;
    return out;
  }
  return e === undefined ? null : e;
};
"#,
    );

    for tool in tools {
        ensure_usable_name(&tool.name)?;
        let quoted = Value::String(tool.name.clone()).to_string();
        script.push_str(&format!(
            "globalThis.{name} = (arg) => {{\n  \
               const instruction = JSON.parse(__capstan_dispatch({quoted}, __capstan_json(arg)));\n  \
               return instruction.kind === \"resolve\"\n    \
                 ? Promise.resolve(instruction.value)\n    \
                 : Promise.reject(instruction.value);\n\
             }};\n",
            name = tool.name,
        ));
    }

    script.push_str(code);
    script.push_str(
        r#"
Promise.resolve()
  .then(() => main())
  .then(
    (value) => { __capstan_settle("success", __capstan_json(value)); },
    (error) => { __capstan_settle("error", __capstan_json(__capstan_describe(error))); }
  );
"#,
    );

    Ok(script)
}

/// Tool names become sandbox globals, so they must be plain identifiers and
/// must not collide with the engine's own bindings.
fn ensure_usable_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let head_ok = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '$');
    let tail_ok = chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$');
    if !head_ok || !tail_ok || name.starts_with("__capstan") {
        return Err(Error::InvalidToolName(name.to_string()));
    }
    Ok(())
}

fn describe_caught(caught: &CaughtError<'_>) -> String {
    match caught {
        CaughtError::Exception(exception) => {
            let message = exception
                .message()
                .unwrap_or_else(|| "unknown error".to_string());
            match exception.stack() {
                Some(stack) if !stack.is_empty() => format!("{message}\n{stack}"),
                _ => message,
            }
        }
        other => other.to_string(),
    }
}

fn outcome_tag(outcome: &Outcome) -> &'static str {
    match outcome {
        Outcome::Success { .. } => "success",
        Outcome::Error { .. } => "error",
        Outcome::Partial { .. } => "partial",
    }
}
