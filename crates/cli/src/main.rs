mod config;
mod error;
mod rpc;

use std::io::{self, BufRead, Read, Write};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use protocol::{AssistantReply, ClientMessage, EvalResult, ToolCallRequest, ToolDefinition};
use runtime::{Backend, OpenAiBackend, Orchestrator, ScriptedBackend};
use sandbox::service::{self, ConvertToolsRequest, EvaluateRequest};
use serde_json::json;

use config::Config;
use error::{Error, Result};

#[derive(Parser)]
#[command(name = "capstan")]
#[command(about = "Code-mode tool orchestration for LLMs", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, default_value = "capstan.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat against the configured backend, answering tool calls by hand
    Chat {
        /// Path to a JSON file with tool definitions
        #[arg(short, long)]
        tools: Option<PathBuf>,
    },
    /// Run the offline scripted demo
    Demo,
    /// Print the virtual tool and system message for a tool list
    ConvertTools {
        /// Path to a JSON file with tool definitions (stdin when omitted)
        #[arg(short, long)]
        tools: Option<PathBuf>,
    },
    /// Run one replay pass for an evaluate request (file or stdin)
    Eval {
        /// Path to a JSON file with the evaluate request
        #[arg(short, long)]
        request: Option<PathBuf>,
    },
    /// Serve convert-tools and evaluate over stdio (line-delimited JSON-RPC)
    Serve,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load_or_default(&cli.config)?;

    match cli.command {
        Commands::Chat { tools } => cmd_chat(&config, tools.as_deref()).await,
        Commands::Demo => cmd_demo(&config).await,
        Commands::ConvertTools { tools } => cmd_convert_tools(tools.as_deref()),
        Commands::Eval { request } => cmd_eval(&config, request.as_deref()),
        Commands::Serve => cmd_serve(config).await,
    }
}

async fn cmd_chat(config: &Config, tools_path: Option<&Path>) -> Result<()> {
    let api_key = config.api_key()?;
    let tools = match tools_path {
        Some(path) => read_json::<Vec<ToolDefinition>>(Some(path))?,
        None => Vec::new(),
    };

    let backend = OpenAiBackend::builder(api_key, &config.backend.model)
        .base_url(&config.backend.base_url)
        .build();
    let orchestrator = Orchestrator::with_engine(backend, tools, config.engine_config());

    println!("capstan v{}", env!("CARGO_PKG_VERSION"));
    println!("Model: {}", config.backend.model);
    println!("Tool calls surfaced here must be answered with one JSON line each.");
    println!("Type 'quit' or Ctrl+D to exit.\n");

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut history: Vec<ClientMessage> = Vec::new();

    loop {
        print!("> ");
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input == "quit" || input == "exit" {
            break;
        }

        history.push(ClientMessage::user(input));
        if let Err(e) = advance(&orchestrator, &mut history).await {
            eprintln!("Error: {e}\n");
        }
    }

    println!("\nBye.");
    Ok(())
}

/// Drive `serve` until a terminal assistant message, answering surfaced tool
/// calls from stdin.
async fn advance<B: Backend>(
    orchestrator: &Orchestrator<B>,
    history: &mut Vec<ClientMessage>,
) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        let suffix = orchestrator.serve(history).await?;
        for message in &suffix {
            print_message(message);
        }
        history.extend(suffix.clone());

        let Some(ClientMessage::Assistant { tool_calls, .. }) = suffix.last() else {
            return Ok(());
        };
        if tool_calls.is_empty() {
            return Ok(());
        }

        for call in tool_calls.clone() {
            print!("[{} {}] result (JSON)> ", call.function.name, call.id);
            stdout.flush()?;
            let mut line = String::new();
            if stdin.lock().read_line(&mut line)? == 0 {
                return Ok(());
            }
            history.push(ClientMessage::tool(call.id.clone(), line.trim()));
        }
    }
}

const DEMO_CODE: &str = r#"async function main() {
  const results = await webSearch({ query: "news today" });
  const relevant = results.filter((x) => x.title.includes("news"));
  return Promise.all(relevant.map((x) => summarize({ url: x.url })));
}"#;

async fn cmd_demo(config: &Config) -> Result<()> {
    let backend = ScriptedBackend::new([
        AssistantReply::tool_call(ToolCallRequest::new(
            "block-1",
            sandbox::RUN_TYPESCRIPT,
            json!({ "code": DEMO_CODE }),
        )),
        AssistantReply::text("Summarized the two matching articles."),
    ]);
    let orchestrator = Orchestrator::with_engine(backend, demo_tools(), config.engine_config());

    let mut history = vec![ClientMessage::user("Summarize today's news")];
    print_message(&history[0]);

    loop {
        let suffix = orchestrator.serve(&history).await?;
        for message in &suffix {
            print_message(message);
        }
        history.extend(suffix.clone());

        let Some(ClientMessage::Assistant { tool_calls, .. }) = suffix.last() else {
            break;
        };
        if tool_calls.is_empty() {
            break;
        }
        for call in tool_calls.clone() {
            let content = demo_tool_result(&call);
            println!("[client] {}({}) -> {content}", call.function.name, call.id);
            history.push(ClientMessage::tool(call.id.clone(), content));
        }
    }

    Ok(())
}

fn demo_tools() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition::new(
            "webSearch",
            "Search the web",
            json!({
                "type": "object",
                "properties": { "query": { "type": "string" } },
                "required": ["query"]
            }),
        )
        .with_output_schema(json!({
            "type": "array",
            "items": {
                "type": "object",
                "properties": {
                    "title": { "type": "string" },
                    "url": { "type": "string" }
                },
                "required": ["title", "url"]
            }
        })),
        ToolDefinition::new(
            "summarize",
            "Summarize a page",
            json!({
                "type": "object",
                "properties": { "url": { "type": "string" } },
                "required": ["url"]
            }),
        ),
    ]
}

fn demo_tool_result(call: &ToolCallRequest) -> String {
    match call.function.name.as_str() {
        "webSearch" => json!([
            {"title": "news today", "url": "https://example.com/a"},
            {"title": "news this week", "url": "https://example.com/b"},
            {"title": "unrelated", "url": "https://example.com/c"}
        ])
        .to_string(),
        "summarize" => json!({"summary": "One tight paragraph."}).to_string(),
        _ => "null".to_string(),
    }
}

fn cmd_convert_tools(path: Option<&Path>) -> Result<()> {
    let tools: Vec<ToolDefinition> = read_json(path)?;
    let response = service::convert_tools(&ConvertToolsRequest { tools });
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

fn cmd_eval(config: &Config, path: Option<&Path>) -> Result<()> {
    let request: EvaluateRequest = read_json(path)?;
    let response = service::evaluate_request(&config.engine_config(), &request);
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

async fn cmd_serve(config: Config) -> Result<()> {
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

    let engine = config.engine_config();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<rpc::Request>(&line) {
            Ok(request) => {
                let engine = engine.clone();
                tokio::task::spawn_blocking(move || rpc::dispatch(&engine, request))
                    .await
                    .unwrap_or_else(|e| rpc::Response::internal_error(e.to_string()))
            }
            Err(e) => rpc::Response::parse_error(e.to_string()),
        };

        let mut payload = serde_json::to_vec(&response)?;
        payload.push(b'\n');
        stdout.write_all(&payload).await?;
        stdout.flush().await?;
    }

    Ok(())
}

fn print_message(message: &ClientMessage) {
    match message {
        ClientMessage::System { .. } => {}
        ClientMessage::User { content } => println!("[user] {content}"),
        ClientMessage::Assistant {
            content,
            tool_calls,
        } => {
            if let Some(content) = content {
                println!("[assistant] {content}");
            }
            for call in tool_calls {
                println!(
                    "[assistant] wants {}({}) as {}",
                    call.function.name, call.function.arguments, call.id
                );
            }
        }
        ClientMessage::Tool {
            tool_call_id,
            content,
        } => println!("[tool {tool_call_id}] {content}"),
        ClientMessage::Code { id, code } => println!("[code {id}]\n{code}"),
        ClientMessage::CodeResult { id, result } => match result {
            EvalResult::Success { data } => println!("[code-result {id}] success: {data}"),
            EvalResult::Error { error } => println!("[code-result {id}] error: {error}"),
        },
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: Option<&Path>) -> Result<T> {
    let text = match path {
        Some(path) => {
            if !path.exists() {
                return Err(Error::InputNotFound {
                    path: path.to_path_buf(),
                });
            }
            std::fs::read_to_string(path)?
        }
        None => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            buffer
        }
    };
    Ok(serde_json::from_str(&text)?)
}
