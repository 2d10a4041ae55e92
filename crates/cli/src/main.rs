mod config;
mod error;
mod tools;

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use futures::StreamExt;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use client::Session;
use model::{Catalog, ChatClient, ChatMessage, HttpEngine, Manager, ModelDescriptor};
use server::Server;

use config::Config;
use error::{Error, Result};

const CONFIG_FILE: &str = "purser.toml";
const DEMO_PROMPT: &str = "Why is the sky blue?";

#[derive(Parser)]
#[command(name = "purser")]
#[command(about = "Tool discovery/invocation server and local model host", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, default_value = CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the tool server
    Serve,
    /// List the tools a server exposes
    Tools,
    /// Invoke a tool by name
    Call {
        /// Tool name
        tool: String,
        /// Arguments as a JSON object
        #[arg(short, long, default_value = "{}")]
        args: String,
    },
    /// Stream a chat completion from the local model
    Chat {
        /// The prompt to complete
        prompt: String,
        /// Model alias (defaults to the configured one)
        #[arg(short, long)]
        model: Option<String>,
    },
    /// Run the full demo: warm up the model, stream a completion, then
    /// discover and invoke the employee tool
    Demo,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load_or_default(&cli.config)?;
    tracing::debug!(path = %cli.config.display(), "configuration loaded");

    match cli.command {
        Commands::Serve => cmd_serve(&config).await,
        Commands::Tools => cmd_tools(&config).await,
        Commands::Call { tool, args } => cmd_call(&config, &tool, &args).await,
        Commands::Chat { prompt, model } => cmd_chat(&config, &prompt, model.as_deref()).await,
        Commands::Demo => cmd_demo(&config).await,
    }
}

async fn cmd_serve(config: &Config) -> Result<()> {
    let registry = tools::demo_registry(&config.employee_api)?;
    let listener = tokio::net::TcpListener::bind(&config.server.addr).await?;
    println!("Serving tools on {}", listener.local_addr()?);
    Arc::new(Server::new(registry)).serve(listener).await?;
    Ok(())
}

async fn connect(config: &Config) -> Result<Session> {
    let conn = protocol::connect_tcp(&config.server.addr).await?;
    Ok(Session::connect(conn).await?)
}

async fn cmd_tools(config: &Config) -> Result<()> {
    let session = connect(config).await?;
    for tool in session.list_tools().await? {
        println!("{:<24}  {}", tool.name, tool.description);
    }
    session.close().await?;
    Ok(())
}

async fn cmd_call(config: &Config, tool: &str, args: &str) -> Result<()> {
    let arguments: Map<String, Value> = serde_json::from_str::<Value>(args)
        .ok()
        .and_then(|v| v.as_object().cloned())
        .ok_or(Error::BadArguments)?;

    let session = connect(config).await?;
    let result = session.call_tool(tool, arguments).await?;
    print_result(&result);
    session.close().await?;
    Ok(())
}

fn print_result(result: &protocol::ToolResult) {
    if result.is_error {
        eprintln!("Tool reported an error:");
    }
    for block in &result.content {
        match block {
            protocol::ContentBlock::Text { text } => println!("{text}"),
            protocol::ContentBlock::Binary { mime_type, data } => {
                println!("[binary {mime_type}, {} bytes base64]", data.len());
            }
            protocol::ContentBlock::Resource { uri, mime_type } => {
                println!("[resource {uri} ({mime_type})]");
            }
            protocol::ContentBlock::ToolError { code, message } => {
                eprintln!("[{code:?}] {message}");
            }
        }
    }
}

fn manager_from(config: &Config) -> Manager {
    let mut catalog = Catalog::builtin();
    for entry in &config.models {
        catalog.push(entry.clone());
    }
    let engine = Arc::new(HttpEngine::new(&config.model.engine_url));
    Manager::new(catalog, config.cache_dir(), engine)
}

/// Resolve, download (with progress), and load a model.
async fn warm_up(manager: &Manager, alias: &str) -> Result<(ModelDescriptor, ChatClient)> {
    let descriptor = manager.resolve_alias(alias)?;
    if manager.is_cached(&descriptor)? {
        println!("Model {} is already cached locally.", descriptor.id);
    } else {
        println!("Model {} is not cached locally.", descriptor.id);
        print!("Downloading model: ");
        manager
            .download(&descriptor, |pct| {
                print!("\rDownloading model: {pct:>3}%");
                let _ = std::io::stdout().flush();
            })
            .await?;
        println!();
    }

    print!("Loading model {}...", descriptor.id);
    let _ = std::io::stdout().flush();
    let chat = manager.load(&descriptor).await?;
    println!(" done.");
    Ok((descriptor, chat))
}

async fn stream_to_stdout(chat: &ChatClient, prompt: &str) -> Result<()> {
    let cancel = CancellationToken::new();
    let mut chunks = chat
        .stream_complete(vec![ChatMessage::user(prompt)], cancel)
        .await?;
    while let Some(chunk) = chunks.next().await {
        let chunk = chunk?;
        print!("{}", chunk.delta);
        let _ = std::io::stdout().flush();
    }
    println!();
    Ok(())
}

async fn cmd_chat(config: &Config, prompt: &str, model: Option<&str>) -> Result<()> {
    let manager = manager_from(config);
    let alias = model.unwrap_or(&config.model.alias);

    let (descriptor, chat) = warm_up(&manager, alias).await?;
    stream_to_stdout(&chat, prompt).await?;
    manager.unload(&descriptor).await?;
    Ok(())
}

/// End-to-end flow: local model first, remote tools second.
async fn cmd_demo(config: &Config) -> Result<()> {
    let manager = manager_from(config);
    let (descriptor, chat) = warm_up(&manager, &config.model.alias).await?;

    println!("Chat completion response:");
    stream_to_stdout(&chat, DEMO_PROMPT).await?;

    println!("Unloading model");
    manager.unload(&descriptor).await?;

    println!("Connecting to the tool server");
    let session = connect(config).await?;

    println!("Listing available tools");
    let tools = session.list_tools().await?;
    for tool in &tools {
        println!("  {}", tool.name);
    }

    let mut arguments = Map::new();
    arguments.insert("name".to_string(), Value::String("Hardik".to_string()));
    let result = session
        .call_tool("employee_lookup", arguments)
        .await?;

    println!("Tool response:");
    print_result(&result);

    session.close().await?;
    println!("Work is complete");
    Ok(())
}
