//! Quickstart Agent - command-line entry point.
//!
//! Usage:
//!   quickstart-agent run <task>
//!   quickstart-agent chat
//!   quickstart-agent serve
//!   quickstart-agent tools

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use quickstart_agent::agent::{Agent, AgentEvent, RunOptions};
use quickstart_agent::api;
use quickstart_agent::api::types::TaskStatus;
use quickstart_agent::config::Config;
use quickstart_agent::llm::client_from_config;
use quickstart_agent::mcp::{self, McpClient};
use quickstart_agent::tools::ToolRegistry;

#[derive(Parser)]
#[command(name = "quickstart-agent")]
#[command(author, version, about = "A bounded tool-calling agent")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Model to use instead of DEFAULT_MODEL
    #[arg(short, long, global = true)]
    model: Option<String>,

    /// Maximum model calls per message
    #[arg(long, global = true)]
    max_iterations: Option<usize>,

    /// Workspace directory for file and command tools
    #[arg(short, long, global = true)]
    workspace: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single task and print the answer
    Run {
        #[arg(trailing_var_arg = true, required = true)]
        task: Vec<String>,
    },
    /// Interactive session over stdin
    Chat,
    /// Start the HTTP API
    Serve,
    /// List the registered tools
    Tools,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout only carries answers.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quickstart_agent=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let mut config = Config::from_env()?;
    if let Some(model) = cli.model {
        config.default_model = model;
    }
    if let Some(n) = cli.max_iterations {
        config = config.with_max_iterations(n)?;
    }
    if let Some(workspace) = cli.workspace {
        config = config.with_workspace(workspace)?;
    }
    info!(
        "Loaded configuration: provider={}, model={}, max_iterations={}",
        config.provider, config.default_model, config.max_iterations
    );

    let mut tools = ToolRegistry::new();
    let mcp_clients = match &config.mcp_config {
        Some(path) => {
            let servers = mcp::load_config(path)?;
            mcp::connect_all(&servers, &mut tools).await?
        }
        None => Vec::new(),
    };

    let llm = client_from_config(&config)?;
    let agent = Arc::new(Agent::with_parts(config, llm, tools));

    let result = match cli.command {
        Commands::Run { task } => run_once(&agent, &task.join(" ")).await,
        Commands::Chat => chat(&agent).await,
        Commands::Serve => api::serve(Arc::clone(&agent)).await,
        Commands::Tools => {
            for tool in agent.tools().list_tools() {
                println!("{:<28} {}", tool.name, tool.description);
            }
            Ok(())
        }
    };

    shutdown(&mcp_clients).await;
    result
}

async fn run_once(agent: &Agent, task: &str) -> anyhow::Result<()> {
    let (events, printer) = progress_printer();
    let outcome = agent
        .run_task_with(
            task,
            RunOptions {
                model: None,
                events: Some(events),
            },
        )
        .await?;
    let _ = printer.await;

    if outcome.status == TaskStatus::MaxIterations {
        eprintln!("(stopped after {} iterations)", outcome.iterations);
    }
    println!("{}", outcome.response);
    Ok(())
}

async fn chat(agent: &Agent) -> anyhow::Result<()> {
    let mut conversation = agent.new_conversation();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    eprintln!("Type a message, or an empty line to quit.");
    while let Some(line) = lines.next_line().await? {
        let message = line.trim();
        if message.is_empty() {
            break;
        }

        let (events, printer) = progress_printer();
        let outcome = agent
            .continue_conversation_with(
                &mut conversation,
                message,
                RunOptions {
                    model: None,
                    events: Some(events),
                },
            )
            .await;
        let _ = printer.await;

        match outcome {
            Ok(outcome) => println!("{}\n", outcome.response),
            Err(e) => eprintln!("error: {}\n", e),
        }
    }
    Ok(())
}

/// Print tool activity to stderr while a run is in progress.
fn progress_printer() -> (
    mpsc::UnboundedSender<AgentEvent>,
    tokio::task::JoinHandle<()>,
) {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let handle = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match event {
                AgentEvent::ToolCall {
                    name, arguments, ..
                } => eprintln!("-> {} {}", name, arguments),
                AgentEvent::ToolResult {
                    name,
                    is_error: true,
                    content,
                    ..
                } => eprintln!("<- {} failed: {}", name, content),
                AgentEvent::MaxIterations { limit } => {
                    eprintln!("iteration limit ({}) reached", limit)
                }
                _ => {}
            }
        }
    });
    (tx, handle)
}

async fn shutdown(clients: &[Arc<McpClient>]) {
    for client in clients {
        client.shutdown().await;
    }
}
