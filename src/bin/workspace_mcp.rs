//! Stdio MCP server exposing read-only workspace tools.
//!
//! stdout carries protocol traffic only, so logs go to stderr.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use quickstart_agent::mcp::McpServer;
use quickstart_agent::tools::{ListDir, ReadFile, Think, ToolRegistry};

#[derive(Parser)]
#[command(name = "workspace-mcp", version, about = "MCP server for workspace inspection")]
struct Args {
    /// Root directory the tools may read.
    #[arg(long, env = "WORKSPACE_PATH")]
    workspace: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "quickstart_agent=info".into()))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let workspace = match args.workspace {
        Some(path) => std::path::absolute(path)?,
        None => std::env::current_dir()?,
    };

    let mut registry = ToolRegistry::empty();
    registry.register(Arc::new(Think))?;
    registry.register(Arc::new(ReadFile))?;
    registry.register(Arc::new(ListDir))?;

    tracing::info!("workspace-mcp serving {}", workspace.display());

    McpServer::new("workspace-mcp", registry, workspace)
        .serve_stdio()
        .await
}
