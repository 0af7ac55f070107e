//! Model Context Protocol support.
//!
//! MCP servers are external tool providers. Each configured server is
//! connected once at startup through rmcp; its tools are wrapped in
//! [`McpTool`] and registered next to the native tools.
//!
//! Config file format (JSON, or the same shape in YAML):
//!
//! ```json
//! {
//!   "mcpServers": {
//!     "workspace": { "command": "workspace-mcp", "args": ["--workspace", "."] },
//!     "remote": { "transport": "http", "url": "http://localhost:8931/mcp" }
//!   }
//! }
//! ```

mod client;
pub mod server;
mod tool;

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;

use crate::tools::ToolRegistry;

pub use client::McpClient;
pub use server::McpServer;
pub use tool::McpTool;

#[derive(Debug, Error)]
pub enum McpError {
    #[error("invalid MCP configuration: {0}")]
    Config(String),

    #[error("failed to start MCP server '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("MCP handshake with '{server}' failed: {message}")]
    Handshake { server: String, message: String },

    #[error("MCP request '{0}' timed out")]
    Timeout(String),

    #[error("MCP request failed: {0}")]
    Service(String),
}

/// How to reach a server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Spawn `command args...` and speak JSON-RPC over its stdio.
    #[default]
    Stdio,
    /// Streamable HTTP at `url`.
    Http,
}

/// One entry under `mcpServers`.
#[derive(Debug, Clone, Deserialize)]
pub struct McpServerConfig {
    /// Key of the entry in the config file.
    #[serde(skip)]
    pub name: String,
    #[serde(default)]
    pub transport: TransportKind,
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default)]
    pub url: Option<String>,
}

impl McpServerConfig {
    fn validate(&self) -> Result<(), McpError> {
        match self.transport {
            TransportKind::Stdio => {
                if self.command.as_deref().map_or(true, |c| c.trim().is_empty()) {
                    return Err(McpError::Config(format!(
                        "server '{}' uses stdio but has no command",
                        self.name
                    )));
                }
            }
            TransportKind::Http => {
                let raw = self.url.as_deref().ok_or_else(|| {
                    McpError::Config(format!("server '{}' uses http but has no url", self.name))
                })?;
                url::Url::parse(raw).map_err(|e| {
                    McpError::Config(format!("server '{}' has invalid url '{}': {}", self.name, raw, e))
                })?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct McpConfigFile {
    #[serde(rename = "mcpServers", default)]
    mcp_servers: BTreeMap<String, McpServerConfig>,
}

/// Parse config text. YAML when `yaml` is set, JSON otherwise.
pub fn parse_config(text: &str, yaml: bool) -> Result<Vec<McpServerConfig>, McpError> {
    let file: McpConfigFile = if yaml {
        serde_yaml::from_str(text).map_err(|e| McpError::Config(e.to_string()))?
    } else {
        serde_json::from_str(text).map_err(|e| McpError::Config(e.to_string()))?
    };

    file.mcp_servers
        .into_iter()
        .map(|(name, mut server)| {
            server.name = name;
            server.validate()?;
            Ok(server)
        })
        .collect()
}

/// Load server configs from a `.json`, `.yaml` or `.yml` file.
pub fn load_config(path: &Path) -> Result<Vec<McpServerConfig>, McpError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| McpError::Config(format!("cannot read {}: {}", path.display(), e)))?;
    let yaml = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    );
    parse_config(&text, yaml)
}

/// Connect every configured server and register its tools.
///
/// Any failure aborts startup: already-started servers are shut down and
/// `registry` is left untouched. Tools are staged on a copy and only
/// committed once every server is up.
pub async fn connect_all(
    configs: &[McpServerConfig],
    registry: &mut ToolRegistry,
) -> Result<Vec<Arc<McpClient>>, McpError> {
    let mut staged = registry.clone();
    let mut clients: Vec<Arc<McpClient>> = Vec::new();

    for config in configs {
        match connect_one(config, &mut staged).await {
            Ok(client) => clients.push(client),
            Err(e) => {
                for client in &clients {
                    client.shutdown().await;
                }
                return Err(e);
            }
        }
    }

    *registry = staged;
    Ok(clients)
}

async fn connect_one(
    config: &McpServerConfig,
    registry: &mut ToolRegistry,
) -> Result<Arc<McpClient>, McpError> {
    let client = Arc::new(McpClient::connect(config).await?);

    let tools = match client.list_tools().await {
        Ok(tools) => tools,
        Err(e) => {
            client.shutdown().await;
            return Err(e);
        }
    };

    for info in tools {
        let tool = McpTool::new(Arc::clone(&client), info);
        let name = tool.qualified_name().to_string();
        if let Err(e) = registry.register(Arc::new(tool)) {
            client.shutdown().await;
            return Err(McpError::Config(e.to_string()));
        }
        tracing::debug!(server = %config.name, tool = %name, "Registered MCP tool");
    }

    Ok(client)
}
