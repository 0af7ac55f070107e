//! MCP client backed by rmcp, over a spawned child process or streamable HTTP.

use std::time::Duration;

use rmcp::model::{CallToolRequestParam, CallToolResult, Tool as RemoteTool};
use rmcp::service::{Peer, RunningService, ServiceExt};
use rmcp::transport::{ConfigureCommandExt, StreamableHttpClientTransport, TokioChildProcess};
use rmcp::RoleClient;
use serde_json::Value;
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::{McpError, McpServerConfig, TransportKind};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// A connected MCP server.
pub struct McpClient {
    name: String,
    peer: Peer<RoleClient>,
    service: Mutex<Option<RunningService<RoleClient, ()>>>,
    server_info: Value,
}

impl McpClient {
    /// Start or reach the server and perform the initialize handshake.
    pub async fn connect(config: &McpServerConfig) -> Result<Self, McpError> {
        let service = match config.transport {
            TransportKind::Stdio => {
                let transport = spawn_stdio(config)?;
                handshake(&config.name, ().serve(transport)).await?
            }
            TransportKind::Http => {
                let url = config
                    .url
                    .clone()
                    .ok_or_else(|| McpError::Config(format!("server '{}' has no url", config.name)))?;
                info!(server = %config.name, "Connecting to MCP server at {}", url);
                let transport = StreamableHttpClientTransport::from_uri(url);
                handshake(&config.name, ().serve(transport)).await?
            }
        };

        let server_info = service
            .peer_info()
            .and_then(|init| serde_json::to_value(&init.server_info).ok())
            .unwrap_or(Value::Null);
        info!(
            server = %config.name,
            remote = server_info.get("name").and_then(serde_json::Value::as_str).unwrap_or("unknown"),
            "Connected to MCP server"
        );

        Ok(Self {
            name: config.name.clone(),
            peer: service.peer().clone(),
            service: Mutex::new(Some(service)),
            server_info,
        })
    }

    /// Configured server name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `serverInfo` from the initialize response.
    pub fn server_info(&self) -> &Value {
        &self.server_info
    }

    /// All tools the server exposes, following pagination cursors.
    pub async fn list_tools(&self) -> Result<Vec<RemoteTool>, McpError> {
        let tools = tokio::time::timeout(REQUEST_TIMEOUT, self.peer.list_all_tools())
            .await
            .map_err(|_| McpError::Timeout("tools/list".to_string()))?
            .map_err(|e| McpError::Service(e.to_string()))?;
        debug!(server = %self.name, "Server lists {} tools", tools.len());
        Ok(tools)
    }

    /// Invoke a tool on the server.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<CallToolResult, McpError> {
        debug!(server = %self.name, "Calling MCP tool: {} with args: {}", name, arguments);
        let request = CallToolRequestParam {
            name: name.to_string().into(),
            arguments: arguments.as_object().cloned(),
            task: None,
        };
        tokio::time::timeout(REQUEST_TIMEOUT, self.peer.call_tool(request))
            .await
            .map_err(|_| McpError::Timeout("tools/call".to_string()))?
            .map_err(|e| McpError::Service(e.to_string()))
    }

    /// Close the session. A stdio server process is terminated with it.
    pub async fn shutdown(&self) {
        let Some(service) = self.service.lock().await.take() else {
            return;
        };
        if let Err(e) = service.cancel().await {
            debug!(server = %self.name, "MCP session ended abnormally: {}", e);
        }
    }
}

fn spawn_stdio(config: &McpServerConfig) -> Result<TokioChildProcess, McpError> {
    let command = config
        .command
        .as_deref()
        .ok_or_else(|| McpError::Config(format!("server '{}' has no command", config.name)))?;

    info!(server = %config.name, "Starting MCP server: {} {}", command, config.args.join(" "));

    let args = config.args.clone();
    let env = config.env.clone();
    TokioChildProcess::new(Command::new(command).configure(move |cmd| {
        cmd.args(&args).envs(&env);
    }))
    .map_err(|source| McpError::Spawn {
        command: command.to_string(),
        source,
    })
}

async fn handshake<F, E>(server: &str, serve: F) -> Result<RunningService<RoleClient, ()>, McpError>
where
    F: std::future::Future<Output = Result<RunningService<RoleClient, ()>, E>>,
    E: std::fmt::Display,
{
    tokio::time::timeout(REQUEST_TIMEOUT, serve)
        .await
        .map_err(|_| McpError::Timeout("initialize".to_string()))?
        .map_err(|e| McpError::Handshake {
            server: server.to_string(),
            message: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn spawn_failure_reports_command() {
        let config = McpServerConfig {
            name: "ghost".to_string(),
            transport: TransportKind::Stdio,
            command: Some("/nonexistent/mcp-server-binary".to_string()),
            args: vec![],
            env: Default::default(),
            url: None,
        };
        let err = McpClient::connect(&config).await.err().unwrap();
        assert!(matches!(err, McpError::Spawn { ref command, .. } if command == "/nonexistent/mcp-server-binary"));
    }
}
