//! MCP server exposing a [`ToolRegistry`] through rmcp. Used by the
//! `workspace-mcp` binary.

use std::path::PathBuf;
use std::sync::Arc;

use rmcp::model::{
    CallToolRequestParam, CallToolResult, Content, Implementation, JsonObject, ListToolsResult,
    PaginatedRequestParam, ServerCapabilities, ServerInfo, Tool as RemoteTool,
};
use rmcp::service::RequestContext;
use rmcp::{ErrorData, RoleServer, ServerHandler, ServiceExt};
use serde_json::Value;
use tracing::{debug, info};

use crate::tools::{ToolOutput, ToolRegistry};

#[derive(Clone)]
pub struct McpServer {
    name: String,
    registry: Arc<ToolRegistry>,
    workspace: Arc<PathBuf>,
}

impl McpServer {
    pub fn new(name: impl Into<String>, registry: ToolRegistry, workspace: PathBuf) -> Self {
        Self {
            name: name.into(),
            registry: Arc::new(registry),
            workspace: Arc::new(workspace),
        }
    }

    /// Serve over stdin/stdout until the client disconnects.
    pub async fn serve_stdio(self) -> anyhow::Result<()> {
        let running = self
            .serve(rmcp::transport::stdio())
            .await
            .map_err(|e| anyhow::anyhow!("MCP initialize failed: {}", e))?;
        let reason = running.waiting().await?;
        info!("MCP session closed: {:?}", reason);
        Ok(())
    }

    /// Registry entries in MCP tool form.
    pub fn tools(&self) -> Vec<RemoteTool> {
        self.registry
            .get_tool_schemas()
            .into_iter()
            .map(|schema| {
                let input_schema = match schema.function.parameters {
                    Value::Object(map) => map,
                    _ => JsonObject::new(),
                };
                RemoteTool::new(
                    schema.function.name,
                    schema.function.description,
                    Arc::new(input_schema),
                )
            })
            .collect()
    }

    /// Protocol-level problems are `Err`; tool failures are `isError` results.
    pub async fn run_tool(&self, name: &str, arguments: Value) -> Result<CallToolResult, ErrorData> {
        if !self.registry.contains(name) {
            return Err(ErrorData::invalid_params(format!("unknown tool: {}", name), None));
        }

        let result = match self.registry.execute(name, arguments, &self.workspace).await {
            Ok(ToolOutput::Json(value)) => CallToolResult::structured(value),
            Ok(ToolOutput::Image { media_type, data }) => {
                CallToolResult::success(vec![Content::image(data, media_type)])
            }
            Ok(ToolOutput::Text(text)) => CallToolResult::success(vec![Content::text(text)]),
            Err(e) => CallToolResult::error(vec![Content::text(e.to_string())]),
        };
        Ok(result)
    }
}

impl ServerHandler for McpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: self.name.clone(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                ..Default::default()
            },
            instructions: Some(format!(
                "Tools operating on the workspace {}",
                self.workspace.display()
            )),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, ErrorData> {
        let tools = self.tools();
        debug!("Listing {} tools", tools.len());
        Ok(ListToolsResult {
            tools,
            ..Default::default()
        })
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, ErrorData> {
        let arguments = request.arguments.map_or_else(|| Value::Object(JsonObject::new()), Value::Object);
        debug!("Calling tool: {} with args: {}", request.name, arguments);
        self.run_tool(&request.name, arguments).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

    use crate::tools::Think;

    fn server() -> McpServer {
        let mut registry = ToolRegistry::empty();
        registry.register(Arc::new(Think)).unwrap();
        McpServer::new("test", registry, PathBuf::from("."))
    }

    #[test]
    fn info_names_server_and_enables_tools() {
        let info = server().get_info();
        assert_eq!(info.server_info.name, "test");
        assert!(info.capabilities.tools.is_some());
    }

    #[test]
    fn registry_becomes_tool_list() {
        let tools = server().tools();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "think");
        assert_eq!(tools[0].input_schema["type"], "object");
    }

    #[tokio::test]
    async fn tool_outcomes_map_to_results() {
        let server = server();

        let ok = server.run_tool("think", json!({"thought": "hmm"})).await.unwrap();
        assert_eq!(ok.structured_content, Some(json!({"thought": "hmm"})));
        assert_ne!(ok.is_error, Some(true));

        let failed = server.run_tool("think", json!({})).await.unwrap();
        assert_eq!(failed.is_error, Some(true));

        assert!(server.run_tool("nope", json!({})).await.is_err());
    }

    #[tokio::test]
    async fn round_trip_over_in_memory_pipe() {
        let (server_io, client_io) = tokio::io::duplex(64 * 1024);
        tokio::spawn(async move {
            if let Ok(running) = server().serve(server_io).await {
                let _ = running.waiting().await;
            }
        });

        let client = ().serve(client_io).await.unwrap();
        let tools = client.list_all_tools().await.unwrap();
        assert_eq!(tools[0].name, "think");

        let result = client
            .call_tool(CallToolRequestParam {
                name: "think".into(),
                arguments: json!({"thought": "piped"}).as_object().cloned(),
                task: None,
            })
            .await
            .unwrap();
        assert_eq!(result.structured_content, Some(json!({"thought": "piped"})));

        let unknown = client
            .call_tool(CallToolRequestParam {
                name: "teleport".into(),
                arguments: None,
                task: None,
            })
            .await;
        assert!(unknown.is_err());

        client.cancel().await.unwrap();
    }

    #[tokio::test]
    async fn messages_without_method_get_no_reply() {
        let (server_io, client_io) = tokio::io::duplex(64 * 1024);
        tokio::spawn(async move {
            if let Ok(running) = server().serve(server_io).await {
                let _ = running.waiting().await;
            }
        });

        let (read, mut write) = tokio::io::split(client_io);
        let mut lines = BufReader::new(read).lines();
        let send = |value: Value| format!("{}\n", value);

        write
            .write_all(
                send(json!({
                    "jsonrpc": "2.0", "id": 1, "method": "initialize",
                    "params": {
                        "protocolVersion": "2024-11-05",
                        "capabilities": {},
                        "clientInfo": {"name": "raw", "version": "0"}
                    }
                }))
                .as_bytes(),
            )
            .await
            .unwrap();
        let init: Value = serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
        assert_eq!(init["id"], 1);
        assert_eq!(init["result"]["serverInfo"]["name"], "test");

        write
            .write_all(send(json!({"jsonrpc": "2.0", "method": "notifications/initialized"})).as_bytes())
            .await
            .unwrap();
        // a response to a request the server never made
        write
            .write_all(send(json!({"jsonrpc": "2.0", "id": 99, "result": {}})).as_bytes())
            .await
            .unwrap();
        write
            .write_all(send(json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"})).as_bytes())
            .await
            .unwrap();

        let next: Value = serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
        assert_eq!(next["id"], 2);
        assert_eq!(next["result"]["tools"][0]["name"], "think");
    }
}
