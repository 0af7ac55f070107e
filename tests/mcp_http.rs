//! MCP client over streamable HTTP, against an in-process server.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rmcp::transport::streamable_http_server::{
    session::local::LocalSessionManager, tower::StreamableHttpService,
};
use rmcp::transport::StreamableHttpServerConfig;
use serde_json::json;

use quickstart_agent::llm::ToolCall;
use quickstart_agent::mcp::{self, McpClient, McpServer, McpServerConfig, TransportKind};
use quickstart_agent::tools::{ListDir, ReadFile, Think, ToolOutput, ToolRegistry};

async fn start_server(workspace: PathBuf) -> String {
    let mut registry = ToolRegistry::empty();
    registry.register(Arc::new(Think)).unwrap();
    registry.register(Arc::new(ReadFile)).unwrap();
    registry.register(Arc::new(ListDir)).unwrap();
    let server = McpServer::new("http-workspace", registry, workspace);

    let service = StreamableHttpService::new(
        move || Ok(server.clone()),
        LocalSessionManager::default().into(),
        StreamableHttpServerConfig::default(),
    );
    let app = axum::Router::new().nest_service("/mcp", service);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}/mcp", addr)
}

fn http_config(url: String) -> McpServerConfig {
    McpServerConfig {
        name: "remote".to_string(),
        transport: TransportKind::Http,
        command: None,
        args: vec![],
        env: HashMap::new(),
        url: Some(url),
    }
}

#[tokio::test]
async fn handshake_listing_and_calls_over_http() {
    let dir = tempfile::tempdir().unwrap();
    let url = start_server(dir.path().to_path_buf()).await;

    let client = McpClient::connect(&http_config(url)).await.unwrap();
    assert_eq!(client.server_info()["name"], "http-workspace");

    let tools = client.list_tools().await.unwrap();
    let names: Vec<&str> = tools.iter().map(|t| t.name.as_ref()).collect();
    assert_eq!(names, vec!["think", "read_file", "list_dir"]);

    // several requests on the same session
    for thought in ["one", "two"] {
        let result = client
            .call_tool("think", json!({ "thought": thought }))
            .await
            .unwrap();
        assert_eq!(result.structured_content, Some(json!({ "thought": thought })));
    }

    client.shutdown().await;
}

#[tokio::test]
async fn http_tools_dispatch_through_registry() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("notes.md"), "remember the milk\n").unwrap();
    let url = start_server(dir.path().to_path_buf()).await;

    let mut registry = ToolRegistry::new();
    let clients = mcp::connect_all(&[http_config(url)], &mut registry)
        .await
        .unwrap();
    assert!(registry.contains("remote__read_file"));

    let read = ToolCall::new("h1", "remote__read_file", json!({"path": "notes.md"}).to_string());
    let result = registry.dispatch(&read, Path::new("/unused")).await;
    assert!(!result.is_error());
    assert!(result.to_content().contains("remember the milk"));

    let escape = ToolCall::new("h2", "remote__read_file", json!({"path": "../x"}).to_string());
    let result = registry.dispatch(&escape, Path::new("/unused")).await;
    assert!(result.is_error());
    assert!(result.to_content().contains("outside the workspace"));

    let think = ToolCall::new("h3", "remote__think", json!({"thought": "t"}).to_string());
    let result = registry.dispatch(&think, Path::new("/unused")).await;
    assert_eq!(result.outcome, Ok(ToolOutput::Json(json!({"thought": "t"}))));

    for client in clients {
        client.shutdown().await;
    }
}
