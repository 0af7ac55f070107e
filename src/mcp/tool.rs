//! Adapter exposing a remote MCP tool through the [`Tool`] trait.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use rmcp::model::{CallToolResult, RawContent, Tool as RemoteTool};
use serde_json::Value;

use super::McpClient;
use crate::tools::{Tool, ToolOutput};

const MAX_TOOL_NAME_LEN: usize = 64;

/// A tool served by an MCP server.
///
/// Registered as `{server}__{tool}` so that remote tools never shadow native
/// ones; the server is always called with the remote name.
pub struct McpTool {
    client: Arc<McpClient>,
    qualified_name: String,
    description: String,
    info: RemoteTool,
}

impl McpTool {
    pub fn new(client: Arc<McpClient>, info: RemoteTool) -> Self {
        let qualified_name = qualify(client.name(), &info.name);
        let description = match &info.description {
            Some(d) if !d.is_empty() => d.to_string(),
            _ => format!("Tool '{}' from MCP server '{}'", info.name, client.name()),
        };
        Self {
            client,
            qualified_name,
            description,
            info,
        }
    }

    pub fn qualified_name(&self) -> &str {
        &self.qualified_name
    }

    pub fn remote_name(&self) -> &str {
        &self.info.name
    }
}

#[async_trait]
impl Tool for McpTool {
    fn name(&self) -> &str {
        &self.qualified_name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> Value {
        Value::Object(self.info.input_schema.as_ref().clone())
    }

    async fn execute(&self, args: Value, _workspace: &Path) -> anyhow::Result<ToolOutput> {
        let result = self.client.call_tool(&self.info.name, args).await?;
        into_output(result)
    }
}

/// Build a registry name limited to `[A-Za-z0-9_-]`, which every provider accepts.
pub(crate) fn qualify(server: &str, tool: &str) -> String {
    let raw = format!("{}__{}", server, tool);
    let mut name: String = raw
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect();
    name.truncate(MAX_TOOL_NAME_LEN);
    name
}

/// Map a `tools/call` result onto a tool outcome.
pub(crate) fn into_output(result: CallToolResult) -> anyhow::Result<ToolOutput> {
    let text = result
        .content
        .iter()
        .filter_map(|item| match &item.raw {
            RawContent::Text(t) => Some(t.text.as_str()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\n");

    if result.is_error.unwrap_or(false) {
        if text.is_empty() {
            anyhow::bail!("MCP tool reported an error");
        }
        anyhow::bail!(text);
    }

    if let Some(structured) = result.structured_content {
        return Ok(ToolOutput::Json(structured));
    }

    if text.is_empty() {
        let image = result.content.into_iter().find_map(|item| match item.raw {
            RawContent::Image(image) => Some(ToolOutput::Image {
                media_type: image.mime_type,
                data: image.data,
            }),
            _ => None,
        });
        if let Some(image) = image {
            return Ok(image);
        }
    }

    Ok(ToolOutput::Text(text))
}
