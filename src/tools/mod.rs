//! Tool registry and dispatcher.
//!
//! A tool is `{name, description, parameter schema}` plus an async handler.
//! Native tools and MCP-backed tools implement the same [`Tool`] trait, so
//! the dispatcher does not distinguish between them.

mod chart;
mod file;
mod search;
mod terminal;
mod think;

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::llm::{ToolCall, ToolSchema};

pub use chart::ChartTool;
pub use file::{EditFile, ListDir, ReadFile, WriteFile};
pub use search::GrepSearch;
pub use terminal::RunCommand;
pub use think::Think;

/// A capability the model can invoke by name.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON schema of the accepted arguments.
    fn parameters_schema(&self) -> Value;

    /// Run the tool. `workspace` is the root for any filesystem access.
    async fn execute(&self, args: Value, workspace: &Path) -> anyhow::Result<ToolOutput>;
}

/// Successful tool payload.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    Text(String),
    Json(Value),
    /// Base64-encoded image data.
    Image { media_type: String, data: String },
}

impl ToolOutput {
    /// Render the payload as conversation text.
    pub fn to_content(&self) -> String {
        match self {
            ToolOutput::Text(text) => text.clone(),
            ToolOutput::Json(value) => value.to_string(),
            ToolOutput::Image { media_type, data } => {
                format!("[image: {}, {} bytes base64]", media_type, data.len())
            }
        }
    }
}

impl From<String> for ToolOutput {
    fn from(text: String) -> Self {
        ToolOutput::Text(text)
    }
}

impl From<Value> for ToolOutput {
    fn from(value: Value) -> Self {
        ToolOutput::Json(value)
    }
}

/// The resolution of one tool call: a payload or a human-readable failure.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolResult {
    pub call_id: String,
    pub name: String,
    pub outcome: Result<ToolOutput, String>,
}

impl ToolResult {
    pub fn is_error(&self) -> bool {
        self.outcome.is_err()
    }

    pub fn to_content(&self) -> String {
        match &self.outcome {
            Ok(output) => output.to_content(),
            Err(message) => format!("Error: {}", message),
        }
    }
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("tool '{0}' is already registered")]
    Duplicate(String),

    #[error("unknown tool: {0}")]
    Unknown(String),

    #[error("invalid arguments for {tool}: {reason}")]
    InvalidArguments { tool: String, reason: String },

    #[error("{tool} failed: {message}")]
    Failed { tool: String, message: String },
}

/// Name and description, for prompts and listings.
#[derive(Debug, Clone, Serialize)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
}

/// Registered tools, looked up by name. Built once, read-only during a run.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    /// Registry with the default native tools.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        let natives: Vec<Arc<dyn Tool>> = vec![
            Arc::new(Think),
            Arc::new(RunCommand),
            Arc::new(ReadFile),
            Arc::new(WriteFile),
            Arc::new(EditFile),
            Arc::new(ListDir),
            Arc::new(GrepSearch),
            Arc::new(ChartTool),
        ];
        for tool in natives {
            // names above are distinct
            let _ = registry.register(tool);
        }
        registry
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<(), ToolError> {
        let name = tool.name().to_string();
        if self.index.contains_key(&name) {
            return Err(ToolError::Duplicate(name));
        }
        self.index.insert(name, self.tools.len());
        self.tools.push(tool);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.index.get(name).map(|&i| &self.tools[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Registered tools in registration order.
    pub fn list_tools(&self) -> Vec<ToolInfo> {
        self.tools
            .iter()
            .map(|t| ToolInfo {
                name: t.name().to_string(),
                description: t.description().to_string(),
            })
            .collect()
    }

    /// Schemas to send with each model request.
    pub fn get_tool_schemas(&self) -> Vec<ToolSchema> {
        self.tools
            .iter()
            .map(|t| ToolSchema::new(t.name(), t.description(), t.parameters_schema()))
            .collect()
    }

    /// Run a tool by name.
    ///
    /// The handler runs on its own task, so a panic inside it is reported as
    /// `ToolError::Failed` instead of unwinding through the caller.
    pub async fn execute(
        &self,
        name: &str,
        args: Value,
        workspace: &Path,
    ) -> Result<ToolOutput, ToolError> {
        let tool = self
            .get(name)
            .cloned()
            .ok_or_else(|| ToolError::Unknown(name.to_string()))?;
        let workspace = workspace.to_path_buf();

        let handle = tokio::spawn(async move { tool.execute(args, &workspace).await });
        match handle.await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => Err(ToolError::Failed {
                tool: name.to_string(),
                message: format!("{:#}", e),
            }),
            Err(join_err) => Err(ToolError::Failed {
                tool: name.to_string(),
                message: if join_err.is_panic() {
                    "handler panicked".to_string()
                } else {
                    "handler was cancelled".to_string()
                },
            }),
        }
    }

    /// Resolve a model-issued call into exactly one result. Never fails:
    /// unknown tools, malformed arguments and handler errors all become
    /// error results the model can react to.
    pub async fn dispatch(&self, call: &ToolCall, workspace: &Path) -> ToolResult {
        let name = call.function.name.as_str();
        let outcome = match parse_arguments(name, &call.function.arguments) {
            Ok(args) => self.execute(name, args, workspace).await,
            Err(e) => Err(e),
        };

        if let Err(e) = &outcome {
            tracing::warn!(tool = name, call_id = %call.id, "Tool call failed: {}", e);
        }

        ToolResult {
            call_id: call.id.clone(),
            name: name.to_string(),
            outcome: outcome.map_err(|e| e.to_string()),
        }
    }
}

fn parse_arguments(tool: &str, raw: &str) -> Result<Value, ToolError> {
    if raw.trim().is_empty() {
        return Ok(Value::Object(Default::default()));
    }
    serde_json::from_str(raw).map_err(|e| ToolError::InvalidArguments {
        tool: tool.to_string(),
        reason: e.to_string(),
    })
}

/// Resolve `relative` against `workspace`, rejecting paths that escape it.
///
/// Resolution is lexical so it also works for files that do not exist yet.
/// Absolute inputs and any `..` that would climb above the root are refused;
/// the workspace itself is used as given.
pub(crate) fn resolve_in_workspace(workspace: &Path, relative: &str) -> anyhow::Result<PathBuf> {
    let outside = || anyhow::anyhow!("path '{}' is outside the workspace", relative);

    let mut resolved = workspace.to_path_buf();
    let mut depth = 0usize;
    for component in Path::new(relative).components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if depth == 0 {
                    return Err(outside());
                }
                resolved.pop();
                depth -= 1;
            }
            Component::Normal(part) => {
                resolved.push(part);
                depth += 1;
            }
            Component::RootDir | Component::Prefix(_) => return Err(outside()),
        }
    }
    Ok(resolved)
}

/// Truncate `s` to at most `max_len` bytes on a char boundary, appending a marker.
pub(crate) fn truncate_output(mut s: String, max_len: usize) -> String {
    if s.len() <= max_len {
        return s;
    }
    let mut cut = max_len;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    s.truncate(cut);
    s.push_str("\n... [output truncated]");
    s
}

/// Fetch a required string argument.
pub(crate) fn required_str<'a>(args: &'a Value, key: &str) -> anyhow::Result<&'a str> {
    args[key]
        .as_str()
        .ok_or_else(|| anyhow::anyhow!("Missing '{}' argument", key))
}
