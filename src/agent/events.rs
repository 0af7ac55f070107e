use serde::Serialize;

use crate::llm::TokenUsage;

/// Progress of a run, streamed to observers as it happens.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// A new model call is starting (1-based).
    Iteration { number: usize },
    /// Text the model produced alongside tool calls.
    Thinking { content: String },
    /// The model asked for a tool.
    ToolCall {
        id: String,
        name: String,
        arguments: String,
    },
    /// A tool call was resolved.
    ToolResult {
        id: String,
        name: String,
        content: String,
        is_error: bool,
    },
    /// Usage reported by one model call.
    Usage { usage: TokenUsage },
    /// Final answer.
    Response { content: String },
    /// The iteration cap stopped the run.
    MaxIterations { limit: usize },
}
