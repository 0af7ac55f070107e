//! API request and response types.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::llm::{ChatMessage, TokenUsage};

/// Request to run a one-shot task.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateTaskRequest {
    /// The task description / user prompt
    pub task: String,

    /// Optional model override (uses default if not specified)
    #[serde(default)]
    pub model: Option<String>,
}

/// How a run ended.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// The model produced a final answer
    Completed,
    /// The iteration cap stopped the loop
    MaxIterations,
}

/// Result of a one-shot task.
#[derive(Debug, Clone, Serialize)]
pub struct TaskResponse {
    pub status: TaskStatus,

    /// Final answer, or the last text seen when the cap was hit
    pub response: String,

    /// Number of model calls made
    pub iterations: usize,

    pub usage: TokenUsage,

    /// Detailed execution log
    pub log: Vec<TaskLogEntry>,
}

/// A single entry in the task execution log.
#[derive(Debug, Clone, Serialize)]
pub struct TaskLogEntry {
    /// Timestamp (RFC 3339)
    pub timestamp: String,

    pub entry_type: LogEntryType,

    pub content: String,
}

/// Types of log entries.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogEntryType {
    /// Text the model produced alongside tool calls
    Thinking,
    /// Tool is being called
    ToolCall,
    /// Tool returned a result
    ToolResult,
    /// Agent produced final response
    Response,
    /// A tool failed or the loop was cut short
    Error,
}

/// One chat turn from a front-end.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    /// Continue this session; a new one is created when absent.
    #[serde(default)]
    pub session_id: Option<Uuid>,

    pub message: String,

    #[serde(default)]
    pub model: Option<String>,
}

/// Reply to a chat turn.
#[derive(Debug, Clone, Serialize)]
pub struct ChatReply {
    pub session_id: Uuid,
    pub response: String,
    pub status: TaskStatus,
    pub iterations: usize,
    /// Turns in the session after this exchange
    pub turns: usize,
}

/// Full transcript of a session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub id: Uuid,
    pub created_at: String,
    pub turns: Vec<ChatMessage>,
}

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Service version
    pub version: String,

    /// Live chat sessions
    pub sessions: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
