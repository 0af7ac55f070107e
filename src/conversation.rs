//! Append-only conversation history.
//!
//! Every tool call requested by an assistant turn must be answered by exactly
//! one tool-result turn before the conversation accepts another user or
//! assistant turn.

use serde::Serialize;
use thiserror::Error;

use crate::llm::{ChatMessage, Role, ToolCall};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConversationError {
    #[error("{0} tool call(s) still awaiting results")]
    PendingToolCalls(usize),

    #[error("no outstanding tool call with id '{0}'")]
    UnknownToolCall(String),

    #[error("tool call '{0}' already has a result")]
    AlreadyResolved(String),
}

/// Ordered turns owned by a single session.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Conversation {
    turns: Vec<ChatMessage>,
    /// Ids of the latest assistant turn's calls not yet answered, in request order.
    #[serde(skip)]
    pending: Vec<String>,
    /// Ids of the latest assistant turn's calls already answered.
    #[serde(skip)]
    resolved: Vec<String>,
}

impl Conversation {
    /// Start a conversation with an optional system prompt.
    pub fn new(system_prompt: Option<String>) -> Self {
        let mut conversation = Self::default();
        if let Some(prompt) = system_prompt {
            conversation.turns.push(ChatMessage::system(prompt));
        }
        conversation
    }

    pub fn push_user(&mut self, content: impl Into<String>) -> Result<(), ConversationError> {
        self.ensure_resolved()?;
        self.turns.push(ChatMessage::user(content));
        Ok(())
    }

    /// Append an assistant turn. Non-empty `tool_calls` open a new batch of
    /// calls that must all be answered via `push_tool_result`.
    pub fn push_assistant(
        &mut self,
        content: Option<String>,
        tool_calls: Vec<ToolCall>,
    ) -> Result<(), ConversationError> {
        self.ensure_resolved()?;
        self.resolved.clear();
        if tool_calls.is_empty() {
            self.turns.push(ChatMessage {
                role: Role::Assistant,
                content,
                tool_calls: None,
                tool_call_id: None,
                is_error: false,
            });
        } else {
            self.pending = tool_calls.iter().map(|c| c.id.clone()).collect();
            self.turns
                .push(ChatMessage::assistant_with_tools(content, tool_calls));
        }
        Ok(())
    }

    /// Append the result for an outstanding tool call.
    pub fn push_tool_result(
        &mut self,
        call_id: &str,
        content: impl Into<String>,
        is_error: bool,
    ) -> Result<(), ConversationError> {
        let Some(pos) = self.pending.iter().position(|id| id == call_id) else {
            if self.resolved.iter().any(|id| id == call_id) {
                return Err(ConversationError::AlreadyResolved(call_id.to_string()));
            }
            return Err(ConversationError::UnknownToolCall(call_id.to_string()));
        };
        let id = self.pending.remove(pos);
        self.resolved.push(id);
        self.turns
            .push(ChatMessage::tool_result(call_id, content, is_error));
        Ok(())
    }

    /// All turns in append order.
    pub fn messages(&self) -> &[ChatMessage] {
        &self.turns
    }

    pub fn turns(&self) -> impl Iterator<Item = &ChatMessage> {
        self.turns.iter()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Ids of tool calls still waiting for a result.
    pub fn unresolved_tool_calls(&self) -> &[String] {
        &self.pending
    }

    pub fn is_resolved(&self) -> bool {
        self.pending.is_empty()
    }

    /// Number of tool calls requested across all assistant turns.
    pub fn tool_call_count(&self) -> usize {
        self.turns.iter().map(|t| t.requested_calls().len()).sum()
    }

    /// Number of tool-result turns.
    pub fn tool_result_count(&self) -> usize {
        self.turns.iter().filter(|t| t.role == Role::Tool).count()
    }

    /// Text of the most recent assistant turn that carried any.
    pub fn last_assistant_text(&self) -> Option<&str> {
        self.turns
            .iter()
            .rev()
            .filter(|t| t.role == Role::Assistant)
            .find_map(|t| t.content.as_deref().filter(|c| !c.is_empty()))
    }

    fn ensure_resolved(&self) -> Result<(), ConversationError> {
        if self.pending.is_empty() {
            Ok(())
        } else {
            Err(ConversationError::PendingToolCalls(self.pending.len()))
        }
    }
}
