//! Core agent loop implementation.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;

use crate::api::types::{LogEntryType, TaskLogEntry, TaskStatus};
use crate::config::Config;
use crate::conversation::{Conversation, ConversationError};
use crate::llm::{client_from_config, LlmClient, LlmError, TokenUsage};
use crate::tools::ToolRegistry;

use super::events::AgentEvent;
use super::prompt::build_system_prompt;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("model request failed: {0}")]
    Llm(#[from] LlmError),

    #[error("model returned an empty response")]
    EmptyResponse,

    #[error(transparent)]
    Conversation(#[from] ConversationError),
}

/// Per-run settings.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Model override; the configured default otherwise.
    pub model: Option<String>,
    /// Receives progress events. Send failures are ignored.
    pub events: Option<mpsc::UnboundedSender<AgentEvent>>,
}

/// How a run ended.
#[derive(Debug, Clone)]
pub struct TaskOutcome {
    pub status: TaskStatus,
    /// Final answer, or the best text available when the cap was hit.
    pub response: String,
    /// Model calls made.
    pub iterations: usize,
    pub log: Vec<TaskLogEntry>,
    pub usage: TokenUsage,
}

/// The tool-calling agent.
pub struct Agent {
    config: Config,
    llm: Arc<dyn LlmClient>,
    tools: ToolRegistry,
}

impl Agent {
    /// Create an agent with the configured provider and the native tools.
    pub fn new(config: Config) -> Result<Self, AgentError> {
        let llm = client_from_config(&config)?;
        Ok(Self::with_parts(config, llm, ToolRegistry::new()))
    }

    pub fn with_parts(config: Config, llm: Arc<dyn LlmClient>, tools: ToolRegistry) -> Self {
        Self { config, llm, tools }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Empty conversation seeded with the system prompt.
    pub fn new_conversation(&self) -> Conversation {
        let workspace = self.config.workspace_path.to_string_lossy();
        Conversation::new(Some(build_system_prompt(
            &workspace,
            &self.tools,
            self.config.system_prompt.as_deref(),
        )))
    }

    /// Run a task in a fresh conversation.
    pub async fn run_task(&self, task: &str) -> Result<TaskOutcome, AgentError> {
        self.run_task_with(task, RunOptions::default()).await
    }

    pub async fn run_task_with(
        &self,
        task: &str,
        options: RunOptions,
    ) -> Result<TaskOutcome, AgentError> {
        let mut conversation = self.new_conversation();
        self.continue_conversation_with(&mut conversation, task, options)
            .await
    }

    /// Add a user message to an existing conversation and run until the
    /// model answers or the iteration cap is reached.
    pub async fn continue_conversation(
        &self,
        conversation: &mut Conversation,
        user_message: &str,
    ) -> Result<TaskOutcome, AgentError> {
        self.continue_conversation_with(conversation, user_message, RunOptions::default())
            .await
    }

    pub async fn continue_conversation_with(
        &self,
        conversation: &mut Conversation,
        user_message: &str,
        options: RunOptions,
    ) -> Result<TaskOutcome, AgentError> {
        let model = options
            .model
            .as_deref()
            .unwrap_or(&self.config.default_model);
        let emit = |event: AgentEvent| {
            if let Some(tx) = &options.events {
                let _ = tx.send(event);
            }
        };

        let mut log = Vec::new();
        let mut usage = TokenUsage::default();
        let mut last_text: Option<String> = None;
        let workspace = &self.config.workspace_path;
        let max_iterations = self.config.max_iterations;

        conversation.push_user(user_message)?;

        let tool_schemas = self.tools.get_tool_schemas();

        for iteration in 0..max_iterations {
            tracing::debug!(model, "Agent iteration {}", iteration + 1);
            emit(AgentEvent::Iteration {
                number: iteration + 1,
            });

            let response = self
                .llm
                .chat_completion(model, conversation.messages(), Some(tool_schemas.as_slice()))
                .await?;

            if let Some(call_usage) = &response.usage {
                usage = usage.add(call_usage);
                emit(AgentEvent::Usage { usage: *call_usage });
            }

            let text = response.content.filter(|c| !c.trim().is_empty());
            let tool_calls = response.tool_calls.unwrap_or_default();

            if !tool_calls.is_empty() {
                if let Some(thinking) = &text {
                    log.push(log_entry(LogEntryType::Thinking, truncate_for_log(thinking, 2000)));
                    emit(AgentEvent::Thinking {
                        content: thinking.clone(),
                    });
                    last_text = Some(thinking.clone());
                }

                conversation.push_assistant(text, tool_calls.clone())?;

                for tool_call in &tool_calls {
                    log.push(log_entry(
                        LogEntryType::ToolCall,
                        format!(
                            "Calling tool: {} with args: {}",
                            tool_call.function.name,
                            truncate_for_log(&tool_call.function.arguments, 1000)
                        ),
                    ));
                    emit(AgentEvent::ToolCall {
                        id: tool_call.id.clone(),
                        name: tool_call.function.name.clone(),
                        arguments: tool_call.function.arguments.clone(),
                    });

                    let result = self.tools.dispatch(tool_call, workspace).await;
                    let content = result.to_content();
                    let is_error = result.is_error();

                    log.push(log_entry(
                        if is_error {
                            LogEntryType::Error
                        } else {
                            LogEntryType::ToolResult
                        },
                        truncate_for_log(&content, 1000),
                    ));
                    emit(AgentEvent::ToolResult {
                        id: tool_call.id.clone(),
                        name: result.name.clone(),
                        content: content.clone(),
                        is_error,
                    });

                    conversation.push_tool_result(&tool_call.id, content, is_error)?;
                }

                continue;
            }

            // No tool calls: this is the final response.
            let Some(content) = text else {
                return Err(AgentError::EmptyResponse);
            };
            conversation.push_assistant(Some(content.clone()), Vec::new())?;
            log.push(log_entry(LogEntryType::Response, truncate_for_log(&content, 2000)));
            emit(AgentEvent::Response {
                content: content.clone(),
            });

            return Ok(TaskOutcome {
                status: TaskStatus::Completed,
                response: content,
                iterations: iteration + 1,
                log,
                usage,
            });
        }

        tracing::warn!("Max iterations ({}) reached", max_iterations);
        let notice = format!("Max iterations ({}) reached", max_iterations);
        log.push(log_entry(LogEntryType::Error, notice.clone()));
        emit(AgentEvent::MaxIterations {
            limit: max_iterations,
        });

        Ok(TaskOutcome {
            status: TaskStatus::MaxIterations,
            response: last_text.unwrap_or(notice),
            iterations: max_iterations,
            log,
            usage,
        })
    }
}

fn log_entry(entry_type: LogEntryType, content: String) -> TaskLogEntry {
    TaskLogEntry {
        timestamp: chrono::Utc::now().to_rfc3339(),
        entry_type,
        content,
    }
}

/// Truncate a string for logging purposes.
fn truncate_for_log(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let mut cut = max_len;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}... [truncated]", &s[..cut])
}
