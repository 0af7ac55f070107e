#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use quickstart_agent::agent::Agent;
use quickstart_agent::config::Config;
use quickstart_agent::llm::{ChatMessage, ChatResponse, LlmClient, LlmError, ToolCall, ToolSchema};
use quickstart_agent::tools::ToolRegistry;

/// Model stand-in that replays a script and records every request.
pub struct ScriptedLlm {
    script: Mutex<VecDeque<Result<ChatResponse, LlmError>>>,
    pub requests: Mutex<Vec<Vec<ChatMessage>>>,
    pub tool_names: Mutex<Vec<String>>,
}

impl ScriptedLlm {
    pub fn new(script: Vec<Result<ChatResponse, LlmError>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
            tool_names: Mutex::new(Vec::new()),
        })
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn chat_completion(
        &self,
        _model: &str,
        messages: &[ChatMessage],
        tools: Option<&[ToolSchema]>,
    ) -> Result<ChatResponse, LlmError> {
        self.requests.lock().unwrap().push(messages.to_vec());
        if let Some(tools) = tools {
            *self.tool_names.lock().unwrap() =
                tools.iter().map(|t| t.function.name.clone()).collect();
        }
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(ChatResponse::text("script finished")))
    }
}

pub fn tool_call(id: &str, name: &str, args: serde_json::Value) -> ToolCall {
    ToolCall::new(id, name, args.to_string())
}

pub fn agent(llm: Arc<ScriptedLlm>, workspace: &Path, max_iterations: usize) -> Agent {
    let config = Config::new("test-key".into(), "test-model".into(), workspace.to_path_buf())
        .with_max_iterations(max_iterations)
        .unwrap();
    Agent::with_parts(config, llm, ToolRegistry::new())
}
