//! Anthropic Messages API client.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{
    error_from_status, http_client, ChatMessage, ChatResponse, LlmClient, LlmError, Role,
    TokenUsage, ToolCall, ToolSchema,
};

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Client for `POST {base_url}/messages`.
pub struct AnthropicClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    max_tokens: u32,
}

impl AnthropicClient {
    pub fn new(api_key: String, base_url: String, max_tokens: u32) -> Result<Self, LlmError> {
        Ok(Self {
            client: http_client()?,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            max_tokens,
        })
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn chat_completion(
        &self,
        model: &str,
        messages: &[ChatMessage],
        tools: Option<&[ToolSchema]>,
    ) -> Result<ChatResponse, LlmError> {
        let request = build_request(model, self.max_tokens, messages, tools.unwrap_or(&[]));

        tracing::debug!(
            model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "Sending Anthropic request"
        );

        let response = self
            .client
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let headers = response.headers().clone();
            let body = response.text().await.unwrap_or_default();
            return Err(error_from_status(status, &headers, body));
        }

        let body: MessagesResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;

        Ok(body.into_chat_response())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Wire types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool>,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: &'static str,
    content: Vec<RequestBlock>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum RequestBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(skip_serializing_if = "std::ops::Not::not")]
        is_error: bool,
    },
}

#[derive(Debug, Serialize)]
struct WireTool {
    name: String,
    description: String,
    input_schema: Value,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ResponseBlock>,
    stop_reason: Option<String>,
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ResponseBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        #[serde(default)]
        input: Value,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

impl MessagesResponse {
    fn into_chat_response(self) -> ChatResponse {
        let mut text = String::new();
        let mut tool_calls = Vec::new();

        for block in self.content {
            match block {
                ResponseBlock::Text { text: t } => text.push_str(&t),
                ResponseBlock::ToolUse { id, name, input } => {
                    let input = if input.is_null() { serde_json::json!({}) } else { input };
                    tool_calls.push(ToolCall::new(id, name, input.to_string()));
                }
                ResponseBlock::Other => {}
            }
        }

        ChatResponse {
            content: if text.is_empty() { None } else { Some(text) },
            tool_calls: if tool_calls.is_empty() { None } else { Some(tool_calls) },
            finish_reason: self.stop_reason,
            usage: self
                .usage
                .map(|u| TokenUsage::new(u.input_tokens, u.output_tokens)),
        }
    }
}

/// Convert the conversation into a Messages API request.
///
/// System turns are lifted into `system`. Consecutive turns that map to the
/// same wire role are merged, so a batch of tool results becomes a single
/// `user` message of `tool_result` blocks.
fn build_request(
    model: &str,
    max_tokens: u32,
    messages: &[ChatMessage],
    tools: &[ToolSchema],
) -> MessagesRequest {
    let mut system_parts = Vec::new();
    let mut wire: Vec<WireMessage> = Vec::new();

    for msg in messages {
        let (role, blocks) = match msg.role {
            Role::System => {
                if let Some(text) = &msg.content {
                    system_parts.push(text.clone());
                }
                continue;
            }
            Role::User => ("user", text_blocks(msg)),
            Role::Assistant => {
                let mut blocks = text_blocks(msg);
                for call in msg.requested_calls() {
                    let input = serde_json::from_str::<Value>(&call.function.arguments)
                        .ok()
                        .filter(Value::is_object)
                        .unwrap_or_else(|| serde_json::json!({}));
                    blocks.push(RequestBlock::ToolUse {
                        id: call.id.clone(),
                        name: call.function.name.clone(),
                        input,
                    });
                }
                ("assistant", blocks)
            }
            Role::Tool => (
                "user",
                vec![RequestBlock::ToolResult {
                    tool_use_id: msg.tool_call_id.clone().unwrap_or_default(),
                    content: msg.content.clone().unwrap_or_default(),
                    is_error: msg.is_error,
                }],
            ),
        };

        if blocks.is_empty() {
            continue;
        }

        match wire.last_mut() {
            Some(last) if last.role == role => last.content.extend(blocks),
            _ => wire.push(WireMessage { role, content: blocks }),
        }
    }

    MessagesRequest {
        model: model.to_string(),
        max_tokens,
        system: if system_parts.is_empty() {
            None
        } else {
            Some(system_parts.join("\n\n"))
        },
        messages: wire,
        tools: tools
            .iter()
            .map(|t| WireTool {
                name: t.function.name.clone(),
                description: t.function.description.clone(),
                input_schema: t.function.parameters.clone(),
            })
            .collect(),
    }
}

fn text_blocks(msg: &ChatMessage) -> Vec<RequestBlock> {
    match &msg.content {
        Some(text) if !text.is_empty() => vec![RequestBlock::Text { text: text.clone() }],
        _ => Vec::new(),
    }
}
