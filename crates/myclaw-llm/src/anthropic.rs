//! Anthropic messages-API provider.
//!
//! The system prompt is split out of the message list, assistant tool calls
//! become `tool_use` blocks, and tool-role messages are folded into user
//! messages as `tool_result` blocks, per the messages API shape.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use myclaw_core::messages::{Message, Role, ToolCallRequest};
use myclaw_core::tools::ToolDefinition;

use crate::parsing::parse_inline_tool_call;
use crate::provider::{ChatReply, Provider, ProviderError, ProviderResult};
use crate::retry::resolve_with_retry;

/// Default public endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

const API_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 4096;

/// Configuration for [`AnthropicProvider`].
#[derive(Clone, Debug)]
pub struct AnthropicConfig {
    /// Model ID.
    pub model: String,
    /// Base URL.
    pub base_url: String,
    /// API key. `None` is a fatal misconfiguration.
    pub api_key: Option<String>,
    /// Per-attempt timeout in milliseconds.
    pub timeout_ms: u64,
    /// Retries on timeout or transport error.
    pub retry_count: u32,
}

/// Anthropic provider.
#[derive(Debug)]
pub struct AnthropicProvider {
    config: AnthropicConfig,
    endpoint: String,
    client: reqwest::Client,
}

impl AnthropicProvider {
    /// Create the provider. Fails fast when no API key is configured.
    pub fn new(config: AnthropicConfig) -> ProviderResult<Self> {
        if config.api_key.as_deref().unwrap_or("").is_empty() {
            return Err(ProviderError::MissingApiKey {
                env_var: "ANTHROPIC_API_KEY",
            });
        }
        let endpoint = format!("{}/v1/messages", config.base_url.trim_end_matches('/'));
        Ok(Self {
            config,
            endpoint,
            client: reqwest::Client::new(),
        })
    }

    async fn attempt(
        &self,
        messages: &[Message],
        tool_defs: &[ToolDefinition],
    ) -> ProviderResult<ChatReply> {
        let body = build_request_body(&self.config.model, messages, tool_defs);
        let response = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", self.config.api_key.as_deref().unwrap_or(""))
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message: myclaw_core::text::truncate_str(&message, 400),
            });
        }

        let parsed: MessagesResponse = response.json().await?;
        Ok(reply_from_response(parsed))
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn chat(
        &self,
        messages: &[Message],
        tool_defs: &[ToolDefinition],
    ) -> ProviderResult<ChatReply> {
        Ok(resolve_with_retry(
            self.config.timeout_ms,
            self.config.retry_count,
            || self.attempt(messages, tool_defs),
        )
        .await)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Request building
// ─────────────────────────────────────────────────────────────────────────────

/// Build the messages-API request body.
#[must_use]
pub fn build_request_body(
    model: &str,
    messages: &[Message],
    tool_defs: &[ToolDefinition],
) -> Value {
    let system: Vec<&str> = messages
        .iter()
        .filter(|m| m.role == Role::System)
        .map(|m| m.content.as_str())
        .collect();

    let mut wire_messages: Vec<Value> = Vec::new();
    for msg in messages {
        match msg.role {
            Role::System => {}
            Role::User => {
                wire_messages.push(json!({"role": "user", "content": msg.content}));
            }
            Role::Assistant => {
                let mut blocks: Vec<Value> = Vec::new();
                if !msg.content.is_empty() {
                    blocks.push(json!({"type": "text", "text": msg.content}));
                }
                for call in msg.tool_calls.iter().flatten() {
                    blocks.push(json!({
                        "type": "tool_use",
                        "id": call.id.clone().unwrap_or_default(),
                        "name": call.name,
                        "input": call.input,
                    }));
                }
                wire_messages.push(json!({"role": "assistant", "content": blocks}));
            }
            Role::Tool => {
                // Tool results ride on user messages in this API.
                wire_messages.push(json!({
                    "role": "user",
                    "content": [{
                        "type": "tool_result",
                        "tool_use_id": msg.tool_call_id.clone().unwrap_or_default(),
                        "content": msg.content,
                    }],
                }));
            }
        }
    }

    let mut body = json!({
        "model": model,
        "max_tokens": MAX_TOKENS,
        "messages": wire_messages,
    });
    if !system.is_empty() {
        body["system"] = json!(system.join("\n\n"));
    }
    if !tool_defs.is_empty() {
        body["tools"] = Value::Array(
            tool_defs
                .iter()
                .map(|def| {
                    json!({
                        "name": def.name,
                        "description": def.description,
                        "input_schema": def.parameters,
                    })
                })
                .collect(),
        );
    }
    body
}

// ─────────────────────────────────────────────────────────────────────────────
// Response parsing
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text {
        text: String,
    },
    #[serde(rename = "tool_use")]
    ToolUse {
        #[serde(default)]
        id: Option<String>,
        name: String,
        #[serde(default)]
        input: Map<String, Value>,
    },
    #[serde(other)]
    Other,
}

fn reply_from_response(response: MessagesResponse) -> ChatReply {
    let mut text_parts: Vec<String> = Vec::new();
    let mut tool_calls: Vec<ToolCallRequest> = Vec::new();

    for block in response.content {
        match block {
            ContentBlock::Text { text } => text_parts.push(text),
            ContentBlock::ToolUse { id, name, input } => {
                tool_calls.push(ToolCallRequest { id, name, input });
            }
            ContentBlock::Other => {}
        }
    }

    let text = text_parts.join("\n");
    if tool_calls.is_empty() {
        if let Some(inline) = parse_inline_tool_call(&text) {
            tool_calls.push(inline);
        }
    }
    ChatReply { text, tool_calls }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
