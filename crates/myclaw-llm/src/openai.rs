//! OpenAI-compatible chat-completions provider.
//!
//! Works against the official API and any compatible gateway via
//! `base_url`. Assistant history with tool calls is replayed verbatim, and
//! tool-role messages carry both `tool_call_id` (stricter gateways) and
//! `name` (some compatible adapters).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::warn;

use myclaw_core::messages::{Message, Role, ToolCallRequest};
use myclaw_core::tools::ToolDefinition;

use crate::parsing::parse_inline_tool_call;
use crate::provider::{ChatReply, Provider, ProviderError, ProviderResult};
use crate::retry::resolve_with_retry;

/// Default public endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Configuration for [`OpenAiProvider`].
#[derive(Clone, Debug)]
pub struct OpenAiConfig {
    /// Model ID.
    pub model: String,
    /// Base URL of an OpenAI-compatible endpoint.
    pub base_url: String,
    /// API key. `None` is a fatal misconfiguration.
    pub api_key: Option<String>,
    /// Per-attempt timeout in milliseconds.
    pub timeout_ms: u64,
    /// Retries on timeout or transport error.
    pub retry_count: u32,
}

/// OpenAI-compatible provider.
#[derive(Debug)]
pub struct OpenAiProvider {
    config: OpenAiConfig,
    endpoint: String,
    client: reqwest::Client,
}

impl OpenAiProvider {
    /// Create the provider. Fails fast when no API key is configured.
    pub fn new(config: OpenAiConfig) -> ProviderResult<Self> {
        if config.api_key.as_deref().unwrap_or("").is_empty() {
            return Err(ProviderError::MissingApiKey {
                env_var: "OPENAI_API_KEY",
            });
        }
        let endpoint = format!(
            "{}/chat/completions",
            config.base_url.trim_end_matches('/')
        );
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
            .bearer_auth(self.config.api_key.as_deref().unwrap_or(""))
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

        let parsed: ChatCompletionResponse = response.json().await?;
        Ok(reply_from_response(parsed))
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
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

/// Build the chat-completions request body.
#[must_use]
pub fn build_request_body(
    model: &str,
    messages: &[Message],
    tool_defs: &[ToolDefinition],
) -> Value {
    let wire_messages: Vec<Value> = messages.iter().map(wire_message).collect();
    let mut body = json!({
        "model": model,
        "messages": wire_messages,
    });
    if !tool_defs.is_empty() {
        body["tools"] = Value::Array(
            tool_defs
                .iter()
                .map(|def| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": def.name,
                            "description": def.description,
                            "parameters": def.parameters,
                        }
                    })
                })
                .collect(),
        );
    }
    body
}

fn wire_message(msg: &Message) -> Value {
    match msg.role {
        Role::System => json!({"role": "system", "content": msg.content}),
        Role::User => json!({"role": "user", "content": msg.content}),
        Role::Assistant => {
            let mut wire = json!({"role": "assistant", "content": msg.content});
            if let Some(calls) = &msg.tool_calls {
                // Replay verbatim so tool-role messages are not orphaned.
                wire["tool_calls"] = Value::Array(
                    calls
                        .iter()
                        .map(|call| {
                            json!({
                                "id": call.id.clone().unwrap_or_default(),
                                "type": "function",
                                "function": {
                                    "name": call.name,
                                    "arguments": serde_json::to_string(&call.input)
                                        .unwrap_or_else(|_| "{}".into()),
                                }
                            })
                        })
                        .collect(),
                );
            }
            wire
        }
        Role::Tool => json!({
            "role": "tool",
            "content": msg.content,
            "tool_call_id": msg.tool_call_id.clone().unwrap_or_default(),
            "name": msg.tool_name.clone().unwrap_or_default(),
        }),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Response parsing
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Serialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize, Serialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<WireToolCall>,
}

#[derive(Debug, Deserialize, Serialize)]
struct WireToolCall {
    #[serde(default)]
    id: Option<String>,
    function: WireFunction,
}

#[derive(Debug, Deserialize, Serialize)]
struct WireFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

fn reply_from_response(response: ChatCompletionResponse) -> ChatReply {
    let message = response
        .choices
        .into_iter()
        .next()
        .map(|c| c.message)
        .unwrap_or_default();

    let text = message.content.unwrap_or_default();
    let mut tool_calls: Vec<ToolCallRequest> = message
        .tool_calls
        .into_iter()
        .map(|call| ToolCallRequest {
            id: call.id,
            name: call.function.name,
            input: parse_arguments(&call.function.arguments),
        })
        .collect();

    // Fall back to scanning the text when the gateway returned no
    // structured calls.
    if tool_calls.is_empty() {
        if let Some(inline) = parse_inline_tool_call(&text) {
            tool_calls.push(inline);
        }
    }

    ChatReply { text, tool_calls }
}

/// Parse a tool-call arguments string, failing open to an empty object.
fn parse_arguments(raw: &str) -> serde_json::Map<String, Value> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return serde_json::Map::new();
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Object(map)) => map,
        Ok(_) | Err(_) => {
            warn!(
                preview = myclaw_core::text::truncate_str(trimmed, 100),
                "tool call arguments did not parse as an object"
            );
            serde_json::Map::new()
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use myclaw_core::tools::catalog;

    fn config() -> OpenAiConfig {
        OpenAiConfig {
            model: "gpt-test".into(),
            base_url: "https://x/v1/".into(),
            api_key: Some("sk-test".into()),
            timeout_ms: 1_000,
            retry_count: 1,
        }
    }

    #[test]
    fn missing_api_key_is_fatal() {
        let err = OpenAiProvider::new(OpenAiConfig {
            api_key: None,
            ..config()
        })
        .unwrap_err();
        assert!(matches!(err, ProviderError::MissingApiKey { .. }));
    }

    #[test]
    fn empty_api_key_is_fatal() {
        let err = OpenAiProvider::new(OpenAiConfig {
            api_key: Some(String::new()),
            ..config()
        })
        .unwrap_err();
        assert!(matches!(err, ProviderError::MissingApiKey { .. }));
    }

    #[test]
    fn endpoint_joins_without_double_slash() {
        let provider = OpenAiProvider::new(config()).unwrap();
        assert_eq!(provider.endpoint, "https://x/v1/chat/completions");
    }

    #[test]
    fn request_body_includes_model_and_tools() {
        let body = build_request_body("gpt-test", &[Message::user("hello")], &catalog());
        assert_eq!(body["model"], "gpt-test");
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["tools"][0]["type"], "function");
        assert_eq!(body["tools"][0]["function"]["name"], "read_file");
    }

    #[test]
    fn assistant_tool_calls_replayed_verbatim() {
        let mut input = serde_json::Map::new();
        let _ = input.insert("path".into(), json!("a.txt"));
        let msg = Message::assistant_with_calls(
            "",
            vec![ToolCallRequest {
                id: Some("call-1".into()),
                name: "read_file".into(),
                input,
            }],
        );
        let body = build_request_body("m", &[msg], &[]);
        let call = &body["messages"][0]["tool_calls"][0];
        assert_eq!(call["id"], "call-1");
        assert_eq!(call["function"]["name"], "read_file");
        // Arguments are a JSON-encoded string on the wire
        let args: Value =
            serde_json::from_str(call["function"]["arguments"].as_str().unwrap()).unwrap();
        assert_eq!(args["path"], "a.txt");
    }

    #[test]
    fn tool_message_carries_id_and_name() {
        let msg = Message::tool("output", Some("call-9".into()), "run_shell");
        let body = build_request_body("m", &[msg], &[]);
        let wire = &body["messages"][0];
        assert_eq!(wire["role"], "tool");
        assert_eq!(wire["tool_call_id"], "call-9");
        assert_eq!(wire["name"], "run_shell");
    }

    #[test]
    fn response_with_structured_tool_calls() {
        let raw = json!({
            "choices": [{"message": {
                "content": null,
                "tool_calls": [{
                    "id": "call-1",
                    "function": {"name": "list_files", "arguments": "{\"path\":\".\"}"}
                }]
            }}]
        });
        let parsed: ChatCompletionResponse = serde_json::from_value(raw).unwrap();
        let reply = reply_from_response(parsed);
        assert_eq!(reply.tool_calls.len(), 1);
        assert_eq!(reply.tool_calls[0].name, "list_files");
        assert_eq!(reply.tool_calls[0].input["path"], ".");
    }

    #[test]
    fn response_text_only() {
        let raw = json!({
            "choices": [{"message": {"content": "hello from openai"}}]
        });
        let parsed: ChatCompletionResponse = serde_json::from_value(raw).unwrap();
        let reply = reply_from_response(parsed);
        assert_eq!(reply.text, "hello from openai");
        assert!(reply.tool_calls.is_empty());
    }

    #[test]
    fn response_falls_back_to_inline_parse() {
        let raw = json!({
            "choices": [{"message": {
                "content": "{\"type\":\"tool_call\",\"tool\":\"list_files\",\"input\":{}}"
            }}]
        });
        let parsed: ChatCompletionResponse = serde_json::from_value(raw).unwrap();
        let reply = reply_from_response(parsed);
        assert_eq!(reply.tool_calls.len(), 1);
        assert_eq!(reply.tool_calls[0].name, "list_files");
    }

    #[test]
    fn empty_choices_yields_empty_reply() {
        let parsed: ChatCompletionResponse = serde_json::from_value(json!({})).unwrap();
        let reply = reply_from_response(parsed);
        assert!(reply.text.is_empty());
        assert!(reply.tool_calls.is_empty());
    }

    #[test]
    fn malformed_arguments_fail_open() {
        assert!(parse_arguments("not json").is_empty());
        assert!(parse_arguments("[1,2]").is_empty());
        assert!(parse_arguments("").is_empty());
        assert_eq!(parse_arguments("{\"a\":1}")["a"], 1);
    }

    #[tokio::test]
    async fn unreachable_endpoint_resolves_to_fallback_text() {
        let provider = OpenAiProvider::new(OpenAiConfig {
            base_url: "http://127.0.0.1:9".into(),
            timeout_ms: 200,
            retry_count: 0,
            ..config()
        })
        .unwrap();
        let reply = provider.chat(&[Message::user("hi")], &[]).await.unwrap();
        assert!(reply.text.starts_with("Model request failed"));
        assert!(reply.tool_calls.is_empty());
    }
}
