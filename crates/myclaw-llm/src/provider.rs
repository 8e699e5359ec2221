//! # Provider trait
//!
//! Core abstraction over LLM backends. Every provider (mock, OpenAI,
//! Anthropic) implements [`Provider`] to expose a single non-streaming
//! `chat` call returning text plus structured tool calls.

use async_trait::async_trait;

use myclaw_core::messages::{Message, ToolCallRequest};
use myclaw_core::tools::ToolDefinition;

/// Result type alias for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Prefix of the safe fallback the real providers return instead of
/// erroring into the turn loop. The engine rewrites it into a friendly
/// completion notice.
pub const EMPTY_RESPONSE_SENTINEL: &str = "Model returned an empty response";

/// A model reply: assistant text plus any structured tool calls.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChatReply {
    /// Assistant text (may be empty when only tool calls are present).
    pub text: String,
    /// Structured tool calls.
    pub tool_calls: Vec<ToolCallRequest>,
}

/// Errors that can occur during provider operations.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// HTTP transport failure.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body failed to parse.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The provider returned an API error.
    #[error("api error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error description.
        message: String,
    },

    /// One attempt exceeded the configured timeout.
    #[error("model request timed out after {ms}ms")]
    Timeout {
        /// The timeout that was exceeded.
        ms: u64,
    },

    /// No API key was configured for the selected provider.
    #[error("missing API key: set {env_var}")]
    MissingApiKey {
        /// The environment variable the key is read from.
        env_var: &'static str,
    },
}

impl ProviderError {
    /// Whether a retry may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.status().is_some_and(|s| {
                        s == reqwest::StatusCode::TOO_MANY_REQUESTS || s.is_server_error()
                    })
            }
            Self::Timeout { .. } => true,
            Self::Api { status, .. } => *status == 429 || *status >= 500,
            Self::Json(_) | Self::MissingApiKey { .. } => false,
        }
    }
}

/// Core LLM provider trait.
///
/// Implementors are `Send + Sync` so a session can hold an `Arc<dyn
/// Provider>` across turns. Real providers retry internally and resolve to a
/// fallback reply rather than erroring once the session is running.
#[async_trait]
pub trait Provider: Send + Sync + std::fmt::Debug {
    /// Provider identifier (`"mock"`, `"openai"`, `"anthropic"`).
    fn name(&self) -> &str;

    /// Issue one chat request over the full message history.
    async fn chat(
        &self,
        messages: &[Message],
        tool_defs: &[ToolDefinition],
    ) -> ProviderResult<ChatReply>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
