//! Message types for the myclaw conversation model.
//!
//! Messages form the conversation history passed to LLM providers and
//! persisted to the session log. Four roles: system, user, assistant, and
//! tool. A message is immutable once appended to a session.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ─────────────────────────────────────────────────────────────────────────────
// Roles
// ─────────────────────────────────────────────────────────────────────────────

/// Role of a conversation message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System prompt.
    System,
    /// User input.
    User,
    /// Model output.
    Assistant,
    /// Tool execution result.
    Tool,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tool call descriptors
// ─────────────────────────────────────────────────────────────────────────────

/// A tool call issued by the provider on an assistant message.
///
/// `id` is provider-assigned and may be absent when the call was recovered by
/// the fallback text parser.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallRequest {
    /// Provider-issued call ID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Tool name.
    pub name: String,
    /// Tool arguments (JSON object).
    pub input: Map<String, Value>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Message
// ─────────────────────────────────────────────────────────────────────────────

/// A conversation message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Message role.
    pub role: Role,
    /// Text content.
    pub content: String,
    /// ID of the tool call this message answers (tool role only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Name of the tool that produced this message (tool role only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    /// Provider tool-call descriptors (assistant role only). Replayed
    /// verbatim on later requests so tool messages are never orphaned.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallRequest>>,
}

impl Message {
    /// Create a system message.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self::bare(Role::System, content)
    }

    /// Create a user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::bare(Role::User, content)
    }

    /// Create an assistant message without tool calls.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::bare(Role::Assistant, content)
    }

    /// Create an assistant message carrying tool-call descriptors.
    #[must_use]
    pub fn assistant_with_calls(
        content: impl Into<String>,
        calls: Vec<ToolCallRequest>,
    ) -> Self {
        Self {
            tool_calls: if calls.is_empty() { None } else { Some(calls) },
            ..Self::bare(Role::Assistant, content)
        }
    }

    /// Create a tool-result message.
    #[must_use]
    pub fn tool(
        content: impl Into<String>,
        tool_call_id: Option<String>,
        tool_name: impl Into<String>,
    ) -> Self {
        Self {
            tool_call_id,
            tool_name: Some(tool_name.into()),
            ..Self::bare(Role::Tool, content)
        }
    }

    fn bare(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_call_id: None,
            tool_name: None,
            tool_calls: None,
        }
    }

    /// Returns `true` for system messages.
    #[must_use]
    pub fn is_system(&self) -> bool {
        self.role == Role::System
    }

    /// Returns `true` for tool messages.
    #[must_use]
    pub fn is_tool(&self) -> bool {
        self.role == Role::Tool
    }

    /// Returns `true` for assistant messages that carry tool calls.
    #[must_use]
    pub fn has_tool_calls(&self) -> bool {
        self.tool_calls.as_ref().is_some_and(|c| !c.is_empty())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Summary blocks
// ─────────────────────────────────────────────────────────────────────────────

/// A compressed chunk of conversation history.
///
/// `from`/`to` are inclusive indices into the non-system message list.
/// Blocks are append-only and contiguous: `block[k].to + 1 == block[k+1].from`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryBlock {
    /// RFC 3339 creation timestamp.
    pub ts: String,
    /// First covered index (inclusive).
    pub from: usize,
    /// Last covered index (inclusive).
    pub to: usize,
    /// Bounded plain-text summary.
    pub content: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
