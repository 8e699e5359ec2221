//! Mock and scripted providers.
//!
//! [`MockProvider`] is the zero-config default: it echoes the latest user
//! message and never calls tools. [`ScriptedProvider`] replays a queue of
//! canned replies and is the workhorse of the turn-engine test suite.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use myclaw_core::messages::{Message, Role};
use myclaw_core::tools::ToolDefinition;

use crate::provider::{ChatReply, Provider, ProviderResult};

// ─────────────────────────────────────────────────────────────────────────────
// MockProvider
// ─────────────────────────────────────────────────────────────────────────────

/// Deterministic echo provider: no network, no tool calls.
#[derive(Clone, Debug, Default)]
pub struct MockProvider;

#[async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn chat(
        &self,
        messages: &[Message],
        _tool_defs: &[ToolDefinition],
    ) -> ProviderResult<ChatReply> {
        let last_user = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or("");
        Ok(ChatReply {
            text: format!("echo: {last_user}"),
            tool_calls: Vec::new(),
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ScriptedProvider
// ─────────────────────────────────────────────────────────────────────────────

/// Replays a fixed sequence of replies; returns a terminal notice once the
/// script is exhausted.
#[derive(Debug)]
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<ChatReply>>,
}

impl ScriptedProvider {
    /// Create a provider that replays `replies` in order.
    #[must_use]
    pub fn new(replies: Vec<ChatReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
        }
    }

    /// Remaining scripted replies.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.replies.lock().expect("script lock").len()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn chat(
        &self,
        _messages: &[Message],
        _tool_defs: &[ToolDefinition],
    ) -> ProviderResult<ChatReply> {
        Ok(self
            .replies
            .lock()
            .expect("script lock")
            .pop_front()
            .unwrap_or_else(|| ChatReply {
                text: "script exhausted".into(),
                tool_calls: Vec::new(),
            }))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
