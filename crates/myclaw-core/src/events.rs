//! The agent event union.
//!
//! Every boundary of the turn loop publishes an [`AgentEvent`] on the bus.
//! The union is discriminated by `type`; consumers match exhaustively so a
//! new variant is a compile error in every subscriber.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::messages::{Message, SummaryBlock};

// ─────────────────────────────────────────────────────────────────────────────
// Oscillation metrics
// ─────────────────────────────────────────────────────────────────────────────

/// Per-step oscillation observation. Advisory only — the engine never
/// intervenes on it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OscillationMetrics {
    /// Share of recent call signatures that are repeats.
    pub repeat_ratio: f64,
    /// Share of recent non-empty output fingerprints that are distinct.
    pub novelty_ratio: f64,
    /// Steps since the last successful mutation.
    pub no_mutation_steps: u32,
    /// Whether the repeat/novelty/no-mutation thresholds all tripped.
    pub possible_oscillation: bool,
}

// ─────────────────────────────────────────────────────────────────────────────
// AgentEvent
// ─────────────────────────────────────────────────────────────────────────────

/// Events published on the in-process bus, tagged by `type`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// A session was created.
    Start {
        /// Session ID.
        session_id: String,
        /// Absolute workspace root.
        workspace: String,
        /// Session log path.
        log_path: String,
    },
    /// A persisted session was restored into the store.
    SessionResume {
        /// Session ID.
        session_id: String,
        /// Absolute workspace root.
        workspace: String,
        /// Session log path.
        log_path: String,
        /// Messages reconstructed from the log.
        message_count: usize,
    },
    /// A session was closed.
    SessionEnd {
        /// Session ID.
        session_id: String,
    },
    /// A message was appended to the session.
    Message {
        /// Session ID.
        session_id: String,
        /// The appended message.
        message: Message,
    },
    /// A summary block was produced by compression.
    Summary {
        /// Session ID.
        session_id: String,
        /// The appended block.
        block: SummaryBlock,
    },
    /// Leading tool messages were dropped from the model window.
    ContextTrim {
        /// Session ID.
        session_id: String,
        /// Number of tool messages dropped.
        dropped: usize,
    },
    /// A model request is about to be issued.
    ModelRequestStart {
        /// Session ID.
        session_id: String,
        /// 1-based step within the turn.
        step: u32,
        /// Messages in the request window.
        message_count: usize,
    },
    /// The model replied.
    ModelResponse {
        /// Session ID.
        session_id: String,
        /// 1-based step within the turn.
        step: u32,
        /// Assistant text.
        text: String,
        /// Parsed tool calls in the reply.
        tool_call_count: usize,
    },
    /// A tool is about to execute.
    ToolCall {
        /// Session ID.
        session_id: String,
        /// 1-based step within the turn.
        step: u32,
        /// Tool name.
        tool: String,
        /// Tool input.
        input: Map<String, Value>,
    },
    /// A tool finished executing.
    ToolResult {
        /// Session ID.
        session_id: String,
        /// 1-based step within the turn.
        step: u32,
        /// Tool name.
        tool: String,
        /// Whether the execution succeeded.
        ok: bool,
        /// Tool output (or rejection text).
        output: String,
    },
    /// Per-step oscillation observation.
    OscillationObserve {
        /// Session ID.
        session_id: String,
        /// 1-based step within the turn.
        step: u32,
        /// Computed metrics.
        metrics: OscillationMetrics,
    },
    /// The turn finished with an assistant reply.
    Final {
        /// Session ID.
        session_id: String,
        /// Final assistant text.
        text: String,
    },
    /// The turn hit the step budget.
    MaxSteps {
        /// Session ID.
        session_id: String,
        /// The exhausted budget.
        steps: u32,
    },
}

impl AgentEvent {
    /// The session this event belongs to.
    #[must_use]
    pub fn session_id(&self) -> &str {
        match self {
            Self::Start { session_id, .. }
            | Self::SessionResume { session_id, .. }
            | Self::SessionEnd { session_id }
            | Self::Message { session_id, .. }
            | Self::Summary { session_id, .. }
            | Self::ContextTrim { session_id, .. }
            | Self::ModelRequestStart { session_id, .. }
            | Self::ModelResponse { session_id, .. }
            | Self::ToolCall { session_id, .. }
            | Self::ToolResult { session_id, .. }
            | Self::OscillationObserve { session_id, .. }
            | Self::Final { session_id, .. }
            | Self::MaxSteps { session_id, .. } => session_id,
        }
    }

    /// The wire discriminator for this event.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Start { .. } => "start",
            Self::SessionResume { .. } => "session_resume",
            Self::SessionEnd { .. } => "session_end",
            Self::Message { .. } => "message",
            Self::Summary { .. } => "summary",
            Self::ContextTrim { .. } => "context_trim",
            Self::ModelRequestStart { .. } => "model_request_start",
            Self::ModelResponse { .. } => "model_response",
            Self::ToolCall { .. } => "tool_call",
            Self::ToolResult { .. } => "tool_result",
            Self::OscillationObserve { .. } => "oscillation_observe",
            Self::Final { .. } => "final",
            Self::MaxSteps { .. } => "max_steps",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
