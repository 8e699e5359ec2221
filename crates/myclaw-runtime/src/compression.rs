//! Sliding-window summary compression.
//!
//! Once the uncompressed backlog exceeds the trigger, fixed-size chunks are
//! folded into plain-text summary blocks. Blocks are append-only and
//! contiguous; `compressed_count` only grows.

use myclaw_core::messages::{Message, Role, SummaryBlock};
use myclaw_core::text::{one_line, truncate_str};

use crate::session::Session;

/// Backlog size (non-system messages past `compressed_count`) that starts
/// compression.
pub const COMPRESSION_TRIGGER: usize = 40;
/// Messages folded per block.
pub const COMPRESSION_CHUNK: usize = 20;

const LINE_MAX_CHARS: usize = 180;
const USER_INTENTS: usize = 3;
const ASSISTANT_ACTIONS: usize = 3;
const TOOL_RESULTS: usize = 5;

/// Compress as many chunks as the trigger demands, appending blocks to the
/// session. Returns the newly created blocks for event emission.
pub fn maybe_compress(session: &mut Session) -> Vec<SummaryBlock> {
    let mut created = Vec::new();

    loop {
        let non_system: Vec<&Message> =
            session.messages.iter().filter(|m| !m.is_system()).collect();
        if non_system.len() - session.compressed_count <= COMPRESSION_TRIGGER {
            break;
        }

        let from = session.compressed_count;
        let to = from + COMPRESSION_CHUNK - 1;
        let chunk: Vec<&Message> = non_system[from..=to].to_vec();

        let block = SummaryBlock {
            ts: chrono::Utc::now().to_rfc3339(),
            from,
            to,
            content: summarize_chunk(&chunk),
        };
        session.summaries.push(block.clone());
        session.compressed_count = to + 1;
        created.push(block);
    }

    created
}

/// Plain-text summary: the last few user intents, assistant actions, and
/// tool results of the chunk, each one-lined and bounded.
fn summarize_chunk(chunk: &[&Message]) -> String {
    let mut lines: Vec<String> = Vec::new();

    let tail = |role: Role, count: usize| -> Vec<&&Message> {
        let matching: Vec<&&Message> = chunk.iter().filter(|m| m.role == role).collect();
        matching[matching.len().saturating_sub(count)..].to_vec()
    };

    for msg in tail(Role::User, USER_INTENTS) {
        lines.push(format!("user: {}", clip(&msg.content)));
    }
    for msg in tail(Role::Assistant, ASSISTANT_ACTIONS) {
        let action = if msg.has_tool_calls() {
            let names: Vec<&str> = msg
                .tool_calls
                .iter()
                .flatten()
                .map(|c| c.name.as_str())
                .collect();
            format!("called {}", names.join(", "))
        } else {
            clip(&msg.content)
        };
        lines.push(format!("assistant: {action}"));
    }
    for msg in tail(Role::Tool, TOOL_RESULTS) {
        lines.push(format!("tool: {}", clip(&msg.content)));
    }

    lines.join("\n")
}

fn clip(content: &str) -> String {
    truncate_str(&one_line(content), LINE_MAX_CHARS)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
