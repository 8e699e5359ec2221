//! Model-request context assembly.
//!
//! System prompt, then the tail of the summary blocks as a second system
//! message, then the sliding window of non-system messages. A window that
//! would open on tool messages (their prompting assistant was compressed or
//! cut off) is trimmed so no orphaned tool responses reach the model.

use myclaw_core::messages::Message;

use crate::session::Session;

/// Summary blocks admitted into one request.
pub const MAX_SUMMARY_BLOCKS_IN_CONTEXT: usize = 3;

/// An assembled model request window.
#[derive(Clone, Debug)]
pub struct BuiltContext {
    /// Messages in model-visible order.
    pub messages: Vec<Message>,
    /// Leading tool messages dropped from the window.
    pub trimmed: usize,
}

/// Assemble the request window for a session.
#[must_use]
pub fn build_context(session: &Session) -> BuiltContext {
    let mut messages: Vec<Message> = Vec::new();

    if let Some(system) = session.messages.iter().find(|m| m.is_system()) {
        messages.push(system.clone());
    }

    if !session.summaries.is_empty() {
        let tail_start = session
            .summaries
            .len()
            .saturating_sub(MAX_SUMMARY_BLOCKS_IN_CONTEXT);
        let mut rendered = String::from("Compressed memory blocks:\n");
        for block in &session.summaries[tail_start..] {
            rendered.push_str(&format!(
                "[{}-{}] {}\n\n",
                block.from, block.to, block.content
            ));
        }
        messages.push(Message::system(rendered.trim_end().to_owned()));
    }

    let non_system: Vec<&Message> =
        session.messages.iter().filter(|m| !m.is_system()).collect();
    let window_start = session
        .compressed_count
        .max(non_system.len().saturating_sub(session.limits.context_window_size));

    let window = &non_system[window_start.min(non_system.len())..];
    let trimmed = window.iter().take_while(|m| m.is_tool()).count();
    messages.extend(window[trimmed..].iter().map(|m| (*m).clone()));

    BuiltContext { messages, trimmed }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
