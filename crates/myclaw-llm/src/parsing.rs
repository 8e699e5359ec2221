//! Fallback tool-call parsing from assistant text.
//!
//! Some gateways return tool calls inline in the text instead of the
//! structured field. This module scans for a fenced ```json block or the
//! first balanced JSON object and accepts only the exact shape
//! `{"type":"tool_call","tool":<name>,"input":<object>}`. Malformed
//! candidates are silently ignored — the text is then treated as plain prose.

use serde_json::Value;

use myclaw_core::messages::ToolCallRequest;

/// Extract a single inline tool call from assistant text, if present.
#[must_use]
pub fn parse_inline_tool_call(text: &str) -> Option<ToolCallRequest> {
    let candidate = fenced_json_block(text).or_else(|| first_balanced_object(text))?;
    let value: Value = serde_json::from_str(&candidate).ok()?;

    if value.get("type").and_then(Value::as_str) != Some("tool_call") {
        return None;
    }
    let tool = value.get("tool").and_then(Value::as_str)?;
    let input = value.get("input").and_then(Value::as_object)?;

    Some(ToolCallRequest {
        id: None,
        name: tool.to_owned(),
        input: input.clone(),
    })
}

/// The contents of the first fenced ```json block, if any.
fn fenced_json_block(text: &str) -> Option<String> {
    let start = text.find("```json")?;
    let body = &text[start + "```json".len()..];
    let end = body.find("```")?;
    Some(body[..end].trim().to_owned())
}

/// The first balanced top-level JSON object in the text.
///
/// Tracks string/escape state so braces inside string values do not break
/// the balance count.
fn first_balanced_object(text: &str) -> Option<String> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(text[start..=start + offset].to_owned());
                }
            }
            _ => {}
        }
    }
    None
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
