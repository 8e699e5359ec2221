//! Text utilities shared across the agent: truncation, one-lining, and the
//! control-character re-escape applied to `write_file` content.

/// Truncate to at most `max_chars` characters, on a char boundary.
#[must_use]
pub fn truncate_str(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

/// Truncate to `max_chars`, appending `suffix` when anything was cut.
#[must_use]
pub fn truncate_with_suffix(s: &str, max_chars: usize, suffix: &str) -> String {
    if s.chars().count() <= max_chars {
        return s.to_owned();
    }
    let mut out = truncate_str(s, max_chars);
    out.push_str(suffix);
    out
}

/// Collapse all whitespace runs to single spaces and trim.
#[must_use]
pub fn one_line(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalized output fingerprint: whitespace-collapsed and bounded.
#[must_use]
pub fn fingerprint(s: &str, max_chars: usize) -> String {
    truncate_str(&one_line(s), max_chars)
}

/// Re-escape control characters that tool-call JSON decoding may have turned
/// into raw bytes.
///
/// Inside string-literal contexts (single or double quoted, backslash
/// escapes respected) raw `\n` and `\r` become the two-character escapes.
/// Outside literals, only a bare carriage return (one not followed by a
/// line feed) is re-escaped; real line structure is left alone.
#[must_use]
pub fn reescape_control_chars(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    let mut chars = content.chars().peekable();
    let mut in_string: Option<char> = None;
    let mut escaped = false;

    while let Some(c) = chars.next() {
        match in_string {
            Some(quote) => {
                if escaped {
                    escaped = false;
                    out.push(c);
                    continue;
                }
                match c {
                    '\\' => {
                        escaped = true;
                        out.push(c);
                    }
                    '\n' => out.push_str("\\n"),
                    '\r' => out.push_str("\\r"),
                    _ => {
                        if c == quote {
                            in_string = None;
                        }
                        out.push(c);
                    }
                }
            }
            None => match c {
                '"' | '\'' => {
                    in_string = Some(c);
                    out.push(c);
                }
                '\r' => {
                    if chars.peek() == Some(&'\n') {
                        out.push(c);
                    } else {
                        out.push_str("\\r");
                    }
                }
                _ => out.push(c),
            },
        }
    }
    out
}
