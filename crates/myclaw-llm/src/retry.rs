//! Retry-to-fallback resolution for real providers.
//!
//! One attempt is bounded by the configured timeout; timeouts and transport
//! errors are retried up to the configured count with no sleep in between.
//! The final outcome is always a [`ChatReply`] — a running turn never sees a
//! provider error.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::provider::{ChatReply, ProviderError, ProviderResult, EMPTY_RESPONSE_SENTINEL};

/// Run `attempt` up to `retry_count + 1` times and resolve to a reply.
///
/// Empty replies (no text, no tool calls) are retried like transient errors;
/// non-retryable errors stop immediately. Whatever remains unresolved becomes
/// the sentinel fallback text.
pub async fn resolve_with_retry<F, Fut>(
    timeout_ms: u64,
    retry_count: u32,
    mut attempt: F,
) -> ChatReply
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ProviderResult<ChatReply>>,
{
    let attempts = retry_count.saturating_add(1);
    let timeout = Duration::from_millis(timeout_ms);
    let mut last_error: Option<ProviderError> = None;

    for n in 1..=attempts {
        match tokio::time::timeout(timeout, attempt()).await {
            Err(_) => {
                warn!(attempt = n, timeout_ms, "model request timed out");
                last_error = Some(ProviderError::Timeout { ms: timeout_ms });
            }
            Ok(Err(e)) if e.is_retryable() => {
                warn!(attempt = n, error = %e, "model request failed, retrying");
                last_error = Some(e);
            }
            Ok(Err(e)) => {
                warn!(error = %e, "model request failed");
                last_error = Some(e);
                break;
            }
            Ok(Ok(reply)) => {
                if reply.text.is_empty() && reply.tool_calls.is_empty() {
                    debug!(attempt = n, "model returned an empty reply");
                    last_error = None;
                    continue;
                }
                return reply;
            }
        }
    }

    let text = match last_error {
        Some(e) => format!("Model request failed: {e}"),
        None => format!("{EMPTY_RESPONSE_SENTINEL}."),
    };
    ChatReply {
        text,
        tool_calls: Vec::new(),
    }
}
