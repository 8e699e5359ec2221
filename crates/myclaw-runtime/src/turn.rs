//! The agent turn engine.
//!
//! One turn: append the user message, compress if the backlog demands it,
//! then loop model request → tool execution → feedback until the model
//! replies without tool calls or the step budget runs out. Events are
//! published at every boundary; the session lock is held for the whole turn.

use tracing::{debug, info};
use uuid::Uuid;

use myclaw_core::events::AgentEvent;
use myclaw_core::messages::Message;
use myclaw_core::tools::{catalog, ToolInvocation, ToolResult};
use myclaw_llm::{ChatReply, EMPTY_RESPONSE_SENTINEL};

use crate::bus::EventBus;
use crate::compression::maybe_compress;
use crate::context::build_context;
use crate::dispatch::{execute_invocation, ApprovalHandler};
use crate::errors::Result;
use crate::store::{append_and_publish, SessionStore};

/// Returned when the step budget is exhausted.
pub const STOPPED_MESSAGE: &str = "Stopped: reached the step limit for this turn.";

/// Friendly replacement for the provider's empty-response sentinel.
pub const EMPTY_RESPONSE_NOTICE: &str =
    "The model returned no further output; the task appears complete.";

/// Run one turn against a live session and return the final assistant text.
pub async fn run_turn(
    store: &SessionStore,
    session_id: Uuid,
    input: &str,
    bus: &EventBus,
    approval: Option<&dyn ApprovalHandler>,
) -> Result<String> {
    let shared = store.get(session_id)?;
    let mut session = shared.lock().await;
    let sid = session_id.to_string();

    append_and_publish(&mut session, bus, Message::user(input));

    for block in maybe_compress(&mut session) {
        let _ = bus.publish(AgentEvent::Summary {
            session_id: sid.clone(),
            block,
        });
    }

    for step in 1..=session.limits.max_steps {
        // Soft-gate interrupts land as tool messages before the request.
        for payload in session.interrupts.drain() {
            debug!(session_id = %sid, "injecting interrupt");
            append_and_publish(&mut session, bus, Message::tool(payload, None, "check"));
        }

        let built = build_context(&session);
        if built.trimmed > 0 {
            let _ = bus.publish(AgentEvent::ContextTrim {
                session_id: sid.clone(),
                dropped: built.trimmed,
            });
        }
        let _ = bus.publish(AgentEvent::ModelRequestStart {
            session_id: sid.clone(),
            step,
            message_count: built.messages.len(),
        });

        let provider = session.provider.clone();
        let reply = match provider.chat(&built.messages, &catalog()).await {
            Ok(reply) => reply,
            // Real providers resolve internally; this is the belt for
            // custom impls, so the turn still closes with text.
            Err(e) => ChatReply {
                text: format!("Model request failed: {e}"),
                tool_calls: Vec::new(),
            },
        };

        let _ = bus.publish(AgentEvent::ModelResponse {
            session_id: sid.clone(),
            step,
            text: reply.text.clone(),
            tool_call_count: reply.tool_calls.len(),
        });
        append_and_publish(
            &mut session,
            bus,
            Message::assistant_with_calls(reply.text.clone(), reply.tool_calls.clone()),
        );

        if reply.tool_calls.is_empty() {
            let text = normalize_reply(&reply.text);
            info!(session_id = %sid, step, "turn finished");
            let _ = bus.publish(AgentEvent::Final {
                session_id: sid.clone(),
                text: text.clone(),
            });
            return Ok(text);
        }

        // Parse boundary: duck-typed inputs become typed invocations here.
        let parsed: Vec<(Option<String>, String, std::result::Result<ToolInvocation, String>)> =
            reply
                .tool_calls
                .iter()
                .map(|req| {
                    (
                        req.id.clone(),
                        req.name.clone(),
                        ToolInvocation::parse(&req.name, &req.input),
                    )
                })
                .collect();

        let mutation_count = parsed
            .iter()
            .filter(|(_, _, p)| p.as_ref().is_ok_and(ToolInvocation::is_mutation))
            .count();
        if mutation_count > 1 {
            let result = ToolResult::err(
                "Batch rejected: at most one mutation tool call per step; \
                 re-issue the mutations one at a time",
            );
            append_and_publish(
                &mut session,
                bus,
                Message::tool(tool_result_content(&result), None, "batch"),
            );
            continue;
        }

        let mut mutated = false;
        for (call_id, requested_name, parse_result) in parsed {
            let (tool_name, result) = match parse_result {
                Err(message) => (requested_name, ToolResult::err(message)),
                Ok(invocation) => {
                    let signature = invocation.signature(session.workspace_version);
                    let duplicate = invocation.is_low_value_exploration()
                        && !session.note_explored(signature.clone());

                    let result = if duplicate {
                        ToolResult::err(
                            "duplicate exploration call ignored: identical call already \
                             executed against this workspace state",
                        )
                    } else {
                        let _ = bus.publish(AgentEvent::ToolCall {
                            session_id: sid.clone(),
                            step,
                            tool: invocation.name().to_owned(),
                            input: invocation.input_json(),
                        });
                        execute_invocation(&mut session, &invocation, approval).await
                    };

                    if invocation.is_mutation() && result.ok {
                        session.bump_workspace_version();
                        mutated = true;
                    }
                    session.oscillation.record_call(signature);
                    session.oscillation.record_output(&result.output);
                    (invocation.name().to_owned(), result)
                }
            };

            let _ = bus.publish(AgentEvent::ToolResult {
                session_id: sid.clone(),
                step,
                tool: tool_name.clone(),
                ok: result.ok,
                output: result.output.clone(),
            });
            append_and_publish(
                &mut session,
                bus,
                Message::tool(tool_result_content(&result), call_id, tool_name),
            );
        }

        let metrics = session.oscillation.finish_step(mutated);
        let _ = bus.publish(AgentEvent::OscillationObserve {
            session_id: sid.clone(),
            step,
            metrics,
        });
    }

    info!(session_id = %sid, max_steps = session.limits.max_steps, "step budget exhausted");
    let _ = bus.publish(AgentEvent::MaxSteps {
        session_id: sid.clone(),
        steps: session.limits.max_steps,
    });
    append_and_publish(&mut session, bus, Message::assistant(STOPPED_MESSAGE));
    Ok(STOPPED_MESSAGE.to_owned())
}

fn tool_result_content(result: &ToolResult) -> String {
    format!(
        "TOOL_RESULT {}",
        serde_json::to_string(result).unwrap_or_else(|_| "{}".into())
    )
}

fn normalize_reply(text: &str) -> String {
    if text.starts_with(EMPTY_RESPONSE_SENTINEL) {
        EMPTY_RESPONSE_NOTICE.to_owned()
    } else {
        text.to_owned()
    }
}
