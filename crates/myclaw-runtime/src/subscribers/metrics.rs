//! Metrics subscriber: per-session counters and a metrics JSONL stream.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::json;

use myclaw_core::events::AgentEvent;

use crate::bus::EventBus;
use crate::subscribers::{now_ts, JsonlWriters, SubscriberTask};

#[derive(Clone, Debug, Default)]
struct SessionMetrics {
    started_at: String,
    last_event_at: String,
    tool_calls: u64,
    tool_errors: u64,
    turns: u64,
    oscillation_alerts: u64,
}

/// Writes `metrics/<session_id>.jsonl`: a `metrics_start`, per-event deltas,
/// and a closing `metrics_summary` with totals.
pub struct MetricsSubscriber {
    writers: Arc<JsonlWriters>,
    task: SubscriberTask,
}

impl MetricsSubscriber {
    /// Subscribe to the bus, writing under `metrics_dir`.
    #[must_use]
    pub fn attach(bus: &EventBus, metrics_dir: PathBuf) -> Self {
        let writers = Arc::new(JsonlWriters::new());
        let state: Arc<Mutex<HashMap<String, SessionMetrics>>> =
            Arc::new(Mutex::new(HashMap::new()));

        let handler_writers = writers.clone();
        let task = SubscriberTask::spawn(bus, move |event| {
            let writers = handler_writers.clone();
            let state = state.clone();
            let metrics_dir = metrics_dir.clone();
            async move {
                handle_event(&writers, &state, &metrics_dir, event).await;
            }
        });
        Self { writers, task }
    }

    /// Await every pending write. Call before process exit.
    pub async fn flush(&self) {
        self.task.caught_up().await;
        self.writers.flush_all().await;
    }
}

async fn handle_event(
    writers: &JsonlWriters,
    state: &Mutex<HashMap<String, SessionMetrics>>,
    metrics_dir: &std::path::Path,
    event: AgentEvent,
) {
    let session_id = event.session_id().to_owned();
    let ts = now_ts();

    if matches!(
        event,
        AgentEvent::Start { .. } | AgentEvent::SessionResume { .. }
    ) {
        writers.register(&session_id, metrics_dir.join(format!("{session_id}.jsonl")));
        let _ = state.lock().insert(
            session_id.clone(),
            SessionMetrics {
                started_at: ts.clone(),
                last_event_at: ts.clone(),
                ..SessionMetrics::default()
            },
        );
        writers.write(
            &session_id,
            &json!({"type": "metrics_start", "ts": ts, "sessionId": session_id}),
        );
        return;
    }

    // Touch last-seen regardless of kind.
    if let Some(metrics) = state.lock().get_mut(&session_id) {
        metrics.last_event_at = ts.clone();
    }

    match event {
        AgentEvent::ToolCall { tool, step, .. } => {
            if let Some(metrics) = state.lock().get_mut(&session_id) {
                metrics.tool_calls += 1;
            }
            writers.write(
                &session_id,
                &json!({"type": "tool_call_metric", "ts": ts, "sessionId": session_id, "tool": tool, "step": step}),
            );
        }
        AgentEvent::ToolResult { tool, ok, step, .. } => {
            if !ok {
                if let Some(metrics) = state.lock().get_mut(&session_id) {
                    metrics.tool_errors += 1;
                }
            }
            writers.write(
                &session_id,
                &json!({"type": "tool_result_metric", "ts": ts, "sessionId": session_id, "tool": tool, "ok": ok, "step": step}),
            );
        }
        AgentEvent::ModelResponse {
            step,
            tool_call_count,
            ..
        } => {
            writers.write(
                &session_id,
                &json!({"type": "model_metric", "ts": ts, "sessionId": session_id, "step": step, "toolCallCount": tool_call_count}),
            );
        }
        AgentEvent::OscillationObserve { metrics: m, step, .. } => {
            if m.possible_oscillation {
                if let Some(metrics) = state.lock().get_mut(&session_id) {
                    metrics.oscillation_alerts += 1;
                }
            }
            writers.write(
                &session_id,
                &json!({"type": "oscillation_metric", "ts": ts, "sessionId": session_id, "step": step, "possibleOscillation": m.possible_oscillation, "repeatRatio": m.repeat_ratio, "noveltyRatio": m.novelty_ratio}),
            );
        }
        AgentEvent::Final { .. } | AgentEvent::MaxSteps { .. } => {
            if let Some(metrics) = state.lock().get_mut(&session_id) {
                metrics.turns += 1;
            }
        }
        AgentEvent::SessionEnd { .. } => {
            let totals = state.lock().remove(&session_id).unwrap_or_default();
            writers.write(
                &session_id,
                &json!({
                    "type": "metrics_summary",
                    "ts": ts,
                    "sessionId": session_id,
                    "startedAt": totals.started_at,
                    "lastEventAt": totals.last_event_at,
                    "toolCalls": totals.tool_calls,
                    "toolErrors": totals.tool_errors,
                    "turns": totals.turns,
                    "oscillationAlerts": totals.oscillation_alerts,
                }),
            );
            writers.finish(&session_id).await;
        }
        _ => {}
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
