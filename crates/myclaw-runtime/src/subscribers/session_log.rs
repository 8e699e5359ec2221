//! Session log subscriber: the append-only JSONL record of a session.

use std::sync::Arc;

use myclaw_core::events::AgentEvent;

use crate::bus::EventBus;
use crate::persistence::LogRecord;
use crate::subscribers::{now_ts, JsonlWriters, SubscriberTask};

/// Writes `session_start` / `session_resume` / `session_end` / `message` /
/// `summary` records, one session log per session.
pub struct SessionLogSubscriber {
    writers: Arc<JsonlWriters>,
    task: SubscriberTask,
}

impl SessionLogSubscriber {
    /// Subscribe to the bus and start writing.
    #[must_use]
    pub fn attach(bus: &EventBus) -> Self {
        let writers = Arc::new(JsonlWriters::new());
        let handler_writers = writers.clone();
        let task = SubscriberTask::spawn(bus, move |event| {
            let writers = handler_writers.clone();
            async move {
                handle_event(&writers, event).await;
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

async fn handle_event(writers: &JsonlWriters, event: AgentEvent) {
    match event {
        AgentEvent::Start {
            session_id,
            workspace,
            log_path,
        } => {
            writers.register(&session_id, log_path.into());
            writers.write(
                &session_id,
                &record(&LogRecord::SessionStart {
                    ts: now_ts(),
                    session_id: session_id.clone(),
                    workspace,
                }),
            );
        }
        AgentEvent::SessionResume {
            session_id,
            log_path,
            message_count,
            ..
        } => {
            writers.register(&session_id, log_path.into());
            writers.write(
                &session_id,
                &record(&LogRecord::SessionResume {
                    ts: now_ts(),
                    session_id: session_id.clone(),
                    message_count,
                }),
            );
        }
        AgentEvent::SessionEnd { session_id } => {
            writers.write(
                &session_id,
                &record(&LogRecord::SessionEnd {
                    ts: now_ts(),
                    session_id: session_id.clone(),
                }),
            );
            writers.finish(&session_id).await;
        }
        AgentEvent::Message {
            session_id,
            message,
        } => {
            writers.write(
                &session_id,
                &record(&LogRecord::Message {
                    ts: now_ts(),
                    session_id: session_id.clone(),
                    message,
                }),
            );
        }
        AgentEvent::Summary { session_id, block } => {
            writers.write(
                &session_id,
                &record(&LogRecord::Summary {
                    ts: now_ts(),
                    session_id: session_id.clone(),
                    block,
                }),
            );
        }
        // Request/response/tool traffic is the metrics subscriber's concern.
        AgentEvent::ContextTrim { .. }
        | AgentEvent::ModelRequestStart { .. }
        | AgentEvent::ModelResponse { .. }
        | AgentEvent::ToolCall { .. }
        | AgentEvent::ToolResult { .. }
        | AgentEvent::OscillationObserve { .. }
        | AgentEvent::Final { .. }
        | AgentEvent::MaxSteps { .. } => {}
    }
}

fn record(record: &LogRecord) -> serde_json::Value {
    serde_json::to_value(record).unwrap_or(serde_json::Value::Null)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use myclaw_core::messages::Message;

    #[tokio::test]
    async fn start_then_messages_written_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("sessions").join("s1.jsonl");
        let bus = EventBus::new();
        let subscriber = SessionLogSubscriber::attach(&bus);

        let _ = bus.publish(AgentEvent::Start {
            session_id: "s1".into(),
            workspace: "/ws".into(),
            log_path: log_path.to_string_lossy().into_owned(),
        });
        let _ = bus.publish(AgentEvent::Message {
            session_id: "s1".into(),
            message: Message::system("prompt"),
        });
        let _ = bus.publish(AgentEvent::Message {
            session_id: "s1".into(),
            message: Message::user("hello"),
        });
        subscriber.flush().await;

        let content = std::fs::read_to_string(&log_path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("\"session_start\""));
        assert!(lines[1].contains("\"system\""));
        assert!(lines[2].contains("hello"));
    }

    #[tokio::test]
    async fn session_end_closes_the_log() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("s1.jsonl");
        let bus = EventBus::new();
        let subscriber = SessionLogSubscriber::attach(&bus);

        let _ = bus.publish(AgentEvent::Start {
            session_id: "s1".into(),
            workspace: "/ws".into(),
            log_path: log_path.to_string_lossy().into_owned(),
        });
        let _ = bus.publish(AgentEvent::SessionEnd {
            session_id: "s1".into(),
        });
        subscriber.flush().await;

        let content = std::fs::read_to_string(&log_path).unwrap();
        assert!(content.lines().last().unwrap().contains("session_end"));
    }

    #[tokio::test]
    async fn events_for_unknown_sessions_ignored() {
        let bus = EventBus::new();
        let subscriber = SessionLogSubscriber::attach(&bus);
        // No Start seen: nothing to write to, and nothing panics.
        let _ = bus.publish(AgentEvent::Message {
            session_id: "ghost".into(),
            message: Message::user("x"),
        });
        subscriber.flush().await;
    }

    #[tokio::test]
    async fn replay_roundtrip_through_log_subscriber() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("s1.jsonl");
        let bus = EventBus::new();
        let subscriber = SessionLogSubscriber::attach(&bus);

        let _ = bus.publish(AgentEvent::Start {
            session_id: "s1".into(),
            workspace: "/ws".into(),
            log_path: log_path.to_string_lossy().into_owned(),
        });
        let _ = bus.publish(AgentEvent::Message {
            session_id: "s1".into(),
            message: Message::user("A"),
        });
        let _ = bus.publish(AgentEvent::Message {
            session_id: "s1".into(),
            message: Message::assistant("B"),
        });
        subscriber.flush().await;

        let replayed = crate::persistence::parse_log(&log_path).unwrap();
        assert_eq!(replayed.messages.len(), 2);
        assert_eq!(replayed.messages[0].content, "A");
        assert_eq!(replayed.messages[1].content, "B");
        assert_eq!(replayed.workspace.as_deref(), Some("/ws"));
    }
}
