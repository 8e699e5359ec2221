//! JSONL session persistence: record shapes, replay, listing, resumption.
//!
//! Logs are append-only, one JSON record per line. Replay is tolerant:
//! malformed lines are skipped and everything salvageable is kept.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use myclaw_core::messages::{Message, SummaryBlock};
use myclaw_settings::Config;
use myclaw_workspace::Workspace;

use crate::bus::EventBus;
use crate::errors::{Result, RuntimeError};
use crate::factory::build_provider;
use crate::session::{RuntimeLimits, Session, SYSTEM_PROMPT};
use crate::store::SessionStore;

// ─────────────────────────────────────────────────────────────────────────────
// Record shapes
// ─────────────────────────────────────────────────────────────────────────────

/// One line of a session log.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum LogRecord {
    /// Session created.
    SessionStart {
        /// RFC 3339 timestamp.
        ts: String,
        /// Session ID.
        session_id: String,
        /// Workspace root.
        workspace: String,
    },
    /// Session restored from disk.
    SessionResume {
        /// RFC 3339 timestamp.
        ts: String,
        /// Session ID.
        session_id: String,
        /// Messages reconstructed at resume time.
        message_count: usize,
    },
    /// Session closed.
    SessionEnd {
        /// RFC 3339 timestamp.
        ts: String,
        /// Session ID.
        session_id: String,
    },
    /// A conversation message.
    Message {
        /// RFC 3339 timestamp.
        ts: String,
        /// Session ID.
        session_id: String,
        /// The message.
        message: Message,
    },
    /// A compression summary block.
    Summary {
        /// RFC 3339 timestamp.
        ts: String,
        /// Session ID.
        session_id: String,
        /// The block.
        block: SummaryBlock,
    },
}

/// Listing entry derived by replaying one log file.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedSessionSummary {
    /// Session ID.
    pub session_id: String,
    /// Workspace recorded at session start (absent in truncated logs).
    pub workspace: Option<String>,
    /// First timestamp.
    pub started_at: Option<String>,
    /// Last timestamp.
    pub last_updated_at: Option<String>,
    /// Number of message records.
    pub message_count: usize,
    /// Path of the log file.
    pub log_path: PathBuf,
}

/// Everything salvaged from one log file.
#[derive(Debug, Default)]
pub struct ReplayedLog {
    /// Workspace from the `session_start` record.
    pub workspace: Option<String>,
    /// First timestamp seen.
    pub started_at: Option<String>,
    /// Last timestamp seen.
    pub last_updated_at: Option<String>,
    /// Reconstructed message list, in append order.
    pub messages: Vec<Message>,
    /// Reconstructed summary blocks.
    pub summaries: Vec<SummaryBlock>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Replay
// ─────────────────────────────────────────────────────────────────────────────

/// Replay one log file, skipping malformed lines.
pub fn parse_log(path: &Path) -> std::io::Result<ReplayedLog> {
    let content = std::fs::read_to_string(path)?;
    let mut replayed = ReplayedLog::default();
    let mut skipped = 0usize;

    for line in content.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let record: LogRecord = match serde_json::from_str(line) {
            Ok(record) => record,
            Err(_) => {
                skipped += 1;
                continue;
            }
        };
        let ts = match &record {
            LogRecord::SessionStart { ts, .. }
            | LogRecord::SessionResume { ts, .. }
            | LogRecord::SessionEnd { ts, .. }
            | LogRecord::Message { ts, .. }
            | LogRecord::Summary { ts, .. } => ts.clone(),
        };
        if replayed.started_at.is_none() {
            replayed.started_at = Some(ts.clone());
        }
        replayed.last_updated_at = Some(ts);

        match record {
            LogRecord::SessionStart { workspace, .. } => {
                replayed.workspace = Some(workspace);
            }
            LogRecord::Message { message, .. } => replayed.messages.push(message),
            LogRecord::Summary { block, .. } => replayed.summaries.push(block),
            LogRecord::SessionResume { .. } | LogRecord::SessionEnd { .. } => {}
        }
    }

    if skipped > 0 {
        debug!(?path, skipped, "skipped malformed log lines");
    }
    Ok(replayed)
}

/// List persisted sessions for a workspace, newest first.
///
/// Logs with an unknown workspace are included; a missing sessions
/// directory yields an empty list.
pub fn list_for_workspace(
    sessions_dir: &Path,
    workspace: &str,
) -> std::io::Result<Vec<PersistedSessionSummary>> {
    let reader = match std::fs::read_dir(sessions_dir) {
        Ok(reader) => reader,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut summaries = Vec::new();
    for entry in reader.filter_map(std::result::Result::ok) {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("jsonl") {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let Ok(replayed) = parse_log(&path) else {
            continue;
        };
        let matches = replayed
            .workspace
            .as_deref()
            .map_or(true, |w| w == workspace);
        if !matches {
            continue;
        }
        summaries.push(PersistedSessionSummary {
            session_id: stem.to_owned(),
            workspace: replayed.workspace,
            started_at: replayed.started_at,
            last_updated_at: replayed.last_updated_at,
            message_count: replayed.messages.len(),
            log_path: path,
        });
    }

    summaries.sort_by(|a, b| {
        let a_key = a.last_updated_at.as_ref().or(a.started_at.as_ref());
        let b_key = b.last_updated_at.as_ref().or(b.started_at.as_ref());
        b_key.cmp(&a_key)
    });
    Ok(summaries)
}

/// Pick a session from a listing: `"latest"`, a 1-based index, or an ID.
#[must_use]
pub fn pick_session<'a>(
    summaries: &'a [PersistedSessionSummary],
    specifier: &str,
) -> Option<&'a PersistedSessionSummary> {
    if specifier == "latest" {
        return summaries.first();
    }
    if let Ok(index) = specifier.parse::<usize>() {
        if index >= 1 {
            return summaries.get(index - 1);
        }
    }
    summaries.iter().find(|s| s.session_id == specifier)
}

// ─────────────────────────────────────────────────────────────────────────────
// Resume
// ─────────────────────────────────────────────────────────────────────────────

/// Restore a persisted session into the store.
pub fn resume(
    store: &SessionStore,
    config: &Config,
    bus: &EventBus,
    session_id: &str,
) -> Result<Uuid> {
    let id = Uuid::parse_str(session_id)
        .map_err(|_| RuntimeError::ResumeNotFound(session_id.to_owned()))?;
    let log_path = config.sessions_dir().join(format!("{id}.jsonl"));
    if !log_path.exists() {
        return Err(RuntimeError::ResumeNotFound(session_id.to_owned()));
    }

    let replayed = parse_log(&log_path)?;
    let provider = build_provider(config)?;

    let root = replayed
        .workspace
        .clone()
        .filter(|w| !w.is_empty())
        .map(PathBuf::from)
        .or_else(|| {
            if config.workspace.is_empty() {
                None
            } else {
                Some(PathBuf::from(&config.workspace))
            }
        })
        .map_or_else(|| std::env::current_dir(), Ok)?;
    let workspace = Workspace::new(root)?;

    let mut messages = replayed.messages;
    if !messages.iter().any(Message::is_system) {
        messages.insert(0, Message::system(SYSTEM_PROMPT));
    }
    let compressed_count = replayed
        .summaries
        .iter()
        .map(|b| b.to + 1)
        .max()
        .unwrap_or(0);

    let session = Session::restored(
        id,
        provider,
        workspace,
        log_path,
        RuntimeLimits {
            max_steps: config.runtime.max_steps,
            context_window_size: config.runtime.context_window_size,
        },
        messages,
        replayed.summaries,
        compressed_count,
    );
    Ok(store.restore(session, bus))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn record_line(record: &LogRecord) -> String {
        serde_json::to_string(record).unwrap()
    }

    fn message_record(ts: &str, content: &str) -> String {
        record_line(&LogRecord::Message {
            ts: ts.into(),
            session_id: "s1".into(),
            message: Message::user(content),
        })
    }

    #[test]
    fn record_serde_uses_snake_case_tags() {
        let json = record_line(&LogRecord::SessionStart {
            ts: "t".into(),
            session_id: "s1".into(),
            workspace: "/ws".into(),
        });
        assert!(json.contains("\"type\":\"session_start\""));
        assert!(json.contains("\"sessionId\":\"s1\""));
    }

    #[test]
    fn replay_preserves_message_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.jsonl");
        let lines = [
            record_line(&LogRecord::SessionStart {
                ts: "2025-01-01T00:00:00Z".into(),
                session_id: "s1".into(),
                workspace: "/ws".into(),
            }),
            message_record("2025-01-01T00:00:01Z", "A"),
            message_record("2025-01-01T00:00:02Z", "B"),
        ];
        std::fs::write(&path, lines.join("\n")).unwrap();

        let replayed = parse_log(&path).unwrap();
        assert_eq!(replayed.workspace.as_deref(), Some("/ws"));
        assert_eq!(replayed.messages.len(), 2);
        assert_eq!(replayed.messages[0].content, "A");
        assert_eq!(replayed.messages[1].content, "B");
        assert_eq!(
            replayed.started_at.as_deref(),
            Some("2025-01-01T00:00:00Z")
        );
        assert_eq!(
            replayed.last_updated_at.as_deref(),
            Some("2025-01-01T00:00:02Z")
        );
    }

    #[test]
    fn malformed_lines_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.jsonl");
        let lines = [
            message_record("t1", "kept"),
            "{not json at all".to_owned(),
            "{\"type\":\"unknown_record\"}".to_owned(),
            message_record("t2", "also kept"),
        ];
        std::fs::write(&path, lines.join("\n")).unwrap();

        let replayed = parse_log(&path).unwrap();
        assert_eq!(replayed.messages.len(), 2);
    }

    #[test]
    fn tool_call_arrays_survive_replay() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.jsonl");
        let mut input = serde_json::Map::new();
        let _ = input.insert("path".into(), serde_json::json!("a.txt"));
        let message = Message::assistant_with_calls(
            "",
            vec![myclaw_core::messages::ToolCallRequest {
                id: Some("c1".into()),
                name: "read_file".into(),
                input,
            }],
        );
        std::fs::write(
            &path,
            record_line(&LogRecord::Message {
                ts: "t".into(),
                session_id: "s1".into(),
                message,
            }),
        )
        .unwrap();

        let replayed = parse_log(&path).unwrap();
        let calls = replayed.messages[0].tool_calls.as_ref().unwrap();
        assert_eq!(calls[0].id.as_deref(), Some("c1"));
        assert_eq!(calls[0].input["path"], "a.txt");
    }

    #[test]
    fn listing_sorted_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        for (name, ts) in [("old", "2025-01-01T00:00:00Z"), ("new", "2025-06-01T00:00:00Z")] {
            let path = dir.path().join(format!("{name}.jsonl"));
            std::fs::write(
                &path,
                record_line(&LogRecord::SessionStart {
                    ts: ts.into(),
                    session_id: name.into(),
                    workspace: "/ws".into(),
                }),
            )
            .unwrap();
        }

        let listing = list_for_workspace(dir.path(), "/ws").unwrap();
        assert_eq!(listing.len(), 2);
        assert_eq!(listing[0].session_id, "new");
        assert_eq!(listing[1].session_id, "old");
    }

    #[test]
    fn listing_filters_other_workspaces_keeps_unknown() {
        let dir = tempfile::tempdir().unwrap();
        let known = record_line(&LogRecord::SessionStart {
            ts: "t".into(),
            session_id: "a".into(),
            workspace: "/other".into(),
        });
        std::fs::write(dir.path().join("a.jsonl"), known).unwrap();
        // A log whose start record was lost has an unknown workspace
        std::fs::write(dir.path().join("b.jsonl"), message_record("t", "x")).unwrap();

        let listing = list_for_workspace(dir.path(), "/ws").unwrap();
        assert_eq!(listing.len(), 1);
        assert_eq!(listing[0].session_id, "b");
    }

    #[test]
    fn listing_missing_dir_is_empty() {
        let listing = list_for_workspace(Path::new("/no/such/dir"), "/ws").unwrap();
        assert!(listing.is_empty());
    }

    #[test]
    fn pick_latest_index_and_id() {
        let summary = |id: &str| PersistedSessionSummary {
            session_id: id.into(),
            workspace: None,
            started_at: None,
            last_updated_at: None,
            message_count: 0,
            log_path: PathBuf::new(),
        };
        let summaries = vec![summary("first"), summary("second")];

        assert_eq!(
            pick_session(&summaries, "latest").unwrap().session_id,
            "first"
        );
        assert_eq!(pick_session(&summaries, "2").unwrap().session_id, "second");
        assert_eq!(
            pick_session(&summaries, "second").unwrap().session_id,
            "second"
        );
        assert!(pick_session(&summaries, "0").is_none());
        assert!(pick_session(&summaries, "missing").is_none());
    }

    #[tokio::test]
    async fn resume_rebuilds_session() {
        let dir = tempfile::tempdir().unwrap();
        let home = dir.path().join("home");
        std::fs::create_dir_all(home.join("sessions")).unwrap();
        let id = Uuid::new_v4();
        let log_path = home.join("sessions").join(format!("{id}.jsonl"));

        let lines = [
            record_line(&LogRecord::SessionStart {
                ts: "t0".into(),
                session_id: id.to_string(),
                workspace: dir.path().to_string_lossy().into_owned(),
            }),
            message_record("t1", "hello"),
            record_line(&LogRecord::Summary {
                ts: "t2".into(),
                session_id: id.to_string(),
                block: SummaryBlock {
                    ts: "t2".into(),
                    from: 0,
                    to: 19,
                    content: "summary".into(),
                },
            }),
        ];
        std::fs::write(&log_path, lines.join("\n")).unwrap();

        let config = Config {
            home_dir: home.to_string_lossy().into_owned(),
            ..Config::default()
        };
        let store = SessionStore::new();
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        let restored = resume(&store, &config, &bus, &id.to_string()).unwrap();
        assert_eq!(restored, id);
        assert!(store.has(id));

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type(), "session_resume");

        let shared = store.get(id).unwrap();
        let session = shared.lock().await;
        // System prompt injected, then the replayed message
        assert!(session.messages[0].is_system());
        assert_eq!(session.messages[1].content, "hello");
        assert_eq!(session.compressed_count, 20);
        assert_eq!(session.summaries.len(), 1);
    }

    #[test]
    fn resume_unknown_id_fails() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            home_dir: dir.path().to_string_lossy().into_owned(),
            ..Config::default()
        };
        let store = SessionStore::new();
        let bus = EventBus::new();

        let err = resume(&store, &config, &bus, &Uuid::new_v4().to_string()).unwrap_err();
        assert!(matches!(err, RuntimeError::ResumeNotFound(_)));

        let err = resume(&store, &config, &bus, "not-a-uuid").unwrap_err();
        assert!(matches!(err, RuntimeError::ResumeNotFound(_)));
    }
}
