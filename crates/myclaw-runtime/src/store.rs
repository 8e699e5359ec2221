//! In-memory session store.
//!
//! The store is the only shared mutable map in the process. It hands out
//! `Arc<tokio::sync::Mutex<Session>>`; a turn holds the lock for its whole
//! duration, which is what enforces the one-turn-per-session discipline.
//! Interrupt queues are registered alongside so the check gate can enqueue
//! without contending on the session lock.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::info;
use uuid::Uuid;

use myclaw_core::events::AgentEvent;
use myclaw_core::messages::Message;
use myclaw_settings::Config;
use myclaw_workspace::Workspace;

use crate::bus::EventBus;
use crate::errors::{Result, RuntimeError};
use crate::factory::build_provider;
use crate::interrupts::InterruptQueue;
use crate::session::{RuntimeLimits, Session, SYSTEM_PROMPT};

type SharedSession = Arc<tokio::sync::Mutex<Session>>;

/// Map of live sessions keyed by ID.
#[derive(Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<Uuid, SharedSession>>,
    interrupts: Mutex<HashMap<Uuid, InterruptQueue<String>>>,
}

impl SessionStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a session from the effective configuration.
    ///
    /// Fails fast on provider misconfiguration or an invalid workspace.
    /// Publishes `start` followed by the initial system `message`.
    pub fn create_session(&self, config: &Config, bus: &EventBus) -> Result<Uuid> {
        let provider = build_provider(config)?;
        let root = if config.workspace.is_empty() {
            std::env::current_dir()?
        } else {
            config.workspace.clone().into()
        };
        let workspace = Workspace::new(root)?;

        let id = Uuid::new_v4();
        let log_path = config.sessions_dir().join(format!("{id}.jsonl"));
        let mut session = Session::new(
            id,
            provider,
            workspace.clone(),
            log_path.clone(),
            RuntimeLimits {
                max_steps: config.runtime.max_steps,
                context_window_size: config.runtime.context_window_size,
            },
        );

        // Seed durable memory into the system prompt before the session
        // sees its first turn.
        if let Ok(memory) = std::fs::read_to_string(config.memory_file()) {
            let memory = memory.trim();
            if !memory.is_empty() {
                session.messages[0] =
                    Message::system(format!("{SYSTEM_PROMPT}\n\nDurable memory:\n{memory}"));
            }
        }

        let system = session.messages[0].clone();
        self.insert(session);
        info!(session_id = %id, workspace = %workspace.root().display(), "session created");

        let _ = bus.publish(AgentEvent::Start {
            session_id: id.to_string(),
            workspace: workspace.root().to_string_lossy().into_owned(),
            log_path: log_path.to_string_lossy().into_owned(),
        });
        let _ = bus.publish(AgentEvent::Message {
            session_id: id.to_string(),
            message: system,
        });
        Ok(id)
    }

    /// Insert a restored session and publish `session_resume`.
    pub fn restore(&self, session: Session, bus: &EventBus) -> Uuid {
        let id = session.id;
        let workspace = session.workspace.root().to_string_lossy().into_owned();
        let log_path = session.log_path.to_string_lossy().into_owned();
        let message_count = session.messages.len();
        self.insert(session);
        info!(session_id = %id, message_count, "session restored");

        let _ = bus.publish(AgentEvent::SessionResume {
            session_id: id.to_string(),
            workspace,
            log_path,
            message_count,
        });
        id
    }

    fn insert(&self, session: Session) {
        let id = session.id;
        let _ = self
            .interrupts
            .lock()
            .insert(id, session.interrupts.clone());
        let _ = self
            .sessions
            .lock()
            .insert(id, Arc::new(tokio::sync::Mutex::new(session)));
    }

    /// Look up a live session.
    pub fn get(&self, id: Uuid) -> Result<SharedSession> {
        self.sessions
            .lock()
            .get(&id)
            .cloned()
            .ok_or(RuntimeError::SessionNotFound(id))
    }

    /// Whether a session is live.
    #[must_use]
    pub fn has(&self, id: Uuid) -> bool {
        self.sessions.lock().contains_key(&id)
    }

    /// Interrupt queue for a live session (lock-free access for the check
    /// gate).
    #[must_use]
    pub fn interrupts_for(&self, id: Uuid) -> Option<InterruptQueue<String>> {
        self.interrupts.lock().get(&id).cloned()
    }

    /// IDs of all live sessions.
    #[must_use]
    pub fn live_ids(&self) -> Vec<Uuid> {
        self.sessions.lock().keys().copied().collect()
    }

    /// Close a session: remove it and publish `session_end`.
    pub fn close_session(&self, id: Uuid, bus: &EventBus) -> Result<()> {
        let removed = self.sessions.lock().remove(&id);
        let _ = self.interrupts.lock().remove(&id);
        if removed.is_none() {
            return Err(RuntimeError::SessionNotFound(id));
        }
        info!(session_id = %id, "session closed");
        let _ = bus.publish(AgentEvent::SessionEnd {
            session_id: id.to_string(),
        });
        Ok(())
    }
}

/// Convenience used by the engine to append a message and publish its event
/// in one place, keeping session order and bus order identical.
pub fn append_and_publish(session: &mut Session, bus: &EventBus, message: Message) {
    session.append(message.clone());
    let _ = bus.publish(AgentEvent::Message {
        session_id: session.id.to_string(),
        message,
    });
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
