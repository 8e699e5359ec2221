//! Live session state.
//!
//! A session is owned by the store and mutated only by the turn that holds
//! its lock. Messages and summaries are append-only; compression only grows
//! `compressed_count`.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use uuid::Uuid;

use myclaw_core::messages::{Message, SummaryBlock};
use myclaw_llm::Provider;
use myclaw_workspace::Workspace;

use crate::interrupts::InterruptQueue;
use crate::oscillation::OscillationTracker;

/// Default system prompt for new sessions.
pub const SYSTEM_PROMPT: &str = "You are myclaw, a coding agent operating on the user's \
workspace through tools. Read files before changing them, make one mutation per step, \
and reply without tool calls when the task is done.";

/// Turn-loop limits copied from the effective configuration.
#[derive(Clone, Copy, Debug)]
pub struct RuntimeLimits {
    /// Model↔tool iterations per turn.
    pub max_steps: u32,
    /// Non-system messages admitted into a model request.
    pub context_window_size: usize,
}

/// One live conversation with its workspace and safety state.
pub struct Session {
    /// Session ID.
    pub id: Uuid,
    /// Provider handle.
    pub provider: Arc<dyn Provider>,
    /// Sandboxed workspace.
    pub workspace: Workspace,
    /// JSONL log path.
    pub log_path: PathBuf,
    /// Turn-loop limits.
    pub limits: RuntimeLimits,
    /// Ordered message list (append-only).
    pub messages: Vec<Message>,
    /// Summary blocks (append-only).
    pub summaries: Vec<SummaryBlock>,
    /// Non-system messages already folded into summaries.
    pub compressed_count: usize,
    /// Canonical paths observed via `read_file` (or written).
    pub read_paths: HashSet<PathBuf>,
    /// Monotonic counter bumped on every successful mutation.
    pub workspace_version: u64,
    /// Oscillation ring buffers.
    pub oscillation: OscillationTracker,
    /// Soft-gate interrupt queue, drained by the engine.
    pub interrupts: InterruptQueue<String>,
    explored: HashSet<String>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("provider", &self.provider.name())
            .field("workspace", &self.workspace)
            .field("log_path", &self.log_path)
            .field("limits", &self.limits)
            .field("messages", &self.messages)
            .field("summaries", &self.summaries)
            .field("compressed_count", &self.compressed_count)
            .field("read_paths", &self.read_paths)
            .field("workspace_version", &self.workspace_version)
            .field("oscillation", &self.oscillation)
            .field("interrupts", &self.interrupts)
            .field("explored", &self.explored)
            .finish()
    }
}

impl Session {
    /// Create a fresh session seeded with the system prompt.
    #[must_use]
    pub fn new(
        id: Uuid,
        provider: Arc<dyn Provider>,
        workspace: Workspace,
        log_path: PathBuf,
        limits: RuntimeLimits,
    ) -> Self {
        Self {
            id,
            provider,
            workspace,
            log_path,
            limits,
            messages: vec![Message::system(SYSTEM_PROMPT)],
            summaries: Vec::new(),
            compressed_count: 0,
            read_paths: HashSet::new(),
            workspace_version: 0,
            oscillation: OscillationTracker::new(),
            interrupts: InterruptQueue::new(),
            explored: HashSet::new(),
        }
    }

    /// Rebuild a session from replayed state.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn restored(
        id: Uuid,
        provider: Arc<dyn Provider>,
        workspace: Workspace,
        log_path: PathBuf,
        limits: RuntimeLimits,
        messages: Vec<Message>,
        summaries: Vec<SummaryBlock>,
        compressed_count: usize,
    ) -> Self {
        Self {
            messages,
            summaries,
            compressed_count,
            ..Self::new(id, provider, workspace, log_path, limits)
        }
    }

    /// Append a message (the only way messages grow).
    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Count of non-system messages.
    #[must_use]
    pub fn non_system_count(&self) -> usize {
        self.messages.iter().filter(|m| !m.is_system()).count()
    }

    /// Record a canonical path as read.
    pub fn mark_read(&mut self, path: PathBuf) {
        let _ = self.read_paths.insert(path);
    }

    /// Whether a canonical path has been read this session.
    #[must_use]
    pub fn has_read(&self, path: &std::path::Path) -> bool {
        self.read_paths.contains(path)
    }

    /// Register an exploration signature; returns `false` when it was
    /// already executed in the current workspace version.
    pub fn note_explored(&mut self, signature: String) -> bool {
        self.explored.insert(signature)
    }

    /// Bump the workspace version after a successful mutation and reset the
    /// per-version exploration set.
    pub fn bump_workspace_version(&mut self) {
        self.workspace_version += 1;
        self.explored.clear();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use myclaw_llm::MockProvider;

    fn make_session() -> (tempfile::TempDir, Session) {
        let dir = tempfile::tempdir().unwrap();
        let workspace = Workspace::new(dir.path()).unwrap();
        let session = Session::new(
            Uuid::new_v4(),
            Arc::new(MockProvider),
            workspace,
            dir.path().join("log.jsonl"),
            RuntimeLimits {
                max_steps: 8,
                context_window_size: 20,
            },
        );
        (dir, session)
    }

    #[test]
    fn new_session_has_system_prompt() {
        let (_dir, session) = make_session();
        assert_eq!(session.messages.len(), 1);
        assert!(session.messages[0].is_system());
        assert_eq!(session.non_system_count(), 0);
        assert_eq!(session.compressed_count, 0);
    }

    #[test]
    fn append_grows_messages() {
        let (_dir, mut session) = make_session();
        session.append(Message::user("hi"));
        session.append(Message::assistant("hello"));
        assert_eq!(session.non_system_count(), 2);
    }

    #[test]
    fn read_paths_tracking() {
        let (_dir, mut session) = make_session();
        let path = PathBuf::from("/ws/a.txt");
        assert!(!session.has_read(&path));
        session.mark_read(path.clone());
        assert!(session.has_read(&path));
    }

    #[test]
    fn exploration_dedupe_per_version() {
        let (_dir, mut session) = make_session();
        assert!(session.note_explored("0:list_files:{}".into()));
        assert!(!session.note_explored("0:list_files:{}".into()));

        session.bump_workspace_version();
        assert_eq!(session.workspace_version, 1);
        // A new version clears the suppression set
        assert!(session.note_explored("1:list_files:{}".into()));
    }

    #[test]
    fn restored_keeps_replayed_state() {
        let dir = tempfile::tempdir().unwrap();
        let workspace = Workspace::new(dir.path()).unwrap();
        let messages = vec![Message::system("s"), Message::user("a"), Message::user("b")];
        let session = Session::restored(
            Uuid::new_v4(),
            Arc::new(MockProvider),
            workspace,
            dir.path().join("log.jsonl"),
            RuntimeLimits {
                max_steps: 8,
                context_window_size: 20,
            },
            messages,
            vec![],
            0,
        );
        assert_eq!(session.messages.len(), 3);
        assert_eq!(session.non_system_count(), 2);
    }
}
