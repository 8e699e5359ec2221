//! Runtime error type.
//!
//! Only configuration, store-lookup, and resume failures propagate to the
//! caller; everything that happens inside a running turn is recovered into
//! tool results or fallback text.

use uuid::Uuid;

/// Result alias for runtime operations.
pub type Result<T> = std::result::Result<T, RuntimeError>;

/// Errors surfaced by session creation, lookup, and resumption.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// Provider misconfiguration (missing API key, bad endpoint).
    #[error(transparent)]
    Provider(#[from] myclaw_llm::ProviderError),

    /// Workspace root was invalid.
    #[error(transparent)]
    Workspace(#[from] myclaw_workspace::WorkspaceError),

    /// No live session with this ID.
    #[error("session not found: {0}")]
    SessionNotFound(Uuid),

    /// No persisted session log with this ID.
    #[error("no persisted session: {0}")]
    ResumeNotFound(String),

    /// I/O failure outside a turn (listing logs, reading a log file).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
