//! Workspace error kinds.

use std::path::PathBuf;

/// Errors surfaced by workspace operations. Every variant becomes an
/// `{ok:false}` tool result at the dispatch boundary.
#[derive(Debug, thiserror::Error)]
pub enum WorkspaceError {
    /// The workspace root must be absolute.
    #[error("workspace root must be an absolute path: {0}")]
    RootNotAbsolute(PathBuf),

    /// A resolved path escaped the workspace root.
    #[error("path escapes the workspace: {0}")]
    OutsideRoot(String),

    /// The target does not exist.
    #[error("no such file or directory: {0}")]
    NotFound(String),

    /// `apply_patch` was called with an empty search string.
    #[error("search text must not be empty")]
    EmptySearch,

    /// `apply_patch` could not find the search text.
    #[error("search text not found in {0}")]
    SearchMiss(String),

    /// Underlying I/O failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
