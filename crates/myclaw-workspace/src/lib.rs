//! # myclaw-workspace
//!
//! Sandboxed workspace I/O for the myclaw agent. Every operation resolves
//! its path lexically and rejects anything outside the workspace root before
//! touching the filesystem.

#![deny(unsafe_code)]

pub mod errors;
pub mod paths;
pub mod shell;

use std::path::{Path, PathBuf};

pub use errors::WorkspaceError;
pub use shell::{run_program, ShellOutput};

/// Maximum hits returned by [`Workspace::search`].
pub const SEARCH_HIT_LIMIT: usize = 200;

/// A sandboxed view of one directory tree.
#[derive(Clone, Debug)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    /// Create a workspace rooted at an absolute path.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, WorkspaceError> {
        let root = paths::normalize(&root.into());
        if !root.is_absolute() {
            return Err(WorkspaceError::RootNotAbsolute(root));
        }
        Ok(Self { root })
    }

    /// The workspace root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a path against the root, enforcing containment.
    pub fn resolve(&self, p: &str) -> Result<PathBuf, WorkspaceError> {
        paths::resolve(&self.root, p)
    }

    /// Whether the target exists (after containment checking).
    pub fn exists(&self, p: &str) -> Result<bool, WorkspaceError> {
        Ok(self.resolve(p)?.exists())
    }

    /// Read a file as UTF-8 text.
    pub async fn read_text(&self, p: &str) -> Result<String, WorkspaceError> {
        let abs = self.resolve(p)?;
        match tokio::fs::read_to_string(&abs).await {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(WorkspaceError::NotFound(p.to_owned()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Write a file, creating parent directories as needed.
    pub async fn write_text(&self, p: &str, content: &str) -> Result<(), WorkspaceError> {
        let abs = self.resolve(p)?;
        if let Some(parent) = abs.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&abs, content).await?;
        Ok(())
    }

    /// List directory entries, sorted, directories suffixed with `/`.
    pub async fn list_dir(&self, p: &str) -> Result<Vec<String>, WorkspaceError> {
        let abs = self.resolve(p)?;
        let mut reader = match tokio::fs::read_dir(&abs).await {
            Ok(r) => r,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(WorkspaceError::NotFound(p.to_owned()));
            }
            Err(e) => return Err(e.into()),
        };

        let mut entries = Vec::new();
        while let Some(entry) = reader.next_entry().await? {
            let mut name = entry.file_name().to_string_lossy().into_owned();
            if entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false) {
                name.push('/');
            }
            entries.push(name);
        }
        entries.sort();
        Ok(entries)
    }

    /// Case-insensitive substring search over entry names and
    /// workspace-relative paths, depth-first, capped at [`SEARCH_HIT_LIMIT`].
    pub fn search(&self, query: &str, subtree: &str) -> Result<Vec<String>, WorkspaceError> {
        let start = self.resolve(subtree)?;
        if !start.exists() {
            return Err(WorkspaceError::NotFound(subtree.to_owned()));
        }

        let needle = query.to_lowercase();
        let mut hits = Vec::new();
        let mut stack = vec![start];

        while let Some(dir) = stack.pop() {
            if hits.len() >= SEARCH_HIT_LIMIT {
                break;
            }
            let Ok(reader) = std::fs::read_dir(&dir) else {
                continue;
            };
            let mut children: Vec<PathBuf> =
                reader.filter_map(|e| e.ok().map(|e| e.path())).collect();
            children.sort();

            for child in children {
                if hits.len() >= SEARCH_HIT_LIMIT {
                    break;
                }
                let rel = child
                    .strip_prefix(&self.root)
                    .unwrap_or(&child)
                    .to_string_lossy()
                    .into_owned();
                let name = child
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();

                if name.to_lowercase().contains(&needle)
                    || rel.to_lowercase().contains(&needle)
                {
                    hits.push(rel);
                }
                if child.is_dir() {
                    stack.push(child);
                }
            }
        }
        Ok(hits)
    }

    /// Exact-substring patch. Fails when `search` is empty or absent from
    /// the file. Returns the number of replacements.
    pub async fn apply_patch(
        &self,
        p: &str,
        search: &str,
        replace: &str,
        replace_all: bool,
    ) -> Result<usize, WorkspaceError> {
        if search.is_empty() {
            return Err(WorkspaceError::EmptySearch);
        }
        let content = self.read_text(p).await?;
        let count = content.matches(search).count();
        if count == 0 {
            return Err(WorkspaceError::SearchMiss(p.to_owned()));
        }

        let (new_content, replaced) = if replace_all {
            (content.replace(search, replace), count)
        } else {
            (content.replacen(search, replace, 1), 1)
        };
        self.write_text(p, &new_content).await?;
        Ok(replaced)
    }

    /// Run a command line through the platform shell, rooted at `cwd`.
    pub async fn run_shell(&self, command: &str, cwd: &str) -> Result<String, WorkspaceError> {
        let dir = self.resolve(cwd)?;
        shell::run_shell(command, &dir).await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
