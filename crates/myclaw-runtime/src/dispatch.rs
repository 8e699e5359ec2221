//! Tool execution under the safety rails.
//!
//! Read-before-write, the create guard, and destructive-shell approval all
//! live here, between the parse boundary and the workspace. Every failure —
//! rail rejection or I/O error — becomes an `{ok:false}` tool result; the
//! turn always continues.

use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;

use myclaw_core::text::reescape_control_chars;
use myclaw_core::tools::{ToolInvocation, ToolResult};

use crate::session::Session;

/// Sensitive-action approval callback, provided by the front-end.
///
/// Absent callback means destructive commands are always blocked.
#[async_trait]
pub trait ApprovalHandler: Send + Sync {
    /// Whether the given shell command may run in this session.
    async fn approve(&self, session_id: &str, command: &str) -> bool;
}

/// Destructive shell command detection.
#[must_use]
pub fn is_destructive(command: &str) -> bool {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    let patterns = PATTERNS.get_or_init(|| {
        [
            r"\brm\b",
            r"\brmdir\b",
            r"\bunlink\b",
            r"\bdel\b",
            r"\brd\b",
            r"\bmv\b.*\s/dev/null",
            r"git\s+reset\s+--hard",
            r"git\s+clean",
        ]
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .collect()
    });
    patterns.iter().any(|p| p.is_match(command))
}

/// Execute a validated invocation against the session's workspace.
pub async fn execute_invocation(
    session: &mut Session,
    invocation: &ToolInvocation,
    approval: Option<&dyn ApprovalHandler>,
) -> ToolResult {
    match invocation {
        ToolInvocation::ReadFile { path } => read_file(session, path).await,
        ToolInvocation::WriteFile {
            path,
            content,
            allow_create,
        } => write_file(session, path, content, *allow_create).await,
        ToolInvocation::ApplyPatch {
            path,
            search,
            replace,
            replace_all,
        } => apply_patch(session, path, search, replace, *replace_all).await,
        ToolInvocation::ListFiles { path } => match session.workspace.list_dir(path).await {
            Ok(entries) if entries.is_empty() => ToolResult::ok("(empty directory)"),
            Ok(entries) => ToolResult::ok(entries.join("\n")),
            Err(e) => ToolResult::err(e.to_string()),
        },
        ToolInvocation::SearchWorkspace { query, subtree } => {
            match session.workspace.search(query, subtree) {
                Ok(hits) if hits.is_empty() => ToolResult::ok("(no matches)"),
                Ok(hits) => ToolResult::ok(hits.join("\n")),
                Err(e) => ToolResult::err(e.to_string()),
            }
        }
        ToolInvocation::RunShell { command } => run_shell(session, command, approval).await,
    }
}

async fn read_file(session: &mut Session, path: &str) -> ToolResult {
    let canonical = match session.workspace.resolve(path) {
        Ok(p) => p,
        Err(e) => return ToolResult::err(e.to_string()),
    };
    match session.workspace.read_text(path).await {
        Ok(content) => {
            session.mark_read(canonical);
            ToolResult::ok(content)
        }
        Err(e) => ToolResult::err(e.to_string()),
    }
}

async fn write_file(
    session: &mut Session,
    path: &str,
    content: &str,
    allow_create: bool,
) -> ToolResult {
    let canonical = match session.workspace.resolve(path) {
        Ok(p) => p,
        Err(e) => return ToolResult::err(e.to_string()),
    };

    if canonical.exists() {
        if !session.has_read(&canonical) {
            return ToolResult::err(format!("{path} exists and must be read_file first"));
        }
    } else if !allow_create {
        return ToolResult::err(format!("{path} does not exist (set allowCreate to create it)"));
    }

    // Tool-call JSON decoding can smuggle raw control characters into
    // string literals; re-escape before the bytes hit disk.
    let sanitized = reescape_control_chars(content);
    match session.workspace.write_text(path, &sanitized).await {
        Ok(()) => {
            session.mark_read(canonical);
            ToolResult::ok(format!("wrote {} bytes to {path}", sanitized.len()))
        }
        Err(e) => ToolResult::err(e.to_string()),
    }
}

async fn apply_patch(
    session: &mut Session,
    path: &str,
    search: &str,
    replace: &str,
    replace_all: bool,
) -> ToolResult {
    let canonical = match session.workspace.resolve(path) {
        Ok(p) => p,
        Err(e) => return ToolResult::err(e.to_string()),
    };
    if !canonical.exists() {
        return ToolResult::err(format!("{path} does not exist"));
    }
    if !session.has_read(&canonical) {
        return ToolResult::err(format!("{path} exists and must be read_file first"));
    }

    match session
        .workspace
        .apply_patch(path, search, replace, replace_all)
        .await
    {
        Ok(count) => ToolResult::ok(format!("replaced {count} occurrence(s) in {path}")),
        Err(e) => ToolResult::err(e.to_string()),
    }
}

async fn run_shell(
    session: &Session,
    command: &str,
    approval: Option<&dyn ApprovalHandler>,
) -> ToolResult {
    if is_destructive(command) {
        let approved = match approval {
            Some(handler) => {
                handler
                    .approve(&session.id.to_string(), command)
                    .await
            }
            None => false,
        };
        if !approved {
            return ToolResult::err("destructive command blocked");
        }
    }
    match session.workspace.run_shell(command, ".").await {
        Ok(output) => ToolResult::ok(output),
        Err(e) => ToolResult::err(e.to_string()),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use myclaw_llm::MockProvider;
    use myclaw_workspace::Workspace;
    use uuid::Uuid;

    use crate::session::RuntimeLimits;

    struct Always(bool);

    #[async_trait]
    impl ApprovalHandler for Always {
        async fn approve(&self, _session_id: &str, _command: &str) -> bool {
            self.0
        }
    }

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

    fn write_call(path: &str, content: &str, allow_create: bool) -> ToolInvocation {
        ToolInvocation::WriteFile {
            path: path.into(),
            content: content.into(),
            allow_create,
        }
    }

    // ── destructive detection ──

    #[test]
    fn destructive_patterns_match() {
        for cmd in [
            "rm -rf task",
            "sudo rm file",
            "rmdir build",
            "unlink a.txt",
            "del stuff",
            "rd /s dir",
            "mv precious /dev/null",
            "git reset --hard HEAD~1",
            "git clean -fd",
        ] {
            assert!(is_destructive(cmd), "should be destructive: {cmd}");
        }
    }

    #[test]
    fn safe_commands_not_flagged() {
        for cmd in [
            "ls -la",
            "cargo test",
            "git status",
            "grep -r main src",
            "format the code",
            "echo removed",
        ] {
            assert!(!is_destructive(cmd), "should be safe: {cmd}");
        }
    }

    // ── read-before-write ──

    #[tokio::test]
    async fn write_existing_unread_rejected() {
        let (_dir, mut session) = make_session();
        session.workspace.write_text("tmp.txt", "original\n").await.unwrap();

        let result =
            execute_invocation(&mut session, &write_call("tmp.txt", "new", false), None).await;
        assert!(!result.ok);
        assert!(result.output.contains("must be read_file first"));
        // Untouched
        assert_eq!(
            session.workspace.read_text("tmp.txt").await.unwrap(),
            "original\n"
        );
    }

    #[tokio::test]
    async fn write_after_read_succeeds() {
        let (_dir, mut session) = make_session();
        session.workspace.write_text("tmp.txt", "original").await.unwrap();

        let read = execute_invocation(
            &mut session,
            &ToolInvocation::ReadFile {
                path: "tmp.txt".into(),
            },
            None,
        )
        .await;
        assert!(read.ok);
        assert_eq!(read.output, "original");

        let write =
            execute_invocation(&mut session, &write_call("tmp.txt", "updated", false), None).await;
        assert!(write.ok, "{}", write.output);
        assert_eq!(
            session.workspace.read_text("tmp.txt").await.unwrap(),
            "updated"
        );
    }

    // ── create guard ──

    #[tokio::test]
    async fn create_without_flag_rejected() {
        let (_dir, mut session) = make_session();
        let result =
            execute_invocation(&mut session, &write_call("tmp-new.txt", "hello", false), None)
                .await;
        assert!(!result.ok);
        assert!(result.output.contains("does not exist"));
        assert!(!session.workspace.exists("tmp-new.txt").unwrap());
    }

    #[tokio::test]
    async fn create_with_flag_succeeds() {
        let (_dir, mut session) = make_session();
        let result =
            execute_invocation(&mut session, &write_call("tmp-new.txt", "hello", true), None)
                .await;
        assert!(result.ok);
        assert_eq!(
            session.workspace.read_text("tmp-new.txt").await.unwrap(),
            "hello"
        );
        // The written path counts as read for later mutations
        let again =
            execute_invocation(&mut session, &write_call("tmp-new.txt", "more", false), None)
                .await;
        assert!(again.ok);
    }

    // ── write sanitation ──

    #[tokio::test]
    async fn write_reescapes_control_chars_in_literals() {
        let (_dir, mut session) = make_session();
        let content = "let s = \"a\nb\";";
        let result = execute_invocation(
            &mut session,
            &write_call("code.rs", content, true),
            None,
        )
        .await;
        assert!(result.ok);
        assert_eq!(
            session.workspace.read_text("code.rs").await.unwrap(),
            "let s = \"a\\nb\";"
        );
    }

    // ── apply_patch rails ──

    #[tokio::test]
    async fn patch_missing_file_rejected() {
        let (_dir, mut session) = make_session();
        let result = execute_invocation(
            &mut session,
            &ToolInvocation::ApplyPatch {
                path: "ghost.txt".into(),
                search: "a".into(),
                replace: "b".into(),
                replace_all: false,
            },
            None,
        )
        .await;
        assert!(!result.ok);
        assert!(result.output.contains("does not exist"));
    }

    #[tokio::test]
    async fn patch_unread_file_rejected() {
        let (_dir, mut session) = make_session();
        session.workspace.write_text("f.txt", "abc").await.unwrap();
        let result = execute_invocation(
            &mut session,
            &ToolInvocation::ApplyPatch {
                path: "f.txt".into(),
                search: "a".into(),
                replace: "b".into(),
                replace_all: false,
            },
            None,
        )
        .await;
        assert!(!result.ok);
        assert!(result.output.contains("must be read_file first"));
    }

    #[tokio::test]
    async fn patch_after_read_applies() {
        let (_dir, mut session) = make_session();
        session.workspace.write_text("f.txt", "abc abc").await.unwrap();
        let _ = execute_invocation(
            &mut session,
            &ToolInvocation::ReadFile { path: "f.txt".into() },
            None,
        )
        .await;
        let result = execute_invocation(
            &mut session,
            &ToolInvocation::ApplyPatch {
                path: "f.txt".into(),
                search: "abc".into(),
                replace: "xyz".into(),
                replace_all: true,
            },
            None,
        )
        .await;
        assert!(result.ok);
        assert!(result.output.contains("replaced 2"));
    }

    // ── destructive approval ──

    #[tokio::test]
    async fn destructive_blocked_without_callback() {
        let (_dir, mut session) = make_session();
        session.workspace.write_text("task", "x").await.unwrap();
        let result = execute_invocation(
            &mut session,
            &ToolInvocation::RunShell {
                command: "rm -rf task".into(),
            },
            None,
        )
        .await;
        assert!(!result.ok);
        assert!(result.output.contains("destructive command blocked"));
        assert!(session.workspace.exists("task").unwrap());
    }

    #[tokio::test]
    async fn destructive_blocked_on_denial() {
        let (_dir, mut session) = make_session();
        let denier = Always(false);
        let result = execute_invocation(
            &mut session,
            &ToolInvocation::RunShell {
                command: "rm -rf task".into(),
            },
            Some(&denier),
        )
        .await;
        assert!(!result.ok);
        assert!(result.output.contains("destructive command blocked"));
    }

    #[tokio::test]
    async fn destructive_runs_on_approval() {
        let (_dir, mut session) = make_session();
        session.workspace.write_text("task", "x").await.unwrap();
        let approver = Always(true);
        let result = execute_invocation(
            &mut session,
            &ToolInvocation::RunShell {
                command: "rm -rf task".into(),
            },
            Some(&approver),
        )
        .await;
        assert!(result.ok, "{}", result.output);
        assert!(!session.workspace.exists("task").unwrap());
    }

    // ── path containment through dispatch ──

    #[tokio::test]
    async fn escape_attempts_fail_without_io() {
        let (_dir, mut session) = make_session();
        for invocation in [
            ToolInvocation::ReadFile {
                path: "../outside.txt".into(),
            },
            write_call("../outside.txt", "x", true),
            ToolInvocation::ListFiles {
                path: "../..".into(),
            },
        ] {
            let result = execute_invocation(&mut session, &invocation, None).await;
            assert!(!result.ok);
            assert!(result.output.contains("escapes the workspace"));
        }
    }

    // ── read-only tools ──

    #[tokio::test]
    async fn list_and_search_results() {
        let (_dir, mut session) = make_session();
        session.workspace.write_text("src/main.rs", "").await.unwrap();

        let list = execute_invocation(
            &mut session,
            &ToolInvocation::ListFiles { path: ".".into() },
            None,
        )
        .await;
        assert!(list.ok);
        assert!(list.output.contains("src/"));

        let search = execute_invocation(
            &mut session,
            &ToolInvocation::SearchWorkspace {
                query: "main".into(),
                subtree: ".".into(),
            },
            None,
        )
        .await;
        assert!(search.ok);
        assert!(search.output.contains("src/main.rs"));

        let miss = execute_invocation(
            &mut session,
            &ToolInvocation::SearchWorkspace {
                query: "zzz".into(),
                subtree: ".".into(),
            },
            None,
        )
        .await;
        assert_eq!(miss.output, "(no matches)");
    }

    #[tokio::test]
    async fn shell_output_framed() {
        let (_dir, mut session) = make_session();
        let result = execute_invocation(
            &mut session,
            &ToolInvocation::RunShell {
                command: "echo hi".into(),
            },
            None,
        )
        .await;
        assert!(result.ok);
        assert!(result.output.starts_with("exit_code=0\n"));
        assert!(result.output.contains("hi"));
    }
}
