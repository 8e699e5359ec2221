//! Async check gate: post-mutation syntax/lint checks.
//!
//! Successful `write_file`/`apply_patch` calls enqueue background checks on
//! the session's interrupt queue. Failures come back to the model as
//! `LINT_FAIL` tool messages on the next request; a missing tool binary is a
//! silent skip. Checks are advisory — they never block the current turn.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::json;
use tracing::debug;
use uuid::Uuid;

use myclaw_core::events::AgentEvent;
use myclaw_core::text::truncate_str;
use myclaw_settings::ReviewConfig;
use myclaw_workspace::run_program;

use crate::bus::EventBus;
use crate::store::SessionStore;
use crate::subscribers::SubscriberTask;

const OUTPUT_MAX_CHARS: usize = 2_000;

/// A background check to run against one file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CheckKind {
    /// `node --check` syntax-only compile.
    NodeSyntax,
    /// `python3 -m py_compile`.
    PyCompile,
    /// ESLint via `npx --no-install eslint`.
    Eslint,
}

impl CheckKind {
    fn linter(self) -> &'static str {
        match self {
            Self::NodeSyntax => "node",
            Self::PyCompile => "python",
            Self::Eslint => "eslint",
        }
    }
}

/// Select the checks for a freshly mutated file.
#[must_use]
pub fn select_checks(
    path: &str,
    eslint_config_present: bool,
    eslint_enabled: bool,
) -> Vec<CheckKind> {
    let ext = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("");
    let mut checks = Vec::new();
    match ext {
        "js" | "mjs" | "cjs" => checks.push(CheckKind::NodeSyntax),
        "py" => checks.push(CheckKind::PyCompile),
        _ => {}
    }
    if matches!(ext, "ts" | "tsx" | "js" | "jsx") && eslint_config_present && eslint_enabled {
        checks.push(CheckKind::Eslint);
    }
    checks
}

/// Whether a flat or legacy ESLint config file exists in the workspace root.
#[must_use]
pub fn eslint_config_present(root: &Path) -> bool {
    [
        "eslint.config.js",
        "eslint.config.mjs",
        "eslint.config.cjs",
        ".eslintrc",
        ".eslintrc.json",
        ".eslintrc.js",
        ".eslintrc.cjs",
        ".eslintrc.yaml",
        ".eslintrc.yml",
    ]
    .iter()
    .any(|name| root.join(name).exists())
}

/// Run a configured review command (`review.tools` maps extension →
/// command line; the file path is appended). Same contract as [`run_check`].
pub async fn run_review_command(command: &str, root: &Path, file: &str) -> Option<String> {
    let mut parts = command.split_whitespace();
    let program = parts.next()?;
    let mut args: Vec<&str> = parts.collect();
    let abs = root.join(file);
    let abs_str = abs.to_string_lossy().into_owned();
    args.push(&abs_str);

    let output = match run_program(program, &args, root).await {
        Ok(output) => output,
        Err(e) => {
            debug!(program, error = %e, "review binary unavailable, skipping");
            return None;
        }
    };
    if output.exit_code == 0 {
        return None;
    }
    let combined = format!("{}\n{}", output.stdout, output.stderr);
    Some(format!(
        "LINT_FAIL {}",
        json!({
            "file": file,
            "linter": program,
            "output": truncate_str(combined.trim(), OUTPUT_MAX_CHARS),
        })
    ))
}

/// Run one check. `Some` carries a ready-to-inject `LINT_FAIL` payload;
/// `None` means pass, skip, or missing binary.
pub async fn run_check(kind: CheckKind, root: &Path, file: &str) -> Option<String> {
    let abs = root.join(file);
    let abs_str = abs.to_string_lossy().into_owned();
    let result = match kind {
        CheckKind::NodeSyntax => run_program("node", &["--check", abs_str.as_str()], root).await,
        CheckKind::PyCompile => {
            run_program("python3", &["-m", "py_compile", abs_str.as_str()], root).await
        }
        CheckKind::Eslint => {
            run_program("npx", &["--no-install", "eslint", abs_str.as_str()], root).await
        }
    };

    let output = match result {
        Ok(output) => output,
        Err(e) => {
            debug!(linter = kind.linter(), error = %e, "check binary unavailable, skipping");
            return None;
        }
    };
    if output.exit_code == 0 {
        return None;
    }

    let mut combined = output.stdout;
    if !output.stderr.is_empty() {
        if !combined.is_empty() {
            combined.push('\n');
        }
        combined.push_str(&output.stderr);
    }
    Some(format!(
        "LINT_FAIL {}",
        json!({
            "file": file,
            "linter": kind.linter(),
            "output": truncate_str(combined.trim(), OUTPUT_MAX_CHARS),
        })
    ))
}

// ─────────────────────────────────────────────────────────────────────────────
// Subscriber
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct SessionCheckState {
    workspace: PathBuf,
    /// Last mutation target per tool, filled by `tool_call` and consumed by
    /// the matching `tool_result`.
    pending: HashMap<String, String>,
}

/// Watches mutations and feeds check failures back through the interrupt
/// queue.
pub struct AsyncCheckSubscriber {
    task: SubscriberTask,
}

impl AsyncCheckSubscriber {
    /// Subscribe to the bus. `eslint_enabled` comes from
    /// `runtime.checks.eslint.enabled`; `review` adds the configured
    /// per-extension review commands.
    #[must_use]
    pub fn attach(
        bus: &EventBus,
        store: Arc<SessionStore>,
        eslint_enabled: bool,
        review: ReviewConfig,
    ) -> Self {
        let state: Arc<Mutex<HashMap<String, SessionCheckState>>> =
            Arc::new(Mutex::new(HashMap::new()));
        let review = Arc::new(review);

        let task = SubscriberTask::spawn(bus, move |event| {
            let state = state.clone();
            let store = store.clone();
            let review = review.clone();
            async move {
                handle_event(&state, &store, eslint_enabled, &review, event);
            }
        });
        Self { task }
    }

    /// Wait until all published events were observed (the checks themselves
    /// stay in the interrupt queues).
    pub async fn flush(&self) {
        self.task.caught_up().await;
    }
}

fn handle_event(
    state: &Mutex<HashMap<String, SessionCheckState>>,
    store: &SessionStore,
    eslint_enabled: bool,
    review: &ReviewConfig,
    event: AgentEvent,
) {
    match event {
        AgentEvent::Start {
            session_id,
            workspace,
            ..
        }
        | AgentEvent::SessionResume {
            session_id,
            workspace,
            ..
        } => {
            let _ = state.lock().insert(
                session_id,
                SessionCheckState {
                    workspace: workspace.into(),
                    pending: HashMap::new(),
                },
            );
        }
        AgentEvent::SessionEnd { session_id } => {
            let _ = state.lock().remove(&session_id);
        }
        AgentEvent::ToolCall {
            session_id,
            tool,
            input,
            ..
        } if is_mutation_tool(&tool) => {
            if let Some(path) = input.get("path").and_then(serde_json::Value::as_str) {
                if let Some(session_state) = state.lock().get_mut(&session_id) {
                    let _ = session_state.pending.insert(tool, path.to_owned());
                }
            }
        }
        AgentEvent::ToolResult {
            session_id,
            tool,
            ok,
            ..
        } if is_mutation_tool(&tool) => {
            let (root, path) = {
                let mut guard = state.lock();
                let Some(session_state) = guard.get_mut(&session_id) else {
                    return;
                };
                let Some(path) = session_state.pending.remove(&tool) else {
                    return;
                };
                (session_state.workspace.clone(), path)
            };
            if !ok {
                return;
            }

            let Ok(id) = Uuid::parse_str(&session_id) else {
                return;
            };
            let Some(interrupts) = store.interrupts_for(id) else {
                return;
            };

            let config_present = eslint_config_present(&root);
            for kind in select_checks(&path, config_present, eslint_enabled) {
                let root = root.clone();
                let path = path.clone();
                debug!(session_id = %session_id, file = %path, linter = kind.linter(), "check enqueued");
                interrupts.enqueue(async move { run_check(kind, &root, &path).await });
            }

            if review.enabled {
                let ext = Path::new(&path)
                    .extension()
                    .and_then(|e| e.to_str())
                    .unwrap_or("");
                if let Some(command) = review.tools.get(ext).cloned() {
                    let root = root.clone();
                    let path = path.clone();
                    interrupts
                        .enqueue(async move { run_review_command(&command, &root, &path).await });
                }
            }
        }
        _ => {}
    }
}

fn is_mutation_tool(tool: &str) -> bool {
    tool == "write_file" || tool == "apply_patch"
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selection_by_extension() {
        assert_eq!(select_checks("a.py", false, true), vec![CheckKind::PyCompile]);
        assert_eq!(select_checks("a.mjs", false, true), vec![CheckKind::NodeSyntax]);
        assert_eq!(select_checks("a.rs", true, true), Vec::<CheckKind>::new());
        assert_eq!(select_checks("Makefile", true, true), Vec::<CheckKind>::new());
    }

    #[test]
    fn eslint_needs_config_and_enablement() {
        assert_eq!(select_checks("a.ts", false, true), Vec::<CheckKind>::new());
        assert_eq!(select_checks("a.ts", true, false), Vec::<CheckKind>::new());
        assert_eq!(select_checks("a.ts", true, true), vec![CheckKind::Eslint]);
        // .js gets the syntax check plus ESLint when configured
        assert_eq!(
            select_checks("a.js", true, true),
            vec![CheckKind::NodeSyntax, CheckKind::Eslint]
        );
    }

    #[test]
    fn eslint_config_detection() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!eslint_config_present(dir.path()));
        std::fs::write(dir.path().join("eslint.config.js"), "export default []").unwrap();
        assert!(eslint_config_present(dir.path()));
    }

    #[test]
    fn linter_names() {
        assert_eq!(CheckKind::NodeSyntax.linter(), "node");
        assert_eq!(CheckKind::PyCompile.linter(), "python");
        assert_eq!(CheckKind::Eslint.linter(), "eslint");
    }

    #[tokio::test]
    async fn py_compile_failure_produces_lint_fail() {
        let dir = tempfile::tempdir().unwrap();
        if run_program("python3", &["--version"], dir.path()).await.is_err() {
            return; // interpreter unavailable in this environment
        }
        std::fs::write(dir.path().join("bad.py"), "def broken(:\n").unwrap();

        let payload = run_check(CheckKind::PyCompile, dir.path(), "bad.py")
            .await
            .expect("compile check should fail");
        assert!(payload.starts_with("LINT_FAIL {"));
        let body: serde_json::Value =
            serde_json::from_str(payload.strip_prefix("LINT_FAIL ").unwrap()).unwrap();
        assert_eq!(body["file"], "bad.py");
        assert_eq!(body["linter"], "python");
        assert!(!body["output"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn review_command_reports_failure() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("doc.txt"), "content").unwrap();
        // `false` exits 1 regardless of the file argument
        let payload = run_review_command("false", dir.path(), "doc.txt").await;
        if let Some(payload) = payload {
            assert!(payload.starts_with("LINT_FAIL"));
            assert!(payload.contains("doc.txt"));
        }
        // `true` exits 0: no finding
        assert!(run_review_command("true", dir.path(), "doc.txt").await.is_none());
    }

    #[tokio::test]
    async fn py_compile_pass_is_none() {
        let dir = tempfile::tempdir().unwrap();
        if run_program("python3", &["--version"], dir.path()).await.is_err() {
            return;
        }
        std::fs::write(dir.path().join("ok.py"), "x = 1\n").unwrap();
        assert!(run_check(CheckKind::PyCompile, dir.path(), "ok.py").await.is_none());
    }

    #[tokio::test]
    async fn gate_enqueues_interrupt_for_failed_check() {
        let dir = tempfile::tempdir().unwrap();
        if run_program("python3", &["--version"], dir.path()).await.is_err() {
            return;
        }

        let store = Arc::new(SessionStore::new());
        let bus = EventBus::new();
        let config = myclaw_settings::Config {
            workspace: dir.path().to_string_lossy().into_owned(),
            home_dir: dir.path().join("home").to_string_lossy().into_owned(),
            ..myclaw_settings::Config::default()
        };
        let id = store.create_session(&config, &bus).unwrap();
        let subscriber =
            AsyncCheckSubscriber::attach(&bus, store.clone(), true, ReviewConfig::default());

        // Re-announce the session so the subscriber (attached late) learns
        // its workspace, then simulate a bad write.
        let _ = bus.publish(AgentEvent::Start {
            session_id: id.to_string(),
            workspace: dir.path().to_string_lossy().into_owned(),
            log_path: String::new(),
        });
        std::fs::write(dir.path().join("bad.py"), "def broken(:\n").unwrap();
        let mut input = serde_json::Map::new();
        let _ = input.insert("path".into(), serde_json::json!("bad.py"));
        let _ = bus.publish(AgentEvent::ToolCall {
            session_id: id.to_string(),
            step: 1,
            tool: "write_file".into(),
            input,
        });
        let _ = bus.publish(AgentEvent::ToolResult {
            session_id: id.to_string(),
            step: 1,
            tool: "write_file".into(),
            ok: true,
            output: "wrote".into(),
        });
        subscriber.flush().await;

        let interrupts = store.interrupts_for(id).unwrap();
        let payloads = interrupts.flush().await;
        assert_eq!(payloads.len(), 1);
        assert!(payloads[0].starts_with("LINT_FAIL"));
        assert!(payloads[0].contains("bad.py"));
    }

    #[tokio::test]
    async fn failed_mutation_enqueues_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(SessionStore::new());
        let bus = EventBus::new();
        let config = myclaw_settings::Config {
            workspace: dir.path().to_string_lossy().into_owned(),
            home_dir: dir.path().join("home").to_string_lossy().into_owned(),
            ..myclaw_settings::Config::default()
        };
        let id = store.create_session(&config, &bus).unwrap();
        let subscriber =
            AsyncCheckSubscriber::attach(&bus, store.clone(), true, ReviewConfig::default());

        let _ = bus.publish(AgentEvent::Start {
            session_id: id.to_string(),
            workspace: dir.path().to_string_lossy().into_owned(),
            log_path: String::new(),
        });
        let mut input = serde_json::Map::new();
        let _ = input.insert("path".into(), serde_json::json!("bad.py"));
        let _ = bus.publish(AgentEvent::ToolCall {
            session_id: id.to_string(),
            step: 1,
            tool: "write_file".into(),
            input,
        });
        let _ = bus.publish(AgentEvent::ToolResult {
            session_id: id.to_string(),
            step: 1,
            tool: "write_file".into(),
            ok: false,
            output: "must be read_file first".into(),
        });
        subscriber.flush().await;

        let interrupts = store.interrupts_for(id).unwrap();
        assert_eq!(interrupts.pending(), 0);
        assert!(interrupts.drain().is_empty());
    }
}
