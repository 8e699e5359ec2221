//! Shell execution with the fixed `exit_code=N` result framing.
//!
//! Prefers the user's interactive shell (`$SHELL`); on Windows the system
//! command processor (`%COMSPEC%`, falling back to `cmd`); otherwise
//! `/bin/sh`.

use std::path::Path;

use tracing::debug;

use crate::errors::WorkspaceError;

/// Raw output of a subprocess.
#[derive(Clone, Debug)]
pub struct ShellOutput {
    /// Process exit code (-1 when terminated by signal).
    pub exit_code: i32,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

/// Run `program` with `args` in `cwd`, capturing both streams.
pub async fn run_program(
    program: &str,
    args: &[&str],
    cwd: &Path,
) -> Result<ShellOutput, WorkspaceError> {
    debug!(program, ?args, cwd = %cwd.display(), "spawning process");
    let output = tokio::process::Command::new(program)
        .args(args)
        .current_dir(cwd)
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        .output()
        .await?;

    Ok(ShellOutput {
        exit_code: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

/// Run a command line through the platform shell and frame the result.
///
/// The returned string always starts with `exit_code=N\n`, followed by
/// stdout then stderr; an empty stream renders as `(no output)`.
pub async fn run_shell(command: &str, cwd: &Path) -> Result<String, WorkspaceError> {
    let (program, flag) = select_shell();
    let output = run_program(&program, &[flag.as_str(), command], cwd).await?;
    Ok(frame_output(&output))
}

fn select_shell() -> (String, String) {
    if cfg!(windows) {
        let comspec = std::env::var("COMSPEC")
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| "cmd".into());
        (comspec, "/C".into())
    } else {
        let shell = std::env::var("SHELL")
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| "/bin/sh".into());
        (shell, "-c".into())
    }
}

fn frame_output(output: &ShellOutput) -> String {
    let stdout = non_empty(&output.stdout);
    let stderr = non_empty(&output.stderr);
    format!("exit_code={}\n{stdout}\n{stderr}", output.exit_code)
}

fn non_empty(stream: &str) -> &str {
    let trimmed = stream.trim_end_matches('\n');
    if trimmed.is_empty() {
        "(no output)"
    } else {
        trimmed
    }
}
