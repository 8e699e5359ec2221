//! Terminal approval prompt for destructive shell commands.

use async_trait::async_trait;

use myclaw_runtime::ApprovalHandler;

/// Asks on stderr and reads one line from stdin; anything but `y`/`yes`
/// denies.
pub struct TerminalApproval;

#[async_trait]
impl ApprovalHandler for TerminalApproval {
    async fn approve(&self, _session_id: &str, command: &str) -> bool {
        let prompt = format!("Allow destructive command `{command}`? [y/N] ");
        let answer = tokio::task::spawn_blocking(move || {
            eprint!("{prompt}");
            let mut line = String::new();
            match std::io::stdin().read_line(&mut line) {
                Ok(_) => line,
                Err(_) => String::new(),
            }
        })
        .await
        .unwrap_or_default();
        matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
    }
}
