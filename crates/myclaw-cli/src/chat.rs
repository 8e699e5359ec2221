//! Interactive chat: a rustyline loop over one live session, with
//! slash-commands for history, summaries, and session switching.

use anyhow::{Context, Result};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use uuid::Uuid;

use myclaw_core::messages::Role;
use myclaw_runtime::{list_for_workspace, pick_session, Runtime};
use myclaw_settings::Config;

use crate::approval::TerminalApproval;

const HELP: &str = "\
/help              show this help
/exit, /quit       leave the chat
/clear             close this session and start a fresh one
/history [n]       show the last n messages (default 10)
/config            show the effective configuration
/session           show the current session
/summary [n]       show the last n summary blocks (default 3)
/sessions [n]      list persisted sessions for this workspace (default 10)
/use <id|i|latest> switch to a persisted session";

/// `myclaw chat [--resume <spec>]`.
pub async fn chat(config: Config, resume: Option<&str>) -> Result<()> {
    let runtime = Runtime::new(config);
    let mut session_id = match resume {
        Some(spec) => resume_by_spec(&runtime, spec)?,
        None => runtime.create_session()?,
    };
    println!("session {session_id} — /help for commands");

    let mut editor = DefaultEditor::new()?;
    let approval = TerminalApproval;

    loop {
        match editor.readline("myclaw> ") {
            Ok(line) => {
                let line = line.trim().to_owned();
                if line.is_empty() {
                    continue;
                }
                let _ = editor.add_history_entry(&line);

                if let Some(command) = line.strip_prefix('/') {
                    if !handle_slash(&runtime, &mut session_id, command).await? {
                        break;
                    }
                    continue;
                }

                match runtime.run_turn(session_id, &line, Some(&approval)).await {
                    Ok(text) => println!("{text}"),
                    Err(e) => eprintln!("turn failed: {e}"),
                }
            }
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e).context("readline failed"),
        }
    }

    let _ = runtime.close_session(session_id);
    runtime.flush().await;
    Ok(())
}

fn resume_by_spec(runtime: &Runtime, spec: &str) -> Result<Uuid> {
    let workspace = effective_workspace(&runtime.config)?;
    let listing = list_for_workspace(&runtime.config.sessions_dir(), &workspace)?;
    let summary = pick_session(&listing, spec)
        .with_context(|| format!("no persisted session matches {spec:?}"))?;
    Ok(runtime.resume(&summary.session_id)?)
}

fn effective_workspace(config: &Config) -> Result<String> {
    if config.workspace.is_empty() {
        Ok(std::env::current_dir()?.to_string_lossy().into_owned())
    } else {
        Ok(config.workspace.clone())
    }
}

/// Returns `false` when the chat should exit.
async fn handle_slash(runtime: &Runtime, session_id: &mut Uuid, command: &str) -> Result<bool> {
    let mut parts = command.split_whitespace();
    let name = parts.next().unwrap_or("");
    let arg = parts.next();

    match name {
        "help" => println!("{HELP}"),
        "exit" | "quit" => return Ok(false),
        "clear" => {
            let _ = runtime.close_session(*session_id);
            *session_id = runtime.create_session()?;
            println!("new session {session_id}");
        }
        "history" => {
            let count = arg.and_then(|a| a.parse().ok()).unwrap_or(10usize);
            let shared = runtime.store.get(*session_id)?;
            let session = shared.lock().await;
            let start = session.messages.len().saturating_sub(count);
            for message in &session.messages[start..] {
                let role = match message.role {
                    Role::System => "system",
                    Role::User => "user",
                    Role::Assistant => "assistant",
                    Role::Tool => "tool",
                };
                println!(
                    "[{role}] {}",
                    myclaw_core::text::truncate_with_suffix(&message.content, 160, "…")
                );
            }
        }
        "config" => println!("{}", serde_json::to_string_pretty(&runtime.config)?),
        "session" => {
            let shared = runtime.store.get(*session_id)?;
            let session = shared.lock().await;
            println!(
                "session {} — {} messages, {} summaries, workspace {}",
                session.id,
                session.messages.len(),
                session.summaries.len(),
                session.workspace.root().display()
            );
        }
        "summary" => {
            let count = arg.and_then(|a| a.parse().ok()).unwrap_or(3usize);
            let shared = runtime.store.get(*session_id)?;
            let session = shared.lock().await;
            if session.summaries.is_empty() {
                println!("(no summaries yet)");
            }
            let start = session.summaries.len().saturating_sub(count);
            for block in &session.summaries[start..] {
                println!("[{}-{}] {}", block.from, block.to, block.content);
            }
        }
        "sessions" => {
            let count = arg.and_then(|a| a.parse().ok()).unwrap_or(10usize);
            let workspace = effective_workspace(&runtime.config)?;
            let listing = list_for_workspace(&runtime.config.sessions_dir(), &workspace)?;
            if listing.is_empty() {
                println!("(no persisted sessions)");
            }
            for (index, summary) in listing.iter().take(count).enumerate() {
                println!(
                    "{}. {} — {} messages, updated {}",
                    index + 1,
                    summary.session_id,
                    summary.message_count,
                    summary.last_updated_at.as_deref().unwrap_or("unknown")
                );
            }
        }
        "use" => match arg {
            Some(spec) => match resume_by_spec(runtime, spec) {
                Ok(id) => {
                    let _ = runtime.close_session(*session_id);
                    *session_id = id;
                    println!("switched to session {id}");
                }
                Err(e) => eprintln!("{e}"),
            },
            None => eprintln!("usage: /use <id|index|latest>"),
        },
        other => eprintln!("unknown command: /{other} (try /help)"),
    }
    Ok(true)
}
