//! User-profile learning subscriber.
//!
//! Extracts heuristic signals from user messages and summaries and merges
//! them into one durable JSON profile. The document is version 2; legacy v1
//! entry lists are migrated on read, keeping only the latest exit focus.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use myclaw_core::events::AgentEvent;
use myclaw_core::messages::Role;
use myclaw_core::text::{one_line, truncate_str};

use crate::bus::EventBus;
use crate::subscribers::{now_ts, SubscriberTask};

const MAX_PREFERENCES: usize = 20;
const MAX_LANGUAGES: usize = 10;
const FOCUS_MAX_CHARS: usize = 200;

// ─────────────────────────────────────────────────────────────────────────────
// Document model
// ─────────────────────────────────────────────────────────────────────────────

/// Detected execution environment.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Environment {
    /// Operating system.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub os: Option<String>,
    /// Interactive shell.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shell: Option<String>,
    /// Package manager.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package_manager: Option<String>,
    /// Node.js version.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_version: Option<String>,
}

/// The durable profile body.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StableProfile {
    /// Preferred natural language.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_language: Option<String>,
    /// Programming languages seen in conversation.
    pub coding_languages: Vec<String>,
    /// Environment facts.
    pub environment: Environment,
    /// Stated stylistic preferences.
    pub preferences: Vec<String>,
    /// What the user worked on most recently.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recent_focus: Option<String>,
    /// Last workspace root.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_workspace: Option<String>,
}

/// The on-disk document (`user-profile.json`).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileDocument {
    /// Schema version (2).
    pub version: u32,
    /// RFC 3339 write timestamp.
    pub updated_at: String,
    /// The profile body.
    pub stable_profile: StableProfile,
}

impl Default for ProfileDocument {
    fn default() -> Self {
        Self {
            version: 2,
            updated_at: String::new(),
            stable_profile: StableProfile::default(),
        }
    }
}

/// Read the profile, migrating v1 documents.
///
/// A v1 document is `{version:1, entries:[{kind, content, ...}]}`; only the
/// latest `exit_focus` entry survives migration.
#[must_use]
pub fn load_profile(path: &Path) -> ProfileDocument {
    let Ok(content) = std::fs::read_to_string(path) else {
        return ProfileDocument::default();
    };
    let Ok(value) = serde_json::from_str::<serde_json::Value>(&content) else {
        return ProfileDocument::default();
    };

    match value.get("version").and_then(serde_json::Value::as_u64) {
        Some(2) => serde_json::from_value(value).unwrap_or_default(),
        Some(1) => {
            let recent_focus = value
                .get("entries")
                .and_then(serde_json::Value::as_array)
                .and_then(|entries| {
                    entries
                        .iter()
                        .rev()
                        .find(|e| e.get("kind").and_then(serde_json::Value::as_str) == Some("exit_focus"))
                })
                .and_then(|e| e.get("content").and_then(serde_json::Value::as_str))
                .map(str::to_owned);
            ProfileDocument {
                stable_profile: StableProfile {
                    recent_focus,
                    ..StableProfile::default()
                },
                ..ProfileDocument::default()
            }
        }
        _ => ProfileDocument::default(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Heuristics
// ─────────────────────────────────────────────────────────────────────────────

fn regex(pattern: &str) -> Regex {
    Regex::new(pattern).expect("static pattern")
}

/// Extract profile signals from one user text.
#[must_use]
pub fn extract_signals(text: &str) -> StableProfile {
    static OS: OnceLock<Vec<(Regex, &str)>> = OnceLock::new();
    static SHELL: OnceLock<Regex> = OnceLock::new();
    static PACKAGE_MANAGER: OnceLock<Regex> = OnceLock::new();
    static NODE: OnceLock<Regex> = OnceLock::new();
    static LANGUAGES: OnceLock<Vec<(Regex, &str)>> = OnceLock::new();

    let os_patterns = OS.get_or_init(|| {
        vec![
            (regex(r"(?i)\b(macos|mac os|os x|osx)\b"), "macos"),
            (regex(r"(?i)\bwindows\b"), "windows"),
            (regex(r"(?i)\b(linux|ubuntu|debian|fedora|arch)\b"), "linux"),
        ]
    });
    let shell_pattern = SHELL.get_or_init(|| regex(r"(?i)\b(zsh|bash|fish|powershell)\b"));
    let pm_pattern =
        PACKAGE_MANAGER.get_or_init(|| regex(r"(?i)\b(pnpm|npm|yarn|bun|cargo|pip|poetry)\b"));
    let node_pattern = NODE.get_or_init(|| regex(r"(?i)\bnode(?:\.js)?\s*v?(\d+(?:\.\d+)*)"));
    let language_patterns = LANGUAGES.get_or_init(|| {
        vec![
            (regex(r"(?i)\brust\b|\.rs\b"), "rust"),
            (regex(r"(?i)\bpython\b|\.py\b"), "python"),
            (regex(r"(?i)\btypescript\b|\.tsx?\b"), "typescript"),
            (regex(r"(?i)\bjavascript\b|\.[mc]?jsx?\b"), "javascript"),
            (regex(r"(?i)\bgolang\b|\bgo\s+module\b|\.go\b"), "go"),
            (regex(r"(?i)\bjava\b"), "java"),
            (regex(r"(?i)\bc\+\+\b|\.cpp\b"), "cpp"),
        ]
    });

    let mut profile = StableProfile {
        preferred_language: detect_natural_language(text),
        ..StableProfile::default()
    };

    for (pattern, os) in os_patterns {
        if pattern.is_match(text) {
            profile.environment.os = Some((*os).to_owned());
            break;
        }
    }
    if let Some(captures) = shell_pattern.captures(text) {
        profile.environment.shell = Some(captures[1].to_lowercase());
    }
    if let Some(captures) = pm_pattern.captures(text) {
        profile.environment.package_manager = Some(captures[1].to_lowercase());
    }
    if let Some(captures) = node_pattern.captures(text) {
        profile.environment.node_version = Some(format!("v{}", &captures[1]));
    }
    for (pattern, language) in language_patterns {
        if pattern.is_match(text) {
            profile.coding_languages.push((*language).to_owned());
        }
    }

    for sentence in text.split(['.', '!', '?', '\n']) {
        let lowered = sentence.to_lowercase();
        if lowered.contains("prefer")
            || lowered.contains("always use")
            || lowered.contains("never use")
        {
            let cleaned = truncate_str(&one_line(sentence), 140);
            if !cleaned.is_empty() {
                profile.preferences.push(cleaned);
            }
        }
    }

    profile
}

fn detect_natural_language(text: &str) -> Option<String> {
    let mut cjk = 0usize;
    let mut kana = 0usize;
    let mut hangul = 0usize;
    let mut cyrillic = 0usize;
    for c in text.chars() {
        match c {
            '\u{4E00}'..='\u{9FFF}' => cjk += 1,
            '\u{3040}'..='\u{30FF}' => kana += 1,
            '\u{AC00}'..='\u{D7AF}' => hangul += 1,
            '\u{0400}'..='\u{04FF}' => cyrillic += 1,
            _ => {}
        }
    }
    if kana > 5 {
        Some("ja".into())
    } else if hangul > 5 {
        Some("ko".into())
    } else if cjk > 5 {
        Some("zh".into())
    } else if cyrillic > 5 {
        Some("ru".into())
    } else {
        None
    }
}

/// Merge `incoming` signals into `target`.
pub fn merge_profile(target: &mut StableProfile, incoming: &StableProfile) {
    if incoming.preferred_language.is_some() {
        target.preferred_language.clone_from(&incoming.preferred_language);
    }
    for language in &incoming.coding_languages {
        if !target.coding_languages.contains(language)
            && target.coding_languages.len() < MAX_LANGUAGES
        {
            target.coding_languages.push(language.clone());
        }
    }
    let env = &incoming.environment;
    if env.os.is_some() {
        target.environment.os.clone_from(&env.os);
    }
    if env.shell.is_some() {
        target.environment.shell.clone_from(&env.shell);
    }
    if env.package_manager.is_some() {
        target.environment.package_manager.clone_from(&env.package_manager);
    }
    if env.node_version.is_some() {
        target.environment.node_version.clone_from(&env.node_version);
    }
    for preference in &incoming.preferences {
        if !target.preferences.contains(preference) && target.preferences.len() < MAX_PREFERENCES {
            target.preferences.push(preference.clone());
        }
    }
    if incoming.recent_focus.is_some() {
        target.recent_focus.clone_from(&incoming.recent_focus);
    }
    if incoming.last_workspace.is_some() {
        target.last_workspace.clone_from(&incoming.last_workspace);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Subscriber
// ─────────────────────────────────────────────────────────────────────────────

/// Accumulates signals per session and persists the merged profile on
/// `summary` and `session_end`.
pub struct UserProfileSubscriber {
    task: SubscriberTask,
}

impl UserProfileSubscriber {
    /// Subscribe to the bus, persisting to `profile_path`.
    #[must_use]
    pub fn attach(bus: &EventBus, profile_path: PathBuf) -> Self {
        let pending: Arc<Mutex<HashMap<String, StableProfile>>> =
            Arc::new(Mutex::new(HashMap::new()));

        let task = SubscriberTask::spawn(bus, move |event| {
            let pending = pending.clone();
            let profile_path = profile_path.clone();
            async move {
                handle_event(&pending, &profile_path, event);
            }
        });
        Self { task }
    }

    /// Wait until all published events were observed.
    pub async fn flush(&self) {
        self.task.caught_up().await;
    }
}

fn handle_event(
    pending: &Mutex<HashMap<String, StableProfile>>,
    profile_path: &Path,
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
            let mut guard = pending.lock();
            let entry = guard.entry(session_id).or_default();
            entry.last_workspace = Some(workspace);
        }
        AgentEvent::Message {
            session_id,
            message,
        } if message.role == Role::User => {
            let signals = extract_signals(&message.content);
            let mut guard = pending.lock();
            merge_profile(guard.entry(session_id).or_default(), &signals);
        }
        AgentEvent::Summary { session_id, block } => {
            let focus = truncate_str(&one_line(&block.content), FOCUS_MAX_CHARS);
            {
                let mut guard = pending.lock();
                let entry = guard.entry(session_id.clone()).or_default();
                entry.recent_focus = Some(focus);
            }
            persist(pending, profile_path, &session_id, false);
        }
        AgentEvent::SessionEnd { session_id } => {
            persist(pending, profile_path, &session_id, true);
        }
        _ => {}
    }
}

fn persist(
    pending: &Mutex<HashMap<String, StableProfile>>,
    profile_path: &Path,
    session_id: &str,
    remove: bool,
) {
    let accumulated = {
        let mut guard = pending.lock();
        if remove {
            guard.remove(session_id)
        } else {
            guard.get(session_id).cloned()
        }
    };
    let Some(accumulated) = accumulated else {
        return;
    };

    let mut document = load_profile(profile_path);
    merge_profile(&mut document.stable_profile, &accumulated);
    document.updated_at = now_ts();

    if let Some(parent) = profile_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    match serde_json::to_string_pretty(&document) {
        Ok(json) => {
            if let Err(e) = std::fs::write(profile_path, json) {
                warn!(path = %profile_path.display(), error = %e, "profile write failed");
            } else {
                debug!(path = %profile_path.display(), "profile updated");
            }
        }
        Err(e) => warn!(error = %e, "profile serialization failed"),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
