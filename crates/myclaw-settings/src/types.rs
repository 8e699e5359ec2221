//! Configuration types with compiled defaults.
//!
//! Every field has a serde default so a partial config file deep-merges
//! cleanly over the compiled defaults.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Which provider backs new sessions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Deterministic echo, no network.
    #[default]
    Mock,
    /// OpenAI-compatible chat completions.
    Openai,
    /// Anthropic messages API.
    Anthropic,
}

impl ProviderKind {
    /// Parse from a config/env string.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "mock" => Some(Self::Mock),
            "openai" => Some(Self::Openai),
            "anthropic" => Some(Self::Anthropic),
            _ => None,
        }
    }
}

/// Per-check enablement.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EslintCheck {
    /// Whether the ESLint soft gate runs at all.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for EslintCheck {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Background check configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChecksConfig {
    /// ESLint gate.
    #[serde(default)]
    pub eslint: EslintCheck,
}

/// Turn-loop runtime options.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeOptions {
    /// Per-attempt model timeout in milliseconds (> 0).
    #[serde(default = "default_model_timeout_ms")]
    pub model_timeout_ms: u64,
    /// Model retries on timeout/transport error (> 0).
    #[serde(default = "default_model_retry_count")]
    pub model_retry_count: u32,
    /// Model↔tool iterations per turn.
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,
    /// Non-system messages admitted into a model request.
    #[serde(default = "default_context_window_size")]
    pub context_window_size: usize,
    /// Background checks.
    #[serde(default)]
    pub checks: ChecksConfig,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            model_timeout_ms: default_model_timeout_ms(),
            model_retry_count: default_model_retry_count(),
            max_steps: default_max_steps(),
            context_window_size: default_context_window_size(),
            checks: ChecksConfig::default(),
        }
    }
}

/// Review-tool configuration (extension → command line).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewConfig {
    /// Whether review commands run.
    #[serde(default)]
    pub enabled: bool,
    /// Mapping of file extension to review command.
    #[serde(default)]
    pub tools: HashMap<String, String>,
}

/// Effective agent configuration. Immutable once loaded.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Provider selection.
    #[serde(default)]
    pub provider: ProviderKind,
    /// Model ID; empty means the provider default.
    #[serde(default)]
    pub model: String,
    /// OpenAI-compatible base URL; empty means the provider default.
    #[serde(default)]
    pub base_url: String,
    /// Workspace root; empty means the current directory.
    #[serde(default)]
    pub workspace: String,
    /// State directory; empty means `~/.myclaw`.
    #[serde(default)]
    pub home_dir: String,
    /// Durable memory file; empty means `<home>/memory.md`.
    #[serde(default)]
    pub memory_file: String,
    /// Turn-loop runtime options.
    #[serde(default)]
    pub runtime: RuntimeOptions,
    /// Review-tool configuration.
    #[serde(default)]
    pub review: ReviewConfig,
}

impl Config {
    /// Resolved state directory.
    #[must_use]
    pub fn home_dir(&self) -> PathBuf {
        if !self.home_dir.is_empty() {
            return PathBuf::from(&self.home_dir);
        }
        crate::loader::default_home_dir()
    }

    /// Resolved memory file path.
    #[must_use]
    pub fn memory_file(&self) -> PathBuf {
        if !self.memory_file.is_empty() {
            return PathBuf::from(&self.memory_file);
        }
        self.home_dir().join("memory.md")
    }

    /// Session log directory.
    #[must_use]
    pub fn sessions_dir(&self) -> PathBuf {
        self.home_dir().join("sessions")
    }

    /// Metrics log directory.
    #[must_use]
    pub fn metrics_dir(&self) -> PathBuf {
        self.home_dir().join("metrics")
    }

    /// User-profile document path.
    #[must_use]
    pub fn profile_path(&self) -> PathBuf {
        self.home_dir().join("user-profile.json")
    }
}

fn default_true() -> bool {
    true
}
fn default_model_timeout_ms() -> u64 {
    45_000
}
fn default_model_retry_count() -> u32 {
    1
}
fn default_max_steps() -> u32 {
    8
}
fn default_context_window_size() -> usize {
    20
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let config = Config::default();
        assert_eq!(config.provider, ProviderKind::Mock);
        assert_eq!(config.runtime.model_timeout_ms, 45_000);
        assert_eq!(config.runtime.model_retry_count, 1);
        assert_eq!(config.runtime.max_steps, 8);
        assert_eq!(config.runtime.context_window_size, 20);
        assert!(config.runtime.checks.eslint.enabled);
        assert!(!config.review.enabled);
    }

    #[test]
    fn provider_kind_parse() {
        assert_eq!(ProviderKind::parse("mock"), Some(ProviderKind::Mock));
        assert_eq!(ProviderKind::parse("OpenAI"), Some(ProviderKind::Openai));
        assert_eq!(
            ProviderKind::parse("anthropic"),
            Some(ProviderKind::Anthropic)
        );
        assert_eq!(ProviderKind::parse("gemini"), None);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"provider": "openai", "runtime": {"maxSteps": 3}}"#).unwrap();
        assert_eq!(config.provider, ProviderKind::Openai);
        assert_eq!(config.runtime.max_steps, 3);
        assert_eq!(config.runtime.model_timeout_ms, 45_000);
    }

    #[test]
    fn derived_paths() {
        let config = Config {
            home_dir: "/tmp/claw-home".into(),
            ..Config::default()
        };
        assert_eq!(
            config.sessions_dir(),
            PathBuf::from("/tmp/claw-home/sessions")
        );
        assert_eq!(config.metrics_dir(), PathBuf::from("/tmp/claw-home/metrics"));
        assert_eq!(
            config.memory_file(),
            PathBuf::from("/tmp/claw-home/memory.md")
        );
        assert_eq!(
            config.profile_path(),
            PathBuf::from("/tmp/claw-home/user-profile.json")
        );
    }

    #[test]
    fn explicit_memory_file_wins() {
        let config = Config {
            memory_file: "/elsewhere/mem.md".into(),
            ..Config::default()
        };
        assert_eq!(config.memory_file(), PathBuf::from("/elsewhere/mem.md"));
    }

    #[test]
    fn config_serde_roundtrip() {
        let config = Config {
            provider: ProviderKind::Anthropic,
            model: "claude-test".into(),
            ..Config::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let back: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(config, back);
    }
}
