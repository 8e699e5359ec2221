//! Configuration loading: defaults, deep-merged config file, env overrides.
//!
//! Merge order is env > `<home>/config.json` > compiled defaults, and
//! empty-string values are treated as unset at every layer. `<home>/.env` is
//! loaded before the local `.env`; neither overwrites variables already in
//! the process environment.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::{Result, SettingsError};
use crate::types::{Config, ProviderKind};

/// Resolve the default state directory (`$MYCLAW_HOME` or `~/.myclaw`).
#[must_use]
pub fn default_home_dir() -> PathBuf {
    if let Some(dir) = read_env("MYCLAW_HOME") {
        return PathBuf::from(dir);
    }
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
    PathBuf::from(home).join(".myclaw")
}

/// Load the effective configuration.
///
/// Reads `<home>/.env` then `./.env`, deep-merges `<home>/config.json` over
/// the defaults, then applies environment overrides.
pub fn load() -> Result<Config> {
    let home = default_home_dir();
    load_env_file(&home.join(".env"));
    load_env_file(Path::new(".env"));
    let config = load_from_path(&home.join("config.json"))?;
    Ok(config)
}

/// Load from an explicit config-file path (missing file → defaults).
pub fn load_from_path(path: &Path) -> Result<Config> {
    let defaults = serde_json::to_value(Config::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading config file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "config file not found, using defaults");
        defaults
    };

    let mut config: Config = serde_json::from_value(merged)?;
    apply_env_overrides(&mut config);

    if config.runtime.model_timeout_ms == 0 {
        return Err(SettingsError::Invalid(
            "runtime.modelTimeoutMs must be > 0".into(),
        ));
    }
    if config.runtime.model_retry_count == 0 {
        return Err(SettingsError::Invalid(
            "runtime.modelRetryCount must be > 0".into(),
        ));
    }
    Ok(config)
}

/// Recursive deep merge of two JSON values.
///
/// Objects merge per-key; arrays and primitives are replaced by the source;
/// nulls and empty strings in the source preserve the target.
#[must_use]
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                if matches!(&source_val, Value::String(s) if s.is_empty()) {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply environment overrides (highest priority; empty values ignored).
pub fn apply_env_overrides(config: &mut Config) {
    if let Some(kind) = read_env("MYCLAW_PROVIDER").and_then(|v| ProviderKind::parse(&v)) {
        config.provider = kind;
    }
    // Env model beats the config-file model, same as every other option.
    match config.provider {
        ProviderKind::Anthropic => {
            if let Some(v) = read_env("ANTHROPIC_MODEL") {
                config.model = v;
            }
        }
        ProviderKind::Openai | ProviderKind::Mock => {
            if let Some(v) = read_env("OPENAI_MODEL") {
                config.model = v;
            }
        }
    }
    if let Some(v) = read_env("OPENAI_BASE_URL") {
        config.base_url = v;
    }
    if let Some(v) = read_env("MYCLAW_WORKSPACE") {
        config.workspace = v;
    }
    if let Some(v) = read_env("MYCLAW_HOME") {
        config.home_dir = v;
    }
    if let Some(v) = read_env_u64("MYCLAW_MODEL_TIMEOUT_MS", 1, 3_600_000) {
        config.runtime.model_timeout_ms = v;
    }
    if let Some(v) = read_env_u64("MYCLAW_MODEL_RETRY_COUNT", 1, 100) {
        #[allow(clippy::cast_possible_truncation)]
        {
            config.runtime.model_retry_count = v as u32;
        }
    }
    if let Some(v) = read_env_u64("MYCLAW_MAX_STEPS", 1, 1_000) {
        #[allow(clippy::cast_possible_truncation)]
        {
            config.runtime.max_steps = v as u32;
        }
    }
    if let Some(v) = read_env_u64("MYCLAW_CONTEXT_WINDOW", 1, 10_000) {
        #[allow(clippy::cast_possible_truncation)]
        {
            config.runtime.context_window_size = v as usize;
        }
    }
    if let Some(v) = read_env("MYCLAW_ESLINT_ENABLED").and_then(|v| parse_bool(&v)) {
        config.runtime.checks.eslint.enabled = v;
    }
}

/// Load a dotenv-style file into the process environment.
///
/// `KEY=VALUE` lines; `#` comments and blanks skipped; single/double quotes
/// around the value stripped. Existing variables are never overwritten.
pub fn load_env_file(path: &Path) {
    let Ok(content) = std::fs::read_to_string(path) else {
        return;
    };
    debug!(?path, "loading env file");
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        let value = value.trim().trim_matches('"').trim_matches('\'');
        if key.is_empty() || std::env::var_os(key).is_some() {
            continue;
        }
        std::env::set_var(key, value);
    }
}

/// Parse a boolean env value.
#[must_use]
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn read_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn read_env_u64(name: &str, min: u64, max: u64) -> Option<u64> {
    let value = read_env(name)?;
    let parsed: u64 = value.parse().ok()?;
    if parsed < min || parsed > max {
        tracing::warn!(key = name, value = %value, "env value out of range, ignoring");
        return None;
    }
    Some(parsed)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
