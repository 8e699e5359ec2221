//! Provider construction from the effective configuration.
//!
//! API keys come from the environment at session-creation time, so a missing
//! key fails before the loop starts (error taxonomy: fatal misconfiguration).

use std::sync::Arc;

use myclaw_llm::{
    anthropic, openai, AnthropicConfig, AnthropicProvider, MockProvider, OpenAiConfig,
    OpenAiProvider, Provider,
};
use myclaw_settings::{Config, ProviderKind};

use crate::errors::Result;

const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
const DEFAULT_ANTHROPIC_MODEL: &str = "claude-sonnet-4-20250514";

/// Build the provider selected by `config`.
pub fn build_provider(config: &Config) -> Result<Arc<dyn Provider>> {
    match config.provider {
        ProviderKind::Mock => Ok(Arc::new(MockProvider)),
        ProviderKind::Openai => {
            let provider = OpenAiProvider::new(OpenAiConfig {
                model: non_empty_or(&config.model, DEFAULT_OPENAI_MODEL),
                base_url: non_empty_or(&config.base_url, openai::DEFAULT_BASE_URL),
                api_key: read_key("OPENAI_API_KEY"),
                timeout_ms: config.runtime.model_timeout_ms,
                retry_count: config.runtime.model_retry_count,
            })?;
            Ok(Arc::new(provider))
        }
        ProviderKind::Anthropic => {
            let provider = AnthropicProvider::new(AnthropicConfig {
                model: non_empty_or(&config.model, DEFAULT_ANTHROPIC_MODEL),
                base_url: non_empty_or(&config.base_url, anthropic::DEFAULT_BASE_URL),
                api_key: read_key("ANTHROPIC_API_KEY"),
                timeout_ms: config.runtime.model_timeout_ms,
                retry_count: config.runtime.model_retry_count,
            })?;
            Ok(Arc::new(provider))
        }
    }
}

fn non_empty_or(value: &str, default: &str) -> String {
    if value.is_empty() {
        default.to_owned()
    } else {
        value.to_owned()
    }
}

fn read_key(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use myclaw_llm::ProviderError;

    #[test]
    fn mock_provider_needs_no_key() {
        let config = Config::default();
        let provider = build_provider(&config).unwrap();
        assert_eq!(provider.name(), "mock");
    }

    #[test]
    fn openai_without_key_is_fatal() {
        std::env::remove_var("OPENAI_API_KEY");
        let config = Config {
            provider: ProviderKind::Openai,
            ..Config::default()
        };
        let err = build_provider(&config).unwrap_err();
        assert!(matches!(
            err,
            crate::errors::RuntimeError::Provider(ProviderError::MissingApiKey { .. })
        ));
    }

    #[test]
    fn non_empty_or_prefers_value() {
        assert_eq!(non_empty_or("m", "d"), "m");
        assert_eq!(non_empty_or("", "d"), "d");
    }
}
