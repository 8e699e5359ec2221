//! # myclaw-llm
//!
//! LLM provider contract and implementations for the myclaw agent: the
//! [`Provider`] trait, the mock and scripted providers, OpenAI-compatible
//! and Anthropic clients, and the inline tool-call fallback parser.

#![deny(unsafe_code)]

pub mod anthropic;
pub mod mock;
pub mod openai;
pub mod parsing;
pub mod provider;
pub mod retry;

pub use anthropic::{AnthropicConfig, AnthropicProvider};
pub use mock::{MockProvider, ScriptedProvider};
pub use openai::{OpenAiConfig, OpenAiProvider};
pub use provider::{ChatReply, Provider, ProviderError, ProviderResult, EMPTY_RESPONSE_SENTINEL};
