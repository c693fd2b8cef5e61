//! Generative model providers used to extract search terms from documents.
//!
//! - [`LlmProvider`]: the completion contract
//! - [`ClaudeProvider`]: Anthropic Messages API
//! - [`MockLlmProvider`]: canned responses for tests
//!
//! [`create_llm_provider`] builds a provider from [`LlmConfig`].

#![doc = include_str!("../README.md")]

mod claude;
mod mock;
mod provider;

use std::sync::Arc;

use kbase_core::{Error, LlmConfig, Result};

pub use claude::ClaudeProvider;
pub use mock::MockLlmProvider;
pub use provider::{
    CompletionRequest, CompletionResponse, DEFAULT_MAX_TOKENS, LlmProvider, Message, Role,
    StopReason, TokenUsage,
};

/// Environment variable consulted when `llm.api_key` is unset.
pub const API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

/// Build the provider named by `config.provider`.
///
/// Supported providers: `"claude"` and `"mock"`. The mock answers with an
/// empty term list, which is only useful for wiring tests.
pub fn create_llm_provider(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>> {
    match config.provider.as_str() {
        "claude" => {
            let api_key = config
                .api_key
                .clone()
                .or_else(|| std::env::var(API_KEY_ENV).ok())
                .ok_or_else(|| {
                    Error::config(format!(
                        "llm.api_key is not set and {API_KEY_ENV} is not in the environment"
                    ))
                })?;
            let mut provider = ClaudeProvider::new(api_key, &config.model);
            if let Some(base_url) = &config.base_url {
                provider = provider.with_base_url(base_url);
            }
            log::debug!("using claude provider with model {}", config.model);
            Ok(Arc::new(provider))
        }
        "mock" => Ok(Arc::new(MockLlmProvider::with_terms(Vec::<String>::new()))),
        other => Err(Error::config(format!("Unknown LLM provider: {other}"))),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_create_claude_with_explicit_key() {
        let config = LlmConfig {
            api_key: Some("k".to_string()),
            ..LlmConfig::default()
        };
        let provider = create_llm_provider(&config).unwrap();
        assert_eq!(provider.name(), "claude");
    }

    #[test]
    fn test_create_mock() {
        let config = LlmConfig {
            provider: "mock".to_string(),
            ..LlmConfig::default()
        };
        assert_eq!(create_llm_provider(&config).unwrap().name(), "mock");
    }

    #[test]
    fn test_unknown_provider() {
        let config = LlmConfig {
            provider: "nope".to_string(),
            ..LlmConfig::default()
        };
        let err = create_llm_provider(&config).err().unwrap();
        assert!(matches!(err, Error::Config(_)));
    }
}
