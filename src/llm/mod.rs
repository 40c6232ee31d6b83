//! LLM integration.
//!
//! Supports:
//! - **OpenAI**: chat completions + `text-embedding-3-small`
//! - **Anthropic**: Messages API (no embeddings)
//! - **Gemini**: `generateContent` + `embedContent`
//!
//! All three talk to their REST APIs directly over reqwest and implement the
//! `LlmProvider` trait. The active backend is selected by configuration and
//! constructed exactly once at startup.

mod anthropic;
mod gemini;
mod openai;
pub mod provider;

pub use anthropic::AnthropicProvider;
pub use gemini::GeminiProvider;
pub use openai::OpenAiProvider;
pub use provider::{GenerateRequest, LlmProvider};

use std::sync::Arc;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};

use crate::error::LlmError;

/// Bound on any single provider HTTP call. A hung request becomes a
/// `RequestFailed` instead of stalling that message's pipeline forever.
pub(crate) const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Supported LLM backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmBackend {
    OpenAi,
    Anthropic,
    Gemini,
}

/// Configuration for creating an LLM provider.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub backend: LlmBackend,
    pub api_key: SecretString,
    /// Model override; each backend has a sensible default.
    pub model: Option<String>,
}

/// Create the active LLM provider from configuration.
pub fn create_provider(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>, LlmError> {
    let api_key = config.api_key.expose_secret().to_string();
    let provider: Arc<dyn LlmProvider> = match config.backend {
        LlmBackend::OpenAi => Arc::new(OpenAiProvider::new(api_key, config.model.clone())),
        LlmBackend::Anthropic => Arc::new(AnthropicProvider::new(api_key, config.model.clone())),
        LlmBackend::Gemini => Arc::new(GeminiProvider::new(api_key, config.model.clone())),
    };
    tracing::info!(provider = provider.name(), "LLM provider initialized");
    Ok(provider)
}

/// Build the shared HTTP client all backends use.
pub(crate) fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_provider_each_backend() {
        for (backend, name) in [
            (LlmBackend::OpenAi, "openai"),
            (LlmBackend::Anthropic, "anthropic"),
            (LlmBackend::Gemini, "gemini"),
        ] {
            let config = LlmConfig {
                backend,
                api_key: SecretString::from("test-key"),
                model: None,
            };
            let provider = create_provider(&config).unwrap();
            assert_eq!(provider.name(), name);
        }
    }

    #[tokio::test]
    async fn anthropic_embed_is_unsupported() {
        let config = LlmConfig {
            backend: LlmBackend::Anthropic,
            api_key: SecretString::from("test-key"),
            model: None,
        };
        let provider = create_provider(&config).unwrap();
        let err = provider.embed("some text").await.unwrap_err();
        assert!(matches!(err, LlmError::Unsupported { .. }));
    }
}
