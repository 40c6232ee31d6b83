//! Anthropic backend — Messages API.
//!
//! Anthropic has no native embeddings endpoint, so `embed` returns
//! `LlmError::Unsupported`. The FAQ matcher must run against OpenAI or
//! Gemini when this backend is selected.

use async_trait::async_trait;
use serde_json::json;

use crate::error::LlmError;
use crate::llm::provider::{GenerateRequest, LlmProvider};

const API_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";
const DEFAULT_MODEL: &str = "claude-3-5-sonnet-latest";

/// Anthropic provider.
pub struct AnthropicProvider {
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl AnthropicProvider {
    pub fn new(api_key: String, model: Option<String>) -> Self {
        Self {
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            client: crate::llm::http_client(),
        }
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    async fn generate(&self, request: GenerateRequest) -> Result<String, LlmError> {
        let mut body = json!({
            "model": self.model,
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
            "messages": [{"role": "user", "content": request.prompt}],
        });
        if let Some(ref system) = request.system_prompt {
            body["system"] = json!(system);
        }

        let response = self
            .client
            .post(API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| request_failed(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(LlmError::AuthFailed {
                provider: "anthropic".to_string(),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(request_failed(format!("HTTP {status}: {body}")));
        }

        let data: serde_json::Value = response
            .json()
            .await
            .map_err(|e| request_failed(format!("body parse failed: {e}")))?;

        data["content"][0]["text"]
            .as_str()
            .map(|s| s.trim().to_string())
            .ok_or_else(|| LlmError::InvalidResponse {
                provider: "anthropic".to_string(),
                reason: "response has no text content block".to_string(),
            })
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>, LlmError> {
        Err(LlmError::Unsupported {
            provider: "anthropic".to_string(),
            capability: "embeddings".to_string(),
        })
    }
}

fn request_failed(reason: String) -> LlmError {
    LlmError::RequestFailed {
        provider: "anthropic".to_string(),
        reason,
    }
}
