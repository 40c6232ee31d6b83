//! Gemini backend — `generateContent` and `embedContent`.

use async_trait::async_trait;
use serde_json::json;

use crate::error::LlmError;
use crate::llm::provider::{GenerateRequest, LlmProvider};

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "gemini-1.5-flash";
const EMBEDDING_MODEL: &str = "text-embedding-004";

/// Gemini provider. Embeddings are 768-dimensional.
pub struct GeminiProvider {
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl GeminiProvider {
    pub fn new(api_key: String, model: Option<String>) -> Self {
        Self {
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            client: crate::llm::http_client(),
        }
    }

    async fn post(
        &self,
        url: String,
        body: serde_json::Value,
    ) -> Result<serde_json::Value, LlmError> {
        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| request_failed(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED
            || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(LlmError::AuthFailed {
                provider: "gemini".to_string(),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(request_failed(format!("HTTP {status}: {body}")));
        }

        response
            .json()
            .await
            .map_err(|e| request_failed(format!("body parse failed: {e}")))
    }
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    fn name(&self) -> &'static str {
        "gemini"
    }

    async fn generate(&self, request: GenerateRequest) -> Result<String, LlmError> {
        // Gemini has no separate system role on this endpoint; prepend it.
        let full_prompt = match request.system_prompt {
            Some(ref system) => format!("{system}\n\n{}", request.prompt),
            None => request.prompt.clone(),
        };

        let body = json!({
            "contents": [{"parts": [{"text": full_prompt}]}],
            "generationConfig": {
                "temperature": request.temperature,
                "maxOutputTokens": request.max_tokens,
            },
        });

        let url = format!("{API_BASE}/models/{}:generateContent", self.model);
        let data = self.post(url, body).await?;

        data["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .map(|s| s.trim().to_string())
            .ok_or_else(|| LlmError::InvalidResponse {
                provider: "gemini".to_string(),
                reason: "response has no candidate text".to_string(),
            })
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        let body = json!({
            "model": format!("models/{EMBEDDING_MODEL}"),
            "content": {"parts": [{"text": text}]},
        });

        let url = format!("{API_BASE}/models/{EMBEDDING_MODEL}:embedContent");
        let data = self.post(url, body).await?;

        let values = data["embedding"]["values"].as_array().ok_or_else(|| {
            LlmError::InvalidResponse {
                provider: "gemini".to_string(),
                reason: "response has no embedding values".to_string(),
            }
        })?;

        Ok(values
            .iter()
            .filter_map(|v| v.as_f64())
            .map(|v| v as f32)
            .collect())
    }
}

fn request_failed(reason: String) -> LlmError {
    LlmError::RequestFailed {
        provider: "gemini".to_string(),
        reason,
    }
}
