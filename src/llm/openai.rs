//! OpenAI backend — chat completions and embeddings.

use async_trait::async_trait;
use serde_json::json;

use crate::error::LlmError;
use crate::llm::provider::{
    parse_json_response, GenerateRequest, LlmProvider, JSON_MAX_TOKENS,
};

const API_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// OpenAI provider. Embeddings are 1536-dimensional.
pub struct OpenAiProvider {
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl OpenAiProvider {
    pub fn new(api_key: String, model: Option<String>) -> Self {
        Self {
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            client: crate::llm::http_client(),
        }
    }

    /// POST to the chat completions endpoint and extract the first choice.
    async fn chat(&self, body: serde_json::Value) -> Result<String, LlmError> {
        let response = self
            .client
            .post(format!("{API_BASE}/chat/completions"))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| request_failed(e.to_string()))?;

        let data = check_status(response).await?;
        data["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.trim().to_string())
            .ok_or_else(|| LlmError::InvalidResponse {
                provider: "openai".to_string(),
                reason: "response has no message content".to_string(),
            })
    }

    fn messages(request: &GenerateRequest) -> Vec<serde_json::Value> {
        let mut messages = Vec::with_capacity(2);
        if let Some(ref system) = request.system_prompt {
            messages.push(json!({"role": "system", "content": system}));
        }
        messages.push(json!({"role": "user", "content": request.prompt}));
        messages
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn generate(&self, request: GenerateRequest) -> Result<String, LlmError> {
        let body = json!({
            "model": self.model,
            "messages": Self::messages(&request),
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
        });
        self.chat(body).await
    }

    /// Uses the native `json_object` response format instead of prompt-only
    /// steering — the API then guarantees parseable output.
    async fn generate_json(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        temperature: f32,
    ) -> Result<serde_json::Value, LlmError> {
        let request = GenerateRequest {
            prompt: prompt.to_string(),
            system_prompt: system_prompt.map(String::from),
            temperature,
            max_tokens: JSON_MAX_TOKENS,
        };
        let body = json!({
            "model": self.model,
            "messages": Self::messages(&request),
            "temperature": temperature,
            "max_tokens": JSON_MAX_TOKENS,
            "response_format": {"type": "json_object"},
        });
        let text = self.chat(body).await?;
        parse_json_response(self.name(), &text)
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        let body = json!({
            "model": EMBEDDING_MODEL,
            "input": text,
        });

        let response = self
            .client
            .post(format!("{API_BASE}/embeddings"))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| request_failed(e.to_string()))?;

        let data = check_status(response).await?;
        let values = data["data"][0]["embedding"].as_array().ok_or_else(|| {
            LlmError::InvalidResponse {
                provider: "openai".to_string(),
                reason: "response has no embedding array".to_string(),
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
        provider: "openai".to_string(),
        reason,
    }
}

/// Check the HTTP status and parse the response body as JSON.
async fn check_status(response: reqwest::Response) -> Result<serde_json::Value, LlmError> {
    let status = response.status();
    if status == reqwest::StatusCode::UNAUTHORIZED {
        return Err(LlmError::AuthFailed {
            provider: "openai".to_string(),
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
