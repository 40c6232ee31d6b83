//! Provider-agnostic LLM capability trait.
//!
//! Three backends implement this against their native APIs. The active one is
//! resolved once at startup and threaded through constructors as an
//! `Arc<dyn LlmProvider>` — substitutable in tests, no hidden global.

use async_trait::async_trait;

use crate::error::LlmError;

/// Default max tokens for plain generation.
pub const DEFAULT_MAX_TOKENS: u32 = 500;

/// Max tokens for structured (JSON) generation.
pub const JSON_MAX_TOKENS: u32 = 1000;

/// A text generation request.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub prompt: String,
    pub system_prompt: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl GenerateRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system_prompt: None,
            temperature: 0.7,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    pub fn with_system_prompt(mut self, system: impl Into<String>) -> Self {
        self.system_prompt = Some(system.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// Capability set every LLM backend offers.
///
/// `embed` is optional in practice: a backend without a native embeddings API
/// returns `LlmError::Unsupported`, and the FAQ matcher must be configured
/// against a backend that supports it.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Backend name for logs and audit records.
    fn name(&self) -> &'static str;

    /// Generate a plain-text completion.
    async fn generate(&self, request: GenerateRequest) -> Result<String, LlmError>;

    /// Generate a structured JSON document.
    ///
    /// The default implementation appends a JSON-only instruction to the
    /// system prompt and parses the text output. Output that does not parse
    /// as a JSON object is `LlmError::InvalidResponse` — never a silent
    /// default; callers decide their own fallback.
    async fn generate_json(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        temperature: f32,
    ) -> Result<serde_json::Value, LlmError> {
        let system = match system_prompt {
            Some(s) => format!("{s}\n\nRespond with valid JSON only."),
            None => "Respond with valid JSON only.".to_string(),
        };

        let text = self
            .generate(
                GenerateRequest::new(prompt)
                    .with_system_prompt(system)
                    .with_temperature(temperature)
                    .with_max_tokens(JSON_MAX_TOKENS),
            )
            .await?;

        parse_json_response(self.name(), &text)
    }

    /// Compute an embedding vector for the given text.
    ///
    /// Dimensionality is fixed per backend (e.g. 1536 for OpenAI).
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError>;
}

/// Parse a JSON document out of model output, stripping Markdown code fences.
///
/// Models frequently wrap JSON in ```json fences even when told not to.
pub(crate) fn parse_json_response(
    provider: &str,
    text: &str,
) -> Result<serde_json::Value, LlmError> {
    let trimmed = strip_code_fences(text.trim());
    let value: serde_json::Value =
        serde_json::from_str(trimmed).map_err(|e| LlmError::InvalidResponse {
            provider: provider.to_string(),
            reason: format!("output is not valid JSON: {e}"),
        })?;
    if !value.is_object() {
        return Err(LlmError::InvalidResponse {
            provider: provider.to_string(),
            reason: "output is JSON but not an object".to_string(),
        });
    }
    Ok(value)
}

fn strip_code_fences(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the language tag on the opening fence line.
    let rest = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    rest.strip_suffix("```").map(str::trim).unwrap_or(rest).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_bare_json() {
        let value = parse_json_response("test", r#"{"ok": true}"#).unwrap();
        assert_eq!(value["ok"], true);
    }

    #[test]
    fn parse_fenced_json() {
        let text = "```json\n{\"category\": \"spam\"}\n```";
        let value = parse_json_response("test", text).unwrap();
        assert_eq!(value["category"], "spam");
    }

    #[test]
    fn parse_fenced_json_no_language_tag() {
        let text = "```\n{\"a\": 1}\n```";
        let value = parse_json_response("test", text).unwrap();
        assert_eq!(value["a"], 1);
    }

    #[test]
    fn parse_rejects_non_json() {
        let err = parse_json_response("test", "sure, here you go!").unwrap_err();
        assert!(matches!(err, LlmError::InvalidResponse { .. }));
    }

    #[test]
    fn parse_rejects_json_array() {
        let err = parse_json_response("test", "[1, 2, 3]").unwrap_err();
        assert!(matches!(err, LlmError::InvalidResponse { .. }));
    }

    #[test]
    fn generate_request_builder() {
        let req = GenerateRequest::new("hello")
            .with_system_prompt("be brief")
            .with_temperature(0.3)
            .with_max_tokens(64);
        assert_eq!(req.prompt, "hello");
        assert_eq!(req.system_prompt.as_deref(), Some("be brief"));
        assert_eq!(req.temperature, 0.3);
        assert_eq!(req.max_tokens, 64);
    }
}
