//! Configuration loaded from environment variables.
//!
//! `Settings::from_env()` reads and validates everything at startup. Invalid
//! or missing required settings are a fatal `ConfigError` — the process never
//! starts with a half-valid configuration.

use std::collections::HashMap;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::llm::LlmBackend;

/// Default moderation confidence threshold.
const DEFAULT_MODERATION_THRESHOLD: f32 = 0.7;

/// Default FAQ similarity threshold.
const DEFAULT_FAQ_THRESHOLD: f32 = 0.85;

/// Validated application settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Telegram Bot API token.
    pub bot_token: SecretString,
    /// Selected LLM backend.
    pub llm_backend: LlmBackend,
    /// API key for the selected backend.
    pub llm_api_key: SecretString,
    /// Model name override (each backend has a default).
    pub llm_model: Option<String>,
    /// Platform user ids with admin rights.
    pub admin_ids: Vec<i64>,
    /// Expertise domain → mentor platform ids.
    pub mentor_domains: HashMap<String, Vec<i64>>,
    /// Delete only when moderation confidence reaches this value.
    pub moderation_threshold: f32,
    /// Minimum cosine similarity for a FAQ match.
    pub faq_threshold: f32,
    /// Path to the libSQL database file.
    pub db_path: String,
}

impl Settings {
    /// Load settings from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let bot_token = require_env("TELEGRAM_BOT_TOKEN")?;

        let backend_name =
            std::env::var("LLM_PROVIDER").unwrap_or_else(|_| "openai".to_string());
        let llm_backend = parse_backend(&backend_name)?;
        let llm_api_key = require_env(api_key_var(llm_backend))?;
        let llm_model = std::env::var("LLM_MODEL").ok();

        let admin_ids = parse_id_list(&require_env("ADMIN_IDS")?)?;

        let mentor_domains = match std::env::var("MENTOR_DOMAINS") {
            Ok(raw) => parse_mentor_domains(&raw)?,
            Err(_) => HashMap::new(),
        };

        let moderation_threshold = parse_threshold(
            "MODERATION_CONFIDENCE_THRESHOLD",
            DEFAULT_MODERATION_THRESHOLD,
        )?;
        let faq_threshold = parse_threshold("FAQ_SIMILARITY_THRESHOLD", DEFAULT_FAQ_THRESHOLD)?;

        let db_path =
            std::env::var("TRIAGE_DB_PATH").unwrap_or_else(|_| "./data/triage-bot.db".to_string());

        Ok(Self {
            bot_token: SecretString::from(bot_token),
            llm_backend,
            llm_api_key: SecretString::from(llm_api_key),
            llm_model,
            admin_ids,
            mentor_domains,
            moderation_threshold,
            faq_threshold,
            db_path,
        })
    }

    /// Whether a platform user id is an admin.
    pub fn is_admin(&self, platform_id: i64) -> bool {
        self.admin_ids.contains(&platform_id)
    }

    /// Whether a platform user id appears in any mentor domain.
    pub fn is_mentor(&self, platform_id: i64) -> bool {
        self.mentor_domains
            .values()
            .any(|ids| ids.contains(&platform_id))
    }
}

fn require_env(key: &str) -> Result<String, ConfigError> {
    match std::env::var(key) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ConfigError::MissingEnvVar(key.to_string())),
    }
}

/// Environment variable holding the API key for a backend.
fn api_key_var(backend: LlmBackend) -> &'static str {
    match backend {
        LlmBackend::OpenAi => "OPENAI_API_KEY",
        LlmBackend::Anthropic => "ANTHROPIC_API_KEY",
        LlmBackend::Gemini => "GOOGLE_API_KEY",
    }
}

fn parse_backend(name: &str) -> Result<LlmBackend, ConfigError> {
    match name.to_lowercase().as_str() {
        "openai" => Ok(LlmBackend::OpenAi),
        "anthropic" | "claude" => Ok(LlmBackend::Anthropic),
        "gemini" => Ok(LlmBackend::Gemini),
        other => Err(ConfigError::InvalidValue {
            key: "LLM_PROVIDER".to_string(),
            message: format!("unknown provider '{other}' (expected openai, anthropic, or gemini)"),
        }),
    }
}

/// Parse a comma-separated list of platform ids.
fn parse_id_list(raw: &str) -> Result<Vec<i64>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i64>().map_err(|_| ConfigError::InvalidValue {
                key: "ADMIN_IDS".to_string(),
                message: format!("'{s}' is not a valid platform id"),
            })
        })
        .collect()
}

/// Parse the JSON domain → mentor ids mapping.
fn parse_mentor_domains(raw: &str) -> Result<HashMap<String, Vec<i64>>, ConfigError> {
    serde_json::from_str(raw).map_err(|e| ConfigError::InvalidValue {
        key: "MENTOR_DOMAINS".to_string(),
        message: format!("expected a JSON object of domain to id list: {e}"),
    })
}

/// Parse a threshold env var, enforcing the [0, 1] range.
fn parse_threshold(key: &str, default: f32) -> Result<f32, ConfigError> {
    let value = match std::env::var(key) {
        Ok(raw) => raw.parse::<f32>().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("'{raw}' is not a number"),
        })?,
        Err(_) => default,
    };
    if !(0.0..=1.0).contains(&value) {
        return Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("{value} is outside [0, 1]"),
        });
    }
    Ok(value)
}
