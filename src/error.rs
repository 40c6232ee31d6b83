//! Error types for the triage bot.

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Moderation error: {0}")]
    Moderation(#[from] ModerationError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),
}

/// Configuration-related errors. Fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Missing required configuration: {key}. {hint}")]
    MissingRequired { key: String, hint: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Channel-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Channel {name} failed to start: {reason}")]
    StartupFailed { name: String, reason: String },

    #[error("Failed to send on channel {name}: {reason}")]
    SendFailed { name: String, reason: String },

    #[error("Failed to delete message {message_id} on channel {name}: {reason}")]
    DeleteFailed {
        name: String,
        message_id: i64,
        reason: String,
    },
}

/// LLM provider errors.
///
/// Every transport or parse failure from a backend is wrapped here with the
/// original message preserved. This layer never retries; retry policy, if
/// any, belongs to the caller.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Provider {provider} does not support {capability}")]
    Unsupported {
        provider: String,
        capability: String,
    },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },
}

/// Moderation check errors — a provider failure during moderation.
///
/// When this surfaces, the stage has made no deletion decision. The caller
/// decides whether the unmoderated message stands (it does; fail-open).
#[derive(Debug, thiserror::Error)]
pub enum ModerationError {
    #[error("Moderation check failed: {0}")]
    CheckFailed(#[from] LlmError),
}

/// Pipeline-level errors. Stage failures that the pipeline tolerates
/// (moderation outage, FAQ degrade) never surface here; only persistence
/// failures abort a run.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

/// Result type alias for the bot.
pub type Result<T> = std::result::Result<T, Error>;
