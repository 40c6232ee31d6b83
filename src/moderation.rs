//! Moderation stage — classifies messages as appropriate or not.
//!
//! Every check is persisted as an audit record before the caller acts on the
//! verdict (write-before-effect), so the trail stays consistent even if the
//! platform-side deletion subsequently fails.

use std::sync::Arc;

use tracing::{error, info};
use uuid::Uuid;

use crate::error::ModerationError;
use crate::llm::LlmProvider;
use crate::prompts;
use crate::store::{Member, ModerationAction, NewModerationRecord, Store};

/// Low temperature keeps classification variance down.
const MODERATION_TEMPERATURE: f32 = 0.3;

/// Message category assigned by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModerationCategory {
    Clean,
    Spam,
    JobPost,
    SuspiciousLink,
    Harmful,
}

impl ModerationCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Clean => "clean",
            Self::Spam => "spam",
            Self::JobPost => "job_post",
            Self::SuspiciousLink => "suspicious_link",
            Self::Harmful => "harmful",
        }
    }

    /// Unknown strings map to `Clean` — the conservative reading.
    fn parse(s: &str) -> Self {
        match s {
            "spam" => Self::Spam,
            "job_post" => Self::JobPost,
            "suspicious_link" => Self::SuspiciousLink,
            "harmful" => Self::Harmful,
            _ => Self::Clean,
        }
    }
}

/// Result of a content moderation check.
#[derive(Debug, Clone)]
pub struct ModerationVerdict {
    pub is_appropriate: bool,
    pub category: ModerationCategory,
    pub confidence: f32,
    pub reason: String,
}

impl ModerationVerdict {
    /// Parse the classifier's JSON output.
    ///
    /// Missing fields get conservative defaults — the system fails open
    /// toward false negatives rather than deleting on ambiguous output.
    fn from_response(response: &serde_json::Value) -> Self {
        Self {
            is_appropriate: response["is_appropriate"].as_bool().unwrap_or(true),
            category: ModerationCategory::parse(
                response["category"].as_str().unwrap_or("clean"),
            ),
            confidence: response["confidence"].as_f64().unwrap_or(0.5) as f32,
            reason: response["reason"]
                .as_str()
                .unwrap_or("No specific reason")
                .to_string(),
        }
    }
}

/// Content moderation backed by the LLM classifier.
pub struct ModerationStage {
    llm: Arc<dyn LlmProvider>,
    store: Arc<dyn Store>,
    threshold: f32,
}

impl ModerationStage {
    pub fn new(llm: Arc<dyn LlmProvider>, store: Arc<dyn Store>, threshold: f32) -> Self {
        Self {
            llm,
            store,
            threshold,
        }
    }

    /// Check a message and persist the audit record.
    ///
    /// A provider failure surfaces as `ModerationError` and no deletion
    /// decision is made — the caller decides what happens to the
    /// unmoderated message.
    pub async fn check(
        &self,
        text: &str,
        member: &Member,
        message_id: Option<Uuid>,
    ) -> Result<ModerationVerdict, ModerationError> {
        let response = self
            .llm
            .generate_json(
                &prompts::moderation_user_prompt(text),
                Some(prompts::MODERATION_SYSTEM_PROMPT),
                MODERATION_TEMPERATURE,
            )
            .await?;

        let verdict = ModerationVerdict::from_response(&response);

        self.log_check(text, member, message_id, &verdict).await;

        info!(
            member = member.platform_id,
            category = verdict.category.as_str(),
            confidence = verdict.confidence,
            "Moderation check"
        );

        Ok(verdict)
    }

    /// Deletion is a pure function of the verdict: inappropriate AND
    /// confident enough AND categorized as something other than clean.
    /// All three are required; `confidence == threshold` deletes.
    pub fn should_delete(&self, verdict: &ModerationVerdict) -> bool {
        !verdict.is_appropriate
            && verdict.confidence >= self.threshold
            && verdict.category != ModerationCategory::Clean
    }

    /// Persist the audit record. A failed write is logged and never blocks
    /// the check result.
    async fn log_check(
        &self,
        text: &str,
        member: &Member,
        message_id: Option<Uuid>,
        verdict: &ModerationVerdict,
    ) {
        let action = if verdict.is_appropriate {
            ModerationAction::Allowed
        } else {
            ModerationAction::Deleted
        };

        let record = NewModerationRecord {
            message_id,
            member_id: member.id,
            action,
            category: verdict.category.as_str().to_string(),
            confidence: verdict.confidence,
            message_text: Some(text.to_string()),
            provider: self.llm.name().to_string(),
        };

        if let Err(e) = self.store.insert_moderation_record(&record).await {
            error!(error = %e, "Failed to write moderation audit record");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{member_fixture, NullStore, ScriptedProvider};
    use serde_json::json;

    fn stage_with_threshold(threshold: f32) -> ModerationStage {
        ModerationStage::new(
            Arc::new(ScriptedProvider::default()),
            Arc::new(NullStore),
            threshold,
        )
    }

    fn verdict(appropriate: bool, category: ModerationCategory, confidence: f32) -> ModerationVerdict {
        ModerationVerdict {
            is_appropriate: appropriate,
            category,
            confidence,
            reason: String::new(),
        }
    }

    #[test]
    fn should_delete_requires_all_three_conditions() {
        let stage = stage_with_threshold(0.7);

        // All three hold.
        assert!(stage.should_delete(&verdict(false, ModerationCategory::Spam, 0.9)));
        // Appropriate — never delete, regardless of confidence.
        assert!(!stage.should_delete(&verdict(true, ModerationCategory::Spam, 0.99)));
        // Low confidence.
        assert!(!stage.should_delete(&verdict(false, ModerationCategory::Spam, 0.5)));
        // Clean category.
        assert!(!stage.should_delete(&verdict(false, ModerationCategory::Clean, 0.9)));
    }

    #[test]
    fn should_delete_threshold_boundary() {
        let stage = stage_with_threshold(0.7);
        assert!(stage.should_delete(&verdict(false, ModerationCategory::Harmful, 0.7)));
        assert!(!stage.should_delete(&verdict(false, ModerationCategory::Harmful, 0.7 - 1e-4)));
    }

    #[test]
    fn verdict_defaults_on_missing_fields() {
        let v = ModerationVerdict::from_response(&json!({}));
        assert!(v.is_appropriate);
        assert_eq!(v.category, ModerationCategory::Clean);
        assert_eq!(v.confidence, 0.5);
    }

    #[test]
    fn verdict_unknown_category_maps_to_clean() {
        let v = ModerationVerdict::from_response(&json!({
            "is_appropriate": false,
            "category": "weird_new_category",
            "confidence": 0.9,
        }));
        assert_eq!(v.category, ModerationCategory::Clean);
    }

    #[tokio::test]
    async fn check_parses_full_response() {
        let provider = ScriptedProvider::default().with_json(json!({
            "is_appropriate": false,
            "category": "spam",
            "confidence": 0.92,
            "reason": "crypto promotion",
        }));
        let stage = ModerationStage::new(Arc::new(provider), Arc::new(NullStore), 0.7);
        let member = member_fixture(1, false, false);

        let verdict = stage.check("buy my course", &member, None).await.unwrap();
        assert!(!verdict.is_appropriate);
        assert_eq!(verdict.category, ModerationCategory::Spam);
        assert!(stage.should_delete(&verdict));
    }

    #[tokio::test]
    async fn check_surfaces_provider_failure() {
        let provider = ScriptedProvider::failing();
        let stage = ModerationStage::new(Arc::new(provider), Arc::new(NullStore), 0.7);
        let member = member_fixture(1, false, false);

        let result = stage.check("anything", &member, None).await;
        assert!(matches!(result, Err(ModerationError::CheckFailed(_))));
    }
}
