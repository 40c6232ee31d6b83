//! The triage orchestrator: moderation, FAQ matching, mentor routing, in
//! that order, with the first stage that produces an outward effect winning.

use std::sync::Arc;

use tracing::{error, info};

use crate::config::Settings;
use crate::error::PipelineError;
use crate::faq::FaqMatcher;
use crate::llm::LlmProvider;
use crate::moderation::ModerationStage;
use crate::pipeline::{InboundMessage, PipelineOutcome};
use crate::routing::{format_mentor_mentions, RoutingEngine};
use crate::store::{MemberProfile, Store};

/// Runs every non-elevated message through the three triage stages.
pub struct TriagePipeline {
    settings: Settings,
    store: Arc<dyn Store>,
    moderation: ModerationStage,
    faq: FaqMatcher,
    routing: RoutingEngine,
}

impl TriagePipeline {
    pub fn new(llm: Arc<dyn LlmProvider>, store: Arc<dyn Store>, settings: Settings) -> Self {
        let moderation = ModerationStage::new(
            llm.clone(),
            store.clone(),
            settings.moderation_threshold,
        );
        let faq = FaqMatcher::new(llm.clone(), store.clone(), settings.faq_threshold);
        let routing = RoutingEngine::new(llm, store.clone(), settings.mentor_domains.clone());
        Self {
            settings,
            store,
            moderation,
            faq,
            routing,
        }
    }

    /// Record a member who joined without sending anything yet.
    ///
    /// Role flags come from configuration, same as on a message.
    pub async fn register_member(
        &self,
        platform_user_id: i64,
        username: Option<String>,
        first_name: Option<String>,
        last_name: Option<String>,
    ) -> Result<(), PipelineError> {
        let profile = MemberProfile {
            platform_id: platform_user_id,
            username,
            first_name,
            last_name,
            is_admin: self.settings.is_admin(platform_user_id),
            is_mentor: self.settings.is_mentor(platform_user_id),
        };
        let member = self.store.upsert_member(&profile).await?;
        info!(member = member.platform_id, "Member joined");
        Ok(())
    }

    /// Process one inbound message and decide the transport's next action.
    ///
    /// Roles are recomputed from configuration on every message, so a
    /// demoted admin loses the bypass on their next message. Every message
    /// is stored before any stage runs; elevated senders then skip all
    /// stages, leaving no audit rows.
    pub async fn process(
        &self,
        inbound: &InboundMessage,
    ) -> Result<PipelineOutcome, PipelineError> {
        let profile = MemberProfile {
            platform_id: inbound.platform_user_id,
            username: inbound.username.clone(),
            first_name: inbound.first_name.clone(),
            last_name: inbound.last_name.clone(),
            is_admin: self.settings.is_admin(inbound.platform_user_id),
            is_mentor: self.settings.is_mentor(inbound.platform_user_id),
        };
        let member = self.store.upsert_member(&profile).await?;

        let message = self
            .store
            .insert_message(member.id, inbound.platform_message_id, &inbound.text)
            .await?;

        if member.is_elevated() {
            info!(member = member.platform_id, "Elevated sender, skipping triage");
            return Ok(PipelineOutcome::Skipped);
        }

        // Stage 1: moderation. A provider failure fails open — the message
        // stands and no later stage runs on an unmoderated message's behalf.
        match self
            .moderation
            .check(&inbound.text, &member, Some(message.id))
            .await
        {
            Ok(verdict) => {
                if self.moderation.should_delete(&verdict) {
                    self.store
                        .mark_message_deleted(message.id, &verdict.reason)
                        .await?;
                    info!(
                        member = member.platform_id,
                        category = verdict.category.as_str(),
                        "Message flagged for deletion"
                    );
                    return Ok(PipelineOutcome::Deleted {
                        category: verdict.category.as_str().to_string(),
                        confidence: verdict.confidence,
                        reason: verdict.reason,
                    });
                }
            }
            Err(e) => {
                error!(error = %e, "Moderation unavailable, leaving message in place");
                return Ok(PipelineOutcome::NoAction);
            }
        }

        // Stage 2: FAQ matching. Degrades internally to None.
        if let Some(faq_match) = self.faq.find_match(&inbound.text).await {
            return Ok(PipelineOutcome::FaqReply {
                text: format!(
                    "💡 FAQ Match\n\nQ: {}\n\nA: {}",
                    faq_match.entry.question, faq_match.entry.answer
                ),
                similarity: faq_match.similarity,
            });
        }

        // Stage 3: mentor routing. Degrades internally to "page nobody".
        let decision = self.routing.analyze(&inbound.text).await;
        if !decision.should_tag_mentors {
            return Ok(PipelineOutcome::NoAction);
        }

        let mentors = self.routing.resolve_mentors(&decision.domains).await?;
        if mentors.is_empty() {
            return Ok(PipelineOutcome::NoAction);
        }

        self.routing
            .tag_mentors(message.id, &mentors, &decision.reason)
            .await?;

        Ok(PipelineOutcome::MentorsPaged {
            mention_text: format_mentor_mentions(&mentors, &decision.domains),
            mentor_count: mentors.len(),
        })
    }
}
