//! Mentor routing engine — decides whether a question warrants paging
//! mentors and resolves expertise domains to member records.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::llm::LlmProvider;
use crate::prompts;
use crate::store::{Member, MentorTag, Store};

/// Routing calls tolerate a little more variance than moderation.
const ROUTING_TEMPERATURE: f32 = 0.5;

/// Question complexity assigned by the analyst.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Complexity {
    Simple,
    Moderate,
    Complex,
    /// Analysis failed — no claim is made.
    Unknown,
}

impl Complexity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::Moderate => "moderate",
            Self::Complex => "complex",
            Self::Unknown => "unknown",
        }
    }

    fn parse(s: &str) -> Self {
        match s {
            "simple" => Self::Simple,
            "complex" => Self::Complex,
            _ => Self::Moderate,
        }
    }
}

/// Result of routing analysis.
#[derive(Debug, Clone)]
pub struct RoutingDecision {
    pub complexity: Complexity,
    pub domains: Vec<String>,
    pub should_tag_mentors: bool,
    pub reason: String,
    pub suggested_mentors: Vec<String>,
}

impl RoutingDecision {
    /// Safe default when analysis fails: page nobody, carry the reason.
    fn degraded(reason: String) -> Self {
        Self {
            complexity: Complexity::Unknown,
            domains: Vec::new(),
            should_tag_mentors: false,
            reason,
            suggested_mentors: Vec::new(),
        }
    }

    fn from_response(response: &serde_json::Value) -> Self {
        let string_list = |value: &serde_json::Value| -> Vec<String> {
            value
                .as_array()
                .map(|items| {
                    items
                        .iter()
                        .filter_map(|v| v.as_str())
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default()
        };

        Self {
            complexity: Complexity::parse(response["complexity"].as_str().unwrap_or("moderate")),
            domains: string_list(&response["domains"]),
            should_tag_mentors: response["should_tag_mentors"].as_bool().unwrap_or(false),
            reason: response["reason"]
                .as_str()
                .unwrap_or("No specific reason")
                .to_string(),
            suggested_mentors: string_list(&response["suggested_mentors"]),
        }
    }
}

/// Routes questions to mentors based on LLM analysis and the configured
/// domain → mentor mapping.
pub struct RoutingEngine {
    llm: Arc<dyn LlmProvider>,
    store: Arc<dyn Store>,
    mentor_domains: HashMap<String, Vec<i64>>,
}

impl RoutingEngine {
    pub fn new(
        llm: Arc<dyn LlmProvider>,
        store: Arc<dyn Store>,
        mentor_domains: HashMap<String, Vec<i64>>,
    ) -> Self {
        Self {
            llm,
            store,
            mentor_domains,
        }
    }

    /// Analyze a question and decide whether mentors should be paged.
    ///
    /// Never fails: a provider error degrades to "do not page anyone" with
    /// the failure reason embedded in the decision.
    pub async fn analyze(&self, question: &str) -> RoutingDecision {
        let (user_prompt, system_prompt) = prompts::routing_prompts(question, &self.mentor_domains);

        let response = match self
            .llm
            .generate_json(&user_prompt, Some(&system_prompt), ROUTING_TEMPERATURE)
            .await
        {
            Ok(r) => r,
            Err(e) => {
                error!(error = %e, "Routing analysis failed");
                return RoutingDecision::degraded(format!("Analysis failed: {e}"));
            }
        };

        let decision = RoutingDecision::from_response(&response);
        info!(
            complexity = decision.complexity.as_str(),
            should_tag = decision.should_tag_mentors,
            domains = ?decision.domains,
            "Routing analysis"
        );
        decision
    }

    /// Resolve requested domains to mentor member records.
    ///
    /// Unions the configured mentor id sets per domain (a mentor covering
    /// two requested domains appears once), then filters to members the
    /// store currently flags `is_mentor` — a configured mentor who never
    /// joined is not paged.
    pub async fn resolve_mentors(&self, domains: &[String]) -> Result<Vec<Member>, DatabaseError> {
        let mut ids: Vec<i64> = Vec::new();
        for domain in domains {
            if let Some(domain_ids) = self.mentor_domains.get(domain) {
                for id in domain_ids {
                    if !ids.contains(id) {
                        ids.push(*id);
                    }
                }
            }
        }

        if ids.is_empty() {
            warn!(?domains, "No mentors configured for requested domains");
            return Ok(Vec::new());
        }

        let mentors = self.store.mentors_by_platform_ids(&ids).await?;
        info!(count = mentors.len(), ?domains, "Resolved mentors");
        Ok(mentors)
    }

    /// Record one MentorTag per paged mentor. Recording only — the outward
    /// mention message is the orchestrator's job.
    pub async fn tag_mentors(
        &self,
        message_id: Uuid,
        mentors: &[Member],
        reason: &str,
    ) -> Result<Vec<MentorTag>, DatabaseError> {
        let mut tags = Vec::with_capacity(mentors.len());
        for mentor in mentors {
            tags.push(
                self.store
                    .insert_mentor_tag(message_id, mentor.id, reason)
                    .await?,
            );
        }
        info!(count = tags.len(), message = %message_id, "Tagged mentors");
        Ok(tags)
    }
}

/// Build the visible mention text for paged mentors.
pub fn format_mentor_mentions(mentors: &[Member], domains: &[String]) -> String {
    if mentors.is_empty() {
        return String::new();
    }

    let domain_str = if domains.is_empty() {
        "this question".to_string()
    } else {
        domains.join(", ")
    };

    let mentions: Vec<String> = mentors
        .iter()
        .map(|m| match m.username {
            Some(ref username) => format!("@{username}"),
            None => format!("[Mentor](tg://user?id={})", m.platform_id),
        })
        .collect();

    format!(
        "🔔 This looks like a {domain_str} question. Tagging mentors: {}",
        mentions.join(" ")
    )
}
