//! Persisted entity types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A community member (student, mentor, or admin).
///
/// The platform id is unique and immutable after creation. Role flags are a
/// cache of configuration state, refreshed on every message — configuration
/// is the source of truth.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Member {
    pub id: Uuid,
    pub platform_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub is_admin: bool,
    pub is_mentor: bool,
    pub expertise_domains: Vec<String>,
    pub joined_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
}

impl Member {
    /// Admins and mentors bypass the triage pipeline entirely.
    pub fn is_elevated(&self) -> bool {
        self.is_admin || self.is_mentor
    }

    /// Best-effort display name for logs and mentions.
    pub fn display_name(&self) -> String {
        if let Some(ref username) = self.username {
            return username.clone();
        }
        match (&self.first_name, &self.last_name) {
            (Some(first), Some(last)) => format!("{first} {last}"),
            (Some(first), None) => first.clone(),
            _ => self.platform_id.to_string(),
        }
    }
}

/// Identity and role snapshot used to create or refresh a member record.
#[derive(Debug, Clone)]
pub struct MemberProfile {
    pub platform_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub is_admin: bool,
    pub is_mentor: bool,
}

/// An inbound message, stored append-only before any stage runs.
///
/// Never mutated except to mark deletion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: Uuid,
    pub member_id: Uuid,
    pub platform_message_id: i64,
    pub text: String,
    pub is_deleted: bool,
    pub deletion_reason: Option<String>,
    pub sent_at: DateTime<Utc>,
}

/// A FAQ entry with its question embedding.
///
/// `embedding` is `None` for entries loaded before embeddings existed; such
/// entries are excluded from similarity ranking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaqEntry {
    pub id: Uuid,
    pub question: String,
    pub answer: String,
    pub category: Option<String>,
    pub embedding: Option<Vec<f32>>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub times_matched: i64,
}

/// A mentor paged for a message. `responded` is left for external workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MentorTag {
    pub id: Uuid,
    pub message_id: Uuid,
    pub mentor_id: Uuid,
    pub reason: Option<String>,
    pub tagged_at: DateTime<Utc>,
    pub responded: bool,
    pub responded_at: Option<DateTime<Utc>>,
}

/// Outcome recorded for a moderation check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModerationAction {
    Allowed,
    Deleted,
}

impl ModerationAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Allowed => "allowed",
            Self::Deleted => "deleted",
        }
    }
}

/// Append-only audit entry, one per moderation check.
///
/// `message_id` may be absent if the message lookup failed — the audit entry
/// is written regardless.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModerationRecord {
    pub id: Uuid,
    pub message_id: Option<Uuid>,
    pub member_id: Uuid,
    pub action: ModerationAction,
    pub category: String,
    pub confidence: f32,
    pub message_text: Option<String>,
    pub provider: String,
    pub moderated_at: DateTime<Utc>,
}

/// Fields for a new moderation record (id and timestamp are assigned on insert).
#[derive(Debug, Clone)]
pub struct NewModerationRecord {
    pub message_id: Option<Uuid>,
    pub member_id: Uuid,
    pub action: ModerationAction,
    pub category: String,
    pub confidence: f32,
    pub message_text: Option<String>,
    pub provider: String,
}

/// Aggregate counters for the `/stats` admin command.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StoreStats {
    pub members: i64,
    pub messages: i64,
    pub deleted_messages: i64,
    pub faqs: i64,
    pub mentor_tags: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(username: Option<&str>, first: Option<&str>, last: Option<&str>) -> Member {
        Member {
            id: Uuid::new_v4(),
            platform_id: 42,
            username: username.map(String::from),
            first_name: first.map(String::from),
            last_name: last.map(String::from),
            is_admin: false,
            is_mentor: false,
            expertise_domains: vec![],
            joined_at: Utc::now(),
            last_active: Utc::now(),
        }
    }

    #[test]
    fn display_name_prefers_username() {
        assert_eq!(
            member(Some("alice"), Some("Alice"), Some("A")).display_name(),
            "alice"
        );
    }

    #[test]
    fn display_name_falls_back_to_names_then_id() {
        assert_eq!(member(None, Some("Alice"), Some("A")).display_name(), "Alice A");
        assert_eq!(member(None, Some("Alice"), None).display_name(), "Alice");
        assert_eq!(member(None, None, None).display_name(), "42");
    }

    #[test]
    fn elevated_when_admin_or_mentor() {
        let mut m = member(None, None, None);
        assert!(!m.is_elevated());
        m.is_admin = true;
        assert!(m.is_elevated());
        m.is_admin = false;
        m.is_mentor = true;
        assert!(m.is_elevated());
    }
}
