//! Unified `Store` trait — single async interface for all persistence.
//!
//! Each call is a short-lived unit of work; there is no long transaction per
//! pipeline run. A crash mid-pipeline leaves prior steps durably committed.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::store::models::{
    FaqEntry, Member, MemberProfile, MentorTag, ModerationRecord, NewModerationRecord, StoreStats,
    StoredMessage,
};

/// Backend-agnostic store covering the five triage entities.
#[async_trait]
pub trait Store: Send + Sync {
    // ── Members ─────────────────────────────────────────────────────

    /// Atomic insert-or-fetch by platform id, refreshing role flags and
    /// identity fields to the supplied snapshot when they changed.
    async fn upsert_member(&self, profile: &MemberProfile) -> Result<Member, DatabaseError>;

    /// Look up a member by platform id.
    async fn get_member(&self, platform_id: i64) -> Result<Option<Member>, DatabaseError>;

    /// Members with any of the given platform ids that are flagged
    /// `is_mentor = true` in the store.
    async fn mentors_by_platform_ids(
        &self,
        platform_ids: &[i64],
    ) -> Result<Vec<Member>, DatabaseError>;

    // ── Messages ────────────────────────────────────────────────────

    /// Insert a new inbound message (append-only).
    async fn insert_message(
        &self,
        member_id: Uuid,
        platform_message_id: i64,
        text: &str,
    ) -> Result<StoredMessage, DatabaseError>;

    /// Mark a message deleted with a reason. The only permitted mutation.
    async fn mark_message_deleted(&self, id: Uuid, reason: &str) -> Result<(), DatabaseError>;

    /// Fetch a message by id.
    async fn get_message(&self, id: Uuid) -> Result<Option<StoredMessage>, DatabaseError>;

    // ── FAQs ────────────────────────────────────────────────────────

    /// Insert a FAQ entry with its embedding in one write.
    async fn insert_faq(
        &self,
        question: &str,
        answer: &str,
        category: Option<&str>,
        embedding: &[f32],
        created_by: Option<Uuid>,
    ) -> Result<FaqEntry, DatabaseError>;

    /// All FAQ entries, embeddings included.
    async fn list_faqs(&self) -> Result<Vec<FaqEntry>, DatabaseError>;

    /// Only entries with a non-null embedding — the ranking candidate set.
    async fn faqs_with_embeddings(&self) -> Result<Vec<FaqEntry>, DatabaseError>;

    /// Fetch a FAQ entry by id.
    async fn get_faq(&self, id: Uuid) -> Result<Option<FaqEntry>, DatabaseError>;

    /// Delete a FAQ entry. Returns whether a row existed.
    async fn delete_faq(&self, id: Uuid) -> Result<bool, DatabaseError>;

    /// Increment a FAQ entry's match counter by one.
    async fn increment_faq_matches(&self, id: Uuid) -> Result<(), DatabaseError>;

    // ── Mentor tags ─────────────────────────────────────────────────

    /// Record that a mentor was paged for a message.
    async fn insert_mentor_tag(
        &self,
        message_id: Uuid,
        mentor_id: Uuid,
        reason: &str,
    ) -> Result<MentorTag, DatabaseError>;

    /// All mentor tags recorded for a message.
    async fn mentor_tags_for_message(
        &self,
        message_id: Uuid,
    ) -> Result<Vec<MentorTag>, DatabaseError>;

    // ── Moderation audit ────────────────────────────────────────────

    /// Append a moderation audit record.
    async fn insert_moderation_record(
        &self,
        record: &NewModerationRecord,
    ) -> Result<(), DatabaseError>;

    /// Audit records for a member, newest first.
    async fn moderation_records_for_member(
        &self,
        member_id: Uuid,
    ) -> Result<Vec<ModerationRecord>, DatabaseError>;

    // ── Stats ───────────────────────────────────────────────────────

    /// Aggregate counters for the admin stats command.
    async fn stats(&self) -> Result<StoreStats, DatabaseError>;
}
