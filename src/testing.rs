//! Test doubles shared by unit and integration tests.
//!
//! `ScriptedProvider` replays canned JSON responses and embeddings in place
//! of a real LLM backend; `NullStore` satisfies the `Store` trait for stages
//! that only need a sink.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::error::{DatabaseError, LlmError};
use crate::llm::{GenerateRequest, LlmProvider};
use crate::store::{
    FaqEntry, Member, MemberProfile, MentorTag, ModerationRecord, NewModerationRecord, Store,
    StoreStats, StoredMessage,
};

/// An `LlmProvider` that replays scripted responses.
#[derive(Default)]
pub struct ScriptedProvider {
    json_responses: Mutex<VecDeque<serde_json::Value>>,
    embeddings: Mutex<HashMap<String, Vec<f32>>>,
    default_embedding: Mutex<Option<Vec<f32>>>,
    fail: bool,
    json_calls: AtomicUsize,
    embed_calls: AtomicUsize,
}

impl ScriptedProvider {
    /// A provider where every call fails with a transport error.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Queue a structured response; calls pop in FIFO order.
    pub fn with_json(self, response: serde_json::Value) -> Self {
        self.json_responses.lock().unwrap().push_back(response);
        self
    }

    /// Fixed embedding for a specific input text.
    pub fn with_embedding(self, text: &str, embedding: Vec<f32>) -> Self {
        self.embeddings
            .lock()
            .unwrap()
            .insert(text.to_string(), embedding);
        self
    }

    /// Embedding returned for any text without a specific mapping.
    pub fn with_default_embedding(self, embedding: Vec<f32>) -> Self {
        *self.default_embedding.lock().unwrap() = Some(embedding);
        self
    }

    /// Number of structured generation calls made.
    pub fn json_call_count(&self) -> usize {
        self.json_calls.load(Ordering::SeqCst)
    }

    /// Number of embedding calls made.
    pub fn embed_call_count(&self) -> usize {
        self.embed_calls.load(Ordering::SeqCst)
    }

    fn transport_error(&self) -> LlmError {
        LlmError::RequestFailed {
            provider: "scripted".to_string(),
            reason: "scripted failure".to_string(),
        }
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn generate(&self, _request: GenerateRequest) -> Result<String, LlmError> {
        if self.fail {
            return Err(self.transport_error());
        }
        Ok("ok".to_string())
    }

    async fn generate_json(
        &self,
        _prompt: &str,
        _system_prompt: Option<&str>,
        _temperature: f32,
    ) -> Result<serde_json::Value, LlmError> {
        self.json_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(self.transport_error());
        }
        self.json_responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| LlmError::InvalidResponse {
                provider: "scripted".to_string(),
                reason: "no scripted response queued".to_string(),
            })
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        self.embed_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(self.transport_error());
        }
        if let Some(embedding) = self.embeddings.lock().unwrap().get(text) {
            return Ok(embedding.clone());
        }
        self.default_embedding
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| LlmError::Unsupported {
                provider: "scripted".to_string(),
                capability: "embeddings (none scripted)".to_string(),
            })
    }
}

/// A member record for tests that don't need the store.
pub fn member_fixture(platform_id: i64, is_admin: bool, is_mentor: bool) -> Member {
    Member {
        id: Uuid::new_v4(),
        platform_id,
        username: Some(format!("user{platform_id}")),
        first_name: None,
        last_name: None,
        is_admin,
        is_mentor,
        expertise_domains: vec![],
        joined_at: Utc::now(),
        last_active: Utc::now(),
    }
}

/// A profile snapshot flagged as mentor.
pub fn mentor_profile(platform_id: i64) -> MemberProfile {
    MemberProfile {
        platform_id,
        username: Some(format!("mentor{platform_id}")),
        first_name: None,
        last_name: None,
        is_admin: false,
        is_mentor: true,
    }
}

/// A `Store` that accepts writes and returns empty reads.
pub struct NullStore;

#[async_trait]
impl Store for NullStore {
    async fn upsert_member(&self, profile: &MemberProfile) -> Result<Member, DatabaseError> {
        Ok(member_fixture(
            profile.platform_id,
            profile.is_admin,
            profile.is_mentor,
        ))
    }

    async fn get_member(&self, _platform_id: i64) -> Result<Option<Member>, DatabaseError> {
        Ok(None)
    }

    async fn mentors_by_platform_ids(
        &self,
        _platform_ids: &[i64],
    ) -> Result<Vec<Member>, DatabaseError> {
        Ok(Vec::new())
    }

    async fn insert_message(
        &self,
        member_id: Uuid,
        platform_message_id: i64,
        text: &str,
    ) -> Result<StoredMessage, DatabaseError> {
        Ok(StoredMessage {
            id: Uuid::new_v4(),
            member_id,
            platform_message_id,
            text: text.to_string(),
            is_deleted: false,
            deletion_reason: None,
            sent_at: Utc::now(),
        })
    }

    async fn mark_message_deleted(&self, _id: Uuid, _reason: &str) -> Result<(), DatabaseError> {
        Ok(())
    }

    async fn get_message(&self, _id: Uuid) -> Result<Option<StoredMessage>, DatabaseError> {
        Ok(None)
    }

    async fn insert_faq(
        &self,
        question: &str,
        answer: &str,
        category: Option<&str>,
        embedding: &[f32],
        created_by: Option<Uuid>,
    ) -> Result<FaqEntry, DatabaseError> {
        Ok(FaqEntry {
            id: Uuid::new_v4(),
            question: question.to_string(),
            answer: answer.to_string(),
            category: category.map(String::from),
            embedding: Some(embedding.to_vec()),
            created_by,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            times_matched: 0,
        })
    }

    async fn list_faqs(&self) -> Result<Vec<FaqEntry>, DatabaseError> {
        Ok(Vec::new())
    }

    async fn faqs_with_embeddings(&self) -> Result<Vec<FaqEntry>, DatabaseError> {
        Ok(Vec::new())
    }

    async fn get_faq(&self, _id: Uuid) -> Result<Option<FaqEntry>, DatabaseError> {
        Ok(None)
    }

    async fn delete_faq(&self, _id: Uuid) -> Result<bool, DatabaseError> {
        Ok(false)
    }

    async fn increment_faq_matches(&self, _id: Uuid) -> Result<(), DatabaseError> {
        Ok(())
    }

    async fn insert_mentor_tag(
        &self,
        message_id: Uuid,
        mentor_id: Uuid,
        reason: &str,
    ) -> Result<MentorTag, DatabaseError> {
        Ok(MentorTag {
            id: Uuid::new_v4(),
            message_id,
            mentor_id,
            reason: Some(reason.to_string()),
            tagged_at: Utc::now(),
            responded: false,
            responded_at: None,
        })
    }

    async fn mentor_tags_for_message(
        &self,
        _message_id: Uuid,
    ) -> Result<Vec<MentorTag>, DatabaseError> {
        Ok(Vec::new())
    }

    async fn insert_moderation_record(
        &self,
        _record: &NewModerationRecord,
    ) -> Result<(), DatabaseError> {
        Ok(())
    }

    async fn moderation_records_for_member(
        &self,
        _member_id: Uuid,
    ) -> Result<Vec<ModerationRecord>, DatabaseError> {
        Ok(Vec::new())
    }

    async fn stats(&self) -> Result<StoreStats, DatabaseError> {
        Ok(StoreStats::default())
    }
}
