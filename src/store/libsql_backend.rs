//! libSQL backend — async `Store` trait implementation.
//!
//! Supports local file and in-memory databases. Embeddings are stored as
//! JSON float arrays in a nullable TEXT column; a NULL there keeps the entry
//! out of the ranking candidate set.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{params, Connection, Database as LibSqlDatabase};
use tracing::info;
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::store::migrations;
use crate::store::models::{
    FaqEntry, Member, MemberProfile, MentorTag, ModerationAction, ModerationRecord,
    NewModerationRecord, StoreStats, StoredMessage,
};
use crate::store::traits::Store;

/// libSQL store backend.
///
/// Holds a single connection reused for all operations; each call runs in
/// autocommit mode as its own unit of work.
pub struct LibSqlStore {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlStore {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Connection(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Connection(format!("Failed to open database: {e}")))?;
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Connection(format!("Failed to connect: {e}")))?;

        migrations::run_migrations(&conn).await?;
        info!(path = %path.display(), "Database opened");
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Connection(format!("Failed to create in-memory database: {e}"))
            })?;
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Connection(format!("Failed to connect: {e}")))?;

        migrations::run_migrations(&conn).await?;
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }
}

// ── Helper functions ────────────────────────────────────────────────

fn query_err(e: libsql::Error) -> DatabaseError {
    DatabaseError::Query(e.to_string())
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| DateTime::<Utc>::MIN_UTC)
}

fn parse_uuid(s: &str) -> Result<Uuid, DatabaseError> {
    Uuid::parse_str(s).map_err(|e| DatabaseError::Serialization(format!("bad uuid '{s}': {e}")))
}

fn encode_embedding(embedding: &[f32]) -> Result<String, DatabaseError> {
    serde_json::to_string(embedding).map_err(|e| DatabaseError::Serialization(e.to_string()))
}

fn decode_embedding(raw: &str) -> Option<Vec<f32>> {
    serde_json::from_str(raw).ok()
}

/// Map a row to a Member.
///
/// Column order: 0:id, 1:platform_id, 2:username, 3:first_name, 4:last_name,
/// 5:is_admin, 6:is_mentor, 7:expertise_domains, 8:joined_at, 9:last_active
const MEMBER_COLUMNS: &str = "id, platform_id, username, first_name, last_name, \
     is_admin, is_mentor, expertise_domains, joined_at, last_active";

fn row_to_member(row: &libsql::Row) -> Result<Member, DatabaseError> {
    let id: String = row.get(0).map_err(query_err)?;
    let domains_raw: String = row.get::<String>(7).unwrap_or_else(|_| "[]".into());
    Ok(Member {
        id: parse_uuid(&id)?,
        platform_id: row.get(1).map_err(query_err)?,
        username: row.get::<String>(2).ok(),
        first_name: row.get::<String>(3).ok(),
        last_name: row.get::<String>(4).ok(),
        is_admin: row.get::<i64>(5).map_err(query_err)? != 0,
        is_mentor: row.get::<i64>(6).map_err(query_err)? != 0,
        expertise_domains: serde_json::from_str(&domains_raw).unwrap_or_default(),
        joined_at: parse_datetime(&row.get::<String>(8).map_err(query_err)?),
        last_active: parse_datetime(&row.get::<String>(9).map_err(query_err)?),
    })
}

/// Column order: 0:id, 1:member_id, 2:platform_message_id, 3:text,
/// 4:is_deleted, 5:deletion_reason, 6:sent_at
const MESSAGE_COLUMNS: &str =
    "id, member_id, platform_message_id, text, is_deleted, deletion_reason, sent_at";

fn row_to_message(row: &libsql::Row) -> Result<StoredMessage, DatabaseError> {
    let id: String = row.get(0).map_err(query_err)?;
    let member_id: String = row.get(1).map_err(query_err)?;
    Ok(StoredMessage {
        id: parse_uuid(&id)?,
        member_id: parse_uuid(&member_id)?,
        platform_message_id: row.get(2).map_err(query_err)?,
        text: row.get(3).map_err(query_err)?,
        is_deleted: row.get::<i64>(4).map_err(query_err)? != 0,
        deletion_reason: row.get::<String>(5).ok(),
        sent_at: parse_datetime(&row.get::<String>(6).map_err(query_err)?),
    })
}

/// Column order: 0:id, 1:question, 2:answer, 3:category, 4:embedding,
/// 5:created_by, 6:created_at, 7:updated_at, 8:times_matched
const FAQ_COLUMNS: &str =
    "id, question, answer, category, embedding, created_by, created_at, updated_at, times_matched";

fn row_to_faq(row: &libsql::Row) -> Result<FaqEntry, DatabaseError> {
    let id: String = row.get(0).map_err(query_err)?;
    let created_by = match row.get::<String>(5).ok() {
        Some(raw) => Some(parse_uuid(&raw)?),
        None => None,
    };
    Ok(FaqEntry {
        id: parse_uuid(&id)?,
        question: row.get(1).map_err(query_err)?,
        answer: row.get(2).map_err(query_err)?,
        category: row.get::<String>(3).ok(),
        embedding: row.get::<String>(4).ok().and_then(|raw| decode_embedding(&raw)),
        created_by,
        created_at: parse_datetime(&row.get::<String>(6).map_err(query_err)?),
        updated_at: parse_datetime(&row.get::<String>(7).map_err(query_err)?),
        times_matched: row.get(8).map_err(query_err)?,
    })
}

/// Column order: 0:id, 1:message_id, 2:mentor_id, 3:reason, 4:tagged_at,
/// 5:responded, 6:responded_at
const MENTOR_TAG_COLUMNS: &str =
    "id, message_id, mentor_id, reason, tagged_at, responded, responded_at";

fn row_to_mentor_tag(row: &libsql::Row) -> Result<MentorTag, DatabaseError> {
    let id: String = row.get(0).map_err(query_err)?;
    let message_id: String = row.get(1).map_err(query_err)?;
    let mentor_id: String = row.get(2).map_err(query_err)?;
    Ok(MentorTag {
        id: parse_uuid(&id)?,
        message_id: parse_uuid(&message_id)?,
        mentor_id: parse_uuid(&mentor_id)?,
        reason: row.get::<String>(3).ok(),
        tagged_at: parse_datetime(&row.get::<String>(4).map_err(query_err)?),
        responded: row.get::<i64>(5).map_err(query_err)? != 0,
        responded_at: row
            .get::<String>(6)
            .ok()
            .map(|raw| parse_datetime(&raw)),
    })
}

/// Column order: 0:id, 1:message_id, 2:member_id, 3:action, 4:category,
/// 5:confidence, 6:message_text, 7:provider, 8:moderated_at
const MODERATION_COLUMNS: &str =
    "id, message_id, member_id, action, category, confidence, message_text, provider, moderated_at";

fn row_to_moderation_record(row: &libsql::Row) -> Result<ModerationRecord, DatabaseError> {
    let id: String = row.get(0).map_err(query_err)?;
    let member_id: String = row.get(2).map_err(query_err)?;
    let message_id = match row.get::<String>(1).ok() {
        Some(raw) => Some(parse_uuid(&raw)?),
        None => None,
    };
    let action_raw: String = row.get(3).map_err(query_err)?;
    let action = match action_raw.as_str() {
        "deleted" => ModerationAction::Deleted,
        _ => ModerationAction::Allowed,
    };
    Ok(ModerationRecord {
        id: parse_uuid(&id)?,
        message_id,
        member_id: parse_uuid(&member_id)?,
        action,
        category: row.get(4).map_err(query_err)?,
        confidence: row.get::<f64>(5).map_err(query_err)? as f32,
        message_text: row.get::<String>(6).ok(),
        provider: row.get(7).map_err(query_err)?,
        moderated_at: parse_datetime(&row.get::<String>(8).map_err(query_err)?),
    })
}

async fn fetch_one<T>(
    mut rows: libsql::Rows,
    map: impl Fn(&libsql::Row) -> Result<T, DatabaseError>,
) -> Result<Option<T>, DatabaseError> {
    match rows.next().await.map_err(query_err)? {
        Some(row) => Ok(Some(map(&row)?)),
        None => Ok(None),
    }
}

async fn fetch_all<T>(
    mut rows: libsql::Rows,
    map: impl Fn(&libsql::Row) -> Result<T, DatabaseError>,
) -> Result<Vec<T>, DatabaseError> {
    let mut out = Vec::new();
    while let Some(row) = rows.next().await.map_err(query_err)? {
        out.push(map(&row)?);
    }
    Ok(out)
}

// ── Store implementation ────────────────────────────────────────────

#[async_trait]
impl Store for LibSqlStore {
    async fn upsert_member(&self, profile: &MemberProfile) -> Result<Member, DatabaseError> {
        let now = Utc::now().to_rfc3339();
        // Single statement keeps insert-or-refresh atomic under concurrency.
        self.conn
            .execute(
                "INSERT INTO members \
                 (id, platform_id, username, first_name, last_name, is_admin, is_mentor, \
                  expertise_domains, joined_at, last_active) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, '[]', ?8, ?8) \
                 ON CONFLICT(platform_id) DO UPDATE SET \
                   username = excluded.username, \
                   first_name = excluded.first_name, \
                   last_name = excluded.last_name, \
                   is_admin = excluded.is_admin, \
                   is_mentor = excluded.is_mentor, \
                   last_active = excluded.last_active",
                params![
                    Uuid::new_v4().to_string(),
                    profile.platform_id,
                    profile.username.clone(),
                    profile.first_name.clone(),
                    profile.last_name.clone(),
                    profile.is_admin as i64,
                    profile.is_mentor as i64,
                    now,
                ],
            )
            .await
            .map_err(query_err)?;

        self.get_member(profile.platform_id)
            .await?
            .ok_or_else(|| DatabaseError::NotFound {
                entity: "member".to_string(),
                id: profile.platform_id.to_string(),
            })
    }

    async fn get_member(&self, platform_id: i64) -> Result<Option<Member>, DatabaseError> {
        let rows = self
            .conn
            .query(
                &format!("SELECT {MEMBER_COLUMNS} FROM members WHERE platform_id = ?1"),
                params![platform_id],
            )
            .await
            .map_err(query_err)?;
        fetch_one(rows, row_to_member).await
    }

    async fn mentors_by_platform_ids(
        &self,
        platform_ids: &[i64],
    ) -> Result<Vec<Member>, DatabaseError> {
        if platform_ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; platform_ids.len()].join(", ");
        let sql = format!(
            "SELECT {MEMBER_COLUMNS} FROM members \
             WHERE is_mentor = 1 AND platform_id IN ({placeholders}) \
             ORDER BY platform_id"
        );
        let rows = self
            .conn
            .query(
                &sql,
                libsql::params_from_iter(platform_ids.iter().copied()),
            )
            .await
            .map_err(query_err)?;
        fetch_all(rows, row_to_member).await
    }

    async fn insert_message(
        &self,
        member_id: Uuid,
        platform_message_id: i64,
        text: &str,
    ) -> Result<StoredMessage, DatabaseError> {
        let id = Uuid::new_v4();
        let now = Utc::now();
        self.conn
            .execute(
                "INSERT INTO messages (id, member_id, platform_message_id, text, sent_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    id.to_string(),
                    member_id.to_string(),
                    platform_message_id,
                    text,
                    now.to_rfc3339(),
                ],
            )
            .await
            .map_err(query_err)?;

        Ok(StoredMessage {
            id,
            member_id,
            platform_message_id,
            text: text.to_string(),
            is_deleted: false,
            deletion_reason: None,
            sent_at: now,
        })
    }

    async fn mark_message_deleted(&self, id: Uuid, reason: &str) -> Result<(), DatabaseError> {
        self.conn
            .execute(
                "UPDATE messages SET is_deleted = 1, deletion_reason = ?2 WHERE id = ?1",
                params![id.to_string(), reason],
            )
            .await
            .map_err(query_err)?;
        Ok(())
    }

    async fn get_message(&self, id: Uuid) -> Result<Option<StoredMessage>, DatabaseError> {
        let rows = self
            .conn
            .query(
                &format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?1"),
                params![id.to_string()],
            )
            .await
            .map_err(query_err)?;
        fetch_one(rows, row_to_message).await
    }

    async fn insert_faq(
        &self,
        question: &str,
        answer: &str,
        category: Option<&str>,
        embedding: &[f32],
        created_by: Option<Uuid>,
    ) -> Result<FaqEntry, DatabaseError> {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let encoded = encode_embedding(embedding)?;
        self.conn
            .execute(
                "INSERT INTO faqs \
                 (id, question, answer, category, embedding, created_by, created_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
                params![
                    id.to_string(),
                    question,
                    answer,
                    category,
                    encoded,
                    created_by.map(|u| u.to_string()),
                    now.to_rfc3339(),
                ],
            )
            .await
            .map_err(query_err)?;

        Ok(FaqEntry {
            id,
            question: question.to_string(),
            answer: answer.to_string(),
            category: category.map(String::from),
            embedding: Some(embedding.to_vec()),
            created_by,
            created_at: now,
            updated_at: now,
            times_matched: 0,
        })
    }

    async fn list_faqs(&self) -> Result<Vec<FaqEntry>, DatabaseError> {
        let rows = self
            .conn
            .query(
                &format!("SELECT {FAQ_COLUMNS} FROM faqs ORDER BY created_at"),
                (),
            )
            .await
            .map_err(query_err)?;
        fetch_all(rows, row_to_faq).await
    }

    async fn faqs_with_embeddings(&self) -> Result<Vec<FaqEntry>, DatabaseError> {
        let rows = self
            .conn
            .query(
                &format!(
                    "SELECT {FAQ_COLUMNS} FROM faqs WHERE embedding IS NOT NULL ORDER BY created_at"
                ),
                (),
            )
            .await
            .map_err(query_err)?;
        fetch_all(rows, row_to_faq).await
    }

    async fn get_faq(&self, id: Uuid) -> Result<Option<FaqEntry>, DatabaseError> {
        let rows = self
            .conn
            .query(
                &format!("SELECT {FAQ_COLUMNS} FROM faqs WHERE id = ?1"),
                params![id.to_string()],
            )
            .await
            .map_err(query_err)?;
        fetch_one(rows, row_to_faq).await
    }

    async fn delete_faq(&self, id: Uuid) -> Result<bool, DatabaseError> {
        let affected = self
            .conn
            .execute("DELETE FROM faqs WHERE id = ?1", params![id.to_string()])
            .await
            .map_err(query_err)?;
        Ok(affected > 0)
    }

    async fn increment_faq_matches(&self, id: Uuid) -> Result<(), DatabaseError> {
        self.conn
            .execute(
                "UPDATE faqs SET times_matched = times_matched + 1, updated_at = ?2 WHERE id = ?1",
                params![id.to_string(), Utc::now().to_rfc3339()],
            )
            .await
            .map_err(query_err)?;
        Ok(())
    }

    async fn insert_mentor_tag(
        &self,
        message_id: Uuid,
        mentor_id: Uuid,
        reason: &str,
    ) -> Result<MentorTag, DatabaseError> {
        let id = Uuid::new_v4();
        let now = Utc::now();
        self.conn
            .execute(
                "INSERT INTO mentor_tags (id, message_id, mentor_id, reason, tagged_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    id.to_string(),
                    message_id.to_string(),
                    mentor_id.to_string(),
                    reason,
                    now.to_rfc3339(),
                ],
            )
            .await
            .map_err(query_err)?;

        Ok(MentorTag {
            id,
            message_id,
            mentor_id,
            reason: Some(reason.to_string()),
            tagged_at: now,
            responded: false,
            responded_at: None,
        })
    }

    async fn mentor_tags_for_message(
        &self,
        message_id: Uuid,
    ) -> Result<Vec<MentorTag>, DatabaseError> {
        let rows = self
            .conn
            .query(
                &format!(
                    "SELECT {MENTOR_TAG_COLUMNS} FROM mentor_tags \
                     WHERE message_id = ?1 ORDER BY tagged_at"
                ),
                params![message_id.to_string()],
            )
            .await
            .map_err(query_err)?;
        fetch_all(rows, row_to_mentor_tag).await
    }

    async fn insert_moderation_record(
        &self,
        record: &NewModerationRecord,
    ) -> Result<(), DatabaseError> {
        self.conn
            .execute(
                "INSERT INTO moderation_records \
                 (id, message_id, member_id, action, category, confidence, message_text, \
                  provider, moderated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    Uuid::new_v4().to_string(),
                    record.message_id.map(|u| u.to_string()),
                    record.member_id.to_string(),
                    record.action.as_str(),
                    record.category.clone(),
                    record.confidence as f64,
                    record.message_text.clone(),
                    record.provider.clone(),
                    Utc::now().to_rfc3339(),
                ],
            )
            .await
            .map_err(query_err)?;
        Ok(())
    }

    async fn moderation_records_for_member(
        &self,
        member_id: Uuid,
    ) -> Result<Vec<ModerationRecord>, DatabaseError> {
        let rows = self
            .conn
            .query(
                &format!(
                    "SELECT {MODERATION_COLUMNS} FROM moderation_records \
                     WHERE member_id = ?1 ORDER BY moderated_at DESC"
                ),
                params![member_id.to_string()],
            )
            .await
            .map_err(query_err)?;
        fetch_all(rows, row_to_moderation_record).await
    }

    async fn stats(&self) -> Result<StoreStats, DatabaseError> {
        let mut rows = self
            .conn
            .query(
                "SELECT \
                   (SELECT COUNT(*) FROM members), \
                   (SELECT COUNT(*) FROM messages), \
                   (SELECT COUNT(*) FROM messages WHERE is_deleted = 1), \
                   (SELECT COUNT(*) FROM faqs), \
                   (SELECT COUNT(*) FROM mentor_tags)",
                (),
            )
            .await
            .map_err(query_err)?;

        match rows.next().await.map_err(query_err)? {
            Some(row) => Ok(StoreStats {
                members: row.get(0).map_err(query_err)?,
                messages: row.get(1).map_err(query_err)?,
                deleted_messages: row.get(2).map_err(query_err)?,
                faqs: row.get(3).map_err(query_err)?,
                mentor_tags: row.get(4).map_err(query_err)?,
            }),
            None => Ok(StoreStats::default()),
        }
    }
}
