//! Version-tracked database migrations for the libSQL backend.
//!
//! Each migration has a version number and SQL. `run_migrations()` checks
//! the current version and applies only the new ones sequentially.

use libsql::Connection;

use crate::error::DatabaseError;

/// A single migration step.
struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

/// All migrations in order. Add new versions to the end.
static MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "initial_schema",
    sql: r#"
        CREATE TABLE IF NOT EXISTS members (
            id TEXT PRIMARY KEY,
            platform_id INTEGER NOT NULL UNIQUE,
            username TEXT,
            first_name TEXT,
            last_name TEXT,
            is_admin INTEGER NOT NULL DEFAULT 0,
            is_mentor INTEGER NOT NULL DEFAULT 0,
            expertise_domains TEXT NOT NULL DEFAULT '[]',
            joined_at TEXT NOT NULL,
            last_active TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_members_platform_id ON members(platform_id);

        CREATE TABLE IF NOT EXISTS messages (
            id TEXT PRIMARY KEY,
            member_id TEXT NOT NULL REFERENCES members(id),
            platform_message_id INTEGER NOT NULL,
            text TEXT NOT NULL,
            is_deleted INTEGER NOT NULL DEFAULT 0,
            deletion_reason TEXT,
            sent_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_messages_member ON messages(member_id);
        CREATE INDEX IF NOT EXISTS idx_messages_platform_id ON messages(platform_message_id);

        CREATE TABLE IF NOT EXISTS faqs (
            id TEXT PRIMARY KEY,
            question TEXT NOT NULL,
            answer TEXT NOT NULL,
            category TEXT,
            embedding TEXT,
            created_by TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            times_matched INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS mentor_tags (
            id TEXT PRIMARY KEY,
            message_id TEXT NOT NULL REFERENCES messages(id),
            mentor_id TEXT NOT NULL REFERENCES members(id),
            reason TEXT,
            tagged_at TEXT NOT NULL,
            responded INTEGER NOT NULL DEFAULT 0,
            responded_at TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_mentor_tags_message ON mentor_tags(message_id);

        CREATE TABLE IF NOT EXISTS moderation_records (
            id TEXT PRIMARY KEY,
            message_id TEXT,
            member_id TEXT NOT NULL REFERENCES members(id),
            action TEXT NOT NULL,
            category TEXT NOT NULL,
            confidence REAL NOT NULL,
            message_text TEXT,
            provider TEXT NOT NULL,
            moderated_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_moderation_member ON moderation_records(member_id);
    "#,
}];

/// Apply any migrations newer than the recorded schema version.
pub async fn run_migrations(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        (),
    )
    .await
    .map_err(|e| DatabaseError::Migration(format!("creating _migrations table: {e}")))?;

    let current = current_version(conn).await?;

    for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
        conn.execute_batch(migration.sql)
            .await
            .map_err(|e| {
                DatabaseError::Migration(format!(
                    "applying V{} ({}): {e}",
                    migration.version, migration.name
                ))
            })?;
        conn.execute(
            "INSERT INTO _migrations (version, name) VALUES (?1, ?2)",
            libsql::params![migration.version, migration.name],
        )
        .await
        .map_err(|e| DatabaseError::Migration(format!("recording V{}: {e}", migration.version)))?;
        tracing::info!(
            version = migration.version,
            name = migration.name,
            "Applied migration"
        );
    }

    Ok(())
}

async fn current_version(conn: &Connection) -> Result<i64, DatabaseError> {
    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM _migrations", ())
        .await
        .map_err(|e| DatabaseError::Migration(format!("reading schema version: {e}")))?;

    match rows
        .next()
        .await
        .map_err(|e| DatabaseError::Migration(e.to_string()))?
    {
        Some(row) => row
            .get::<i64>(0)
            .map_err(|e| DatabaseError::Migration(e.to_string())),
        None => Ok(0),
    }
}
