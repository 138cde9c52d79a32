//! Schema creation and additive migrations.
//!
//! Tables are created on first connection. Migrations are plain
//! `ALTER TABLE ... ADD COLUMN` statements; a "duplicate column" error
//! means the migration already ran and is ignored.

use super::Database;
use crate::error::Result;
use tracing::debug;

pub(super) const MEDIA_SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS movies (
        name TEXT PRIMARY KEY,
        file_names TEXT NOT NULL DEFAULT '[]',
        lengths TEXT NOT NULL DEFAULT '{}',
        dimensions TEXT NOT NULL DEFAULT '{}',
        urls TEXT NOT NULL DEFAULT '{}',
        hdr TEXT,
        additional_metadata TEXT NOT NULL DEFAULT '{}',
        _id TEXT NOT NULL DEFAULT '',
        directory_hash TEXT,
        poster_hash TEXT,
        backdrop_hash TEXT,
        logo_hash TEXT
    )",
    "CREATE TABLE IF NOT EXISTS tv_shows (
        name TEXT PRIMARY KEY,
        seasons TEXT NOT NULL DEFAULT '{}',
        urls TEXT NOT NULL DEFAULT '{}',
        hdr TEXT,
        additional_metadata TEXT NOT NULL DEFAULT '{}',
        _id TEXT NOT NULL DEFAULT '',
        directory_hash TEXT,
        poster_hash TEXT,
        backdrop_hash TEXT,
        logo_hash TEXT
    )",
    "CREATE TABLE IF NOT EXISTS missing_data_media (
        name TEXT PRIMARY KEY,
        last_attempt TEXT NOT NULL
    )",
];

/// Columns added after the initial schema shipped.
pub(super) const MEDIA_MIGRATIONS: &[&str] = &[
    "ALTER TABLE movies ADD COLUMN directory_hash TEXT",
    "ALTER TABLE movies ADD COLUMN poster_hash TEXT",
    "ALTER TABLE movies ADD COLUMN backdrop_hash TEXT",
    "ALTER TABLE movies ADD COLUMN logo_hash TEXT",
    "ALTER TABLE tv_shows ADD COLUMN directory_hash TEXT",
    "ALTER TABLE tv_shows ADD COLUMN poster_hash TEXT",
    "ALTER TABLE tv_shows ADD COLUMN backdrop_hash TEXT",
    "ALTER TABLE tv_shows ADD COLUMN logo_hash TEXT",
];

pub(super) const PROCESS_QUEUE_SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS process_queue (
        file_key TEXT PRIMARY KEY,
        process_type TEXT NOT NULL,
        total_steps INTEGER NOT NULL,
        current_step INTEGER NOT NULL DEFAULT 0,
        status TEXT NOT NULL,
        message TEXT,
        last_updated TEXT NOT NULL
    )",
];

pub(super) const TMDB_SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS blurhash_cache (
        url TEXT PRIMARY KEY,
        blurhash TEXT NOT NULL,
        created_at TEXT NOT NULL
    )",
];

pub(super) const INTROS_SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS intros (
        episode_id TEXT PRIMARY KEY,
        intro_start REAL,
        intro_end REAL
    )",
];

pub(super) async fn apply(
    db: &Database,
    schema: &[&str],
    migrations: &[&str],
) -> Result<()> {
    for statement in schema {
        sqlx::query(statement).execute(db.pool()).await?;
    }
    for statement in migrations {
        if let Err(e) = sqlx::query(statement).execute(db.pool()).await {
            let text = e.to_string();
            if text.contains("duplicate column") {
                debug!("Migration already applied: {statement}");
            } else {
                return Err(e.into());
            }
        }
    }
    Ok(())
}
