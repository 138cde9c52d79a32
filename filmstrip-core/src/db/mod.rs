//! SQLite persistence layer.
//!
//! One database file per concern: catalog (`media.db`), process queue
//! (`process_queue.db`), TMDB/blurhash cache (`tmdb.db`), and intro
//! markers (`intros.db`). Each is opened lazily exactly once, holds a
//! single connection, and serializes writers behind a per-database mutex.
//! Readers go straight to the pool; WAL keeps them from blocking writes.

mod blurhash_cache;
mod catalog;
mod intros;
mod process_queue;
mod retry;
mod schema;

pub use blurhash_cache::BlurhashCache;
pub use catalog::{
    image_mtime_hash, refresh_image_ref, stitch_image_hash, CatalogRepo,
};
pub use intros::{IntroMarker, IntrosRepo};
pub use process_queue::ProcessQueueRepo;
pub use retry::with_retry;

use crate::error::{MediaError, Result};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions,
    SqliteSynchronous,
};
use sqlx::{Sqlite, SqlitePool, Transaction};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info};

/// A single SQLite database: one connection, one write mutex.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
    write_lock: Arc<Mutex<()>>,
}

/// An exclusive write transaction. Holds the database's write mutex for
/// its lifetime; dropping without [`WriteTransaction::commit`] rolls back.
pub struct WriteTransaction<'c> {
    tx: Transaction<'c, Sqlite>,
    _guard: OwnedMutexGuard<()>,
}

impl std::fmt::Debug for WriteTransaction<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteTransaction").finish_non_exhaustive()
    }
}

impl<'c> WriteTransaction<'c> {
    pub fn conn(&mut self) -> &mut sqlx::SqliteConnection {
        &mut *self.tx
    }

    pub async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    pub async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}

impl Database {
    async fn open(path: &Path) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_millis(15_000))
            .foreign_keys(true)
            .pragma("wal_autocheckpoint", "1000")
            .pragma("temp_store", "MEMORY");

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        info!("Opened database {}", path.display());
        Ok(Self {
            pool,
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    /// Connection pool for reads. Reads never take the write mutex.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Serialize a plain (non-transactional) write against this database.
    pub async fn write_guard(&self) -> OwnedMutexGuard<()> {
        self.write_lock.clone().lock_owned().await
    }

    /// Start a `BEGIN IMMEDIATE` transaction under the write mutex.
    pub async fn begin_write(&self) -> Result<WriteTransaction<'_>> {
        let guard = self.write_guard().await;
        let tx = self.pool.begin_with("BEGIN IMMEDIATE").await?;
        Ok(WriteTransaction { tx, _guard: guard })
    }

    /// Deferred read transaction; takes no lock.
    pub async fn begin_read(&self) -> Result<Transaction<'_, Sqlite>> {
        Ok(self.pool.begin().await?)
    }

    async fn checkpoint_and_close(&self) {
        if let Err(e) = sqlx::query("PRAGMA wal_checkpoint(TRUNCATE)")
            .execute(&self.pool)
            .await
        {
            debug!("WAL checkpoint on shutdown failed: {e}");
        }
        self.pool.close().await;
    }
}

/// The set of databases used by the server, opened lazily on first use.
#[derive(Debug)]
pub struct Databases {
    dir: PathBuf,
    closing: AtomicBool,
    media: tokio::sync::OnceCell<Database>,
    process_queue: tokio::sync::OnceCell<Database>,
    tmdb: tokio::sync::OnceCell<Database>,
    intros: tokio::sync::OnceCell<Database>,
}

impl Databases {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            closing: AtomicBool::new(false),
            media: tokio::sync::OnceCell::new(),
            process_queue: tokio::sync::OnceCell::new(),
            tmdb: tokio::sync::OnceCell::new(),
            intros: tokio::sync::OnceCell::new(),
        }
    }

    async fn get_or_open<'a>(
        &self,
        cell: &'a tokio::sync::OnceCell<Database>,
        file: &str,
        schema: &[&str],
        migrations: &[&str],
    ) -> Result<&'a Database> {
        if self.closing.load(Ordering::SeqCst) {
            return Err(MediaError::Internal(
                "persistence layer is shutting down".into(),
            ));
        }
        cell.get_or_try_init(|| async {
            tokio::fs::create_dir_all(&self.dir).await?;
            let db = Database::open(&self.dir.join(file)).await?;
            schema::apply(&db, schema, migrations).await?;
            Ok(db)
        })
        .await
    }

    /// Catalog database: movies, tv shows, missing-data tracking.
    pub async fn media(&self) -> Result<&Database> {
        self.get_or_open(
            &self.media,
            "media.db",
            schema::MEDIA_SCHEMA,
            schema::MEDIA_MIGRATIONS,
        )
        .await
    }

    /// Durable progress of long-running derivations.
    pub async fn process_queue(&self) -> Result<&Database> {
        self.get_or_open(
            &self.process_queue,
            "process_queue.db",
            schema::PROCESS_QUEUE_SCHEMA,
            &[],
        )
        .await
    }

    /// TTL cache for blurhashes keyed by normalized image URL.
    pub async fn tmdb(&self) -> Result<&Database> {
        self.get_or_open(&self.tmdb, "tmdb.db", schema::TMDB_SCHEMA, &[])
            .await
    }

    /// Intro markers keyed by episode id.
    pub async fn intros(&self) -> Result<&Database> {
        self.get_or_open(&self.intros, "intros.db", schema::INTROS_SCHEMA, &[])
            .await
    }

    /// Reject new opens, checkpoint every live connection, and close.
    pub async fn shutdown(&self) {
        self.closing.store(true, Ordering::SeqCst);
        for cell in [&self.media, &self.process_queue, &self.tmdb, &self.intros]
        {
            if let Some(db) = cell.get() {
                db.checkpoint_and_close().await;
            }
        }
        info!("Persistence layer closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn opens_each_database_once() {
        let dir = tempdir().unwrap();
        let dbs = Databases::new(dir.path().to_path_buf());

        let first = dbs.media().await.unwrap() as *const Database;
        let second = dbs.media().await.unwrap() as *const Database;
        assert_eq!(first, second);
        assert!(dir.path().join("media.db").exists());
    }

    #[tokio::test]
    async fn shutdown_rejects_new_opens() {
        let dir = tempdir().unwrap();
        let dbs = Databases::new(dir.path().to_path_buf());
        dbs.media().await.unwrap();
        dbs.shutdown().await;

        assert!(dbs.process_queue().await.is_err());
    }

    #[tokio::test]
    async fn write_transaction_commits() {
        let dir = tempdir().unwrap();
        let dbs = Databases::new(dir.path().to_path_buf());
        let db = dbs.media().await.unwrap();

        let mut tx = db.begin_write().await.unwrap();
        sqlx::query(
            "INSERT INTO missing_data_media (name, last_attempt) VALUES (?, ?)",
        )
        .bind("Example")
        .bind("2026-01-01T00:00:00Z")
        .execute(tx.conn())
        .await
        .unwrap();
        tx.commit().await.unwrap();

        let row: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM missing_data_media")
                .fetch_one(db.pool())
                .await
                .unwrap();
        assert_eq!(row.0, 1);
    }

    #[tokio::test]
    async fn dropped_transaction_rolls_back() {
        let dir = tempdir().unwrap();
        let dbs = Databases::new(dir.path().to_path_buf());
        let db = dbs.media().await.unwrap();

        {
            let mut tx = db.begin_write().await.unwrap();
            sqlx::query(
                "INSERT INTO missing_data_media (name, last_attempt) VALUES (?, ?)",
            )
            .bind("Dropped")
            .bind("2026-01-01T00:00:00Z")
            .execute(tx.conn())
            .await
            .unwrap();
            // No commit.
        }

        let row: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM missing_data_media")
                .fetch_one(db.pool())
                .await
                .unwrap();
        assert_eq!(row.0, 0);
    }
}
