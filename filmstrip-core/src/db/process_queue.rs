//! Durable progress tracking for long-running derivations.

use super::retry::with_retry;
use super::Database;
use crate::config::QueueRecovery;
use crate::error::Result;
use chrono::{DateTime, Utc};
use filmstrip_model::{ProcessRecord, ProcessStatus};
use sqlx::Row;
use tracing::info;

#[derive(Debug, Clone)]
pub struct ProcessQueueRepo<'a> {
    db: &'a Database,
}

impl<'a> ProcessQueueRepo<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Register (or restart) a derivation under `file_key`.
    pub async fn create_or_update(
        &self,
        file_key: &str,
        process_type: &str,
        total_steps: u32,
        message: &str,
    ) -> Result<()> {
        with_retry("process_queue.create_or_update", || async {
            let _write = self.db.write_guard().await;
            sqlx::query(
                "INSERT INTO process_queue (
                    file_key, process_type, total_steps, current_step,
                    status, message, last_updated
                 ) VALUES (?, ?, ?, 0, ?, ?, ?)
                 ON CONFLICT(file_key) DO UPDATE SET
                    process_type = excluded.process_type,
                    total_steps = excluded.total_steps,
                    current_step = 0,
                    status = excluded.status,
                    message = excluded.message,
                    last_updated = excluded.last_updated",
            )
            .bind(file_key)
            .bind(process_type)
            .bind(total_steps)
            .bind(ProcessStatus::InProgress.as_str())
            .bind(message)
            .bind(Utc::now().to_rfc3339())
            .execute(self.db.pool())
            .await?;
            Ok(())
        })
        .await
    }

    /// Advance the step counter, optionally changing status or message.
    pub async fn update(
        &self,
        file_key: &str,
        current_step: u32,
        status: Option<ProcessStatus>,
        message: Option<&str>,
    ) -> Result<()> {
        with_retry("process_queue.update", || async {
            let _write = self.db.write_guard().await;
            sqlx::query(
                "UPDATE process_queue SET
                    current_step = ?,
                    status = COALESCE(?, status),
                    message = COALESCE(?, message),
                    last_updated = ?
                 WHERE file_key = ?",
            )
            .bind(current_step)
            .bind(status.map(|s| s.as_str()))
            .bind(message)
            .bind(Utc::now().to_rfc3339())
            .bind(file_key)
            .execute(self.db.pool())
            .await?;
            Ok(())
        })
        .await
    }

    /// Terminal update. On `Completed` the step counter is forced to
    /// `total_steps` so the completion invariant holds.
    pub async fn finalize(
        &self,
        file_key: &str,
        status: ProcessStatus,
        message: &str,
    ) -> Result<()> {
        with_retry("process_queue.finalize", || async {
            let _write = self.db.write_guard().await;
            sqlx::query(
                "UPDATE process_queue SET
                    current_step = CASE WHEN ? = 'completed'
                        THEN total_steps ELSE current_step END,
                    status = ?,
                    message = ?,
                    last_updated = ?
                 WHERE file_key = ?",
            )
            .bind(status.as_str())
            .bind(status.as_str())
            .bind(message)
            .bind(Utc::now().to_rfc3339())
            .bind(file_key)
            .execute(self.db.pool())
            .await?;
            Ok(())
        })
        .await
    }

    pub async fn get(&self, file_key: &str) -> Result<Option<ProcessRecord>> {
        with_retry("process_queue.get", || async {
            let row =
                sqlx::query("SELECT * FROM process_queue WHERE file_key = ?")
                    .bind(file_key)
                    .fetch_optional(self.db.pool())
                    .await?;
            Ok(row.map(|row| record_from_row(&row)))
        })
        .await
    }

    /// Reconcile rows orphaned by a previous run: anything still
    /// `in-progress` is either deleted or marked `interrupted`.
    pub async fn recover_startup(&self, policy: QueueRecovery) -> Result<u64> {
        with_retry("process_queue.recover_startup", || async {
            let _write = self.db.write_guard().await;
            let affected = match policy {
                QueueRecovery::Delete => {
                    sqlx::query(
                        "DELETE FROM process_queue WHERE status = 'in-progress'",
                    )
                    .execute(self.db.pool())
                    .await?
                    .rows_affected()
                }
                QueueRecovery::MarkInterrupted => {
                    sqlx::query(
                        "UPDATE process_queue SET
                            status = 'interrupted',
                            message = 'interrupted by restart',
                            last_updated = ?
                         WHERE status = 'in-progress'",
                    )
                    .bind(Utc::now().to_rfc3339())
                    .execute(self.db.pool())
                    .await?
                    .rows_affected()
                }
            };
            Ok(affected)
        })
        .await
        .inspect(|affected| {
            if *affected > 0 {
                info!("Reconciled {affected} orphaned process-queue row(s)");
            }
        })
    }
}

fn record_from_row(row: &sqlx::sqlite::SqliteRow) -> ProcessRecord {
    let status: String = row.get("status");
    let last_updated: String = row.get("last_updated");
    ProcessRecord {
        file_key: row.get("file_key"),
        process_type: row.get("process_type"),
        total_steps: row.get::<i64, _>("total_steps") as u32,
        current_step: row.get::<i64, _>("current_step") as u32,
        status: status.parse().unwrap_or(ProcessStatus::Error),
        message: row.get("message"),
        last_updated: last_updated
            .parse::<DateTime<Utc>>()
            .unwrap_or_else(|_| Utc::now()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Databases;
    use tempfile::tempdir;

    #[tokio::test]
    async fn full_lifecycle_reaches_total_steps() {
        let dir = tempdir().unwrap();
        let dbs = Databases::new(dir.path().to_path_buf());
        let db = dbs.process_queue().await.unwrap();
        let repo = ProcessQueueRepo::new(db);

        repo.create_or_update("sprite:Example", "spritesheet", 4, "starting")
            .await
            .unwrap();
        repo.update("sprite:Example", 2, None, Some("rendering"))
            .await
            .unwrap();
        repo.finalize(
            "sprite:Example",
            ProcessStatus::Completed,
            "done",
        )
        .await
        .unwrap();

        let record = repo.get("sprite:Example").await.unwrap().unwrap();
        assert_eq!(record.status, ProcessStatus::Completed);
        assert_eq!(record.current_step, record.total_steps);
    }

    #[tokio::test]
    async fn startup_recovery_marks_interrupted() {
        let dir = tempdir().unwrap();
        let dbs = Databases::new(dir.path().to_path_buf());
        let db = dbs.process_queue().await.unwrap();
        let repo = ProcessQueueRepo::new(db);

        repo.create_or_update("a", "spritesheet", 4, "working")
            .await
            .unwrap();
        repo.create_or_update("b", "clip", 2, "working")
            .await
            .unwrap();
        repo.finalize("b", ProcessStatus::Completed, "done")
            .await
            .unwrap();

        let affected = repo
            .recover_startup(QueueRecovery::MarkInterrupted)
            .await
            .unwrap();
        assert_eq!(affected, 1);

        let a = repo.get("a").await.unwrap().unwrap();
        assert_eq!(a.status, ProcessStatus::Interrupted);
        let b = repo.get("b").await.unwrap().unwrap();
        assert_eq!(b.status, ProcessStatus::Completed);
    }

    #[tokio::test]
    async fn startup_recovery_can_delete() {
        let dir = tempdir().unwrap();
        let dbs = Databases::new(dir.path().to_path_buf());
        let db = dbs.process_queue().await.unwrap();
        let repo = ProcessQueueRepo::new(db);

        repo.create_or_update("a", "spritesheet", 4, "working")
            .await
            .unwrap();
        let affected =
            repo.recover_startup(QueueRecovery::Delete).await.unwrap();
        assert_eq!(affected, 1);
        assert!(repo.get("a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn error_finalize_keeps_step() {
        let dir = tempdir().unwrap();
        let dbs = Databases::new(dir.path().to_path_buf());
        let db = dbs.process_queue().await.unwrap();
        let repo = ProcessQueueRepo::new(db);

        repo.create_or_update("a", "spritesheet", 4, "working")
            .await
            .unwrap();
        repo.update("a", 2, None, None).await.unwrap();
        repo.finalize("a", ProcessStatus::Error, "ffmpeg failed")
            .await
            .unwrap();

        let record = repo.get("a").await.unwrap().unwrap();
        assert_eq!(record.status, ProcessStatus::Error);
        assert_eq!(record.current_step, 2);
        assert_eq!(record.message.as_deref(), Some("ffmpeg failed"));
    }
}
