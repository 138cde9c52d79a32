//! Intro markers keyed by episode id. Written by a maintenance endpoint,
//! never by the scanner.

use super::retry::with_retry;
use super::Database;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use sqlx::Row;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntroMarker {
    pub episode_id: String,
    #[serde(rename = "introStart")]
    pub intro_start: Option<f64>,
    #[serde(rename = "introEnd")]
    pub intro_end: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct IntrosRepo<'a> {
    db: &'a Database,
}

impl<'a> IntrosRepo<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    pub async fn get(&self, episode_id: &str) -> Result<Option<IntroMarker>> {
        with_retry("intros.get", || async {
            let row =
                sqlx::query("SELECT * FROM intros WHERE episode_id = ?")
                    .bind(episode_id)
                    .fetch_optional(self.db.pool())
                    .await?;
            Ok(row.map(|row| IntroMarker {
                episode_id: row.get("episode_id"),
                intro_start: row.get("intro_start"),
                intro_end: row.get("intro_end"),
            }))
        })
        .await
    }

    pub async fn upsert(&self, marker: &IntroMarker) -> Result<()> {
        with_retry("intros.upsert", || async {
            let _write = self.db.write_guard().await;
            sqlx::query(
                "INSERT INTO intros (episode_id, intro_start, intro_end)
                 VALUES (?, ?, ?)
                 ON CONFLICT(episode_id) DO UPDATE SET
                     intro_start = excluded.intro_start,
                     intro_end = excluded.intro_end",
            )
            .bind(&marker.episode_id)
            .bind(marker.intro_start)
            .bind(marker.intro_end)
            .execute(self.db.pool())
            .await?;
            Ok(())
        })
        .await
    }
}
