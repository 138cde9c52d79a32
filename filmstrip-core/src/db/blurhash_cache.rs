//! TTL cache for blurhashes keyed by normalized image URL.

use super::retry::with_retry;
use super::Database;
use crate::error::Result;
use chrono::{DateTime, Duration, Utc};
use sqlx::Row;

/// Entries older than this are treated as absent and overwritten.
const TTL_DAYS: i64 = 90;

/// Strip query and fragment so the same image cached under different
/// size parameters shares one entry.
pub fn normalize_url(url: &str) -> String {
    let end = url
        .find(['?', '#'])
        .unwrap_or(url.len());
    url[..end].trim_end_matches('/').to_string()
}

#[derive(Debug, Clone)]
pub struct BlurhashCache<'a> {
    db: &'a Database,
}

impl<'a> BlurhashCache<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    pub async fn get(&self, url: &str) -> Result<Option<String>> {
        let key = normalize_url(url);
        with_retry("blurhash_cache.get", || async {
            let row = sqlx::query(
                "SELECT blurhash, created_at FROM blurhash_cache WHERE url = ?",
            )
            .bind(&key)
            .fetch_optional(self.db.pool())
            .await?;

            let Some(row) = row else { return Ok(None) };
            let created: Option<DateTime<Utc>> = row
                .get::<String, _>("created_at")
                .parse::<DateTime<Utc>>()
                .ok();
            let fresh = created
                .map(|created| Utc::now() - created < Duration::days(TTL_DAYS))
                .unwrap_or(false);
            Ok(fresh.then(|| row.get("blurhash")))
        })
        .await
    }

    pub async fn put(&self, url: &str, blurhash: &str) -> Result<()> {
        let key = normalize_url(url);
        with_retry("blurhash_cache.put", || async {
            let _write = self.db.write_guard().await;
            sqlx::query(
                "INSERT INTO blurhash_cache (url, blurhash, created_at)
                 VALUES (?, ?, ?)
                 ON CONFLICT(url) DO UPDATE SET
                     blurhash = excluded.blurhash,
                     created_at = excluded.created_at",
            )
            .bind(&key)
            .bind(blurhash)
            .bind(Utc::now().to_rfc3339())
            .execute(self.db.pool())
            .await?;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Databases;
    use tempfile::tempdir;

    #[test]
    fn normalization_drops_query_and_fragment() {
        assert_eq!(
            normalize_url("https://img.example/p.jpg?w=500#top"),
            "https://img.example/p.jpg"
        );
        assert_eq!(
            normalize_url("https://img.example/p.jpg"),
            "https://img.example/p.jpg"
        );
    }

    #[tokio::test]
    async fn put_then_get_ignores_query_params() {
        let dir = tempdir().unwrap();
        let dbs = Databases::new(dir.path().to_path_buf());
        let db = dbs.tmdb().await.unwrap();
        let cache = BlurhashCache::new(db);

        assert!(cache.get("https://x/p.jpg").await.unwrap().is_none());
        cache.put("https://x/p.jpg?w=500", "LEHV6n").await.unwrap();
        assert_eq!(
            cache.get("https://x/p.jpg?w=185").await.unwrap().as_deref(),
            Some("LEHV6n")
        );
    }
}
