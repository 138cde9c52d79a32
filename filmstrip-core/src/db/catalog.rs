//! Catalog repository: movies, tv shows, and missing-data tracking.
//!
//! The scanner is the only writer. JSON-valued columns are encoded on
//! write and safe-parsed on read (malformed JSON decodes to the empty
//! default rather than failing the row).

use super::retry::with_retry;
use super::Database;
use crate::error::Result;
use chrono::{DateTime, Utc};
use filmstrip_model::{ImageRef, MissingDataRecord, MovieRecord, MovieUrls, SeasonEntry, ShowRecord};
use md5::{Digest, Md5};
use serde::de::DeserializeOwned;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::collections::BTreeMap;
use tracing::warn;

/// Hash stitched into outbound image URLs: first 10 hex digits of
/// `md5(mtime)`.
pub fn image_mtime_hash(mtime_ms: i64) -> String {
    let digest = Md5::digest(mtime_ms.to_string().as_bytes());
    hex::encode(digest)[..10].to_string()
}

/// Reuse the stored hash when the file's mtime is unchanged, recompute
/// otherwise.
pub fn refresh_image_ref(existing: Option<&ImageRef>, mtime_ms: i64) -> ImageRef {
    match existing {
        Some(existing) if existing.mtime_ms == mtime_ms => existing.clone(),
        _ => ImageRef {
            hash: image_mtime_hash(mtime_ms),
            mtime_ms,
        },
    }
}

/// Append the cached image hash to an outbound URL. Pure string work; no
/// filesystem access on the read path.
pub fn stitch_image_hash(url: &str, image_ref: Option<&ImageRef>) -> String {
    match image_ref {
        Some(image_ref) => {
            let sep = if url.contains('?') { '&' } else { '?' };
            format!("{url}{sep}hash={}", image_ref.hash)
        }
        None => url.to_string(),
    }
}

fn decode_or_default<T: DeserializeOwned + Default>(
    column: &str,
    raw: &str,
) -> T {
    match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(e) => {
            warn!("Malformed JSON in column {column}: {e}");
            T::default()
        }
    }
}

fn decode_image_ref(raw: Option<String>) -> Option<ImageRef> {
    raw.and_then(|raw| serde_json::from_str(&raw).ok())
}

fn encode<T: serde::Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

fn movie_from_row(row: &SqliteRow) -> MovieRecord {
    MovieRecord {
        name: row.get("name"),
        file_names: decode_or_default(
            "file_names",
            &row.get::<String, _>("file_names"),
        ),
        lengths: decode_or_default("lengths", &row.get::<String, _>("lengths")),
        dimensions: decode_or_default(
            "dimensions",
            &row.get::<String, _>("dimensions"),
        ),
        urls: decode_or_default::<MovieUrls>(
            "urls",
            &row.get::<String, _>("urls"),
        ),
        hdr: row.get("hdr"),
        additional_metadata: decode_or_default(
            "additional_metadata",
            &row.get::<String, _>("additional_metadata"),
        ),
        id: row.get("_id"),
        directory_hash: row.get("directory_hash"),
        poster_ref: decode_image_ref(row.get("poster_hash")),
        backdrop_ref: decode_image_ref(row.get("backdrop_hash")),
        logo_ref: decode_image_ref(row.get("logo_hash")),
    }
}

fn show_from_row(row: &SqliteRow) -> ShowRecord {
    ShowRecord {
        name: row.get("name"),
        seasons: decode_or_default::<BTreeMap<String, SeasonEntry>>(
            "seasons",
            &row.get::<String, _>("seasons"),
        ),
        urls: decode_or_default::<MovieUrls>(
            "urls",
            &row.get::<String, _>("urls"),
        ),
        hdr: row.get("hdr"),
        additional_metadata: decode_or_default(
            "additional_metadata",
            &row.get::<String, _>("additional_metadata"),
        ),
        id: row.get("_id"),
        directory_hash: row.get("directory_hash"),
        poster_ref: decode_image_ref(row.get("poster_hash")),
        backdrop_ref: decode_image_ref(row.get("backdrop_hash")),
        logo_ref: decode_image_ref(row.get("logo_hash")),
    }
}

#[derive(Debug, Clone)]
pub struct CatalogRepo<'a> {
    db: &'a Database,
}

impl<'a> CatalogRepo<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Stored directory hash, used to skip unchanged directories before
    /// any expensive work.
    pub async fn movie_directory_hash(
        &self,
        name: &str,
    ) -> Result<Option<String>> {
        with_retry("movie_directory_hash", || async {
            let row = sqlx::query(
                "SELECT directory_hash FROM movies WHERE name = ?",
            )
            .bind(name)
            .fetch_optional(self.db.pool())
            .await?;
            Ok(row.and_then(|row| row.get("directory_hash")))
        })
        .await
    }

    pub async fn show_directory_hash(
        &self,
        name: &str,
    ) -> Result<Option<String>> {
        with_retry("show_directory_hash", || async {
            let row = sqlx::query(
                "SELECT directory_hash FROM tv_shows WHERE name = ?",
            )
            .bind(name)
            .fetch_optional(self.db.pool())
            .await?;
            Ok(row.and_then(|row| row.get("directory_hash")))
        })
        .await
    }

    /// UPSERT a movie row. The conditional `WHERE` makes re-upserting an
    /// unchanged row a no-op at the storage layer.
    pub async fn upsert_movie(&self, record: &MovieRecord) -> Result<()> {
        let file_names = encode(&record.file_names)?;
        let lengths = encode(&record.lengths)?;
        let dimensions = encode(&record.dimensions)?;
        let urls = encode(&record.urls)?;
        let additional = encode(&record.additional_metadata)?;
        let poster = record.poster_ref.as_ref().map(encode).transpose()?;
        let backdrop = record.backdrop_ref.as_ref().map(encode).transpose()?;
        let logo = record.logo_ref.as_ref().map(encode).transpose()?;

        with_retry("upsert_movie", || async {
            let _write = self.db.write_guard().await;
            sqlx::query(
                "INSERT INTO movies (
                    name, file_names, lengths, dimensions, urls, hdr,
                    additional_metadata, _id, directory_hash,
                    poster_hash, backdrop_hash, logo_hash
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(name) DO UPDATE SET
                    file_names = excluded.file_names,
                    lengths = excluded.lengths,
                    dimensions = excluded.dimensions,
                    urls = excluded.urls,
                    hdr = excluded.hdr,
                    additional_metadata = excluded.additional_metadata,
                    _id = excluded._id,
                    directory_hash = excluded.directory_hash,
                    poster_hash = excluded.poster_hash,
                    backdrop_hash = excluded.backdrop_hash,
                    logo_hash = excluded.logo_hash
                WHERE movies.directory_hash IS NULL
                   OR movies.directory_hash <> excluded.directory_hash",
            )
            .bind(&record.name)
            .bind(&file_names)
            .bind(&lengths)
            .bind(&dimensions)
            .bind(&urls)
            .bind(&record.hdr)
            .bind(&additional)
            .bind(&record.id)
            .bind(&record.directory_hash)
            .bind(&poster)
            .bind(&backdrop)
            .bind(&logo)
            .execute(self.db.pool())
            .await?;
            Ok(())
        })
        .await
    }

    pub async fn upsert_show(&self, record: &ShowRecord) -> Result<()> {
        let seasons = encode(&record.seasons)?;
        let urls = encode(&record.urls)?;
        let additional = encode(&record.additional_metadata)?;
        let poster = record.poster_ref.as_ref().map(encode).transpose()?;
        let backdrop = record.backdrop_ref.as_ref().map(encode).transpose()?;
        let logo = record.logo_ref.as_ref().map(encode).transpose()?;

        with_retry("upsert_show", || async {
            let _write = self.db.write_guard().await;
            sqlx::query(
                "INSERT INTO tv_shows (
                    name, seasons, urls, hdr, additional_metadata, _id,
                    directory_hash, poster_hash, backdrop_hash, logo_hash
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(name) DO UPDATE SET
                    seasons = excluded.seasons,
                    urls = excluded.urls,
                    hdr = excluded.hdr,
                    additional_metadata = excluded.additional_metadata,
                    _id = excluded._id,
                    directory_hash = excluded.directory_hash,
                    poster_hash = excluded.poster_hash,
                    backdrop_hash = excluded.backdrop_hash,
                    logo_hash = excluded.logo_hash
                WHERE tv_shows.directory_hash IS NULL
                   OR tv_shows.directory_hash <> excluded.directory_hash",
            )
            .bind(&record.name)
            .bind(&seasons)
            .bind(&urls)
            .bind(&record.hdr)
            .bind(&additional)
            .bind(&record.id)
            .bind(&record.directory_hash)
            .bind(&poster)
            .bind(&backdrop)
            .bind(&logo)
            .execute(self.db.pool())
            .await?;
            Ok(())
        })
        .await
    }

    pub async fn get_movie(&self, name: &str) -> Result<Option<MovieRecord>> {
        with_retry("get_movie", || async {
            let row = sqlx::query("SELECT * FROM movies WHERE name = ?")
                .bind(name)
                .fetch_optional(self.db.pool())
                .await?;
            Ok(row.as_ref().map(movie_from_row))
        })
        .await
    }

    pub async fn get_show(&self, name: &str) -> Result<Option<ShowRecord>> {
        with_retry("get_show", || async {
            let row = sqlx::query("SELECT * FROM tv_shows WHERE name = ?")
                .bind(name)
                .fetch_optional(self.db.pool())
                .await?;
            Ok(row.as_ref().map(show_from_row))
        })
        .await
    }

    pub async fn all_movies(&self) -> Result<Vec<MovieRecord>> {
        with_retry("all_movies", || async {
            let rows = sqlx::query("SELECT * FROM movies ORDER BY name")
                .fetch_all(self.db.pool())
                .await?;
            Ok(rows.iter().map(movie_from_row).collect())
        })
        .await
    }

    pub async fn all_shows(&self) -> Result<Vec<ShowRecord>> {
        with_retry("all_shows", || async {
            let rows = sqlx::query("SELECT * FROM tv_shows ORDER BY name")
                .fetch_all(self.db.pool())
                .await?;
            Ok(rows.iter().map(show_from_row).collect())
        })
        .await
    }

    pub async fn movie_names(&self) -> Result<Vec<String>> {
        with_retry("movie_names", || async {
            let rows = sqlx::query("SELECT name FROM movies")
                .fetch_all(self.db.pool())
                .await?;
            Ok(rows.iter().map(|row| row.get("name")).collect())
        })
        .await
    }

    pub async fn show_names(&self) -> Result<Vec<String>> {
        with_retry("show_names", || async {
            let rows = sqlx::query("SELECT name FROM tv_shows")
                .fetch_all(self.db.pool())
                .await?;
            Ok(rows.iter().map(|row| row.get("name")).collect())
        })
        .await
    }

    /// Drop the catalog row for a directory that vanished from disk.
    pub async fn delete_movie(&self, name: &str) -> Result<()> {
        with_retry("delete_movie", || async {
            let _write = self.db.write_guard().await;
            sqlx::query("DELETE FROM movies WHERE name = ?")
                .bind(name)
                .execute(self.db.pool())
                .await?;
            Ok(())
        })
        .await
    }

    pub async fn delete_show(&self, name: &str) -> Result<()> {
        with_retry("delete_show", || async {
            let _write = self.db.write_guard().await;
            sqlx::query("DELETE FROM tv_shows WHERE name = ?")
                .bind(name)
                .execute(self.db.pool())
                .await?;
            Ok(())
        })
        .await
    }

    /// When the enrichment tool last ran for this item, if ever.
    pub async fn enrichment_last_attempt(
        &self,
        name: &str,
    ) -> Result<Option<DateTime<Utc>>> {
        with_retry("enrichment_last_attempt", || async {
            let row = sqlx::query(
                "SELECT last_attempt FROM missing_data_media WHERE name = ?",
            )
            .bind(name)
            .fetch_optional(self.db.pool())
            .await?;
            Ok(row
                .and_then(|row| {
                    row.get::<String, _>("last_attempt")
                        .parse::<DateTime<Utc>>()
                        .ok()
                }))
        })
        .await
    }

    pub async fn record_enrichment_attempt(
        &self,
        record: &MissingDataRecord,
    ) -> Result<()> {
        with_retry("record_enrichment_attempt", || async {
            let _write = self.db.write_guard().await;
            sqlx::query(
                "INSERT INTO missing_data_media (name, last_attempt)
                 VALUES (?, ?)
                 ON CONFLICT(name) DO UPDATE SET
                     last_attempt = excluded.last_attempt",
            )
            .bind(&record.name)
            .bind(record.last_attempt.to_rfc3339())
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

    fn movie(name: &str, hash: &str) -> MovieRecord {
        MovieRecord {
            name: name.into(),
            file_names: vec![format!("{name}.mp4")],
            id: "deadbeef".into(),
            directory_hash: Some(hash.into()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn upsert_then_read_round_trips() {
        let dir = tempdir().unwrap();
        let dbs = Databases::new(dir.path().to_path_buf());
        let db = dbs.media().await.unwrap();
        let repo = CatalogRepo::new(db);

        repo.upsert_movie(&movie("Example", "h1")).await.unwrap();
        let read = repo.get_movie("Example").await.unwrap().unwrap();
        assert_eq!(read.name, "Example");
        assert_eq!(read.file_names, vec!["Example.mp4".to_string()]);
        assert_eq!(read.directory_hash.as_deref(), Some("h1"));

        assert!(repo.get_movie("Other").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unchanged_hash_preserves_existing_row() {
        let dir = tempdir().unwrap();
        let dbs = Databases::new(dir.path().to_path_buf());
        let db = dbs.media().await.unwrap();
        let repo = CatalogRepo::new(db);

        repo.upsert_movie(&movie("Example", "h1")).await.unwrap();

        // Same hash, different payload: conditional update must not fire.
        let mut changed = movie("Example", "h1");
        changed.file_names = vec!["Renamed.mp4".into()];
        repo.upsert_movie(&changed).await.unwrap();
        let read = repo.get_movie("Example").await.unwrap().unwrap();
        assert_eq!(read.file_names, vec!["Example.mp4".to_string()]);

        // New hash: update fires.
        let mut changed = movie("Example", "h2");
        changed.file_names = vec!["Renamed.mp4".into()];
        repo.upsert_movie(&changed).await.unwrap();
        let read = repo.get_movie("Example").await.unwrap().unwrap();
        assert_eq!(read.file_names, vec!["Renamed.mp4".to_string()]);
    }

    #[tokio::test]
    async fn delete_removes_row() {
        let dir = tempdir().unwrap();
        let dbs = Databases::new(dir.path().to_path_buf());
        let db = dbs.media().await.unwrap();
        let repo = CatalogRepo::new(db);

        repo.upsert_movie(&movie("Example", "h1")).await.unwrap();
        repo.delete_movie("Example").await.unwrap();
        assert!(repo.get_movie("Example").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn enrichment_attempts_round_trip() {
        let dir = tempdir().unwrap();
        let dbs = Databases::new(dir.path().to_path_buf());
        let db = dbs.media().await.unwrap();
        let repo = CatalogRepo::new(db);

        assert!(repo
            .enrichment_last_attempt("Example")
            .await
            .unwrap()
            .is_none());

        let when = Utc::now();
        repo.record_enrichment_attempt(&MissingDataRecord {
            name: "Example".into(),
            last_attempt: when,
        })
        .await
        .unwrap();

        let read = repo
            .enrichment_last_attempt("Example")
            .await
            .unwrap()
            .unwrap();
        assert!((read - when).num_seconds().abs() < 1);
    }

    #[test]
    fn image_hash_is_ten_hex_of_md5_mtime() {
        let hash = image_mtime_hash(1_700_000_000_000);
        assert_eq!(hash.len(), 10);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
        // Deterministic.
        assert_eq!(hash, image_mtime_hash(1_700_000_000_000));
        assert_ne!(hash, image_mtime_hash(1_700_000_000_001));
    }

    #[test]
    fn refresh_reuses_hash_for_unchanged_mtime() {
        let first = refresh_image_ref(None, 1000);
        let second = refresh_image_ref(Some(&first), 1000);
        assert_eq!(first, second);
        let third = refresh_image_ref(Some(&first), 2000);
        assert_ne!(first.hash, third.hash);
    }

    #[test]
    fn stitch_appends_hash_query() {
        let image_ref = ImageRef {
            hash: "abcdef0123".into(),
            mtime_ms: 0,
        };
        assert_eq!(
            stitch_image_hash("/movies/Example/poster.jpg", Some(&image_ref)),
            "/movies/Example/poster.jpg?hash=abcdef0123"
        );
        assert_eq!(
            stitch_image_hash("/p.jpg?w=500", Some(&image_ref)),
            "/p.jpg?w=500&hash=abcdef0123"
        );
        assert_eq!(stitch_image_hash("/p.jpg", None), "/p.jpg");
    }
}
