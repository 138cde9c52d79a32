//! Movies library pass.

use super::enrich;
use super::episodes::is_transcoder_cache;
use super::hash::hash_directory;
use super::{
    collect_subtitles, file_mtime_ms, list_files, list_subdirs, ScanStats,
    Scanner, SCAN_CONCURRENCY,
};
use crate::db::{refresh_image_ref, CatalogRepo};
use crate::error::{MediaError, Result};
use crate::info::video_uuid;
use filmstrip_model::{ImageRef, MediaType, MovieRecord, MovieUrls};
use futures::stream::{self, StreamExt};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use tracing::{debug, error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DirOutcome {
    Skipped,
    Updated,
}

impl Scanner {
    /// Scan every movie directory, then delete rows whose directory is
    /// gone from disk.
    pub async fn scan_movies(&self) -> Result<ScanStats> {
        let root = self.config.movies_root();
        let dirs = list_subdirs(&root).await;
        let db = self.dbs.media().await?;
        let repo = CatalogRepo::new(db);

        let mut stats = ScanStats {
            scanned: dirs.len(),
            ..Default::default()
        };

        let outcomes = stream::iter(dirs.iter().cloned())
            .map(|(name, path)| {
                let repo = repo.clone();
                async move {
                    let outcome = self.scan_movie_dir(&repo, &name, &path).await;
                    (name, outcome)
                }
            })
            .buffer_unordered(SCAN_CONCURRENCY)
            .collect::<Vec<_>>()
            .await;

        for (name, outcome) in outcomes {
            match outcome {
                Ok(DirOutcome::Skipped) => stats.skipped += 1,
                Ok(DirOutcome::Updated) => stats.updated += 1,
                Err(e) => {
                    error!("Failed to scan movie '{name}': {e}");
                    stats.errors += 1;
                }
            }
        }

        // Directories that vanished take their rows with them.
        let on_disk: HashSet<String> =
            dirs.into_iter().map(|(name, _)| name).collect();
        for name in repo.movie_names().await? {
            if !on_disk.contains(&name) {
                info!("Movie directory '{name}' vanished; deleting row");
                repo.delete_movie(&name).await?;
                stats.deleted += 1;
            }
        }

        Ok(stats)
    }

    async fn scan_movie_dir(
        &self,
        repo: &CatalogRepo<'_>,
        name: &str,
        dir: &Path,
    ) -> Result<DirOutcome> {
        let hash = hash_directory(dir).await?;
        if repo.movie_directory_hash(name).await?.as_deref()
            == Some(hash.as_str())
        {
            debug!("Movie '{name}' unchanged; skipping");
            return Ok(DirOutcome::Skipped);
        }

        let mut files = list_files(dir).await;
        let mut hash = hash;

        // Missing art triggers one rate-limited enrichment attempt, then
        // a re-examination of the directory.
        if self.movie_needs_enrichment(&files)
            && enrich::should_attempt_and_mark(
                repo,
                name,
                self.config.enrichment_retry_hours,
            )
            .await?
        {
            enrich::run_enrichment(
                self.config.enrichment_bin.as_deref(),
                MediaType::Movie,
                name,
            )
            .await?;
            files = list_files(dir).await;
            hash = hash_directory(dir).await?;
        }

        let record = self
            .build_movie_record(repo, name, dir, &files, hash)
            .await?;
        repo.upsert_movie(&record).await?;
        info!("Updated movie '{name}'");
        Ok(DirOutcome::Updated)
    }

    fn movie_needs_enrichment(&self, files: &[String]) -> bool {
        let has_poster = files.iter().any(|f| f == "poster.jpg");
        let has_metadata = files.iter().any(|f| f == "metadata.json");
        !(has_poster && has_metadata)
    }

    async fn build_movie_record(
        &self,
        repo: &CatalogRepo<'_>,
        name: &str,
        dir: &Path,
        files: &[String],
        hash: String,
    ) -> Result<MovieRecord> {
        let mp4 = files
            .iter()
            .find(|f| f.ends_with(".mp4") && !is_transcoder_cache(f))
            .ok_or_else(|| {
                MediaError::NotFound(format!("no mp4 in movie '{name}'"))
            })?
            .clone();
        let mp4_path = dir.join(&mp4);
        let stem = mp4.trim_end_matches(".mp4");

        let media_info = self.info.get_or_create(&mp4_path).await?;
        let id = video_uuid(&mp4_path).await?.simple().to_string();

        let existing = repo.get_movie(name).await?;

        let mut lengths = BTreeMap::new();
        lengths.insert(mp4.clone(), media_info.length);
        let mut dimensions = BTreeMap::new();
        dimensions.insert(mp4.clone(), media_info.dimensions.clone());

        let mut urls = MovieUrls {
            mp4: Some(self.public_url(&["movies", name, &mp4])),
            ..Default::default()
        };

        let mut mtimes = BTreeMap::new();
        for file in files {
            if let Some(mtime) = file_mtime_ms(&dir.join(file)).await {
                mtimes.insert(file.clone(), mtime);
            }
        }
        urls.subtitles = collect_subtitles(
            files,
            stem,
            |file| self.public_url(&["movies", name, file]),
            &mtimes,
        );

        let mut poster_ref = None;
        let mut backdrop_ref = None;
        let mut logo_ref = None;

        if files.iter().any(|f| f == "poster.jpg") {
            let url = self.public_url(&["movies", name, "poster.jpg"]);
            poster_ref = self
                .image_ref(
                    &dir.join("poster.jpg"),
                    existing.as_ref().and_then(|m| m.poster_ref.as_ref()),
                )
                .await;
            urls.poster_blurhash =
                self.blurhash_for(&url, &dir.join("poster.jpg")).await;
            urls.poster = Some(url);
        }
        if files.iter().any(|f| f == "backdrop.jpg") {
            let url = self.public_url(&["movies", name, "backdrop.jpg"]);
            backdrop_ref = self
                .image_ref(
                    &dir.join("backdrop.jpg"),
                    existing.as_ref().and_then(|m| m.backdrop_ref.as_ref()),
                )
                .await;
            urls.backdrop_blurhash =
                self.blurhash_for(&url, &dir.join("backdrop.jpg")).await;
            urls.backdrop = Some(url);
        }
        let logo = ["movie_logo.png", "logo.png"]
            .iter()
            .find(|candidate| files.iter().any(|f| f == *candidate));
        if let Some(logo_file) = logo {
            urls.logo = Some(self.public_url(&["movies", name, logo_file]));
            logo_ref = self
                .image_ref(
                    &dir.join(logo_file),
                    existing.as_ref().and_then(|m| m.logo_ref.as_ref()),
                )
                .await;
        }
        if files.iter().any(|f| f == "metadata.json") {
            urls.metadata =
                Some(self.public_url(&["movies", name, "metadata.json"]));
        }

        let chapters_file = format!("{stem}_chapters.vtt");
        if tokio::fs::try_exists(dir.join("chapters").join(&chapters_file))
            .await
            .unwrap_or(false)
        {
            urls.chapters = Some(self.public_url(&[
                "movies",
                name,
                "chapters",
                &chapters_file,
            ]));
        }

        let mut additional_metadata = serde_json::Map::new();
        if files.iter().any(|f| f == "tmdb.config") {
            additional_metadata
                .insert("tmdbConfig".to_string(), serde_json::Value::Bool(true));
        }

        Ok(MovieRecord {
            name: name.to_string(),
            file_names: files.to_vec(),
            lengths,
            dimensions,
            urls,
            hdr: media_info.hdr.clone(),
            additional_metadata: serde_json::Value::Object(additional_metadata),
            id,
            directory_hash: Some(hash),
            poster_ref,
            backdrop_ref,
            logo_ref,
        })
    }

    pub(super) async fn image_ref(
        &self,
        path: &Path,
        existing: Option<&ImageRef>,
    ) -> Option<ImageRef> {
        let mtime = file_mtime_ms(path).await?;
        Some(refresh_image_ref(existing, mtime))
    }
}
