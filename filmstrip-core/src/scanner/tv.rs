//! TV library pass.

use super::enrich;
use super::episodes::{is_valid_episode, parse_episode, parse_season_dir};
use super::hash::hash_directory;
use super::{
    collect_subtitles, file_mtime_ms, list_files, list_subdirs, ScanStats,
    Scanner, SCAN_CONCURRENCY,
};
use crate::db::CatalogRepo;
use crate::error::Result;
use filmstrip_model::{
    EpisodeData, MediaType, MovieUrls, SeasonEntry, ShowRecord,
};
use futures::stream::{self, StreamExt};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use tracing::{debug, error, info};

/// Stable episode identifier: a function of `(show, season, episode)`
/// only, so it survives rescans and file renames within the slot.
pub fn episode_id(show: &str, season: u32, episode: u32) -> String {
    let digest = Sha256::digest(
        format!("{show}|S{season:02}|E{episode:02}").as_bytes(),
    );
    hex::encode(digest)[..24].to_string()
}

/// Stable show identifier, a function of the show name.
pub fn show_id(show: &str) -> String {
    let digest = Sha256::digest(show.as_bytes());
    hex::encode(digest)[..24].to_string()
}

impl Scanner {
    pub async fn scan_tv(&self) -> Result<ScanStats> {
        let root = self.config.tv_root();
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
                    let outcome = self.scan_show_dir(&repo, &name, &path).await;
                    (name, outcome)
                }
            })
            .buffer_unordered(SCAN_CONCURRENCY)
            .collect::<Vec<_>>()
            .await;

        for (name, outcome) in outcomes {
            match outcome {
                Ok(true) => stats.updated += 1,
                Ok(false) => stats.skipped += 1,
                Err(e) => {
                    error!("Failed to scan show '{name}': {e}");
                    stats.errors += 1;
                }
            }
        }

        let on_disk: HashSet<String> =
            dirs.into_iter().map(|(name, _)| name).collect();
        for name in repo.show_names().await? {
            if !on_disk.contains(&name) {
                info!("Show directory '{name}' vanished; deleting row");
                repo.delete_show(&name).await?;
                stats.deleted += 1;
            }
        }

        Ok(stats)
    }

    async fn scan_show_dir(
        &self,
        repo: &CatalogRepo<'_>,
        name: &str,
        dir: &Path,
    ) -> Result<bool> {
        let hash = hash_directory(dir).await?;
        if repo.show_directory_hash(name).await?.as_deref()
            == Some(hash.as_str())
        {
            debug!("Show '{name}' unchanged; skipping");
            return Ok(false);
        }

        let mut files = list_files(dir).await;
        let mut hash = hash;

        if self.show_needs_enrichment(&files)
            && enrich::should_attempt_and_mark(
                repo,
                name,
                self.config.enrichment_retry_hours,
            )
            .await?
        {
            enrich::run_enrichment(
                self.config.enrichment_bin.as_deref(),
                MediaType::Tv,
                name,
            )
            .await?;
            files = list_files(dir).await;
            hash = hash_directory(dir).await?;
        }

        let record = self
            .build_show_record(repo, name, dir, &files, hash)
            .await?;
        repo.upsert_show(&record).await?;
        info!("Updated show '{name}'");
        Ok(true)
    }

    fn show_needs_enrichment(&self, files: &[String]) -> bool {
        let has_poster = files.iter().any(|f| f == "poster.jpg");
        let has_metadata = files.iter().any(|f| f == "metadata.json");
        !(has_poster && has_metadata)
    }

    async fn build_show_record(
        &self,
        repo: &CatalogRepo<'_>,
        name: &str,
        dir: &Path,
        files: &[String],
        hash: String,
    ) -> Result<ShowRecord> {
        let existing = repo.get_show(name).await?;

        let mut urls = MovieUrls::default();
        let mut poster_ref = None;
        let mut backdrop_ref = None;
        let mut logo_ref = None;

        if files.iter().any(|f| f == "poster.jpg") {
            let url = self.public_url(&["tv", name, "poster.jpg"]);
            poster_ref = self
                .image_ref(
                    &dir.join("poster.jpg"),
                    existing.as_ref().and_then(|s| s.poster_ref.as_ref()),
                )
                .await;
            urls.poster_blurhash =
                self.blurhash_for(&url, &dir.join("poster.jpg")).await;
            urls.poster = Some(url);
        }
        if files.iter().any(|f| f == "backdrop.jpg") {
            let url = self.public_url(&["tv", name, "backdrop.jpg"]);
            backdrop_ref = self
                .image_ref(
                    &dir.join("backdrop.jpg"),
                    existing.as_ref().and_then(|s| s.backdrop_ref.as_ref()),
                )
                .await;
            urls.backdrop_blurhash =
                self.blurhash_for(&url, &dir.join("backdrop.jpg")).await;
            urls.backdrop = Some(url);
        }
        if files.iter().any(|f| f == "logo.png") {
            urls.logo = Some(self.public_url(&["tv", name, "logo.png"]));
            logo_ref = self
                .image_ref(
                    &dir.join("logo.png"),
                    existing.as_ref().and_then(|s| s.logo_ref.as_ref()),
                )
                .await;
        }
        if files.iter().any(|f| f == "metadata.json") {
            urls.metadata =
                Some(self.public_url(&["tv", name, "metadata.json"]));
        }

        let mut seasons = BTreeMap::new();
        let mut show_hdr: Option<String> = None;
        for (season_name, season_path) in list_subdirs(dir).await {
            let Some(season_number) = parse_season_dir(&season_name) else {
                continue;
            };
            match self
                .build_season_entry(name, season_number, &season_name, &season_path)
                .await?
            {
                // A season with zero valid episodes never reaches the map.
                None => continue,
                Some((entry, hdr)) => {
                    show_hdr = show_hdr.or(hdr);
                    seasons.insert(season_name, entry);
                }
            }
        }

        let mut additional_metadata = serde_json::Map::new();
        if files.iter().any(|f| f == "tmdb.config") {
            additional_metadata
                .insert("tmdbConfig".to_string(), serde_json::Value::Bool(true));
        }

        Ok(ShowRecord {
            name: name.to_string(),
            seasons,
            urls,
            hdr: show_hdr,
            additional_metadata: serde_json::Value::Object(additional_metadata),
            id: show_id(name),
            directory_hash: Some(hash),
            poster_ref,
            backdrop_ref,
            logo_ref,
        })
    }

    /// Build the season entry, or `None` when the directory holds no
    /// valid episode. Also reports the first HDR classifier seen.
    async fn build_season_entry(
        &self,
        show: &str,
        season_number: u32,
        season_name: &str,
        season_path: &Path,
    ) -> Result<Option<(SeasonEntry, Option<String>)>> {
        let files = list_files(season_path).await;
        let episode_files: Vec<&String> =
            files.iter().filter(|f| is_valid_episode(f)).collect();
        if episode_files.is_empty() {
            debug!(
                "Season directory '{season_name}' of '{show}' has no valid episodes; skipping"
            );
            return Ok(None);
        }

        let mut entry = SeasonEntry::default();
        let mut hdr = None;

        let mut mtimes = BTreeMap::new();
        for file in &files {
            if let Some(mtime) = file_mtime_ms(&season_path.join(file)).await {
                mtimes.insert(file.to_string(), mtime);
            }
        }

        for file in episode_files {
            let Some(parsed) = parse_episode(file) else {
                continue;
            };
            let episode_number = parsed.episode;
            let season_for_id = parsed.season.unwrap_or(season_number);
            let episode_path = season_path.join(file);
            let stem = file.trim_end_matches(".mp4");

            let media_info = match self.info.get_or_create(&episode_path).await
            {
                Ok(info) => info,
                Err(e) => {
                    error!(
                        "Skipping unprobable episode {}: {e}",
                        episode_path.display()
                    );
                    continue;
                }
            };
            hdr = hdr.or_else(|| media_info.hdr.clone());

            let thumbnail_file = format!("{stem}_thumbnail.jpg");
            let thumbnail_path = season_path.join(&thumbnail_file);
            let (thumbnail, thumbnail_blurhash) = if thumbnail_path.is_file() {
                let url = self.public_url(&[
                    "tv",
                    show,
                    season_name,
                    &thumbnail_file,
                ]);
                let hash = self.blurhash_for(&url, &thumbnail_path).await;
                (Some(url), hash)
            } else {
                (None, None)
            };

            let metadata_file = format!("{stem}_metadata.json");
            let metadata = season_path
                .join(&metadata_file)
                .is_file()
                .then(|| {
                    self.public_url(&["tv", show, season_name, &metadata_file])
                });

            let chapters_file = format!("{stem}_chapters.vtt");
            let chapters = season_path
                .join("chapters")
                .join(&chapters_file)
                .is_file()
                .then(|| {
                    self.public_url(&[
                        "tv",
                        show,
                        season_name,
                        "chapters",
                        &chapters_file,
                    ])
                });

            let data = EpisodeData {
                video_url: self.public_url(&["tv", show, season_name, file]),
                media_last_modified: chrono::DateTime::from_timestamp_millis(
                    mtimes.get(file.as_str()).copied().unwrap_or(0),
                )
                .unwrap_or_default(),
                episode_number,
                thumbnail,
                thumbnail_blurhash,
                metadata,
                chapters,
                subtitles: collect_subtitles(
                    &files,
                    stem,
                    |sub| self.public_url(&["tv", show, season_name, sub]),
                    &mtimes,
                ),
                id: episode_id(show, season_for_id, episode_number),
            };

            entry
                .lengths
                .insert(file.to_string(), media_info.length);
            entry
                .dimensions
                .insert(file.to_string(), media_info.dimensions.clone());
            entry.file_names.push(file.to_string());
            entry.urls.insert(file.to_string(), data);
        }

        if entry.urls.is_empty() {
            return Ok(None);
        }

        let poster_file = season_path.join("season_poster.jpg");
        if poster_file.is_file() {
            let url = self.public_url(&[
                "tv",
                show,
                season_name,
                "season_poster.jpg",
            ]);
            entry.season_poster_blurhash =
                self.blurhash_for(&url, &poster_file).await;
            entry.season_poster = Some(url);
        }

        Ok(Some((entry, hdr)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn episode_ids_are_stable_and_distinct() {
        let a = episode_id("Show X", 2, 5);
        assert_eq!(a, episode_id("Show X", 2, 5));
        assert_ne!(a, episode_id("Show X", 2, 6));
        assert_ne!(a, episode_id("Show X", 3, 5));
        assert_ne!(a, episode_id("Show Y", 2, 5));
        assert_eq!(a.len(), 24);
    }

    #[test]
    fn show_ids_are_stable() {
        assert_eq!(show_id("Show X"), show_id("Show X"));
        assert_ne!(show_id("Show X"), show_id("Show Y"));
    }
}
