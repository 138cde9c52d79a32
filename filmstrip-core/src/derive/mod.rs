//! Derivation orchestrator.
//!
//! One flow per request kind (frame, sprite+VTT, chapters, clip). Each
//! flow resolves the logical identifier to a source path through the
//! catalog, probes the cache, and on a miss coalesces the work, drives
//! the adapter and post-processor, and records progress in the process
//! queue.

mod chapters;
mod clip;
mod frame;
mod sprite;

pub use clip::{ClipRequest, MAX_CLIP_SECS};
pub use sprite::SpriteArtifact;

use crate::cache::CacheStore;
use crate::coalesce::Coalescer;
use crate::config::Config;
use crate::db::{CatalogRepo, Databases};
use crate::error::{MediaError, Result};
use crate::ffmpeg::Ffmpeg;
use crate::image::AvifEncoder;
use crate::info::InfoManager;
use filmstrip_model::{MediaInfo, MediaTarget};
use std::path::PathBuf;
use std::sync::Arc;

/// Cache-Control for finished, content-addressed artifacts.
pub const CACHE_IMMUTABLE: &str = "public, max-age=31536000, immutable";

/// Cache-Control while a better rendition is still being produced.
pub const CACHE_SHORT: &str = "max-age=60";

#[derive(Debug)]
pub struct Orchestrator {
    pub(crate) config: Arc<Config>,
    pub(crate) dbs: Arc<Databases>,
    pub(crate) cache: Arc<CacheStore>,
    pub(crate) ffmpeg: Ffmpeg,
    pub(crate) info: InfoManager,
    pub(crate) avif: Arc<AvifEncoder>,
    pub(crate) sprites: Coalescer<MediaTarget>,
    pub(crate) clips: Coalescer<String>,
}

impl Orchestrator {
    pub fn new(
        config: Arc<Config>,
        dbs: Arc<Databases>,
        cache: Arc<CacheStore>,
        ffmpeg: Ffmpeg,
        info: InfoManager,
        avif: Arc<AvifEncoder>,
    ) -> Self {
        Self {
            config,
            dbs,
            cache,
            ffmpeg,
            info,
            avif,
            sprites: Coalescer::new(),
            clips: Coalescer::new(),
        }
    }

    /// Resolve a logical identifier to the source video path through the
    /// catalog. Derivation never resolves paths by probing the disk.
    pub async fn resolve_video_path(
        &self,
        target: &MediaTarget,
    ) -> Result<PathBuf> {
        let db = self.dbs.media().await?;
        let repo = CatalogRepo::new(db);

        match target {
            MediaTarget::Movie { name } => {
                let record = repo.get_movie(name).await?.ok_or_else(|| {
                    MediaError::NotFound(format!("movie '{name}'"))
                })?;
                let mp4 = record
                    .file_names
                    .iter()
                    .find(|f| f.ends_with(".mp4"))
                    .ok_or_else(|| {
                        MediaError::NotFound(format!(
                            "movie '{name}' has no video file"
                        ))
                    })?;
                Ok(self.config.movies_root().join(name).join(mp4))
            }
            MediaTarget::Episode {
                show,
                season,
                episode,
            } => {
                let record = repo.get_show(show).await?.ok_or_else(|| {
                    MediaError::NotFound(format!("show '{show}'"))
                })?;
                let (file, _) =
                    record.find_episode(*season, *episode).ok_or_else(|| {
                        MediaError::NotFound(format!(
                            "episode S{season:02}E{episode:02} of '{show}'"
                        ))
                    })?;
                let season_dir = record
                    .season_dir_name(*season)
                    .ok_or_else(|| {
                        MediaError::NotFound(format!(
                            "season {season} of '{show}'"
                        ))
                    })?
                    .to_string();
                Ok(self
                    .config
                    .tv_root()
                    .join(show)
                    .join(season_dir)
                    .join(file))
            }
        }
    }

    /// Source path plus its info descriptor; the common prologue of
    /// every derivation flow.
    pub(crate) async fn resolve_with_info(
        &self,
        target: &MediaTarget,
    ) -> Result<(PathBuf, MediaInfo)> {
        let path = self.resolve_video_path(target).await?;
        if !path.is_file() {
            return Err(MediaError::SourceMissing(path.display().to_string()));
        }
        let info = self.info.get_or_create(&path).await?;
        Ok((path, info))
    }
}
