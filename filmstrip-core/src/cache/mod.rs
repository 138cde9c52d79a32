//! Tiered on-disk cache for derived artifacts.
//!
//! Four roots under one parent, each with its own TTL policy swept on a
//! timer (see [`sweeper`]). Filenames are deterministic in the logical
//! identity and the video UUID so cache hits need no index.

pub mod names;
pub mod sweeper;

pub use names::{
    clip_file_name, frame_file_name, sanitize, sprite_identity_prefix,
    sprite_stem, version_tag, SPRITE_VERSION,
};

use crate::error::Result;
use filmstrip_model::MediaTarget;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

/// Output format of a sprite sheet on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpriteFormat {
    Avif,
    Png,
}

impl SpriteFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            SpriteFormat::Avif => "avif",
            SpriteFormat::Png => "png",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            SpriteFormat::Avif => "image/avif",
            SpriteFormat::Png => "image/png",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "avif" => Some(SpriteFormat::Avif),
            "png" => Some(SpriteFormat::Png),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CacheStore {
    root: PathBuf,
}

impl CacheStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Create all four cache roots.
    pub async fn ensure_dirs(&self) -> Result<()> {
        for dir in [
            self.general_dir(),
            self.frames_dir(),
            self.spritesheet_dir(),
            self.clips_dir(),
        ] {
            fs::create_dir_all(&dir).await?;
        }
        Ok(())
    }

    pub fn general_dir(&self) -> PathBuf {
        self.root.join("general")
    }

    pub fn frames_dir(&self) -> PathBuf {
        self.root.join("frames")
    }

    pub fn spritesheet_dir(&self) -> PathBuf {
        self.root.join("spritesheet")
    }

    pub fn clips_dir(&self) -> PathBuf {
        self.root.join("video_clips")
    }

    pub fn frame_path(&self, target: &MediaTarget, timestamp: &str) -> PathBuf {
        self.frames_dir().join(frame_file_name(target, timestamp))
    }

    pub fn sprite_path(
        &self,
        target: &MediaTarget,
        uuid8: &str,
        format: SpriteFormat,
    ) -> PathBuf {
        self.spritesheet_dir().join(format!(
            "{}.{}",
            sprite_stem(target, uuid8),
            format.extension()
        ))
    }

    pub fn vtt_path(&self, target: &MediaTarget, uuid8: &str) -> PathBuf {
        self.spritesheet_dir()
            .join(format!("{}.vtt", sprite_stem(target, uuid8)))
    }

    pub fn clip_path(&self, video: &Path, start: f64, end: f64) -> PathBuf {
        self.clips_dir().join(clip_file_name(video, start, end))
    }

    /// Find an existing sprite sheet for the current `(identity, uuid8)`
    /// in any format. Preferring AVIF lets a finished conversion win over
    /// the PNG it was produced from.
    pub async fn find_sprite(
        &self,
        target: &MediaTarget,
        uuid8: &str,
    ) -> Option<(PathBuf, SpriteFormat)> {
        for format in [SpriteFormat::Avif, SpriteFormat::Png] {
            let path = self.sprite_path(target, uuid8, format);
            if fs::try_exists(&path).await.unwrap_or(false) {
                return Some((path, format));
            }
        }
        None
    }

    /// Delete sprite artifacts for the same logical identity but a
    /// different video UUID (the source file changed on disk).
    pub async fn remove_stale_sprites(
        &self,
        target: &MediaTarget,
        current_uuid8: &str,
    ) -> Result<usize> {
        let prefix = sprite_identity_prefix(target);
        let current_stem = sprite_stem(target, current_uuid8);
        let mut removed = 0;

        let mut entries = match fs::read_dir(self.spritesheet_dir()).await {
            Ok(entries) => entries,
            Err(_) => return Ok(0),
        };
        while let Ok(Some(entry)) = entries.next_entry().await {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let Some(stem) = name.rsplit_once('.').map(|(stem, _)| stem)
            else {
                continue;
            };
            if stem.starts_with(&prefix) && stem != current_stem {
                debug!("Removing stale sprite artifact {name}");
                if let Err(e) = fs::remove_file(entry.path()).await {
                    warn!("Failed to remove stale artifact {name}: {e}");
                } else {
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }
}
