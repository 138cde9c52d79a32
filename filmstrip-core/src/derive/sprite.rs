//! Sprite sheets and their VTT cue indexes.
//!
//! The sprite image and the VTT are produced together and share a
//! UUID/version suffix. The grid is rendered as PNG, palette-optimized,
//! and converted to AVIF in the background when the tiled height fits the
//! browser limit; until the conversion lands the PNG is served with a
//! short cache lifetime.

use super::{Orchestrator, CACHE_IMMUTABLE, CACHE_SHORT};
use crate::cache::SpriteFormat;
use crate::coalesce::Role;
use crate::db::ProcessQueueRepo;
use crate::error::{MediaError, Result};
use crate::image::{decide_sprite_format, optimize_png, staging_path, PngOptions};
use crate::vtt::{frame_count, row_count, sprite_vtt, SPRITE_COLUMNS, SPRITE_INTERVAL_SECS};
use filmstrip_model::{MediaInfo, MediaTarget, ProcessStatus};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info};

/// A servable sprite artifact plus its caching directives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpriteArtifact {
    pub path: PathBuf,
    pub content_type: &'static str,
    pub cache_control: &'static str,
}

impl Orchestrator {
    /// Produce (or serve from cache) the sprite sheet for a target.
    pub async fn get_sprite_sheet(
        &self,
        target: &MediaTarget,
    ) -> Result<SpriteArtifact> {
        let (path, media_info) = self.resolve_with_info(target).await?;
        let uuid8 = media_info.uuid8();

        if let Some((cached, format)) =
            self.cache.find_sprite(target, &uuid8).await
        {
            return Ok(self.describe(target, &media_info, cached, format));
        }

        match self.sprites.join(target.clone()) {
            Role::Waiter(waiter) => {
                let served = waiter.wait(None, "sprite sheet").await?;
                let format = sprite_format_of(&served);
                Ok(self.describe(target, &media_info, served, format))
            }
            Role::Producer(guard) => {
                let outcome =
                    self.produce_sprite(target, &path, &media_info).await;
                match outcome {
                    Ok(produced) => {
                        guard.complete(produced.clone());
                        let format = sprite_format_of(&produced);
                        Ok(self.describe(target, &media_info, produced, format))
                    }
                    Err(e) => {
                        error!("Sprite production failed for {target}: {e}");
                        guard.fail(&e);
                        Err(e)
                    }
                }
            }
        }
    }

    /// Produce (or serve from cache) the VTT index belonging to the
    /// sprite sheet.
    pub async fn get_sprite_vtt(
        &self,
        target: &MediaTarget,
    ) -> Result<PathBuf> {
        let (_, media_info) = self.resolve_with_info(target).await?;
        let vtt = self.cache.vtt_path(target, &media_info.uuid8());
        if tokio::fs::try_exists(&vtt).await.unwrap_or(false) {
            return Ok(vtt);
        }

        // The sprite flow writes both artifacts.
        self.get_sprite_sheet(target).await?;
        if tokio::fs::try_exists(&vtt).await.unwrap_or(false) {
            Ok(vtt)
        } else {
            Err(MediaError::Internal(format!(
                "sprite flow did not materialize {}",
                vtt.display()
            )))
        }
    }

    fn describe(
        &self,
        target: &MediaTarget,
        media_info: &MediaInfo,
        path: PathBuf,
        format: SpriteFormat,
    ) -> SpriteArtifact {
        let duration = media_info.length as f64 / 1000.0;
        let rows = row_count(
            frame_count(duration, SPRITE_INTERVAL_SECS),
            SPRITE_COLUMNS,
        );
        let wants_avif = decide_sprite_format(rows, self.config.avif_enabled)
            == SpriteFormat::Avif;

        // A PNG that is due to become AVIF is a stopgap; everything else
        // is final and content-addressed.
        let cache_control = if format == SpriteFormat::Png && wants_avif {
            CACHE_SHORT
        } else {
            CACHE_IMMUTABLE
        };
        debug!("Serving sprite for {target} as {:?}", format);
        SpriteArtifact {
            path,
            content_type: format.content_type(),
            cache_control,
        }
    }

    async fn produce_sprite(
        &self,
        target: &MediaTarget,
        source: &Path,
        media_info: &MediaInfo,
    ) -> Result<PathBuf> {
        let uuid8 = media_info.uuid8();
        let file_key = crate::cache::sprite_stem(target, &uuid8);

        let queue_db = self.dbs.process_queue().await?;
        let queue = ProcessQueueRepo::new(queue_db);
        queue
            .create_or_update(&file_key, "spritesheet", 4, "starting")
            .await?;

        let outcome = self
            .produce_sprite_inner(target, source, media_info, &queue, &file_key)
            .await;

        // The queue row must never be left in-progress, whatever happened.
        match &outcome {
            Ok(_) => {
                queue
                    .finalize(&file_key, ProcessStatus::Completed, "done")
                    .await?;
            }
            Err(e) => {
                let message = e.to_string();
                if let Err(qe) = queue
                    .finalize(&file_key, ProcessStatus::Error, &message)
                    .await
                {
                    error!("Failed to record error in process queue: {qe}");
                }
            }
        }
        outcome
    }

    async fn produce_sprite_inner(
        &self,
        target: &MediaTarget,
        source: &Path,
        media_info: &MediaInfo,
        queue: &ProcessQueueRepo<'_>,
        file_key: &str,
    ) -> Result<PathBuf> {
        let uuid8 = media_info.uuid8();
        let duration = media_info.length as f64 / 1000.0;
        let frames = frame_count(duration, SPRITE_INTERVAL_SECS);
        let rows = row_count(frames, SPRITE_COLUMNS);
        queue
            .update(file_key, 1, None, Some("probed source"))
            .await?;

        // A new generation obsoletes artifacts salted with older UUIDs.
        self.cache.remove_stale_sprites(target, &uuid8).await?;

        let png = self.cache.sprite_path(target, &uuid8, SpriteFormat::Png);
        let render = self
            .ffmpeg
            .render_sprite_sheet(
                source,
                SPRITE_INTERVAL_SECS,
                SPRITE_COLUMNS,
                rows,
                media_info.hdr.is_some(),
                &png,
            )
            .await;
        if let Err(e) = render {
            self.cleanup_partial(&png).await;
            return Err(e);
        }
        queue
            .update(file_key, 2, None, Some("rendered sprite grid"))
            .await?;

        if let Err(e) = optimize_png(&png, PngOptions::default()).await {
            self.cleanup_partial(&png).await;
            return Err(e);
        }
        queue
            .update(file_key, 3, None, Some("optimized sprite image"))
            .await?;

        // Cue rectangles come from the decoded sheet, so rounding in the
        // scaler cannot desynchronize image and index.
        let png_for_dims = png.clone();
        let (sprite_w, sprite_h) =
            tokio::task::spawn_blocking(move || {
                image::image_dimensions(&png_for_dims).map_err(|e| {
                    MediaError::ParseFailed(format!("sprite dimensions: {e}"))
                })
            })
            .await
            .map_err(|e| MediaError::Internal(format!("dims task: {e}")))??;

        let vtt_text = sprite_vtt(
            duration,
            SPRITE_INTERVAL_SECS,
            SPRITE_COLUMNS,
            sprite_w,
            sprite_h,
            &self.public_sprite_url(target),
        );
        let vtt_path = self.cache.vtt_path(target, &uuid8);
        if let Err(e) = tokio::fs::write(&vtt_path, vtt_text).await {
            self.cleanup_partial(&png).await;
            return Err(e.into());
        }

        if decide_sprite_format(rows, self.config.avif_enabled)
            == SpriteFormat::Avif
        {
            self.spawn_avif_conversion(target, &uuid8, &png);
        }

        info!(
            "Sprite sheet ready for {target}: {frames} frames, {rows} rows"
        );
        Ok(png)
    }

    /// Kick the PNG -> AVIF conversion without holding up the response.
    /// The encoder deduplicates per output path; the PNG is removed on
    /// success so the cache probe finds the AVIF from then on.
    fn spawn_avif_conversion(
        &self,
        target: &MediaTarget,
        uuid8: &str,
        png: &Path,
    ) {
        let encoder = Arc::clone(&self.avif);
        let avif = self.cache.sprite_path(target, uuid8, SpriteFormat::Avif);
        let png = png.to_path_buf();
        let target = target.clone();
        tokio::spawn(async move {
            match encoder.convert(&png, &avif, true).await {
                Ok(_) => debug!("Background AVIF ready for {target}"),
                Err(e) => {
                    // The optimized PNG stays behind and keeps serving.
                    error!("AVIF conversion failed for {target}: {e}");
                }
            }
        });
    }

    async fn cleanup_partial(&self, png: &Path) {
        let _ = tokio::fs::remove_file(png).await;
        let _ = tokio::fs::remove_file(staging_path(png)).await;
    }

    /// Canonical public sprite URL embedded in VTT cues.
    fn public_sprite_url(&self, target: &MediaTarget) -> String {
        let base = self.config.file_server_url.trim_end_matches('/');
        match target {
            MediaTarget::Movie { name } => {
                format!("{base}/spritesheet/movie/{name}")
            }
            MediaTarget::Episode {
                show,
                season,
                episode,
            } => format!("{base}/spritesheet/tv/{show}/{season}/{episode}"),
        }
    }
}

fn sprite_format_of(path: &Path) -> SpriteFormat {
    path.extension()
        .and_then(|ext| ext.to_str())
        .and_then(SpriteFormat::from_extension)
        .unwrap_or(SpriteFormat::Png)
}
