//! Single-frame stills. Latency-critical: no process-queue entry.

use super::Orchestrator;
use crate::error::Result;
use crate::timefmt::parse_timestamp;
use filmstrip_model::MediaTarget;
use std::path::PathBuf;
use tracing::debug;

impl Orchestrator {
    /// Produce (or serve from cache) an AVIF still at `timestamp`, which
    /// may be plain seconds or `HH:MM:SS`.
    pub async fn get_frame(
        &self,
        target: &MediaTarget,
        timestamp: &str,
    ) -> Result<PathBuf> {
        let seconds = parse_timestamp(timestamp)?;
        let out = self.cache.frame_path(target, timestamp);

        if tokio::fs::try_exists(&out).await.unwrap_or(false) {
            debug!("Frame cache hit: {}", out.display());
            return Ok(out);
        }

        let (path, info) = self.resolve_with_info(target).await?;
        if let Err(e) = self
            .ffmpeg
            .render_frame(&path, seconds, info.hdr.is_some(), &out)
            .await
        {
            let _ = tokio::fs::remove_file(&out).await;
            return Err(e);
        }
        Ok(out)
    }
}
