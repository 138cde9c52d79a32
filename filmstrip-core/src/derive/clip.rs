//! Short trimmed clips, stream-copied out of the source container.

use super::Orchestrator;
use crate::cache::clip_file_name;
use crate::coalesce::Role;
use crate::db::ProcessQueueRepo;
use crate::error::{MediaError, Result};
use filmstrip_model::{MediaTarget, ProcessStatus};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, error};

/// Longest clip a single request may extract.
pub const MAX_CLIP_SECS: f64 = 300.0;

/// How long a coalesced waiter holds on for the producer's clip.
const WAITER_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipRequest {
    pub start: f64,
    pub end: f64,
}

impl ClipRequest {
    /// Validate the request bounds against the video duration.
    pub fn validate(&self, duration_secs: f64) -> Result<()> {
        if !self.start.is_finite() || !self.end.is_finite() {
            return Err(MediaError::BadRequest(
                "start and end must be numbers".to_string(),
            ));
        }
        if self.start < 0.0 {
            return Err(MediaError::BadRequest(
                "start must not be negative".to_string(),
            ));
        }
        if self.end <= self.start {
            return Err(MediaError::BadRequest(
                "end must be greater than start".to_string(),
            ));
        }
        if self.end - self.start > MAX_CLIP_SECS {
            return Err(MediaError::BadRequest(format!(
                "clip length exceeds {MAX_CLIP_SECS} seconds"
            )));
        }
        if self.end > duration_secs {
            return Err(MediaError::BadRequest(
                "end is beyond the video duration".to_string(),
            ));
        }
        Ok(())
    }
}

impl Orchestrator {
    /// Produce (or serve from cache) a trimmed clip.
    pub async fn get_clip(
        &self,
        target: &MediaTarget,
        request: ClipRequest,
    ) -> Result<PathBuf> {
        let (path, media_info) = self.resolve_with_info(target).await?;
        request.validate(media_info.length as f64 / 1000.0)?;

        let out = self.cache.clip_path(&path, request.start, request.end);
        if tokio::fs::try_exists(&out).await.unwrap_or(false) {
            debug!("Clip cache hit: {}", out.display());
            return Ok(out);
        }

        let key = clip_file_name(&path, request.start, request.end);
        match self.clips.join(key.clone()) {
            Role::Waiter(waiter) => {
                waiter.wait(Some(WAITER_TIMEOUT), "clip").await
            }
            Role::Producer(guard) => {
                let outcome = self
                    .produce_clip(&key, &path, request, &out)
                    .await;
                match outcome {
                    Ok(()) => {
                        guard.complete(out.clone());
                        Ok(out)
                    }
                    Err(e) => {
                        error!("Clip production failed: {e}");
                        guard.fail(&e);
                        Err(e)
                    }
                }
            }
        }
    }

    async fn produce_clip(
        &self,
        file_key: &str,
        source: &std::path::Path,
        request: ClipRequest,
        out: &std::path::Path,
    ) -> Result<()> {
        let queue_db = self.dbs.process_queue().await?;
        let queue = ProcessQueueRepo::new(queue_db);
        queue
            .create_or_update(file_key, "videoClip", 1, "extracting")
            .await?;

        let render = self
            .ffmpeg
            .render_clip(source, request.start, request.end, out)
            .await;

        match render {
            Ok(()) => {
                queue
                    .finalize(file_key, ProcessStatus::Completed, "done")
                    .await?;
                Ok(())
            }
            Err(e) => {
                // Never leave a truncated clip where the cache probe
                // would find it.
                let _ = tokio::fs::remove_file(out).await;
                let message = e.to_string();
                if let Err(qe) = queue
                    .finalize(file_key, ProcessStatus::Error, &message)
                    .await
                {
                    error!("Failed to record clip error in queue: {qe}");
                }
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clip_bounds() {
        let ok = ClipRequest {
            start: 10.0,
            end: 40.0,
        };
        assert!(ok.validate(602.4).is_ok());

        // end == start
        assert!(ClipRequest {
            start: 10.0,
            end: 10.0
        }
        .validate(602.4)
        .is_err());

        // Exactly the cap is allowed.
        assert!(ClipRequest {
            start: 0.0,
            end: 300.0
        }
        .validate(602.4)
        .is_ok());

        // A hair over the cap is not.
        assert!(ClipRequest {
            start: 0.0,
            end: 300.0001
        }
        .validate(602.4)
        .is_err());

        // Beyond the duration.
        assert!(ClipRequest {
            start: 500.0,
            end: 700.0
        }
        .validate(602.4)
        .is_err());

        // Negative start.
        assert!(ClipRequest {
            start: -1.0,
            end: 10.0
        }
        .validate(602.4)
        .is_err());

        assert!(ClipRequest {
            start: f64::NAN,
            end: 10.0
        }
        .validate(602.4)
        .is_err());
    }
}
