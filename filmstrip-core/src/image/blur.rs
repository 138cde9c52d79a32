//! Blurhash generation for posters, backdrops, and episode thumbnails.
//!
//! Either shells out to the blurhash CLI or computes in-process with the
//! `blurhash` crate (`USE_NATIVE_BLURHASH`). Results are written to a
//! `<image>.blurhash` side-file; concurrent generations for the same
//! image are deduplicated and the pool is bounded.

use crate::coalesce::{Coalescer, Role};
use crate::error::{MediaError, Result};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tokio::sync::Semaphore;
use tracing::debug;

const COMPONENTS_X: u32 = 4;
const COMPONENTS_Y: u32 = 3;

#[derive(Debug)]
pub struct BlurhashService {
    bin: String,
    native: bool,
    permits: Arc<Semaphore>,
    inflight: Coalescer<PathBuf>,
}

impl BlurhashService {
    pub fn new(bin: String, native: bool, concurrency: usize) -> Self {
        Self {
            bin,
            native,
            permits: Arc::new(Semaphore::new(concurrency.max(1))),
            inflight: Coalescer::new(),
        }
    }

    /// Side-file the hash is persisted to.
    pub fn side_file(image: &Path) -> PathBuf {
        let mut os = image.as_os_str().to_os_string();
        os.push(".blurhash");
        PathBuf::from(os)
    }

    /// Return the blurhash for an image, computing and persisting it on
    /// first request.
    pub async fn get_or_compute(&self, image: &Path) -> Result<String> {
        let side_file = Self::side_file(image);
        if let Ok(cached) = tokio::fs::read_to_string(&side_file).await {
            let cached = cached.trim().to_string();
            if !cached.is_empty() {
                return Ok(cached);
            }
        }

        let resolved = match self.inflight.join(side_file.clone()) {
            Role::Waiter(waiter) => waiter.wait(None, "blurhash").await?,
            Role::Producer(guard) => {
                let outcome = self.compute_and_store(image, &side_file).await;
                match outcome {
                    Ok(()) => {
                        guard.complete(side_file.clone());
                        side_file
                    }
                    Err(e) => {
                        guard.fail(&e);
                        return Err(e);
                    }
                }
            }
        };

        let hash = tokio::fs::read_to_string(&resolved).await?;
        Ok(hash.trim().to_string())
    }

    async fn compute_and_store(
        &self,
        image: &Path,
        side_file: &Path,
    ) -> Result<()> {
        if !image.is_file() {
            return Err(MediaError::SourceMissing(image.display().to_string()));
        }

        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| MediaError::Internal("blurhash pool closed".into()))?;

        let hash = if self.native {
            native_blurhash(image.to_path_buf()).await?
        } else {
            self.cli_blurhash(image).await?
        };

        tokio::fs::write(side_file, &hash).await?;
        debug!("Blurhash for {}: {hash}", image.display());
        Ok(())
    }

    async fn cli_blurhash(&self, image: &Path) -> Result<String> {
        let output = Command::new(&self.bin)
            .arg(image)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(MediaError::Io)?;

        if !output.status.success() {
            return Err(MediaError::ToolFailed {
                tool: "blurhash",
                code: output.status.code().unwrap_or(-1),
                stderr: crate::ffmpeg::stderr_tail(&output.stderr),
            });
        }

        let hash = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if hash.is_empty() {
            return Err(MediaError::ParseFailed(
                "blurhash CLI produced no output".to_string(),
            ));
        }
        Ok(hash)
    }
}

async fn native_blurhash(image: PathBuf) -> Result<String> {
    tokio::task::spawn_blocking(move || {
        let decoded = image::open(&image)
            .map_err(|e| {
                MediaError::ParseFailed(format!(
                    "decode {}: {e}",
                    image.display()
                ))
            })?
            // Hash a small thumbnail; blurhash throws away detail anyway.
            .thumbnail(128, 128)
            .into_rgba8();
        let (width, height) = decoded.dimensions();
        blurhash::encode(
            COMPONENTS_X,
            COMPONENTS_Y,
            width,
            height,
            decoded.as_raw(),
        )
        .map_err(|e| MediaError::Internal(format!("blurhash encode: {e}")))
    })
    .await
    .map_err(|e| MediaError::Internal(format!("blurhash task: {e}")))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};
    use tempfile::tempdir;

    #[test]
    fn side_file_appends_suffix() {
        assert_eq!(
            BlurhashService::side_file(Path::new("/m/poster.jpg")),
            PathBuf::from("/m/poster.jpg.blurhash")
        );
    }

    #[tokio::test]
    async fn native_hash_is_computed_and_cached() {
        let dir = tempdir().unwrap();
        let poster = dir.path().join("poster.png");
        RgbaImage::from_pixel(32, 48, Rgba([200, 40, 40, 255]))
            .save(&poster)
            .unwrap();

        let service = BlurhashService::new("unused".into(), true, 2);
        let first = service.get_or_compute(&poster).await.unwrap();
        assert!(!first.is_empty());
        assert!(BlurhashService::side_file(&poster).exists());

        // Second call is served from the side-file.
        let second = service.get_or_compute(&poster).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn pre_seeded_side_file_short_circuits() {
        let dir = tempdir().unwrap();
        let poster = dir.path().join("poster.png");
        // No image on disk at all; only the side-file.
        std::fs::write(
            BlurhashService::side_file(&poster),
            "LEHV6nWB2yk8\n",
        )
        .unwrap();

        let service = BlurhashService::new("unused".into(), true, 2);
        let hash = service.get_or_compute(&poster).await.unwrap();
        assert_eq!(hash, "LEHV6nWB2yk8");
    }

    #[tokio::test]
    async fn missing_image_is_source_missing() {
        let dir = tempdir().unwrap();
        let service = BlurhashService::new("unused".into(), true, 2);
        let err = service
            .get_or_compute(&dir.path().join("absent.png"))
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::SourceMissing(_)));
    }
}
