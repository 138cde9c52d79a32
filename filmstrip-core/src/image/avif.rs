//! PNG -> AVIF conversion via the external `avifenc` encoder.
//!
//! Conversions are serialized per output path: two callers targeting the
//! same AVIF file share one encoding instead of racing the encoder.

use crate::coalesce::{Coalescer, Role};
use crate::error::{MediaError, Result};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{info, warn};

#[derive(Debug)]
pub struct AvifEncoder {
    bin: String,
    quality: u32,
    speed: u32,
    inflight: Coalescer<PathBuf>,
}

impl AvifEncoder {
    pub fn new(quality: u32, speed: u32) -> Self {
        Self {
            bin: std::env::var("AVIFENC_BIN")
                .unwrap_or_else(|_| "avifenc".to_string()),
            quality,
            speed,
            inflight: Coalescer::new(),
        }
    }

    /// Encode `png` to `avif`, deduplicated per output path. When
    /// `remove_source` is set the PNG is deleted after a successful
    /// encode.
    pub async fn convert(
        &self,
        png: &Path,
        avif: &Path,
        remove_source: bool,
    ) -> Result<PathBuf> {
        match self.inflight.join(avif.to_path_buf()) {
            Role::Waiter(waiter) => waiter.wait(None, "avif conversion").await,
            Role::Producer(guard) => {
                let outcome =
                    self.encode(png, avif, remove_source).await;
                match outcome {
                    Ok(()) => {
                        guard.complete(avif.to_path_buf());
                        Ok(avif.to_path_buf())
                    }
                    Err(e) => {
                        guard.fail(&e);
                        Err(e)
                    }
                }
            }
        }
    }

    async fn encode(
        &self,
        png: &Path,
        avif: &Path,
        remove_source: bool,
    ) -> Result<()> {
        if !png.is_file() {
            return Err(MediaError::SourceMissing(png.display().to_string()));
        }

        let output = Command::new(&self.bin)
            .args(["--min", "0", "--max"])
            .arg(self.quality.to_string())
            .arg("-s")
            .arg(self.speed.to_string())
            .arg(png)
            .arg(avif)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(MediaError::Io)?;

        if !output.status.success() {
            // A failed encode must not leave a partial AVIF for the
            // format-agnostic cache probe to find.
            let _ = tokio::fs::remove_file(avif).await;
            return Err(MediaError::ToolFailed {
                tool: "avifenc",
                code: output.status.code().unwrap_or(-1),
                stderr: crate::ffmpeg::stderr_tail(&output.stderr),
            });
        }

        info!("Converted {} -> {}", png.display(), avif.display());
        if remove_source {
            if let Err(e) = tokio::fs::remove_file(png).await {
                warn!("Failed to remove {} after encode: {e}", png.display());
            }
        }
        Ok(())
    }
}
