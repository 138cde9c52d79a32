//! FFmpeg/ffprobe adapter.
//!
//! Every subprocess launch goes through [`Ffmpeg::run`], which holds a
//! semaphore permit for the lifetime of the child so at most
//! `FFMPEG_CONCURRENCY` external processes run at once.

mod probe;
mod render;

pub use probe::{AudioStream, Chapter, ColorInfo, StreamLayout, VideoStream};

use crate::error::{MediaError, Result};
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tokio::sync::Semaphore;
use tracing::debug;

/// How much of a failing tool's stderr is kept for diagnostics.
const STDERR_TAIL_BYTES: usize = 4096;

/// Tone-mapping sub-chain applied to HDR inputs before scaling, bringing
/// smpte2084/HLG content down to bt709.
pub const HDR_TONEMAP_CHAIN: &str = "zscale=t=linear:npl=100,format=gbrpf32le,zscale=p=bt709,tonemap=hable,zscale=t=bt709:m=bt709:r=tv,format=yuv420p";

#[derive(Debug, Clone)]
pub struct Ffmpeg {
    ffmpeg_bin: String,
    ffprobe_bin: String,
    permits: Arc<Semaphore>,
}

impl Ffmpeg {
    pub fn new(concurrency: usize) -> Self {
        Self {
            ffmpeg_bin: std::env::var("FFMPEG_BIN")
                .unwrap_or_else(|_| "ffmpeg".to_string()),
            ffprobe_bin: std::env::var("FFPROBE_BIN")
                .unwrap_or_else(|_| "ffprobe".to_string()),
            permits: Arc::new(Semaphore::new(concurrency.max(1))),
        }
    }

    pub(crate) fn ffmpeg_command(&self) -> Command {
        let mut cmd = Command::new(&self.ffmpeg_bin);
        cmd.arg("-hide_banner").arg("-y");
        cmd
    }

    pub(crate) fn ffprobe_command(&self) -> Command {
        Command::new(&self.ffprobe_bin)
    }

    /// Run a prepared command under the concurrency limit and return its
    /// stdout. Non-zero exit becomes `ToolFailed` carrying the stderr tail.
    pub(crate) async fn run(
        &self,
        tool: &'static str,
        mut cmd: Command,
    ) -> Result<Vec<u8>> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| MediaError::Internal("ffmpeg pool closed".into()))?;

        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!("Spawning {tool}: {:?}", cmd.as_std());
        let output = cmd.output().await.map_err(MediaError::Io)?;

        if !output.status.success() {
            let stderr = stderr_tail(&output.stderr);
            return Err(MediaError::ToolFailed {
                tool,
                code: output.status.code().unwrap_or(-1),
                stderr,
            });
        }

        Ok(output.stdout)
    }

    /// Fail fast with `SourceMissing` before spawning anything.
    pub(crate) fn require_source(&self, path: &Path) -> Result<()> {
        if path.is_file() {
            Ok(())
        } else {
            Err(MediaError::SourceMissing(path.display().to_string()))
        }
    }
}

pub(crate) fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let tail_start = text.len().saturating_sub(STDERR_TAIL_BYTES);
    // Avoid slicing mid-codepoint.
    let mut start = tail_start;
    while start < text.len() && !text.is_char_boundary(start) {
        start += 1;
    }
    text[start..].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stderr_tail_keeps_short_output_whole() {
        assert_eq!(stderr_tail(b"broken pipe"), "broken pipe");
    }

    #[test]
    fn stderr_tail_truncates_long_output() {
        let long = "x".repeat(10_000);
        let tail = stderr_tail(long.as_bytes());
        assert_eq!(tail.len(), STDERR_TAIL_BYTES);
    }

    #[test]
    fn missing_source_is_reported_before_spawn() {
        let ffmpeg = Ffmpeg::new(2);
        let err = ffmpeg
            .require_source(Path::new("/nonexistent/video.mp4"))
            .unwrap_err();
        assert!(matches!(err, MediaError::SourceMissing(_)));
    }
}
