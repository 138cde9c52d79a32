//! Info side-file manager.
//!
//! Each video gets a `<video>.info` JSON descriptor holding its duration,
//! dimensions, HDR classification, and a stable UUID. The UUID salts every
//! versioned cache filename, so it must be a pure function of the source
//! bytes: the same file yields the same UUID on any host.

use crate::error::{MediaError, Result};
use crate::ffmpeg::Ffmpeg;
use filmstrip_model::MediaInfo;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncReadExt;
use tracing::{debug, warn};
use uuid::Uuid;

/// How much of the file's head feeds the UUID digest.
const UUID_HEADER_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone)]
pub struct InfoManager {
    ffmpeg: Ffmpeg,
}

impl InfoManager {
    pub fn new(ffmpeg: Ffmpeg) -> Self {
        Self { ffmpeg }
    }

    /// Path of the side-file for a video.
    pub fn info_path(video: &Path) -> PathBuf {
        let mut os = video.as_os_str().to_os_string();
        os.push(".info");
        PathBuf::from(os)
    }

    /// Read the side-file if present and schema-valid, otherwise probe the
    /// video and (re)write it. A stale or corrupt side-file is regenerated
    /// exactly once; failure to regenerate surfaces `InfoFailed`.
    pub async fn get_or_create(&self, video: &Path) -> Result<MediaInfo> {
        let info_path = Self::info_path(video);

        if let Some(info) = self.read_valid(&info_path).await {
            return Ok(info);
        }

        match self.generate(video, &info_path).await {
            Ok(info) => Ok(info),
            Err(MediaError::SourceMissing(path)) => {
                Err(MediaError::SourceMissing(path))
            }
            Err(e) => {
                warn!(
                    "Failed to materialize info for {}: {e}",
                    video.display()
                );
                Err(MediaError::InfoFailed(video.display().to_string()))
            }
        }
    }

    async fn read_valid(&self, info_path: &Path) -> Option<MediaInfo> {
        let text = fs::read_to_string(info_path).await.ok()?;
        match serde_json::from_str::<MediaInfo>(&text) {
            Ok(info) => Some(info),
            Err(e) => {
                debug!(
                    "Schema-invalid side-file {}, regenerating: {e}",
                    info_path.display()
                );
                None
            }
        }
    }

    async fn generate(
        &self,
        video: &Path,
        info_path: &Path,
    ) -> Result<MediaInfo> {
        let duration = self.ffmpeg.probe_duration(video).await?;
        let (width, height) = self.ffmpeg.probe_dimensions(video).await?;
        let color = self.ffmpeg.probe_color(video).await?;

        let info = MediaInfo {
            length: (duration * 1000.0).round() as i64,
            dimensions: format!("{width}x{height}"),
            hdr: color.hdr_format().map(|f| f.as_str().to_string()),
            uuid: video_uuid(video).await?,
            additional_metadata: serde_json::json!({}),
        };

        let text = serde_json::to_string_pretty(&info)?;
        fs::write(info_path, text).await?;
        debug!("Wrote info side-file {}", info_path.display());
        Ok(info)
    }
}

/// Stable 128-bit identifier of a video: SHA-256 over the first 64 KiB
/// plus the total length, truncated to 16 bytes.
pub async fn video_uuid(video: &Path) -> Result<Uuid> {
    let mut file = fs::File::open(video).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            MediaError::SourceMissing(video.display().to_string())
        } else {
            MediaError::Io(e)
        }
    })?;

    let len = file.metadata().await?.len();
    let mut header = vec![0u8; UUID_HEADER_BYTES];
    let mut filled = 0;
    while filled < header.len() {
        let n = file.read(&mut header[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    header.truncate(filled);

    let mut hasher = Sha256::new();
    hasher.update(&header);
    hasher.update(len.to_le_bytes());
    let digest = hasher.finalize();

    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    Ok(Uuid::from_bytes(bytes))
}
