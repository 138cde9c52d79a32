//! Frame, sprite-grid, and clip rendering.

use super::{Ffmpeg, HDR_TONEMAP_CHAIN};
use crate::error::Result;
use crate::timefmt::format_timestamp;
use std::path::Path;
use tracing::info;

/// Height of a single-frame still.
const FRAME_HEIGHT: u32 = 140;

/// Logical width of one sprite cell before tiling.
pub const SPRITE_CELL_WIDTH: u32 = 320;

impl Ffmpeg {
    /// Seek to `timestamp` seconds and write a single still scaled to
    /// height 140, preserving aspect. HDR inputs go through the
    /// tone-mapping chain; SDR uses rgb24 directly. Returns the still's
    /// dimensions.
    pub async fn render_frame(
        &self,
        path: &Path,
        timestamp: f64,
        hdr: bool,
        out: &Path,
    ) -> Result<(u32, u32)> {
        self.require_source(path)?;

        let filter = if hdr {
            format!("{HDR_TONEMAP_CHAIN},scale=-2:{FRAME_HEIGHT}")
        } else {
            format!("scale=-2:{FRAME_HEIGHT},format=rgb24")
        };

        let mut cmd = self.ffmpeg_command();
        cmd.arg("-ss")
            .arg(format_timestamp(timestamp))
            .arg("-i")
            .arg(path)
            .args(["-frames:v", "1", "-vf"])
            .arg(&filter)
            .args(["-c:v", "libaom-av1", "-still-picture", "1", "-crf", "28"])
            .arg(out);

        self.run("ffmpeg", cmd).await?;

        let (src_w, src_h) = self.probe_dimensions(path).await?;
        let scaled_w = ((src_w as f64 * FRAME_HEIGHT as f64 / src_h as f64)
            / 2.0)
            .round() as u32
            * 2;
        info!(
            "Rendered frame at {} from {} ({}x{})",
            format_timestamp(timestamp),
            path.display(),
            scaled_w,
            FRAME_HEIGHT
        );
        Ok((scaled_w, FRAME_HEIGHT))
    }

    /// Single-pass tiled sprite grid: one 320px-wide cell every `interval`
    /// seconds, `cols` cells per row. Output is PNG; format conversion is
    /// the post-processor's concern.
    pub async fn render_sprite_sheet(
        &self,
        path: &Path,
        interval: u32,
        cols: u32,
        rows: u32,
        hdr: bool,
        out: &Path,
    ) -> Result<()> {
        self.require_source(path)?;

        let mut filter = format!("fps=1/{interval}");
        if hdr {
            filter.push(',');
            filter.push_str(HDR_TONEMAP_CHAIN);
        }
        filter.push_str(&format!(
            ",scale={SPRITE_CELL_WIDTH}:-1,tile={cols}x{rows}"
        ));

        let mut cmd = self.ffmpeg_command();
        cmd.arg("-i")
            .arg(path)
            .arg("-vf")
            .arg(&filter)
            .args(["-frames:v", "1"])
            .arg(out);

        info!(
            "Rendering sprite sheet for {} ({cols}x{rows} cells, {interval}s interval)",
            path.display()
        );
        self.run("ffmpeg", cmd).await?;
        Ok(())
    }

    /// Stream-copy the container between two timestamps; no re-encode.
    /// Fragmented output so the clip is playable before the moov atom
    /// would normally be written.
    pub async fn render_clip(
        &self,
        path: &Path,
        start: f64,
        end: f64,
        out: &Path,
    ) -> Result<()> {
        self.require_source(path)?;

        let mut cmd = self.ffmpeg_command();
        cmd.arg("-ss")
            .arg(format!("{start:.3}"))
            .arg("-to")
            .arg(format!("{end:.3}"))
            .arg("-i")
            .arg(path)
            .args(["-c", "copy", "-movflags", "frag_keyframe+empty_moov"])
            .args(["-f", "mp4"])
            .arg(out);

        info!(
            "Rendering clip {start:.3}-{end:.3} from {}",
            path.display()
        );
        self.run("ffmpeg", cmd).await?;
        Ok(())
    }
}
