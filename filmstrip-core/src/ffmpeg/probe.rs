//! ffprobe wrappers for duration, geometry, color, stream layout, and
//! chapter metadata.

use super::Ffmpeg;
use crate::error::{MediaError, Result};
use filmstrip_model::HdrFormat;
use std::path::Path;

/// Color description of the primary video stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColorInfo {
    pub color_transfer: Option<String>,
    pub color_space: Option<String>,
    pub color_primaries: Option<String>,
}

impl ColorInfo {
    pub fn hdr_format(&self) -> Option<HdrFormat> {
        self.color_transfer
            .as_deref()
            .and_then(HdrFormat::from_color_transfer)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoStream {
    pub index: usize,
    pub codec: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioStream {
    /// Position among audio streams, contiguous from 0 regardless of how
    /// video streams are interleaved in the container.
    pub index: usize,
    pub codec: String,
    pub channels: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamLayout {
    pub video: Vec<VideoStream>,
    pub audio: Vec<AudioStream>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Chapter {
    pub start_time: f64,
    pub title: Option<String>,
}

impl Ffmpeg {
    /// Container duration in seconds, falling back to the primary video
    /// stream's duration when the format header carries none.
    pub async fn probe_duration(&self, path: &Path) -> Result<f64> {
        self.require_source(path)?;

        let mut cmd = self.ffprobe_command();
        cmd.args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_entries",
            "format=duration:stream=duration",
            "-select_streams",
            "v:0",
        ])
        .arg(path);

        let stdout = self.run("ffprobe", cmd).await?;
        let json = parse_json(&stdout)?;

        let format_duration = json["format"]["duration"]
            .as_str()
            .and_then(|v| v.parse::<f64>().ok());
        let stream_duration = json["streams"]
            .as_array()
            .and_then(|streams| streams.first())
            .and_then(|stream| stream["duration"].as_str())
            .and_then(|v| v.parse::<f64>().ok());

        format_duration
            .or(stream_duration)
            .filter(|secs| secs.is_finite() && *secs > 0.0)
            .ok_or_else(|| {
                MediaError::NotProbable(format!(
                    "no parseable duration in {}",
                    path.display()
                ))
            })
    }

    /// `(width, height)` of the primary video stream.
    pub async fn probe_dimensions(&self, path: &Path) -> Result<(u32, u32)> {
        self.require_source(path)?;

        let mut cmd = self.ffprobe_command();
        cmd.args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height",
        ])
        .arg(path);

        let stdout = self.run("ffprobe", cmd).await?;
        let json = parse_json(&stdout)?;

        let stream = json["streams"]
            .as_array()
            .and_then(|streams| streams.first())
            .ok_or_else(|| {
                MediaError::NotProbable(format!(
                    "no video stream in {}",
                    path.display()
                ))
            })?;

        match (stream["width"].as_u64(), stream["height"].as_u64()) {
            (Some(w), Some(h)) if w > 0 && h > 0 => Ok((w as u32, h as u32)),
            _ => Err(MediaError::NotProbable(format!(
                "invalid dimensions in {}",
                path.display()
            ))),
        }
    }

    /// Color transfer/space/primaries of the primary video stream.
    pub async fn probe_color(&self, path: &Path) -> Result<ColorInfo> {
        self.require_source(path)?;

        let mut cmd = self.ffprobe_command();
        cmd.args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=color_transfer,color_space,color_primaries",
        ])
        .arg(path);

        let stdout = self.run("ffprobe", cmd).await?;
        let json = parse_json(&stdout)?;

        let mut info = ColorInfo::default();
        if let Some(stream) =
            json["streams"].as_array().and_then(|streams| streams.first())
        {
            info.color_transfer =
                stream["color_transfer"].as_str().map(str::to_string);
            info.color_space =
                stream["color_space"].as_str().map(str::to_string);
            info.color_primaries =
                stream["color_primaries"].as_str().map(str::to_string);
        }
        Ok(info)
    }

    /// True iff the color transfer marks the stream as HDR.
    pub async fn is_hdr(&self, path: &Path) -> Result<bool> {
        Ok(self.probe_color(path).await?.hdr_format().is_some())
    }

    /// Video and audio streams of the container. Audio indices are
    /// positions within the audio streams only.
    pub async fn enumerate_streams(&self, path: &Path) -> Result<StreamLayout> {
        self.require_source(path)?;

        let mut cmd = self.ffprobe_command();
        cmd.args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_streams",
        ])
        .arg(path);

        let stdout = self.run("ffprobe", cmd).await?;
        let json = parse_json(&stdout)?;

        let mut layout = StreamLayout::default();
        let streams = json["streams"].as_array().cloned().unwrap_or_default();
        for stream in &streams {
            let codec = stream["codec_name"].as_str().unwrap_or("unknown");
            match stream["codec_type"].as_str() {
                Some("video") => layout.video.push(VideoStream {
                    index: layout.video.len(),
                    codec: codec.to_string(),
                }),
                Some("audio") => layout.audio.push(AudioStream {
                    index: layout.audio.len(),
                    codec: codec.to_string(),
                    channels: stream["channels"].as_u64().unwrap_or(0) as u32,
                }),
                _ => {}
            }
        }
        Ok(layout)
    }

    pub async fn has_chapters(&self, path: &Path) -> Result<bool> {
        Ok(!self.extract_chapters(path).await?.is_empty())
    }

    /// Chapter markers from the container, in start order. Untitled
    /// chapters get a `Chapter <n>` fallback title downstream.
    pub async fn extract_chapters(&self, path: &Path) -> Result<Vec<Chapter>> {
        self.require_source(path)?;

        let mut cmd = self.ffprobe_command();
        cmd.args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_chapters",
        ])
        .arg(path);

        let stdout = self.run("ffprobe", cmd).await?;
        let json = parse_json(&stdout)?;

        let mut chapters = Vec::new();
        for chapter in json["chapters"].as_array().into_iter().flatten() {
            let start_time = chapter["start_time"]
                .as_str()
                .and_then(|v| v.parse::<f64>().ok())
                .ok_or_else(|| {
                    MediaError::ParseFailed(
                        "chapter without start_time".to_string(),
                    )
                })?;
            let title = chapter["tags"]["title"]
                .as_str()
                .map(str::to_string)
                .filter(|t| !t.is_empty());
            chapters.push(Chapter { start_time, title });
        }
        chapters.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));
        Ok(chapters)
    }
}

fn parse_json(stdout: &[u8]) -> Result<serde_json::Value> {
    serde_json::from_slice(stdout)
        .map_err(|e| MediaError::ParseFailed(format!("ffprobe output: {e}")))
}
