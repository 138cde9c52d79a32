//! Deterministic cache filename generation.
//!
//! Artifact filenames are a pure function of the logical identity, the
//! video UUID prefix, and the sprite version, so regenerating an artifact
//! always lands on the same path.

use filmstrip_model::MediaTarget;
use sha1::{Digest, Sha1};
use std::path::Path;

/// Bumping this invalidates every sprite sheet and VTT in the cache.
pub const SPRITE_VERSION: f64 = 0.0001;

/// Sprite/VTT version suffix: `SPRITE_VERSION * 10000`, zero-padded to
/// four digits.
pub fn version_tag() -> String {
    format!("{:04}", (SPRITE_VERSION * 10000.0).round() as u32)
}

/// Replace anything outside `[A-Za-z0-9_-]` with `-`, collapse runs of
/// `-`, and strip leading/trailing `-`.
pub fn sanitize(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut last_dash = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            out.push(c);
            last_dash = false;
        } else if !last_dash {
            out.push('-');
            last_dash = true;
        }
    }
    out.trim_matches('-').to_string()
}

/// Frame still filename: `movie_<name>_<ts>.avif` or
/// `tv_<show>_S<ss>E<ee>_<ts>.avif`.
pub fn frame_file_name(target: &MediaTarget, timestamp: &str) -> String {
    let ts = sanitize(timestamp);
    match target {
        MediaTarget::Movie { name } => {
            format!("movie_{}_{ts}.avif", sanitize(name))
        }
        MediaTarget::Episode {
            show,
            season,
            episode,
        } => {
            format!("tv_{}_S{season:02}E{episode:02}_{ts}.avif", sanitize(show))
        }
    }
}

/// Common stem shared by a sprite sheet and its VTT, without extension:
/// `movie_<name>_spritesheet_<uuid8>_v<ver>` or
/// `tv_<show>_<ss>_<ee>_spritesheet_<uuid8>_v<ver>`.
pub fn sprite_stem(target: &MediaTarget, uuid8: &str) -> String {
    let version = version_tag();
    match target {
        MediaTarget::Movie { name } => {
            format!("movie_{}_spritesheet_{uuid8}_v{version}", sanitize(name))
        }
        MediaTarget::Episode {
            show,
            season,
            episode,
        } => format!(
            "tv_{}_{season:02}_{episode:02}_spritesheet_{uuid8}_v{version}",
            sanitize(show)
        ),
    }
}

/// Prefix of all sprite artifacts for a logical identity, regardless of
/// UUID and version. Used for stale-UUID cleanup.
pub fn sprite_identity_prefix(target: &MediaTarget) -> String {
    match target {
        MediaTarget::Movie { name } => {
            format!("movie_{}_spritesheet_", sanitize(name))
        }
        MediaTarget::Episode {
            show,
            season,
            episode,
        } => format!(
            "tv_{}_{season:02}_{episode:02}_spritesheet_",
            sanitize(show)
        ),
    }
}

/// Clip cache key: `sha1(videoPath, start, end)` rendered as hex, with
/// the `.mp4` extension.
pub fn clip_file_name(video: &Path, start: f64, end: f64) -> String {
    let mut hasher = Sha1::new();
    hasher.update(video.to_string_lossy().as_bytes());
    hasher.update(format!("{start:.3}").as_bytes());
    hasher.update(format!("{end:.3}").as_bytes());
    format!("{}.mp4", hex::encode(hasher.finalize()))
}
