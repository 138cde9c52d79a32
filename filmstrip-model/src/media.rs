use serde::{Deserialize, Serialize};
use std::fmt;

/// Which library a media item belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Movie,
    Tv,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Movie => "movie",
            MediaType::Tv => "tv",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Logical identifier of a video in the catalog, as it appears in request
/// paths and cache filenames.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MediaTarget {
    Movie {
        name: String,
    },
    Episode {
        show: String,
        season: u32,
        episode: u32,
    },
}

impl MediaTarget {
    pub fn media_type(&self) -> MediaType {
        match self {
            MediaTarget::Movie { .. } => MediaType::Movie,
            MediaTarget::Episode { .. } => MediaType::Tv,
        }
    }

    /// Display name of the movie or show this target points into.
    pub fn name(&self) -> &str {
        match self {
            MediaTarget::Movie { name } => name,
            MediaTarget::Episode { show, .. } => show,
        }
    }
}

impl fmt::Display for MediaTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaTarget::Movie { name } => write!(f, "movie/{name}"),
            MediaTarget::Episode {
                show,
                season,
                episode,
            } => {
                write!(f, "tv/{show}/S{season:02}E{episode:02}")
            }
        }
    }
}

/// HDR classification of a video stream, derived from its color transfer
/// characteristics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HdrFormat {
    /// PQ transfer (smpte2084).
    Hdr10,
    /// Hybrid log-gamma (arib-std-b67).
    Hlg,
}

impl HdrFormat {
    /// Classify from an ffprobe `color_transfer` value.
    pub fn from_color_transfer(transfer: &str) -> Option<Self> {
        match transfer {
            "smpte2084" => Some(HdrFormat::Hdr10),
            "arib-std-b67" => Some(HdrFormat::Hlg),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HdrFormat::Hdr10 => "HDR10",
            HdrFormat::Hlg => "HLG",
        }
    }
}

impl fmt::Display for HdrFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_hdr_transfers() {
        assert_eq!(
            HdrFormat::from_color_transfer("smpte2084"),
            Some(HdrFormat::Hdr10)
        );
        assert_eq!(
            HdrFormat::from_color_transfer("arib-std-b67"),
            Some(HdrFormat::Hlg)
        );
        assert_eq!(HdrFormat::from_color_transfer("bt709"), None);
        assert_eq!(HdrFormat::from_color_transfer(""), None);
    }

    #[test]
    fn target_display() {
        let movie = MediaTarget::Movie {
            name: "Example".into(),
        };
        assert_eq!(movie.to_string(), "movie/Example");

        let ep = MediaTarget::Episode {
            show: "Show X".into(),
            season: 2,
            episode: 5,
        };
        assert_eq!(ep.to_string(), "tv/Show X/S02E05");
        assert_eq!(ep.media_type(), MediaType::Tv);
    }
}
