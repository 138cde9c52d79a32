use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Schema of the `<video>.info` side-file stored next to each source video.
///
/// Field order is load-bearing: the file is written with
/// `serde_json::to_string_pretty`, and a read-then-rewrite must produce a
/// byte-identical file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MediaInfo {
    /// Duration in milliseconds.
    pub length: i64,
    /// `WIDTHxHEIGHT` of the primary video stream.
    pub dimensions: String,
    /// HDR classifier (`HDR10`, `HLG`) or null for SDR.
    pub hdr: Option<String>,
    /// Stable identifier of the video, derived from its header bytes. The
    /// first 8 hex characters salt every versioned cache filename.
    pub uuid: Uuid,
    #[serde(rename = "additionalMetadata", default)]
    pub additional_metadata: serde_json::Value,
}

impl MediaInfo {
    /// First 8 hex characters of the video UUID, as used in cache filenames.
    pub fn uuid8(&self) -> String {
        self.uuid.simple().to_string()[..8].to_string()
    }

    /// Parsed `(width, height)`, if `dimensions` is well-formed.
    pub fn parsed_dimensions(&self) -> Option<(u32, u32)> {
        let (w, h) = self.dimensions.split_once('x')?;
        Some((w.parse().ok()?, h.parse().ok()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewrite_is_byte_identical() {
        let text = serde_json::to_string_pretty(&MediaInfo {
            length: 602_400,
            dimensions: "1920x1080".into(),
            hdr: None,
            uuid: Uuid::nil(),
            additional_metadata: serde_json::json!({}),
        })
        .unwrap();

        let parsed: MediaInfo = serde_json::from_str(&text).unwrap();
        let rewritten = serde_json::to_string_pretty(&parsed).unwrap();
        assert_eq!(text, rewritten);
    }

    #[test]
    fn uuid8_is_first_eight_hex() {
        let info = MediaInfo {
            length: 0,
            dimensions: "1x1".into(),
            hdr: None,
            uuid: Uuid::parse_str("a1b2c3d4-e5f6-0718-2930-414243444546").unwrap(),
            additional_metadata: serde_json::Value::Null,
        };
        assert_eq!(info.uuid8(), "a1b2c3d4");
    }

    #[test]
    fn parses_dimensions() {
        let info = MediaInfo {
            length: 0,
            dimensions: "3840x2160".into(),
            hdr: Some("HDR10".into()),
            uuid: Uuid::nil(),
            additional_metadata: serde_json::Value::Null,
        };
        assert_eq!(info.parsed_dimensions(), Some((3840, 2160)));
    }
}
