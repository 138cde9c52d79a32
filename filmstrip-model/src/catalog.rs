//! Catalog row types.
//!
//! These mirror the JSON documents stored in the catalog database and
//! returned by the `/media/*` endpoints, so field names follow the wire
//! format rather than Rust convention where the two differ.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Cached content hash of an on-disk image, refreshed only when the file's
/// mtime changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    /// 10-hex-digit prefix of `md5(mtime)`.
    pub hash: String,
    /// File mtime (ms since epoch) the hash was computed from.
    pub mtime_ms: i64,
}

/// Subtitle track discovered next to a video file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtitleTrack {
    pub url: String,
    #[serde(rename = "srtLastModified")]
    pub srt_last_modified: DateTime<Utc>,
    /// True for `.hi.srt` (hearing-impaired) variants.
    #[serde(default)]
    pub sdh: bool,
}

/// Public URLs derived for a movie directory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MovieUrls {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mp4: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub subtitles: BTreeMap<String, SubtitleTrack>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poster: Option<String>,
    #[serde(rename = "posterBlurhash", skip_serializing_if = "Option::is_none")]
    pub poster_blurhash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backdrop: Option<String>,
    #[serde(
        rename = "backdropBlurhash",
        skip_serializing_if = "Option::is_none"
    )]
    pub backdrop_blurhash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chapters: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<String>,
}

/// One movie directory under the movies root. Unique by `name`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MovieRecord {
    pub name: String,
    #[serde(rename = "fileNames")]
    pub file_names: Vec<String>,
    /// File name -> duration in milliseconds.
    pub lengths: BTreeMap<String, i64>,
    /// File name -> `WIDTHxHEIGHT`.
    pub dimensions: BTreeMap<String, String>,
    pub urls: MovieUrls,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hdr: Option<String>,
    #[serde(default)]
    pub additional_metadata: serde_json::Value,
    /// Stable identifier derived from the mp4's header bytes.
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory_hash: Option<String>,
    #[serde(skip_serializing)]
    pub poster_ref: Option<ImageRef>,
    #[serde(skip_serializing)]
    pub backdrop_ref: Option<ImageRef>,
    #[serde(skip_serializing)]
    pub logo_ref: Option<ImageRef>,
}

/// Per-episode data stored inside a season's `urls` map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeData {
    #[serde(rename = "videoURL")]
    pub video_url: String,
    #[serde(rename = "mediaLastModified")]
    pub media_last_modified: DateTime<Utc>,
    #[serde(rename = "episodeNumber")]
    pub episode_number: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(
        rename = "thumbnailBlurhash",
        skip_serializing_if = "Option::is_none"
    )]
    pub thumbnail_blurhash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chapters: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub subtitles: BTreeMap<String, SubtitleTrack>,
    /// Stable identifier derived from `(show, season, episode)`.
    #[serde(rename = "_id")]
    pub id: String,
}

/// One season directory of a show. A season entry never has zero valid
/// episodes; the scanner skips such directories outright.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeasonEntry {
    #[serde(rename = "fileNames")]
    pub file_names: Vec<String>,
    /// Episode file name -> episode data.
    pub urls: BTreeMap<String, EpisodeData>,
    /// Episode file name -> duration in milliseconds.
    pub lengths: BTreeMap<String, i64>,
    /// Episode file name -> `WIDTHxHEIGHT`.
    pub dimensions: BTreeMap<String, String>,
    #[serde(rename = "season_poster", skip_serializing_if = "Option::is_none")]
    pub season_poster: Option<String>,
    #[serde(
        rename = "seasonPosterBlurhash",
        skip_serializing_if = "Option::is_none"
    )]
    pub season_poster_blurhash: Option<String>,
}

/// One show directory under the tv root. Unique by `name`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShowRecord {
    pub name: String,
    /// Season name (e.g. `Season 2`) -> season entry.
    pub seasons: BTreeMap<String, SeasonEntry>,
    pub urls: MovieUrls,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hdr: Option<String>,
    #[serde(default)]
    pub additional_metadata: serde_json::Value,
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory_hash: Option<String>,
    #[serde(skip_serializing)]
    pub poster_ref: Option<ImageRef>,
    #[serde(skip_serializing)]
    pub backdrop_ref: Option<ImageRef>,
    #[serde(skip_serializing)]
    pub logo_ref: Option<ImageRef>,
}

impl ShowRecord {
    /// Look up an episode by season and episode number. Season keys are
    /// directory names, so they are matched by their parsed number
    /// (`Season 2` and `season 02` are the same season).
    pub fn find_episode(
        &self,
        season: u32,
        episode: u32,
    ) -> Option<(&str, &EpisodeData)> {
        let entry = self.seasons.iter().find_map(|(name, entry)| {
            (season_number(name) == Some(season)).then_some(entry)
        })?;
        entry
            .urls
            .iter()
            .find(|(_, data)| data.episode_number == episode)
            .map(|(file, data)| (file.as_str(), data))
    }

    /// Season-name -> directory path component resolution for a season
    /// number, preserving the on-disk spelling.
    pub fn season_dir_name(&self, season: u32) -> Option<&str> {
        self.seasons
            .keys()
            .find(|name| season_number(name) == Some(season))
            .map(String::as_str)
    }
}

/// Parse the number out of a `Season <N>` style key.
fn season_number(name: &str) -> Option<u32> {
    let digits: String =
        name.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        None
    } else {
        digits.parse().ok()
    }
}

/// Tracks the last time the external enrichment tool ran for a media item
/// with missing art or metadata. Unique by `name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingDataRecord {
    pub name: String,
    #[serde(rename = "lastAttempt")]
    pub last_attempt: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_episode_matches_number_not_position() {
        let mut urls = BTreeMap::new();
        urls.insert(
            "05 - Fifth.mp4".to_string(),
            EpisodeData {
                video_url: "/tv/Show/Season 1/05 - Fifth.mp4".into(),
                media_last_modified: Utc::now(),
                episode_number: 5,
                thumbnail: None,
                thumbnail_blurhash: None,
                metadata: None,
                chapters: None,
                subtitles: BTreeMap::new(),
                id: "abc".into(),
            },
        );
        let mut seasons = BTreeMap::new();
        seasons.insert(
            "Season 1".to_string(),
            SeasonEntry {
                file_names: vec!["05 - Fifth.mp4".into()],
                urls,
                ..Default::default()
            },
        );
        let show = ShowRecord {
            name: "Show".into(),
            seasons,
            ..Default::default()
        };

        assert!(show.find_episode(1, 5).is_some());
        assert!(show.find_episode(1, 4).is_none());
        assert!(show.find_episode(2, 5).is_none());
    }

    #[test]
    fn movie_record_round_trips_wire_names() {
        let record = MovieRecord {
            name: "Example".into(),
            file_names: vec!["Example.mp4".into()],
            id: "deadbeef".into(),
            ..Default::default()
        };
        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("fileNames").is_some());
        assert!(json.get("_id").is_some());

        let back: MovieRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back.name, "Example");
        assert_eq!(back.file_names, vec!["Example.mp4".to_string()]);
    }
}
