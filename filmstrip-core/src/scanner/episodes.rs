//! Episode filename and season directory parsing.

use once_cell::sync::Lazy;
use regex::Regex;

/// `Show Name - S02E05 - Title.mp4`, `S02E05.mp4`
static SEASON_EPISODE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:.* - )?[Ss](\d{2})[Ee](\d{2}).*\.mp4$").unwrap()
});

/// `05 - Title.mp4`
static NUMBER_DASH_TITLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{2}) - .*\.mp4$").unwrap());

/// `Season 2`, `season 02`
static SEASON_DIR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^season\s*(\d+)$").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedEpisode {
    /// Season parsed from the filename, when the pattern carries one.
    pub season: Option<u32>,
    pub episode: u32,
}

/// Match an episode file against the two supported naming patterns.
pub fn parse_episode(file_name: &str) -> Option<ParsedEpisode> {
    if let Some(captures) = SEASON_EPISODE.captures(file_name) {
        return Some(ParsedEpisode {
            season: captures[1].parse().ok(),
            episode: captures[2].parse().ok()?,
        });
    }
    if let Some(captures) = NUMBER_DASH_TITLE.captures(file_name) {
        return Some(ParsedEpisode {
            season: None,
            episode: captures[1].parse().ok()?,
        });
    }
    None
}

/// Season number of a `Season <N>` directory name.
pub fn parse_season_dir(dir_name: &str) -> Option<u32> {
    SEASON_DIR
        .captures(dir_name)
        .and_then(|captures| captures[1].parse().ok())
}

/// Transcoder scratch files masquerade as media; they never count as
/// episodes or library files.
pub fn is_transcoder_cache(file_name: &str) -> bool {
    file_name.contains(".tc.") || file_name.starts_with("cache/")
}

/// A valid episode file: `.mp4`, matches a naming pattern, and is not
/// transcoder scratch.
pub fn is_valid_episode(file_name: &str) -> bool {
    !is_transcoder_cache(file_name) && parse_episode(file_name).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sxxexx_variants() {
        let parsed = parse_episode("Show X - S02E05 - The One.mp4").unwrap();
        assert_eq!(parsed.season, Some(2));
        assert_eq!(parsed.episode, 5);

        let parsed = parse_episode("S01E12.mp4").unwrap();
        assert_eq!(parsed.season, Some(1));
        assert_eq!(parsed.episode, 12);

        let parsed = parse_episode("s03e07 1080p.mp4").unwrap();
        assert_eq!(parsed.season, Some(3));
        assert_eq!(parsed.episode, 7);
    }

    #[test]
    fn parses_number_dash_title() {
        let parsed = parse_episode("05 - The Fifth One.mp4").unwrap();
        assert_eq!(parsed.season, None);
        assert_eq!(parsed.episode, 5);
    }

    #[test]
    fn rejects_non_episodes() {
        assert!(parse_episode("behind-the-scenes.mp4").is_none());
        assert!(parse_episode("S1E1.mp4").is_none()); // needs zero padding
        assert!(parse_episode("05 - extras.mkv").is_none()); // not mp4
        assert!(parse_episode("5 - Short.mp4").is_none());
    }

    #[test]
    fn season_directories() {
        assert_eq!(parse_season_dir("Season 2"), Some(2));
        assert_eq!(parse_season_dir("Season 10"), Some(10));
        assert_eq!(parse_season_dir("season 03"), Some(3));
        assert_eq!(parse_season_dir("Specials"), None);
        assert_eq!(parse_season_dir("Extras"), None);
    }

    #[test]
    fn transcoder_cache_is_excluded() {
        assert!(is_transcoder_cache("S01E01.tc.mp4"));
        assert!(!is_transcoder_cache("S01E01.mp4"));
        assert!(!is_valid_episode("S01E01.tc.mp4"));
        assert!(is_valid_episode("S01E01.mp4"));
    }
}
