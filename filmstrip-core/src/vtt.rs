//! WEBVTT generation for sprite indexes and chapter tracks.

use crate::ffmpeg::Chapter;
use crate::timefmt::format_timestamp;

/// Seconds between sprite samples.
pub const SPRITE_INTERVAL_SECS: u32 = 5;

/// Fixed sprite grid width in cells.
pub const SPRITE_COLUMNS: u32 = 10;

/// Number of sampled frames, inclusive of the last partial interval.
pub fn frame_count(duration_secs: f64, interval: u32) -> u32 {
    (duration_secs / interval as f64).floor() as u32 + 1
}

/// Rows needed to tile `frames` cells at `cols` per row.
pub fn row_count(frames: u32, cols: u32) -> u32 {
    frames.div_ceil(cols)
}

/// Emit the sprite cue index.
///
/// Cell dimensions are derived from the decoded sprite image divided by
/// the grid, not from the nominal 320x180 cell, so scale rounding in the
/// encoder cannot skew the `#xywh` rectangles. The last cue ends at the
/// exact duration.
pub fn sprite_vtt(
    duration_secs: f64,
    interval: u32,
    cols: u32,
    sprite_width: u32,
    sprite_height: u32,
    sprite_url: &str,
) -> String {
    let frames = frame_count(duration_secs, interval);
    let rows = row_count(frames, cols);
    let thumb_w = sprite_width / cols;
    let thumb_h = sprite_height / rows;

    let mut vtt = String::from("WEBVTT\n\n");
    for i in 0..frames {
        let start = (i * interval) as f64;
        let end = (((i + 1) * interval) as f64).min(duration_secs);
        let x = (i % cols) * thumb_w;
        let y = (i / cols) * thumb_h;
        vtt.push_str(&format!(
            "{} --> {}\n{sprite_url}#xywh={x},{y},{thumb_w},{thumb_h}\n\n",
            format_timestamp(start),
            format_timestamp(end),
        ));
    }
    vtt
}

/// Emit a chapter track: each cue runs from its chapter's start to the
/// next chapter's start, the last to the video's duration.
pub fn chapters_vtt(chapters: &[Chapter], duration_secs: f64) -> String {
    let mut vtt = String::from("WEBVTT\n\n");
    for (i, chapter) in chapters.iter().enumerate() {
        let end = chapters
            .get(i + 1)
            .map(|next| next.start_time)
            .unwrap_or(duration_secs);
        let title = chapter
            .title
            .clone()
            .unwrap_or_else(|| format!("Chapter {}", i + 1));
        vtt.push_str(&format!(
            "{} --> {}\n{title}\n\n",
            format_timestamp(chapter.start_time),
            format_timestamp(end),
        ));
    }
    vtt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_and_row_counts() {
        // 602.4s -> 121 frames -> 13 rows.
        assert_eq!(frame_count(602.4, 5), 121);
        assert_eq!(row_count(121, 10), 13);

        // 7200s -> 1441 frames -> 145 rows.
        assert_eq!(frame_count(7200.0, 5), 1441);
        assert_eq!(row_count(1441, 10), 145);

        // Exact multiple still gets the inclusive final sample.
        assert_eq!(frame_count(600.0, 5), 121);
        assert_eq!(frame_count(0.0, 5), 1);
        assert_eq!(row_count(1, 10), 1);
    }

    #[test]
    fn sprite_vtt_cue_layout() {
        let vtt = sprite_vtt(602.4, 5, 10, 3200, 2340, "/spritesheet/movie/Example");
        let cues: Vec<&str> = vtt
            .split("\n\n")
            .filter(|block| block.contains("-->"))
            .collect();
        assert_eq!(cues.len(), 121);

        assert!(vtt.starts_with("WEBVTT\n\n"));
        assert!(cues[0].starts_with("00:00:00.000 --> 00:00:05.000"));
        assert!(cues[0].contains("#xywh=0,0,320,180"));

        // Second row starts at cell (0, 180).
        assert!(cues[10].contains("#xywh=0,180,320,180"));

        // Last cue ends at the exact duration, not duration+interval.
        assert!(cues[120].starts_with("00:10:00.000 --> 00:10:02.400"));
        assert!(cues[120].contains("#xywh=0,2160,320,180"));
    }

    #[test]
    fn sprite_vtt_derives_cell_size_from_actual_image() {
        // Encoder rounded the sheet to 3180x2337: cells come out 318x179.
        let vtt = sprite_vtt(602.4, 5, 10, 3180, 2337, "/s");
        assert!(vtt.contains("#xywh=0,0,318,179"));
        assert!(vtt.contains("#xywh=318,0,318,179"));
    }

    #[test]
    fn sprite_vtt_is_deterministic() {
        let a = sprite_vtt(602.4, 5, 10, 3200, 2340, "/s");
        let b = sprite_vtt(602.4, 5, 10, 3200, 2340, "/s");
        assert_eq!(a, b);
    }

    #[test]
    fn chapters_vtt_layout() {
        let chapters = vec![
            Chapter {
                start_time: 0.0,
                title: Some("Opening".into()),
            },
            Chapter {
                start_time: 300.5,
                title: None,
            },
        ];
        let vtt = chapters_vtt(&chapters, 602.4);
        assert!(vtt.starts_with("WEBVTT\n\n"));
        assert!(vtt.contains("00:00:00.000 --> 00:05:00.500\nOpening\n"));
        assert!(vtt.contains("00:05:00.500 --> 00:10:02.400\nChapter 2\n"));
    }

    #[test]
    fn empty_chapters_is_bare_header() {
        assert_eq!(chapters_vtt(&[], 100.0), "WEBVTT\n\n");
    }
}
