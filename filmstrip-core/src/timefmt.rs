//! Timestamp parsing and formatting shared by the adapter, the VTT
//! writer, and the request handlers.

use crate::error::{MediaError, Result};

/// Parse a timestamp that is either plain seconds (`83`, `83.5`) or a
/// clock string (`HH:MM:SS`, `HH:MM:SS.mmm`, `MM:SS`).
pub fn parse_timestamp(value: &str) -> Result<f64> {
    let value = value.trim();
    if value.is_empty() {
        return Err(MediaError::BadRequest("empty timestamp".into()));
    }

    if !value.contains(':') {
        return value
            .parse::<f64>()
            .ok()
            .filter(|secs| secs.is_finite() && *secs >= 0.0)
            .ok_or_else(|| {
                MediaError::BadRequest(format!("invalid timestamp: {value}"))
            });
    }

    let parts: Vec<&str> = value.split(':').collect();
    if parts.len() > 3 || parts.iter().any(|p| p.is_empty()) {
        return Err(MediaError::BadRequest(format!(
            "invalid timestamp: {value}"
        )));
    }

    let mut seconds = 0.0;
    for part in &parts {
        let field = part.parse::<f64>().map_err(|_| {
            MediaError::BadRequest(format!("invalid timestamp: {value}"))
        })?;
        if field < 0.0 {
            return Err(MediaError::BadRequest(format!(
                "invalid timestamp: {value}"
            )));
        }
        seconds = seconds * 60.0 + field;
    }
    Ok(seconds)
}

/// Format seconds as `HH:MM:SS.mmm`, the shape WEBVTT cues require.
pub fn format_timestamp(seconds: f64) -> String {
    let total_ms = (seconds.max(0.0) * 1000.0).round() as u64;
    let ms = total_ms % 1000;
    let total_secs = total_ms / 1000;
    let secs = total_secs % 60;
    let mins = (total_secs / 60) % 60;
    let hours = total_secs / 3600;
    format!("{hours:02}:{mins:02}:{secs:02}.{ms:03}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_seconds() {
        assert_eq!(parse_timestamp("83").unwrap(), 83.0);
        assert_eq!(parse_timestamp("83.5").unwrap(), 83.5);
        assert_eq!(parse_timestamp("0").unwrap(), 0.0);
    }

    #[test]
    fn parses_clock_strings() {
        assert_eq!(parse_timestamp("00:10:02.4").unwrap(), 602.4);
        assert_eq!(parse_timestamp("01:00:00").unwrap(), 3600.0);
        assert_eq!(parse_timestamp("10:02").unwrap(), 602.0);
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_timestamp("").is_err());
        assert!(parse_timestamp("abc").is_err());
        assert!(parse_timestamp("1:2:3:4").is_err());
        assert!(parse_timestamp("-5").is_err());
        assert!(parse_timestamp("::").is_err());
    }

    #[test]
    fn formats_with_millis() {
        assert_eq!(format_timestamp(0.0), "00:00:00.000");
        assert_eq!(format_timestamp(5.0), "00:00:05.000");
        assert_eq!(format_timestamp(602.4), "00:10:02.400");
        assert_eq!(format_timestamp(3661.25), "01:01:01.250");
    }

    #[test]
    fn format_then_parse_round_trips() {
        for secs in [0.0, 5.0, 61.5, 602.4, 7200.0] {
            let text = format_timestamp(secs);
            assert!((parse_timestamp(&text).unwrap() - secs).abs() < 0.001);
        }
    }
}
