//! Trimmed clip endpoints with byte-range support.

use crate::errors::ApiResult;
use crate::state::AppState;
use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::Response;
use filmstrip_core::{ClipRequest, MediaError};
use filmstrip_model::MediaTarget;
use serde::Deserialize;
use std::path::Path as FsPath;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;
use tracing::debug;

#[derive(Debug, Deserialize)]
pub struct ClipQuery {
    start: Option<f64>,
    end: Option<f64>,
}

impl ClipQuery {
    fn into_request(self) -> Result<ClipRequest, MediaError> {
        match (self.start, self.end) {
            (Some(start), Some(end)) => Ok(ClipRequest { start, end }),
            _ => Err(MediaError::BadRequest(
                "start and end query parameters are required".to_string(),
            )),
        }
    }
}

pub async fn movie_clip(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<ClipQuery>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    serve_clip(&state, MediaTarget::Movie { name }, query, headers).await
}

pub async fn tv_clip(
    State(state): State<AppState>,
    Path((show, season, episode)): Path<(String, u32, u32)>,
    Query(query): Query<ClipQuery>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    serve_clip(
        &state,
        MediaTarget::Episode {
            show,
            season,
            episode,
        },
        query,
        headers,
    )
    .await
}

async fn serve_clip(
    state: &AppState,
    target: MediaTarget,
    query: ClipQuery,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let request = query.into_request()?;
    let clip = state.orchestrator.get_clip(&target, request).await?;
    stream_with_ranges(&clip, "video/mp4", &headers).await
}

#[derive(Debug, Clone, Copy)]
struct ByteRange {
    start: u64,
    end: u64,
}

/// `bytes=a-b`, `bytes=a-`, `bytes=-suffix`; out-of-range requests fall
/// back to a full-body response.
fn parse_range_header(range_str: &str, file_size: u64) -> Option<ByteRange> {
    let range_part = range_str.strip_prefix("bytes=")?;
    let parts: Vec<&str> = range_part.split('-').collect();
    if parts.len() != 2 {
        return None;
    }

    let start = if parts[0].is_empty() {
        let suffix_len = parts[1].parse::<u64>().ok()?;
        file_size.saturating_sub(suffix_len)
    } else {
        parts[0].parse::<u64>().ok()?
    };

    let end = if parts[1].is_empty() {
        file_size.saturating_sub(1)
    } else {
        std::cmp::min(parts[1].parse::<u64>().ok()?, file_size.saturating_sub(1))
    };

    if start <= end && start < file_size {
        Some(ByteRange { start, end })
    } else {
        None
    }
}

async fn stream_with_ranges(
    path: &FsPath,
    content_type: &str,
    headers: &HeaderMap,
) -> ApiResult<Response> {
    let mut file = tokio::fs::File::open(path).await.map_err(|e| {
        MediaError::Internal(format!("clip vanished {}: {e}", path.display()))
    })?;
    let file_size = file.metadata().await.map_err(MediaError::Io)?.len();

    if let Some(range) = headers
        .get(header::RANGE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| parse_range_header(value, file_size))
    {
        debug!("Range request: {}-{}/{file_size}", range.start, range.end);
        file.seek(std::io::SeekFrom::Start(range.start))
            .await
            .map_err(MediaError::Io)?;

        let content_length = range.end - range.start + 1;
        let stream = ReaderStream::new(file.take(content_length));
        return Ok(Response::builder()
            .status(StatusCode::PARTIAL_CONTENT)
            .header(header::CONTENT_TYPE, content_type)
            .header(header::CONTENT_LENGTH, content_length.to_string())
            .header(
                header::CONTENT_RANGE,
                format!("bytes {}-{}/{file_size}", range.start, range.end),
            )
            .header(header::ACCEPT_RANGES, "bytes")
            .body(Body::from_stream(stream))
            .map_err(|e| {
                MediaError::Internal(format!("response build: {e}"))
            })?);
    }

    let stream = ReaderStream::new(file);
    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_LENGTH, file_size.to_string())
        .header(header::ACCEPT_RANGES, "bytes")
        .body(Body::from_stream(stream))
        .map_err(|e| MediaError::Internal(format!("response build: {e}")))?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_parsing() {
        let range = parse_range_header("bytes=0-99", 1000).unwrap();
        assert_eq!((range.start, range.end), (0, 99));

        let range = parse_range_header("bytes=500-", 1000).unwrap();
        assert_eq!((range.start, range.end), (500, 999));

        let range = parse_range_header("bytes=-100", 1000).unwrap();
        assert_eq!((range.start, range.end), (900, 999));

        // End clamps to the file size.
        let range = parse_range_header("bytes=0-5000", 1000).unwrap();
        assert_eq!((range.start, range.end), (0, 999));

        assert!(parse_range_header("bytes=1000-", 1000).is_none());
        assert!(parse_range_header("0-99", 1000).is_none());
        assert!(parse_range_header("bytes=abc-", 1000).is_none());
    }

    #[test]
    fn missing_params_are_rejected() {
        let query = ClipQuery {
            start: Some(1.0),
            end: None,
        };
        assert!(query.into_request().is_err());

        let query = ClipQuery {
            start: Some(10.0),
            end: Some(40.0),
        };
        let request = query.into_request().unwrap();
        assert_eq!(request.start, 10.0);
        assert_eq!(request.end, 40.0);
    }
}
