//! Request handlers.

pub mod chapters;
pub mod clips;
pub mod frames;
pub mod media;
pub mod sprites;

use crate::errors::ApiResult;
use axum::body::Body;
use axum::http::{header, StatusCode};
use axum::response::Response;
use filmstrip_core::MediaError;
use std::path::Path;
use tokio_util::io::ReaderStream;

/// Stream a finished artifact off disk.
pub(crate) async fn stream_file(
    path: &Path,
    content_type: &str,
    cache_control: &str,
) -> ApiResult<Response> {
    let file = tokio::fs::File::open(path).await.map_err(|e| {
        MediaError::Internal(format!(
            "artifact vanished {}: {e}",
            path.display()
        ))
    })?;
    let size = file
        .metadata()
        .await
        .map_err(MediaError::Io)?
        .len();

    let stream = ReaderStream::new(file);
    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_LENGTH, size.to_string())
        .header(header::CACHE_CONTROL, cache_control)
        .body(Body::from_stream(stream))
        .map_err(|e| MediaError::Internal(format!("response build: {e}")))?)
}
