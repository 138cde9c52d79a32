//! HTTP mapping of the core error taxonomy.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use filmstrip_core::MediaError;
use tracing::{error, warn};

/// Wrapper giving `MediaError` an HTTP rendering.
#[derive(Debug)]
pub struct ApiError(pub MediaError);

impl From<MediaError> for ApiError {
    fn from(err: MediaError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            MediaError::SourceMissing(_) | MediaError::NotFound(_) => {
                StatusCode::NOT_FOUND
            }
            MediaError::BadRequest(_) => StatusCode::BAD_REQUEST,
            MediaError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("Request failed: {}", self.0);
        } else {
            warn!("Request rejected ({status}): {}", self.0);
        }

        (status, self.0.to_string()).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;
