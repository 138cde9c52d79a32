//! Single-frame stills at arbitrary timestamps.

use super::stream_file;
use crate::errors::ApiResult;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::response::Response;
use filmstrip_core::CACHE_IMMUTABLE;
use filmstrip_model::MediaTarget;

/// The timestamp segment may carry an artifact extension
/// (`90.avif`, `00-01-30.jpg`); the canonical output is AVIF either way.
fn strip_frame_extension(ts: &str) -> &str {
    ts.strip_suffix(".avif")
        .or_else(|| ts.strip_suffix(".jpg"))
        .or_else(|| ts.strip_suffix(".png"))
        .unwrap_or(ts)
}

pub async fn movie_frame(
    State(state): State<AppState>,
    Path((name, ts)): Path<(String, String)>,
) -> ApiResult<Response> {
    let target = MediaTarget::Movie { name };
    let ts = strip_frame_extension(&ts);
    let path = state.orchestrator.get_frame(&target, ts).await?;
    stream_file(&path, "image/avif", CACHE_IMMUTABLE).await
}

pub async fn tv_frame(
    State(state): State<AppState>,
    Path((show, season, episode, ts)): Path<(String, u32, u32, String)>,
) -> ApiResult<Response> {
    let target = MediaTarget::Episode {
        show,
        season,
        episode,
    };
    let ts = strip_frame_extension(&ts);
    let path = state.orchestrator.get_frame(&target, ts).await?;
    stream_file(&path, "image/avif", CACHE_IMMUTABLE).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extensions_are_stripped() {
        assert_eq!(strip_frame_extension("90.avif"), "90");
        assert_eq!(strip_frame_extension("00:01:30.jpg"), "00:01:30");
        assert_eq!(strip_frame_extension("90.5"), "90.5");
    }
}
