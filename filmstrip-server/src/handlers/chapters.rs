//! Chapter VTT endpoints.

use crate::errors::ApiResult;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Json, Response};
use filmstrip_model::MediaTarget;

pub async fn movie_chapters(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Response> {
    let vtt = state
        .orchestrator
        .get_chapters(&MediaTarget::Movie { name })
        .await?;
    Ok(vtt_response(vtt))
}

pub async fn tv_episode_chapters(
    State(state): State<AppState>,
    Path((show, season, episode)): Path<(String, u32, u32)>,
) -> ApiResult<Response> {
    let vtt = state
        .orchestrator
        .get_chapters(&MediaTarget::Episode {
            show,
            season,
            episode,
        })
        .await?;
    Ok(vtt_response(vtt))
}

/// Bulk variant: chapter tracks for every episode of the show that has
/// them, as a JSON map keyed `SxxEyy`.
pub async fn tv_show_chapters(
    State(state): State<AppState>,
    Path(show): Path<String>,
) -> ApiResult<Response> {
    let tracks = state.orchestrator.get_show_chapters(&show).await?;
    Ok(Json(tracks).into_response())
}

fn vtt_response(vtt: String) -> Response {
    ([(header::CONTENT_TYPE, "text/vtt")], vtt).into_response()
}
