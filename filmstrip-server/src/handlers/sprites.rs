//! Sprite sheets and their VTT indexes.

use super::stream_file;
use crate::errors::ApiResult;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::response::Response;
use filmstrip_core::CACHE_IMMUTABLE;
use filmstrip_model::MediaTarget;

pub async fn movie_sprite(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Response> {
    serve_sprite(&state, MediaTarget::Movie { name }).await
}

pub async fn tv_sprite(
    State(state): State<AppState>,
    Path((show, season, episode)): Path<(String, u32, u32)>,
) -> ApiResult<Response> {
    serve_sprite(
        &state,
        MediaTarget::Episode {
            show,
            season,
            episode,
        },
    )
    .await
}

async fn serve_sprite(
    state: &AppState,
    target: MediaTarget,
) -> ApiResult<Response> {
    let artifact = state.orchestrator.get_sprite_sheet(&target).await?;
    stream_file(
        &artifact.path,
        artifact.content_type,
        artifact.cache_control,
    )
    .await
}

pub async fn movie_vtt(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Response> {
    serve_vtt(&state, MediaTarget::Movie { name }).await
}

pub async fn tv_vtt(
    State(state): State<AppState>,
    Path((show, season, episode)): Path<(String, u32, u32)>,
) -> ApiResult<Response> {
    serve_vtt(
        &state,
        MediaTarget::Episode {
            show,
            season,
            episode,
        },
    )
    .await
}

async fn serve_vtt(
    state: &AppState,
    target: MediaTarget,
) -> ApiResult<Response> {
    let path = state.orchestrator.get_sprite_vtt(&target).await?;
    stream_file(&path, "text/vtt", CACHE_IMMUTABLE).await
}
