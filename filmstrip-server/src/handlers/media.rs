//! Catalog read endpoints, scan triggers, and intro markers.

use crate::errors::ApiResult;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::response::Json;
use filmstrip_core::db::{stitch_image_hash, CatalogRepo, IntroMarker, IntrosRepo};
use filmstrip_model::{MovieRecord, ShowRecord};
use serde_json::{json, Value};
use tracing::{error, info};

/// Stitch cached image hashes into a record's outbound URLs. Read path
/// only; never touches the filesystem.
fn stitch_movie(mut record: MovieRecord) -> MovieRecord {
    if let Some(url) = record.urls.poster.take() {
        record.urls.poster =
            Some(stitch_image_hash(&url, record.poster_ref.as_ref()));
    }
    if let Some(url) = record.urls.backdrop.take() {
        record.urls.backdrop =
            Some(stitch_image_hash(&url, record.backdrop_ref.as_ref()));
    }
    if let Some(url) = record.urls.logo.take() {
        record.urls.logo =
            Some(stitch_image_hash(&url, record.logo_ref.as_ref()));
    }
    record
}

fn stitch_show(mut record: ShowRecord) -> ShowRecord {
    if let Some(url) = record.urls.poster.take() {
        record.urls.poster =
            Some(stitch_image_hash(&url, record.poster_ref.as_ref()));
    }
    if let Some(url) = record.urls.backdrop.take() {
        record.urls.backdrop =
            Some(stitch_image_hash(&url, record.backdrop_ref.as_ref()));
    }
    if let Some(url) = record.urls.logo.take() {
        record.urls.logo =
            Some(stitch_image_hash(&url, record.logo_ref.as_ref()));
    }
    record
}

pub async fn list_movies(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<MovieRecord>>> {
    let db = state.dbs.media().await?;
    let movies = CatalogRepo::new(db).all_movies().await?;
    Ok(Json(movies.into_iter().map(stitch_movie).collect()))
}

pub async fn list_shows(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<ShowRecord>>> {
    let db = state.dbs.media().await?;
    let shows = CatalogRepo::new(db).all_shows().await?;
    Ok(Json(shows.into_iter().map(stitch_show).collect()))
}

/// Force a rescan. The scan runs in the background; overlapping requests
/// are dropped by the scanner's guard.
pub async fn trigger_scan(
    State(state): State<AppState>,
) -> ApiResult<Json<Value>> {
    if state.scanner.is_scanning() {
        return Ok(Json(json!({ "status": "scan already running" })));
    }
    let scanner = state.scanner.clone();
    tokio::spawn(async move {
        if let Err(e) = scanner.scan_all().await {
            error!("Forced scan failed: {e}");
        }
    });
    info!("Library scan triggered via API");
    Ok(Json(json!({ "status": "scan started" })))
}

/// Trigger the enrichment pass. Enrichment rides the scanner: items with
/// missing art are re-attempted subject to the retry window.
pub async fn trigger_enrichment(
    State(state): State<AppState>,
) -> ApiResult<Json<Value>> {
    let scanner = state.scanner.clone();
    tokio::spawn(async move {
        if let Err(e) = scanner.scan_all().await {
            error!("Enrichment scan failed: {e}");
        }
    });
    info!("Metadata enrichment triggered via API");
    Ok(Json(json!({ "status": "enrichment started" })))
}

pub async fn get_intro(
    State(state): State<AppState>,
    Path(episode_id): Path<String>,
) -> ApiResult<Json<IntroMarker>> {
    let db = state.dbs.intros().await?;
    let marker = IntrosRepo::new(db)
        .get(&episode_id)
        .await?
        .ok_or_else(|| {
            filmstrip_core::MediaError::NotFound(format!(
                "no intro marker for {episode_id}"
            ))
        })?;
    Ok(Json(marker))
}

pub async fn put_intro(
    State(state): State<AppState>,
    Json(marker): Json<IntroMarker>,
) -> ApiResult<Json<Value>> {
    let db = state.dbs.intros().await?;
    IntrosRepo::new(db).upsert(&marker).await?;
    Ok(Json(json!({ "status": "ok" })))
}
