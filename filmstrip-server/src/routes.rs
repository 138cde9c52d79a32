//! Route table.

use crate::handlers::{chapters, clips, frames, media, sprites};
use crate::state::AppState;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/frame/movie/{name}/{ts}", get(frames::movie_frame))
        .route(
            "/frame/tv/{show}/{season}/{episode}/{ts}",
            get(frames::tv_frame),
        )
        .route("/spritesheet/movie/{name}", get(sprites::movie_sprite))
        .route(
            "/spritesheet/tv/{show}/{season}/{episode}",
            get(sprites::tv_sprite),
        )
        .route("/vtt/movie/{name}", get(sprites::movie_vtt))
        .route(
            "/vtt/tv/{show}/{season}/{episode}",
            get(sprites::tv_vtt),
        )
        .route("/chapters/movie/{name}", get(chapters::movie_chapters))
        .route("/chapters/tv/{show}", get(chapters::tv_show_chapters))
        .route(
            "/chapters/tv/{show}/{season}/{episode}",
            get(chapters::tv_episode_chapters),
        )
        .route("/videoClip/movie/{name}", get(clips::movie_clip))
        .route(
            "/videoClip/tv/{show}/{season}/{episode}",
            get(clips::tv_clip),
        )
        .route("/media/movies", get(media::list_movies))
        .route("/media/tv", get(media::list_shows))
        .route("/media/scan", post(media::trigger_scan))
        .route("/rescan/tmdb", get(media::trigger_enrichment))
        .route("/intros/{episode_id}", get(media::get_intro))
        .route("/intros", post(media::put_intro))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
