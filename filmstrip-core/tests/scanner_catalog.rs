//! End-to-end scanner behaviour against a fabricated library.
//!
//! Videos are stand-in files with pre-seeded `.info` side-files, so the
//! scanner never needs a real ffprobe: the info manager serves the
//! side-file and probing is skipped.

use filmstrip_core::db::Databases;
use filmstrip_core::info::{video_uuid, InfoManager};
use filmstrip_core::{
    BlurhashService, Config, Ffmpeg, QueueRecovery, Scanner,
};
use filmstrip_model::MediaInfo;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

fn test_config(root: &Path) -> Config {
    Config {
        base_path: root.to_path_buf(),
        cache_path: root.join("cache"),
        db_path: root.join("db"),
        log_path: root.join("log"),
        prefix_path: String::new(),
        file_server_url: "http://files.local".into(),
        debug: false,
        ffmpeg_concurrency: 2,
        blurhash_concurrency: 2,
        use_native_blurhash: true,
        avif_enabled: true,
        avif_quality: 45,
        avif_speed: 6,
        enrichment_retry_hours: 24,
        queue_recovery: QueueRecovery::MarkInterrupted,
        autosync_url: None,
        enrichment_bin: None,
        blurhash_bin: "unused".into(),
    }
}

async fn seed_video(path: &Path, length_ms: i64, hdr: Option<&str>) {
    tokio::fs::write(path, format!("video:{}", path.display()))
        .await
        .unwrap();
    let info = MediaInfo {
        length: length_ms,
        dimensions: "1920x1080".into(),
        hdr: hdr.map(str::to_string),
        uuid: video_uuid(path).await.unwrap(),
        additional_metadata: serde_json::json!({}),
    };
    tokio::fs::write(
        InfoManager::info_path(path),
        serde_json::to_string_pretty(&info).unwrap(),
    )
    .await
    .unwrap();
}

fn seed_poster(path: &Path) {
    image::RgbImage::from_pixel(16, 24, image::Rgb([90, 60, 200]))
        .save(path)
        .unwrap();
}

struct Fixture {
    _root: TempDir,
    scanner: Scanner,
    dbs: Arc<Databases>,
    movies: PathBuf,
    tv: PathBuf,
}

async fn fixture() -> Fixture {
    let root = TempDir::new().unwrap();
    let config = Arc::new(test_config(root.path()));
    let movies = config.movies_root();
    let tv = config.tv_root();
    tokio::fs::create_dir_all(&movies).await.unwrap();
    tokio::fs::create_dir_all(&tv).await.unwrap();

    let dbs = Arc::new(Databases::new(config.db_path.clone()));
    let info = InfoManager::new(Ffmpeg::new(2));
    let blurhash = Arc::new(BlurhashService::new("unused".into(), true, 2));
    let scanner = Scanner::new(config, dbs.clone(), info, blurhash);

    Fixture {
        _root: root,
        scanner,
        dbs,
        movies,
        tv,
    }
}

#[tokio::test]
async fn movie_scan_builds_row_and_rescan_is_noop() {
    let fx = fixture().await;
    let dir = fx.movies.join("Example");
    tokio::fs::create_dir_all(&dir).await.unwrap();
    seed_video(&dir.join("Example.mp4"), 602_400, None).await;
    seed_poster(&dir.join("poster.jpg"));
    // Pre-seed the blurhash side-file so the first scan leaves the
    // directory bytes untouched and the second scan can skip on hash.
    tokio::fs::write(dir.join("poster.jpg.blurhash"), "LEHV6nWB2yk8")
        .await
        .unwrap();
    tokio::fs::write(dir.join("metadata.json"), "{}").await.unwrap();
    tokio::fs::write(dir.join("Example.en.srt"), "1\n").await.unwrap();

    let stats = fx.scanner.scan_all().await.unwrap().unwrap();
    assert_eq!(stats.updated, 1);
    assert_eq!(stats.errors, 0);

    let db = fx.dbs.media().await.unwrap();
    let repo = filmstrip_core::db::CatalogRepo::new(db);
    let movie = repo.get_movie("Example").await.unwrap().unwrap();
    assert!(movie.file_names.contains(&"Example.mp4".to_string()));
    assert_eq!(movie.lengths["Example.mp4"], 602_400);
    assert_eq!(movie.dimensions["Example.mp4"], "1920x1080");
    assert_eq!(
        movie.urls.mp4.as_deref(),
        Some("/movies/Example/Example.mp4")
    );
    assert!(movie.urls.poster.is_some());
    assert!(movie.urls.poster_blurhash.is_some());
    assert!(movie.urls.subtitles.contains_key("English"));
    assert!(movie.directory_hash.is_some());
    assert!(!movie.id.is_empty());

    // Untouched library: the second pass skips the directory entirely.
    let stats = fx.scanner.scan_all().await.unwrap().unwrap();
    assert_eq!(stats.skipped, 1);
    assert_eq!(stats.updated, 0);

    let again = repo.get_movie("Example").await.unwrap().unwrap();
    assert_eq!(movie, again);
}

#[tokio::test]
async fn vanished_movie_directory_deletes_row() {
    let fx = fixture().await;
    let dir = fx.movies.join("Gone");
    tokio::fs::create_dir_all(&dir).await.unwrap();
    seed_video(&dir.join("Gone.mp4"), 90_000, None).await;
    seed_poster(&dir.join("poster.jpg"));
    tokio::fs::write(dir.join("metadata.json"), "{}").await.unwrap();

    fx.scanner.scan_all().await.unwrap().unwrap();
    let db = fx.dbs.media().await.unwrap();
    let repo = filmstrip_core::db::CatalogRepo::new(db);
    assert!(repo.get_movie("Gone").await.unwrap().is_some());

    tokio::fs::remove_dir_all(&dir).await.unwrap();
    let stats = fx.scanner.scan_all().await.unwrap().unwrap();
    assert_eq!(stats.deleted, 1);
    assert!(repo.get_movie("Gone").await.unwrap().is_none());
}

#[tokio::test]
async fn tv_scan_builds_seasons_and_prunes_empty_ones() {
    let fx = fixture().await;
    let show = fx.tv.join("Show X");
    let season2 = show.join("Season 2");
    tokio::fs::create_dir_all(&season2).await.unwrap();
    seed_poster(&show.join("poster.jpg"));
    tokio::fs::write(show.join("metadata.json"), "{}").await.unwrap();

    seed_video(
        &season2.join("Show X - S02E05 - The One.mp4"),
        1_800_000,
        Some("HDR10"),
    )
    .await;
    // A season directory with no valid episodes never reaches the map.
    tokio::fs::create_dir_all(show.join("Season 3")).await.unwrap();

    fx.scanner.scan_all().await.unwrap().unwrap();

    let db = fx.dbs.media().await.unwrap();
    let repo = filmstrip_core::db::CatalogRepo::new(db);
    let record = repo.get_show("Show X").await.unwrap().unwrap();
    assert_eq!(record.seasons.len(), 1);
    assert_eq!(record.hdr.as_deref(), Some("HDR10"));

    let (file, data) = record.find_episode(2, 5).unwrap();
    assert_eq!(file, "Show X - S02E05 - The One.mp4");
    assert_eq!(data.episode_number, 5);
    let first_id = data.id.clone();

    // Rescanning with unchanged bytes keeps the episode id stable.
    tokio::fs::write(
        show.join("metadata.json"),
        "{\"touched\": true}",
    )
    .await
    .unwrap();
    fx.scanner.scan_all().await.unwrap().unwrap();
    let record = repo.get_show("Show X").await.unwrap().unwrap();
    let (_, data) = record.find_episode(2, 5).unwrap();
    assert_eq!(data.id, first_id);
}

#[tokio::test]
async fn deleting_last_episode_removes_the_season() {
    let fx = fixture().await;
    let show = fx.tv.join("Show X");
    let season2 = show.join("Season 2");
    tokio::fs::create_dir_all(&season2).await.unwrap();
    seed_poster(&show.join("poster.jpg"));
    tokio::fs::write(show.join("metadata.json"), "{}").await.unwrap();
    let episode = season2.join("S02E05.mp4");
    seed_video(&episode, 1_200_000, None).await;

    fx.scanner.scan_all().await.unwrap().unwrap();
    let db = fx.dbs.media().await.unwrap();
    let repo = filmstrip_core::db::CatalogRepo::new(db);
    let record = repo.get_show("Show X").await.unwrap().unwrap();
    assert!(record.seasons.contains_key("Season 2"));

    tokio::fs::remove_file(&episode).await.unwrap();
    tokio::fs::remove_file(InfoManager::info_path(&episode))
        .await
        .unwrap();
    fx.scanner.scan_all().await.unwrap().unwrap();

    let record = repo.get_show("Show X").await.unwrap().unwrap();
    assert!(!record.seasons.contains_key("Season 2"));
}
