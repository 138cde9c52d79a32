//! # filmstrip-server
//!
//! Media-derivation server: given a local library of movie and TV video
//! files, lazily derives and serves single-frame thumbnails, timeline
//! sprite sheets with WebVTT indexes, chapter tracks, and short trimmed
//! clips, while maintaining a catalog of the library built by scanning
//! the filesystem.

mod errors;
mod handlers;
mod routes;
mod state;
mod workers;

use anyhow::Context;
use clap::Parser;
use filmstrip_core::db::ProcessQueueRepo;
use filmstrip_core::{
    AvifEncoder, BlurhashService, CacheStore, Config, Databases, Ffmpeg,
    InfoManager, Orchestrator, Scanner,
};
use state::AppState;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Command line arguments for the filmstrip media server.
#[derive(Parser, Debug)]
#[command(name = "filmstrip-server")]
#[command(about = "Media-derivation server for frames, sprite sheets, VTT indexes, and clips")]
struct Args {
    /// Address to bind
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 3000)]
    port: u16,

    /// Run a full library scan before accepting requests
    #[arg(long, env = "SCAN_ON_START", default_value_t = false)]
    scan_on_start: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    let config = Arc::new(Config::from_env());

    let default_filter = if config.debug {
        "filmstrip_server=debug,filmstrip_core=debug,tower_http=debug"
    } else {
        "filmstrip_server=info,filmstrip_core=info"
    };
    // Mirror logs into LOG_PATH when the directory is usable.
    let log_file = std::fs::create_dir_all(&config.log_path)
        .ok()
        .and_then(|_| {
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(config.log_path.join("filmstrip.log"))
                .ok()
        })
        .map(Arc::new);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(log_file.map(|file| {
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(file)
        }))
        .init();

    info!("Media root: {}", config.base_path.display());

    let state = build_state(config.clone())
        .await
        .context("Failed to initialize application state")?;

    // Reconcile process-queue rows orphaned by the previous run before
    // any new derivation starts.
    let queue_db = state.dbs.process_queue().await?;
    ProcessQueueRepo::new(queue_db)
        .recover_startup(config.queue_recovery)
        .await?;

    if args.scan_on_start {
        info!("Running startup library scan");
        if let Err(e) = state.scanner.scan_all().await {
            error!("Startup scan failed: {e}");
        }
    } else {
        let scanner = state.scanner.clone();
        tokio::spawn(async move {
            if let Err(e) = scanner.scan_all().await {
                error!("Initial scan failed: {e}");
            }
        });
    }

    workers::spawn_all(&state);

    let app = routes::router(state.clone());
    let addr: SocketAddr = format!("{}:{}", args.host, args.port)
        .parse()
        .context("Invalid bind address")?;
    info!("Listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind listener")?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Shutting down; checkpointing databases");
    state.dbs.shutdown().await;
    Ok(())
}

async fn build_state(config: Arc<Config>) -> anyhow::Result<AppState> {
    let dbs = Arc::new(Databases::new(config.db_path.clone()));
    let cache = Arc::new(CacheStore::new(config.cache_path.clone()));
    cache
        .ensure_dirs()
        .await
        .context("Failed to create cache directories")?;

    let ffmpeg = Ffmpeg::new(config.ffmpeg_concurrency);
    let info = InfoManager::new(ffmpeg.clone());
    let avif = Arc::new(AvifEncoder::new(
        config.avif_quality,
        config.avif_speed,
    ));
    let blurhash = Arc::new(BlurhashService::new(
        config.blurhash_bin.clone(),
        config.use_native_blurhash,
        config.blurhash_concurrency,
    ));

    let scanner = Arc::new(Scanner::new(
        config.clone(),
        dbs.clone(),
        info.clone(),
        blurhash,
    ));
    let orchestrator = Arc::new(Orchestrator::new(
        config.clone(),
        dbs.clone(),
        cache.clone(),
        ffmpeg,
        info,
        avif,
    ));

    Ok(AppState {
        config,
        dbs,
        cache,
        scanner,
        orchestrator,
    })
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to install shutdown handler: {e}");
    }
    info!("Shutdown signal received");
}
