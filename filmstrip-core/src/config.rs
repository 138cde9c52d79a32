//! Typed runtime configuration, constructed once at startup from the
//! environment instead of reading `std::env` at point of use.

use std::env;
use std::path::PathBuf;

/// What to do with `in-progress` process-queue rows left behind by a
/// previous run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueRecovery {
    /// Mark orphaned rows `interrupted` so clients can see the outage.
    MarkInterrupted,
    /// Delete orphaned rows outright.
    Delete,
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Media root containing the `movies/` and `tv/` libraries.
    pub base_path: PathBuf,
    /// Parent directory of the four cache roots.
    pub cache_path: PathBuf,
    /// Directory holding the SQLite database files.
    pub db_path: PathBuf,
    /// Directory for log output.
    pub log_path: PathBuf,
    /// URL prefix prepended to all public URLs.
    pub prefix_path: String,
    /// Base URL of the file server embedded in VTT cues.
    pub file_server_url: String,
    /// Verbose logging.
    pub debug: bool,
    /// Max concurrent ffmpeg/ffprobe subprocesses.
    pub ffmpeg_concurrency: usize,
    /// Max concurrent blurhash computations.
    pub blurhash_concurrency: usize,
    /// Compute blurhashes in-process instead of shelling out.
    pub use_native_blurhash: bool,
    /// Global switch for AVIF sprite output.
    pub avif_enabled: bool,
    /// `avifenc --max` quality.
    pub avif_quality: u32,
    /// `avifenc -s` speed.
    pub avif_speed: u32,
    /// Hours to wait before re-invoking the enrichment tool for an item
    /// that still lacks art or metadata.
    pub enrichment_retry_hours: i64,
    /// Startup policy for orphaned process-queue rows.
    pub queue_recovery: QueueRecovery,
    /// Auto-sync notifier endpoint; unset disables the worker.
    pub autosync_url: Option<String>,
    /// External image/metadata enrichment tool; unset disables enrichment.
    pub enrichment_bin: Option<String>,
    /// External blurhash CLI, used unless `use_native_blurhash` is set.
    pub blurhash_bin: String,
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_truthy(key: &str) -> bool {
    matches!(
        env::var(key).unwrap_or_default().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

impl Config {
    pub fn from_env() -> Self {
        let base_path = PathBuf::from(env_or("BASE_PATH", "/var/www/html"));
        let cache_path = env::var("CACHE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| base_path.join("cache"));
        let db_path = env::var("DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| base_path.join("db"));

        Self {
            log_path: PathBuf::from(env_or("LOG_PATH", "/var/log/filmstrip")),
            prefix_path: env_or("PREFIX_PATH", ""),
            file_server_url: env_or("FILE_SERVER_NODE_URL", ""),
            debug: env_truthy("DEBUG"),
            ffmpeg_concurrency: env_parse("FFMPEG_CONCURRENCY", 2).max(1),
            blurhash_concurrency: env_parse("BLURHASH_CONCURRENCY", 4).max(1),
            use_native_blurhash: env_truthy("USE_NATIVE_BLURHASH"),
            avif_enabled: !env_truthy("DISABLE_AVIF"),
            avif_quality: env_parse("AVIF_QUALITY", 45),
            avif_speed: env_parse("AVIF_SPEED", 6),
            enrichment_retry_hours: env_parse("RETRY_INTERVAL_HOURS", 24),
            queue_recovery: if env_truthy("QUEUE_DELETE_ON_START") {
                QueueRecovery::Delete
            } else {
                QueueRecovery::MarkInterrupted
            },
            autosync_url: env::var("AUTOSYNC_URL").ok().filter(|v| !v.is_empty()),
            enrichment_bin: env::var("ENRICHMENT_TOOL")
                .ok()
                .filter(|v| !v.is_empty()),
            blurhash_bin: env_or("BLURHASH_BIN", "blurhash-cli"),
            base_path,
            cache_path,
            db_path,
        }
    }

    /// Root of the movie library.
    pub fn movies_root(&self) -> PathBuf {
        self.base_path.join("movies")
    }

    /// Root of the tv library.
    pub fn tv_root(&self) -> PathBuf {
        self.base_path.join("tv")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        // Construct without touching the process environment for the
        // values under test.
        let config = Config {
            base_path: PathBuf::from("/var/www/html"),
            cache_path: PathBuf::from("/var/www/html/cache"),
            db_path: PathBuf::from("/var/www/html/db"),
            log_path: PathBuf::from("/var/log/filmstrip"),
            prefix_path: String::new(),
            file_server_url: String::new(),
            debug: false,
            ffmpeg_concurrency: 2,
            blurhash_concurrency: 4,
            use_native_blurhash: false,
            avif_enabled: true,
            avif_quality: 45,
            avif_speed: 6,
            enrichment_retry_hours: 24,
            queue_recovery: QueueRecovery::MarkInterrupted,
            autosync_url: None,
            enrichment_bin: None,
            blurhash_bin: "blurhash-cli".into(),
        };
        assert_eq!(config.movies_root(), PathBuf::from("/var/www/html/movies"));
        assert_eq!(config.tv_root(), PathBuf::from("/var/www/html/tv"));
    }
}
