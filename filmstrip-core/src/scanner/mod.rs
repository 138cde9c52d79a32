//! Library scanner.
//!
//! Walks the `movies/` and `tv/` roots, (re)builds catalog rows keyed on
//! per-directory content hashes, deletes rows whose directory vanished,
//! and triggers the external enrichment tool for items with missing art.
//! A single guard flag drops overlapping scans instead of queueing them.

pub mod enrich;
pub mod episodes;
pub mod hash;

mod movies;
mod tv;

pub use hash::{collect_entries, directory_hash, hash_directory, EntryMeta};

use crate::config::Config;
use crate::db::Databases;
use crate::error::Result;
use crate::image::BlurhashService;
use crate::info::InfoManager;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::UNIX_EPOCH;
use tracing::{info, warn};

/// Bounded parallelism of per-directory scan tasks.
const SCAN_CONCURRENCY: usize = 4;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScanStats {
    pub scanned: usize,
    pub skipped: usize,
    pub updated: usize,
    pub deleted: usize,
    pub errors: usize,
}

impl ScanStats {
    fn merge(&mut self, other: ScanStats) {
        self.scanned += other.scanned;
        self.skipped += other.skipped;
        self.updated += other.updated;
        self.deleted += other.deleted;
        self.errors += other.errors;
    }
}

#[derive(Debug)]
pub struct Scanner {
    config: Arc<Config>,
    dbs: Arc<Databases>,
    info: InfoManager,
    blurhash: Arc<BlurhashService>,
    scanning: AtomicBool,
}

impl Scanner {
    pub fn new(
        config: Arc<Config>,
        dbs: Arc<Databases>,
        info: InfoManager,
        blurhash: Arc<BlurhashService>,
    ) -> Self {
        Self {
            config,
            dbs,
            info,
            blurhash,
            scanning: AtomicBool::new(false),
        }
    }

    /// Scan both libraries. Returns `None` when another scan is already
    /// running; overlapping ticks are dropped, not queued.
    pub async fn scan_all(&self) -> Result<Option<ScanStats>> {
        if self
            .scanning
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            info!("Scan already in progress; dropping this tick");
            return Ok(None);
        }

        let result = async {
            let mut stats = ScanStats::default();
            stats.merge(self.scan_movies().await?);
            stats.merge(self.scan_tv().await?);
            Ok(Some(stats))
        }
        .await;

        self.scanning.store(false, Ordering::SeqCst);
        if let Ok(Some(stats)) = &result {
            info!(
                "Scan finished: {} scanned, {} unchanged, {} updated, {} deleted, {} errors",
                stats.scanned,
                stats.skipped,
                stats.updated,
                stats.deleted,
                stats.errors
            );
        }
        result
    }

    pub fn is_scanning(&self) -> bool {
        self.scanning.load(Ordering::SeqCst)
    }

    /// Prefix-relative public URL for a path under the media root.
    fn public_url(&self, parts: &[&str]) -> String {
        let prefix = self.config.prefix_path.trim_end_matches('/');
        let mut url = String::from(prefix);
        for part in parts {
            url.push('/');
            url.push_str(part);
        }
        url
    }

    /// Blurhash for an image, consulted through the URL-keyed TTL cache
    /// first so repeated scans never re-decode unchanged art. Failures
    /// degrade to "no blurhash" rather than failing the scan.
    pub(super) async fn blurhash_for(
        &self,
        url: &str,
        path: &Path,
    ) -> Option<String> {
        let cache = match self.dbs.tmdb().await {
            Ok(db) => Some(crate::db::BlurhashCache::new(db)),
            Err(e) => {
                warn!("Blurhash cache unavailable: {e}");
                None
            }
        };
        if let Some(cache) = &cache {
            if let Ok(Some(hash)) = cache.get(url).await {
                return Some(hash);
            }
        }

        let hash = self.blurhash.get_or_compute(path).await.ok()?;
        if let Some(cache) = &cache {
            if let Err(e) = cache.put(url, &hash).await {
                warn!("Failed to cache blurhash for {url}: {e}");
            }
        }
        Some(hash)
    }
}

/// Immediate subdirectories of a library root, sorted by name. A missing
/// root is an empty library, not an error.
pub(super) async fn list_subdirs(root: &Path) -> Vec<(String, PathBuf)> {
    let mut dirs = Vec::new();
    let mut entries = match tokio::fs::read_dir(root).await {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Cannot read library root {}: {e}", root.display());
            return dirs;
        }
    };
    while let Ok(Some(entry)) = entries.next_entry().await {
        let Ok(file_type) = entry.file_type().await else {
            continue;
        };
        if !file_type.is_dir() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            dirs.push((name.to_string(), entry.path()));
        }
    }
    dirs.sort();
    dirs
}

/// Top-level file names of a directory, sorted.
pub(super) async fn list_files(dir: &Path) -> Vec<String> {
    let mut files = Vec::new();
    let Ok(mut entries) = tokio::fs::read_dir(dir).await else {
        return files;
    };
    while let Ok(Some(entry)) = entries.next_entry().await {
        let Ok(file_type) = entry.file_type().await else {
            continue;
        };
        if !file_type.is_file() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            files.push(name.to_string());
        }
    }
    files.sort();
    files
}

pub(super) async fn file_mtime_ms(path: &Path) -> Option<i64> {
    let metadata = tokio::fs::metadata(path).await.ok()?;
    let mtime = metadata.modified().ok()?;
    Some(mtime.duration_since(UNIX_EPOCH).ok()?.as_millis() as i64)
}

/// `Example.en.srt` / `Example.en.hi.srt` -> `(language code, sdh)`.
pub(super) fn parse_subtitle_name(
    file_name: &str,
    stem: &str,
) -> Option<(String, bool)> {
    let rest = file_name
        .strip_prefix(stem)?
        .strip_prefix('.')?
        .strip_suffix(".srt")?;
    let (lang, sdh) = match rest.strip_suffix(".hi") {
        Some(lang) => (lang, true),
        None => (rest, false),
    };
    if lang.is_empty() || lang.contains('.') {
        return None;
    }
    Some((lang.to_string(), sdh))
}

/// Display name for a subtitle language code; unknown codes pass through.
pub(super) fn language_name(code: &str) -> String {
    static NAMES: &[(&str, &str)] = &[
        ("en", "English"),
        ("es", "Spanish"),
        ("fr", "French"),
        ("de", "German"),
        ("it", "Italian"),
        ("ja", "Japanese"),
        ("ko", "Korean"),
        ("pt", "Portuguese"),
        ("ru", "Russian"),
        ("zh", "Chinese"),
    ];
    NAMES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, name)| name.to_string())
        .unwrap_or_else(|| code.to_string())
}

/// Collect `*.srt` siblings of a video into a subtitles map.
pub(super) fn collect_subtitles(
    files: &[String],
    stem: &str,
    url_for: impl Fn(&str) -> String,
    mtimes: &BTreeMap<String, i64>,
) -> BTreeMap<String, filmstrip_model::SubtitleTrack> {
    let mut subtitles = BTreeMap::new();
    for file in files {
        let Some((code, sdh)) = parse_subtitle_name(file, stem) else {
            continue;
        };
        let mut label = language_name(&code);
        if sdh {
            label.push_str(" (SDH)");
        }
        let mtime_ms = mtimes.get(file).copied().unwrap_or(0);
        subtitles.insert(
            label,
            filmstrip_model::SubtitleTrack {
                url: url_for(file),
                srt_last_modified: chrono::DateTime::from_timestamp_millis(
                    mtime_ms,
                )
                .unwrap_or_default(),
                sdh,
            },
        );
    }
    subtitles
}
