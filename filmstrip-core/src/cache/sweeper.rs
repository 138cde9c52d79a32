//! TTL eviction for the cache roots.
//!
//! Each root is swept on its own timer. Sweeps never abort: per-file
//! errors are logged and skipped, and a file deleted by a concurrent
//! writer mid-sweep is simply gone by the time we try.

use super::CacheStore;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};
use tokio::fs;
use tracing::{debug, info, warn};

/// Which file timestamp the TTL is measured against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgeBasis {
    Modified,
    /// Last access; falls back to mtime when the filesystem does not
    /// track atime.
    Accessed,
}

/// TTL policy of one cache root.
#[derive(Debug, Clone, Copy)]
pub struct SweepPolicy {
    pub max_age: Duration,
    pub basis: AgeBasis,
    /// How often this root is swept.
    pub interval: Duration,
}

const DAY: u64 = 24 * 60 * 60;

impl CacheStore {
    /// `(directory, policy)` for each cache root.
    pub fn sweep_plan(&self) -> Vec<(PathBuf, SweepPolicy)> {
        vec![
            (
                self.general_dir(),
                SweepPolicy {
                    max_age: Duration::from_secs(30 * DAY),
                    basis: AgeBasis::Modified,
                    interval: Duration::from_secs(30 * 60),
                },
            ),
            (
                self.frames_dir(),
                SweepPolicy {
                    max_age: Duration::from_secs(7 * DAY),
                    basis: AgeBasis::Accessed,
                    interval: Duration::from_secs(DAY),
                },
            ),
            (
                self.spritesheet_dir(),
                SweepPolicy {
                    max_age: Duration::from_secs(240 * DAY),
                    basis: AgeBasis::Accessed,
                    interval: Duration::from_secs(DAY),
                },
            ),
            (
                self.clips_dir(),
                SweepPolicy {
                    max_age: Duration::from_secs(5 * 60),
                    basis: AgeBasis::Modified,
                    interval: Duration::from_secs(DAY),
                },
            ),
        ]
    }
}

/// Delete every file in `dir` older than the policy allows. Returns how
/// many files were removed.
pub async fn sweep_dir(dir: &PathBuf, policy: &SweepPolicy) -> usize {
    let now = SystemTime::now();
    let mut removed = 0;

    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) => {
            debug!("Skipping sweep of {}: {e}", dir.display());
            return 0;
        }
    };

    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => {
                warn!("Error iterating {}: {e}", dir.display());
                break;
            }
        };

        let metadata = match entry.metadata().await {
            Ok(metadata) if metadata.is_file() => metadata,
            // Vanished mid-sweep, or a subdirectory.
            _ => continue,
        };

        let stamp = match policy.basis {
            AgeBasis::Modified => metadata.modified(),
            AgeBasis::Accessed => {
                metadata.accessed().or_else(|_| metadata.modified())
            }
        };
        let age = stamp
            .ok()
            .and_then(|stamp| now.duration_since(stamp).ok())
            .unwrap_or(Duration::ZERO);

        if age > policy.max_age {
            match fs::remove_file(entry.path()).await {
                Ok(()) => removed += 1,
                Err(e) => {
                    warn!(
                        "Failed to evict {}: {e}",
                        entry.path().display()
                    );
                }
            }
        }
    }

    if removed > 0 {
        info!("Evicted {removed} file(s) from {}", dir.display());
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn sweeps_only_expired_files() {
        let dir = tempdir().unwrap();
        let old = dir.path().join("old.png");
        let fresh = dir.path().join("fresh.png");
        std::fs::write(&old, b"x").unwrap();
        std::fs::write(&fresh, b"x").unwrap();

        // Zero TTL expires everything already on disk.
        let removed = sweep_dir(
            &dir.path().to_path_buf(),
            &SweepPolicy {
                max_age: Duration::ZERO,
                basis: AgeBasis::Modified,
                interval: Duration::from_secs(1),
            },
        )
        .await;
        assert_eq!(removed, 2);

        std::fs::write(&fresh, b"x").unwrap();
        let removed = sweep_dir(
            &dir.path().to_path_buf(),
            &SweepPolicy {
                max_age: Duration::from_secs(3600),
                basis: AgeBasis::Modified,
                interval: Duration::from_secs(1),
            },
        )
        .await;
        assert_eq!(removed, 0);
        assert!(fresh.exists());
    }

    #[tokio::test]
    async fn missing_dir_is_not_an_error() {
        let removed = sweep_dir(
            &PathBuf::from("/nonexistent/cache/root"),
            &SweepPolicy {
                max_age: Duration::ZERO,
                basis: AgeBasis::Accessed,
                interval: Duration::from_secs(1),
            },
        )
        .await;
        assert_eq!(removed, 0);
    }

    #[tokio::test]
    async fn subdirectories_are_skipped() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("file.png"), b"x").unwrap();

        let removed = sweep_dir(
            &dir.path().to_path_buf(),
            &SweepPolicy {
                max_age: Duration::ZERO,
                basis: AgeBasis::Modified,
                interval: Duration::from_secs(1),
            },
        )
        .await;
        assert_eq!(removed, 1);
        assert!(dir.path().join("nested").is_dir());
    }
}
