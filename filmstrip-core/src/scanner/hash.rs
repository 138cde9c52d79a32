//! Depth-bounded directory content hashing.
//!
//! The hash is a pure function over `(relative path, size, mtime)` tuples
//! so the scanner can decide "unchanged, skip" without opening a single
//! media file, and tests can fabricate inputs without a filesystem.

use crate::error::Result;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

/// How deep below the media directory entries are collected.
pub const HASH_DEPTH: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryMeta {
    /// Path relative to the hashed directory, `/`-separated.
    pub rel_path: String,
    pub size: u64,
    pub mtime_ms: i64,
}

/// Hash a set of entry metadata. Order-insensitive: entries are sorted by
/// relative path before digesting.
pub fn directory_hash(entries: &[EntryMeta]) -> String {
    let mut sorted: Vec<&EntryMeta> = entries.iter().collect();
    sorted.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));

    let mut hasher = Sha256::new();
    for entry in sorted {
        hasher.update(entry.rel_path.as_bytes());
        hasher.update(b"|");
        hasher.update(entry.size.to_le_bytes());
        hasher.update(entry.mtime_ms.to_le_bytes());
        hasher.update(b"\n");
    }
    hex::encode(hasher.finalize())
}

/// Collect `(name, size, mtime)` of every file and directory under
/// `dir`, to [`HASH_DEPTH`] levels.
pub async fn collect_entries(dir: &Path) -> Result<Vec<EntryMeta>> {
    let dir = dir.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let mut entries = Vec::new();
        collect_recursive(&dir, &dir, 0, &mut entries)?;
        Ok(entries)
    })
    .await
    .map_err(|e| {
        crate::error::MediaError::Internal(format!("hash walk panicked: {e}"))
    })?
}

fn collect_recursive(
    root: &PathBuf,
    dir: &Path,
    depth: usize,
    out: &mut Vec<EntryMeta>,
) -> Result<()> {
    if depth > HASH_DEPTH {
        return Ok(());
    }
    for entry in std::fs::read_dir(dir)? {
        let Ok(entry) = entry else { continue };
        let Ok(metadata) = entry.metadata() else { continue };

        let rel_path = entry
            .path()
            .strip_prefix(root)
            .map(|p| p.to_string_lossy().replace('\\', "/"))
            .unwrap_or_else(|_| entry.file_name().to_string_lossy().into());

        let mtime_ms = metadata
            .modified()
            .ok()
            .and_then(|m| m.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0);

        out.push(EntryMeta {
            rel_path,
            size: if metadata.is_file() { metadata.len() } else { 0 },
            mtime_ms,
        });

        if metadata.is_dir() {
            collect_recursive(root, &entry.path(), depth + 1, out)?;
        }
    }
    Ok(())
}

/// Hash a directory on disk.
pub async fn hash_directory(dir: &Path) -> Result<String> {
    let entries = collect_entries(dir).await?;
    Ok(directory_hash(&entries))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn meta(path: &str, size: u64, mtime: i64) -> EntryMeta {
        EntryMeta {
            rel_path: path.into(),
            size,
            mtime_ms: mtime,
        }
    }

    #[test]
    fn hash_is_order_insensitive() {
        let a = vec![meta("a.mp4", 10, 1), meta("b.srt", 5, 2)];
        let b = vec![meta("b.srt", 5, 2), meta("a.mp4", 10, 1)];
        assert_eq!(directory_hash(&a), directory_hash(&b));
    }

    #[test]
    fn hash_is_sensitive_to_each_field() {
        let base = vec![meta("a.mp4", 10, 1)];
        assert_ne!(
            directory_hash(&base),
            directory_hash(&[meta("b.mp4", 10, 1)])
        );
        assert_ne!(
            directory_hash(&base),
            directory_hash(&[meta("a.mp4", 11, 1)])
        );
        assert_ne!(
            directory_hash(&base),
            directory_hash(&[meta("a.mp4", 10, 2)])
        );
    }

    #[test]
    fn empty_directory_hashes_consistently() {
        assert_eq!(directory_hash(&[]), directory_hash(&[]));
    }

    #[tokio::test]
    async fn on_disk_hash_tracks_changes() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("Example.mp4"), b"video").unwrap();
        std::fs::write(dir.path().join("poster.jpg"), b"img").unwrap();

        let before = hash_directory(dir.path()).await.unwrap();
        let unchanged = hash_directory(dir.path()).await.unwrap();
        assert_eq!(before, unchanged);

        std::fs::write(dir.path().join("backdrop.jpg"), b"img2").unwrap();
        let after = hash_directory(dir.path()).await.unwrap();
        assert_ne!(before, after);
    }

    #[tokio::test]
    async fn depth_bound_ignores_deep_churn() {
        let dir = tempdir().unwrap();
        let deep = dir.path().join("a/b/c/d");
        std::fs::create_dir_all(&deep).unwrap();
        let before = hash_directory(dir.path()).await.unwrap();

        // `d` sits below the depth bound; churn inside it is invisible.
        std::fs::write(deep.join("too_deep.bin"), b"x").unwrap();
        let after = hash_directory(dir.path()).await.unwrap();
        assert_eq!(before, after);
    }
}
