//! External enrichment tool invocation.
//!
//! When a media item lacks expected art or metadata, the scanner shells
//! out to a configured tool (a TMDB image downloader in production) for
//! that single item, rate-limited through the `missing_data_media` table.

use crate::db::CatalogRepo;
use crate::error::{MediaError, Result};
use chrono::{Duration, Utc};
use filmstrip_model::{MediaType, MissingDataRecord};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{info, warn};

/// True when the retry window has elapsed and an attempt should run now.
/// Records the attempt timestamp before the tool is invoked so crashed
/// invocations still count against the window.
pub async fn should_attempt_and_mark(
    repo: &CatalogRepo<'_>,
    name: &str,
    retry_hours: i64,
) -> Result<bool> {
    let last = repo.enrichment_last_attempt(name).await?;
    let due = match last {
        Some(last) => Utc::now() - last >= Duration::hours(retry_hours),
        None => true,
    };
    if due {
        repo.record_enrichment_attempt(&MissingDataRecord {
            name: name.to_string(),
            last_attempt: Utc::now(),
        })
        .await?;
    }
    Ok(due)
}

/// Invoke the enrichment tool for a single item. Failures are logged and
/// swallowed; a broken enrichment tool must not fail the scan.
pub async fn run_enrichment(
    bin: Option<&str>,
    media_type: MediaType,
    name: &str,
) -> Result<()> {
    let Some(bin) = bin else {
        return Ok(());
    };

    info!("Running enrichment for {media_type} '{name}'");
    let output = Command::new(bin)
        .arg("--type")
        .arg(media_type.as_str())
        .arg("--name")
        .arg(name)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(MediaError::Io)?;

    if !output.status.success() {
        warn!(
            "Enrichment tool failed for '{name}': {}",
            crate::ffmpeg::stderr_tail(&output.stderr)
        );
    }
    Ok(())
}
