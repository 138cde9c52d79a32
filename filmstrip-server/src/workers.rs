//! Periodic background workers: cache eviction, library scans, and the
//! auto-sync notifier. Each worker is one interval loop on the runtime;
//! overlapping scan ticks are dropped by the scanner's guard flag.

use crate::state::AppState;
use filmstrip_core::cache::sweeper::sweep_dir;
use std::time::Duration;
use tracing::{debug, error, info};

/// Hourly library rescan.
const SCAN_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Auto-sync notification cadence.
const AUTOSYNC_INTERVAL: Duration = Duration::from_secs(5 * 60);

pub fn spawn_all(state: &AppState) {
    spawn_sweepers(state);
    spawn_scan_loop(state);
    spawn_autosync(state);
}

fn spawn_sweepers(state: &AppState) {
    for (dir, policy) in state.cache.sweep_plan() {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(policy.interval);
            // The immediate first tick would race startup; skip it.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = sweep_dir(&dir, &policy).await;
                debug!(
                    "Sweep of {} removed {removed} file(s)",
                    dir.display()
                );
            }
        });
    }
}

fn spawn_scan_loop(state: &AppState) {
    let scanner = state.scanner.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SCAN_INTERVAL);
        loop {
            ticker.tick().await;
            match scanner.scan_all().await {
                Ok(Some(_)) => {}
                Ok(None) => info!("Scheduled scan skipped; one is running"),
                Err(e) => error!("Scheduled scan failed: {e}"),
            }
        }
    });
}

/// Notify the external auto-sync service that the catalog may have
/// changed. The service is a black box; a failed POST is logged and the
/// next tick tries again.
fn spawn_autosync(state: &AppState) {
    let Some(url) = state.config.autosync_url.clone() else {
        debug!("Auto-sync notifier disabled (no URL configured)");
        return;
    };

    tokio::spawn(async move {
        let client = reqwest::Client::new();
        let mut ticker = tokio::time::interval(AUTOSYNC_INTERVAL);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match client.post(&url).send().await {
                Ok(response) if response.status().is_success() => {
                    debug!("Auto-sync notified");
                }
                Ok(response) => {
                    error!(
                        "Auto-sync notifier returned {}",
                        response.status()
                    );
                }
                Err(e) => error!("Auto-sync notification failed: {e}"),
            }
        }
    });
}
