//! Retry-on-busy for SQLite operations.
//!
//! WAL mode plus a 15s busy_timeout absorbs most contention, but writers
//! colliding at transaction boundaries can still surface SQLITE_BUSY.
//! Every logical operation goes through [`with_retry`].

use crate::error::{MediaError, Result};
use rand::Rng;
use std::time::Duration;
use tracing::debug;

const MAX_ATTEMPTS: u32 = 15;
const BASE_DELAY_MS: f64 = 200.0;
const MAX_DELAY_MS: f64 = 5000.0;

/// Backoff before retry `attempt` (0-based): `min(1.5^n * 200ms, 5s)`
/// scaled by jitter in `[0.9, 1.1]`.
fn backoff_delay(attempt: u32, jitter: f64) -> Duration {
    let base = (1.5f64.powi(attempt as i32) * BASE_DELAY_MS).min(MAX_DELAY_MS);
    Duration::from_millis((base * jitter) as u64)
}

/// Run `op` until it succeeds, fails with a non-busy error, or exhausts
/// the retry budget; exhaustion surfaces `DbBusy`.
pub async fn with_retry<T, F, Fut>(op_name: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    for attempt in 0..MAX_ATTEMPTS {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_db_busy() => {
                if attempt + 1 == MAX_ATTEMPTS {
                    return Err(MediaError::DbBusy(op_name.to_string()));
                }
                let jitter = rand::rng().random_range(0.9..=1.1);
                let delay = backoff_delay(attempt, jitter);
                debug!(
                    "{op_name}: database busy (attempt {}), retrying in {:?}",
                    attempt + 1,
                    delay
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
    Err(MediaError::DbBusy(op_name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn backoff_grows_and_caps() {
        let first = backoff_delay(0, 1.0);
        let second = backoff_delay(1, 1.0);
        let capped = backoff_delay(14, 1.0);
        assert_eq!(first, Duration::from_millis(200));
        assert_eq!(second, Duration::from_millis(300));
        assert_eq!(capped, Duration::from_millis(5000));
    }

    #[test]
    fn jitter_bounds_are_respected() {
        assert_eq!(backoff_delay(0, 0.9), Duration::from_millis(180));
        assert_eq!(backoff_delay(0, 1.1), Duration::from_millis(220));
    }

    #[tokio::test]
    async fn non_busy_errors_do_not_retry() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = with_retry("op", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(MediaError::BadRequest("nope".into())) }
        })
        .await;
        assert!(matches!(result, Err(MediaError::BadRequest(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn success_passes_through() {
        let result = with_retry("op", || async { Ok(7) }).await.unwrap();
        assert_eq!(result, 7);
    }
}
