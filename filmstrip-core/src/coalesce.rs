//! Request coalescing for expensive derivations.
//!
//! Each artifact kind keeps a map of in-flight fingerprints. The first
//! caller for a fingerprint becomes the producer and does the work; later
//! callers subscribe to the producer's completion and are served from the
//! same on-disk artifact. The producer holds an RAII guard, so the
//! fingerprint is removed on every exit path — including panic and early
//! `?` return — and a producer that vanishes fails its waiters instead of
//! wedging them.

use crate::error::{MediaError, Result};
use dashmap::{mapref::entry::Entry, DashMap};
use std::hash::Hash;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::debug;

/// Cloneable failure handed to waiters, preserving enough of the error
/// taxonomy to map to the right HTTP status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SharedFailure {
    SourceMissing(String),
    NotFound(String),
    BadRequest(String),
    Other(String),
}

impl SharedFailure {
    fn from_error(err: &MediaError) -> Self {
        match err {
            MediaError::SourceMissing(msg) => {
                SharedFailure::SourceMissing(msg.clone())
            }
            MediaError::NotFound(msg) => SharedFailure::NotFound(msg.clone()),
            MediaError::BadRequest(msg) => {
                SharedFailure::BadRequest(msg.clone())
            }
            other => SharedFailure::Other(other.to_string()),
        }
    }

    fn into_error(self) -> MediaError {
        match self {
            SharedFailure::SourceMissing(msg) => {
                MediaError::SourceMissing(msg)
            }
            SharedFailure::NotFound(msg) => MediaError::NotFound(msg),
            SharedFailure::BadRequest(msg) => MediaError::BadRequest(msg),
            SharedFailure::Other(msg) => MediaError::Internal(msg),
        }
    }
}

#[derive(Debug, Clone)]
enum WaitState {
    Pending,
    Done(PathBuf),
    Failed(SharedFailure),
}

type InflightMap<K> = Arc<DashMap<K, watch::Receiver<WaitState>>>;

/// Outcome of [`Coalescer::join`].
#[derive(Debug)]
pub enum Role<K: Eq + Hash + Clone + Send + Sync + 'static> {
    /// This caller does the work and must resolve the guard.
    Producer(ProducerGuard<K>),
    /// Another caller is already producing; await its result.
    Waiter(Waiter),
}

#[derive(Debug)]
pub struct Coalescer<K: Eq + Hash + Clone + Send + Sync + 'static> {
    inflight: InflightMap<K>,
}

impl<K: Eq + Hash + Clone + Send + Sync + 'static> Default for Coalescer<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + Hash + Clone + Send + Sync + 'static> Coalescer<K> {
    pub fn new() -> Self {
        Self {
            inflight: Arc::new(DashMap::new()),
        }
    }

    /// Atomically become the producer for `key` or subscribe to the one
    /// already in flight.
    pub fn join(&self, key: K) -> Role<K> {
        match self.inflight.entry(key.clone()) {
            Entry::Occupied(entry) => Role::Waiter(Waiter {
                rx: entry.get().clone(),
            }),
            Entry::Vacant(vacant) => {
                let (tx, rx) = watch::channel(WaitState::Pending);
                vacant.insert(rx);
                Role::Producer(ProducerGuard {
                    key,
                    map: Arc::clone(&self.inflight),
                    tx,
                    resolved: false,
                })
            }
        }
    }

    /// Number of fingerprints currently in flight.
    pub fn len(&self) -> usize {
        self.inflight.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inflight.is_empty()
    }
}

#[derive(Debug)]
pub struct ProducerGuard<K: Eq + Hash + Clone + Send + Sync + 'static> {
    key: K,
    map: InflightMap<K>,
    tx: watch::Sender<WaitState>,
    resolved: bool,
}

impl<K: Eq + Hash + Clone + Send + Sync + 'static> ProducerGuard<K> {
    /// Publish the finished artifact to every waiter.
    pub fn complete(mut self, artifact: PathBuf) {
        self.resolved = true;
        let _ = self.tx.send(WaitState::Done(artifact));
    }

    /// Propagate the producer's failure to every waiter.
    pub fn fail(mut self, err: &MediaError) {
        self.resolved = true;
        let _ = self.tx.send(WaitState::Failed(SharedFailure::from_error(err)));
    }
}

impl<K: Eq + Hash + Clone + Send + Sync + 'static> Drop for ProducerGuard<K> {
    fn drop(&mut self) {
        self.map.remove(&self.key);
        if !self.resolved {
            debug!("Producer dropped without resolving; failing waiters");
            let _ = self.tx.send(WaitState::Failed(SharedFailure::Other(
                "producer aborted".to_string(),
            )));
        }
    }
}

#[derive(Debug)]
pub struct Waiter {
    rx: watch::Receiver<WaitState>,
}

impl Waiter {
    /// Wait for the producer's artifact, optionally bounded in time.
    pub async fn wait(
        mut self,
        timeout: Option<Duration>,
        what: &str,
    ) -> Result<PathBuf> {
        let outcome = async {
            loop {
                let state = self.rx.borrow_and_update().clone();
                match state {
                    WaitState::Done(path) => return Ok(path),
                    WaitState::Failed(failure) => {
                        return Err(failure.into_error())
                    }
                    WaitState::Pending => {
                        if self.rx.changed().await.is_err() {
                            return Err(MediaError::Internal(
                                "producer vanished".to_string(),
                            ));
                        }
                    }
                }
            }
        };

        match timeout {
            Some(limit) => tokio::time::timeout(limit, outcome)
                .await
                .map_err(|_| MediaError::Timeout(what.to_string()))?,
            None => outcome.await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn second_caller_becomes_waiter_and_gets_result() {
        let coalescer: Coalescer<String> = Coalescer::new();

        let Role::Producer(guard) = coalescer.join("sprite:Example".into())
        else {
            panic!("first caller must produce");
        };
        let Role::Waiter(waiter) = coalescer.join("sprite:Example".into())
        else {
            panic!("second caller must wait");
        };

        let handle = tokio::spawn(waiter.wait(None, "sprite"));
        guard.complete(PathBuf::from("/cache/sprite.png"));

        let path = handle.await.unwrap().unwrap();
        assert_eq!(path, PathBuf::from("/cache/sprite.png"));
        assert!(coalescer.is_empty());
    }

    #[tokio::test]
    async fn producer_failure_propagates_to_waiters() {
        let coalescer: Coalescer<String> = Coalescer::new();

        let Role::Producer(guard) = coalescer.join("k".into()) else {
            panic!();
        };
        let Role::Waiter(waiter) = coalescer.join("k".into()) else {
            panic!();
        };

        let handle = tokio::spawn(waiter.wait(None, "sprite"));
        guard.fail(&MediaError::SourceMissing("gone.mp4".into()));

        let err = handle.await.unwrap().unwrap_err();
        assert!(matches!(err, MediaError::SourceMissing(_)));
        assert!(coalescer.is_empty());
    }

    #[tokio::test]
    async fn dropped_producer_fails_waiters_and_clears_key() {
        let coalescer: Coalescer<String> = Coalescer::new();

        let Role::Producer(guard) = coalescer.join("k".into()) else {
            panic!();
        };
        let Role::Waiter(waiter) = coalescer.join("k".into()) else {
            panic!();
        };

        drop(guard);
        let err = waiter.wait(None, "sprite").await.unwrap_err();
        assert!(matches!(err, MediaError::Internal(_)));
        assert!(coalescer.is_empty());

        // Key is free again for a fresh producer.
        assert!(matches!(coalescer.join("k".into()), Role::Producer(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn waiter_times_out() {
        let coalescer: Coalescer<String> = Coalescer::new();

        let Role::Producer(_guard) = coalescer.join("k".into()) else {
            panic!();
        };
        let Role::Waiter(waiter) = coalescer.join("k".into()) else {
            panic!();
        };

        let err = waiter
            .wait(Some(Duration::from_secs(10)), "clip")
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::Timeout(_)));
    }
}
