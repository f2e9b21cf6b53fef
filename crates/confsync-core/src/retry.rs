//! Optimistic-concurrency writes into the remote store
//!
//! [`update_remote_with_retry`] is the sole writer path into the remote store.
//! It serializes its own retries; it places no constraint on other clients
//! writing the same record concurrently.

use std::time::Duration;

use rand::Rng;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::traits::{FieldMap, RemoteStore};

/// Attempt budget and backoff window for remote writes
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum number of attempts before giving up
    pub max_attempts: usize,
    /// Lower bound of the uniformly sampled backoff
    pub backoff_min: Duration,
    /// Upper bound of the uniformly sampled backoff
    pub backoff_max: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            backoff_min: Duration::from_millis(500),
            backoff_max: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// One uniformly sampled backoff duration from the window
    ///
    /// Sampled eagerly so no RNG handle is held across an await point.
    fn sample_backoff(&self) -> Duration {
        if self.backoff_max <= self.backoff_min {
            return self.backoff_min;
        }
        rand::thread_rng().gen_range(self.backoff_min..=self.backoff_max)
    }
}

/// Write `content` under `field` of the record at `key`, retrying conflicts
///
/// Each attempt re-reads the record and presents the version token from that
/// same read, so a conflict always forces a fresh read. A missing record is
/// created with `{field: content}`; losing the creation race to a concurrent
/// creator is transient and triggers an immediate re-read. Version conflicts
/// and creation failures back off for a uniformly random delay before the next
/// attempt; any other update error is returned as-is, unretried.
///
/// Backoff sleeps race against `shutdown`; a flip to `true` (or a dropped
/// sender) aborts with [`Error::Cancelled`].
pub async fn update_remote_with_retry(
    store: &dyn RemoteStore,
    key: &str,
    field: &str,
    content: &str,
    policy: RetryPolicy,
    shutdown: &mut watch::Receiver<bool>,
) -> Result<()> {
    for attempt in 1..=policy.max_attempts {
        match store.get(key).await {
            Ok(record) => {
                let mut fields = record.fields;
                fields.insert(field.to_string(), content.to_string());
                match store.update(key, fields, &record.version).await {
                    Ok(_) => {
                        debug!(key, attempt, "remote record updated");
                        return Ok(());
                    }
                    Err(e) if e.is_conflict() => {
                        warn!(key, attempt, "version conflict updating remote record, retrying");
                    }
                    Err(e) => return Err(e),
                }
            }
            Err(Error::NotFound(_)) => {
                let mut fields = FieldMap::new();
                fields.insert(field.to_string(), content.to_string());
                match store.create(key, fields).await {
                    Ok(()) => {
                        debug!(key, attempt, "remote record created");
                        return Ok(());
                    }
                    Err(Error::AlreadyExists(_)) => {
                        // Lost the creation race; the record is there now, so
                        // re-read right away instead of sleeping.
                        debug!(key, attempt, "remote record appeared concurrently, re-reading");
                        continue;
                    }
                    Err(e) => {
                        warn!(key, attempt, error = %e, "failed to create remote record, retrying");
                    }
                }
            }
            Err(e) => {
                warn!(key, attempt, error = %e, "failed to read remote record, retrying");
            }
        }

        if attempt < policy.max_attempts {
            sleep_or_cancel(policy.sample_backoff(), shutdown).await?;
        }
    }

    Err(Error::RetryExhausted {
        key: key.to_string(),
        attempts: policy.max_attempts,
    })
}

/// Sleep for `delay` unless the shutdown signal fires first
pub(crate) async fn sleep_or_cancel(
    delay: Duration,
    shutdown: &mut watch::Receiver<bool>,
) -> Result<()> {
    if *shutdown.borrow() {
        return Err(Error::Cancelled);
    }
    tokio::select! {
        _ = tokio::time::sleep(delay) => Ok(()),
        changed = shutdown.changed() => match changed {
            Ok(()) if !*shutdown.borrow() => Ok(()),
            _ => Err(Error::Cancelled),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::{RemoteEventStream, RemoteRecord};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Store double that fails the first `conflicts` updates, then succeeds
    struct ConflictingStore {
        conflicts: usize,
        update_calls: AtomicUsize,
        stored: Mutex<FieldMap>,
    }

    impl ConflictingStore {
        fn new(conflicts: usize) -> Self {
            Self {
                conflicts,
                update_calls: AtomicUsize::new(0),
                stored: Mutex::new(FieldMap::new()),
            }
        }
    }

    #[async_trait]
    impl RemoteStore for ConflictingStore {
        async fn get(&self, key: &str) -> Result<RemoteRecord> {
            Ok(RemoteRecord {
                key: key.to_string(),
                fields: self.stored.lock().unwrap().clone(),
                version: "1".to_string(),
            })
        }

        async fn create(&self, _key: &str, _fields: FieldMap) -> Result<()> {
            Err(Error::already_exists("present"))
        }

        async fn update(&self, _key: &str, fields: FieldMap, _version: &str) -> Result<String> {
            let n = self.update_calls.fetch_add(1, Ordering::SeqCst);
            if n < self.conflicts {
                return Err(Error::conflict("stale version"));
            }
            *self.stored.lock().unwrap() = fields;
            Ok("2".to_string())
        }

        async fn watch(&self) -> Result<RemoteEventStream> {
            unimplemented!("not used by these tests")
        }
    }

    /// Store double where the record never exists and creation always races
    struct AlwaysRacingStore {
        get_calls: AtomicUsize,
    }

    #[async_trait]
    impl RemoteStore for AlwaysRacingStore {
        async fn get(&self, key: &str) -> Result<RemoteRecord> {
            self.get_calls.fetch_add(1, Ordering::SeqCst);
            Err(Error::not_found(key))
        }

        async fn create(&self, _key: &str, _fields: FieldMap) -> Result<()> {
            Err(Error::already_exists("raced"))
        }

        async fn update(&self, _key: &str, _fields: FieldMap, _version: &str) -> Result<String> {
            unimplemented!("not used by these tests")
        }

        async fn watch(&self) -> Result<RemoteEventStream> {
            unimplemented!("not used by these tests")
        }
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 10,
            backoff_min: Duration::from_millis(1),
            backoff_max: Duration::from_millis(2),
        }
    }

    fn live_shutdown() -> (watch::Sender<bool>, watch::Receiver<bool>) {
        watch::channel(false)
    }

    #[tokio::test]
    async fn conflict_then_success_lands_the_content() {
        let store = ConflictingStore::new(1);
        let (_tx, mut rx) = live_shutdown();

        update_remote_with_retry(&store, "k", "f", "payload", fast_policy(), &mut rx)
            .await
            .unwrap();

        assert_eq!(store.update_calls.load(Ordering::SeqCst), 2);
        assert_eq!(
            store.stored.lock().unwrap().get("f").map(String::as_str),
            Some("payload")
        );
    }

    #[tokio::test]
    async fn persistent_conflicts_exhaust_the_budget() {
        let store = ConflictingStore::new(usize::MAX);
        let (_tx, mut rx) = live_shutdown();

        let err = update_remote_with_retry(&store, "k", "f", "payload", fast_policy(), &mut rx)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::RetryExhausted { attempts: 10, .. }
        ));
        assert_eq!(store.update_calls.load(Ordering::SeqCst), 10);
    }

    #[tokio::test]
    async fn creation_race_re_reads_without_sleeping() {
        let store = AlwaysRacingStore {
            get_calls: AtomicUsize::new(0),
        };
        let (_tx, mut rx) = live_shutdown();
        let policy = RetryPolicy {
            // A race would reveal itself as a long test if backoff were taken
            backoff_min: Duration::from_secs(30),
            backoff_max: Duration::from_secs(60),
            ..fast_policy()
        };

        let start = tokio::time::Instant::now();
        let err = update_remote_with_retry(&store, "k", "f", "payload", policy, &mut rx)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::RetryExhausted { .. }));
        assert_eq!(store.get_calls.load(Ordering::SeqCst), 10);
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn shutdown_cancels_a_pending_backoff() {
        let store = ConflictingStore::new(usize::MAX);
        let (tx, mut rx) = live_shutdown();
        let policy = RetryPolicy {
            backoff_min: Duration::from_secs(30),
            backoff_max: Duration::from_secs(60),
            ..fast_policy()
        };

        let handle = tokio::spawn(async move {
            update_remote_with_retry(&store, "k", "f", "payload", policy, &mut rx).await
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        tx.send(true).unwrap();

        let err = handle.await.unwrap().unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }
}
