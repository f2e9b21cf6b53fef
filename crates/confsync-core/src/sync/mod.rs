//! Bidirectional file ↔ remote record synchronization
//!
//! One [`SyncEngine`] runs per tracked pair, fully isolated from the others.
//! The engine owns the change loop: a push to the remote store comes back as a
//! watch event, and is recognized as an echo by byte-comparing the event's
//! content against the local file. Identical content is a no-op; no write, no
//! reload, no further push.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio_stream::StreamExt;
use tracing::{debug, error, info, warn};

use crate::editor::{ensure_file, read_or_empty};
use crate::error::{Error, Result};
use crate::retry::{sleep_or_cancel, update_remote_with_retry, RetryPolicy};
use crate::traits::{
    FileEventStream, FileWatcher, RemoteEventKind, RemoteEventStream, RemoteStore, ServiceReloader,
};

/// One (local file, remote record) binding kept in sync
#[derive(Debug, Clone)]
pub struct TrackedPair {
    /// Local file mirrored to and from the remote store
    pub file_path: PathBuf,
    /// Collection key of the remote record
    pub collection_key: String,
    /// Field within the record holding the file content
    pub field_key: String,
}

impl TrackedPair {
    pub fn new(
        file_path: impl Into<PathBuf>,
        collection_key: impl Into<String>,
        field_key: impl Into<String>,
    ) -> Self {
        Self {
            file_path: file_path.into(),
            collection_key: collection_key.into(),
            field_key: field_key.into(),
        }
    }
}

/// Budgeted exponential backoff for re-registering invalidated watches
///
/// Applies both to the local file watch (invalidated by rename/remove) and to
/// the remote watch stream (closed channels). Exhausting the budget is fatal
/// to the engine rather than spinning forever.
#[derive(Debug, Clone, Copy)]
pub struct RewatchPolicy {
    /// Maximum registration attempts per invalidation
    pub max_attempts: usize,
    /// Delay before the second attempt; doubles each attempt after that
    pub initial_delay: Duration,
    /// Upper bound on the per-attempt delay
    pub max_delay: Duration,
}

impl Default for RewatchPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RewatchPolicy {
    /// Delay to sleep after the given failed attempt (1-based)
    fn delay_after(&self, attempt: usize) -> Duration {
        let doubled = self
            .initial_delay
            .saturating_mul(1u32.checked_shl(attempt.saturating_sub(1) as u32).unwrap_or(u32::MAX));
        doubled.min(self.max_delay)
    }
}

/// The per-pair synchronization loop
pub struct SyncEngine {
    pair: TrackedPair,
    store: Arc<dyn RemoteStore>,
    watcher: Arc<dyn FileWatcher>,
    reloader: Arc<dyn ServiceReloader>,
    retry: RetryPolicy,
    rewatch: RewatchPolicy,
}

impl SyncEngine {
    pub fn new(
        pair: TrackedPair,
        store: Arc<dyn RemoteStore>,
        watcher: Arc<dyn FileWatcher>,
        reloader: Arc<dyn ServiceReloader>,
    ) -> Self {
        Self {
            pair,
            store,
            watcher,
            reloader,
            retry: RetryPolicy::default(),
            rewatch: RewatchPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_rewatch_policy(mut self, rewatch: RewatchPolicy) -> Self {
        self.rewatch = rewatch;
        self
    }

    /// Run until `shutdown` flips to true
    ///
    /// Startup restores the local file from the remote record if one exists,
    /// then watches both sides. Per-event errors are logged and swallowed;
    /// only cancellation returns `Ok`, and only an exhausted watch
    /// re-registration budget returns `Err`.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let key = self.pair.collection_key.as_str();
        info!(key, path = %self.pair.file_path.display(), "sync engine starting");

        if let Err(e) = ensure_file(&self.pair.file_path).await {
            // Registration retries this with backoff; don't die on one failure.
            warn!(key, error = %e, "could not create tracked file at startup");
        }

        if let Err(e) = self.restore_from_remote().await {
            warn!(key, error = %e, "could not restore local file from remote record");
        }

        let mut file_events = self.register_file_watch(&mut shutdown).await?;
        let mut remote_events = self.register_remote_watch(&mut shutdown).await?;

        // The retry helper needs its own receiver; the loop's is parked in
        // the select below.
        let mut push_shutdown = shutdown.clone();

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!(key, "sync engine stopping");
                        return Ok(());
                    }
                }

                event = file_events.next() => {
                    match event {
                        Some(event) if event.invalidates_watch() => {
                            debug!(key, op = ?event.op, "file watch invalidated");
                            file_events = self.register_file_watch(&mut shutdown).await?;
                            if self.push_local(&mut push_shutdown).await.is_err() {
                                return Ok(());
                            }
                        }
                        Some(event) => {
                            debug!(key, op = ?event.op, "local file changed");
                            if self.push_local(&mut push_shutdown).await.is_err() {
                                return Ok(());
                            }
                        }
                        None => {
                            debug!(key, "file watch stream ended");
                            file_events = self.register_file_watch(&mut shutdown).await?;
                        }
                    }
                }

                event = remote_events.next() => {
                    match event {
                        Some(event) if event.key == self.pair.collection_key => {
                            match event.kind {
                                RemoteEventKind::Added | RemoteEventKind::Modified => {
                                    if let Err(e) = self.apply_remote(&event.fields).await {
                                        error!(key, error = %e, "failed to apply remote change");
                                    }
                                }
                                RemoteEventKind::Deleted => {
                                    // Deletions are not mirrored; the local
                                    // file remains the source for re-creation.
                                    debug!(key, "remote record deleted, keeping local file");
                                }
                            }
                        }
                        Some(_) => {}
                        None => {
                            debug!(key, "remote watch stream ended");
                            remote_events = self.register_remote_watch(&mut shutdown).await?;
                        }
                    }
                }
            }
        }
    }

    /// Overwrite the local file from the remote record, if one exists
    async fn restore_from_remote(&self) -> Result<()> {
        match self.store.get(&self.pair.collection_key).await {
            Ok(record) => {
                if let Some(content) = record.fields.get(&self.pair.field_key) {
                    self.sync_file_if_changed(content).await?;
                }
                Ok(())
            }
            Err(Error::NotFound(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Push current local file content into the remote record
    ///
    /// Push failures are logged and swallowed; the only error this returns is
    /// [`Error::Cancelled`], which ends the engine cleanly.
    async fn push_local(&self, shutdown: &mut watch::Receiver<bool>) -> Result<()> {
        let key = self.pair.collection_key.as_str();
        let content = match read_or_empty(&self.pair.file_path).await {
            Ok(content) => content,
            Err(e) => {
                error!(key, error = %e, "failed to read local file for push");
                return Ok(());
            }
        };
        match update_remote_with_retry(
            self.store.as_ref(),
            key,
            &self.pair.field_key,
            &content,
            self.retry,
            shutdown,
        )
        .await
        {
            Ok(()) => {
                debug!(key, bytes = content.len(), "local content pushed to remote");
                Ok(())
            }
            Err(Error::Cancelled) => Err(Error::Cancelled),
            Err(e) => {
                error!(key, error = %e, "failed to push local content to remote");
                Ok(())
            }
        }
    }

    /// Apply a remote field map to the local file, unless already identical
    async fn apply_remote(&self, fields: &crate::traits::FieldMap) -> Result<()> {
        let Some(content) = fields.get(&self.pair.field_key) else {
            return Ok(());
        };
        self.sync_file_if_changed(content).await
    }

    /// Write `content` to the local file and reload, skipping identical bytes
    ///
    /// The byte-equality check is the loop breaker: a push echoed back through
    /// the remote watch finds the file already holding that content and stops.
    async fn sync_file_if_changed(&self, content: &str) -> Result<()> {
        let key = self.pair.collection_key.as_str();
        let current = read_or_empty(&self.pair.file_path).await?;
        if current == content {
            debug!(key, "local file already matches remote content");
            return Ok(());
        }

        tokio::fs::write(&self.pair.file_path, content).await?;
        info!(key, path = %self.pair.file_path.display(), bytes = content.len(),
            "local file updated from remote");
        self.reloader.reload().await
    }

    /// Register the local file watch, with bounded backoff
    async fn register_file_watch(
        &self,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<FileEventStream> {
        let key = self.pair.collection_key.as_str();
        for attempt in 1..=self.rewatch.max_attempts {
            // The file may have been removed out from under us; the watch
            // needs a target to register against. A failure to recreate it
            // counts as a failed attempt like any other.
            let registered = match ensure_file(&self.pair.file_path).await {
                Ok(()) => self.watcher.watch(&self.pair.file_path).await,
                Err(e) => Err(e),
            };
            match registered {
                Ok(stream) => {
                    debug!(key, attempt, "file watch registered");
                    return Ok(stream);
                }
                Err(e) => {
                    warn!(key, attempt, error = %e, "file watch registration failed");
                }
            }
            if attempt < self.rewatch.max_attempts {
                sleep_or_cancel(self.rewatch.delay_after(attempt), shutdown).await?;
            }
        }
        Err(Error::watch(format!(
            "giving up on watching {} after {} attempts",
            self.pair.file_path.display(),
            self.rewatch.max_attempts
        )))
    }

    /// Connect the remote watch stream, with bounded backoff
    async fn register_remote_watch(
        &self,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<RemoteEventStream> {
        let key = self.pair.collection_key.as_str();
        for attempt in 1..=self.rewatch.max_attempts {
            match self.store.watch().await {
                Ok(stream) => {
                    debug!(key, attempt, "remote watch connected");
                    return Ok(stream);
                }
                Err(e) => {
                    warn!(key, attempt, error = %e, "remote watch connection failed");
                }
            }
            if attempt < self.rewatch.max_attempts {
                sleep_or_cancel(self.rewatch.delay_after(attempt), shutdown).await?;
            }
        }
        Err(Error::watch(format!(
            "giving up on the remote watch for {key} after {} attempts",
            self.rewatch.max_attempts
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewatch_delay_doubles_and_caps() {
        let policy = RewatchPolicy {
            max_attempts: 10,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
        };
        assert_eq!(policy.delay_after(1), Duration::from_millis(100));
        assert_eq!(policy.delay_after(2), Duration::from_millis(200));
        assert_eq!(policy.delay_after(3), Duration::from_millis(400));
        assert_eq!(policy.delay_after(6), Duration::from_millis(3200));
        assert_eq!(policy.delay_after(7), Duration::from_secs(5));
        assert_eq!(policy.delay_after(100), Duration::from_secs(5));
    }
}
