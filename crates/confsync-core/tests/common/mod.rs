//! Shared test doubles for the contract tests

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use confsync_core::error::{Error, Result};
use confsync_core::traits::{FileEvent, FileEventStream, FileWatcher, ServiceReloader};

/// Reloader that counts invocations instead of signalling anything
#[derive(Default)]
pub struct CountingReloader {
    calls: AtomicUsize,
}

impl CountingReloader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ServiceReloader for CountingReloader {
    async fn reload(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// File watcher driven entirely by the test
///
/// Each queued stream satisfies one `watch` call, in order. A `watch` call
/// with nothing queued fails, which the tests use to simulate registration
/// failures.
#[derive(Default)]
pub struct ControlledFileWatcher {
    streams: Mutex<VecDeque<FileEventStream>>,
    watch_calls: AtomicUsize,
}

impl ControlledFileWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue one event stream; returns the sender that feeds it
    pub fn queue_stream(&self) -> mpsc::UnboundedSender<FileEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.streams
            .lock()
            .unwrap()
            .push_back(Box::pin(UnboundedReceiverStream::new(rx)));
        tx
    }

    pub fn watch_calls(&self) -> usize {
        self.watch_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FileWatcher for ControlledFileWatcher {
    async fn watch(&self, path: &Path) -> Result<FileEventStream> {
        self.watch_calls.fetch_add(1, Ordering::SeqCst);
        self.streams
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| Error::watch(format!("no watch available for {}", path.display())))
    }
}

/// Poll `condition` until it holds or the timeout elapses
pub async fn wait_until<F>(mut condition: F, what: &str)
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !condition() {
        if tokio::time::Instant::now() > deadline {
            panic!("timed out waiting for: {what}");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
