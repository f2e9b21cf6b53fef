// # File Watcher Trait
//
// Defines the interface for observing changes to one tracked file.
//
// ## Implementations
//
// - notify-based (cross-platform): `confsync-watch-notify` crate
// - Channel-driven test doubles live in the contract tests
//
// ## Re-registration
//
// Renames and removals invalidate a watch on most platforms. The stream still
// reports the Rename/Remove op; the sync engine then drops the stream and calls
// `watch()` again (with bounded backoff) once the file reappears.

use async_trait::async_trait;
use std::path::Path;
use std::pin::Pin;
use tokio_stream::Stream;

use crate::error::Result;

/// Filesystem operation observed on the tracked file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOp {
    Write,
    Create,
    Rename,
    Remove,
}

/// One filesystem change event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEvent {
    /// The operation that was observed
    pub op: FileOp,
}

impl FileEvent {
    pub fn new(op: FileOp) -> Self {
        Self { op }
    }

    /// True if the watch on the file is now stale and must be re-registered
    pub fn invalidates_watch(&self) -> bool {
        matches!(self.op, FileOp::Rename | FileOp::Remove)
    }
}

/// A pinned boxed stream of file change events
pub type FileEventStream = Pin<Box<dyn Stream<Item = FileEvent> + Send + 'static>>;

/// Trait for file watcher implementations
///
/// Implementations must be thread-safe and usable across async tasks. Each
/// `watch` call registers an independent watch; dropping the returned stream
/// releases it.
#[async_trait]
pub trait FileWatcher: Send + Sync {
    /// Start watching a single file for changes
    ///
    /// # Returns
    ///
    /// - `Ok(FileEventStream)`: events until the watch is invalidated or dropped
    /// - `Err(Error::Watch)`: registration failed (e.g. the file is absent)
    async fn watch(&self, path: &Path) -> Result<FileEventStream>;
}
