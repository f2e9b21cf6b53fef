//! # confsync-watch-notify
//!
//! [`FileWatcher`] implementation backed by the `notify` crate, bridging OS
//! file notification (inotify, FSEvents, ReadDirectoryChangesW) into the
//! event stream the sync engine consumes.

use std::path::Path;
use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use notify::event::ModifyKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::Stream;
use tracing::{debug, trace, warn};

use confsync_core::error::{Error, Result};
use confsync_core::traits::{FileEvent, FileEventStream, FileOp, FileWatcher};

/// Map a notify event to the sync engine's vocabulary, if it is relevant
fn map_event(event: &Event) -> Option<FileOp> {
    match event.kind {
        EventKind::Create(_) => Some(FileOp::Create),
        EventKind::Modify(ModifyKind::Name(_)) => Some(FileOp::Rename),
        EventKind::Modify(_) => Some(FileOp::Write),
        EventKind::Remove(_) => Some(FileOp::Remove),
        _ => None,
    }
}

/// Stream of file events that keeps its OS watch registered
///
/// Dropping the stream drops the underlying watcher, releasing the watch.
struct NotifyEventStream {
    _watcher: RecommendedWatcher,
    events: UnboundedReceiverStream<FileEvent>,
}

impl Stream for NotifyEventStream {
    type Item = FileEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.get_mut().events).poll_next(cx)
    }
}

/// [`FileWatcher`] backed by the platform's native notification mechanism
#[derive(Debug, Default)]
pub struct NotifyFileWatcher;

impl NotifyFileWatcher {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl FileWatcher for NotifyFileWatcher {
    async fn watch(&self, path: &Path) -> Result<FileEventStream> {
        let (tx, rx) = mpsc::unbounded_channel();

        let mut watcher = notify::recommended_watcher(
            move |result: std::result::Result<Event, notify::Error>| match result {
                Ok(event) => {
                    if let Some(op) = map_event(&event) {
                        trace!(?op, "file event observed");
                        // Send fails only once the stream is dropped.
                        let _ = tx.send(FileEvent::new(op));
                    }
                }
                Err(e) => warn!(error = %e, "file notification backend error"),
            },
        )
        .map_err(|e| Error::watch(format!("could not start watcher: {e}")))?;

        watcher
            .watch(path, RecursiveMode::NonRecursive)
            .map_err(|e| Error::watch(format!("could not watch {}: {e}", path.display())))?;
        debug!(path = %path.display(), "file watch registered");

        Ok(Box::pin(NotifyEventStream {
            _watcher: watcher,
            events: UnboundedReceiverStream::new(rx),
        }))
    }
}
