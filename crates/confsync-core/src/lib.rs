//! # confsync-core
//!
//! Bidirectional synchronization between line-oriented network-service
//! configuration files on disk and a remote versioned key-value store, plus
//! structured editing of the entries inside those files.
//!
//! ## Architecture
//!
//! - [`entry`]: line ↔ structured entry conversion (directives, reservations, leases)
//! - [`editor`]: create/update/delete on tracked files, with reload signalling
//! - [`retry`]: optimistic-concurrency writes into the remote store
//! - [`sync`]: the per-pair change loop keeping file and record identical
//! - [`traits`]: seams for the remote store, the file watcher, and the reloader
//! - [`store`]: in-memory remote store for tests and embedded use
//! - [`config`]: tracked-pair locations and tuning

pub mod config;
pub mod editor;
pub mod entry;
pub mod error;
pub mod retry;
pub mod store;
pub mod sync;
pub mod traits;

pub use config::SyncConfig;
pub use editor::{BlobEditor, DirectiveEditor, LeaseEditor, ReservationEditor};
pub use entry::{DirectiveEntry, DirectiveKind, LeaseEntry, ParsedLine, ReservationEntry};
pub use error::{Error, Result};
pub use retry::{update_remote_with_retry, RetryPolicy};
pub use store::MemoryRemoteStore;
pub use sync::{RewatchPolicy, SyncEngine, TrackedPair};
pub use traits::{
    FieldMap, FileEvent, FileEventStream, FileOp, FileWatcher, RemoteEvent, RemoteEventKind,
    RemoteEventStream, RemoteRecord, RemoteStore, ServiceReloader,
};
