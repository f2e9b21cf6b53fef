//! Core traits for the confsync system
//!
//! This module defines the abstract interfaces to the external collaborators.
//!
//! - [`RemoteStore`]: the versioned key-value store mirroring each tracked file
//! - [`FileWatcher`]: filesystem change notification for a tracked file
//! - [`ServiceReloader`]: reload signal for the network service owning the files

pub mod file_watcher;
pub mod reloader;
pub mod remote_store;

pub use file_watcher::{FileEvent, FileEventStream, FileOp, FileWatcher};
pub use reloader::ServiceReloader;
pub use remote_store::{
    FieldMap, RemoteEvent, RemoteEventKind, RemoteEventStream, RemoteRecord, RemoteStore,
};
