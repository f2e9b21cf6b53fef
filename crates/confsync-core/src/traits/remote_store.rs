// # Remote Store Trait
//
// Defines the interface to the versioned key-value store that serves as durable
// backing storage for the tracked configuration files.
//
// ## Implementations
//
// - In-memory: `crate::store::MemoryRemoteStore` (tests, embedded use)
// - Deployments provide their own (e.g. a cluster config store client)
//
// ## Versioning
//
// Every record carries an opaque version token refreshed by the store on each
// successful write. Updates must present the token read in the same attempt;
// a stale token yields `Error::Conflict` (optimistic concurrency).

use async_trait::async_trait;
use std::collections::HashMap;
use std::pin::Pin;
use tokio_stream::Stream;

use crate::error::Result;

/// Field name → content map stored under one collection key
pub type FieldMap = HashMap<String, String>;

/// One versioned record in the remote store
#[derive(Debug, Clone)]
pub struct RemoteRecord {
    /// Collection key the record is stored under
    pub key: String,
    /// All fields of the record
    pub fields: FieldMap,
    /// Opaque version token; refreshed by the store on every successful write
    pub version: String,
}

/// Kind of change reported by the remote watch stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteEventKind {
    Added,
    Modified,
    Deleted,
}

/// One change event from the remote collection watch
#[derive(Debug, Clone)]
pub struct RemoteEvent {
    /// What happened to the record
    pub kind: RemoteEventKind,
    /// Collection key of the affected record
    pub key: String,
    /// Field map as of the event (empty for deletions)
    pub fields: FieldMap,
}

/// A pinned boxed stream of remote change events
pub type RemoteEventStream = Pin<Box<dyn Stream<Item = RemoteEvent> + Send + 'static>>;

/// Trait for remote store implementations
///
/// Implementations must be thread-safe: one client handle is shared by every
/// sync loop plus the synchronous request-handling path.
///
/// The watch stream may end when the underlying channel closes; callers are
/// expected to re-call [`RemoteStore::watch`] to reconnect. Implementations
/// must not retry or reconnect internally — reconnect policy (bounded backoff)
/// is owned by the sync engine.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Fetch a record by collection key
    ///
    /// # Returns
    ///
    /// - `Ok(RemoteRecord)`: the record with its current version token
    /// - `Err(Error::NotFound)`: no record under this key
    /// - `Err(Error)`: any other store failure
    async fn get(&self, key: &str) -> Result<RemoteRecord>;

    /// Create a record that does not exist yet
    ///
    /// # Returns
    ///
    /// - `Ok(())`: created
    /// - `Err(Error::AlreadyExists)`: a concurrent creator won the race
    /// - `Err(Error)`: any other store failure
    async fn create(&self, key: &str, fields: FieldMap) -> Result<()>;

    /// Update an existing record using optimistic concurrency
    ///
    /// The full field map replaces the stored one. `version` must be the token
    /// read in the same attempt.
    ///
    /// # Returns
    ///
    /// - `Ok(String)`: the new version token
    /// - `Err(Error::Conflict)`: the presented version token is stale
    /// - `Err(Error::NotFound)`: the record vanished between get and update
    /// - `Err(Error)`: any other store failure
    async fn update(&self, key: &str, fields: FieldMap, version: &str) -> Result<String>;

    /// Watch the whole collection for changes
    ///
    /// Yields an event for every record added, modified, or deleted. The stream
    /// ends if the underlying channel closes; the caller reconnects.
    async fn watch(&self) -> Result<RemoteEventStream>;
}
