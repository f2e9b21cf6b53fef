// # In-Memory Remote Store
//
// A `RemoteStore` backed by a process-local map, with the same versioning and
// watch semantics a real deployment store provides. Used by tests and by
// embedded setups that have no external store to mirror into.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tracing::debug;

use crate::error::{Error, Result};
use crate::traits::{FieldMap, RemoteEvent, RemoteEventKind, RemoteEventStream, RemoteRecord, RemoteStore};

/// Capacity of the watch fan-out channel; slow watchers drop events
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// In-memory implementation of [`RemoteStore`]
///
/// Version tokens are per-record write counters rendered as strings; they are
/// opaque to callers, as the trait requires. Watchers subscribed via
/// [`RemoteStore::watch`] see every create and update as an `Added` or
/// `Modified` event.
pub struct MemoryRemoteStore {
    records: RwLock<HashMap<String, (FieldMap, u64)>>,
    events: broadcast::Sender<RemoteEvent>,
}

impl MemoryRemoteStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            records: RwLock::new(HashMap::new()),
            events,
        }
    }

    /// Remove a record, notifying watchers with a `Deleted` event
    ///
    /// Not part of the [`RemoteStore`] trait; the sync paths never delete, but
    /// tests and embedded callers need a way to drop records.
    pub fn remove(&self, key: &str) -> Result<()> {
        let mut records = self.records.write().expect("store lock poisoned");
        if records.remove(key).is_none() {
            return Err(Error::not_found(key));
        }
        drop(records);
        self.emit(RemoteEventKind::Deleted, key, FieldMap::new());
        Ok(())
    }

    fn emit(&self, kind: RemoteEventKind, key: &str, fields: FieldMap) {
        // Send fails only when no watcher is subscribed, which is fine.
        let _ = self.events.send(RemoteEvent {
            kind,
            key: key.to_string(),
            fields,
        });
    }
}

impl Default for MemoryRemoteStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    async fn get(&self, key: &str) -> Result<RemoteRecord> {
        let records = self.records.read().expect("store lock poisoned");
        let (fields, version) = records.get(key).ok_or_else(|| Error::not_found(key))?;
        Ok(RemoteRecord {
            key: key.to_string(),
            fields: fields.clone(),
            version: version.to_string(),
        })
    }

    async fn create(&self, key: &str, fields: FieldMap) -> Result<()> {
        {
            let mut records = self.records.write().expect("store lock poisoned");
            if records.contains_key(key) {
                return Err(Error::already_exists(key));
            }
            records.insert(key.to_string(), (fields.clone(), 1));
        }
        debug!(key, "record created");
        self.emit(RemoteEventKind::Added, key, fields);
        Ok(())
    }

    async fn update(&self, key: &str, fields: FieldMap, version: &str) -> Result<String> {
        let new_version = {
            let mut records = self.records.write().expect("store lock poisoned");
            let (stored, current) = records
                .get_mut(key)
                .ok_or_else(|| Error::not_found(key))?;
            if current.to_string() != version {
                return Err(Error::conflict(format!(
                    "{key}: presented version {version}, current {current}"
                )));
            }
            *stored = fields.clone();
            *current += 1;
            current.to_string()
        };
        debug!(key, version = %new_version, "record updated");
        self.emit(RemoteEventKind::Modified, key, fields);
        Ok(new_version)
    }

    async fn watch(&self) -> Result<RemoteEventStream> {
        let rx = self.events.subscribe();
        // Lagged watchers lose events rather than erroring out; the sync
        // engine tolerates missed events because it re-compares content.
        let stream = BroadcastStream::new(rx).filter_map(|event| event.ok());
        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(content: &str) -> FieldMap {
        let mut m = FieldMap::new();
        m.insert("data".to_string(), content.to_string());
        m
    }

    #[tokio::test]
    async fn get_of_missing_key_is_not_found() {
        let store = MemoryRemoteStore::new();
        assert!(matches!(store.get("absent").await, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let store = MemoryRemoteStore::new();
        store.create("k", fields("hello")).await.unwrap();

        let record = store.get("k").await.unwrap();
        assert_eq!(record.fields.get("data").map(String::as_str), Some("hello"));
        assert_eq!(record.version, "1");
    }

    #[tokio::test]
    async fn double_create_is_already_exists() {
        let store = MemoryRemoteStore::new();
        store.create("k", fields("a")).await.unwrap();
        assert!(matches!(
            store.create("k", fields("b")).await,
            Err(Error::AlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn update_with_current_version_bumps_the_token() {
        let store = MemoryRemoteStore::new();
        store.create("k", fields("a")).await.unwrap();

        let record = store.get("k").await.unwrap();
        let new_version = store.update("k", fields("b"), &record.version).await.unwrap();
        assert_ne!(new_version, record.version);

        let record = store.get("k").await.unwrap();
        assert_eq!(record.fields.get("data").map(String::as_str), Some("b"));
    }

    #[tokio::test]
    async fn update_with_stale_version_is_a_conflict() {
        let store = MemoryRemoteStore::new();
        store.create("k", fields("a")).await.unwrap();

        let stale = store.get("k").await.unwrap().version;
        store.update("k", fields("b"), &stale).await.unwrap();

        assert!(matches!(
            store.update("k", fields("c"), &stale).await,
            Err(Error::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn watch_reports_added_modified_deleted() {
        let store = MemoryRemoteStore::new();
        let mut stream = store.watch().await.unwrap();

        store.create("k", fields("a")).await.unwrap();
        let version = store.get("k").await.unwrap().version;
        store.update("k", fields("b"), &version).await.unwrap();
        store.remove("k").unwrap();

        let added = stream.next().await.unwrap();
        assert_eq!(added.kind, RemoteEventKind::Added);
        assert_eq!(added.key, "k");
        assert_eq!(added.fields.get("data").map(String::as_str), Some("a"));

        let modified = stream.next().await.unwrap();
        assert_eq!(modified.kind, RemoteEventKind::Modified);
        assert_eq!(modified.fields.get("data").map(String::as_str), Some("b"));

        let deleted = stream.next().await.unwrap();
        assert_eq!(deleted.kind, RemoteEventKind::Deleted);
        assert!(deleted.fields.is_empty());
    }

    #[tokio::test]
    async fn watchers_subscribed_late_miss_earlier_events() {
        let store = MemoryRemoteStore::new();
        store.create("k", fields("a")).await.unwrap();

        let mut stream = store.watch().await.unwrap();
        let version = store.get("k").await.unwrap().version;
        store.update("k", fields("b"), &version).await.unwrap();

        let event = stream.next().await.unwrap();
        assert_eq!(event.kind, RemoteEventKind::Modified);
    }
}
