use std::sync::Arc;

use dashmap::DashMap;
use futures::future::BoxFuture;

use super::{DEFAULT_ROOM_PREFIX, RoomStore, room_key};
use crate::{
    dao::storage::{StorageError, StorageResult},
    state::room::RoomSnapshot,
};

/// Process-local store keeping the JSON documents in memory.
///
/// Used for single-node deployments and as a test double; documents are kept
/// serialized so decoding follows the same path as a remote backend.
#[derive(Clone, Default)]
pub struct MemoryRoomStore {
    prefix: Arc<str>,
    documents: Arc<DashMap<String, String>>,
}

impl MemoryRoomStore {
    /// Create an empty store using `prefix` for its keys.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Arc::from(prefix.into()),
            documents: Arc::new(DashMap::new()),
        }
    }

    /// Raw JSON stored under `key`, for inspection.
    pub fn raw(&self, key: &str) -> Option<String> {
        self.documents.get(key).map(|entry| entry.value().clone())
    }

    /// Store a raw document under `key`.
    pub fn insert_raw(&self, key: impl Into<String>, document: impl Into<String>) {
        self.documents.insert(key.into(), document.into());
    }

    fn key(&self, room_id: &str) -> String {
        let prefix = if self.prefix.is_empty() {
            DEFAULT_ROOM_PREFIX
        } else {
            &*self.prefix
        };
        room_key(prefix, room_id)
    }
}

impl RoomStore for MemoryRoomStore {
    fn get_room(&self, room_id: &str) -> BoxFuture<'static, StorageResult<Option<RoomSnapshot>>> {
        let key = self.key(room_id);
        let document = self.raw(&key);
        Box::pin(async move {
            document
                .map(|json| serde_json::from_str(&json))
                .transpose()
                .map_err(|source| StorageError::Corrupt { key, source })
        })
    }

    fn set_room(
        &self,
        room_id: &str,
        snapshot: RoomSnapshot,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let key = self.key(room_id);
        let documents = self.documents.clone();
        Box::pin(async move {
            let json = serde_json::to_string(&snapshot)
                .map_err(|source| StorageError::Corrupt {
                    key: key.clone(),
                    source,
                })?;
            documents.insert(key, json);
            Ok(())
        })
    }

    fn del_room(&self, room_id: &str) -> BoxFuture<'static, StorageResult<()>> {
        self.documents.remove(&self.key(room_id));
        Box::pin(async { Ok(()) })
    }

    fn ping(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::room::RoomPhase;

    #[tokio::test]
    async fn stores_snapshots_under_prefixed_keys() {
        let store = MemoryRoomStore::new("quiz");
        let snapshot = RoomSnapshot {
            id: Some("r1".into()),
            round: 3,
            state: RoomPhase::RoundFinished,
            ..RoomSnapshot::default()
        };

        store.set_room("r1", snapshot.clone()).await.unwrap();
        assert!(store.raw("quiz#r1").is_some());
        assert_eq!(store.get_room("r1").await.unwrap(), Some(snapshot));

        store.del_room("r1").await.unwrap();
        assert_eq!(store.get_room("r1").await.unwrap(), None);
        store.del_room("r1").await.unwrap();
    }

    #[tokio::test]
    async fn corrupt_documents_surface_as_errors() {
        let store = MemoryRoomStore::new("room");
        store.insert_raw("room#bad", "{not json");
        assert!(matches!(
            store.get_room("bad").await,
            Err(StorageError::Corrupt { .. })
        ));
    }
}
