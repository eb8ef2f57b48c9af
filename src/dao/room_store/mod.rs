#[cfg(feature = "couch-store")]
/// CouchDB backend.
pub mod couchdb;
/// In-memory backend.
pub mod memory;

use futures::future::BoxFuture;

use crate::{dao::storage::StorageResult, state::room::RoomSnapshot};

/// Default key prefix of persisted rooms.
pub const DEFAULT_ROOM_PREFIX: &str = "room";

/// Storage key of a room: `<prefix>#<roomId>`.
pub fn room_key(prefix: &str, room_id: &str) -> String {
    format!("{prefix}#{room_id}")
}

/// Abstraction over the key-value store holding room snapshots.
pub trait RoomStore: Send + Sync {
    /// Load the snapshot of `room_id`, `None` when nothing is stored.
    fn get_room(&self, room_id: &str) -> BoxFuture<'static, StorageResult<Option<RoomSnapshot>>>;
    /// Store `snapshot` as the latest state of `room_id`.
    fn set_room(&self, room_id: &str, snapshot: RoomSnapshot)
    -> BoxFuture<'static, StorageResult<()>>;
    /// Remove the stored snapshot of `room_id`, succeeding when nothing is stored.
    fn del_room(&self, room_id: &str) -> BoxFuture<'static, StorageResult<()>>;
    /// Check that the backend is reachable.
    fn ping(&self) -> BoxFuture<'static, StorageResult<()>>;
}
