//! Registry of the rooms resident on this node.

use std::sync::Arc;

use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::{OnceCell, broadcast};
use tracing::{debug, info, warn};

use crate::{
    dao::{room_store::RoomStore, storage::StorageError},
    ring::OwnershipOracle,
    room::{RoomDeps, RoomInstance, now_millis},
    state::{action::RoomAction, room::RoomSnapshot},
};

/// Failures of lobby operations.
#[derive(Debug, Error)]
pub enum LobbyError {
    /// The room is allocated to another node.
    #[error("room `{0}` is not allocated to this node")]
    NotOwner(String),
    /// The room is not running on this node.
    #[error("room `{0}` is not resident on this node")]
    NotResident(String),
    /// Purging the persisted room failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Room registry notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LobbyEvent {
    /// A room started on this node.
    Created {
        /// Room identifier.
        room_id: String,
    },
    /// A room stopped on this node.
    Deleted {
        /// Room identifier.
        room_id: String,
    },
}

/// How a room is deleted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteOptions {
    /// Also remove the persisted snapshot.
    pub delete_from_persistence: bool,
}

impl DeleteOptions {
    /// Stop the room and keep its snapshot so it can resume elsewhere.
    pub const fn keep_persisted() -> Self {
        Self {
            delete_from_persistence: false,
        }
    }

    /// Stop the room and purge its snapshot.
    pub const fn purge() -> Self {
        Self {
            delete_from_persistence: true,
        }
    }
}

/// Per-room companion attached when a room is created, before it processes any action.
///
/// Observers receive the lobby by reference and must not keep a strong handle
/// on it or on the room beyond the room's scope.
pub trait RoomObserver: Send + Sync {
    /// Start observing `room`.
    fn attach(&self, lobby: &Arc<Lobby>, room: &Arc<RoomInstance>);
}

type RoomSlot = Arc<OnceCell<Arc<RoomInstance>>>;

/// Rooms resident on this node, gated by ring ownership and backed by persistence.
pub struct Lobby {
    rooms: DashMap<String, RoomSlot>,
    oracle: Arc<dyn OwnershipOracle>,
    store: Arc<dyn RoomStore>,
    deps: RoomDeps,
    observers: Vec<Arc<dyn RoomObserver>>,
    events: broadcast::Sender<LobbyEvent>,
}

impl Lobby {
    /// Empty lobby.
    pub fn new(
        oracle: Arc<dyn OwnershipOracle>,
        store: Arc<dyn RoomStore>,
        deps: RoomDeps,
        observers: Vec<Arc<dyn RoomObserver>>,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(64);
        Arc::new(Self {
            rooms: DashMap::new(),
            oracle,
            store,
            deps,
            observers,
            events,
        })
    }

    /// Subscribe to room creation and deletion.
    pub fn subscribe(&self) -> broadcast::Receiver<LobbyEvent> {
        self.events.subscribe()
    }

    /// Ids of the rooms resident right now.
    pub fn active_room_ids(&self) -> Vec<String> {
        self.rooms
            .iter()
            .filter(|entry| entry.value().initialized())
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Resident room `room_id`, without creating it.
    pub fn get_room(&self, room_id: &str) -> Option<Arc<RoomInstance>> {
        self.rooms
            .get(room_id)
            .and_then(|slot| slot.get().cloned())
    }

    /// Resident room `room_id`, recovering or creating it when absent.
    ///
    /// Concurrent calls for the same id share one creation.
    pub async fn get_or_create_room(
        self: &Arc<Self>,
        room_id: &str,
    ) -> Result<Arc<RoomInstance>, LobbyError> {
        if !self.oracle.allocated_to_me(room_id) {
            return Err(LobbyError::NotOwner(room_id.to_string()));
        }

        loop {
            let slot = self.rooms.entry(room_id.to_string()).or_default().value().clone();
            let mut created = false;
            let room = slot
                .get_or_init(|| {
                    created = true;
                    self.create_room(room_id)
                })
                .await
                .clone();

            let still_indexed = self
                .rooms
                .get(room_id)
                .is_some_and(|current| Arc::ptr_eq(current.value(), &slot));
            if still_indexed && !room.is_closed() {
                if created {
                    let _ = self.events.send(LobbyEvent::Created {
                        room_id: room_id.to_string(),
                    });
                }
                return Ok(room);
            }
            // Deleted while being created: drop this instance and start over.
            room.close();
            self.rooms
                .remove_if(room_id, |_, current| Arc::ptr_eq(current, &slot));
        }
    }

    async fn create_room(self: &Arc<Self>, room_id: &str) -> Arc<RoomInstance> {
        let recovered = match self.store.get_room(room_id).await {
            Ok(found) => found,
            Err(err) => {
                warn!(room_id, error = %err, "failed to read persisted room; starting fresh");
                None
            }
        };

        let (initial, boot) = match recovered {
            Some(snapshot) => {
                info!(room_id, round = snapshot.round, "resuming persisted room");
                (snapshot.sanitized(), RoomAction::RoomResume)
            }
            None => (
                RoomSnapshot::default(),
                RoomAction::RoomInit {
                    id: room_id.to_string(),
                    created_at: now_millis(),
                },
            ),
        };

        let room = RoomInstance::spawn(room_id, initial, self.deps.clone());
        for observer in &self.observers {
            observer.attach(self, &room);
        }
        if let Err(err) = room.dispatch(boot) {
            warn!(room_id, error = %err, "failed to boot room");
        }
        room
    }

    /// Stop room `room_id` and remove it from the registry.
    pub async fn delete_room(&self, room_id: &str, options: DeleteOptions) -> Result<(), LobbyError> {
        let Some((_, slot)) = self.rooms.remove(room_id) else {
            return Err(LobbyError::NotResident(room_id.to_string()));
        };
        // An instance still being created was never announced; its creator discards it.
        let room = slot.get().cloned();
        if let Some(room) = &room {
            room.close();
            info!(room_id, purge = options.delete_from_persistence, "room deleted");
            let _ = self.events.send(LobbyEvent::Deleted {
                room_id: room_id.to_string(),
            });
        }

        if options.delete_from_persistence {
            // A save still in flight would bring the snapshot back.
            if let Some(room) = room {
                room.settled().await;
            }
            self.store.del_room(room_id).await?;
        }
        Ok(())
    }

    /// Stop every resident room, keeping their snapshots.
    pub async fn shutdown(&self) {
        for room_id in self.active_room_ids() {
            match self
                .delete_room(&room_id, DeleteOptions::keep_persisted())
                .await
            {
                Ok(()) | Err(LobbyError::NotResident(_)) => {}
                Err(err) => debug!(room_id, error = %err, "failed to stop room"),
            }
        }
    }
}
