use std::sync::Arc;

use tracing::{debug, warn};

use crate::{
    dao::room_store::RoomStore,
    room::RoomInstance,
    services::lobby::{Lobby, RoomObserver},
    state::action::RoomAction,
};

/// Whether `action` changes state worth persisting.
fn should_save(action: &RoomAction) -> bool {
    matches!(
        action,
        RoomAction::RoundStartSuccess { .. }
            | RoomAction::RoundEndSuccess { .. }
            | RoomAction::LeaderboardUpdate
            | RoomAction::UserConnected { .. }
            | RoomAction::UserDisconnected { .. }
    )
}

/// Persists room snapshots after state-relevant actions, one write at a time per room.
pub struct Saver {
    store: Arc<dyn RoomStore>,
}

impl Saver {
    /// Saver writing to `store`.
    pub fn new(store: Arc<dyn RoomStore>) -> Self {
        Self { store }
    }
}

impl RoomObserver for Saver {
    fn attach(&self, _lobby: &Arc<Lobby>, room: &Arc<RoomInstance>) {
        let mut events = room.follow();
        let scope = room.scope().clone();
        let room_id = room.id().to_string();
        let store = self.store.clone();

        room.spawn_tracked(async move {
            loop {
                let event = tokio::select! {
                    biased;
                    _ = scope.cancelled() => break,
                    received = events.recv() => match received {
                        Some(event) => event,
                        None => break,
                    },
                };
                if !should_save(&event.action) {
                    continue;
                }

                // An in-flight write is not interrupted by the room closing.
                let snapshot = event.state.as_ref().clone();
                match store.set_room(&room_id, snapshot).await {
                    Ok(()) => debug!(room_id = %room_id, action = event.action.name(), "room saved"),
                    Err(err) => warn!(room_id = %room_id, error = %err, "failed to save room"),
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_state_relevant_actions_are_saved() {
        assert!(should_save(&RoomAction::LeaderboardUpdate));
        assert!(should_save(&RoomAction::UserDisconnected {
            user_id: "u".into()
        }));
        assert!(!should_save(&RoomAction::RoundStartRequest));
        assert!(!should_save(&RoomAction::SocketUserSay {
            user_id: "u".into(),
            message: "hi".into(),
            time: 0,
        }));
    }
}
