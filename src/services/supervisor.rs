use std::{sync::Arc, time::Duration};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    room::RoomInstance,
    services::lobby::{DeleteOptions, Lobby, LobbyError, RoomObserver},
    state::action::RoomAction,
};

/// Removes rooms nobody is connected to once a grace period has passed.
///
/// The persisted snapshot is kept, so the room resumes if someone comes back later.
pub struct Supervisor {
    delay: Duration,
}

impl Supervisor {
    /// Supervisor deleting empty rooms after `delay`.
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl RoomObserver for Supervisor {
    fn attach(&self, lobby: &Arc<Lobby>, room: &Arc<RoomInstance>) {
        let mut events = room.follow();
        let scope = room.scope().clone();
        let lobby = Arc::downgrade(lobby);
        let room_id = room.id().to_string();
        let delay = self.delay;

        tokio::spawn(async move {
            let mut pending: Option<CancellationToken> = None;
            loop {
                let event = tokio::select! {
                    biased;
                    _ = scope.cancelled() => break,
                    received = events.recv() => match received {
                        Some(event) => event,
                        None => break,
                    },
                };
                if !event.accepted {
                    continue;
                }

                match &event.action {
                    RoomAction::UserDisconnected { .. } if event.state.online.is_empty() => {
                        if let Some(previous) = pending.take() {
                            previous.cancel();
                        }
                        let timer = scope.child_token();
                        pending = Some(timer.clone());
                        debug!(room_id = %room_id, ?delay, "room is empty; scheduling deletion");

                        let lobby = lobby.clone();
                        let room_id = room_id.clone();
                        tokio::spawn(async move {
                            tokio::select! {
                                _ = timer.cancelled() => return,
                                _ = tokio::time::sleep(delay) => {}
                            }
                            let Some(lobby) = lobby.upgrade() else {
                                return;
                            };
                            match lobby
                                .delete_room(&room_id, DeleteOptions::keep_persisted())
                                .await
                            {
                                Ok(()) => info!(room_id = %room_id, "deleted idle room"),
                                Err(LobbyError::NotResident(_)) => {
                                    debug!(room_id = %room_id, "idle room already gone")
                                }
                                Err(err) => {
                                    warn!(room_id = %room_id, error = %err, "failed to delete idle room")
                                }
                            }
                        });
                    }
                    RoomAction::UserConnected { .. } => {
                        if let Some(timer) = pending.take() {
                            debug!(room_id = %room_id, "room is busy again; deletion cancelled");
                            timer.cancel();
                        }
                    }
                    _ => {}
                }
            }
        });
    }
}
