use std::{sync::Arc, time::Duration};

use tokio::{
    sync::broadcast::{self, error::RecvError},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    ring::{OwnershipOracle, RingEvent},
    services::lobby::{DeleteOptions, Lobby, LobbyError},
};

/// Stop every resident room this node no longer owns, keeping its snapshot.
///
/// Returns how many rooms were evicted.
pub async fn evict_unowned(lobby: &Lobby, oracle: &dyn OwnershipOracle) -> usize {
    let mut evicted = 0;
    for room_id in lobby.active_room_ids() {
        if oracle.allocated_to_me(&room_id) {
            continue;
        }
        match lobby
            .delete_room(&room_id, DeleteOptions::keep_persisted())
            .await
        {
            Ok(()) => {
                info!(room_id = %room_id, "evicted room owned by another node");
                evicted += 1;
            }
            Err(LobbyError::NotResident(_)) => {}
            Err(err) => warn!(room_id = %room_id, error = %err, "failed to evict room"),
        }
    }
    evicted
}

/// Evict unowned rooms once membership changes have been quiet for `debounce`.
pub fn spawn_rebalancer(
    lobby: Arc<Lobby>,
    oracle: Arc<dyn OwnershipOracle>,
    mut events: broadcast::Receiver<RingEvent>,
    debounce: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        'outer: loop {
            let received = tokio::select! {
                _ = shutdown.cancelled() => break,
                received = events.recv() => received,
            };
            match received {
                Ok(RingEvent::Changed { .. }) | Err(RecvError::Lagged(_)) => {}
                Ok(RingEvent::Up { .. }) => continue,
                Ok(RingEvent::Error(_)) | Err(RecvError::Closed) => break,
            }

            // Quiet window: every further change restarts it.
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break 'outer,
                    _ = tokio::time::sleep(debounce) => break,
                    received = events.recv() => match received {
                        Ok(RingEvent::Changed { .. }) | Ok(RingEvent::Up { .. }) | Err(RecvError::Lagged(_)) => {
                            debug!("membership still changing; postponing rebalance");
                        }
                        Ok(RingEvent::Error(_)) | Err(RecvError::Closed) => break 'outer,
                    },
                }
            }

            let evicted = evict_unowned(&lobby, oracle.as_ref()).await;
            info!(evicted, "rebalance complete");
        }
        debug!("rebalancer stopped");
    })
}
