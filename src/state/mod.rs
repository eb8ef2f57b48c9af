/// Actions processed by a room.
pub mod action;
/// Room state transitions.
pub mod reducer;
/// Room snapshot.
pub mod room;

use std::sync::Arc;

use tokio::sync::watch;

use crate::{config::AppConfig, ring::Ring, services::lobby::Lobby};

/// Handle to [`AppState`] shared with every handler.
pub type SharedState = Arc<AppState>;

/// Central application state shared by every route and socket.
pub struct AppState {
    config: Arc<AppConfig>,
    lobby: Arc<Lobby>,
    ring: Arc<Ring>,
    degraded: watch::Receiver<bool>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    pub fn new(
        config: Arc<AppConfig>,
        lobby: Arc<Lobby>,
        ring: Arc<Ring>,
        degraded: watch::Receiver<bool>,
    ) -> SharedState {
        Arc::new(Self {
            config,
            lobby,
            ring,
            degraded,
        })
    }

    /// Loaded application configuration.
    pub fn config(&self) -> Arc<AppConfig> {
        self.config.clone()
    }

    /// Rooms resident on this node.
    pub fn lobby(&self) -> &Arc<Lobby> {
        &self.lobby
    }

    /// Ownership ring.
    pub fn ring(&self) -> &Arc<Ring> {
        &self.ring
    }

    /// Whether the room store is currently unreachable.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.clone()
    }
}
