use axum::Router;

use crate::state::SharedState;

/// `/healthcheck`.
pub mod health;
/// `/rooms` queries.
pub mod rooms;
/// `/ws` player connections.
pub mod websocket;

/// Compose all route trees and wire in the shared state.
pub fn router(state: SharedState) -> Router<()> {
    health::router()
        .merge(websocket::router())
        .merge(rooms::router())
        .with_state(state)
}
