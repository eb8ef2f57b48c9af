use tracing::warn;

use crate::{
    dto::health::{HealthResponse, RingStatus},
    state::SharedState,
};

/// Report storage availability and the ring as seen by this node.
pub fn health_status(state: &SharedState) -> HealthResponse {
    let ring = RingStatus {
        me: state.ring().me().to_string(),
        members: state.ring().members(),
        rooms: state.lobby().active_room_ids().len(),
    };

    if state.is_degraded() {
        warn!("storage unavailable (degraded mode)");
        HealthResponse::degraded(ring)
    } else {
        HealthResponse::ok(ring)
    }
}
