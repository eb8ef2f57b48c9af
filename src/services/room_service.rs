use crate::{
    dto::room::{OwnerResponse, RoomListResponse, RoomView},
    error::ServiceError,
    state::SharedState,
};

/// Rooms running on this node.
pub fn list_rooms(state: &SharedState) -> RoomListResponse {
    let mut rooms = state.lobby().active_room_ids();
    rooms.sort();
    RoomListResponse {
        node: state.ring().me().to_string(),
        rooms,
    }
}

/// Current view of a room running on this node.
///
/// Rooms are never created by this lookup; a room owned elsewhere reports its owner.
pub fn get_room(state: &SharedState, room_id: &str) -> Result<RoomView, ServiceError> {
    if let Some(room) = state.lobby().get_room(room_id) {
        return Ok(RoomView::from(room.snapshot().as_ref()));
    }
    match state.ring().owner_of(room_id) {
        Some(owner) if owner != state.ring().me() => Err(ServiceError::NotOwner {
            room_id: room_id.to_string(),
            owner,
        }),
        _ => Err(ServiceError::NotFound(format!("room `{room_id}` is not running"))),
    }
}

/// Node owning `room_id` according to the local ring.
pub fn room_owner(state: &SharedState, room_id: &str) -> OwnerResponse {
    let owner = state.ring().owner_of(room_id);
    OwnerResponse {
        room_id: room_id.to_string(),
        local: owner.as_deref() == Some(state.ring().me()),
        owner,
    }
}
