use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};

use crate::{
    dto::{
        room::{OwnerResponse, RoomListResponse, RoomView},
        validation::validate_room_id,
    },
    error::AppError,
    services::room_service,
    state::SharedState,
};

/// Read-only room routes.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/rooms", get(list_rooms))
        .route("/rooms/{id}", get(get_room))
        .route("/rooms/{id}/owner", get(room_owner))
}

fn checked_room_id(id: &str) -> Result<(), AppError> {
    validate_room_id(id).map_err(|err| AppError::BadRequest(format!("invalid room id: {err}")))
}

/// List the rooms running on this node.
pub async fn list_rooms(State(state): State<SharedState>) -> Json<RoomListResponse> {
    Json(room_service::list_rooms(&state))
}

/// Current state of a room running on this node.
pub async fn get_room(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<RoomView>, AppError> {
    checked_room_id(&id)?;
    let view = room_service::get_room(&state, &id)?;
    Ok(Json(view))
}

/// Which node owns a room.
pub async fn room_owner(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<OwnerResponse>, AppError> {
    checked_room_id(&id)?;
    Ok(Json(room_service::room_owner(&state, &id)))
}
