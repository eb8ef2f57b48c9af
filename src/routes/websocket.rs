use axum::{
    Router,
    extract::{Query, State, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
};
use validator::Validate;

use crate::{
    dto::ws::ConnectQuery, error::AppError, services::websocket_service, state::SharedState,
};

/// Upgrade the HTTP connection into a player WebSocket session.
///
/// The handshake query is validated before upgrading so bad room ids are refused with a 400.
pub async fn ws_handler(
    State(state): State<SharedState>,
    Query(query): Query<ConnectQuery>,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, AppError> {
    query.validate()?;
    let shared_state = state.clone();
    Ok(ws.on_upgrade(move |socket| websocket_service::handle_socket(shared_state, socket, query)))
}

/// Configure the WebSocket endpoint.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/ws", get(ws_handler))
}
