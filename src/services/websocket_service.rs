use axum::extract::ws::{CloseFrame, Message, WebSocket, close_code};
use futures::{SinkExt, StreamExt, stream::SplitStream};
use thiserror::Error;
use tokio::{
    sync::{broadcast::error::RecvError, mpsc},
    task::JoinHandle,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dto::ws::{ClientEvent, ConnectQuery},
    room::{RoomInstance, now_millis},
    services::{
        lobby::LobbyError,
        protocol::{inbound_action, outbound_events},
    },
    state::{SharedState, action::RoomAction},
};

/// Room joined when the handshake names none.
pub const DEFAULT_ROOM: &str = "default";

/// Writer channel closed, the client is gone.
#[derive(Debug, Error)]
#[error("connection closed")]
struct ConnectionClosed;

/// Why a player left a room.
#[derive(Debug)]
enum SessionEnd {
    /// The client asked to play in another room.
    RoomChange(String),
    /// The client went away.
    ClientGone,
    /// The server ends the connection with a reason.
    Refused { code: u16, reason: String },
}

impl SessionEnd {
    fn refused(code: u16, reason: impl Into<String>) -> Self {
        SessionEnd::Refused {
            code,
            reason: reason.into(),
        }
    }
}

/// Identity of one client connection, kept across room changes.
struct Player {
    user_id: String,
    name: Option<String>,
    session: Uuid,
}

/// Handle the full lifecycle of a player WebSocket connection.
pub async fn handle_socket(state: SharedState, socket: WebSocket, query: ConnectQuery) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps outbound messages flowing even while we await inbound frames.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let player = Player {
        user_id: query
            .user_id
            .unwrap_or_else(|| format!("guest-{}", Uuid::new_v4())),
        name: query.name,
        session: Uuid::new_v4(),
    };
    let mut room_id = query.room_id.unwrap_or_else(|| DEFAULT_ROOM.to_string());

    loop {
        match play_in_room(&state, &room_id, &player, &mut receiver, &outbound_tx).await {
            SessionEnd::RoomChange(next) => {
                info!(user_id = %player.user_id, from = %room_id, to = %next, "player changing room");
                room_id = next;
            }
            SessionEnd::ClientGone => break,
            SessionEnd::Refused { code, reason } => {
                info!(user_id = %player.user_id, room_id = %room_id, reason = %reason, "closing player connection");
                let _ = outbound_tx.send(Message::Close(Some(CloseFrame {
                    code,
                    reason: reason.into(),
                })));
                break;
            }
        }
    }

    finalize(writer_task, outbound_tx).await;
}

/// Join `room_id`, relay its events and the client's frames until the player leaves it.
async fn play_in_room(
    state: &SharedState,
    room_id: &str,
    player: &Player,
    receiver: &mut SplitStream<WebSocket>,
    outbound_tx: &mpsc::UnboundedSender<Message>,
) -> SessionEnd {
    let room = match state.lobby().get_or_create_room(room_id).await {
        Ok(room) => room,
        Err(LobbyError::NotOwner(_)) => {
            let owner = state
                .ring()
                .owner_of(room_id)
                .unwrap_or_else(|| "unknown".into());
            return SessionEnd::refused(
                close_code::POLICY,
                format!("room {room_id} is owned by {owner}"),
            );
        }
        Err(err) => {
            warn!(room_id, error = %err, "failed to open room");
            return SessionEnd::refused(close_code::ERROR, "room unavailable");
        }
    };

    if !room.register_session(&player.user_id, player.session) {
        warn!(room_id, user_id = %player.user_id, "rejecting duplicate session");
        return SessionEnd::refused(close_code::POLICY, "duplicate session");
    }

    let end = relay(&room, player, receiver, outbound_tx).await;

    let _ = room.dispatch(RoomAction::SocketUserDisconnected {
        user_id: player.user_id.clone(),
    });
    room.unregister_session(&player.user_id, player.session);
    end
}

async fn relay(
    room: &RoomInstance,
    player: &Player,
    receiver: &mut SplitStream<WebSocket>,
    outbound_tx: &mpsc::UnboundedSender<Message>,
) -> SessionEnd {
    let user_id = player.user_id.as_str();
    // Subscribe before announcing the player so its own connection event is relayed.
    let mut events = room.subscribe();
    let joined = room.dispatch(RoomAction::SocketUserConnected {
        user_id: user_id.to_string(),
        name: player.name.clone(),
        time: now_millis(),
    });
    if joined.is_err() {
        return SessionEnd::refused(close_code::AGAIN, "room closed");
    }
    info!(room_id = room.id(), user_id, "player joined room");

    'session: loop {
        tokio::select! {
            _ = room.closed() => {
                break SessionEnd::refused(close_code::AGAIN, "room closed");
            }
            event = events.recv() => match event {
                Ok(event) => {
                    for frame in outbound_events(user_id, &event) {
                        if send_message_to_websocket(outbound_tx, &frame).is_err() {
                            break 'session SessionEnd::ClientGone;
                        }
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(room_id = room.id(), user_id, skipped, "player fell behind the room feed");
                    break SessionEnd::refused(close_code::AGAIN, "lagged behind");
                }
                Err(RecvError::Closed) => {
                    break SessionEnd::refused(close_code::AGAIN, "room closed");
                }
            },
            message = receiver.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    debug!(room_id = room.id(), user_id, payload = %text, "received player message");
                    match ClientEvent::from_json_str(&text) {
                        Ok(ClientEvent::RoomChange(payload)) if payload.room_id != room.id() => {
                            break SessionEnd::RoomChange(payload.room_id);
                        }
                        Ok(event) => {
                            let Some(action) = inbound_action(user_id, event) else {
                                continue;
                            };
                            if room.dispatch(action).is_err() {
                                break SessionEnd::refused(close_code::AGAIN, "room closed");
                            }
                        }
                        Err(err) => {
                            warn!(user_id, error = %err, "failed to parse or validate player message");
                        }
                    }
                }
                Some(Ok(Message::Ping(payload))) => {
                    let _ = outbound_tx.send(Message::Pong(payload));
                }
                Some(Ok(Message::Close(frame))) => {
                    info!(room_id = room.id(), user_id, "player closed");
                    let _ = outbound_tx.send(Message::Close(frame));
                    break SessionEnd::ClientGone;
                }
                Some(Ok(Message::Binary(_) | Message::Pong(_))) => {}
                Some(Err(err)) => {
                    warn!(user_id, error = %err, "websocket error");
                    break SessionEnd::ClientGone;
                }
                None => break SessionEnd::ClientGone,
            },
        }
    }
}

/// Serialize a payload and push it onto the provided WebSocket sender.
///
/// Serialization failures are logged and swallowed; only a closed writer is an error.
fn send_message_to_websocket<T>(
    tx: &mpsc::UnboundedSender<Message>,
    value: &T,
) -> Result<(), ConnectionClosed>
where
    T: ?Sized + serde::Serialize + std::fmt::Debug,
{
    let payload = match serde_json::to_string(value) {
        Ok(p) => p,
        Err(err) => {
            warn!(error = %err, "failed to serialize message `{value:?}`");
            return Ok(());
        }
    };

    tx.send(Message::Text(payload.into()))
        .map_err(|_| ConnectionClosed)
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}
