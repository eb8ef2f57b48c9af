//! Translation between room actions and client frames.

use crate::{
    dto::{
        room::RoomView,
        ws::{ClientEvent, ServerEvent},
    },
    room::RoomEvent,
    state::{
        action::RoomAction,
        room::{RoomPhase, RoomSnapshot},
    },
};

/// Room action for a frame sent by `user_id`; `None` for frames handled by the gateway.
pub fn inbound_action(user_id: &str, event: ClientEvent) -> Option<RoomAction> {
    match event {
        ClientEvent::Say(payload) => Some(RoomAction::SocketUserSay {
            user_id: user_id.to_string(),
            message: payload.message,
            time: payload.time,
        }),
        ClientEvent::PickAnswer(payload) => Some(RoomAction::SocketUserPickAnswer {
            user_id: user_id.to_string(),
            category: payload.category,
            time: payload.time,
        }),
        ClientEvent::RoomChange(_) => None,
    }
}

fn choose_category(state: &RoomSnapshot) -> Option<ServerEvent> {
    let categories = state.pick_state.categories.as_ref()?;
    Some(ServerEvent::ChooseCategory {
        categories: categories.values().cloned().collect(),
    })
}

fn tell_answer(state: &RoomSnapshot) -> Option<ServerEvent> {
    state
        .round_state
        .answer
        .clone()
        .map(ServerEvent::TellAnswer)
}

/// Frames the client of `me` receives for one room event, in send order.
pub fn outbound_events(me: &str, event: &RoomEvent) -> Vec<ServerEvent> {
    if !event.accepted {
        return Vec::new();
    }
    let state = event.state.as_ref();
    let is_teller = state.is_teller(me);

    match &event.action {
        RoomAction::UserConnected { user, .. } if user.id != me => {
            let user = state.users.get(&user.id).unwrap_or(user).clone();
            vec![ServerEvent::AnotherUserConnected { user }]
        }
        RoomAction::UserConnected { .. } => {
            let mut frames = vec![ServerEvent::RoomConnected {
                room: RoomView::from(state),
            }];
            if is_teller {
                let extra = match state.state {
                    RoomPhase::RoundPickAnswer if state.pick_state.picked.is_none() => {
                        choose_category(state)
                    }
                    RoomPhase::RoundInProgress => tell_answer(state),
                    _ => None,
                };
                frames.extend(extra);
            }
            frames
        }
        RoomAction::SocketUserSay {
            user_id,
            message,
            time,
        } if state.is_teller(user_id) => vec![ServerEvent::Tell {
            user_id: user_id.clone(),
            time: *time,
            tell: message.clone(),
        }],
        RoomAction::WrongAnswerFound {
            user_id,
            message,
            time,
        } => vec![ServerEvent::Answer {
            user_id: user_id.clone(),
            time: *time,
            answer: message.clone(),
        }],
        RoomAction::UserHatchPercentage {
            user_id,
            hatch_percentage,
        } => vec![ServerEvent::Hatch {
            user_id: user_id.clone(),
            hatch_percentage: *hatch_percentage,
        }],
        RoomAction::UserDisconnected { user_id } => vec![ServerEvent::UserDisconnect {
            user_id: user_id.clone(),
        }],
        RoomAction::RoundStartSuccess { .. } => {
            let mut frames = vec![ServerEvent::RoundStart {
                round: state.round,
                teller: state.round_state.teller.clone(),
            }];
            if is_teller {
                frames.extend(choose_category(state));
            }
            frames
        }
        RoomAction::RoundInProgressSuccess { .. } if is_teller => {
            tell_answer(state).into_iter().collect()
        }
        // The answer is cleared by the round end; announce the one that was being played.
        RoomAction::RoundEndSuccess { .. } => vec![ServerEvent::RoundEnd {
            answer: event.previous.round_state.answer.clone(),
        }],
        RoomAction::LeaderboardUpdate => vec![ServerEvent::LeaderboardUpdate {
            leaderboard: state.leaderboard.clone(),
        }],
        RoomAction::RightAnswerFound { user_id, .. } => vec![ServerEvent::RightAnswer {
            user_id: user_id.clone(),
        }],
        _ => Vec::new(),
    }
}
