//! WebSocket frames exchanged with quiz clients: `{"event": <name>, "data": {...}}`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::{
    dao::content::models::{Answer, Category},
    dto::{room::RoomView, validation::validate_room_id},
    state::room::{Timestamp, User, UserId},
};

/// Query string of the WebSocket handshake: `/ws?roomId=..&userId=..&name=..`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectQuery {
    /// Room to join, `default` when absent.
    pub room_id: Option<String>,
    /// Verified identity of the player; a guest id is generated when absent.
    pub user_id: Option<String>,
    /// Display name.
    pub name: Option<String>,
}

impl Validate for ConnectQuery {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if let Some(ref room_id) = self.room_id {
            if let Err(e) = validate_room_id(room_id) {
                errors.add("roomId", e);
            }
        }

        if let Some(ref user_id) = self.user_id {
            if user_id.is_empty() || user_id.len() > 128 {
                errors.add("userId", ValidationError::new("user_id_length"));
            }
        }

        if self.name.as_ref().is_some_and(|name| name.chars().count() > 64) {
            errors.add("name", ValidationError::new("name_length"));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// `say` payload: a chat line, which is a guess unless sent by the teller.
#[derive(Debug, Deserialize, Validate)]
pub struct SayPayload {
    /// Raw message.
    #[validate(length(min = 1, max = 280))]
    pub message: String,
    /// Client time of the message.
    #[serde(default)]
    pub time: Timestamp,
}

/// `pick_answer` payload: the teller's category choice.
#[derive(Debug, Deserialize, Validate)]
pub struct PickAnswerPayload {
    /// Picked category id.
    #[validate(length(min = 1, max = 128))]
    pub category: String,
    /// Client time of the pick.
    #[serde(default)]
    pub time: Timestamp,
}

/// `room_change` payload: leave the current room for another one.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomChangePayload {
    /// Room to join.
    pub room_id: String,
}

impl Validate for RoomChangePayload {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let Err(e) = validate_room_id(&self.room_id) {
            errors.add("roomId", e);
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Frames accepted from clients.
#[derive(Debug, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Chat line or guess.
    Say(SayPayload),
    /// Category pick.
    PickAnswer(PickAnswerPayload),
    /// Switch rooms.
    RoomChange(RoomChangePayload),
}

/// Why an inbound frame was refused.
#[derive(Debug, Error)]
pub enum InboundError {
    /// Not a known event.
    #[error("malformed client event: {0}")]
    Malformed(#[from] serde_json::Error),
    /// Known event with an invalid payload.
    #[error("invalid client event: {0}")]
    Invalid(#[from] ValidationErrors),
}

impl ClientEvent {
    /// Parse and validate a text frame.
    pub fn from_json_str(text: &str) -> Result<Self, InboundError> {
        let event: ClientEvent = serde_json::from_str(text)?;
        match &event {
            ClientEvent::Say(payload) => payload.validate()?,
            ClientEvent::PickAnswer(payload) => payload.validate()?,
            ClientEvent::RoomChange(payload) => payload.validate()?,
        }
        Ok(event)
    }
}

/// Frames pushed to clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum ServerEvent {
    /// Sent to a player once they joined, with the whole room.
    RoomConnected {
        /// Room view.
        room: RoomView,
    },
    /// Someone else joined.
    AnotherUserConnected {
        /// Player who joined.
        user: User,
    },
    /// Category offer, teller only.
    ChooseCategory {
        /// Offered categories, in offer order.
        categories: Vec<Category>,
    },
    /// Answer to make the others guess, teller only.
    TellAnswer(Answer),
    /// A round started.
    RoundStart {
        /// Round number.
        round: u64,
        /// Teller of the round.
        teller: Option<UserId>,
    },
    /// The round ended.
    RoundEnd {
        /// Answer of the round, if one was drawn.
        answer: Option<Answer>,
    },
    /// A wrong guess.
    Answer {
        /// Author.
        user_id: UserId,
        /// Client time of the guess.
        time: Timestamp,
        /// Guess.
        answer: String,
    },
    /// A teller hint.
    Tell {
        /// Teller.
        user_id: UserId,
        /// Client time of the hint.
        time: Timestamp,
        /// Hint.
        tell: String,
    },
    /// Hatch progress of a player.
    Hatch {
        /// Player.
        user_id: UserId,
        /// Consumed hatch, 0 to 100.
        hatch_percentage: u32,
    },
    /// Scores.
    LeaderboardUpdate {
        /// Points per player.
        leaderboard: BTreeMap<UserId, u64>,
    },
    /// A player found the answer.
    RightAnswer {
        /// Player.
        user_id: UserId,
    },
    /// A player left.
    UserDisconnect {
        /// Player.
        user_id: UserId,
    },
}
