use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::dao::content::models::{Answer, Category, CategoryId};

/// Identifier of a connected player, as provided by the connection layer.
pub type UserId = String;

/// Milliseconds since the Unix epoch.
pub type Timestamp = i64;

/// High-level phase of a room.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoomPhase {
    /// No round is running.
    #[default]
    Idle,
    /// The teller is choosing a category.
    RoundPickAnswer,
    /// Players are guessing.
    RoundInProgress,
    /// Round is over, waiting before the next one.
    RoundFinished,
}

impl RoomPhase {
    /// Whether a round is currently being played (picking or guessing).
    pub fn is_round_active(self) -> bool {
        matches!(self, RoomPhase::RoundPickAnswer | RoomPhase::RoundInProgress)
    }
}

/// Player tracked by a room, kept after disconnection so scores survive reconnects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Identity of the player.
    pub id: UserId,
    /// Display name.
    pub name: String,
    /// First time the player joined the room.
    pub created_at: Timestamp,
    /// Remaining hatch budget for the current round.
    pub hatch: u32,
}

/// Per-round data, cleared when the round ends.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RoundState {
    /// Player responsible for the answer this round.
    pub teller: Option<UserId>,
    /// Answer to find, once picked.
    pub answer: Option<Answer>,
    /// Normalized accepted titles of [`RoundState::answer`].
    pub titles: Option<Vec<String>>,
}

/// Category selection offered to the teller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PickState {
    /// Categories offered at round start, in offer order.
    pub categories: Option<IndexMap<CategoryId, Category>>,
    /// Category picked by the teller (or automatically).
    pub picked: Option<CategoryId>,
}

/// Record of a correct guess.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoundRight {
    /// When the guess was made.
    pub time: Timestamp,
}

/// Complete state of a room at one point of its action sequence.
///
/// The serialized form (camelCase keys) is the persisted document, so field
/// names must stay stable for rooms to resume across versions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RoomSnapshot {
    /// Room identifier, set by the init action.
    pub id: Option<String>,
    /// Creation timestamp.
    pub created_at: Option<Timestamp>,
    /// Start of the latest round.
    pub last_round_started_at: Option<Timestamp>,
    /// End of the latest round.
    pub last_round_ended_at: Option<Timestamp>,
    /// Current phase.
    pub state: RoomPhase,
    /// Number of rounds started so far.
    pub round: u64,
    /// Data of the current round.
    pub round_state: RoundState,
    /// Category offer of the current round.
    pub pick_state: PickState,
    /// Every player who ever joined.
    pub users: BTreeMap<UserId, User>,
    /// Connected players and their connection time.
    pub online: BTreeMap<UserId, Timestamp>,
    /// Points per player.
    pub leaderboard: BTreeMap<UserId, u64>,
    /// Players who found the answer this round.
    pub found_right: BTreeMap<UserId, FoundRight>,
}

impl RoomSnapshot {
    /// Current teller, if a round is running.
    pub fn teller(&self) -> Option<&str> {
        self.round_state.teller.as_deref()
    }

    /// Whether `user_id` is the teller of the current round.
    pub fn is_teller(&self, user_id: &str) -> bool {
        self.teller() == Some(user_id)
    }

    /// Number of connected players.
    pub fn online_count(&self) -> usize {
        self.online.len()
    }

    /// Copy of this snapshot with online presence cleared, used when a room is recovered.
    pub fn sanitized(&self) -> Self {
        Self {
            online: BTreeMap::new(),
            ..self.clone()
        }
    }
}
