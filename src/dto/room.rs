use std::collections::BTreeMap;

use serde::Serialize;

use crate::state::room::{FoundRight, RoomPhase, RoomSnapshot, Timestamp, User, UserId};

/// Client-facing view of a room: the snapshot without the answer and the category offer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomView {
    /// Room identifier, set once the room is initialized.
    pub id: Option<String>,
    /// Current phase.
    pub state: RoomPhase,
    /// Number of the current or last round.
    pub round: u64,
    /// Player telling the current round.
    pub teller: Option<UserId>,
    /// Creation time of the room.
    pub created_at: Option<Timestamp>,
    /// Start of the last round.
    pub last_round_started_at: Option<Timestamp>,
    /// End of the last round.
    pub last_round_ended_at: Option<Timestamp>,
    /// Every player who ever joined.
    pub users: BTreeMap<UserId, User>,
    /// Connected players and when they joined.
    pub online: BTreeMap<UserId, Timestamp>,
    /// Total score per player.
    pub leaderboard: BTreeMap<UserId, u64>,
    /// Players who found the answer this round.
    pub found_right: BTreeMap<UserId, FoundRight>,
}

impl From<&RoomSnapshot> for RoomView {
    fn from(room: &RoomSnapshot) -> Self {
        Self {
            id: room.id.clone(),
            state: room.state,
            round: room.round,
            teller: room.round_state.teller.clone(),
            created_at: room.created_at,
            last_round_started_at: room.last_round_started_at,
            last_round_ended_at: room.last_round_ended_at,
            users: room.users.clone(),
            online: room.online.clone(),
            leaderboard: room.leaderboard.clone(),
            found_right: room.found_right.clone(),
        }
    }
}

/// Which node owns a room.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerResponse {
    /// Requested room.
    pub room_id: String,
    /// Address of the owning node, absent when the ring is empty.
    pub owner: Option<String>,
    /// Whether the answering node is the owner.
    pub local: bool,
}

/// Rooms running on the answering node.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomListResponse {
    /// Address of the answering node.
    pub node: String,
    /// Resident room ids, sorted.
    pub rooms: Vec<String>,
}
