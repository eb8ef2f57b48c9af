use indexmap::IndexMap;

use crate::{
    dao::content::models::{Answer, Category, CategoryId},
    state::room::{Timestamp, User, UserId},
};

/// Every mutation or notification a room can process.
///
/// Actions are the only way a room snapshot changes; notifications that do not
/// touch the snapshot (e.g. [`RoomAction::LeaderboardUpdate`]) still flow through
/// the queue so every observer sees them in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomAction {
    /// Stamp a fresh room with its identity.
    RoomInit {
        /// Room identifier.
        id: String,
        /// Creation time.
        created_at: Timestamp,
    },
    /// A persisted room was recovered on this node.
    RoomResume,
    /// A client connection registered against the room.
    SocketUserConnected {
        /// Identity of the connection.
        user_id: UserId,
        /// Display name supplied by the client, if any.
        name: Option<String>,
        /// Connection time.
        time: Timestamp,
    },
    /// A client connection left the room.
    SocketUserDisconnected {
        /// Identity of the connection.
        user_id: UserId,
    },
    /// A client sent a chat line or guess.
    SocketUserSay {
        /// Author.
        user_id: UserId,
        /// Raw message.
        message: String,
        /// Client-side time of the message.
        time: Timestamp,
    },
    /// A client picked a category.
    SocketUserPickAnswer {
        /// Author.
        user_id: UserId,
        /// Picked category.
        category: CategoryId,
        /// Client-side time of the pick.
        time: Timestamp,
    },
    /// A player joined (or rejoined) the room.
    UserConnected {
        /// Player record used if the player is new to this room.
        user: User,
        /// Connection time.
        time: Timestamp,
    },
    /// A player left the room.
    UserDisconnected {
        /// Player leaving.
        user_id: UserId,
    },
    /// The connected-player threshold was just reached.
    HaveEnoughPlayers,
    /// Ask for a new round.
    RoundStartRequest,
    /// A round starts with the given teller and category offer.
    RoundStartSuccess {
        /// Chosen teller.
        teller: UserId,
        /// Categories offered to the teller.
        categories: IndexMap<CategoryId, Category>,
        /// Start time.
        started_at: Timestamp,
    },
    /// A round could not start.
    RoundStartFailed {
        /// Why the round did not start.
        reason: String,
    },
    /// The teller's category is set.
    TellerPickAnswerSuccess {
        /// Picked category.
        category: CategoryId,
        /// Whether the pick was made by the timeout fallback.
        automatic: bool,
    },
    /// A pick was rejected.
    TellerPickAnswerFailed {
        /// Author of the rejected pick.
        user_id: UserId,
        /// Why the pick was rejected.
        reason: String,
    },
    /// The answer is known, guessing starts.
    RoundInProgressSuccess {
        /// Answer to find.
        answer: Answer,
        /// Normalized accepted titles.
        titles: Vec<String>,
    },
    /// The answer lookup failed.
    RoundInProgressFailed {
        /// Why the lookup failed.
        reason: String,
    },
    /// Ask for the current round to end.
    RoundEndRequest,
    /// The current round ended.
    RoundEndSuccess {
        /// End time.
        ended_at: Timestamp,
    },
    /// A round end request was rejected.
    RoundEndFailed {
        /// Why the round did not end.
        reason: String,
    },
    /// The pause after a round is over.
    RoundEndStateWaitCompleted,
    /// A player found the answer.
    RightAnswerFound {
        /// Player.
        user_id: UserId,
        /// Time of the guess.
        time: Timestamp,
    },
    /// A player guessed wrong.
    WrongAnswerFound {
        /// Player.
        user_id: UserId,
        /// Raw guess.
        message: String,
        /// Time of the guess.
        time: Timestamp,
    },
    /// Add points to a player's score.
    AddUserLeaderboardPoints {
        /// Player.
        user_id: UserId,
        /// Points to add.
        points: u64,
    },
    /// The leaderboard should be re-broadcast.
    LeaderboardUpdate,
    /// A player's hatch progress changed.
    UserHatchPercentage {
        /// Player.
        user_id: UserId,
        /// Consumed hatch, 0 to 100.
        hatch_percentage: u32,
    },
    /// Reset every player's hatch.
    RefreshUsersHatch {
        /// Hatch value to reset to.
        limit: u32,
    },
}

impl RoomAction {
    /// Stable name used in logs, matching the historical action type names.
    pub fn name(&self) -> &'static str {
        match self {
            RoomAction::RoomInit { .. } => "ROOM_INIT_WITH_ID",
            RoomAction::RoomResume => "ROOM_RESUME",
            RoomAction::SocketUserConnected { .. } => "SOCKET_USER_CONNECTED",
            RoomAction::SocketUserDisconnected { .. } => "SOCKET_USER_DISCONNECTED",
            RoomAction::SocketUserSay { .. } => "SOCKET_USER_SAY",
            RoomAction::SocketUserPickAnswer { .. } => "SOCKET_USER_PICK_ANSWER",
            RoomAction::UserConnected { .. } => "USER_CONNECTED",
            RoomAction::UserDisconnected { .. } => "USER_DISCONNECTED",
            RoomAction::HaveEnoughPlayers => "HAVE_ENOUGH_PLAYERS",
            RoomAction::RoundStartRequest => "ROUND_START_REQUEST",
            RoomAction::RoundStartSuccess { .. } => "ROUND_START_SUCCESS",
            RoomAction::RoundStartFailed { .. } => "ROUND_START_FAILED",
            RoomAction::TellerPickAnswerSuccess { .. } => "TELLER_PICK_ANSWER_SUCCESS",
            RoomAction::TellerPickAnswerFailed { .. } => "TELLER_PICK_ANSWER_FAILED",
            RoomAction::RoundInProgressSuccess { .. } => "ROUND_IN_PROGRESS_SUCCESS",
            RoomAction::RoundInProgressFailed { .. } => "ROUND_IN_PROGRESS_FAILED",
            RoomAction::RoundEndRequest => "ROUND_END_REQUEST",
            RoomAction::RoundEndSuccess { .. } => "ROUND_END_SUCCESS",
            RoomAction::RoundEndFailed { .. } => "ROUND_END_FAILED",
            RoomAction::RoundEndStateWaitCompleted => "ROUND_END_STATE_WAIT_COMPLETED",
            RoomAction::RightAnswerFound { .. } => "RIGHT_ANSWER_FOUND",
            RoomAction::WrongAnswerFound { .. } => "WRONG_ANSWER_FOUND",
            RoomAction::AddUserLeaderboardPoints { .. } => "ADD_USER_LEADERBOARD_POINTS",
            RoomAction::LeaderboardUpdate => "LEADERBOARD_UPDATE",
            RoomAction::UserHatchPercentage { .. } => "USER_HATCH_PERCENTAGE",
            RoomAction::RefreshUsersHatch { .. } => "REFRESH_USERS_HATCH",
        }
    }
}
