//! Gameplay rules. Each one watches the room feed and answers with new actions.

mod lifecycle;
mod pick;
mod round;
mod scoring;
mod timers;

pub use self::{
    lifecycle::{EnoughPlayers, RoundStartOnJoin, UserLifecycle},
    pick::{RoundInProgress, TellerPick},
    round::{RestartAfterFinish, RoundEnd, RoundStart},
    scoring::{AnswerEvaluation, HatchDecay, HatchRefresh, LeaderboardRefresh},
    timers::RoundEndTimers,
};

use super::scheduler::Rule;

/// Rules installed on every room.
pub fn default_rules() -> Vec<Box<dyn Rule>> {
    vec![
        Box::new(UserLifecycle),
        Box::new(EnoughPlayers),
        Box::new(RoundStartOnJoin),
        Box::new(RoundStart::default()),
        Box::new(TellerPick::default()),
        Box::new(RoundInProgress::default()),
        Box::new(RoundEndTimers::default()),
        Box::new(RoundEnd),
        Box::new(RestartAfterFinish::default()),
        Box::new(LeaderboardRefresh),
        Box::new(HatchDecay),
        Box::new(HatchRefresh),
        Box::new(AnswerEvaluation::default()),
    ]
}
