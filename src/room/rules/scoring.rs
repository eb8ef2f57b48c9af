use std::collections::HashSet;

use crate::{
    room::{
        RoomEvent,
        answers::is_correct,
        scheduler::{Rule, RuleContext},
    },
    state::{
        action::RoomAction,
        room::{RoomPhase, UserId},
    },
};

/// Re-broadcasts the leaderboard whenever it may have changed.
pub struct LeaderboardRefresh;

impl Rule for LeaderboardRefresh {
    fn name(&self) -> &'static str {
        "leaderboard"
    }

    fn react(&mut self, ctx: &RuleContext, event: &RoomEvent) {
        let refresh = matches!(
            event.action,
            RoomAction::RoundStartSuccess { .. }
                | RoomAction::RoundEndSuccess { .. }
                | RoomAction::AddUserLeaderboardPoints { .. }
        );
        if refresh && event.accepted {
            ctx.dispatch(RoomAction::LeaderboardUpdate);
        }
    }
}

/// Consumed share of a hatch budget, 0 to 100.
pub fn hatch_percentage(hatch: u32, limit: u32) -> u32 {
    if limit == 0 {
        return 100;
    }
    let consumed = u64::from(limit.saturating_sub(hatch));
    (consumed * 100 / u64::from(limit)) as u32
}

/// Reports a player's hatch progress after a wrong guess cost them some.
pub struct HatchDecay;

impl Rule for HatchDecay {
    fn name(&self) -> &'static str {
        "hatch-decay"
    }

    fn react(&mut self, ctx: &RuleContext, event: &RoomEvent) {
        let RoomAction::WrongAnswerFound { user_id, .. } = &event.action else {
            return;
        };
        if !event.accepted {
            return;
        }
        let before = event.previous.users.get(user_id).map(|user| user.hatch);
        let Some(after) = event.state.users.get(user_id).map(|user| user.hatch) else {
            return;
        };
        if before.is_some_and(|before| after < before) {
            ctx.dispatch(RoomAction::UserHatchPercentage {
                user_id: user_id.clone(),
                hatch_percentage: hatch_percentage(after, ctx.config.hatch_limit),
            });
        }
    }
}

/// Resets every player's hatch when a round starts or the room is resumed.
pub struct HatchRefresh;

impl Rule for HatchRefresh {
    fn name(&self) -> &'static str {
        "hatch-refresh"
    }

    fn react(&mut self, ctx: &RuleContext, event: &RoomEvent) {
        let refresh = match event.action {
            RoomAction::RoundStartSuccess { .. } => event.accepted,
            RoomAction::RoomResume => true,
            _ => false,
        };
        if refresh {
            ctx.dispatch(RoomAction::RefreshUsersHatch {
                limit: ctx.config.hatch_limit,
            });
        }
    }
}

/// Scores guesses made while a round is in progress.
///
/// A player is awarded at most once per round, even if several correct guesses
/// are queued before the first award reaches the snapshot.
#[derive(Default)]
pub struct AnswerEvaluation {
    round: u64,
    awarded: HashSet<UserId>,
}

impl Rule for AnswerEvaluation {
    fn name(&self) -> &'static str {
        "answer-evaluation"
    }

    fn react(&mut self, ctx: &RuleContext, event: &RoomEvent) {
        let RoomAction::SocketUserSay {
            user_id,
            message,
            time,
        } = &event.action
        else {
            return;
        };
        let state = &event.state;
        if state.state != RoomPhase::RoundInProgress || state.is_teller(user_id) {
            return;
        }
        if state.round != self.round {
            self.round = state.round;
            self.awarded.clear();
        }
        if state.found_right.contains_key(user_id) || self.awarded.contains(user_id) {
            return;
        }
        let Some(user) = state.users.get(user_id) else {
            return;
        };
        let titles = state.round_state.titles.as_deref().unwrap_or_default();

        if is_correct(message, titles) {
            self.awarded.insert(user_id.clone());
            ctx.dispatch(RoomAction::AddUserLeaderboardPoints {
                user_id: user_id.clone(),
                points: u64::from(user.hatch),
            });
            ctx.dispatch(RoomAction::RightAnswerFound {
                user_id: user_id.clone(),
                time: *time,
            });
        } else {
            ctx.dispatch(RoomAction::WrongAnswerFound {
                user_id: user_id.clone(),
                message: message.clone(),
                time: *time,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hatch_percentage_tracks_consumed_budget() {
        assert_eq!(hatch_percentage(20, 20), 0);
        assert_eq!(hatch_percentage(19, 20), 5);
        assert_eq!(hatch_percentage(0, 20), 100);
        assert_eq!(hatch_percentage(30, 20), 0);
        assert_eq!(hatch_percentage(0, 0), 100);
    }
}
