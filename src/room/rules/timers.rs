use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::{
    room::{
        RoomEvent, now_millis,
        scheduler::{Rule, RuleContext},
    },
    state::{action::RoomAction, room::RoomSnapshot},
};

/// Requests the end of a round: when its time is up, when a single player is
/// left, or shortly after the first correct answer.
///
/// All three timers live under one round scope, cancelled when the round ends.
#[derive(Default)]
pub struct RoundEndTimers {
    round: Option<CancellationToken>,
    too_few_players: Option<CancellationToken>,
    grace_armed: bool,
}

impl RoundEndTimers {
    fn open_round(&mut self, ctx: &RuleContext, remaining: Duration) -> CancellationToken {
        self.close_round();
        let round = ctx.child_scope();
        ctx.dispatch_after(
            remaining,
            round.child_token(),
            vec![RoomAction::RoundEndRequest],
        );
        self.round = Some(round.clone());
        round
    }

    fn close_round(&mut self) {
        if let Some(round) = self.round.take() {
            round.cancel();
        }
        self.too_few_players = None;
        self.grace_armed = false;
    }

    fn arm_grace(&mut self, ctx: &RuleContext) {
        let Some(round) = &self.round else {
            return;
        };
        if self.grace_armed {
            return;
        }
        self.grace_armed = true;
        ctx.dispatch_after(
            ctx.config.after_first_win_time(),
            round.child_token(),
            vec![RoomAction::RoundEndRequest],
        );
    }

    fn arm_too_few_players(&mut self, ctx: &RuleContext) {
        let Some(round) = &self.round else {
            return;
        };
        if let Some(previous) = self.too_few_players.take() {
            previous.cancel();
        }
        let token = round.child_token();
        ctx.dispatch_after(
            ctx.config.not_enough_players_timeout(),
            token.clone(),
            vec![RoomAction::RoundEndRequest],
        );
        self.too_few_players = Some(token);
    }

    /// Time left in a resumed round, measured from its recorded start.
    fn remaining(ctx: &RuleContext, state: &RoomSnapshot) -> Duration {
        let total = ctx.config.round_play_time();
        let Some(started_at) = state.last_round_started_at else {
            return total;
        };
        let elapsed = u64::try_from(now_millis().saturating_sub(started_at)).unwrap_or_default();
        total.saturating_sub(Duration::from_millis(elapsed))
    }
}

impl Rule for RoundEndTimers {
    fn name(&self) -> &'static str {
        "round-end-timers"
    }

    fn react(&mut self, ctx: &RuleContext, event: &RoomEvent) {
        let state = &event.state;
        match &event.action {
            RoomAction::RoundStartSuccess { .. } if event.accepted => {
                self.open_round(ctx, ctx.config.round_play_time());
            }
            RoomAction::RoomResume if state.state.is_round_active() => {
                self.open_round(ctx, Self::remaining(ctx, state));
                if !state.found_right.is_empty() {
                    self.arm_grace(ctx);
                }
                if state.online_count() <= 1 {
                    self.arm_too_few_players(ctx);
                }
            }
            RoomAction::UserDisconnected { .. }
                if event.accepted
                    && state.state.is_round_active()
                    && state.online_count() == 1 =>
            {
                self.arm_too_few_players(ctx);
            }
            RoomAction::HaveEnoughPlayers => {
                if let Some(token) = self.too_few_players.take() {
                    token.cancel();
                }
            }
            RoomAction::RightAnswerFound { .. } if event.accepted => self.arm_grace(ctx),
            RoomAction::RoundEndSuccess { .. } if event.accepted => self.close_round(),
            _ => {}
        }
    }
}
