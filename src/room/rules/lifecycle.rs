use rand::Rng;

use crate::{
    room::{
        RoomEvent,
        scheduler::{Rule, RuleContext},
    },
    state::{
        action::RoomAction,
        room::{RoomPhase, User},
    },
};

/// Turns connection events into player joins and leaves.
pub struct UserLifecycle;

impl Rule for UserLifecycle {
    fn name(&self) -> &'static str {
        "user-lifecycle"
    }

    fn react(&mut self, ctx: &RuleContext, event: &RoomEvent) {
        match &event.action {
            RoomAction::SocketUserConnected {
                user_id,
                name,
                time,
            } => {
                let name = name
                    .as_deref()
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .map(str::to_string)
                    .unwrap_or_else(generated_name);
                ctx.dispatch(RoomAction::UserConnected {
                    user: User {
                        id: user_id.clone(),
                        name,
                        created_at: *time,
                        hatch: ctx.config.hatch_limit,
                    },
                    time: *time,
                });
            }
            RoomAction::SocketUserDisconnected { user_id } => {
                ctx.dispatch(RoomAction::UserDisconnected {
                    user_id: user_id.clone(),
                });
            }
            _ => {}
        }
    }
}

fn generated_name() -> String {
    format!("user#{:06}", rand::rng().random_range(0..1_000_000))
}

/// Signals the moment the room reaches the connected-player threshold.
pub struct EnoughPlayers;

impl Rule for EnoughPlayers {
    fn name(&self) -> &'static str {
        "enough-players"
    }

    fn react(&mut self, ctx: &RuleContext, event: &RoomEvent) {
        if event.accepted
            && matches!(event.action, RoomAction::UserConnected { .. })
            && event.state.online_count() == ctx.config.enough_player_count
            && event.previous.online_count() < ctx.config.enough_player_count
        {
            ctx.dispatch(RoomAction::HaveEnoughPlayers);
        }
    }
}

/// Requests a round when enough players are present and nothing is running.
pub struct RoundStartOnJoin;

impl Rule for RoundStartOnJoin {
    fn name(&self) -> &'static str {
        "round-start-on-join"
    }

    fn react(&mut self, ctx: &RuleContext, event: &RoomEvent) {
        if matches!(event.action, RoomAction::HaveEnoughPlayers)
            && event.state.state == RoomPhase::Idle
        {
            ctx.dispatch(RoomAction::RoundStartRequest);
        }
    }
}
