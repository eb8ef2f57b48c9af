use rand::seq::IteratorRandom;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::{
    dao::content::models::CategoryId,
    room::{
        RoomEvent,
        answers::accepted_titles,
        scheduler::{Rule, RuleContext},
    },
    state::{
        action::RoomAction,
        room::{RoomPhase, RoomSnapshot},
    },
};

/// Validates teller picks and picks a category automatically when the teller runs out of time.
#[derive(Default)]
pub struct TellerPick {
    timer: Option<CancellationToken>,
}

impl TellerPick {
    fn arm(&mut self, ctx: &RuleContext, state: &RoomSnapshot) {
        self.cancel();
        let fallback = state
            .pick_state
            .categories
            .as_ref()
            .and_then(|categories| categories.keys().choose(&mut rand::rng()).cloned());
        let Some(category) = fallback else {
            return;
        };
        let token = ctx.child_scope();
        ctx.dispatch_after(
            ctx.config.teller_pick_time(),
            token.clone(),
            vec![RoomAction::TellerPickAnswerSuccess {
                category,
                automatic: true,
            }],
        );
        self.timer = Some(token);
    }

    fn cancel(&mut self) {
        if let Some(token) = self.timer.take() {
            token.cancel();
        }
    }
}

/// Why a pick by `user_id` cannot be accepted in `state`, if any.
fn pick_error(state: &RoomSnapshot, user_id: &str, category: &CategoryId) -> Option<&'static str> {
    if state.state != RoomPhase::RoundPickAnswer {
        return Some("no category pick is expected");
    }
    if !state.is_teller(user_id) {
        return Some("only the teller can pick a category");
    }
    if state.pick_state.picked.is_some() {
        return Some("a category is already picked");
    }
    let offered = state
        .pick_state
        .categories
        .as_ref()
        .is_some_and(|categories| categories.contains_key(category));
    (!offered).then_some("category was not offered")
}

impl Rule for TellerPick {
    fn name(&self) -> &'static str {
        "teller-pick"
    }

    fn react(&mut self, ctx: &RuleContext, event: &RoomEvent) {
        match &event.action {
            RoomAction::RoundStartSuccess { .. } if event.accepted => self.arm(ctx, &event.state),
            RoomAction::RoomResume
                if event.state.state == RoomPhase::RoundPickAnswer
                    && event.state.pick_state.picked.is_none() =>
            {
                self.arm(ctx, &event.state)
            }
            RoomAction::SocketUserPickAnswer {
                user_id, category, ..
            } => match pick_error(&event.state, user_id, category) {
                Some(reason) => ctx.dispatch(RoomAction::TellerPickAnswerFailed {
                    user_id: user_id.clone(),
                    reason: reason.to_string(),
                }),
                None => {
                    self.cancel();
                    ctx.dispatch(RoomAction::TellerPickAnswerSuccess {
                        category: category.clone(),
                        automatic: false,
                    });
                }
            },
            RoomAction::TellerPickAnswerSuccess { .. } | RoomAction::RoundEndSuccess { .. }
                if event.accepted =>
            {
                self.cancel()
            }
            _ => {}
        }
    }
}

/// Fetches the answer of the picked category and starts the guessing phase.
#[derive(Default)]
pub struct RoundInProgress {
    lookup: Option<CancellationToken>,
}

impl RoundInProgress {
    fn fetch(&mut self, ctx: &RuleContext, category: CategoryId) {
        self.cancel();
        let token = ctx.child_scope();
        let content = ctx.content.clone();
        let room_id = ctx.room_id.clone();
        ctx.spawn_scoped(token.clone(), async move {
            match content.random_answer_for_category(category.clone()).await {
                Ok(answer) => {
                    let titles = accepted_titles(&answer);
                    vec![RoomAction::RoundInProgressSuccess { answer, titles }]
                }
                Err(err) => {
                    warn!(room_id = %room_id, category = %category, error = %err, "answer lookup failed");
                    vec![
                        RoomAction::RoundInProgressFailed {
                            reason: err.to_string(),
                        },
                        RoomAction::RoundEndRequest,
                    ]
                }
            }
        });
        self.lookup = Some(token);
    }

    fn cancel(&mut self) {
        if let Some(token) = self.lookup.take() {
            token.cancel();
        }
    }
}

impl Rule for RoundInProgress {
    fn name(&self) -> &'static str {
        "round-in-progress"
    }

    fn react(&mut self, ctx: &RuleContext, event: &RoomEvent) {
        match &event.action {
            RoomAction::TellerPickAnswerSuccess { category, .. } if event.accepted => {
                self.fetch(ctx, category.clone())
            }
            RoomAction::RoomResume if event.state.state == RoomPhase::RoundPickAnswer => {
                if let Some(category) = event.state.pick_state.picked.clone() {
                    self.fetch(ctx, category);
                }
            }
            RoomAction::RoundEndSuccess { .. } | RoomAction::RoundStartSuccess { .. }
                if event.accepted =>
            {
                self.cancel()
            }
            _ => {}
        }
    }
}
