use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use indexmap::IndexMap;
use rand::seq::IteratorRandom;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
    dao::content::models::CategoryType,
    room::{
        RoomEvent, now_millis,
        scheduler::{Rule, RuleContext},
    },
    state::{action::RoomAction, room::RoomPhase},
};

/// Validates round start requests, chooses a teller and looks up the category offer.
#[derive(Default)]
pub struct RoundStart {
    in_flight: Arc<AtomicBool>,
}

impl Rule for RoundStart {
    fn name(&self) -> &'static str {
        "round-start"
    }

    fn react(&mut self, ctx: &RuleContext, event: &RoomEvent) {
        if !matches!(event.action, RoomAction::RoundStartRequest) {
            return;
        }
        let state = &event.state;
        let failed = |reason: &str| {
            ctx.dispatch(RoomAction::RoundStartFailed {
                reason: reason.to_string(),
            })
        };
        if state.state != RoomPhase::Idle {
            return failed("a round can only start while the room is idle");
        }
        if state.online_count() <= 1 {
            return failed("at least two connected players are needed");
        }
        let Some(teller) = state.online.keys().choose(&mut rand::rng()).cloned() else {
            return failed("no connected player to tell");
        };
        if self.in_flight.swap(true, Ordering::AcqRel) {
            return failed("a round start is already pending");
        }

        let content = ctx.content.clone();
        let genres = ctx.config.genre_category_count;
        let directors = ctx.config.director_category_count;
        let in_flight = self.in_flight.clone();
        let room_id = ctx.room_id.clone();
        ctx.spawn_scoped(ctx.child_scope(), async move {
            let lookup = async {
                let mut offer = content.random_categories(genres, CategoryType::Genre).await?;
                offer.extend(
                    content
                        .random_categories(directors, CategoryType::Director)
                        .await?,
                );
                Ok::<_, crate::dao::content::ContentError>(offer)
            };
            let result = lookup.await;
            in_flight.store(false, Ordering::Release);

            match result {
                Ok(offer) if !offer.is_empty() => {
                    let categories: IndexMap<_, _> = offer
                        .into_iter()
                        .map(|category| (category.id.clone(), category))
                        .collect();
                    info!(room_id = %room_id, teller = %teller, "round starting");
                    vec![RoomAction::RoundStartSuccess {
                        teller,
                        categories,
                        started_at: now_millis(),
                    }]
                }
                Ok(_) => vec![RoomAction::RoundStartFailed {
                    reason: "no category available".into(),
                }],
                Err(err) => {
                    warn!(room_id = %room_id, error = %err, "category lookup failed");
                    vec![RoomAction::RoundStartFailed {
                        reason: err.to_string(),
                    }]
                }
            }
        });
    }
}

/// Ends the running round on request.
pub struct RoundEnd;

impl Rule for RoundEnd {
    fn name(&self) -> &'static str {
        "round-end"
    }

    fn react(&mut self, ctx: &RuleContext, event: &RoomEvent) {
        if !matches!(event.action, RoomAction::RoundEndRequest) {
            return;
        }
        if event.state.state.is_round_active() {
            ctx.dispatch(RoomAction::RoundEndSuccess {
                ended_at: now_millis(),
            });
        } else {
            ctx.dispatch(RoomAction::RoundEndFailed {
                reason: "no round is running".into(),
            });
        }
    }
}

/// Starts the next round once the post-round pause is over.
#[derive(Default)]
pub struct RestartAfterFinish {
    pending: Option<CancellationToken>,
}

impl RestartAfterFinish {
    fn arm(&mut self, ctx: &RuleContext) {
        self.cancel();
        let token = ctx.child_scope();
        ctx.dispatch_after(
            ctx.config.round_restart_time(),
            token.clone(),
            vec![
                RoomAction::RoundEndStateWaitCompleted,
                RoomAction::RoundStartRequest,
            ],
        );
        self.pending = Some(token);
    }

    fn cancel(&mut self) {
        if let Some(token) = self.pending.take() {
            token.cancel();
        }
    }
}

impl Rule for RestartAfterFinish {
    fn name(&self) -> &'static str {
        "restart-after-finish"
    }

    fn react(&mut self, ctx: &RuleContext, event: &RoomEvent) {
        match &event.action {
            RoomAction::RoundEndSuccess { .. } if event.accepted => self.arm(ctx),
            RoomAction::RoomResume if event.state.state == RoomPhase::RoundFinished => {
                self.arm(ctx)
            }
            RoomAction::RoundStartSuccess { .. } if event.accepted => self.cancel(),
            _ => {}
        }
    }
}
