use std::{future::Future, sync::Arc, time::Duration};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{
    config::GameConfig,
    dao::content::ContentSource,
    room::{Dispatcher, Followers, RoomEvent},
    state::action::RoomAction,
};

/// A reaction to room events.
///
/// Rules run on their own task and see every event of the room in queue order.
/// They never touch the snapshot directly: every effect goes back through the
/// dispatcher, immediately or after a timer or a content lookup.
pub trait Rule: Send + 'static {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    /// React to one event.
    fn react(&mut self, ctx: &RuleContext, event: &RoomEvent);
}

/// What a rule can reach: its room's queue, the game settings and the content source.
#[derive(Clone)]
pub struct RuleContext {
    /// Room the rule belongs to.
    pub room_id: Arc<str>,
    /// Room queue.
    pub dispatcher: Dispatcher,
    /// Gameplay rules and timers.
    pub config: Arc<GameConfig>,
    /// Quiz content lookups.
    pub content: Arc<dyn ContentSource>,
    /// Room scope; every timer and lookup is a descendant of it.
    pub scope: CancellationToken,
}

impl RuleContext {
    /// Queue `action` now.
    pub fn dispatch(&self, action: RoomAction) {
        if let Err(err) = self.dispatcher.dispatch(action) {
            debug!(room_id = %self.room_id, error = %err, "dropping action");
        }
    }

    /// New cancellation scope bound to the room.
    pub fn child_scope(&self) -> CancellationToken {
        self.scope.child_token()
    }

    /// Queue `actions` after `delay` unless `token` is cancelled first.
    ///
    /// `token` must descend from the room scope.
    pub fn dispatch_after(
        &self,
        delay: Duration,
        token: CancellationToken,
        actions: Vec<RoomAction>,
    ) {
        self.spawn_scoped(token, async move {
            tokio::time::sleep(delay).await;
            actions
        });
    }

    /// Run `work` in the background and queue the actions it yields, unless
    /// `token` is cancelled before it completes.
    pub fn spawn_scoped<F>(&self, token: CancellationToken, work: F)
    where
        F: Future<Output = Vec<RoomAction>> + Send + 'static,
    {
        let dispatcher = self.dispatcher.clone();
        tokio::spawn(async move {
            let actions = tokio::select! {
                biased;
                _ = token.cancelled() => return,
                actions = work => actions,
            };
            for action in actions {
                if dispatcher.dispatch(action).is_err() {
                    break;
                }
            }
        });
    }
}

/// Spawn one task per rule, each following the room before returning.
pub(super) fn spawn_rules(ctx: RuleContext, followers: &Followers, rules: Vec<Box<dyn Rule>>) {
    for rule in rules {
        let rx = followers.follow();
        tokio::spawn(run_rule(ctx.clone(), rx, rule));
    }
}

async fn run_rule(
    ctx: RuleContext,
    mut rx: mpsc::UnboundedReceiver<Arc<RoomEvent>>,
    mut rule: Box<dyn Rule>,
) {
    loop {
        let event = tokio::select! {
            biased;
            _ = ctx.scope.cancelled() => break,
            received = rx.recv() => match received {
                Some(event) => event,
                None => break,
            },
        };
        rule.react(&ctx, &event);
    }
    debug!(room_id = %ctx.room_id, rule = rule.name(), "rule stopped");
}
