//! Room instances: one reducer, one rule scheduler and a single-writer action queue.

/// Title normalization and guess matching.
pub mod answers;
/// Gameplay rules reacting to room events.
pub mod rules;
/// Rule runtime: contexts, timers and per-rule tasks.
pub mod scheduler;

use std::{
    future::Future,
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use dashmap::{DashMap, mapref::entry::Entry};
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::{
    sync::{CancellationToken, WaitForCancellationFuture},
    task::TaskTracker,
};
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    config::GameConfig,
    dao::content::ContentSource,
    state::{
        action::RoomAction,
        reducer,
        room::{RoomSnapshot, Timestamp, UserId},
    },
};

use self::scheduler::{RuleContext, spawn_rules};

/// Current wall-clock time in milliseconds, used to stamp action payloads.
pub fn now_millis() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as Timestamp)
        .unwrap_or_default()
}

/// Errors raised when talking to a room.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoomError {
    /// The room was deleted or evicted; its queue no longer accepts actions.
    #[error("room `{0}` is closed")]
    Closed(String),
}

/// One applied action, with the snapshots around it.
#[derive(Debug, Clone)]
pub struct RoomEvent {
    /// Action taken from the queue.
    pub action: RoomAction,
    /// Snapshot before the action.
    pub previous: Arc<RoomSnapshot>,
    /// Snapshot after the action (same as `previous` when rejected).
    pub state: Arc<RoomSnapshot>,
    /// Whether the reducer accepted the action's preconditions.
    pub accepted: bool,
}

/// Entry point of a room's action queue.
#[derive(Clone)]
pub struct Dispatcher {
    room_id: Arc<str>,
    tx: mpsc::UnboundedSender<RoomAction>,
}

impl Dispatcher {
    /// Queue `action` for the room.
    pub fn dispatch(&self, action: RoomAction) -> Result<(), RoomError> {
        self.tx
            .send(action)
            .map_err(|_| RoomError::Closed(self.room_id.to_string()))
    }
}

/// Unbounded fan-out of every room event to the room's own tasks.
///
/// Rules and observers see every event exactly once; unlike the client feed
/// this one never skips.
#[derive(Clone, Default)]
struct Followers {
    senders: Arc<Mutex<Vec<mpsc::UnboundedSender<Arc<RoomEvent>>>>>,
}

impl Followers {
    fn follow(&self) -> mpsc::UnboundedReceiver<Arc<RoomEvent>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.senders.lock().push(tx);
        rx
    }

    fn publish(&self, event: &Arc<RoomEvent>) {
        self.senders
            .lock()
            .retain(|follower| follower.send(event.clone()).is_ok());
    }

    fn close(&self) {
        self.senders.lock().clear();
    }
}

/// Collaborators shared by every room of a node.
#[derive(Clone)]
pub struct RoomDeps {
    /// Gameplay rules and timers.
    pub config: Arc<GameConfig>,
    /// Quiz content lookups.
    pub content: Arc<dyn ContentSource>,
    /// Capacity of the client event feed.
    pub event_capacity: usize,
}

/// A live room: the queue task, its rules and the feeds observers subscribe to.
///
/// Dropping the last handle, or calling [`RoomInstance::close`], cancels every
/// task and timer scoped to the room.
pub struct RoomInstance {
    id: Arc<str>,
    dispatcher: Dispatcher,
    events: broadcast::Sender<Arc<RoomEvent>>,
    followers: Followers,
    state: watch::Receiver<Arc<RoomSnapshot>>,
    scope: CancellationToken,
    tracker: TaskTracker,
    sessions: DashMap<UserId, Uuid>,
}

impl RoomInstance {
    /// Spawn the room's queue and rules starting from `initial`.
    ///
    /// No action is processed until one is dispatched, so observers subscribing
    /// right after construction see the full event history.
    pub fn spawn(id: &str, initial: RoomSnapshot, deps: RoomDeps) -> Arc<Self> {
        let id: Arc<str> = Arc::from(id);
        let scope = CancellationToken::new();
        let (tx, rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(deps.event_capacity.max(1));
        let initial = Arc::new(initial);
        let (state_tx, state) = watch::channel(initial.clone());
        let followers = Followers::default();

        let dispatcher = Dispatcher {
            room_id: id.clone(),
            tx,
        };

        spawn_rules(
            RuleContext {
                room_id: id.clone(),
                dispatcher: dispatcher.clone(),
                config: deps.config,
                content: deps.content,
                scope: scope.clone(),
            },
            &followers,
            rules::default_rules(),
        );

        tokio::spawn(run_queue(
            id.clone(),
            rx,
            initial,
            state_tx,
            events.clone(),
            followers.clone(),
            scope.clone(),
        ));

        info!(room_id = %id, "room started");

        Arc::new(Self {
            id,
            dispatcher,
            events,
            followers,
            state,
            scope,
            tracker: TaskTracker::new(),
            sessions: DashMap::new(),
        })
    }

    /// Identifier of the room.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Queue an action.
    pub fn dispatch(&self, action: RoomAction) -> Result<(), RoomError> {
        if self.scope.is_cancelled() {
            return Err(RoomError::Closed(self.id.to_string()));
        }
        self.dispatcher.dispatch(action)
    }

    /// Handle to the action queue.
    pub fn dispatcher(&self) -> Dispatcher {
        self.dispatcher.clone()
    }

    /// Subscribe to the client feed (every applied action, in queue order).
    ///
    /// The feed is bounded: a receiver that falls behind gets
    /// [`broadcast::error::RecvError::Lagged`] and should resynchronize.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<RoomEvent>> {
        self.events.subscribe()
    }

    /// Follow every applied action without ever skipping one.
    ///
    /// For tasks bound to the room scope; the receiver ends when the queue stops.
    pub fn follow(&self) -> mpsc::UnboundedReceiver<Arc<RoomEvent>> {
        self.followers.follow()
    }

    /// Subscribe to the state feed.
    pub fn watch_state(&self) -> watch::Receiver<Arc<RoomSnapshot>> {
        self.state.clone()
    }

    /// Latest snapshot.
    pub fn snapshot(&self) -> Arc<RoomSnapshot> {
        self.state.borrow().clone()
    }

    /// Cancellation scope of the room; every room-bound task should derive from it.
    pub fn scope(&self) -> &CancellationToken {
        &self.scope
    }

    /// Resolves once the room is closed.
    pub fn closed(&self) -> WaitForCancellationFuture<'_> {
        self.scope.cancelled()
    }

    /// Run `task` alongside the room. It must stop once the room scope is cancelled.
    pub fn spawn_tracked<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tracker.spawn(task);
    }

    /// Resolves once the room is closed and every tracked task has returned.
    pub async fn settled(&self) {
        self.closed().await;
        self.tracker.close();
        self.tracker.wait().await;
    }

    /// Whether the room was closed.
    pub fn is_closed(&self) -> bool {
        self.scope.is_cancelled()
    }

    /// Stop the queue, the rules and every observer bound to the room.
    pub fn close(&self) {
        if !self.scope.is_cancelled() {
            info!(room_id = %self.id, "room closed");
        }
        self.scope.cancel();
    }

    /// Register a client session for `user_id`; fails when the user already has one.
    pub fn register_session(&self, user_id: &str, session: Uuid) -> bool {
        match self.sessions.entry(user_id.to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(session);
                true
            }
        }
    }

    /// Release the session of `user_id` if it is still `session`.
    pub fn unregister_session(&self, user_id: &str, session: Uuid) {
        self.sessions
            .remove_if(user_id, |_, current| *current == session);
    }
}

impl Drop for RoomInstance {
    fn drop(&mut self) {
        self.scope.cancel();
    }
}

/// Single writer of a room: applies queued actions one at a time.
async fn run_queue(
    room_id: Arc<str>,
    mut rx: mpsc::UnboundedReceiver<RoomAction>,
    mut current: Arc<RoomSnapshot>,
    state_tx: watch::Sender<Arc<RoomSnapshot>>,
    events: broadcast::Sender<Arc<RoomEvent>>,
    followers: Followers,
    scope: CancellationToken,
) {
    loop {
        let action = tokio::select! {
            biased;
            _ = scope.cancelled() => break,
            next = rx.recv() => match next {
                Some(action) => action,
                None => break,
            },
        };

        let previous = current.clone();
        let (state, accepted) = match reducer::apply(&previous, &action) {
            Ok(next) => (Arc::new(next), true),
            Err(rejected) => {
                debug!(room_id = %room_id, reason = %rejected, "action rejected");
                (previous.clone(), false)
            }
        };
        debug!(
            room_id = %room_id,
            action = action.name(),
            accepted,
            phase = ?state.state,
            round = state.round,
            "action applied"
        );

        current = state.clone();
        state_tx.send_replace(state.clone());
        let event = Arc::new(RoomEvent {
            action,
            previous,
            state,
            accepted,
        });
        followers.publish(&event);
        let _ = events.send(event);
    }

    followers.close();
    debug!(room_id = %room_id, "room queue stopped");
}
