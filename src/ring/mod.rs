//! Membership ring: which node of the fleet owns which room.

/// Consistent-hash ring over member addresses.
pub mod hash_ring;
/// Peer liveness probes.
pub mod probe;
/// Peer discovery strategies.
pub mod resolver;

use std::{collections::BTreeSet, sync::Arc};

use parking_lot::RwLock;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::RingConfig;

use self::{
    hash_ring::{HashRing, Member},
    probe::{PeerProbe, live_peers},
    resolver::{PeerResolver, ResolveError},
};

/// Answers whether a room may run on this node.
pub trait OwnershipOracle: Send + Sync {
    /// Whether `room_id` is allocated to the local node.
    fn allocated_to_me(&self, room_id: &str) -> bool;
}

/// Failures of the membership ring.
#[derive(Debug, Error)]
pub enum RingError {
    /// Peers could not be discovered.
    #[error("failed to resolve ring peers")]
    Resolve(#[from] ResolveError),
}

/// Membership notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RingEvent {
    /// The ring joined its initial peers.
    Up {
        /// Members after the join, local node included.
        members: Vec<Member>,
    },
    /// Members came or went.
    Changed {
        /// New members.
        added: Vec<Member>,
        /// Departed members.
        removed: Vec<Member>,
    },
    /// Membership can no longer be tracked; the node must stop serving rooms.
    Error(String),
}

/// Consistent-hash ring shared by the node, kept current by a membership poll.
pub struct Ring {
    me: Member,
    config: RingConfig,
    members: RwLock<HashRing>,
    events: broadcast::Sender<RingEvent>,
}

impl Ring {
    /// Ring holding only the local node `me`.
    pub fn new(me: impl Into<Member>, config: RingConfig) -> Arc<Self> {
        let me = me.into();
        let (events, _) = broadcast::channel(32);
        let members = HashRing::with_members(config.virtual_nodes, [me.clone()]);
        Arc::new(Self {
            me,
            config,
            members: RwLock::new(members),
            events,
        })
    }

    /// Address of the local node.
    pub fn me(&self) -> &str {
        &self.me
    }

    /// Subscribe to membership notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<RingEvent> {
        self.events.subscribe()
    }

    /// Current members, local node included.
    pub fn members(&self) -> Vec<Member> {
        self.members.read().members().iter().cloned().collect()
    }

    /// Member owning `room_id`.
    pub fn owner_of(&self, room_id: &str) -> Option<Member> {
        self.members.read().owner_of(room_id).map(str::to_string)
    }

    /// Resolve and probe the initial peers, then announce [`RingEvent::Up`].
    pub async fn join(
        &self,
        resolver: &dyn PeerResolver,
        probe: &dyn PeerProbe,
    ) -> Result<(), RingError> {
        let peers = resolver.resolve().await?;
        let candidates = peers.len();
        let live = live_peers(probe, peers).await;
        if live.len() < candidates {
            warn!(
                candidates,
                live = live.len(),
                "some peers did not answer the join probe"
            );
        }
        self.replace_members(live);
        let members = self.members();
        info!(me = %self.me, members = ?members, "ring joined");
        let _ = self.events.send(RingEvent::Up { members });
        Ok(())
    }

    /// Swap the peer set, returning `(added, removed)`.
    fn replace_members(&self, peers: Vec<Member>) -> (Vec<Member>, Vec<Member>) {
        let wanted: BTreeSet<Member> = peers
            .into_iter()
            .chain(std::iter::once(self.me.clone()))
            .collect();
        let mut ring = self.members.write();
        let current = ring.members().clone();

        let added: Vec<Member> = wanted.difference(&current).cloned().collect();
        let removed: Vec<Member> = current.difference(&wanted).cloned().collect();
        for member in &removed {
            ring.remove(member);
        }
        for member in &added {
            ring.add(member.clone());
        }
        (added, removed)
    }

    /// Poll membership until `shutdown` fires or too many polls fail in a row.
    pub fn spawn_membership_poll(
        self: &Arc<Self>,
        resolver: Arc<dyn PeerResolver>,
        probe: Arc<dyn PeerProbe>,
        shutdown: CancellationToken,
    ) {
        let ring = Arc::clone(self);
        tokio::spawn(async move {
            let mut failures = 0u32;
            let mut ticker = tokio::time::interval(ring.config.poll_interval());
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                match resolver.resolve().await {
                    Ok(peers) => {
                        failures = 0;
                        let live = live_peers(probe.as_ref(), peers).await;
                        let (added, removed) = ring.replace_members(live);
                        if added.is_empty() && removed.is_empty() {
                            debug!("ring membership unchanged");
                            continue;
                        }
                        info!(added = ?added, removed = ?removed, "ring membership changed");
                        let _ = ring.events.send(RingEvent::Changed { added, removed });
                    }
                    Err(err) => {
                        failures += 1;
                        warn!(error = %err, failures, "ring membership poll failed");
                        if failures >= ring.config.max_consecutive_failures.max(1) {
                            error!(error = %err, "ring membership lost");
                            let _ = ring.events.send(RingEvent::Error(err.to_string()));
                            break;
                        }
                    }
                }
            }
        });
    }
}

impl OwnershipOracle for Ring {
    fn allocated_to_me(&self, room_id: &str) -> bool {
        self.members.read().owner_of(room_id) == Some(self.me.as_str())
    }
}
