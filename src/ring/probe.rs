use std::time::Duration;

use futures::future::BoxFuture;
use reqwest::Client;

use super::hash_ring::Member;

/// Liveness check of a peer before it is placed on the ring.
pub trait PeerProbe: Send + Sync {
    /// Whether `peer` answers.
    fn is_alive(&self, peer: &str) -> BoxFuture<'static, bool>;
}

/// Probe calling `GET http://<peer>/healthcheck`.
#[derive(Clone)]
pub struct HttpProbe {
    client: Client,
    timeout: Duration,
}

impl HttpProbe {
    /// Probe giving up on a peer after `timeout`.
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            timeout,
        }
    }
}

impl PeerProbe for HttpProbe {
    fn is_alive(&self, peer: &str) -> BoxFuture<'static, bool> {
        let request = self
            .client
            .get(format!("http://{peer}/healthcheck"))
            .timeout(self.timeout);
        Box::pin(async move {
            request
                .send()
                .await
                .is_ok_and(|response| response.status().is_success())
        })
    }
}

/// Probe trusting every peer, for static setups and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysAlive;

impl PeerProbe for AlwaysAlive {
    fn is_alive(&self, _peer: &str) -> BoxFuture<'static, bool> {
        Box::pin(async { true })
    }
}

/// Peers of `candidates` answering `probe`, in input order.
pub async fn live_peers(probe: &dyn PeerProbe, candidates: Vec<Member>) -> Vec<Member> {
    let checks = candidates.iter().map(|peer| probe.is_alive(peer));
    let answers = futures::future::join_all(checks).await;
    candidates
        .into_iter()
        .zip(answers)
        .filter_map(|(peer, alive)| alive.then_some(peer))
        .collect()
}
