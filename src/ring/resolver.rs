//! Peer discovery: where the other nodes of the fleet are.

use std::collections::HashMap;

use futures::future::BoxFuture;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;

use super::hash_ring::Member;

/// Failures raised while discovering peers.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The discovery endpoint could not be reached.
    #[error("failed to query peer discovery endpoint `{url}`")]
    Request {
        /// Endpoint queried.
        url: String,
        /// Underlying HTTP failure.
        #[source]
        source: reqwest::Error,
    },
    /// The discovery endpoint answered with an unexpected status.
    #[error("peer discovery endpoint `{url}` answered {status}")]
    Status {
        /// Endpoint queried.
        url: String,
        /// Status returned.
        status: reqwest::StatusCode,
    },
}

/// Source of peer addresses (`host:port`), excluding the local node.
pub trait PeerResolver: Send + Sync {
    /// Current peer addresses.
    fn resolve(&self) -> BoxFuture<'static, Result<Vec<Member>, ResolveError>>;
}

/// Fixed peer list, typically from the command line.
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    peers: Vec<Member>,
}

impl StaticResolver {
    /// Resolver always returning `peers` (blank entries are dropped).
    pub fn new(peers: impl IntoIterator<Item = String>) -> Self {
        Self {
            peers: peers
                .into_iter()
                .map(|peer| peer.trim().to_string())
                .filter(|peer| !peer.is_empty())
                .collect(),
        }
    }
}

impl PeerResolver for StaticResolver {
    fn resolve(&self) -> BoxFuture<'static, Result<Vec<Member>, ResolveError>> {
        let peers = self.peers.clone();
        Box::pin(async move { Ok(peers) })
    }
}

/// Settings of [`DockerResolver`].
#[derive(Debug, Clone)]
pub struct DockerResolverConfig {
    /// Base URL of the Docker Engine HTTP API (e.g. `http://127.0.0.1:2375`).
    pub api_url: String,
    /// Image the peer containers run.
    pub image: String,
    /// Network the peers are attached to.
    pub network: String,
    /// Port the peers listen on.
    pub port: u16,
    /// Hostname of the local container; containers whose id starts with it are skipped.
    pub hostname: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ContainerSummary {
    id: String,
    image: String,
    #[serde(default)]
    network_settings: NetworkSettings,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct NetworkSettings {
    #[serde(default)]
    networks: HashMap<String, EndpointSettings>,
}

#[derive(Debug, Deserialize)]
struct EndpointSettings {
    #[serde(rename = "IPAddress", default)]
    ip_address: String,
}

/// Discovers peers among the running containers of a Docker host.
#[derive(Clone)]
pub struct DockerResolver {
    client: Client,
    config: DockerResolverConfig,
}

impl DockerResolver {
    /// Resolver querying the Docker Engine API described by `config`.
    pub fn new(config: DockerResolverConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }
}

/// Peer addresses among `containers`.
fn peers_from_containers(
    containers: Vec<ContainerSummary>,
    config: &DockerResolverConfig,
) -> Vec<Member> {
    containers
        .into_iter()
        .filter(|container| config.hostname.is_empty() || !container.id.starts_with(&config.hostname))
        .filter(|container| container.image == config.image)
        .filter_map(|container| {
            let endpoint = container.network_settings.networks.get(&config.network)?;
            let ip = endpoint.ip_address.trim();
            (!ip.is_empty()).then(|| format!("{ip}:{}", config.port))
        })
        .collect()
}

impl PeerResolver for DockerResolver {
    fn resolve(&self) -> BoxFuture<'static, Result<Vec<Member>, ResolveError>> {
        let client = self.client.clone();
        let config = self.config.clone();
        Box::pin(async move {
            let url = format!("{}/containers/json", config.api_url.trim_end_matches('/'));
            let response = client
                .get(&url)
                .send()
                .await
                .map_err(|source| ResolveError::Request {
                    url: url.clone(),
                    source,
                })?;
            if !response.status().is_success() {
                return Err(ResolveError::Status {
                    url,
                    status: response.status(),
                });
            }
            let containers: Vec<ContainerSummary> = response
                .json()
                .await
                .map_err(|source| ResolveError::Request {
                    url: url.clone(),
                    source,
                })?;
            Ok(peers_from_containers(containers, &config))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> DockerResolverConfig {
        DockerResolverConfig {
            api_url: "http://docker:2375".into(),
            image: "emoji-quiz-back".into(),
            network: "quiz".into(),
            port: 3000,
            hostname: "abc123".into(),
        }
    }

    #[tokio::test]
    async fn static_resolver_drops_blank_entries() {
        let resolver = StaticResolver::new(vec![" 10.0.0.2:3000 ".into(), "".into()]);
        assert_eq!(resolver.resolve().await.unwrap(), vec!["10.0.0.2:3000"]);
    }

    #[test]
    fn docker_containers_are_filtered_by_image_network_and_self() {
        let containers: Vec<ContainerSummary> = serde_json::from_str(
            r#"[
                {"Id": "abc123ffff", "Image": "emoji-quiz-back",
                 "NetworkSettings": {"Networks": {"quiz": {"IPAddress": "172.18.0.2"}}}},
                {"Id": "def456", "Image": "emoji-quiz-back",
                 "NetworkSettings": {"Networks": {"quiz": {"IPAddress": " 172.18.0.3 "}}}},
                {"Id": "0a0a0a", "Image": "redis",
                 "NetworkSettings": {"Networks": {"quiz": {"IPAddress": "172.18.0.4"}}}},
                {"Id": "1b1b1b", "Image": "emoji-quiz-back",
                 "NetworkSettings": {"Networks": {"bridge": {"IPAddress": "172.17.0.5"}}}}
            ]"#,
        )
        .unwrap();

        assert_eq!(
            peers_from_containers(containers, &config()),
            vec!["172.18.0.3:3000".to_string()]
        );
    }
}
