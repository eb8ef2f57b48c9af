//! Emoji quiz backend entrypoint wiring the ring, the lobby, persistence and the HTTP/WebSocket layer.

use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use anyhow::Context;
use axum::Router;
use clap::{Parser, ValueEnum};
use tokio::{
    net::TcpListener,
    sync::{broadcast::error::RecvError, watch},
};
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use emoji_quiz_back::{
    config::AppConfig,
    dao::{
        content::{ContentSource, movie_db::MovieDatabase},
        room_store::{RoomStore, memory::MemoryRoomStore},
    },
    ring::{
        Ring, RingEvent,
        probe::{HttpProbe, PeerProbe},
        resolver::{DockerResolver, DockerResolverConfig, PeerResolver, StaticResolver},
    },
    room::RoomDeps,
    routes,
    services::{
        lobby::{Lobby, RoomObserver},
        rebalancer::spawn_rebalancer,
        saver::Saver,
        storage_supervisor,
        supervisor::Supervisor,
    },
    state::{AppState, SharedState},
};

/// How peers are discovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ResolverKind {
    /// Peers listed on the command line.
    Static,
    /// Containers of the same image on a Docker network.
    Docker,
}

/// Where room snapshots are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum StoreKind {
    /// Process memory, lost on restart.
    Memory,
    /// CouchDB database.
    Couch,
}

/// Multiplayer emoji quiz node.
#[derive(Debug, Parser)]
#[command(name = "emoji-quiz-back", version)]
struct Args {
    /// Port to listen on.
    #[arg(long, env = "PORT", default_value_t = 8080)]
    port: u16,
    /// Address other nodes reach this one at, `127.0.0.1:<port>` when absent.
    #[arg(long, env = "ADVERTISE_ADDR")]
    advertise_addr: Option<String>,
    /// JSON configuration file.
    #[arg(long, env = "EMOJI_QUIZ_CONFIG_PATH")]
    config: Option<PathBuf>,
    /// Movie database used for categories and answers.
    #[arg(long, env = "CONTENT_PATH", default_value = "data/sample.json")]
    content: PathBuf,
    /// Peer discovery strategy.
    #[arg(long, env = "PEER_RESOLVER", value_enum, default_value_t = ResolverKind::Static)]
    resolver: ResolverKind,
    /// Static peers (`host:port`), comma separated.
    #[arg(long = "peer", env = "PEERS", value_delimiter = ',')]
    peers: Vec<String>,
    /// Docker Engine API.
    #[arg(long, env = "DOCKER_API_URL", default_value = "http://127.0.0.1:2375")]
    docker_api_url: String,
    /// Image run by the peer containers.
    #[arg(long, env = "DOCKER_IMAGE", default_value = "emoji-quiz-back")]
    docker_image: String,
    /// Docker network shared by the peers.
    #[arg(long, env = "DOCKER_NETWORK", default_value = "emoji-quiz")]
    docker_network: String,
    /// Hostname of this container, used to skip itself.
    #[arg(long, env = "HOSTNAME", default_value = "")]
    hostname: String,
    /// Room snapshot backend.
    #[arg(long, env = "ROOM_STORE", value_enum, default_value_t = StoreKind::Memory)]
    store: StoreKind,
    /// CouchDB server.
    #[arg(long, env = "COUCH_BASE_URL", default_value = "http://localhost:5984")]
    couch_base_url: String,
    /// CouchDB database.
    #[arg(long, env = "COUCH_DATABASE", default_value = "emoji_quiz")]
    couch_database: String,
    /// CouchDB user.
    #[arg(long, env = "COUCH_USERNAME")]
    couch_username: Option<String>,
    /// CouchDB password.
    #[arg(long, env = "COUCH_PASSWORD")]
    couch_password: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = Args::parse();

    let config = Arc::new(AppConfig::load(args.config.clone()));
    let store = build_store(&args, &config)?;
    let content: Arc<dyn ContentSource> = Arc::new(
        MovieDatabase::load(&args.content)
            .with_context(|| format!("loading content from {}", args.content.display()))?,
    );

    let me = args
        .advertise_addr
        .clone()
        .unwrap_or_else(|| format!("127.0.0.1:{}", args.port));
    let shutdown = CancellationToken::new();

    let ring = Ring::new(me, config.ring.clone());
    let rebalance_events = ring.subscribe();
    let ring_lost = watch_ring(ring.subscribe());

    let resolver = build_resolver(&args);
    let probe: Arc<dyn PeerProbe> = Arc::new(HttpProbe::new(config.ring.probe_timeout()));
    ring.join(resolver.as_ref(), probe.as_ref())
        .await
        .context("joining the ring")?;
    ring.spawn_membership_poll(resolver, probe, shutdown.clone());

    let deps = RoomDeps {
        config: Arc::new(config.game.clone()),
        content,
        event_capacity: config.lobby.event_capacity(),
    };
    let observers: Vec<Arc<dyn RoomObserver>> = vec![
        Arc::new(Saver::new(store.clone())),
        Arc::new(Supervisor::new(config.lobby.delete_room_delay())),
    ];
    let lobby = Lobby::new(ring.clone(), store.clone(), deps, observers);
    spawn_rebalancer(
        lobby.clone(),
        ring.clone(),
        rebalance_events,
        config.ring.rebalance_debounce(),
        shutdown.clone(),
    );

    // Degraded until the first successful ping.
    let (degraded_tx, degraded_rx) = watch::channel(true);
    tokio::spawn(storage_supervisor::run(
        store,
        degraded_tx,
        config.storage.health_poll_interval(),
        shutdown.clone(),
    ));

    let app_state = AppState::new(config, lobby.clone(), ring, degraded_rx);
    let app = build_router(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let stop = ring_lost.clone();
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async move {
            tokio::select! {
                _ = shutdown_signal() => {}
                _ = stop.cancelled() => {}
            }
        })
        .await
        .context("serving axum")?;

    shutdown.cancel();
    lobby.shutdown().await;

    if ring_lost.is_cancelled() {
        anyhow::bail!("ring membership lost");
    }
    Ok(())
}

fn build_store(args: &Args, config: &AppConfig) -> anyhow::Result<Arc<dyn RoomStore>> {
    let prefix = config.storage.room_save_prefix.clone();
    match args.store {
        StoreKind::Memory => {
            warn!("using in-memory room store; rooms will not survive a restart");
            Ok(Arc::new(MemoryRoomStore::new(prefix)))
        }
        #[cfg(feature = "couch-store")]
        StoreKind::Couch => {
            use emoji_quiz_back::dao::room_store::couchdb::{CouchConfig, CouchRoomStore};

            let mut couch = CouchConfig::new(&args.couch_base_url, &args.couch_database)
                .with_prefix(prefix);
            if let (Some(username), Some(password)) = (&args.couch_username, &args.couch_password) {
                couch = couch.with_credentials(username, password);
            }
            let store = CouchRoomStore::new(couch).context("configuring CouchDB store")?;
            info!(base_url = %args.couch_base_url, database = %args.couch_database, "using CouchDB room store");
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "couch-store"))]
        StoreKind::Couch => anyhow::bail!("built without the couch-store feature"),
    }
}

fn build_resolver(args: &Args) -> Arc<dyn PeerResolver> {
    match args.resolver {
        ResolverKind::Static => Arc::new(StaticResolver::new(args.peers.clone())),
        ResolverKind::Docker => Arc::new(DockerResolver::new(DockerResolverConfig {
            api_url: args.docker_api_url.clone(),
            image: args.docker_image.clone(),
            network: args.docker_network.clone(),
            port: args.port,
            hostname: args.hostname.clone(),
        })),
    }
}

/// Token cancelled once the ring reports it can no longer track membership.
fn watch_ring(mut events: tokio::sync::broadcast::Receiver<RingEvent>) -> CancellationToken {
    let lost = CancellationToken::new();
    let token = lost.clone();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(RingEvent::Error(reason)) => {
                    error!(reason = %reason, "ring failure; shutting down");
                    token.cancel();
                    break;
                }
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break,
            }
        }
    });
    lost
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
