//! Application-level configuration loading: game timers, lobby, storage and ring tuning.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "EMOJI_QUIZ_CONFIG_PATH";

/// Immutable runtime configuration shared across the application.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Gameplay rules and timers.
    pub game: GameConfig,
    /// Room registry tuning.
    pub lobby: LobbyConfig,
    /// Persistence settings.
    pub storage: StorageConfig,
    /// Membership ring tuning.
    pub ring: RingConfig,
}

/// Gameplay rules and timers of every room.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Hatch budget given to every player each round.
    pub hatch_limit: u32,
    /// Connected players needed to auto-start a round.
    pub enough_player_count: usize,
    /// Maximum duration of a round.
    pub round_play_time_ms: u64,
    /// Pause between the end of a round and the next one.
    pub round_restart_time_ms: u64,
    /// Delay before ending a round once a single player is left.
    pub not_enough_players_round_end_timeout_ms: u64,
    /// Extra time given to the others after the first correct answer.
    pub round_play_time_after_first_user_won_ms: u64,
    /// Time the teller has to pick a category before one is picked for them.
    pub teller_pick_time_ms: u64,
    /// Genre categories offered to the teller.
    pub genre_category_count: usize,
    /// Director categories offered to the teller.
    pub director_category_count: usize,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            hatch_limit: 20,
            enough_player_count: 2,
            round_play_time_ms: 90_000,
            round_restart_time_ms: 5_000,
            not_enough_players_round_end_timeout_ms: 5_000,
            round_play_time_after_first_user_won_ms: 10_000,
            teller_pick_time_ms: 15_000,
            genre_category_count: 2,
            director_category_count: 1,
        }
    }
}

impl GameConfig {
    /// Maximum duration of a round.
    pub fn round_play_time(&self) -> Duration {
        Duration::from_millis(self.round_play_time_ms)
    }

    /// Pause between rounds.
    pub fn round_restart_time(&self) -> Duration {
        Duration::from_millis(self.round_restart_time_ms)
    }

    /// Delay before ending a round with a single player left.
    pub fn not_enough_players_timeout(&self) -> Duration {
        Duration::from_millis(self.not_enough_players_round_end_timeout_ms)
    }

    /// Grace period after the first correct answer.
    pub fn after_first_win_time(&self) -> Duration {
        Duration::from_millis(self.round_play_time_after_first_user_won_ms)
    }

    /// Teller pick window.
    pub fn teller_pick_time(&self) -> Duration {
        Duration::from_millis(self.teller_pick_time_ms)
    }
}

/// Room registry tuning.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LobbyConfig {
    /// Grace period before an empty room is removed.
    pub delete_room_delay_ms: u64,
    /// Capacity of each room's client event feed; raised to [`MIN_ROOM_EVENT_CAPACITY`].
    pub room_event_capacity: usize,
}

/// Smallest client event feed a room runs with.
pub const MIN_ROOM_EVENT_CAPACITY: usize = 64;

impl Default for LobbyConfig {
    fn default() -> Self {
        Self {
            delete_room_delay_ms: 10_000,
            room_event_capacity: 256,
        }
    }
}

impl LobbyConfig {
    /// Grace period before an empty room is removed.
    pub fn delete_room_delay(&self) -> Duration {
        Duration::from_millis(self.delete_room_delay_ms)
    }

    /// Client event feed capacity, never below [`MIN_ROOM_EVENT_CAPACITY`].
    pub fn event_capacity(&self) -> usize {
        self.room_event_capacity.max(MIN_ROOM_EVENT_CAPACITY)
    }
}

/// Persistence settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Prefix of persisted room keys (`<prefix>#<roomId>`).
    pub room_save_prefix: String,
    /// Interval between storage health pings.
    pub health_poll_interval_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            room_save_prefix: crate::dao::room_store::DEFAULT_ROOM_PREFIX.to_string(),
            health_poll_interval_ms: 5_000,
        }
    }
}

impl StorageConfig {
    /// Interval between storage health pings.
    pub fn health_poll_interval(&self) -> Duration {
        Duration::from_millis(self.health_poll_interval_ms)
    }
}

/// Membership ring tuning.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RingConfig {
    /// Virtual nodes placed on the ring per member.
    pub virtual_nodes: u32,
    /// Quiet window before rooms are rebalanced after a membership change.
    pub rebalance_debounce_ms: u64,
    /// Interval between membership polls.
    pub poll_interval_ms: u64,
    /// Timeout of a single peer probe.
    pub probe_timeout_ms: u64,
    /// Consecutive failed polls tolerated before the ring reports a terminal error.
    pub max_consecutive_failures: u32,
}

impl Default for RingConfig {
    fn default() -> Self {
        Self {
            virtual_nodes: 64,
            rebalance_debounce_ms: 1_000,
            poll_interval_ms: 2_000,
            probe_timeout_ms: 1_000,
            max_consecutive_failures: 3,
        }
    }
}

impl RingConfig {
    /// Quiet window before rebalancing.
    pub fn rebalance_debounce(&self) -> Duration {
        Duration::from_millis(self.rebalance_debounce_ms)
    }

    /// Interval between membership polls.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Timeout of a single peer probe.
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

impl AppConfig {
    /// Load the configuration from disk, falling back to built-in defaults.
    ///
    /// `path` takes precedence over the environment override and the default location.
    pub fn load(path: Option<PathBuf>) -> Self {
        let path = path.unwrap_or_else(resolve_config_path);
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<AppConfig>(&contents) {
                Ok(config) => {
                    info!(path = %path.display(), "loaded configuration");
                    config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
