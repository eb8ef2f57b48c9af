#![allow(dead_code)]

use std::{sync::Arc, time::Duration};

use emoji_quiz_back::{
    config::GameConfig,
    dao::content::{ContentSource, movie_db::MovieDatabase},
    room::{RoomDeps, RoomEvent},
    state::action::RoomAction,
};
use tokio::sync::broadcast::{self, error::RecvError};

/// Every category holds the same movie, so any pick leads to it.
pub const MOVIES: &str = r#"{
  "categories": [
    {"id": "drama", "name": "Drama", "type": "genre", "answers": ["matrix"]},
    {"id": "scifi", "name": "Science fiction", "type": "genre", "answers": ["matrix"]},
    {"id": "wachowski", "name": "The Wachowskis", "type": "director", "answers": ["matrix"]}
  ],
  "answers": [
    {
      "id": "matrix",
      "title": {
        "primary": "The Matrix",
        "original": "The Matrix",
        "localized": {"fr": {"original": "Matrix"}}
      },
      "categories": ["drama", "scifi", "wachowski"]
    }
  ]
}"#;

pub fn content() -> Arc<dyn ContentSource> {
    Arc::new(MovieDatabase::from_json_str(MOVIES).unwrap())
}

pub fn game_config() -> GameConfig {
    GameConfig::default()
}

pub fn deps() -> RoomDeps {
    RoomDeps {
        config: Arc::new(game_config()),
        content: content(),
        event_capacity: 256,
    }
}

pub fn connect(user_id: &str) -> RoomAction {
    RoomAction::SocketUserConnected {
        user_id: user_id.into(),
        name: Some(user_id.to_uppercase()),
        time: 1,
    }
}

pub fn disconnect(user_id: &str) -> RoomAction {
    RoomAction::SocketUserDisconnected {
        user_id: user_id.into(),
    }
}

/// Next accepted event matching `pred`; paused time auto-advances through room timers.
pub async fn next_accepted(
    events: &mut broadcast::Receiver<Arc<RoomEvent>>,
    pred: impl Fn(&RoomAction) -> bool,
) -> Arc<RoomEvent> {
    tokio::time::timeout(Duration::from_secs(600), async {
        loop {
            match events.recv().await {
                Ok(event) if event.accepted && pred(&event.action) => return event,
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => panic!("room feed closed"),
            }
        }
    })
    .await
    .expect("expected room event was not observed")
}
