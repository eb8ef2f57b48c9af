mod common;

use std::{sync::Arc, time::Duration};

use emoji_quiz_back::{
    dao::content::models::{Answer, AnswerTitle},
    dto::ws::ServerEvent,
    room::{RoomDeps, RoomEvent, RoomInstance, answers::accepted_titles, now_millis},
    services::protocol::outbound_events,
    state::{
        action::RoomAction,
        room::{RoomPhase, RoomSnapshot, User},
    },
};
use tokio::{sync::broadcast, time::Instant};

use common::{connect, deps, disconnect, game_config, next_accepted};

fn init(id: &str) -> RoomAction {
    RoomAction::RoomInit {
        id: id.into(),
        created_at: 1,
    }
}

/// Spawn a room, connect `a` and `b` and wait for the automatic round start.
async fn started_room() -> (
    Arc<RoomInstance>,
    broadcast::Receiver<Arc<RoomEvent>>,
    String,
    String,
) {
    let room = RoomInstance::spawn("r1", RoomSnapshot::default(), deps());
    let mut events = room.subscribe();
    room.dispatch(init("r1")).unwrap();
    room.dispatch(connect("a")).unwrap();
    room.dispatch(connect("b")).unwrap();

    let started = next_accepted(&mut events, |action| {
        matches!(action, RoomAction::RoundStartSuccess { .. })
    })
    .await;
    let teller = started.state.teller().unwrap().to_string();
    let guesser = if teller == "a" { "b" } else { "a" }.to_string();
    (room, events, teller, guesser)
}

#[tokio::test(start_paused = true)]
async fn two_players_start_a_round_and_only_the_teller_gets_categories() {
    let room = RoomInstance::spawn("r1", RoomSnapshot::default(), deps());
    let mut events = room.subscribe();
    room.dispatch(init("r1")).unwrap();
    room.dispatch(connect("a")).unwrap();
    room.dispatch(connect("b")).unwrap();

    let started = next_accepted(&mut events, |action| {
        matches!(action, RoomAction::RoundStartSuccess { .. })
    })
    .await;

    let state = &started.state;
    assert_eq!(state.round, 1);
    assert_eq!(state.state, RoomPhase::RoundPickAnswer);
    assert_eq!(state.pick_state.categories.as_ref().unwrap().len(), 3);

    let teller = state.teller().unwrap();
    let guesser = if teller == "a" { "b" } else { "a" };

    let teller_frames = outbound_events(teller, &started);
    assert!(teller_frames.iter().any(
        |frame| matches!(frame, ServerEvent::ChooseCategory { categories } if categories.len() == 3)
    ));
    let guesser_frames = outbound_events(guesser, &started);
    assert!(
        !guesser_frames
            .iter()
            .any(|frame| matches!(frame, ServerEvent::ChooseCategory { .. }))
    );
    assert!(matches!(guesser_frames.as_slice(), [ServerEvent::RoundStart { round: 1, .. }]));
}

#[tokio::test(start_paused = true)]
async fn correct_guess_scores_and_ends_the_round_after_the_grace_period() {
    let (room, mut events, teller, guesser) = started_room().await;

    room.dispatch(RoomAction::SocketUserPickAnswer {
        user_id: teller.clone(),
        category: "drama".into(),
        time: 2,
    })
    .unwrap();
    let in_progress = next_accepted(&mut events, |action| {
        matches!(action, RoomAction::RoundInProgressSuccess { .. })
    })
    .await;
    assert_eq!(in_progress.state.state, RoomPhase::RoundInProgress);
    assert!(matches!(
        outbound_events(&teller, &in_progress).as_slice(),
        [ServerEvent::TellAnswer(answer)] if answer.id == "matrix"
    ));
    assert!(outbound_events(&guesser, &in_progress).is_empty());

    room.dispatch(RoomAction::SocketUserSay {
        user_id: guesser.clone(),
        message: "  the MATRIX! ".into(),
        time: 3,
    })
    .unwrap();
    let found = next_accepted(&mut events, |action| {
        matches!(action, RoomAction::RightAnswerFound { .. })
    })
    .await;
    let hinted = Instant::now();
    assert!(found.state.found_right.contains_key(&guesser));
    assert_eq!(
        found.state.leaderboard[&guesser],
        u64::from(game_config().hatch_limit)
    );
    assert_eq!(found.state.leaderboard[&teller], 0);

    let ended = next_accepted(&mut events, |action| {
        matches!(action, RoomAction::RoundEndSuccess { .. })
    })
    .await;
    assert!(hinted.elapsed() >= game_config().after_first_win_time());
    assert!(hinted.elapsed() < game_config().round_play_time());
    assert_eq!(ended.state.state, RoomPhase::RoundFinished);
    assert!(matches!(
        outbound_events(&guesser, &ended).as_slice(),
        [ServerEvent::RoundEnd { answer: Some(answer) }] if answer.id == "matrix"
    ));

    let restarted = next_accepted(&mut events, |action| {
        matches!(action, RoomAction::RoundStartSuccess { .. })
    })
    .await;
    assert_eq!(restarted.state.round, 2);
    assert_eq!(restarted.state.leaderboard[&guesser], u64::from(game_config().hatch_limit));
    assert!(restarted.state.found_right.is_empty());
}

#[tokio::test(start_paused = true)]
async fn wrong_guesses_cost_hatch_and_a_second_right_answer_is_ignored() {
    let (room, mut events, teller, guesser) = started_room().await;
    room.dispatch(RoomAction::SocketUserPickAnswer {
        user_id: teller.clone(),
        category: "scifi".into(),
        time: 2,
    })
    .unwrap();
    next_accepted(&mut events, |action| {
        matches!(action, RoomAction::RoundInProgressSuccess { .. })
    })
    .await;

    room.dispatch(RoomAction::SocketUserSay {
        user_id: guesser.clone(),
        message: "heat".into(),
        time: 3,
    })
    .unwrap();
    let hatch = next_accepted(&mut events, |action| {
        matches!(action, RoomAction::UserHatchPercentage { .. })
    })
    .await;
    assert!(matches!(
        &hatch.action,
        RoomAction::UserHatchPercentage { hatch_percentage: 5, .. }
    ));

    room.dispatch(RoomAction::SocketUserSay {
        user_id: guesser.clone(),
        message: "matrix".into(),
        time: 4,
    })
    .unwrap();
    room.dispatch(RoomAction::SocketUserSay {
        user_id: guesser.clone(),
        message: "the matrix".into(),
        time: 5,
    })
    .unwrap();

    let ended = next_accepted(&mut events, |action| {
        matches!(action, RoomAction::RoundEndSuccess { .. })
    })
    .await;
    let expected = u64::from(game_config().hatch_limit - 1);
    assert_eq!(ended.state.leaderboard[&guesser], expected);
}

#[tokio::test(start_paused = true)]
async fn round_ends_when_a_single_player_is_left() {
    let (room, mut events, _teller, guesser) = started_room().await;
    let left = Instant::now();
    room.dispatch(disconnect(&guesser)).unwrap();

    let ended = next_accepted(&mut events, |action| {
        matches!(action, RoomAction::RoundEndSuccess { .. })
    })
    .await;
    assert!(left.elapsed() >= game_config().not_enough_players_timeout());
    assert!(left.elapsed() < game_config().teller_pick_time());
    assert_eq!(ended.state.online_count(), 1);
    assert!(ended.state.users.contains_key(&guesser));
    assert!(ended.state.leaderboard.contains_key(&guesser));
}

#[tokio::test(start_paused = true)]
async fn silent_teller_gets_a_category_picked_automatically() {
    let (_room, mut events, _teller, _guesser) = started_room().await;
    let offered = Instant::now();

    let picked = next_accepted(&mut events, |action| {
        matches!(action, RoomAction::TellerPickAnswerSuccess { .. })
    })
    .await;
    assert!(offered.elapsed() >= game_config().teller_pick_time());
    let RoomAction::TellerPickAnswerSuccess { category, automatic } = &picked.action else {
        unreachable!();
    };
    assert!(*automatic);
    assert!(
        picked
            .state
            .pick_state
            .categories
            .as_ref()
            .unwrap()
            .contains_key(category)
    );

    next_accepted(&mut events, |action| {
        matches!(action, RoomAction::RoundInProgressSuccess { .. })
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn pick_from_a_guesser_is_refused() {
    let (room, mut events, _teller, guesser) = started_room().await;
    room.dispatch(RoomAction::SocketUserPickAnswer {
        user_id: guesser.clone(),
        category: "drama".into(),
        time: 2,
    })
    .unwrap();
    let refused = next_accepted(&mut events, |action| {
        matches!(action, RoomAction::TellerPickAnswerFailed { .. })
    })
    .await;
    assert!(refused.state.pick_state.picked.is_none());
}

#[tokio::test(start_paused = true)]
async fn resumed_round_clears_presence_and_ends_without_players() {
    let answer = Answer {
        id: "matrix".into(),
        title: AnswerTitle {
            primary: "The Matrix".into(),
            ..AnswerTitle::default()
        },
        categories: Vec::new(),
    };
    let mut persisted = RoomSnapshot {
        id: Some("r9".into()),
        state: RoomPhase::RoundInProgress,
        round: 3,
        last_round_started_at: Some(now_millis() - 1_000),
        ..RoomSnapshot::default()
    };
    persisted.round_state.teller = Some("a".into());
    persisted.round_state.titles = Some(accepted_titles(&answer));
    persisted.round_state.answer = Some(answer);
    persisted.pick_state.picked = Some("drama".into());
    for id in ["a", "b"] {
        persisted.users.insert(
            id.into(),
            User {
                id: id.into(),
                name: id.into(),
                created_at: 1,
                hatch: 20,
            },
        );
        persisted.online.insert(id.into(), 1);
        persisted.leaderboard.insert(id.into(), 7);
    }

    let room = RoomInstance::spawn("r9", persisted.sanitized(), deps());
    let mut events = room.subscribe();
    let resumed_at = Instant::now();
    room.dispatch(RoomAction::RoomResume).unwrap();

    let resumed = next_accepted(&mut events, |action| matches!(action, RoomAction::RoomResume)).await;
    assert!(resumed.state.online.is_empty());
    assert_eq!(resumed.state.round, 3);
    assert_eq!(resumed.state.leaderboard["b"], 7);

    let ended = next_accepted(&mut events, |action| {
        matches!(action, RoomAction::RoundEndSuccess { .. })
    })
    .await;
    assert!(resumed_at.elapsed() >= game_config().not_enough_players_timeout());
    assert!(resumed_at.elapsed() < Duration::from_secs(60));
    assert_eq!(ended.state.round, 3);
    assert_eq!(ended.state.state, RoomPhase::RoundFinished);
}

#[tokio::test(start_paused = true)]
async fn returning_player_keeps_the_round_running() {
    let (room, mut events, _teller, guesser) = started_room().await;
    let started = Instant::now();
    room.dispatch(disconnect(&guesser)).unwrap();
    tokio::time::sleep(game_config().not_enough_players_timeout() / 2).await;
    room.dispatch(connect(&guesser)).unwrap();

    let ended = next_accepted(&mut events, |action| {
        matches!(action, RoomAction::RoundEndSuccess { .. })
    })
    .await;
    assert!(started.elapsed() >= game_config().round_play_time());
    assert_eq!(ended.state.online_count(), 2);
    assert_eq!(ended.state.round, 1);
}

#[tokio::test(start_paused = true)]
async fn lone_player_room_goes_back_to_idle_after_the_pause() {
    let (room, mut events, _teller, guesser) = started_room().await;
    room.dispatch(disconnect(&guesser)).unwrap();

    next_accepted(&mut events, |action| {
        matches!(action, RoomAction::RoundEndSuccess { .. })
    })
    .await;
    let waited = next_accepted(&mut events, |action| {
        matches!(action, RoomAction::RoundEndStateWaitCompleted)
    })
    .await;
    assert_eq!(waited.state.state, RoomPhase::Idle);

    tokio::time::sleep(game_config().round_play_time() * 2).await;
    let snapshot = room.snapshot();
    assert_eq!(snapshot.state, RoomPhase::Idle);
    assert_eq!(snapshot.round, 1);
}

#[tokio::test(start_paused = true)]
async fn chat_flood_does_not_make_rules_miss_the_round_end() {
    let room = RoomInstance::spawn(
        "r1",
        RoomSnapshot::default(),
        RoomDeps {
            event_capacity: 8,
            ..deps()
        },
    );
    let mut state = room.watch_state();
    room.dispatch(init("r1")).unwrap();
    room.dispatch(connect("a")).unwrap();
    room.dispatch(connect("b")).unwrap();
    state
        .wait_for(|room| room.state == RoomPhase::RoundPickAnswer)
        .await
        .unwrap();

    let say = |time| RoomAction::SocketUserSay {
        user_id: "a".into(),
        message: "🍿".into(),
        time,
    };
    for time in 0..200 {
        room.dispatch(say(time)).unwrap();
    }
    room.dispatch(RoomAction::RoundEndRequest).unwrap();
    for time in 200..400 {
        room.dispatch(say(time)).unwrap();
    }

    let restarted = tokio::time::timeout(
        game_config().round_restart_time() * 2,
        state.wait_for(|room| room.round == 2),
    )
    .await
    .expect("room did not restart after the flood");
    assert_eq!(restarted.unwrap().state, RoomPhase::RoundPickAnswer);
}
