//! Pure room reducer: `(snapshot, action) -> snapshot`.
//!
//! Every timestamp written here comes from the action payload, so replaying the
//! same action sequence always yields the same snapshot.

use thiserror::Error;

use crate::state::{
    action::RoomAction,
    room::{FoundRight, RoomPhase, RoomSnapshot, RoundState},
};

/// Error returned when an action's precondition does not hold.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{action} rejected while in {from:?}: {reason}")]
pub struct Rejected {
    /// Phase the room was in.
    pub from: RoomPhase,
    /// Name of the rejected action.
    pub action: &'static str,
    /// Failed precondition.
    pub reason: &'static str,
}

/// Apply `action` to `snapshot`, returning a new snapshot or why it was rejected.
///
/// Notifications that carry no state (leaderboard updates, hatch percentages,
/// requests) are always accepted and leave the snapshot unchanged.
pub fn apply(snapshot: &RoomSnapshot, action: &RoomAction) -> Result<RoomSnapshot, Rejected> {
    let reject = |reason: &'static str| Rejected {
        from: snapshot.state,
        action: action.name(),
        reason,
    };
    let mut next = snapshot.clone();

    match (snapshot.state, action) {
        (_, RoomAction::RoomInit { id, created_at }) => {
            next.id = Some(id.clone());
            next.created_at = Some(*created_at);
        }
        (_, RoomAction::RoomResume) => {
            next.online.clear();
        }
        (_, RoomAction::UserConnected { user, time }) => {
            next.users
                .entry(user.id.clone())
                .or_insert_with(|| user.clone());
            next.online.insert(user.id.clone(), *time);
            next.leaderboard.entry(user.id.clone()).or_insert(0);
        }
        (_, RoomAction::UserDisconnected { user_id }) => {
            if next.online.remove(user_id).is_none() {
                return Err(reject("user is not online"));
            }
        }
        (
            RoomPhase::Idle,
            RoomAction::RoundStartSuccess {
                teller,
                categories,
                started_at,
            },
        ) => {
            next.state = RoomPhase::RoundPickAnswer;
            next.round += 1;
            next.round_state = RoundState {
                teller: Some(teller.clone()),
                answer: None,
                titles: None,
            };
            next.pick_state.categories = Some(categories.clone());
            next.pick_state.picked = None;
            next.found_right.clear();
            next.last_round_started_at = Some(*started_at);
        }
        (RoomPhase::RoundPickAnswer, RoomAction::TellerPickAnswerSuccess { category, .. }) => {
            if next.pick_state.picked.is_some() {
                return Err(reject("a category is already picked"));
            }
            let offered = next
                .pick_state
                .categories
                .as_ref()
                .is_some_and(|categories| categories.contains_key(category));
            if !offered {
                return Err(reject("category was not offered"));
            }
            next.pick_state.picked = Some(category.clone());
        }
        (RoomPhase::RoundPickAnswer, RoomAction::RoundInProgressSuccess { answer, titles }) => {
            if next.pick_state.picked.is_none() {
                return Err(reject("no category picked"));
            }
            next.state = RoomPhase::RoundInProgress;
            next.round_state.answer = Some(answer.clone());
            next.round_state.titles = Some(titles.clone());
        }
        (
            RoomPhase::RoundPickAnswer | RoomPhase::RoundInProgress,
            RoomAction::RoundEndSuccess { ended_at },
        ) => {
            next.state = RoomPhase::RoundFinished;
            next.round_state = RoundState::default();
            next.last_round_ended_at = Some(*ended_at);
        }
        (RoomPhase::RoundFinished, RoomAction::RoundEndStateWaitCompleted) => {
            next.state = RoomPhase::Idle;
        }
        (RoomPhase::RoundInProgress, RoomAction::RightAnswerFound { user_id, time }) => {
            if !next.users.contains_key(user_id) {
                return Err(reject("unknown user"));
            }
            if next.found_right.contains_key(user_id) {
                return Err(reject("answer already found by user"));
            }
            next.found_right
                .insert(user_id.clone(), FoundRight { time: *time });
        }
        (_, RoomAction::AddUserLeaderboardPoints { user_id, points }) => {
            if !next.users.contains_key(user_id) {
                return Err(reject("unknown user"));
            }
            *next.leaderboard.entry(user_id.clone()).or_insert(0) += points;
        }
        (_, RoomAction::WrongAnswerFound { user_id, .. }) => {
            let Some(user) = next.users.get_mut(user_id) else {
                return Err(reject("unknown user"));
            };
            user.hatch = user.hatch.saturating_sub(1);
        }
        (_, RoomAction::RefreshUsersHatch { limit }) => {
            for user in next.users.values_mut() {
                user.hatch = *limit;
            }
        }
        (
            _,
            RoomAction::SocketUserConnected { .. }
            | RoomAction::SocketUserDisconnected { .. }
            | RoomAction::SocketUserSay { .. }
            | RoomAction::SocketUserPickAnswer { .. }
            | RoomAction::HaveEnoughPlayers
            | RoomAction::RoundStartRequest
            | RoomAction::RoundStartFailed { .. }
            | RoomAction::TellerPickAnswerFailed { .. }
            | RoomAction::RoundInProgressFailed { .. }
            | RoomAction::RoundEndRequest
            | RoomAction::RoundEndFailed { .. }
            | RoomAction::LeaderboardUpdate
            | RoomAction::UserHatchPercentage { .. },
        ) => {}
        (
            _,
            RoomAction::RoundStartSuccess { .. }
            | RoomAction::TellerPickAnswerSuccess { .. }
            | RoomAction::RoundInProgressSuccess { .. }
            | RoomAction::RoundEndSuccess { .. }
            | RoomAction::RoundEndStateWaitCompleted
            | RoomAction::RightAnswerFound { .. },
        ) => return Err(reject("invalid transition")),
    }

    Ok(next)
}

/// Apply `action`, keeping the snapshot unchanged when it is rejected.
pub fn reduce(snapshot: &RoomSnapshot, action: &RoomAction) -> RoomSnapshot {
    apply(snapshot, action).unwrap_or_else(|_| snapshot.clone())
}

#[cfg(test)]
mod tests {
    use indexmap::IndexMap;

    use super::*;
    use crate::{
        dao::content::models::{Answer, AnswerTitle, Category, CategoryType},
        state::room::User,
    };

    fn user(id: &str) -> User {
        User {
            id: id.into(),
            name: format!("user#{id}"),
            created_at: 1,
            hatch: 20,
        }
    }

    fn connect(room: &RoomSnapshot, id: &str, time: i64) -> RoomSnapshot {
        reduce(
            room,
            &RoomAction::UserConnected {
                user: user(id),
                time,
            },
        )
    }

    fn categories() -> IndexMap<String, Category> {
        ["drama", "western", "kubrick"]
            .into_iter()
            .map(|id| {
                (
                    id.to_string(),
                    Category {
                        id: id.into(),
                        name: id.into(),
                        kind: CategoryType::Genre,
                    },
                )
            })
            .collect()
    }

    fn answer() -> Answer {
        Answer {
            id: "a1".into(),
            title: AnswerTitle {
                primary: "The Matrix".into(),
                ..AnswerTitle::default()
            },
            categories: Vec::new(),
        }
    }

    fn start(room: &RoomSnapshot, teller: &str) -> RoomSnapshot {
        apply(
            room,
            &RoomAction::RoundStartSuccess {
                teller: teller.into(),
                categories: categories(),
                started_at: 100,
            },
        )
        .unwrap()
    }

    fn full_round() -> Vec<RoomAction> {
        vec![
            RoomAction::RoomInit {
                id: "r1".into(),
                created_at: 1,
            },
            RoomAction::UserConnected {
                user: user("a"),
                time: 2,
            },
            RoomAction::UserConnected {
                user: user("b"),
                time: 3,
            },
            RoomAction::RoundStartSuccess {
                teller: "a".into(),
                categories: categories(),
                started_at: 4,
            },
            RoomAction::TellerPickAnswerSuccess {
                category: "drama".into(),
                automatic: false,
            },
            RoomAction::RoundInProgressSuccess {
                answer: answer(),
                titles: vec!["thematrix".into()],
            },
            RoomAction::WrongAnswerFound {
                user_id: "b".into(),
                message: "alien".into(),
                time: 5,
            },
            RoomAction::AddUserLeaderboardPoints {
                user_id: "b".into(),
                points: 19,
            },
            RoomAction::RightAnswerFound {
                user_id: "b".into(),
                time: 6,
            },
            RoomAction::RoundEndSuccess { ended_at: 7 },
            RoomAction::RoundEndStateWaitCompleted,
            RoomAction::UserDisconnected {
                user_id: "a".into(),
            },
        ]
    }

    #[test]
    fn replaying_the_same_actions_is_deterministic() {
        let run = || {
            full_round()
                .iter()
                .fold(RoomSnapshot::default(), |room, action| reduce(&room, action))
        };
        let first = run();
        assert_eq!(first, run());
        assert_eq!(first.state, RoomPhase::Idle);
        assert_eq!(first.round, 1);
        assert_eq!(first.leaderboard["b"], 19);
        assert_eq!(first.users["b"].hatch, 19);
        assert_eq!(first.last_round_started_at, Some(4));
        assert_eq!(first.last_round_ended_at, Some(7));
    }

    #[test]
    fn round_start_only_from_idle() {
        let room = connect(&connect(&RoomSnapshot::default(), "a", 1), "b", 2);
        let started = start(&room, "a");
        assert_eq!(started.state, RoomPhase::RoundPickAnswer);
        assert_eq!(started.round, 1);
        assert_eq!(started.teller(), Some("a"));

        let err = apply(
            &started,
            &RoomAction::RoundStartSuccess {
                teller: "b".into(),
                categories: categories(),
                started_at: 200,
            },
        )
        .unwrap_err();
        assert_eq!(err.from, RoomPhase::RoundPickAnswer);
        assert_eq!(reduce(&started, &RoomAction::RoundStartRequest), started);
    }

    #[test]
    fn round_start_clears_previous_correct_answers() {
        let mut room = connect(&RoomSnapshot::default(), "a", 1);
        room.found_right.insert("a".into(), FoundRight { time: 3 });
        let started = start(&room, "a");
        assert!(started.found_right.is_empty());
    }

    #[test]
    fn pick_is_accepted_once_and_only_for_offered_categories() {
        let room = start(&connect(&RoomSnapshot::default(), "a", 1), "a");
        assert!(
            apply(
                &room,
                &RoomAction::TellerPickAnswerSuccess {
                    category: "horror".into(),
                    automatic: false,
                }
            )
            .is_err()
        );

        let picked = apply(
            &room,
            &RoomAction::TellerPickAnswerSuccess {
                category: "western".into(),
                automatic: false,
            },
        )
        .unwrap();
        assert_eq!(picked.pick_state.picked.as_deref(), Some("western"));
        assert_eq!(picked.state, RoomPhase::RoundPickAnswer);

        assert!(
            apply(
                &picked,
                &RoomAction::TellerPickAnswerSuccess {
                    category: "drama".into(),
                    automatic: true,
                }
            )
            .is_err()
        );
    }

    #[test]
    fn in_progress_requires_a_pick() {
        let room = start(&connect(&RoomSnapshot::default(), "a", 1), "a");
        let in_progress = RoomAction::RoundInProgressSuccess {
            answer: answer(),
            titles: vec!["thematrix".into()],
        };
        assert!(apply(&room, &in_progress).is_err());

        let picked = reduce(
            &room,
            &RoomAction::TellerPickAnswerSuccess {
                category: "drama".into(),
                automatic: false,
            },
        );
        let running = apply(&picked, &in_progress).unwrap();
        assert_eq!(running.state, RoomPhase::RoundInProgress);
        assert_eq!(
            running.round_state.titles,
            Some(vec!["thematrix".to_string()])
        );
    }

    #[test]
    fn round_end_from_pick_or_progress_clears_round_state() {
        let room = start(&connect(&RoomSnapshot::default(), "a", 1), "a");
        let ended = apply(&room, &RoomAction::RoundEndSuccess { ended_at: 9 }).unwrap();
        assert_eq!(ended.state, RoomPhase::RoundFinished);
        assert_eq!(ended.round_state, RoundState::default());

        assert!(apply(&ended, &RoomAction::RoundEndSuccess { ended_at: 10 }).is_err());
        assert!(
            apply(
                &RoomSnapshot::default(),
                &RoomAction::RoundEndStateWaitCompleted
            )
            .is_err()
        );
        let idle = apply(&ended, &RoomAction::RoundEndStateWaitCompleted).unwrap();
        assert_eq!(idle.state, RoomPhase::Idle);
    }

    #[test]
    fn disconnect_keeps_user_and_leaderboard() {
        let mut room = connect(&RoomSnapshot::default(), "a", 1);
        room = reduce(
            &room,
            &RoomAction::AddUserLeaderboardPoints {
                user_id: "a".into(),
                points: 7,
            },
        );
        let gone = apply(
            &room,
            &RoomAction::UserDisconnected {
                user_id: "a".into(),
            },
        )
        .unwrap();
        assert!(gone.online.is_empty());
        assert!(gone.users.contains_key("a"));
        assert_eq!(gone.leaderboard["a"], 7);
        assert!(
            apply(
                &gone,
                &RoomAction::UserDisconnected {
                    user_id: "a".into()
                }
            )
            .is_err()
        );
    }

    #[test]
    fn reconnect_preserves_hatch_and_score() {
        let mut room = connect(&RoomSnapshot::default(), "a", 1);
        room = reduce(
            &room,
            &RoomAction::WrongAnswerFound {
                user_id: "a".into(),
                message: "nope".into(),
                time: 2,
            },
        );
        room = reduce(
            &room,
            &RoomAction::AddUserLeaderboardPoints {
                user_id: "a".into(),
                points: 3,
            },
        );
        room = reduce(
            &room,
            &RoomAction::UserDisconnected {
                user_id: "a".into(),
            },
        );
        let back = connect(&room, "a", 10);
        assert_eq!(back.users["a"].hatch, 19);
        assert_eq!(back.leaderboard["a"], 3);
        assert_eq!(back.online["a"], 10);
    }

    #[test]
    fn online_is_always_a_subset_of_users() {
        let room = full_round()
            .iter()
            .fold(RoomSnapshot::default(), |room, action| {
                let next = reduce(&room, action);
                assert!(next.online.keys().all(|id| next.users.contains_key(id)));
                next
            });
        assert!(room.online.keys().all(|id| room.users.contains_key(id)));
    }

    #[test]
    fn hatch_never_goes_below_zero_and_refresh_resets_everyone() {
        let mut room = connect(&connect(&RoomSnapshot::default(), "a", 1), "b", 1);
        room.users.get_mut("a").unwrap().hatch = 0;
        room = reduce(
            &room,
            &RoomAction::WrongAnswerFound {
                user_id: "a".into(),
                message: "x".into(),
                time: 1,
            },
        );
        assert_eq!(room.users["a"].hatch, 0);

        room = reduce(&room, &RoomAction::RefreshUsersHatch { limit: 12 });
        assert!(room.users.values().all(|user| user.hatch == 12));
    }

    #[test]
    fn right_answer_only_counts_once_per_round() {
        let room = full_round()[..6]
            .iter()
            .fold(RoomSnapshot::default(), |room, action| reduce(&room, action));
        let found = RoomAction::RightAnswerFound {
            user_id: "b".into(),
            time: 8,
        };
        let once = apply(&room, &found).unwrap();
        assert_eq!(once.found_right["b"].time, 8);
        assert!(apply(&once, &found).is_err());
    }

    #[test]
    fn resume_round_trip_only_clears_online() {
        let room = full_round()[..6]
            .iter()
            .fold(RoomSnapshot::default(), |room, action| reduce(&room, action));
        let persisted = serde_json::to_string(&room).unwrap();
        let restored: RoomSnapshot = serde_json::from_str(&persisted).unwrap();
        let resumed = reduce(&restored.sanitized(), &RoomAction::RoomResume);

        let expected = RoomSnapshot {
            online: Default::default(),
            ..room.clone()
        };
        assert_eq!(resumed, expected);
        assert_eq!(resumed.round, room.round);
    }
}
