//! End-to-end meetup flow and concurrency properties against the
//! in-process stores.

#![allow(clippy::panic)]

use std::sync::Arc;

use chrono::{Duration, Utc};
use meetup_gateway::app_state::AppState;
use meetup_gateway::config::MeetupSettings;
use meetup_gateway::domain::{
    Clock, ConfirmationState, Coord, EventBus, ManualClock, MeetupEvent, PositionSample,
    SessionId, SessionStatus, UserId, Venue, VenueKind,
};
use meetup_gateway::error::MeetupError;
use meetup_gateway::service::UpdateOutcome;

const TARGET_LAT: f64 = 10.0;
const TARGET_LON: f64 = 106.0;

/// Latitude offset of roughly one meter at the target.
const METER: f64 = 1.0 / 111_195.0;

fn venue() -> Venue {
    let Ok(location) = Coord::new(TARGET_LAT, TARGET_LON) else {
        panic!("valid coordinate");
    };
    Venue {
        kind: VenueKind::HotSpot,
        venue_id: "hs-rooftop".into(),
        name: Some("Rooftop bar".into()),
        location,
    }
}

fn state() -> (AppState, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let Ok(state) = AppState::with_clock(
        EventBus::new(1024),
        MeetupSettings::default(),
        Arc::clone(&clock) as Arc<dyn Clock>,
    ) else {
        panic!("valid settings");
    };
    (state, clock)
}

fn at_distance(meters_north: f64, clock: &ManualClock) -> PositionSample {
    clock.advance(Duration::seconds(10));
    PositionSample {
        latitude: TARGET_LAT + meters_north * METER,
        longitude: TARGET_LON,
        accuracy: Some(5.0),
        captured_at: clock.now(),
    }
}

fn a() -> UserId {
    "uidA".into()
}

fn b() -> UserId {
    "uidB".into()
}

/// Sends, accepts and mutually confirms an invite; returns its session.
async fn confirmed_session(state: &AppState) -> SessionId {
    let invites = &state.invite_service;
    let Ok(invite) = invites.send_invite(a(), b(), venue()).await else {
        panic!("send failed");
    };
    let Ok(_) = invites.accept_invite(invite.id, &b()).await else {
        panic!("accept failed");
    };
    let Ok(_) = invites.confirm_going(invite.id, &a()).await else {
        panic!("confirm failed");
    };
    let Ok(outcome) = invites.confirm_going(invite.id, &b()).await else {
        panic!("confirm failed");
    };
    let Some(session_id) = outcome.session_id else {
        panic!("mutual confirmation must create a session");
    };
    session_id
}

#[tokio::test]
async fn full_meetup_scenario() {
    let (state, clock) = state();
    let invites = &state.invite_service;
    let sessions = &state.session_service;

    let Ok(invite) = invites.send_invite(a(), b(), venue()).await else {
        panic!("send failed");
    };
    let Ok(_) = invites.accept_invite(invite.id, &b()).await else {
        panic!("accept failed");
    };

    let Ok(first) = invites.confirm_going(invite.id, &a()).await else {
        panic!("confirm failed");
    };
    assert_eq!(first.state, ConfirmationState::OneConfirmed);
    assert!(!first.mutual_reached);
    assert_eq!(first.session_id, None);

    let Ok(second) = invites.confirm_going(invite.id, &b()).await else {
        panic!("confirm failed");
    };
    assert_eq!(second.state, ConfirmationState::BothConfirmed);
    assert!(second.mutual_reached);
    let Some(session_id) = second.session_id else {
        panic!("session expected");
    };

    let Ok(session) = sessions.get_session(session_id).await else {
        panic!("session missing");
    };
    assert_eq!(session.status, SessionStatus::BothConfirmed);
    assert_eq!(session.invite_id, invite.id);

    let Ok(far) = sessions
        .update_location(session_id, &a(), at_distance(500.0, &clock))
        .await
    else {
        panic!("update failed");
    };
    assert!(!far.is_within_radius);
    assert!((far.distance_to_target - 500.0).abs() < 2.0);
    assert!(!far.can_check_in);

    let Ok(near) = sessions
        .update_location(session_id, &b(), at_distance(50.0, &clock))
        .await
    else {
        panic!("update failed");
    };
    assert!(near.is_within_radius);
    assert!(!near.can_check_in);

    let Ok(arrived) = sessions
        .update_location(session_id, &a(), at_distance(30.0, &clock))
        .await
    else {
        panic!("update failed");
    };
    assert!(arrived.can_check_in);
    let Some(gap) = arrived.distance_to_partner else {
        panic!("partner distance expected");
    };
    assert!((gap - 20.0).abs() < 1.0, "gap was {gap}");

    let Ok(reward) = sessions.complete_meetup(session_id, &a()).await else {
        panic!("completion failed");
    };
    assert!(reward.newly_issued);
    assert_eq!(reward.reward.points, 100);

    let Ok(again) = sessions.complete_meetup(session_id, &b()).await else {
        panic!("completion failed");
    };
    assert!(!again.newly_issued);
    assert_eq!(again.reward, reward.reward);

    let Ok(done) = sessions.get_session(session_id).await else {
        panic!("session missing");
    };
    assert_eq!(done.status, SessionStatus::Completed);
    assert!(done.reward_issued);
    assert_eq!(done.completed_at, Some(reward.reward.issued_at));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_confirmations_create_exactly_one_session() {
    for _ in 0..20 {
        let (state, _clock) = state();
        let mut events = state.event_bus.subscribe();
        let invites = Arc::clone(&state.invite_service);
        let Ok(invite) = invites.send_invite(a(), b(), venue()).await else {
            panic!("send failed");
        };
        let Ok(_) = invites.accept_invite(invite.id, &b()).await else {
            panic!("accept failed");
        };

        let first = tokio::spawn({
            let invites = Arc::clone(&invites);
            async move { invites.confirm_going(invite.id, &a()).await }
        });
        let second = tokio::spawn({
            let invites = Arc::clone(&invites);
            async move { invites.confirm_going(invite.id, &b()).await }
        });
        let (Ok(Ok(first)), Ok(Ok(second))) = (first.await, second.await) else {
            panic!("confirmations failed");
        };
        assert_eq!(
            usize::from(first.mutual_reached) + usize::from(second.mutual_reached),
            1
        );

        let Ok(stored) = invites.get_invite(invite.id).await else {
            panic!("invite missing");
        };
        let Some(session_id) = stored.session_id else {
            panic!("session reserved");
        };
        let Ok(session) = state.session_service.get_session(session_id).await else {
            panic!("session missing");
        };
        assert_eq!(session.invite_id, invite.id);

        let mut created = 0;
        while let Ok(event) = events.try_recv() {
            if let MeetupEvent::SessionCreated { session_id: id, .. } = event {
                assert_eq!(id, session_id);
                created += 1;
            }
        }
        assert_eq!(created, 1);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_completion_issues_one_reward() {
    for _ in 0..20 {
        let (state, clock) = state();
        let session_id = confirmed_session(&state).await;
        let sessions = Arc::clone(&state.session_service);
        for user in [a(), b()] {
            let Ok(_) = sessions
                .update_location(session_id, &user, at_distance(40.0, &clock))
                .await
            else {
                panic!("update failed");
            };
        }
        let mut events = state.event_bus.subscribe();

        let by_a = tokio::spawn({
            let sessions = Arc::clone(&sessions);
            async move { sessions.complete_meetup(session_id, &a()).await }
        });
        let by_b = tokio::spawn({
            let sessions = Arc::clone(&sessions);
            async move { sessions.complete_meetup(session_id, &b()).await }
        });
        let (Ok(Ok(ra)), Ok(Ok(rb))) = (by_a.await, by_b.await) else {
            panic!("completions failed");
        };
        assert_eq!(usize::from(ra.newly_issued) + usize::from(rb.newly_issued), 1);
        assert_eq!(ra.reward, rb.reward);

        let mut completed = 0;
        while let Ok(event) = events.try_recv() {
            if matches!(event, MeetupEvent::MeetupCompleted { .. }) {
                completed += 1;
            }
        }
        assert_eq!(completed, 1);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn interleaved_check_ins_never_clobber_each_other() {
    let (state, _clock) = state();
    let session_id = confirmed_session(&state).await;
    let sessions = Arc::clone(&state.session_service);
    let start = Utc::now();

    let mut handles = Vec::new();
    for (user, meters) in [(a(), 300.0), (b(), 350.0)] {
        let sessions = Arc::clone(&sessions);
        handles.push(tokio::spawn(async move {
            for step in 0..25i64 {
                let sample = PositionSample {
                    latitude: TARGET_LAT + (meters - step as f64) * METER,
                    longitude: TARGET_LON,
                    accuracy: None,
                    captured_at: start + Duration::seconds(step),
                };
                if sessions.update_location(session_id, &user, sample).await.is_err() {
                    return false;
                }
            }
            true
        }));
    }
    for handle in handles {
        let Ok(true) = handle.await else {
            panic!("updates failed");
        };
    }

    let Ok(session) = sessions.get_session(session_id).await else {
        panic!("session missing");
    };
    assert_eq!(session.check_in_data.len(), 2);
    for (user, meters) in [(a(), 276.0), (b(), 326.0)] {
        let Some(entry) = session.check_in_data.get(&user) else {
            panic!("entry for {user} missing");
        };
        assert!((entry.distance_to_target - meters).abs() < 1.0);
    }
}

#[tokio::test]
async fn completed_session_ignores_further_samples() {
    let (state, clock) = state();
    let session_id = confirmed_session(&state).await;
    let sessions = &state.session_service;
    for user in [a(), b()] {
        let _ = sessions
            .update_location(session_id, &user, at_distance(10.0, &clock))
            .await;
    }
    let Ok(_) = sessions.complete_meetup(session_id, &b()).await else {
        panic!("completion failed");
    };
    let Ok(before) = sessions.get_session(session_id).await else {
        panic!("session missing");
    };

    let Ok(update) = sessions
        .update_location(session_id, &a(), at_distance(900.0, &clock))
        .await
    else {
        panic!("update failed");
    };
    assert_eq!(update.outcome, UpdateOutcome::SessionCompleted);
    assert!(!update.can_check_in);

    let Ok(after) = sessions.get_session(session_id).await else {
        panic!("session missing");
    };
    assert_eq!(before, after);
}

#[tokio::test]
async fn declined_invite_cannot_be_confirmed() {
    let (state, _clock) = state();
    let invites = &state.invite_service;
    let Ok(invite) = invites.send_invite(a(), b(), venue()).await else {
        panic!("send failed");
    };
    let Ok(_) = invites.decline_invite(invite.id, &b()).await else {
        panic!("decline failed");
    };
    let result = invites.confirm_going(invite.id, &a()).await;
    assert!(matches!(
        result,
        Err(MeetupError::InviteNotConfirmable { .. })
    ));
    let Ok(stored) = invites.get_invite(invite.id).await else {
        panic!("invite missing");
    };
    assert!(!stored.meetup_details.sender_confirmed);
}
