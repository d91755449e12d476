//! Session service: live check-ins, arrival evaluation and completion.

use std::sync::Arc;

use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::{
    Clock, EventBus, Invite, MeetupEvent, MeetupSession, PositionSample, RewardPolicy,
    RewardRecord, SessionId, SessionPatch, SessionStatus, UserId, distance_meters,
};
use crate::error::MeetupError;
use crate::store::{Document, DocumentStore, DocumentWatch};

/// What happened to a submitted sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum UpdateOutcome {
    /// The sample is now the participant's latest check-in.
    Recorded,
    /// A newer sample was already on file; nothing was written.
    Stale,
    /// The session is completed; nothing was written.
    SessionCompleted,
}

/// Result of [`SessionService::update_location`].
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct LocationUpdate {
    /// Session the sample was submitted to.
    pub session_id: SessionId,
    /// Reporting participant.
    pub user_id: UserId,
    /// Distance from the sample to the meeting point, in meters.
    pub distance_to_target: f64,
    /// Whether the sample is within the arrival radius.
    pub is_within_radius: bool,
    /// Distance to the partner's latest check-in, if there is one.
    pub distance_to_partner: Option<f64>,
    /// `true` iff both participants are within the radius and the session
    /// is not completed yet.
    pub can_check_in: bool,
    /// What happened to the sample.
    pub outcome: UpdateOutcome,
    /// Session status after the call.
    pub status: SessionStatus,
}

/// Result of [`SessionService::complete_meetup`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct RewardResult {
    /// Completed session.
    pub session_id: SessionId,
    /// The reward stored on the session.
    pub reward: RewardRecord,
    /// `true` only for the call that issued the reward.
    pub newly_issued: bool,
}

/// Owns the state machine of meetup sessions.
///
/// Every mutation is a single atomic write to the session document:
/// check-ins merge only the caller's entry, and completion checks and sets
/// `reward_issued` in one transaction so the reward is issued exactly once.
#[derive(Debug)]
pub struct SessionService<S> {
    store: Arc<S>,
    event_bus: EventBus,
    policy: Arc<dyn RewardPolicy>,
    clock: Arc<dyn Clock>,
    radius_meters: f64,
}

impl<S: DocumentStore<MeetupSession>> SessionService<S> {
    /// Creates a new `SessionService`.
    #[must_use]
    pub fn new(
        store: Arc<S>,
        event_bus: EventBus,
        policy: Arc<dyn RewardPolicy>,
        clock: Arc<dyn Clock>,
        radius_meters: f64,
    ) -> Self {
        Self {
            store,
            event_bus,
            policy,
            clock,
            radius_meters,
        }
    }

    /// Returns a reference to the inner [`EventBus`].
    #[must_use]
    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Returns the arrival radius new sessions are created with.
    #[must_use]
    pub fn radius_meters(&self) -> f64 {
        self.radius_meters
    }

    /// Creates the session reserved on `invite` unless it already exists.
    ///
    /// # Errors
    ///
    /// Returns [`MeetupError::InvalidState`] if the invite has no reserved
    /// session, or a store error.
    pub async fn ensure_session(&self, invite: &Invite) -> Result<MeetupSession, MeetupError> {
        let session_id = invite.session_id.ok_or_else(|| {
            MeetupError::InvalidState(format!("invite {} has no session reserved", invite.id))
        })?;
        let now = self.clock.now();
        let draft = MeetupSession::for_invite(session_id, invite, self.radius_meters, now);
        let (session, created) = self.store.create(draft).await?;

        if created {
            let _ = self.event_bus.publish(MeetupEvent::SessionCreated {
                invite_id: invite.id,
                session_id,
                timestamp: now,
            });
            tracing::info!(%session_id, invite_id = %invite.id, "meetup session created");
        }
        Ok(session)
    }

    /// Loads a session.
    ///
    /// # Errors
    ///
    /// Returns [`MeetupError::NotFound`] if no such session exists.
    pub async fn get_session(&self, session_id: SessionId) -> Result<MeetupSession, MeetupError> {
        self.store
            .get(session_id)
            .await?
            .ok_or_else(|| MeetupError::NotFound {
                kind: MeetupSession::KIND,
                id: session_id.to_string(),
            })
    }

    /// Subscribes to committed changes of a session.
    #[must_use]
    pub fn watch_session(&self, session_id: SessionId) -> DocumentWatch<MeetupSession> {
        self.store.subscribe(session_id)
    }

    /// Records a participant's location sample and re-evaluates arrival.
    ///
    /// Only `check_in_data[user_id]` is written. A sample captured before
    /// the one on file is ignored, and a completed session accepts no
    /// further samples; both cases succeed without writing.
    ///
    /// # Errors
    ///
    /// Returns [`MeetupError::InvalidCoordinate`] for a malformed sample,
    /// [`MeetupError::NotFound`], [`MeetupError::Unauthorized`] for
    /// non-participants, or a store error.
    pub async fn update_location(
        &self,
        session_id: SessionId,
        user_id: &UserId,
        sample: PositionSample,
    ) -> Result<LocationUpdate, MeetupError> {
        let coord = sample.coord()?;
        let session = self.get_session(session_id).await?;
        if !session.is_participant(user_id) {
            return Err(MeetupError::Unauthorized {
                user_id: user_id.to_string(),
            });
        }

        let now = self.clock.now();
        let entry = session.check_in_at(coord, &sample, now);

        let merged = if session.is_completed() {
            session
        } else {
            let patch = SessionPatch::CheckIn {
                user_id: user_id.clone(),
                entry: entry.clone(),
            };
            let (merged, started) = self
                .store
                .transact(session_id, move |doc| {
                    let before = doc.status;
                    doc.merge(patch)?;
                    let started =
                        before == SessionStatus::BothConfirmed && doc.status == SessionStatus::Tracking;
                    Ok((doc.clone(), started))
                })
                .await?;
            if started {
                let _ = self.event_bus.publish(MeetupEvent::TrackingStarted {
                    session_id,
                    timestamp: now,
                });
                tracing::info!(%session_id, %user_id, "meetup tracking started");
            }
            merged
        };

        let outcome = if merged.is_completed() {
            UpdateOutcome::SessionCompleted
        } else if merged.check_in_data.get(user_id) == Some(&entry) {
            UpdateOutcome::Recorded
        } else {
            UpdateOutcome::Stale
        };

        let distance_to_partner = merged
            .partner_of(user_id)
            .and_then(|partner| merged.check_in_data.get(partner))
            .map(|partner| distance_meters(coord, partner.coord()));
        let can_check_in = !merged.is_completed() && merged.all_within_radius();

        if outcome == UpdateOutcome::Recorded {
            let _ = self.event_bus.publish(MeetupEvent::LocationUpdated {
                session_id,
                user_id: user_id.clone(),
                distance_to_target: entry.distance_to_target,
                is_within_radius: entry.is_within_radius,
                timestamp: now,
            });
        }
        tracing::debug!(
            %session_id,
            %user_id,
            distance = entry.distance_to_target,
            within = entry.is_within_radius,
            can_check_in,
            ?outcome,
            "location sample processed"
        );

        Ok(LocationUpdate {
            session_id,
            user_id: user_id.clone(),
            distance_to_target: entry.distance_to_target,
            is_within_radius: entry.is_within_radius,
            distance_to_partner,
            can_check_in,
            outcome,
            status: merged.status,
        })
    }

    /// Completes the meetup and issues the reward exactly once.
    ///
    /// Safe to call concurrently from both participants: the first call
    /// issues the reward, every later call returns the same record with
    /// `newly_issued == false`.
    ///
    /// # Errors
    ///
    /// Returns [`MeetupError::NotFound`], [`MeetupError::Unauthorized`],
    /// [`MeetupError::NotArrived`] if the latest check-ins do not place both
    /// participants within the radius, [`MeetupError::RewardPolicy`] (no
    /// state is changed), or a store error.
    pub async fn complete_meetup(
        &self,
        session_id: SessionId,
        caller: &UserId,
    ) -> Result<RewardResult, MeetupError> {
        let now = self.clock.now();
        let policy = Arc::clone(&self.policy);
        let who = caller.clone();

        let (reward, newly_issued) = self
            .store
            .transact(session_id, move |session| {
                if !session.is_participant(&who) {
                    return Err(MeetupError::Unauthorized {
                        user_id: who.to_string(),
                    });
                }
                if session.reward_issued {
                    let reward = session.reward.clone().ok_or_else(|| {
                        MeetupError::Internal(format!(
                            "session {} issued a reward without a record",
                            session.id
                        ))
                    })?;
                    return Ok((reward, false));
                }
                if !session.all_within_radius() {
                    return Err(MeetupError::NotArrived);
                }

                let reward = policy.compute_reward(session)?;
                let record = RewardRecord {
                    points: reward.points,
                    message: reward.message,
                    issued_at: now,
                };
                session.reward_issued = true;
                session.status = SessionStatus::Completed;
                session.completed_at = Some(now);
                session.reward = Some(record.clone());
                Ok((record, true))
            })
            .await?;

        if newly_issued {
            let _ = self.event_bus.publish(MeetupEvent::MeetupCompleted {
                session_id,
                points: reward.points,
                timestamp: now,
            });
            tracing::info!(%session_id, %caller, points = reward.points, "meetup completed");
        }

        Ok(RewardResult {
            session_id,
            reward,
            newly_issued,
        })
    }
}
