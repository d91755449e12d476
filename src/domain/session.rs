//! Meetup sessions: live check-in state shared by two participants.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::geo::{self, Coord};
use super::ids::{InviteId, SessionId, UserId};
use super::invite::Invite;
use crate::error::MeetupError;
use crate::store::Document;

/// Session lifecycle. `Completed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Created after mutual confirmation, no sample received yet.
    BothConfirmed,
    /// At least one location sample has been recorded.
    Tracking,
    /// Both participants arrived and the reward was issued.
    Completed,
}

impl SessionStatus {
    /// Returns the status as a static string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::BothConfirmed => "both_confirmed",
            Self::Tracking => "tracking",
            Self::Completed => "completed",
        }
    }
}

/// A location fix produced by a device.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PositionSample {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
    /// Horizontal accuracy radius in meters, if known.
    #[serde(default)]
    pub accuracy: Option<f64>,
    /// When the device captured the fix.
    pub captured_at: DateTime<Utc>,
}

impl PositionSample {
    /// Validates the sample's coordinate.
    ///
    /// # Errors
    ///
    /// Returns [`MeetupError::InvalidCoordinate`] for malformed fixes.
    pub fn coord(&self) -> Result<Coord, MeetupError> {
        Coord::new(self.latitude, self.longitude)
    }
}

/// Last recorded fix of one participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CheckIn {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
    /// Device accuracy in meters.
    #[serde(default)]
    pub accuracy: Option<f64>,
    /// Great-circle distance to the session target.
    pub distance_to_target: f64,
    /// Whether `distance_to_target` is within the session radius.
    pub is_within_radius: bool,
    /// Device capture time; orders samples of the same participant.
    pub captured_at: DateTime<Utc>,
    /// When the store recorded the sample.
    pub updated_at: DateTime<Utc>,
}

impl CheckIn {
    /// Returns the recorded position.
    #[must_use]
    pub const fn coord(&self) -> Coord {
        Coord {
            latitude: self.latitude,
            longitude: self.longitude,
        }
    }
}

/// Reward issued when the session completed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RewardRecord {
    /// Points credited.
    pub points: u32,
    /// Message shown to the participants.
    pub message: String,
    /// Issue time (equals the session's `completed_at`).
    pub issued_at: DateTime<Utc>,
}

/// Shared live-tracking record of two confirmed participants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MeetupSession {
    /// Session id.
    pub id: SessionId,
    /// Invite this session was created for.
    pub invite_id: InviteId,
    /// The two participants, sender first.
    pub participants: [UserId; 2],
    /// Lifecycle status.
    pub status: SessionStatus,
    /// Latest check-in per participant.
    pub check_in_data: BTreeMap<UserId, CheckIn>,
    /// Meeting point. Immutable.
    pub target_location: Coord,
    /// Arrival threshold in meters. Immutable.
    pub radius_meters: f64,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Completion time.
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    /// Set exactly once, together with `status`, `completed_at` and `reward`.
    pub reward_issued: bool,
    /// The issued reward.
    #[serde(default)]
    pub reward: Option<RewardRecord>,
}

impl MeetupSession {
    /// Builds the session for a mutually confirmed invite.
    #[must_use]
    pub fn for_invite(
        id: SessionId,
        invite: &Invite,
        radius_meters: f64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            invite_id: invite.id,
            participants: invite.participants(),
            status: SessionStatus::BothConfirmed,
            check_in_data: BTreeMap::new(),
            target_location: invite.venue.location,
            radius_meters,
            created_at: now,
            completed_at: None,
            reward_issued: false,
            reward: None,
        }
    }

    /// Returns `true` if `user` is one of the two participants.
    #[must_use]
    pub fn is_participant(&self, user: &UserId) -> bool {
        self.participants.contains(user)
    }

    /// Returns the other participant.
    #[must_use]
    pub fn partner_of(&self, user: &UserId) -> Option<&UserId> {
        match &self.participants {
            [a, b] if a == user => Some(b),
            [a, b] if b == user => Some(a),
            _ => None,
        }
    }

    /// Returns `true` once the session is completed.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.status == SessionStatus::Completed
    }

    /// Returns `true` when the latest check-in of every participant is
    /// within the radius.
    #[must_use]
    pub fn all_within_radius(&self) -> bool {
        self.participants.iter().all(|user| {
            self.check_in_data
                .get(user)
                .is_some_and(|entry| entry.is_within_radius)
        })
    }

    /// Builds the check-in a sample at `coord` would produce.
    #[must_use]
    pub fn check_in_at(
        &self,
        coord: Coord,
        sample: &PositionSample,
        now: DateTime<Utc>,
    ) -> CheckIn {
        let distance_to_target = geo::distance_meters(coord, self.target_location);
        CheckIn {
            latitude: coord.latitude,
            longitude: coord.longitude,
            accuracy: sample.accuracy,
            distance_to_target,
            is_within_radius: geo::is_within_radius(distance_to_target, self.radius_meters),
            captured_at: sample.captured_at,
            updated_at: now,
        }
    }

    fn unauthorized(user: &UserId) -> MeetupError {
        MeetupError::Unauthorized {
            user_id: user.to_string(),
        }
    }
}

/// Partial updates applied through [`crate::store::DocumentStore::merge_write`].
#[derive(Debug, Clone)]
pub enum SessionPatch {
    /// Records one participant's latest fix, keyed by user.
    CheckIn {
        /// Participant the fix belongs to.
        user_id: UserId,
        /// Check-in to store.
        entry: CheckIn,
    },
}

impl Document for MeetupSession {
    const KIND: &'static str = "session";
    type Id = SessionId;
    type Patch = SessionPatch;

    fn id(&self) -> SessionId {
        self.id
    }

    fn merge(&mut self, patch: SessionPatch) -> Result<(), MeetupError> {
        match patch {
            SessionPatch::CheckIn { user_id, entry } => {
                if !self.is_participant(&user_id) {
                    return Err(Self::unauthorized(&user_id));
                }
                if self.is_completed() {
                    return Ok(());
                }
                if self
                    .check_in_data
                    .get(&user_id)
                    .is_some_and(|stored| stored.captured_at > entry.captured_at)
                {
                    return Ok(());
                }
                self.check_in_data.insert(user_id, entry);
                if self.status == SessionStatus::BothConfirmed {
                    self.status = SessionStatus::Tracking;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::domain::invite::{Venue, VenueKind};

    fn session() -> MeetupSession {
        let Ok(location) = Coord::new(10.0, 106.0) else {
            panic!("valid coordinate");
        };
        let venue = Venue {
            kind: VenueKind::Event,
            venue_id: "ev-1".to_string(),
            name: None,
            location,
        };
        let Ok(invite) = Invite::new("uidA".into(), "uidB".into(), venue, Utc::now(), None) else {
            panic!("valid invite");
        };
        MeetupSession::for_invite(SessionId::new(), &invite, 200.0, Utc::now())
    }

    fn entry(s: &MeetupSession, lat: f64, at: DateTime<Utc>) -> CheckIn {
        let sample = PositionSample {
            latitude: lat,
            longitude: 106.0,
            accuracy: Some(5.0),
            captured_at: at,
        };
        let Ok(coord) = sample.coord() else {
            panic!("valid sample");
        };
        s.check_in_at(coord, &sample, at)
    }

    #[test]
    fn partner_lookup_is_order_independent() {
        let s = session();
        assert_eq!(s.partner_of(&"uidA".into()), Some(&UserId::from("uidB")));
        assert_eq!(s.partner_of(&"uidB".into()), Some(&UserId::from("uidA")));
        assert_eq!(s.partner_of(&"uidC".into()), None);
    }

    #[test]
    fn first_check_in_starts_tracking() {
        let mut s = session();
        let e = entry(&s, 10.0, Utc::now());
        let result = s.merge(SessionPatch::CheckIn {
            user_id: "uidA".into(),
            entry: e,
        });
        assert!(result.is_ok());
        assert_eq!(s.status, SessionStatus::Tracking);
        assert!(!s.all_within_radius());
    }

    #[test]
    fn older_sample_does_not_overwrite_newer() {
        let mut s = session();
        let now = Utc::now();
        let newer = entry(&s, 10.0, now);
        let older = entry(&s, 10.01, now - Duration::seconds(10));
        let _ = s.merge(SessionPatch::CheckIn {
            user_id: "uidA".into(),
            entry: newer.clone(),
        });
        let _ = s.merge(SessionPatch::CheckIn {
            user_id: "uidA".into(),
            entry: older,
        });
        assert_eq!(s.check_in_data.get(&UserId::from("uidA")), Some(&newer));
    }

    #[test]
    fn check_in_leaves_partner_entry_alone() {
        let mut s = session();
        let now = Utc::now();
        let b = entry(&s, 10.0004, now);
        let _ = s.merge(SessionPatch::CheckIn {
            user_id: "uidB".into(),
            entry: b.clone(),
        });
        let a = entry(&s, 10.0002, now);
        let _ = s.merge(SessionPatch::CheckIn {
            user_id: "uidA".into(),
            entry: a,
        });
        assert_eq!(s.check_in_data.get(&UserId::from("uidB")), Some(&b));
        assert!(s.all_within_radius());
    }

    #[test]
    fn outsider_check_in_is_unauthorized() {
        let mut s = session();
        let e = entry(&s, 10.0, Utc::now());
        let result = s.merge(SessionPatch::CheckIn {
            user_id: "uidC".into(),
            entry: e,
        });
        assert!(matches!(result, Err(MeetupError::Unauthorized { .. })));
    }

    #[test]
    fn completed_session_ignores_check_ins() {
        let mut s = session();
        s.status = SessionStatus::Completed;
        let e = entry(&s, 10.0, Utc::now());
        let before = s.clone();
        let _ = s.merge(SessionPatch::CheckIn {
            user_id: "uidA".into(),
            entry: e,
        });
        assert_eq!(s, before);
    }

    #[test]
    fn radius_edge_is_inclusive_for_check_ins() {
        let s = session();
        let e = entry(&s, 10.0, Utc::now());
        assert_eq!(e.distance_to_target, 0.0);
        assert!(e.is_within_radius);
        // 0.0045 degrees of latitude is about 500 m.
        let far = entry(&s, 10.0045, Utc::now());
        assert!(far.distance_to_target > 490.0);
        assert!(!far.is_within_radius);
    }
}
