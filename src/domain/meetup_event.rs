//! Domain events reflecting invite and session mutations.
//!
//! Every state change emits a [`MeetupEvent`] through the
//! [`super::EventBus`]. Events are broadcast to WebSocket subscribers and
//! optionally appended to the PostgreSQL event log.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::ids::{InviteId, SessionId, UserId};
use super::invite::InviteStatus;

/// Which confirmation milestone a confirm call reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmationKind {
    /// Both participants have now confirmed.
    MutualConfirmed,
    /// One participant confirmed; waiting for the other.
    SingleConfirmed,
}

/// Domain event emitted after every committed mutation.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum MeetupEvent {
    /// Emitted when an invite is sent.
    InviteSent {
        /// Invite identifier.
        invite_id: InviteId,
        /// Sending user.
        sender_id: UserId,
        /// Receiving user.
        receiver_id: UserId,
        /// Hotspot or event id.
        venue_id: String,
        /// Creation timestamp.
        timestamp: DateTime<Utc>,
    },

    /// Emitted when the receiver accepts or declines, or the invite expires.
    InviteStatusChanged {
        /// Invite identifier.
        invite_id: InviteId,
        /// New status.
        status: InviteStatus,
        /// Timestamp of the change.
        timestamp: DateTime<Utc>,
    },

    /// Emitted when a participant confirms going.
    InviteConfirmed {
        /// Invite identifier.
        invite_id: InviteId,
        /// Confirming user.
        user_id: UserId,
        /// Milestone reached.
        kind: ConfirmationKind,
        /// Confirmation timestamp.
        timestamp: DateTime<Utc>,
    },

    /// Emitted once per invite when its meetup session is created.
    SessionCreated {
        /// Invite identifier.
        invite_id: InviteId,
        /// New session identifier.
        session_id: SessionId,
        /// Creation timestamp.
        timestamp: DateTime<Utc>,
    },

    /// Emitted when the first location sample moves a session to tracking.
    TrackingStarted {
        /// Session identifier.
        session_id: SessionId,
        /// Timestamp of the transition.
        timestamp: DateTime<Utc>,
    },

    /// Emitted after a participant's check-in was recorded.
    LocationUpdated {
        /// Session identifier.
        session_id: SessionId,
        /// Reporting participant.
        user_id: UserId,
        /// Distance to the meeting point in meters.
        distance_to_target: f64,
        /// Whether the participant is inside the arrival radius.
        is_within_radius: bool,
        /// Timestamp of the update.
        timestamp: DateTime<Utc>,
    },

    /// Emitted exactly once per session when the reward is issued.
    MeetupCompleted {
        /// Session identifier.
        session_id: SessionId,
        /// Points credited.
        points: u32,
        /// Completion timestamp.
        timestamp: DateTime<Utc>,
    },
}

impl MeetupEvent {
    /// Returns the id subscribers filter on: the invite id for invite
    /// events (including session creation), the session id otherwise.
    #[must_use]
    pub fn topic(&self) -> uuid::Uuid {
        match self {
            Self::InviteSent { invite_id, .. }
            | Self::InviteStatusChanged { invite_id, .. }
            | Self::InviteConfirmed { invite_id, .. }
            | Self::SessionCreated { invite_id, .. } => *invite_id.as_uuid(),
            Self::TrackingStarted { session_id, .. }
            | Self::LocationUpdated { session_id, .. }
            | Self::MeetupCompleted { session_id, .. } => *session_id.as_uuid(),
        }
    }

    /// Returns the event type as a static string slice.
    #[must_use]
    pub const fn event_type_str(&self) -> &'static str {
        match self {
            Self::InviteSent { .. } => "invite_sent",
            Self::InviteStatusChanged { .. } => "invite_status_changed",
            Self::InviteConfirmed { .. } => "invite_confirmed",
            Self::SessionCreated { .. } => "session_created",
            Self::TrackingStarted { .. } => "tracking_started",
            Self::LocationUpdated { .. } => "location_updated",
            Self::MeetupCompleted { .. } => "meetup_completed",
        }
    }
}
