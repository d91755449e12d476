//! Invites and the two-party "going together" confirmation.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::geo::Coord;
use super::ids::{InviteId, SessionId, UserId};
use crate::error::MeetupError;
use crate::store::Document;

/// Lifecycle status of an invite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum InviteStatus {
    /// Sent, waiting for the receiver.
    Pending,
    /// Receiver accepted; both sides may now confirm.
    Accepted,
    /// Receiver declined. Terminal.
    Declined,
    /// Lapsed before a session was created. Terminal.
    Expired,
}

impl InviteStatus {
    /// Returns the status as a static string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Declined => "declined",
            Self::Expired => "expired",
        }
    }
}

/// What kind of place the invite is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum VenueKind {
    /// A user-created hotspot.
    HotSpot,
    /// A scheduled event.
    Event,
}

/// The place both users are meeting at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Venue {
    /// Hotspot or event.
    pub kind: VenueKind,
    /// Id of the hotspot or event document.
    pub venue_id: String,
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Meeting point. Becomes the session's target.
    pub location: Coord,
}

/// Which side of the invite a user is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantRole {
    /// The user who sent the invite.
    Sender,
    /// The user who received it.
    Receiver,
}

/// Derived progress of the confirmation handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmationState {
    /// Nobody confirmed yet.
    NoneConfirmed,
    /// Exactly one side confirmed.
    OneConfirmed,
    /// Both sides confirmed.
    BothConfirmed,
}

/// Per-side "I'm going" flags. Flags only ever go from `false` to `true`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MeetupDetails {
    /// Sender confirmed going.
    pub sender_confirmed: bool,
    /// Receiver confirmed going.
    pub receiver_confirmed: bool,
    /// When the sender confirmed.
    #[serde(default)]
    pub sender_confirmed_at: Option<DateTime<Utc>>,
    /// When the receiver confirmed.
    #[serde(default)]
    pub receiver_confirmed_at: Option<DateTime<Utc>>,
}

impl MeetupDetails {
    /// Returns whether `role` has confirmed.
    #[must_use]
    pub const fn is_confirmed(&self, role: ParticipantRole) -> bool {
        match role {
            ParticipantRole::Sender => self.sender_confirmed,
            ParticipantRole::Receiver => self.receiver_confirmed,
        }
    }

    /// Sets the flag of `role`. Returns `false` if it was already set.
    pub fn confirm(&mut self, role: ParticipantRole, at: DateTime<Utc>) -> bool {
        let (flag, stamp) = match role {
            ParticipantRole::Sender => (&mut self.sender_confirmed, &mut self.sender_confirmed_at),
            ParticipantRole::Receiver => {
                (&mut self.receiver_confirmed, &mut self.receiver_confirmed_at)
            }
        };
        if *flag {
            return false;
        }
        *flag = true;
        *stamp = Some(at);
        true
    }

    /// Returns the handshake state.
    #[must_use]
    pub const fn state(&self) -> ConfirmationState {
        match (self.sender_confirmed, self.receiver_confirmed) {
            (true, true) => ConfirmationState::BothConfirmed,
            (false, false) => ConfirmationState::NoneConfirmed,
            _ => ConfirmationState::OneConfirmed,
        }
    }
}

/// One user's proposal to meet another at a venue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Invite {
    /// Invite id.
    pub id: InviteId,
    /// User who sent the invite.
    pub sender_id: UserId,
    /// User who received it.
    pub receiver_id: UserId,
    /// Where to meet.
    pub venue: Venue,
    /// Stored status. See [`Invite::effective_status`] for lazy expiry.
    pub status: InviteStatus,
    /// Confirmation handshake flags.
    pub meetup_details: MeetupDetails,
    /// Session reserved when both sides confirmed.
    #[serde(default)]
    pub session_id: Option<SessionId>,
    /// When the invite was sent.
    pub created_at: DateTime<Utc>,
    /// When the receiver accepted or declined.
    #[serde(default)]
    pub responded_at: Option<DateTime<Utc>>,
    /// After this instant an invite without a session is expired.
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    /// Participant whose confirmation completed the handshake, until the
    /// `mutual_confirmed` notice for it has been claimed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mutual_notice_pending: Option<UserId>,
}

impl Invite {
    /// Creates a pending invite.
    ///
    /// # Errors
    ///
    /// Returns [`MeetupError::InvalidRequest`] if a user invites themselves
    /// or the venue id is blank.
    pub fn new(
        sender_id: UserId,
        receiver_id: UserId,
        venue: Venue,
        now: DateTime<Utc>,
        ttl: Option<Duration>,
    ) -> Result<Self, MeetupError> {
        if sender_id == receiver_id {
            return Err(MeetupError::InvalidRequest(
                "cannot invite yourself".to_string(),
            ));
        }
        if venue.venue_id.trim().is_empty() {
            return Err(MeetupError::InvalidRequest("venue_id is empty".to_string()));
        }
        Ok(Self {
            id: InviteId::new(),
            sender_id,
            receiver_id,
            venue,
            status: InviteStatus::Pending,
            meetup_details: MeetupDetails::default(),
            session_id: None,
            created_at: now,
            responded_at: None,
            expires_at: ttl.map(|ttl| now + ttl),
            mutual_notice_pending: None,
        })
    }

    /// Returns the role of `user`, or `None` for outsiders.
    #[must_use]
    pub fn role_of(&self, user: &UserId) -> Option<ParticipantRole> {
        if *user == self.sender_id {
            Some(ParticipantRole::Sender)
        } else if *user == self.receiver_id {
            Some(ParticipantRole::Receiver)
        } else {
            None
        }
    }

    /// Returns the status as seen at `now`. An open invite past its expiry
    /// with no session reports [`InviteStatus::Expired`].
    #[must_use]
    pub fn effective_status(&self, now: DateTime<Utc>) -> InviteStatus {
        let open = matches!(self.status, InviteStatus::Pending | InviteStatus::Accepted);
        match self.expires_at {
            Some(at) if open && self.session_id.is_none() && now >= at => InviteStatus::Expired,
            _ => self.status,
        }
    }

    /// Returns both participants, sender first.
    #[must_use]
    pub fn participants(&self) -> [UserId; 2] {
        [self.sender_id.clone(), self.receiver_id.clone()]
    }
}

/// Status changes applied through [`crate::store::DocumentStore::merge_write`].
#[derive(Debug, Clone)]
pub enum InvitePatch {
    /// Receiver accepts a pending invite.
    Accept {
        /// Acting user.
        by: UserId,
        /// Time of the response.
        at: DateTime<Utc>,
    },
    /// Receiver declines a pending invite.
    Decline {
        /// Acting user.
        by: UserId,
        /// Time of the response.
        at: DateTime<Utc>,
    },
    /// Either participant withdraws an open invite that has no session yet.
    Expire {
        /// Acting user.
        by: UserId,
        /// Time of the expiry.
        at: DateTime<Utc>,
    },
}

impl Invite {
    fn respond(
        &mut self,
        by: &UserId,
        at: DateTime<Utc>,
        to: InviteStatus,
    ) -> Result<(), MeetupError> {
        if *by != self.receiver_id {
            return Err(MeetupError::Unauthorized {
                user_id: by.to_string(),
            });
        }
        match self.effective_status(at) {
            InviteStatus::Pending => {
                self.status = to;
                self.responded_at = Some(at);
                Ok(())
            }
            current if current == to => Ok(()),
            current => Err(MeetupError::InvalidState(format!(
                "invite {} is {}",
                self.id,
                current.as_str()
            ))),
        }
    }
}

impl Document for Invite {
    const KIND: &'static str = "invite";
    type Id = InviteId;
    type Patch = InvitePatch;

    fn id(&self) -> InviteId {
        self.id
    }

    fn merge(&mut self, patch: InvitePatch) -> Result<(), MeetupError> {
        match patch {
            InvitePatch::Accept { by, at } => self.respond(&by, at, InviteStatus::Accepted),
            InvitePatch::Decline { by, at } => self.respond(&by, at, InviteStatus::Declined),
            InvitePatch::Expire { by, at } => {
                if self.role_of(&by).is_none() {
                    return Err(MeetupError::Unauthorized {
                        user_id: by.to_string(),
                    });
                }
                if self.session_id.is_some() {
                    return Err(MeetupError::InvalidState(format!(
                        "invite {} already has a session",
                        self.id
                    )));
                }
                match self.status {
                    InviteStatus::Pending | InviteStatus::Accepted => {
                        self.status = InviteStatus::Expired;
                        self.expires_at = Some(self.expires_at.map_or(at, |e| e.min(at)));
                        Ok(())
                    }
                    InviteStatus::Expired => Ok(()),
                    InviteStatus::Declined => Err(MeetupError::InvalidState(format!(
                        "invite {} is declined",
                        self.id
                    ))),
                }
            }
        }
    }
}
