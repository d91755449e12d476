//! Domain layer: identifiers, geometry, invites, sessions and events.
//!
//! Everything in here is free of I/O. Documents implement
//! [`crate::store::Document`] so the store layer can merge partial updates
//! into them atomically.

pub mod clock;
pub mod event_bus;
pub mod geo;
pub mod ids;
pub mod invite;
pub mod meetup_event;
pub mod reward;
pub mod session;

pub use clock::{Clock, ManualClock, SystemClock};
pub use event_bus::EventBus;
pub use geo::{Coord, distance_meters, is_within_radius};
pub use ids::{InviteId, SessionId, UserId};
pub use invite::{
    ConfirmationState, Invite, InvitePatch, InviteStatus, MeetupDetails, ParticipantRole, Venue,
    VenueKind,
};
pub use meetup_event::{ConfirmationKind, MeetupEvent};
pub use reward::{FixedRewardPolicy, Reward, RewardPolicy};
pub use session::{
    CheckIn, MeetupSession, PositionSample, RewardRecord, SessionPatch, SessionStatus,
};
