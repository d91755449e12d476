//! Service layer: business logic orchestration.
//!
//! [`InviteService`] runs the invite lifecycle and the confirmation
//! handshake; [`SessionService`] owns meetup sessions, check-ins and reward
//! issuance. Both emit events through the [`crate::domain::EventBus`].

pub mod invite_service;
pub mod notifier;
pub mod session_service;

pub use invite_service::{ConfirmOutcome, InviteService};
pub use notifier::{BusNotifier, ConfirmationNotice, Notifier};
pub use session_service::{LocationUpdate, RewardResult, SessionService, UpdateOutcome};
