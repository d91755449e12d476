//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::config::MeetupSettings;
use crate::domain::{
    Clock, EventBus, FixedRewardPolicy, Invite, MeetupSession, RewardPolicy, SystemClock,
};
use crate::error::MeetupError;
use crate::service::{BusNotifier, InviteService, Notifier, SessionService};
use crate::store::MemoryStore;

/// Session service over the in-process store.
pub type Sessions = SessionService<MemoryStore<MeetupSession>>;

/// Invite service over the in-process stores.
pub type Invites = InviteService<MemoryStore<Invite>, MemoryStore<MeetupSession>>;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Invite lifecycle and confirmation handshake.
    pub invite_service: Arc<Invites>,
    /// Sessions, check-ins and completion.
    pub session_service: Arc<Sessions>,
    /// Event bus for WebSocket subscriptions.
    pub event_bus: EventBus,
    /// Active meetup policy.
    pub meetup: MeetupSettings,
}

impl AppState {
    /// Wires the services over fresh in-process stores.
    ///
    /// # Errors
    ///
    /// Returns [`MeetupError::InvalidRequest`] if `meetup` is invalid.
    pub fn new(event_bus: EventBus, meetup: MeetupSettings) -> Result<Self, MeetupError> {
        Self::with_clock(event_bus, meetup, Arc::new(SystemClock))
    }

    /// Same as [`AppState::new`] with an explicit time source.
    ///
    /// # Errors
    ///
    /// Returns [`MeetupError::InvalidRequest`] if `meetup` is invalid.
    pub fn with_clock(
        event_bus: EventBus,
        meetup: MeetupSettings,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, MeetupError> {
        meetup.validate()?;
        let policy: Arc<dyn RewardPolicy> = Arc::new(FixedRewardPolicy::new(
            meetup.reward_points,
            meetup.reward_message.clone(),
        ));
        let notifier: Arc<dyn Notifier> = Arc::new(BusNotifier::new(event_bus.clone()));

        let session_service = Arc::new(SessionService::new(
            Arc::new(MemoryStore::new()),
            event_bus.clone(),
            policy,
            Arc::clone(&clock),
            meetup.arrival_radius_meters,
        ));
        let invite_service = Arc::new(InviteService::new(
            Arc::new(MemoryStore::new()),
            Arc::clone(&session_service),
            notifier,
            event_bus.clone(),
            clock,
            meetup.invite_ttl(),
        ));

        Ok(Self {
            invite_service,
            session_service,
            event_bus,
            meetup,
        })
    }
}
