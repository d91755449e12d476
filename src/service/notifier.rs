//! Outbound confirmation notices.
//!
//! The messaging collaborator owns user-facing copy and push delivery; the
//! confirmation flow only hands it a fixed-shape notice.

use chrono::Utc;
use serde::Serialize;

use crate::domain::{ConfirmationKind, EventBus, InviteId, MeetupEvent, UserId};

/// Notice sent when a participant confirms going.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfirmationNotice {
    /// Milestone reached.
    pub kind: ConfirmationKind,
    /// Invite the notice is about.
    pub invite_id: InviteId,
}

/// Receiver of [`ConfirmationNotice`]s.
pub trait Notifier: Send + Sync + std::fmt::Debug {
    /// Delivers a notice on behalf of `from`. Must not block.
    fn notify(&self, from: &UserId, notice: ConfirmationNotice);
}

/// Forwards notices onto the [`EventBus`] as
/// [`MeetupEvent::InviteConfirmed`].
#[derive(Debug, Clone)]
pub struct BusNotifier {
    bus: EventBus,
}

impl BusNotifier {
    /// Creates a notifier publishing to `bus`.
    #[must_use]
    pub fn new(bus: EventBus) -> Self {
        Self { bus }
    }
}

impl Notifier for BusNotifier {
    fn notify(&self, from: &UserId, notice: ConfirmationNotice) {
        let _ = self.bus.publish(MeetupEvent::InviteConfirmed {
            invite_id: notice.invite_id,
            user_id: from.clone(),
            kind: notice.kind,
            timestamp: Utc::now(),
        });
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bus_notifier_publishes_invite_confirmed() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        let notifier = BusNotifier::new(bus);
        let invite_id = InviteId::new();

        notifier.notify(
            &"uidA".into(),
            ConfirmationNotice {
                kind: ConfirmationKind::SingleConfirmed,
                invite_id,
            },
        );

        let Ok(MeetupEvent::InviteConfirmed {
            invite_id: got,
            user_id,
            kind,
            ..
        }) = rx.recv().await
        else {
            panic!("expected InviteConfirmed");
        };
        assert_eq!(got, invite_id);
        assert_eq!(user_id.as_str(), "uidA");
        assert_eq!(kind, ConfirmationKind::SingleConfirmed);
    }

    #[test]
    fn notify_without_subscribers_is_silent() {
        let notifier = BusNotifier::new(EventBus::new(4));
        notifier.notify(
            &"uidB".into(),
            ConfirmationNotice {
                kind: ConfirmationKind::MutualConfirmed,
                invite_id: InviteId::new(),
            },
        );
    }
}
