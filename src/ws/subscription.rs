//! Per-connection subscription manager.
//!
//! Tracks which invite and session ids a WebSocket client follows and
//! provides server-side event filtering on [`MeetupEvent::topic`].
//!
//! [`MeetupEvent::topic`]: crate::domain::MeetupEvent::topic

use std::collections::HashSet;

use uuid::Uuid;

use crate::domain::{MeetupEvent, UserId};

/// Manages the set of topic subscriptions for a single WebSocket connection.
///
/// Topics are only added after the caller was checked against them, or
/// learned from events that name the caller. There is no global feed.
#[derive(Debug, Default)]
pub struct SubscriptionManager {
    /// Subscribed topics.
    topics: HashSet<Uuid>,
    /// Whether new invites naming the caller are followed (wildcard `"*"`).
    follow_own: bool,
}

impl SubscriptionManager {
    /// Creates a new empty subscription manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds authorized topics. `wildcard` also follows invites the caller
    /// sends or receives from now on.
    pub fn subscribe(&mut self, ids: &[Uuid], wildcard: bool) {
        if wildcard {
            self.follow_own = true;
        }
        self.topics.extend(ids.iter().copied());
    }

    /// Removes topics from the subscription set. `wildcard` stops following
    /// new invites; topics already followed stay.
    pub fn unsubscribe(&mut self, ids: &[Uuid], wildcard: bool) {
        if wildcard {
            self.follow_own = false;
        }
        for id in ids {
            self.topics.remove(id);
        }
    }

    /// Extends the subscription from an event before it is filtered.
    ///
    /// A new invite naming `caller` is followed while the wildcard is on,
    /// and the session of a followed invite is followed once created.
    pub fn follow(&mut self, caller: &UserId, event: &MeetupEvent) {
        match event {
            MeetupEvent::InviteSent {
                invite_id,
                sender_id,
                receiver_id,
                ..
            } if self.follow_own && (sender_id == caller || receiver_id == caller) => {
                self.topics.insert(*invite_id.as_uuid());
            }
            MeetupEvent::SessionCreated {
                invite_id,
                session_id,
                ..
            } if self.topics.contains(invite_id.as_uuid()) => {
                self.topics.insert(*session_id.as_uuid());
            }
            _ => {}
        }
    }

    /// Returns `true` if the given topic matches the subscription filter.
    #[must_use]
    pub fn matches(&self, topic: Uuid) -> bool {
        self.topics.contains(&topic)
    }

    /// Returns the number of subscribed topics.
    #[must_use]
    pub fn count(&self) -> usize {
        self.topics.len()
    }

    /// Returns `true` if new invites naming the caller are followed.
    #[must_use]
    pub fn follows_own(&self) -> bool {
        self.follow_own
    }
}

/// Splits raw topic ids into parsed UUIDs and a wildcard flag. Ids that are
/// not UUIDs are skipped.
#[must_use]
pub fn parse_topics(raw: &[String]) -> (Vec<Uuid>, bool) {
    let mut ids = Vec::new();
    let mut wildcard = false;
    for id in raw {
        if id == "*" {
            wildcard = true;
        } else if let Ok(uuid) = id.parse::<Uuid>() {
            ids.push(uuid);
        }
    }
    (ids, wildcard)
}
