//! Database models for the event log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::MeetupEvent;

/// A stored event row from the `meetup_events` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredEvent {
    /// Auto-increment row ID.
    pub id: i64,
    /// Invite or session the event belongs to.
    pub topic_id: Uuid,
    /// Event type discriminator (e.g. `"meetup_completed"`).
    pub event_type: String,
    /// JSONB payload with event-specific data.
    pub payload: serde_json::Value,
    /// Server-side creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// An event ready to be inserted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEvent {
    /// Invite or session the event belongs to.
    pub topic_id: Uuid,
    /// Event type discriminator.
    pub event_type: &'static str,
    /// Full serialized event.
    pub payload: serde_json::Value,
}

impl From<&MeetupEvent> for NewEvent {
    fn from(event: &MeetupEvent) -> Self {
        Self {
            topic_id: event.topic(),
            event_type: event.event_type_str(),
            payload: serde_json::to_value(event).unwrap_or_default(),
        }
    }
}
