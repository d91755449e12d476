//! Persistence layer: PostgreSQL event log.
//!
//! Meetup state lives in the document store; the database keeps an
//! append-only log of every [`crate::domain::MeetupEvent`] for audit and
//! replay. The concrete implementation uses `sqlx::PgPool`.

pub mod logger;
pub mod models;
pub mod postgres;

pub use logger::{retention_cutoff, spawn_event_logger, watch_event_logger};
pub use models::{NewEvent, StoredEvent};
pub use postgres::PostgresPersistence;
