//! PostgreSQL implementation of the event log.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::models::{NewEvent, StoredEvent};
use crate::error::MeetupError;

const CREATE_EVENTS_TABLE: &str = "CREATE TABLE IF NOT EXISTS meetup_events (\
     id BIGSERIAL PRIMARY KEY, \
     topic_id UUID NOT NULL, \
     event_type TEXT NOT NULL, \
     payload JSONB NOT NULL, \
     created_at TIMESTAMPTZ NOT NULL DEFAULT now())";

const CREATE_EVENTS_INDEX: &str = "CREATE INDEX IF NOT EXISTS meetup_events_topic_created \
     ON meetup_events (topic_id, created_at)";

/// PostgreSQL-backed event log using `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PostgresPersistence {
    pool: PgPool,
}

impl PostgresPersistence {
    /// Creates a new persistence layer with the given connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates the event table and its index if they do not exist.
    ///
    /// # Errors
    ///
    /// Returns a [`MeetupError::PersistenceError`] on database failure.
    pub async fn ensure_schema(&self) -> Result<(), MeetupError> {
        for statement in [CREATE_EVENTS_TABLE, CREATE_EVENTS_INDEX] {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| MeetupError::PersistenceError(e.to_string()))?;
        }
        Ok(())
    }

    /// Appends an event to the event log.
    ///
    /// # Errors
    ///
    /// Returns a [`MeetupError::PersistenceError`] on database failure.
    pub async fn save_event(&self, event: &NewEvent) -> Result<i64, MeetupError> {
        let row = sqlx::query_scalar::<_, i64>(
            "INSERT INTO meetup_events (topic_id, event_type, payload) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(event.topic_id)
        .bind(event.event_type)
        .bind(&event.payload)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| MeetupError::PersistenceError(e.to_string()))?;

        Ok(row)
    }

    /// Loads events after the given timestamp, optionally filtered by topic.
    ///
    /// # Errors
    ///
    /// Returns a [`MeetupError::PersistenceError`] on database failure.
    pub async fn load_events_after(
        &self,
        after: DateTime<Utc>,
        topic_id: Option<Uuid>,
    ) -> Result<Vec<StoredEvent>, MeetupError> {
        let rows = if let Some(topic) = topic_id {
            sqlx::query_as::<_, (i64, Uuid, String, serde_json::Value, DateTime<Utc>)>(
                "SELECT id, topic_id, event_type, payload, created_at FROM meetup_events \
                 WHERE created_at > $1 AND topic_id = $2 ORDER BY created_at ASC",
            )
            .bind(after)
            .bind(topic)
            .fetch_all(&self.pool)
            .await
        } else {
            sqlx::query_as::<_, (i64, Uuid, String, serde_json::Value, DateTime<Utc>)>(
                "SELECT id, topic_id, event_type, payload, created_at FROM meetup_events \
                 WHERE created_at > $1 ORDER BY created_at ASC",
            )
            .bind(after)
            .fetch_all(&self.pool)
            .await
        }
        .map_err(|e| MeetupError::PersistenceError(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(
                |(id, topic_id, event_type, payload, created_at)| StoredEvent {
                    id,
                    topic_id,
                    event_type,
                    payload,
                    created_at,
                },
            )
            .collect())
    }

    /// Deletes events created before `cutoff`.
    ///
    /// # Errors
    ///
    /// Returns a [`MeetupError::PersistenceError`] on database failure.
    pub async fn delete_events_before(&self, cutoff: DateTime<Utc>) -> Result<u64, MeetupError> {
        let result = sqlx::query("DELETE FROM meetup_events WHERE created_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .map_err(|e| MeetupError::PersistenceError(e.to_string()))?;

        Ok(result.rows_affected())
    }
}
