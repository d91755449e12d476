//! Background task appending bus events to the event log.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use super::models::NewEvent;
use super::postgres::PostgresPersistence;
use crate::domain::{EventBus, MeetupEvent};

const CLEANUP_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Returns the retention cutoff for `retention_days`, or `None` when events
/// are kept forever.
#[must_use]
pub fn retention_cutoff(now: DateTime<Utc>, retention_days: u64) -> Option<DateTime<Utc>> {
    if retention_days == 0 {
        return None;
    }
    let days = i64::try_from(retention_days).ok()?;
    chrono::Duration::try_days(days).and_then(|span| now.checked_sub_signed(span))
}

/// Subscribes to `bus` and appends every event to `persistence` until the
/// bus closes. Old rows are pruned hourly.
#[must_use]
pub fn spawn_event_logger(
    persistence: PostgresPersistence,
    bus: &EventBus,
    retention_days: u64,
) -> JoinHandle<()> {
    let rx = bus.subscribe();
    tokio::spawn(run_event_logger(persistence, rx, retention_days))
}

/// Awaits the task returned by [`spawn_event_logger`] and logs how it
/// ended. Returns `true` if it stopped because the bus closed.
pub async fn watch_event_logger(handle: JoinHandle<()>) -> bool {
    match handle.await {
        Ok(()) => {
            tracing::info!("event logger finished");
            true
        }
        Err(e) if e.is_panic() => {
            tracing::error!(error = %e, "event logger panicked; events are no longer logged");
            false
        }
        Err(e) => {
            tracing::warn!(error = %e, "event logger cancelled");
            false
        }
    }
}

async fn run_event_logger(
    persistence: PostgresPersistence,
    mut rx: broadcast::Receiver<MeetupEvent>,
    retention_days: u64,
) {
    let mut cleanup = tokio::time::interval(CLEANUP_INTERVAL);
    loop {
        tokio::select! {
            event = rx.recv() => {
                match event {
                    Ok(event) => {
                        let row = NewEvent::from(&event);
                        if let Err(e) = persistence.save_event(&row).await {
                            tracing::error!(error = %e, event_type = row.event_type, topic_id = %row.topic_id, "failed to log event");
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(lagged = n, "event logger lagged behind event bus");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            _ = cleanup.tick() => {
                let Some(cutoff) = retention_cutoff(Utc::now(), retention_days) else {
                    continue;
                };
                match persistence.delete_events_before(cutoff).await {
                    Ok(deleted) if deleted > 0 => tracing::info!(deleted, "pruned old events"),
                    Ok(_) => {}
                    Err(e) => tracing::error!(error = %e, "failed to prune events"),
                }
            }
        }
    }
    tracing::debug!("event logger stopped");
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn logger_exit_is_reported() {
        assert!(watch_event_logger(tokio::spawn(async {})).await);

        let crashed = tokio::spawn(async { panic!("logger crashed") });
        assert!(!watch_event_logger(crashed).await);

        let stuck = tokio::spawn(std::future::pending::<()>());
        stuck.abort();
        assert!(!watch_event_logger(stuck).await);
    }

    #[test]
    fn zero_retention_keeps_everything() {
        assert_eq!(retention_cutoff(Utc::now(), 0), None);
    }

    #[test]
    fn cutoff_is_days_in_the_past() {
        let now = Utc::now();
        let Some(cutoff) = retention_cutoff(now, 30) else {
            panic!("expected cutoff");
        };
        assert_eq!((now - cutoff).num_days(), 30);
    }

    #[test]
    fn absurd_retention_saturates_to_none() {
        assert_eq!(retention_cutoff(Utc::now(), u64::MAX), None);
    }
}
