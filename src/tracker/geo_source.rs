//! Device location source.
//!
//! [`GeoSource`] is the contract of the platform location API: permission,
//! a one-shot fix, and a push-based watch. [`ChannelGeoSource`] is fed by
//! the host (a device bridge, a replayed trace, or a test) and applies the
//! watch throttling options itself.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Duration;
use serde::Serialize;
use tokio::sync::mpsc;

use crate::domain::{PositionSample, distance_meters};
use crate::error::MeetupError;

/// Outcome of a permission request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    /// Location access allowed.
    Granted,
    /// Location access refused.
    Denied,
}

/// Throttling options of a location watch: a sample is delivered when
/// either threshold is crossed since the last delivered one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WatchOptions {
    /// Minimum time between delivered samples.
    pub min_interval: Duration,
    /// Minimum movement between delivered samples, in meters.
    pub min_distance_meters: f64,
    /// Ask the platform for GPS-grade fixes.
    pub high_accuracy: bool,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            min_interval: Duration::seconds(10),
            min_distance_meters: 10.0,
            high_accuracy: true,
        }
    }
}

/// Handle of an active location watch.
///
/// Samples arrive through [`PositionWatch::next`]. [`PositionWatch::cancel`]
/// stops delivery immediately; dropping the handle cancels too.
#[derive(Debug)]
pub struct PositionWatch {
    rx: mpsc::Receiver<PositionSample>,
    active: Arc<AtomicBool>,
}

impl PositionWatch {
    /// Wraps the receiving end of a watch. `active` is shared with the
    /// producer, which must stop sending once it reads `false`.
    #[must_use]
    pub fn new(rx: mpsc::Receiver<PositionSample>, active: Arc<AtomicBool>) -> Self {
        Self { rx, active }
    }

    /// Waits for the next sample. Returns `None` once cancelled or when the
    /// producer is gone.
    pub async fn next(&mut self) -> Option<PositionSample> {
        if !self.is_active() {
            return None;
        }
        self.rx.recv().await
    }

    /// Returns an already-buffered sample without waiting.
    pub fn try_next(&mut self) -> Option<PositionSample> {
        if !self.is_active() {
            return None;
        }
        self.rx.try_recv().ok()
    }

    /// Stops the watch. Takes effect before this call returns.
    pub fn cancel(&mut self) {
        self.active.store(false, Ordering::SeqCst);
        self.rx.close();
    }

    /// Returns `false` once the watch was cancelled.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

impl Drop for PositionWatch {
    fn drop(&mut self) {
        self.active.store(false, Ordering::SeqCst);
    }
}

/// Contract of the platform location API.
pub trait GeoSource: Send + Sync {
    /// Asks the user for location access.
    fn request_permission(&self) -> impl Future<Output = Permission> + Send;

    /// Takes a single fix.
    ///
    /// # Errors
    ///
    /// Returns [`MeetupError::LocationUnavailable`] if no fix can be taken.
    fn current_position(
        &self,
        high_accuracy: bool,
    ) -> impl Future<Output = Result<PositionSample, MeetupError>> + Send;

    /// Starts pushing samples according to `options`.
    ///
    /// # Errors
    ///
    /// Returns [`MeetupError::LocationUnavailable`] if the platform cannot
    /// start watching.
    fn watch_position(&self, options: WatchOptions) -> Result<PositionWatch, MeetupError>;
}

#[derive(Debug)]
struct Watcher {
    tx: mpsc::Sender<PositionSample>,
    active: Arc<AtomicBool>,
    options: WatchOptions,
    last_sent: Option<PositionSample>,
}

impl Watcher {
    fn wants(&self, sample: &PositionSample) -> bool {
        let Some(last) = &self.last_sent else {
            return true;
        };
        if sample.captured_at - last.captured_at >= self.options.min_interval {
            return true;
        }
        match (last.coord(), sample.coord()) {
            (Ok(from), Ok(to)) => distance_meters(from, to) >= self.options.min_distance_meters,
            // Let malformed fixes through; the consumer decides what to drop.
            _ => true,
        }
    }
}

#[derive(Debug)]
struct SourceState {
    permission: Permission,
    current: Option<PositionSample>,
    watchers: Vec<Watcher>,
    fail_next_watch: bool,
}

impl SourceState {
    /// Drops watchers whose handle was cancelled or dropped.
    fn prune(&mut self) {
        self.watchers
            .retain(|w| w.active.load(Ordering::SeqCst) && !w.tx.is_closed());
    }
}

/// [`GeoSource`] driven by samples the host pushes in.
#[derive(Debug)]
pub struct ChannelGeoSource {
    state: Mutex<SourceState>,
    buffer: usize,
}

impl ChannelGeoSource {
    /// Creates a source with the given permission answer and no fix yet.
    #[must_use]
    pub fn new(permission: Permission) -> Self {
        Self {
            state: Mutex::new(SourceState {
                permission,
                current: None,
                watchers: Vec::new(),
                fail_next_watch: false,
            }),
            buffer: 64,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SourceState> {
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Changes the answer to future permission requests.
    pub fn set_permission(&self, permission: Permission) {
        self.lock().permission = permission;
    }

    /// Sets the fix returned by [`GeoSource::current_position`] without
    /// notifying watchers.
    pub fn set_current(&self, sample: PositionSample) {
        self.lock().current = Some(sample);
    }

    /// Makes the next [`GeoSource::watch_position`] call fail.
    pub fn fail_next_watch(&self) {
        self.lock().fail_next_watch = true;
    }

    /// Publishes a new fix to every active watch whose throttle lets it
    /// through. Returns how many watches received it.
    pub fn push(&self, sample: PositionSample) -> usize {
        let mut state = self.lock();
        state.current = Some(sample);
        state.prune();

        let mut delivered = 0;
        for watcher in &mut state.watchers {
            if !watcher.wants(&sample) {
                continue;
            }
            // A full buffer means the consumer is behind; it only needs the
            // newest fixes, so dropping is fine.
            if watcher.tx.try_send(sample).is_ok() {
                watcher.last_sent = Some(sample);
                delivered += 1;
            }
        }
        delivered
    }

    /// Returns the number of watches that have not been cancelled.
    #[must_use]
    pub fn active_watches(&self) -> usize {
        let mut state = self.lock();
        state.prune();
        state.watchers.len()
    }

    #[cfg(test)]
    fn registered_watches(&self) -> usize {
        self.lock().watchers.len()
    }
}

impl GeoSource for ChannelGeoSource {
    async fn request_permission(&self) -> Permission {
        self.lock().permission
    }

    async fn current_position(&self, _high_accuracy: bool) -> Result<PositionSample, MeetupError> {
        let state = self.lock();
        if state.permission == Permission::Denied {
            return Err(MeetupError::PermissionDenied);
        }
        state
            .current
            .ok_or_else(|| MeetupError::LocationUnavailable("no fix yet".to_string()))
    }

    fn watch_position(&self, options: WatchOptions) -> Result<PositionWatch, MeetupError> {
        let mut state = self.lock();
        if state.permission == Permission::Denied {
            return Err(MeetupError::PermissionDenied);
        }
        if state.fail_next_watch {
            state.fail_next_watch = false;
            return Err(MeetupError::LocationUnavailable(
                "location services are off".to_string(),
            ));
        }
        state.prune();
        let (tx, rx) = mpsc::channel(self.buffer);
        let active = Arc::new(AtomicBool::new(true));
        state.watchers.push(Watcher {
            tx,
            active: Arc::clone(&active),
            options,
            last_sent: None,
        });
        Ok(PositionWatch::new(rx, active))
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn sample(lat: f64, seconds: i64) -> PositionSample {
        let base = chrono::DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap_or_default();
        PositionSample {
            latitude: lat,
            longitude: 106.0,
            accuracy: None,
            captured_at: base + Duration::seconds(seconds),
        }
    }

    #[tokio::test]
    async fn throttle_passes_on_time_or_distance() {
        let source = ChannelGeoSource::new(Permission::Granted);
        let Ok(mut watch) = source.watch_position(WatchOptions::default()) else {
            panic!("watch failed");
        };

        assert_eq!(source.push(sample(10.0, 0)), 1);
        // 2 s later and ~1 m away: throttled.
        assert_eq!(source.push(sample(10.00001, 2)), 0);
        // 3 s later but ~55 m away: delivered.
        assert_eq!(source.push(sample(10.0005, 3)), 1);
        // Same place, 11 s after the last delivery: delivered.
        assert_eq!(source.push(sample(10.0005, 14)), 1);

        let mut received = 0;
        while watch.try_next().is_some() {
            received += 1;
        }
        assert_eq!(received, 3);
    }

    #[test]
    fn cancelled_watches_are_released_without_pushes() {
        let source = ChannelGeoSource::new(Permission::Granted);
        for _ in 0..10 {
            let Ok(mut watch) = source.watch_position(WatchOptions::default()) else {
                panic!("watch failed");
            };
            watch.cancel();
        }
        let Ok(last) = source.watch_position(WatchOptions::default()) else {
            panic!("watch failed");
        };
        assert_eq!(source.registered_watches(), 1);
        drop(last);
        assert_eq!(source.active_watches(), 0);
        assert_eq!(source.registered_watches(), 0);
    }

    #[tokio::test]
    async fn cancel_stops_delivery_immediately() {
        let source = ChannelGeoSource::new(Permission::Granted);
        let Ok(mut watch) = source.watch_position(WatchOptions::default()) else {
            panic!("watch failed");
        };
        assert_eq!(source.active_watches(), 1);
        watch.cancel();
        assert!(!watch.is_active());
        assert_eq!(source.active_watches(), 0);
        assert_eq!(source.push(sample(10.0, 0)), 0);
        assert!(watch.next().await.is_none());
    }

    #[tokio::test]
    async fn denied_permission_blocks_fixes() {
        let source = ChannelGeoSource::new(Permission::Denied);
        assert_eq!(source.request_permission().await, Permission::Denied);
        assert!(matches!(
            source.current_position(true).await,
            Err(MeetupError::PermissionDenied)
        ));
        assert!(source.watch_position(WatchOptions::default()).is_err());
    }

    #[tokio::test]
    async fn injected_watch_failure_is_one_shot() {
        let source = ChannelGeoSource::new(Permission::Granted);
        source.fail_next_watch();
        assert!(matches!(
            source.watch_position(WatchOptions::default()),
            Err(MeetupError::LocationUnavailable(_))
        ));
        assert!(source.watch_position(WatchOptions::default()).is_ok());
    }
}
