//! Client-side proximity tracking for one participant of one session.
//!
//! [`ProximityTracker`] asks for location permission, forwards device fixes
//! to the [`SessionService`], stops watching as soon as both participants
//! are within the arrival radius, completes the meetup and surfaces the
//! reward exactly once.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use super::geo_source::{GeoSource, Permission, PositionWatch, WatchOptions};
use crate::domain::{MeetupSession, PositionSample, RewardRecord, SessionId, UserId};
use crate::error::MeetupError;
use crate::service::{LocationUpdate, SessionService, UpdateOutcome};
use crate::store::{DocumentStore, DocumentWatch};

/// Receiver of the one-time reward notification.
pub trait RewardSink: Send + Sync + fmt::Debug {
    /// Called at most once per tracker.
    fn reward_earned(&self, session_id: SessionId, reward: &RewardRecord);
}

/// Tracker tuning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackerConfig {
    /// Options passed to [`GeoSource::watch_position`].
    pub watch: WatchOptions,
    /// Attempts per store call, including the first one.
    pub max_attempts: u32,
    /// Delay before the first retry; doubled on each further retry.
    pub backoff_base: Duration,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            watch: WatchOptions::default(),
            max_attempts: 3,
            backoff_base: Duration::from_millis(500),
        }
    }
}

/// Observable state of a [`ProximityTracker`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TrackerState {
    /// Not started.
    Idle,
    /// Location permission was refused; nothing is tracked.
    PermissionRequired,
    /// Watching the device location.
    Tracking,
    /// The meetup is done. Terminal.
    Completed {
        /// Reward stored on the session, if any.
        reward: Option<RewardRecord>,
    },
    /// Tracking stopped on an error.
    Error {
        /// Error description.
        message: String,
        /// Whether [`ProximityTracker::retry`] may succeed.
        retryable: bool,
    },
    /// Stopped by the host.
    Stopped,
}

/// Drives location tracking for `user_id` in `session_id`.
#[derive(Debug)]
pub struct ProximityTracker<G, S> {
    geo: Arc<G>,
    sessions: Arc<SessionService<S>>,
    sink: Arc<dyn RewardSink>,
    session_id: SessionId,
    user_id: UserId,
    config: TrackerConfig,
    state: TrackerState,
    watch: Option<PositionWatch>,
    live: Option<DocumentWatch<MeetupSession>>,
    last_update: Option<LocationUpdate>,
    reward_surfaced: bool,
}

impl<G, S> ProximityTracker<G, S>
where
    G: GeoSource,
    S: DocumentStore<MeetupSession>,
{
    /// Creates an idle tracker.
    #[must_use]
    pub fn new(
        geo: Arc<G>,
        sessions: Arc<SessionService<S>>,
        sink: Arc<dyn RewardSink>,
        session_id: SessionId,
        user_id: UserId,
        config: TrackerConfig,
    ) -> Self {
        Self {
            geo,
            sessions,
            sink,
            session_id,
            user_id,
            config,
            state: TrackerState::Idle,
            watch: None,
            live: None,
            last_update: None,
            reward_surfaced: false,
        }
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> &TrackerState {
        &self.state
    }

    /// Returns the result of the last forwarded sample.
    #[must_use]
    pub fn last_update(&self) -> Option<&LocationUpdate> {
        self.last_update.as_ref()
    }

    /// Returns `true` while a location watch is open.
    #[must_use]
    pub fn is_watching(&self) -> bool {
        self.watch.as_ref().is_some_and(PositionWatch::is_active)
    }

    /// Requests permission, loads the session, forwards one immediate fix
    /// and opens the location watch.
    pub async fn start(&mut self) -> &TrackerState {
        if matches!(self.state, TrackerState::Completed { .. }) {
            return &self.state;
        }
        self.cancel_watch();

        if self.geo.request_permission().await == Permission::Denied {
            tracing::info!(session_id = %self.session_id, user_id = %self.user_id, "location permission denied");
            self.state = TrackerState::PermissionRequired;
            return &self.state;
        }

        let config = self.config;
        let sessions = Arc::clone(&self.sessions);
        let session_id = self.session_id;
        let loaded = retry_transient(&config, || sessions.get_session(session_id)).await;
        let session = match loaded {
            Ok(session) => session,
            Err(e) => {
                self.fail(&e);
                return &self.state;
            }
        };
        if !session.is_participant(&self.user_id) {
            self.fail(&MeetupError::Unauthorized {
                user_id: self.user_id.to_string(),
            });
            return &self.state;
        }
        if session.is_completed() {
            self.state = TrackerState::Completed {
                reward: session.reward,
            };
            return &self.state;
        }

        self.live = Some(self.sessions.watch_session(session_id));
        self.state = TrackerState::Tracking;
        match self.geo.current_position(self.config.watch.high_accuracy).await {
            Ok(sample) => {
                self.forward(sample).await;
                if self.state != TrackerState::Tracking {
                    return &self.state;
                }
            }
            Err(e) => {
                tracing::warn!(session_id = %self.session_id, error = %e, "no initial fix, waiting for watch");
            }
        }

        self.open_watch();
        &self.state
    }

    /// Waits for the next batch of samples and forwards the newest one.
    ///
    /// Returns `false` when there is nothing left to process: the tracker
    /// left the tracking state or the watch ended.
    pub async fn process_next(&mut self) -> bool {
        if self.state != TrackerState::Tracking {
            return false;
        }
        let Some(watch) = self.watch.as_mut() else {
            return false;
        };
        let Some(mut sample) = watch.next().await else {
            self.watch_ended();
            return false;
        };
        while let Some(newer) = watch.try_next() {
            sample = newer;
        }
        self.forward(sample).await;
        self.state == TrackerState::Tracking
    }

    /// Runs until the tracker leaves the tracking state, reacting to both
    /// device samples and committed session changes.
    pub async fn run(&mut self) -> &TrackerState {
        let mut live = self
            .live
            .take()
            .unwrap_or_else(|| self.sessions.watch_session(self.session_id));
        let mut live_open = true;
        while self.state == TrackerState::Tracking {
            let Some(watch) = self.watch.as_mut() else {
                break;
            };
            tokio::select! {
                sample = watch.next() => {
                    let Some(mut sample) = sample else {
                        self.watch_ended();
                        break;
                    };
                    if let Some(watch) = self.watch.as_mut() {
                        while let Some(newer) = watch.try_next() {
                            sample = newer;
                        }
                    }
                    self.forward(sample).await;
                }
                changed = live.changed(), if live_open => {
                    match changed {
                        Some(session) => self.on_session_update(&session),
                        None => live_open = false,
                    }
                }
            }
        }
        &self.state
    }

    /// Applies a committed session snapshot pushed by the store.
    pub fn on_session_update(&mut self, session: &MeetupSession) {
        if session.id != self.session_id || !session.is_completed() {
            return;
        }
        self.cancel_watch();
        if let Some(reward) = &session.reward {
            self.surface(reward);
        }
        self.state = TrackerState::Completed {
            reward: session.reward.clone(),
        };
    }

    /// Stops tracking. The watch is cancelled before this returns.
    pub fn stop(&mut self) {
        self.cancel_watch();
        if !matches!(self.state, TrackerState::Completed { .. }) {
            self.state = TrackerState::Stopped;
        }
    }

    /// Restarts after an error, a stop or a refused permission.
    pub async fn retry(&mut self) -> &TrackerState {
        match self.state {
            TrackerState::Error { .. } | TrackerState::Stopped | TrackerState::PermissionRequired => {
                self.start().await
            }
            _ => &self.state,
        }
    }

    async fn forward(&mut self, sample: PositionSample) {
        let config = self.config;
        let sessions = Arc::clone(&self.sessions);
        let session_id = self.session_id;
        let user_id = self.user_id.clone();
        let result = retry_transient(&config, || {
            sessions.update_location(session_id, &user_id, sample)
        })
        .await;

        match result {
            Ok(update) => {
                let outcome = update.outcome;
                let can_check_in = update.can_check_in;
                self.last_update = Some(update);
                if outcome == UpdateOutcome::SessionCompleted {
                    self.cancel_watch();
                    match sessions.get_session(session_id).await {
                        Ok(session) => self.on_session_update(&session),
                        Err(e) => self.fail(&e),
                    }
                } else if can_check_in {
                    self.cancel_watch();
                    self.complete().await;
                }
            }
            Err(MeetupError::InvalidCoordinate(reason)) => {
                tracing::warn!(%session_id, %reason, "dropping malformed location sample");
            }
            Err(e) => self.fail(&e),
        }
    }

    async fn complete(&mut self) {
        let config = self.config;
        let sessions = Arc::clone(&self.sessions);
        let session_id = self.session_id;
        let user_id = self.user_id.clone();
        let result =
            retry_transient(&config, || sessions.complete_meetup(session_id, &user_id)).await;

        match result {
            Ok(result) => {
                self.surface(&result.reward);
                self.state = TrackerState::Completed {
                    reward: Some(result.reward),
                };
            }
            Err(MeetupError::NotArrived) => {
                // A participant moved out between the check and the write.
                tracing::debug!(%session_id, "arrival no longer holds, resuming tracking");
                self.open_watch();
            }
            Err(e) => self.fail(&e),
        }
    }

    fn open_watch(&mut self) {
        match self.geo.watch_position(self.config.watch) {
            Ok(watch) => {
                self.watch = Some(watch);
                self.state = TrackerState::Tracking;
                tracing::debug!(session_id = %self.session_id, user_id = %self.user_id, "location watch opened");
            }
            Err(e) => self.fail(&e),
        }
    }

    fn cancel_watch(&mut self) {
        if let Some(mut watch) = self.watch.take() {
            watch.cancel();
        }
    }

    fn watch_ended(&mut self) {
        self.cancel_watch();
        if self.state == TrackerState::Tracking {
            self.fail(&MeetupError::LocationUnavailable(
                "location updates stopped".to_string(),
            ));
        }
    }

    fn surface(&mut self, reward: &RewardRecord) {
        if self.reward_surfaced {
            return;
        }
        self.reward_surfaced = true;
        self.sink.reward_earned(self.session_id, reward);
    }

    fn fail(&mut self, error: &MeetupError) {
        self.cancel_watch();
        let retryable = matches!(
            error,
            MeetupError::StoreUnavailable(_) | MeetupError::LocationUnavailable(_)
        );
        tracing::warn!(
            session_id = %self.session_id,
            user_id = %self.user_id,
            error = %error,
            retryable,
            "proximity tracking failed"
        );
        self.state = TrackerState::Error {
            message: error.to_string(),
            retryable,
        };
    }
}

/// Runs `op`, retrying transient store failures with exponential backoff.
async fn retry_transient<T, F, Fut>(config: &TrackerConfig, mut op: F) -> Result<T, MeetupError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, MeetupError>>,
{
    let mut attempt = 1u32;
    loop {
        match op().await {
            Err(e) if e.is_transient() && attempt < config.max_attempts => {
                let factor = 2u32.saturating_pow(attempt - 1);
                let delay = config
                    .backoff_base
                    .checked_mul(factor)
                    .unwrap_or(config.backoff_base);
                tracing::warn!(attempt, ?delay, error = %e, "store call failed, retrying");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            result => return result,
        }
    }
}
