//! System endpoints: health check and meetup policy.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use crate::app_state::AppState;

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    status: String,
    timestamp: String,
    version: String,
}

/// `GET /health`: Service health status.
#[utoipa::path(
    get,
    path = "/health",
    tag = "System",
    summary = "Health check",
    description = "Returns service health status, version, and current timestamp.",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
    )
)]
pub async fn health_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
            timestamp: Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}

/// Meetup policy as seen by clients.
#[derive(Debug, Serialize, ToSchema)]
pub struct MeetupConfigResponse {
    arrival_radius_meters: f64,
    reward_points: u32,
    reward_message: String,
    invite_ttl_hours: u64,
    watch_min_interval_secs: u64,
    watch_min_distance_meters: f64,
}

/// `GET /config/meetup`: Active meetup policy.
#[utoipa::path(
    get,
    path = "/config/meetup",
    tag = "System",
    summary = "Meetup policy",
    description = "Returns the arrival radius, reward and invite lifetime the gateway runs with, plus the location watch settings clients should use.",
    responses(
        (status = 200, description = "Meetup policy", body = MeetupConfigResponse),
    )
)]
pub async fn meetup_config_handler(State(state): State<AppState>) -> impl IntoResponse {
    let watch = crate::tracker::WatchOptions::default();
    (
        StatusCode::OK,
        Json(MeetupConfigResponse {
            arrival_radius_meters: state.meetup.arrival_radius_meters,
            reward_points: state.meetup.reward_points,
            reward_message: state.meetup.reward_message.clone(),
            invite_ttl_hours: state.meetup.invite_ttl_hours,
            watch_min_interval_secs: u64::try_from(watch.min_interval.num_seconds())
                .unwrap_or_default(),
            watch_min_distance_meters: watch.min_distance_meters,
        }),
    )
}

/// System routes mounted at the root level (not under /api/v1).
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_handler))
        .route("/config/meetup", get(meetup_config_handler))
}
