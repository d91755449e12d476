//! Session handlers: state, location reports and completion.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;

use crate::api::caller::Caller;
use crate::api::dto::LocationRequest;
use crate::app_state::AppState;
use crate::domain::{MeetupSession, SessionId};
use crate::error::{ErrorResponse, MeetupError};
use crate::service::{LocationUpdate, RewardResult};

/// `GET /sessions/{id}`: Get a meetup session.
///
/// # Errors
///
/// Returns [`MeetupError::NotFound`] or [`MeetupError::Unauthorized`].
#[utoipa::path(
    get,
    path = "/api/v1/sessions/{id}",
    tag = "Sessions",
    summary = "Get a meetup session",
    params(
        ("id" = uuid::Uuid, Path, description = "Session UUID"),
        ("x-user-id" = String, Header, description = "Acting user"),
    ),
    responses(
        (status = 200, description = "Session", body = MeetupSession),
        (status = 403, description = "Caller is not a participant", body = ErrorResponse),
        (status = 404, description = "Session not found", body = ErrorResponse),
    )
)]
pub async fn get_session(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, MeetupError> {
    let session = state
        .session_service
        .get_session(SessionId::from_uuid(id))
        .await?;
    if !session.is_participant(&caller) {
        return Err(MeetupError::Unauthorized {
            user_id: caller.to_string(),
        });
    }
    Ok(Json(session))
}

/// `POST /sessions/{id}/location`: Report the caller's position.
///
/// # Errors
///
/// Returns [`MeetupError::InvalidCoordinate`], [`MeetupError::NotFound`] or
/// [`MeetupError::Unauthorized`].
#[utoipa::path(
    post,
    path = "/api/v1/sessions/{id}/location",
    tag = "Sessions",
    summary = "Report a location sample",
    description = "Records the caller's latest check-in and returns the distance to the meeting point and whether both participants can check in.",
    request_body = LocationRequest,
    params(
        ("id" = uuid::Uuid, Path, description = "Session UUID"),
        ("x-user-id" = String, Header, description = "Acting user"),
    ),
    responses(
        (status = 200, description = "Sample processed", body = LocationUpdate),
        (status = 400, description = "Invalid coordinate", body = ErrorResponse),
        (status = 403, description = "Caller is not a participant", body = ErrorResponse),
        (status = 404, description = "Session not found", body = ErrorResponse),
    )
)]
pub async fn update_location(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<uuid::Uuid>,
    Json(req): Json<LocationRequest>,
) -> Result<impl IntoResponse, MeetupError> {
    let sample = req.into_sample(Utc::now());
    let update = state
        .session_service
        .update_location(SessionId::from_uuid(id), &caller, sample)
        .await?;
    Ok(Json(update))
}

/// `POST /sessions/{id}/complete`: Complete the meetup.
///
/// Idempotent: every call after the first returns the same reward with
/// `newly_issued == false`.
///
/// # Errors
///
/// Returns [`MeetupError::NotArrived`] until both participants are within
/// the arrival radius.
#[utoipa::path(
    post,
    path = "/api/v1/sessions/{id}/complete",
    tag = "Sessions",
    summary = "Complete the meetup",
    params(
        ("id" = uuid::Uuid, Path, description = "Session UUID"),
        ("x-user-id" = String, Header, description = "Acting user"),
    ),
    responses(
        (status = 200, description = "Reward issued or already issued", body = RewardResult),
        (status = 403, description = "Caller is not a participant", body = ErrorResponse),
        (status = 409, description = "Participants have not arrived", body = ErrorResponse),
    )
)]
pub async fn complete_meetup(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, MeetupError> {
    let result = state
        .session_service
        .complete_meetup(SessionId::from_uuid(id), &caller)
        .await?;
    Ok(Json(result))
}

/// Session routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/sessions/{id}", get(get_session))
        .route("/sessions/{id}/location", post(update_location))
        .route("/sessions/{id}/complete", post(complete_meetup))
}
