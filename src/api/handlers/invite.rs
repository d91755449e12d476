//! Invite handlers: send, get, respond and confirm going.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::caller::Caller;
use crate::api::dto::{InviteResponse, SendInviteRequest};
use crate::app_state::AppState;
use crate::domain::{Invite, InviteId};
use crate::error::{ErrorResponse, MeetupError};
use crate::service::ConfirmOutcome;

fn view(state: &AppState, invite: Invite) -> InviteResponse {
    let effective_status = state.invite_service.effective_status(&invite);
    InviteResponse {
        invite,
        effective_status,
    }
}

/// `POST /invites`: Invite another user to meet at a venue.
///
/// # Errors
///
/// Returns [`MeetupError::InvalidRequest`] for self-invites or a blank
/// venue id.
#[utoipa::path(
    post,
    path = "/api/v1/invites",
    tag = "Invites",
    summary = "Send an invite",
    description = "Creates a pending invite from the caller to `receiver_id` for a hotspot or event.",
    request_body = SendInviteRequest,
    params(("x-user-id" = String, Header, description = "Acting user")),
    responses(
        (status = 201, description = "Invite created", body = InviteResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse),
    )
)]
pub async fn send_invite(
    State(state): State<AppState>,
    Caller(sender): Caller,
    Json(req): Json<SendInviteRequest>,
) -> Result<impl IntoResponse, MeetupError> {
    let invite = state
        .invite_service
        .send_invite(sender, req.receiver_id, req.venue)
        .await?;
    Ok((StatusCode::CREATED, Json(view(&state, invite))))
}

/// `GET /invites/{id}`: Get an invite.
///
/// # Errors
///
/// Returns [`MeetupError::NotFound`] if the invite does not exist, or
/// [`MeetupError::Unauthorized`] if the caller is not a participant.
#[utoipa::path(
    get,
    path = "/api/v1/invites/{id}",
    tag = "Invites",
    summary = "Get an invite",
    params(
        ("id" = uuid::Uuid, Path, description = "Invite UUID"),
        ("x-user-id" = String, Header, description = "Acting user"),
    ),
    responses(
        (status = 200, description = "Invite", body = InviteResponse),
        (status = 403, description = "Caller is not a participant", body = ErrorResponse),
        (status = 404, description = "Invite not found", body = ErrorResponse),
    )
)]
pub async fn get_invite(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, MeetupError> {
    let invite = state
        .invite_service
        .get_invite(InviteId::from_uuid(id))
        .await?;
    if invite.role_of(&caller).is_none() {
        return Err(MeetupError::Unauthorized {
            user_id: caller.to_string(),
        });
    }
    Ok(Json(view(&state, invite)))
}

/// `POST /invites/{id}/accept`: Receiver accepts.
///
/// # Errors
///
/// Returns [`MeetupError::Unauthorized`] unless the caller is the receiver,
/// or [`MeetupError::InvalidState`] if the invite is no longer pending.
#[utoipa::path(
    post,
    path = "/api/v1/invites/{id}/accept",
    tag = "Invites",
    summary = "Accept an invite",
    params(
        ("id" = uuid::Uuid, Path, description = "Invite UUID"),
        ("x-user-id" = String, Header, description = "Acting user"),
    ),
    responses(
        (status = 200, description = "Invite accepted", body = InviteResponse),
        (status = 403, description = "Caller is not the receiver", body = ErrorResponse),
        (status = 409, description = "Invite is not pending", body = ErrorResponse),
    )
)]
pub async fn accept_invite(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, MeetupError> {
    let invite = state
        .invite_service
        .accept_invite(InviteId::from_uuid(id), &caller)
        .await?;
    Ok(Json(view(&state, invite)))
}

/// `POST /invites/{id}/decline`: Receiver declines.
///
/// # Errors
///
/// Returns [`MeetupError::Unauthorized`] unless the caller is the receiver,
/// or [`MeetupError::InvalidState`] if the invite is no longer pending.
#[utoipa::path(
    post,
    path = "/api/v1/invites/{id}/decline",
    tag = "Invites",
    summary = "Decline an invite",
    params(
        ("id" = uuid::Uuid, Path, description = "Invite UUID"),
        ("x-user-id" = String, Header, description = "Acting user"),
    ),
    responses(
        (status = 200, description = "Invite declined", body = InviteResponse),
        (status = 403, description = "Caller is not the receiver", body = ErrorResponse),
        (status = 409, description = "Invite is not pending", body = ErrorResponse),
    )
)]
pub async fn decline_invite(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, MeetupError> {
    let invite = state
        .invite_service
        .decline_invite(InviteId::from_uuid(id), &caller)
        .await?;
    Ok(Json(view(&state, invite)))
}

/// `POST /invites/{id}/expire`: Either participant withdraws the invite.
///
/// # Errors
///
/// Returns [`MeetupError::InvalidState`] once a session exists.
#[utoipa::path(
    post,
    path = "/api/v1/invites/{id}/expire",
    tag = "Invites",
    summary = "Withdraw an invite",
    params(
        ("id" = uuid::Uuid, Path, description = "Invite UUID"),
        ("x-user-id" = String, Header, description = "Acting user"),
    ),
    responses(
        (status = 200, description = "Invite expired", body = InviteResponse),
        (status = 403, description = "Caller is not a participant", body = ErrorResponse),
        (status = 409, description = "Session already started", body = ErrorResponse),
    )
)]
pub async fn expire_invite(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, MeetupError> {
    let invite = state
        .invite_service
        .expire_invite(InviteId::from_uuid(id), &caller)
        .await?;
    Ok(Json(view(&state, invite)))
}

/// `POST /invites/{id}/confirm`: Confirm going together.
///
/// Idempotent. The call that completes the handshake also creates the
/// meetup session.
///
/// # Errors
///
/// Returns [`MeetupError::InviteNotConfirmable`] unless the invite is
/// accepted, or [`MeetupError::Unauthorized`] for non-participants.
#[utoipa::path(
    post,
    path = "/api/v1/invites/{id}/confirm",
    tag = "Invites",
    summary = "Confirm going together",
    params(
        ("id" = uuid::Uuid, Path, description = "Invite UUID"),
        ("x-user-id" = String, Header, description = "Acting user"),
    ),
    responses(
        (status = 200, description = "Confirmation recorded", body = ConfirmOutcome),
        (status = 403, description = "Caller is not a participant", body = ErrorResponse),
        (status = 409, description = "Invite is not confirmable", body = ErrorResponse),
    )
)]
pub async fn confirm_going(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, MeetupError> {
    let outcome = state
        .invite_service
        .confirm_going(InviteId::from_uuid(id), &caller)
        .await?;
    Ok(Json(outcome))
}

/// Invite routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/invites", post(send_invite))
        .route("/invites/{id}", get(get_invite))
        .route("/invites/{id}/accept", post(accept_invite))
        .route("/invites/{id}/decline", post(decline_invite))
        .route("/invites/{id}/expire", post(expire_invite))
        .route("/invites/{id}/confirm", post(confirm_going))
}
