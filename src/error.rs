//! Meetup error types with HTTP status code mapping.
//!
//! [`MeetupError`] is the central error type for the crate. Each variant
//! maps to a specific HTTP status code and structured JSON error response.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 2003,
///     "message": "invite 6f1c... cannot be confirmed: invite is declined",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code.
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Error enum shared by the domain, store, service and tracker layers.
///
/// # Error Code Ranges
///
/// | Range     | Category        | HTTP Status                  |
/// |-----------|-----------------|------------------------------|
/// | 1000–1999 | Validation      | 400 Bad Request              |
/// | 2000–2999 | State/Not Found | 404 / 409 / 403              |
/// | 3000–3999 | Server          | 500 / 503                    |
/// | 4000–4999 | Device          | 422 Unprocessable Entity     |
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MeetupError {
    /// Location permission was refused on the device.
    #[error("location permission denied")]
    PermissionDenied,

    /// The invite is missing, declined or expired.
    #[error("invite {invite_id} cannot be confirmed: {reason}")]
    InviteNotConfirmable {
        /// Invite the caller tried to confirm.
        invite_id: String,
        /// Why the invite is not confirmable.
        reason: String,
    },

    /// The caller is not a participant of the invite or session.
    #[error("user {user_id} is not a participant")]
    Unauthorized {
        /// The rejected caller.
        user_id: String,
    },

    /// A coordinate was NaN, infinite or out of range.
    #[error("invalid coordinate: {0}")]
    InvalidCoordinate(String),

    /// Transient failure of the document store.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// A document with the given id does not exist.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Document kind (e.g. `"invite"`).
        kind: &'static str,
        /// Document id.
        id: String,
    },

    /// Request validation failed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The requested transition is not allowed from the current state.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Completion was requested before both participants arrived.
    #[error("both participants must be within the arrival radius")]
    NotArrived,

    /// The reward policy refused to compute a reward.
    #[error("reward policy error: {0}")]
    RewardPolicy(String),

    /// The device could not produce a fix or start a location watch.
    #[error("location unavailable: {0}")]
    LocationUnavailable(String),

    /// Persistence layer failure.
    #[error("persistence error: {0}")]
    PersistenceError(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl MeetupError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::InvalidCoordinate(_) => 1002,
            Self::NotFound { .. } => 2001,
            Self::Unauthorized { .. } => 2002,
            Self::InviteNotConfirmable { .. } => 2003,
            Self::InvalidState(_) => 2004,
            Self::NotArrived => 2005,
            Self::Internal(_) => 3000,
            Self::PersistenceError(_) => 3001,
            Self::StoreUnavailable(_) => 3002,
            Self::RewardPolicy(_) => 3003,
            Self::PermissionDenied => 4001,
            Self::LocationUnavailable(_) => 4002,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) | Self::InvalidCoordinate(_) => StatusCode::BAD_REQUEST,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Unauthorized { .. } => StatusCode::FORBIDDEN,
            Self::InviteNotConfirmable { .. } | Self::InvalidState(_) | Self::NotArrived => {
                StatusCode::CONFLICT
            }
            Self::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::PermissionDenied | Self::LocationUnavailable(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            Self::RewardPolicy(_) | Self::PersistenceError(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Returns `true` for failures worth retrying with backoff.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_))
    }
}

impl IntoResponse for MeetupError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.error_code(), error = %self, "request failed");
        } else if matches!(self, Self::Unauthorized { .. }) {
            tracing::warn!(error = %self, "unauthorized request");
        }
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}
