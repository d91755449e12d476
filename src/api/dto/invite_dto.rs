//! Invite DTOs for send, get and respond operations.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{Invite, InviteStatus, UserId, Venue};

/// Request body for `POST /invites`. The sender is the caller.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SendInviteRequest {
    /// User being invited.
    pub receiver_id: UserId,
    /// Hotspot or event to meet at.
    pub venue: Venue,
}

/// Invite as returned by the API.
#[derive(Debug, Serialize, ToSchema)]
pub struct InviteResponse {
    /// Stored invite document.
    #[serde(flatten)]
    pub invite: Invite,
    /// Status with lazy expiry applied.
    pub effective_status: InviteStatus,
}
