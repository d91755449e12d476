//! Invite service: invite lifecycle and the "going together" handshake.

use std::sync::Arc;

use chrono::Duration;
use serde::Serialize;
use utoipa::ToSchema;

use super::notifier::{ConfirmationNotice, Notifier};
use super::session_service::SessionService;
use crate::domain::{
    Clock, ConfirmationKind, ConfirmationState, EventBus, Invite, InviteId, InvitePatch,
    InviteStatus, MeetupEvent, MeetupSession, SessionId, UserId, Venue,
};
use crate::error::MeetupError;
use crate::store::{Document, DocumentStore};

/// Result of [`InviteService::confirm_going`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ConfirmOutcome {
    /// Confirmed invite.
    pub invite_id: InviteId,
    /// Handshake state after the call.
    pub state: ConfirmationState,
    /// `true` for the call that completed the handshake and sent the
    /// `mutual_confirmed` notice. A retry after a failed session creation
    /// reports it instead of the failed call.
    pub mutual_reached: bool,
    /// `false` if the caller had already confirmed.
    pub changed: bool,
    /// Session of the invite, once both sides confirmed.
    pub session_id: Option<SessionId>,
}

/// Manages invites and the two-party confirmation that gates tracking.
#[derive(Debug)]
pub struct InviteService<I, S> {
    store: Arc<I>,
    sessions: Arc<SessionService<S>>,
    notifier: Arc<dyn Notifier>,
    event_bus: EventBus,
    clock: Arc<dyn Clock>,
    invite_ttl: Option<Duration>,
}

impl<I, S> InviteService<I, S>
where
    I: DocumentStore<Invite>,
    S: DocumentStore<MeetupSession>,
{
    /// Creates a new `InviteService`.
    #[must_use]
    pub fn new(
        store: Arc<I>,
        sessions: Arc<SessionService<S>>,
        notifier: Arc<dyn Notifier>,
        event_bus: EventBus,
        clock: Arc<dyn Clock>,
        invite_ttl: Option<Duration>,
    ) -> Self {
        Self {
            store,
            sessions,
            notifier,
            event_bus,
            clock,
            invite_ttl,
        }
    }

    /// Returns the session service confirmed invites hand off to.
    #[must_use]
    pub fn sessions(&self) -> &Arc<SessionService<S>> {
        &self.sessions
    }

    /// Sends a new invite from `sender` to `receiver`.
    ///
    /// # Errors
    ///
    /// Returns [`MeetupError::InvalidRequest`] for self-invites or a blank
    /// venue, or a store error.
    pub async fn send_invite(
        &self,
        sender: UserId,
        receiver: UserId,
        venue: Venue,
    ) -> Result<Invite, MeetupError> {
        let now = self.clock.now();
        let invite = Invite::new(sender, receiver, venue, now, self.invite_ttl)?;
        let (invite, _) = self.store.create(invite).await?;

        let _ = self.event_bus.publish(MeetupEvent::InviteSent {
            invite_id: invite.id,
            sender_id: invite.sender_id.clone(),
            receiver_id: invite.receiver_id.clone(),
            venue_id: invite.venue.venue_id.clone(),
            timestamp: now,
        });
        tracing::info!(invite_id = %invite.id, sender = %invite.sender_id, receiver = %invite.receiver_id, "invite sent");
        Ok(invite)
    }

    /// Loads an invite.
    ///
    /// # Errors
    ///
    /// Returns [`MeetupError::NotFound`] if no such invite exists.
    pub async fn get_invite(&self, invite_id: InviteId) -> Result<Invite, MeetupError> {
        self.store
            .get(invite_id)
            .await?
            .ok_or_else(|| MeetupError::NotFound {
                kind: Invite::KIND,
                id: invite_id.to_string(),
            })
    }

    /// Returns the status of `invite` as of now, applying lazy expiry.
    #[must_use]
    pub fn effective_status(&self, invite: &Invite) -> InviteStatus {
        invite.effective_status(self.clock.now())
    }

    /// Receiver accepts a pending invite. Accepting twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`MeetupError::Unauthorized`] unless `by` is the receiver,
    /// [`MeetupError::InvalidState`] if the invite is no longer pending.
    pub async fn accept_invite(
        &self,
        invite_id: InviteId,
        by: &UserId,
    ) -> Result<Invite, MeetupError> {
        let at = self.clock.now();
        self.apply(invite_id, InvitePatch::Accept { by: by.clone(), at })
            .await
    }

    /// Receiver declines a pending invite.
    ///
    /// # Errors
    ///
    /// Returns [`MeetupError::Unauthorized`] unless `by` is the receiver,
    /// [`MeetupError::InvalidState`] if the invite is no longer pending.
    pub async fn decline_invite(
        &self,
        invite_id: InviteId,
        by: &UserId,
    ) -> Result<Invite, MeetupError> {
        let at = self.clock.now();
        self.apply(invite_id, InvitePatch::Decline { by: by.clone(), at })
            .await
    }

    /// Either participant withdraws an open invite before a session exists.
    ///
    /// # Errors
    ///
    /// Returns [`MeetupError::Unauthorized`] for outsiders and
    /// [`MeetupError::InvalidState`] once a session exists or the invite
    /// was declined.
    pub async fn expire_invite(
        &self,
        invite_id: InviteId,
        by: &UserId,
    ) -> Result<Invite, MeetupError> {
        let at = self.clock.now();
        self.apply(invite_id, InvitePatch::Expire { by: by.clone(), at }).await
    }

    async fn apply(&self, invite_id: InviteId, patch: InvitePatch) -> Result<Invite, MeetupError> {
        let (invite, changed) = self
            .store
            .transact(invite_id, move |invite| {
                let before = invite.status;
                invite.merge(patch)?;
                Ok((invite.clone(), before != invite.status))
            })
            .await?;

        if changed {
            let _ = self.event_bus.publish(MeetupEvent::InviteStatusChanged {
                invite_id,
                status: invite.status,
                timestamp: self.clock.now(),
            });
            tracing::info!(%invite_id, status = invite.status.as_str(), "invite status changed");
        }
        Ok(invite)
    }

    /// Records that `user_id` is going.
    ///
    /// Idempotent per user: a repeated call changes nothing and sends no
    /// notice. The write that observes both confirmations reserves the
    /// session id on the invite, so exactly one session is created no
    /// matter how the two calls interleave. That write also marks the
    /// `mutual_confirmed` notice as pending for the caller; the notice is
    /// claimed and sent only after the session exists, so a caller whose
    /// session creation failed gets `mutual_reached` on retry.
    ///
    /// # Errors
    ///
    /// Returns [`MeetupError::InviteNotConfirmable`] if the invite is
    /// missing, not accepted, or expired (nothing is written), and
    /// [`MeetupError::Unauthorized`] if `user_id` is not a participant.
    pub async fn confirm_going(
        &self,
        invite_id: InviteId,
        user_id: &UserId,
    ) -> Result<ConfirmOutcome, MeetupError> {
        let now = self.clock.now();
        let reserved = SessionId::new();
        let who = user_id.clone();

        let step = self
            .store
            .transact(invite_id, move |invite| {
                let role = invite.role_of(&who).ok_or_else(|| MeetupError::Unauthorized {
                    user_id: who.to_string(),
                })?;
                let status = invite.effective_status(now);
                if status != InviteStatus::Accepted {
                    return Err(MeetupError::InviteNotConfirmable {
                        invite_id: invite.id.to_string(),
                        reason: format!("invite is {}", status.as_str()),
                    });
                }

                let changed = invite.meetup_details.confirm(role, now);
                if invite.meetup_details.state() == ConfirmationState::BothConfirmed
                    && invite.session_id.is_none()
                {
                    invite.session_id = Some(reserved);
                    invite.mutual_notice_pending = Some(who);
                }
                Ok((invite.clone(), changed))
            })
            .await;

        let (invite, changed) = match step {
            Ok(step) => step,
            Err(MeetupError::NotFound { id, .. }) => {
                return Err(MeetupError::InviteNotConfirmable {
                    invite_id: id,
                    reason: "invite does not exist".to_string(),
                });
            }
            Err(e) => return Err(e),
        };

        // Also retried on repeat calls in case an earlier creation failed.
        if invite.session_id.is_some() {
            self.sessions.ensure_session(&invite).await?;
        }

        let completes_pair = invite.mutual_notice_pending.as_ref() == Some(user_id);
        let mutual_reached =
            completes_pair && self.claim_mutual_notice(invite_id, user_id).await?;

        if mutual_reached || (changed && invite.session_id.is_none()) {
            let kind = if mutual_reached {
                ConfirmationKind::MutualConfirmed
            } else {
                ConfirmationKind::SingleConfirmed
            };
            self.notifier
                .notify(user_id, ConfirmationNotice { kind, invite_id });
            tracing::info!(%invite_id, %user_id, ?kind, "invite confirmed");
        }

        Ok(ConfirmOutcome {
            invite_id,
            state: invite.meetup_details.state(),
            mutual_reached,
            changed,
            session_id: invite.session_id,
        })
    }

    /// Clears the pending `mutual_confirmed` notice if it still belongs to
    /// `user_id`. Returns `true` for the one call that cleared it.
    async fn claim_mutual_notice(
        &self,
        invite_id: InviteId,
        user_id: &UserId,
    ) -> Result<bool, MeetupError> {
        let who = user_id.clone();
        self.store
            .transact(invite_id, move |invite| {
                if invite.mutual_notice_pending.as_ref() == Some(&who) {
                    invite.mutual_notice_pending = None;
                    Ok(true)
                } else {
                    Ok(false)
                }
            })
            .await
    }
}
