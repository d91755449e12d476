//! WebSocket connection state machine.
//!
//! Handles the read/write loop for a single WebSocket connection,
//! dispatching incoming commands and forwarding filtered events. Every
//! command is checked against the caller identified at upgrade: session
//! snapshots and subscriptions are limited to invites and sessions the
//! caller takes part in.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast;
use uuid::Uuid;

use super::messages::{WsCommand, WsMessage, WsMessageType};
use super::subscription::{SubscriptionManager, parse_topics};
use crate::app_state::{Invites, Sessions};
use crate::domain::{InviteId, MeetupEvent, MeetupSession, SessionId, UserId};
use crate::error::MeetupError;

/// Caller identity and the services a connection answers from.
#[derive(Debug, Clone)]
pub struct ConnectionContext {
    /// User the connection acts for.
    pub caller: UserId,
    /// Invite lookups for subscription checks.
    pub invites: Arc<Invites>,
    /// Session lookups.
    pub sessions: Arc<Sessions>,
}

impl ConnectionContext {
    fn unauthorized(&self) -> MeetupError {
        MeetupError::Unauthorized {
            user_id: self.caller.to_string(),
        }
    }

    /// Loads a session the caller participates in.
    async fn own_session(&self, session_id: SessionId) -> Result<MeetupSession, MeetupError> {
        let session = self.sessions.get_session(session_id).await?;
        if session.is_participant(&self.caller) {
            Ok(session)
        } else {
            Err(self.unauthorized())
        }
    }

    /// Checks that `topic` is a session or invite the caller belongs to.
    async fn authorize_topic(&self, topic: Uuid) -> Result<(), MeetupError> {
        match self.own_session(SessionId::from_uuid(topic)).await {
            Ok(_) => return Ok(()),
            Err(MeetupError::NotFound { .. }) => {}
            Err(e) => return Err(e),
        }
        let invite = self.invites.get_invite(InviteId::from_uuid(topic)).await?;
        if invite.role_of(&self.caller).is_some() {
            Ok(())
        } else {
            Err(self.unauthorized())
        }
    }
}

/// Runs the read/write loop for a single WebSocket connection.
///
/// - Reads commands from the client and dispatches them.
/// - Forwards matching events from the [`broadcast::Receiver`] to the client.
pub async fn run_connection(
    socket: WebSocket,
    mut event_rx: broadcast::Receiver<MeetupEvent>,
    ctx: ConnectionContext,
) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let mut subs = SubscriptionManager::new();

    loop {
        tokio::select! {
            // Incoming message from client
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let response = handle_text_message(&text, &mut subs, &ctx).await;
                        if let Some(resp_json) = response
                            && ws_tx.send(Message::text(resp_json)).await.is_err() {
                                break;
                            }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    _ => {}
                }
            }
            // Event from EventBus
            event = event_rx.recv() => {
                match event {
                    Ok(meetup_event) => {
                        subs.follow(&ctx.caller, &meetup_event);
                        if subs.matches(meetup_event.topic()) {
                            let msg = WsMessage::new(
                                uuid::Uuid::new_v4().to_string(),
                                WsMessageType::Event,
                                serde_json::to_value(&meetup_event).unwrap_or_default(),
                            );
                            let json = serde_json::to_string(&msg).unwrap_or_default();
                            if ws_tx.send(Message::text(json)).await.is_err() {
                                break;
                            }
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(lagged = n, "ws client lagged behind event bus");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    tracing::debug!(user_id = %ctx.caller, "ws connection closed");
}

/// Handles a text message from the client, returning an optional JSON response.
async fn handle_text_message(
    text: &str,
    subs: &mut SubscriptionManager,
    ctx: &ConnectionContext,
) -> Option<String> {
    let Ok(msg) = serde_json::from_str::<WsMessage>(text) else {
        return serde_json::to_string(&WsMessage::error(String::new(), 400, "malformed JSON")).ok();
    };

    let Ok(command) = serde_json::from_value::<WsCommand>(msg.payload) else {
        return serde_json::to_string(&WsMessage::error(msg.id, 404, "unknown command")).ok();
    };

    let response = match command {
        WsCommand::Subscribe { topic_ids } => {
            let (ids, wildcard) = parse_topics(&topic_ids);
            for id in &ids {
                if let Err(e) = ctx.authorize_topic(*id).await {
                    tracing::warn!(user_id = %ctx.caller, topic = %id, error = %e, "ws subscription refused");
                    return serde_json::to_string(&WsMessage::error(
                        msg.id,
                        e.status_code().as_u16(),
                        &e.to_string(),
                    ))
                    .ok();
                }
            }
            subs.subscribe(&ids, wildcard);
            WsMessage::new(
                msg.id,
                WsMessageType::Response,
                serde_json::json!({
                    "subscribed": ids.iter().map(ToString::to_string).collect::<Vec<_>>(),
                    "count": subs.count(),
                    "wildcard": subs.follows_own(),
                }),
            )
        }
        WsCommand::Unsubscribe { topic_ids } => {
            let (ids, wildcard) = parse_topics(&topic_ids);
            subs.unsubscribe(&ids, wildcard);
            WsMessage::new(
                msg.id,
                WsMessageType::Response,
                serde_json::json!({
                    "unsubscribed": ids.iter().map(ToString::to_string).collect::<Vec<_>>(),
                    "remaining_count": subs.count(),
                }),
            )
        }
        WsCommand::GetSession { session_id } => {
            let Ok(uuid) = session_id.parse::<uuid::Uuid>() else {
                return serde_json::to_string(&WsMessage::error(msg.id, 400, "invalid session_id"))
                    .ok();
            };
            match ctx.own_session(SessionId::from_uuid(uuid)).await {
                Ok(session) => WsMessage::new(
                    msg.id,
                    WsMessageType::Response,
                    serde_json::to_value(&session).unwrap_or_default(),
                ),
                Err(e) => WsMessage::error(msg.id, e.status_code().as_u16(), &e.to_string()),
            }
        }
    };
    serde_json::to_string(&response).ok()
}
