//! WebSocket layer: connection handling, message routing, subscriptions.
//!
//! The WebSocket endpoint at `/ws` streams invite and session events to
//! subscribed clients and answers session snapshot requests.

pub mod connection;
pub mod handler;
pub mod messages;
pub mod subscription;
