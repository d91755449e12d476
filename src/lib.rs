//! # meetup-gateway
//!
//! Proximity meetup protocol for HotSpot "Go Together" invites, served over
//! REST and WebSocket.
//!
//! Two users agree to meet at a hotspot or event. Once both confirm going,
//! a shared meetup session tracks each participant's distance to the
//! meeting point; when both are within the arrival radius the meetup
//! completes and a reward is issued exactly once.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP, WebSocket)          Device
//!     │                                │
//!     ├── REST Handlers (api/)         ├── ProximityTracker (tracker/)
//!     ├── WS Handler (ws/)             │     └── GeoSource
//!     │                                │
//!     ├── InviteService ───────────────┤
//!     ├── SessionService (service/) ◄──┘
//!     ├── EventBus (domain/)
//!     │
//!     ├── DocumentStore (store/)
//!     │
//!     └── PostgreSQL event log (persistence/)
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod persistence;
pub mod server;
pub mod service;
pub mod store;
pub mod tracker;
pub mod ws;
