//! Data Transfer Objects for REST request/response serialization.
//!
//! Domain documents (sessions, outcomes) are returned as-is; these types
//! cover request bodies and views that add derived fields.

pub mod invite_dto;
pub mod session_dto;

pub use invite_dto::*;
pub use session_dto::*;
