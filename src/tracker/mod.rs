//! Device-side tracking layer.
//!
//! [`ProximityTracker`] is the orchestration a client runs while a
//! participant travels to the meeting point. Location comes from a
//! [`GeoSource`]; arrival and completion go through the
//! [`crate::service::SessionService`].

pub mod geo_source;
pub mod proximity;

pub use geo_source::{ChannelGeoSource, GeoSource, Permission, PositionWatch, WatchOptions};
pub use proximity::{ProximityTracker, RewardSink, TrackerConfig, TrackerState};
