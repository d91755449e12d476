//! Session DTOs for location reports.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::domain::PositionSample;

/// Request body for `POST /sessions/{id}/location`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct LocationRequest {
    /// Latitude in decimal degrees.
    pub latitude: f64,
    /// Longitude in decimal degrees.
    pub longitude: f64,
    /// Reported accuracy in meters.
    #[serde(default)]
    pub accuracy: Option<f64>,
    /// Device capture time. Defaults to the time the request is handled.
    #[serde(default)]
    pub captured_at: Option<DateTime<Utc>>,
}

impl LocationRequest {
    /// Converts the request into a sample, stamping it with `received_at`
    /// when the device sent no capture time.
    #[must_use]
    pub fn into_sample(self, received_at: DateTime<Utc>) -> PositionSample {
        PositionSample {
            latitude: self.latitude,
            longitude: self.longitude,
            accuracy: self.accuracy,
            captured_at: self.captured_at.unwrap_or(received_at),
        }
    }
}
