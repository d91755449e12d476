//! Great-circle distance and radius containment.
//!
//! Pure functions over validated [`Coord`]s. The haversine formula is
//! numerically stable for every pair of points on the sphere, including
//! antipodes, poles and pairs straddling the antimeridian.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::MeetupError;

/// Mean Earth radius in meters (IUGG).
pub const EARTH_RADIUS_METERS: f64 = 6_371_008.8;

/// A validated WGS-84 coordinate in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(try_from = "RawCoord")]
pub struct Coord {
    /// Latitude in degrees, `-90..=90`.
    pub latitude: f64,
    /// Longitude in degrees, `-180..=180`.
    pub longitude: f64,
}

#[derive(Deserialize)]
struct RawCoord {
    latitude: f64,
    longitude: f64,
}

impl TryFrom<RawCoord> for Coord {
    type Error = MeetupError;

    fn try_from(raw: RawCoord) -> Result<Self, Self::Error> {
        Self::new(raw.latitude, raw.longitude)
    }
}

impl Coord {
    /// Creates a coordinate, rejecting non-finite or out-of-range values.
    ///
    /// # Errors
    ///
    /// Returns [`MeetupError::InvalidCoordinate`] if either component is
    /// NaN, infinite, or outside its valid range.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, MeetupError> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(MeetupError::InvalidCoordinate(format!(
                "latitude {latitude} outside [-90, 90]"
            )));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(MeetupError::InvalidCoordinate(format!(
                "longitude {longitude} outside [-180, 180]"
            )));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }
}

/// Haversine great-circle distance between two coordinates, in meters.
#[must_use]
pub fn distance_meters(a: Coord, b: Coord) -> f64 {
    let phi_a = a.latitude.to_radians();
    let phi_b = b.latitude.to_radians();
    let d_phi = (b.latitude - a.latitude).to_radians();
    let d_lambda = (b.longitude - a.longitude).to_radians();

    let h = (d_phi / 2.0).sin().powi(2)
        + phi_a.cos() * phi_b.cos() * (d_lambda / 2.0).sin().powi(2);
    // Rounding can push `h` a hair above 1 for antipodal points.
    let h = h.clamp(0.0, 1.0);
    2.0 * EARTH_RADIUS_METERS * h.sqrt().asin()
}

/// Returns `true` when `distance` is inside the radius. The boundary is
/// inclusive.
#[must_use]
pub fn is_within_radius(distance: f64, radius_meters: f64) -> bool {
    distance <= radius_meters
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn coord(lat: f64, lon: f64) -> Coord {
        let Ok(c) = Coord::new(lat, lon) else {
            panic!("valid coordinate");
        };
        c
    }

    fn assert_close(actual: f64, expected: f64, tolerance: f64) {
        let err = ((actual - expected) / expected).abs();
        assert!(
            err <= tolerance,
            "expected {expected} within {tolerance}, got {actual}"
        );
    }

    #[test]
    fn distance_to_self_is_zero() {
        let p = coord(10.0, 106.0);
        assert_eq!(distance_meters(p, p), 0.0);
    }

    #[test]
    fn distance_is_symmetric() {
        let pairs = [
            (coord(10.0, 106.0), coord(10.0045, 106.0)),
            (coord(-33.86, 151.21), coord(51.5, -0.12)),
            (coord(0.0, 179.9), coord(0.0, -179.9)),
            (coord(89.9, 0.0), coord(89.9, 180.0)),
        ];
        for (a, b) in pairs {
            assert_eq!(distance_meters(a, b), distance_meters(b, a));
        }
    }

    #[test]
    fn one_degree_of_latitude_is_about_111_km() {
        let d = distance_meters(coord(0.0, 0.0), coord(1.0, 0.0));
        assert_close(d, 111_195.0, 0.005);
    }

    #[test]
    fn antimeridian_is_short_way_round() {
        let d = distance_meters(coord(0.0, 179.5), coord(0.0, -179.5));
        assert_close(d, 111_195.0, 0.005);
    }

    #[test]
    fn antipodes_are_half_circumference() {
        let d = distance_meters(coord(0.0, 0.0), coord(0.0, 180.0));
        assert_close(d, std::f64::consts::PI * EARTH_RADIUS_METERS, 1e-9);
    }

    #[test]
    fn radius_boundary_is_inclusive() {
        assert!(is_within_radius(200.0, 200.0));
        assert!(!is_within_radius(200.01, 200.0));
        assert!(is_within_radius(0.0, 200.0));
    }

    #[test]
    fn rejects_invalid_coordinates() {
        assert!(Coord::new(f64::NAN, 0.0).is_err());
        assert!(Coord::new(0.0, f64::INFINITY).is_err());
        assert!(Coord::new(90.5, 0.0).is_err());
        assert!(Coord::new(0.0, -180.01).is_err());
        assert!(Coord::new(-90.0, 180.0).is_ok());
    }

    #[test]
    fn deserialization_validates() {
        let bad = serde_json::from_str::<Coord>(r#"{"latitude": 91.0, "longitude": 0.0}"#);
        assert!(bad.is_err());
        let good = serde_json::from_str::<Coord>(r#"{"latitude": 10.0, "longitude": 106.0}"#);
        assert!(good.is_ok());
    }
}
