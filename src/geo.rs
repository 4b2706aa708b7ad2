// ================================
// src/geo.rs - coordinates and great-circle distance
// ================================
use serde::{Deserialize, Serialize};
use std::fmt;

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A WGS84 position in degrees.
///
/// Ranges are not validated; degenerate inputs must still produce finite
/// distances.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Linear interpolation of latitude and longitude independently.
    pub fn lerp(self, other: Coordinate, t: f64) -> Coordinate {
        Coordinate::new(
            self.latitude + t * (other.latitude - self.latitude),
            self.longitude + t * (other.longitude - self.longitude),
        )
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.6}, {:.6})", self.latitude, self.longitude)
    }
}

/// Haversine distance in meters between two coordinates.
///
/// Uses the `atan2(sqrt(a), sqrt(1 - a))` form, which stays finite at
/// `a == b`. `a` is clamped to `[0, 1]` so rounding cannot push `sqrt`
/// out of its domain.
pub fn distance(a: Coordinate, b: Coordinate) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    let h = h.clamp(0.0, 1.0);

    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_M * c
}

/// Planar (x, y) in meters around a reference latitude.
///
/// Equirectangular projection; good enough for the few hundred meters a
/// route segment spans.
pub(crate) fn project_local(point: Coordinate, ref_lat_rad: f64) -> (f64, f64) {
    let x = point.longitude.to_radians() * EARTH_RADIUS_M * ref_lat_rad.cos();
    let y = point.latitude.to_radians() * EARTH_RADIUS_M;
    (x, y)
}
