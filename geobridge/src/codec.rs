//! Location reading codec.
//!
//! Converts a raw provider sample into the record hosts receive. Values are
//! passed through untouched: no unit conversion, no rounding.

use serde::Serialize;

/// An immutable location fix as reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocationSample {
    /// Longitude in degrees.
    pub longitude: f64,
    /// Latitude in degrees.
    pub latitude: f64,
    /// Altitude in meters above the WGS84 ellipsoid.
    pub altitude: f64,
    /// Horizontal accuracy radius in meters.
    pub accuracy: f32,
    /// Bearing in degrees.
    pub heading: f32,
    /// Ground speed in meters per second.
    pub speed: f32,
    /// Fix time in milliseconds since the Unix epoch.
    pub timestamp: i64,
}

/// Wire-level location record.
///
/// `velocity` and `speed` both carry the sample speed; older hosts read the
/// former, newer ones the latter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LocationRecord {
    pub longitude: f64,
    pub latitude: f64,
    pub altitude: f64,
    pub accuracy: f32,
    pub heading: f32,
    pub velocity: f32,
    pub speed: f32,
    pub timestamp: i64,
}

/// Encode a sample into its wire record.
pub fn encode(sample: &LocationSample) -> LocationRecord {
    LocationRecord {
        longitude: sample.longitude,
        latitude: sample.latitude,
        altitude: sample.altitude,
        accuracy: sample.accuracy,
        heading: sample.heading,
        velocity: sample.speed,
        speed: sample.speed,
        timestamp: sample.timestamp,
    }
}
