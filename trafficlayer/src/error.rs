//! Error types for the airspace traffic engine.
//!
//! Malformed inputs are rejected at the registry boundary and never mutate
//! state. Stale updates and not-found lookups are *not* errors: stale data
//! is dropped and counted, missing callsigns are reported as `Option::None`
//! or an explicit `NoData` interpolation status.

use thiserror::Error;

/// Errors raised when an input fails validation at the registry boundary.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// Callsign is empty or whitespace-only.
    #[error("Callsign must not be empty")]
    EmptyCallsign,

    /// Latitude outside [-90, 90] or NaN.
    #[error("Invalid latitude: {0}")]
    InvalidLatitude(f64),

    /// Longitude outside [-180, 180] or NaN.
    #[error("Invalid longitude: {0}")]
    InvalidLongitude(f64),

    /// Altitude is NaN or non-finite.
    #[error("Invalid altitude: {0}")]
    InvalidAltitude(f64),

    /// Attitude angle (pitch/bank/heading) is NaN or non-finite.
    #[error("Invalid {axis} angle: {value}")]
    InvalidAngle { axis: &'static str, value: f64 },

    /// Ground speed is negative, NaN or non-finite.
    #[error("Invalid ground speed: {0} kts")]
    InvalidGroundSpeed(f64),

    /// Station frequency outside the plausible VHF airband.
    #[error("Invalid frequency: {0} MHz")]
    InvalidFrequency(f64),
}
