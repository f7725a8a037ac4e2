//! Aircraft situation: a timestamped pose sample.
//!
//! A situation is one immutable position/attitude report for a remote
//! aircraft. Multiple situations per callsign form an append-ordered
//! history inside the registry; the interpolator blends between them.
//!
//! Timestamps are epoch milliseconds (UTC) as carried by the network
//! protocol, so samples from different machines can be ordered and the
//! interpolator can be asked for an arbitrary render timestamp.

use crate::error::ValidationError;
use crate::geo;

/// A 3D geographic position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPosition {
    /// Latitude in degrees (-90 to 90).
    pub latitude: f64,

    /// Longitude in degrees (-180 to 180).
    pub longitude: f64,

    /// Altitude MSL in feet.
    pub altitude_ft: f64,
}

impl GeoPosition {
    /// Create a validated position.
    pub fn new(latitude: f64, longitude: f64, altitude_ft: f64) -> Result<Self, ValidationError> {
        if !latitude.is_finite() || !(geo::MIN_LAT..=geo::MAX_LAT).contains(&latitude) {
            return Err(ValidationError::InvalidLatitude(latitude));
        }
        if !longitude.is_finite() || !(geo::MIN_LON..=geo::MAX_LON).contains(&longitude) {
            return Err(ValidationError::InvalidLongitude(longitude));
        }
        if !altitude_ft.is_finite() {
            return Err(ValidationError::InvalidAltitude(altitude_ft));
        }
        Ok(Self {
            latitude,
            longitude,
            altitude_ft,
        })
    }

    /// Great-circle distance to another position in nautical miles.
    pub fn distance_nm(&self, other: &GeoPosition) -> f64 {
        geo::haversine_nm(
            self.latitude,
            self.longitude,
            other.latitude,
            other.longitude,
        )
    }
}

/// Aircraft attitude in degrees.
///
/// Heading is normalized into [0, 360) on construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Attitude {
    /// Pitch in degrees, nose-up positive.
    pub pitch: f64,

    /// Bank in degrees, right-wing-down positive.
    pub bank: f64,

    /// True heading in degrees [0, 360).
    pub heading: f64,
}

impl Attitude {
    /// Create a validated attitude; the heading is wrapped into [0, 360).
    pub fn new(pitch: f64, bank: f64, heading: f64) -> Result<Self, ValidationError> {
        for (axis, value) in [("pitch", pitch), ("bank", bank), ("heading", heading)] {
            if !value.is_finite() {
                return Err(ValidationError::InvalidAngle { axis, value });
            }
        }
        Ok(Self {
            pitch,
            bank,
            heading: geo::normalize_heading(heading),
        })
    }
}

/// One timestamped pose sample for a remote aircraft.
///
/// Immutable once created. The registry retains a bounded, newest-first
/// history of these per callsign.
#[derive(Debug, Clone, PartialEq)]
pub struct AircraftSituation {
    /// Network timestamp, epoch milliseconds UTC.
    pub timestamp_ms: i64,

    /// Position at the timestamp.
    pub position: GeoPosition,

    /// Attitude at the timestamp.
    pub attitude: Attitude,

    /// Ground speed in knots.
    pub ground_speed_kts: f64,

    /// Ground elevation hint in feet, when the sender provided one.
    ///
    /// Used by simulator drivers to place aircraft on sloped terrain;
    /// the engine carries it through untouched.
    pub ground_elevation_ft: Option<f64>,
}

impl AircraftSituation {
    /// Create a validated situation sample.
    pub fn new(
        timestamp_ms: i64,
        position: GeoPosition,
        attitude: Attitude,
        ground_speed_kts: f64,
    ) -> Result<Self, ValidationError> {
        if !ground_speed_kts.is_finite() || ground_speed_kts < 0.0 {
            return Err(ValidationError::InvalidGroundSpeed(ground_speed_kts));
        }
        Ok(Self {
            timestamp_ms,
            position,
            attitude,
            ground_speed_kts,
            ground_elevation_ft: None,
        })
    }

    /// Attach a ground elevation hint.
    pub fn with_ground_elevation(mut self, elevation_ft: f64) -> Self {
        if elevation_ft.is_finite() {
            self.ground_elevation_ft = Some(elevation_ft);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(lat: f64, lon: f64) -> GeoPosition {
        GeoPosition::new(lat, lon, 10000.0).unwrap()
    }

    #[test]
    fn test_position_validation() {
        assert!(GeoPosition::new(47.0, 11.0, 3000.0).is_ok());
        // NaN payloads never compare equal; match on the variant instead
        assert!(matches!(
            GeoPosition::new(f64::NAN, 11.0, 0.0),
            Err(ValidationError::InvalidLatitude(v)) if v.is_nan()
        ));
        assert!(matches!(
            GeoPosition::new(47.0, 200.0, 0.0),
            Err(ValidationError::InvalidLongitude(_))
        ));
        assert!(matches!(
            GeoPosition::new(47.0, 11.0, f64::INFINITY),
            Err(ValidationError::InvalidAltitude(_))
        ));
    }

    #[test]
    fn test_attitude_normalizes_heading() {
        let att = Attitude::new(2.5, -1.0, 370.0).unwrap();
        assert_eq!(att.heading, 10.0);
        let att = Attitude::new(0.0, 0.0, -90.0).unwrap();
        assert_eq!(att.heading, 270.0);
    }

    #[test]
    fn test_attitude_rejects_nan() {
        assert!(matches!(
            Attitude::new(f64::NAN, 0.0, 0.0),
            Err(ValidationError::InvalidAngle { axis: "pitch", .. })
        ));
    }

    #[test]
    fn test_situation_rejects_negative_speed() {
        let result = AircraftSituation::new(
            1000,
            position(47.0, 11.0),
            Attitude::new(0.0, 0.0, 90.0).unwrap(),
            -5.0,
        );
        assert_eq!(result, Err(ValidationError::InvalidGroundSpeed(-5.0)));
    }

    #[test]
    fn test_ground_elevation_hint() {
        let situation = AircraftSituation::new(
            1000,
            position(47.0, 11.0),
            Attitude::new(0.0, 0.0, 90.0).unwrap(),
            120.0,
        )
        .unwrap()
        .with_ground_elevation(1893.0);
        assert_eq!(situation.ground_elevation_ft, Some(1893.0));
    }

    #[test]
    fn test_distance_between_positions() {
        let a = position(50.0, 8.0);
        let b = position(50.0, 8.0);
        assert!(a.distance_nm(&b) < 1e-9);
    }
}
