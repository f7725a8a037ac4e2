//! Geographic math helpers.
//!
//! Great-circle distance, bearing and dead-reckoning used by the snapshot
//! engine (distance-from-own-aircraft) and the interpolator (extrapolation),
//! plus heading wrap-around arithmetic.

use std::f64::consts::PI;

/// Valid latitude range in degrees.
pub const MIN_LAT: f64 = -90.0;
pub const MAX_LAT: f64 = 90.0;

/// Valid longitude range in degrees.
pub const MIN_LON: f64 = -180.0;
pub const MAX_LON: f64 = 180.0;

/// Mean Earth radius in nautical miles.
const EARTH_RADIUS_NM: f64 = 3440.065;

/// Great-circle distance between two points in nautical miles (haversine).
#[inline]
pub fn haversine_nm(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();
    let a = (dlat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_NM * a.sqrt().asin()
}

/// Initial great-circle bearing from point 1 to point 2, degrees [0, 360).
#[inline]
pub fn initial_bearing_deg(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (phi1, phi2) = (lat1.to_radians(), lat2.to_radians());
    let dlon = (lon2 - lon1).to_radians();
    let y = dlon.sin() * phi2.cos();
    let x = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * dlon.cos();
    normalize_heading(y.atan2(x) * 180.0 / PI)
}

/// Destination point from a start, bearing (degrees) and distance (NM).
///
/// Used for dead-reckoning extrapolation: project the last known position
/// along the last known heading. Returns (lat, lon) in degrees.
pub fn destination(lat: f64, lon: f64, bearing_deg: f64, distance_nm: f64) -> (f64, f64) {
    let delta = distance_nm / EARTH_RADIUS_NM;
    let theta = bearing_deg.to_radians();
    let phi1 = lat.to_radians();
    let lambda1 = lon.to_radians();

    let phi2 = (phi1.sin() * delta.cos() + phi1.cos() * delta.sin() * theta.cos()).asin();
    let lambda2 = lambda1
        + (theta.sin() * delta.sin() * phi1.cos()).atan2(delta.cos() - phi1.sin() * phi2.sin());

    let lat2 = phi2 * 180.0 / PI;
    // Wrap longitude into [-180, 180)
    let lon2 = ((lambda2 * 180.0 / PI) + 540.0).rem_euclid(360.0) - 180.0;
    (lat2, lon2)
}

/// Normalize a heading into [0, 360).
#[inline]
pub fn normalize_heading(deg: f64) -> f64 {
    deg.rem_euclid(360.0)
}

/// Signed shortest angular difference `to - from`, in [-180, 180).
#[inline]
pub fn shortest_heading_delta(from: f64, to: f64) -> f64 {
    (to - from + 540.0).rem_euclid(360.0) - 180.0
}

/// Interpolate between two headings along the shorter arc.
///
/// `fraction` 0.0 yields `from`, 1.0 yields `to`. Crossing 0/360 takes the
/// short way around: midpoint of 350 and 10 is 0, not 180.
#[inline]
pub fn lerp_heading(from: f64, to: f64, fraction: f64) -> f64 {
    normalize_heading(from + shortest_heading_delta(from, to) * fraction)
}

/// Interpolate between two longitudes along the shorter arc.
///
/// Result is wrapped into [-180, 180); blending -179.9 and 179.9 crosses
/// the antimeridian instead of sweeping around the globe.
#[inline]
pub fn lerp_longitude(from: f64, to: f64, fraction: f64) -> f64 {
    let delta = (to - from + 540.0).rem_euclid(360.0) - 180.0;
    (from + delta * fraction + 540.0).rem_euclid(360.0) - 180.0
}

/// True when lat/lon are finite and within the valid geographic ranges.
#[inline]
pub fn is_valid_lat_lon(lat: f64, lon: f64) -> bool {
    lat.is_finite()
        && lon.is_finite()
        && (MIN_LAT..=MAX_LAT).contains(&lat)
        && (MIN_LON..=MAX_LON).contains(&lon)
}
