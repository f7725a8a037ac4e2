//! Pose interpolation between sparse network samples.
//!
//! The simulator driver samples remote traffic at frame rate while the
//! network delivers a position every few seconds. Given a requested render
//! timestamp and a callsign's retained history, the interpolator produces
//! a best-estimate pose and parts state:
//!
//! - **NoData** — no situations recorded: an explicit "unavailable" result,
//!   never a guessed position.
//! - **Single** — one sample only: returned as-is, no velocity projection.
//! - **Interpolated** — the timestamp falls inside the retained history:
//!   linear blend of position/altitude/speed between the bracketing pair,
//!   shortest-arc blend of heading, proportional pitch/bank. A timestamp
//!   older than the oldest retained sample returns the oldest sample
//!   (history is bounded; there is no backward extrapolation).
//! - **Extrapolated** — the timestamp is past the newest sample by more
//!   than the tolerance: dead-reckoned from the last ground speed and
//!   heading, up to the configured cap, after which the last known
//!   position is held to avoid runaway drift.
//!
//! Parts are discrete state and are never blended: the result carries the
//! most recent parts sample at or before the requested timestamp.
//!
//! All inputs are value copies from the registry; nothing here holds a
//! lock while computing.

use std::sync::Arc;

use crate::callsign::Callsign;
use crate::config::TrafficConfig;
use crate::geo;
use crate::parts::AircraftParts;
use crate::registry::AirspaceRegistry;
use crate::situation::AircraftSituation;

/// How the result was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterpolationStatus {
    /// No situations recorded for the callsign.
    NoData,
    /// Only one sample exists; it was returned unchanged.
    Single,
    /// The request fell within the retained history.
    Interpolated,
    /// The request was past the newest sample; the pose was projected
    /// (or held, past the cap).
    Extrapolated,
}

/// Interpolated pose and parts for one callsign at one timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct InterpolationResult {
    /// Estimated pose; `None` only when `status` is `NoData`.
    pub situation: Option<AircraftSituation>,

    /// Most recent parts at or before the requested timestamp.
    pub parts: Option<AircraftParts>,

    /// How the situation was produced.
    pub status: InterpolationStatus,
}

impl InterpolationResult {
    fn no_data() -> Self {
        Self {
            situation: None,
            parts: None,
            status: InterpolationStatus::NoData,
        }
    }
}

/// Registry-backed interpolation front end.
///
/// Cheap to clone; intended to be handed to the simulator driver's
/// per-frame sampling loop.
#[derive(Clone)]
pub struct Interpolator {
    registry: Arc<AirspaceRegistry>,
    tolerance_ms: i64,
    max_extrapolation_ms: i64,
}

impl Interpolator {
    /// Create an interpolator reading from the given registry.
    pub fn new(registry: Arc<AirspaceRegistry>, config: &TrafficConfig) -> Self {
        Self {
            registry,
            tolerance_ms: config.stale_tolerance_ms.max(0),
            max_extrapolation_ms: config.max_extrapolation.as_millis() as i64,
        }
    }

    /// Best-estimate pose and parts for a callsign at a render timestamp.
    ///
    /// Never panics and never blocks beyond the registry's brief read
    /// lock; "no data" is a tagged result, not an error.
    pub fn interpolate(&self, callsign: &Callsign, at_ms: i64) -> InterpolationResult {
        let history = self.registry.situations(callsign);
        let (situation, status) = interpolate_situation(
            &history,
            at_ms,
            self.tolerance_ms,
            self.max_extrapolation_ms,
        );
        if status == InterpolationStatus::NoData {
            return InterpolationResult::no_data();
        }

        let parts = self
            .registry
            .parts_before(callsign, 0)
            .into_iter()
            .find(|p| p.timestamp_ms <= at_ms);

        InterpolationResult {
            situation,
            parts,
            status,
        }
    }
}

/// Core interpolation over a newest-first situation history.
///
/// Exposed for direct use with value-copied histories (and for tests);
/// [`Interpolator::interpolate`] wraps it with registry access.
pub fn interpolate_situation(
    history_newest_first: &[AircraftSituation],
    at_ms: i64,
    tolerance_ms: i64,
    max_extrapolation_ms: i64,
) -> (Option<AircraftSituation>, InterpolationStatus) {
    let newest = match history_newest_first.first() {
        Some(newest) => newest,
        None => return (None, InterpolationStatus::NoData),
    };
    if history_newest_first.len() == 1 {
        return (Some(newest.clone()), InterpolationStatus::Single);
    }

    if at_ms > newest.timestamp_ms + tolerance_ms {
        return (
            Some(extrapolate(newest, at_ms, max_extrapolation_ms)),
            InterpolationStatus::Extrapolated,
        );
    }
    if at_ms >= newest.timestamp_ms {
        // Within tolerance of the newest sample: take it as-is.
        return (Some(newest.clone()), InterpolationStatus::Interpolated);
    }

    if let Some(oldest) = history_newest_first.last() {
        if at_ms <= oldest.timestamp_ms {
            // Bounded history, no backward extrapolation.
            return (Some(oldest.clone()), InterpolationStatus::Interpolated);
        }
    }

    // Find the bracketing pair: newer at index i-1, older at index i.
    for pair in history_newest_first.windows(2) {
        let (newer, older) = (&pair[0], &pair[1]);
        if older.timestamp_ms <= at_ms && at_ms <= newer.timestamp_ms {
            return (
                Some(blend(older, newer, at_ms)),
                InterpolationStatus::Interpolated,
            );
        }
    }

    // Unreachable with a sorted history; fall back defensively.
    (Some(newest.clone()), InterpolationStatus::Interpolated)
}

/// Linear blend between a bracketing pair at `at_ms`.
fn blend(older: &AircraftSituation, newer: &AircraftSituation, at_ms: i64) -> AircraftSituation {
    let span = newer.timestamp_ms - older.timestamp_ms;
    let fraction = if span > 0 {
        ((at_ms - older.timestamp_ms) as f64 / span as f64).clamp(0.0, 1.0)
    } else {
        // Inconsistent ordering: clamp defensively instead of failing.
        1.0
    };

    let mut blended = older.clone();
    blended.timestamp_ms = at_ms;
    blended.position.latitude = lerp(older.position.latitude, newer.position.latitude, fraction);
    blended.position.longitude = geo::lerp_longitude(
        older.position.longitude,
        newer.position.longitude,
        fraction,
    );
    blended.position.altitude_ft = lerp(
        older.position.altitude_ft,
        newer.position.altitude_ft,
        fraction,
    );
    blended.attitude.pitch = lerp(older.attitude.pitch, newer.attitude.pitch, fraction);
    blended.attitude.bank = lerp(older.attitude.bank, newer.attitude.bank, fraction);
    blended.attitude.heading =
        geo::lerp_heading(older.attitude.heading, newer.attitude.heading, fraction);
    blended.ground_speed_kts = lerp(older.ground_speed_kts, newer.ground_speed_kts, fraction);
    blended.ground_elevation_ft = newer.ground_elevation_ft.or(older.ground_elevation_ft);
    blended
}

/// Dead-reckon past the newest sample, holding position past the cap.
fn extrapolate(
    newest: &AircraftSituation,
    at_ms: i64,
    max_extrapolation_ms: i64,
) -> AircraftSituation {
    let mut projected = newest.clone();
    projected.timestamp_ms = at_ms;

    let dt_ms = at_ms - newest.timestamp_ms;
    if dt_ms > max_extrapolation_ms {
        // Past the cap: hold the last known position.
        return projected;
    }

    let distance_nm = newest.ground_speed_kts * (dt_ms as f64 / 3_600_000.0);
    let (lat, lon) = geo::destination(
        newest.position.latitude,
        newest.position.longitude,
        newest.attitude.heading,
        distance_nm,
    );
    projected.position.latitude = lat;
    projected.position.longitude = lon;
    projected
}

#[inline]
fn lerp(from: f64, to: f64, fraction: f64) -> f64 {
    from + (to - from) * fraction
}
