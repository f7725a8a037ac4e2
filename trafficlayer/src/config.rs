//! Engine configuration.
//!
//! All tolerance windows are runtime configuration rather than constants:
//! history depth, staleness windows, extrapolation cap and rendering
//! restrictions are product-tuning decisions, so they arrive here and flow
//! to the components at construction.

use std::time::Duration;

/// Configuration for the traffic engine.
///
/// The defaults are reasonable for a VATSIM-like network sending position
/// updates every ~5 seconds.
#[derive(Debug, Clone)]
pub struct TrafficConfig {
    /// Maximum retained situation samples per callsign.
    pub max_situation_history: usize,

    /// Maximum retained parts samples per callsign.
    pub max_parts_history: usize,

    /// A situation older than the newest retained sample by more than this
    /// is dropped as a late/duplicate delivery.
    pub stale_tolerance_ms: i64,

    /// Maximum duration to dead-reckon past the newest sample before the
    /// interpolator holds the last known position.
    pub max_extrapolation: Duration,

    /// Analyzer removes a callsign after this long without an accepted
    /// update.
    pub stale_timeout: Duration,

    /// Interval between analyzer sweeps.
    pub sweep_interval: Duration,

    /// Maximum number of aircraft the simulator may render.
    pub max_rendered_aircraft: usize,

    /// Aircraft beyond this distance from the own aircraft are not
    /// rendered.
    pub max_rendered_distance_nm: f64,

    /// Capacity of the inbound network-event channel.
    pub event_channel_capacity: usize,

    /// Capacity of the aircraft-change broadcast channel.
    pub change_channel_capacity: usize,
}

impl Default for TrafficConfig {
    fn default() -> Self {
        Self {
            max_situation_history: 6,
            max_parts_history: 6,
            stale_tolerance_ms: 100,
            max_extrapolation: Duration::from_secs(6),
            stale_timeout: Duration::from_secs(60),
            sweep_interval: Duration::from_secs(1),
            max_rendered_aircraft: 100,
            max_rendered_distance_nm: 100.0,
            event_channel_capacity: 256,
            change_channel_capacity: 64,
        }
    }
}

impl TrafficConfig {
    /// Set the per-callsign situation history depth.
    pub fn with_max_situation_history(mut self, depth: usize) -> Self {
        self.max_situation_history = depth.max(1);
        self
    }

    /// Set the analyzer staleness timeout.
    pub fn with_stale_timeout(mut self, timeout: Duration) -> Self {
        self.stale_timeout = timeout;
        self
    }

    /// Set the extrapolation cap.
    pub fn with_max_extrapolation(mut self, cap: Duration) -> Self {
        self.max_extrapolation = cap;
        self
    }

    /// Set the rendering restrictions.
    pub fn with_rendering_limits(mut self, max_aircraft: usize, max_distance_nm: f64) -> Self {
        self.max_rendered_aircraft = max_aircraft;
        self.max_rendered_distance_nm = max_distance_nm;
        self
    }

    /// Set the analyzer sweep interval.
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }
}
