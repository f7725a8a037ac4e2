//! Simulated aircraft: the aggregate view of one remote aircraft.
//!
//! Created on first sighting, updated on every relevant network event,
//! removed on disconnect or analyzer timeout. Everything a consumer needs
//! to draw or match the aircraft is here: latest situation and parts,
//! local enabled/rendered flags, capability flags and the model-matching
//! metadata (ICAO codes, livery, assigned model).
//!
//! Instances handed to consumers are always value copies; the registry
//! never exposes references into its live storage.

use crate::callsign::Callsign;
use crate::parts::AircraftParts;
use crate::situation::AircraftSituation;

/// Model-matching metadata for a remote aircraft.
///
/// The engine does not run the matching algorithm; it carries the inputs
/// the matcher needs and the model string the matcher assigned.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ModelInfo {
    /// Aircraft type designator, e.g. "A320".
    pub aircraft_icao: Option<String>,

    /// Operator designator, e.g. "DLH".
    pub airline_icao: Option<String>,

    /// Livery code, when the network provides one.
    pub livery: Option<String>,

    /// Model string assigned by the (external) model matcher.
    pub assigned_model: Option<String>,
}

/// Aggregate record for one remote aircraft in range.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedAircraft {
    /// Identity key.
    pub callsign: Callsign,

    /// Latest known pose sample.
    pub situation: Option<AircraftSituation>,

    /// Latest known absolute parts state.
    pub parts: Option<AircraftParts>,

    /// Local flag: the aircraft participates in simulation at all.
    ///
    /// Local-only, never driven by network traffic.
    pub enabled: bool,

    /// Local flag: the simulator is currently drawing this aircraft.
    ///
    /// Set by the analyzer's rendering-restriction pass.
    pub rendered: bool,

    /// The remote client sends parts updates for this aircraft.
    pub supports_parts: bool,

    /// The remote client sends high-rate position updates.
    pub supports_fast_position: bool,

    /// Model-matching metadata.
    pub model: ModelInfo,

    /// Timestamp (epoch ms) of the last accepted update for this callsign.
    ///
    /// Stamped by the registry on every successful mutation; the analyzer
    /// compares it against its staleness timeout.
    pub last_update_ms: i64,
}

impl SimulatedAircraft {
    /// Create a fresh record for a newly sighted callsign.
    ///
    /// New aircraft start enabled but not rendered; the analyzer's next
    /// rendering-restriction pass decides whether the simulator draws them.
    pub fn new(callsign: Callsign, now_ms: i64) -> Self {
        Self {
            callsign,
            situation: None,
            parts: None,
            enabled: true,
            rendered: false,
            supports_parts: false,
            supports_fast_position: false,
            model: ModelInfo::default(),
            last_update_ms: now_ms,
        }
    }

    /// Latest known timestamp of any sample (situation or parts).
    pub fn latest_sample_ms(&self) -> Option<i64> {
        let s = self.situation.as_ref().map(|s| s.timestamp_ms);
        let p = self.parts.as_ref().map(|p| p.timestamp_ms);
        match (s, p) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_aircraft_defaults() {
        let cs = Callsign::new("DLH123").unwrap();
        let aircraft = SimulatedAircraft::new(cs.clone(), 1000);

        assert_eq!(aircraft.callsign, cs);
        assert!(aircraft.enabled);
        assert!(!aircraft.rendered);
        assert!(!aircraft.supports_parts);
        assert!(aircraft.situation.is_none());
        assert!(aircraft.parts.is_none());
        assert_eq!(aircraft.last_update_ms, 1000);
    }

    #[test]
    fn test_latest_sample_ms() {
        let cs = Callsign::new("DLH123").unwrap();
        let mut aircraft = SimulatedAircraft::new(cs, 0);
        assert_eq!(aircraft.latest_sample_ms(), None);

        aircraft.parts = Some(crate::parts::AircraftParts::baseline(500));
        assert_eq!(aircraft.latest_sample_ms(), Some(500));
    }
}
