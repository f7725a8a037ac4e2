//! ATC stations and client records.
//!
//! Stations come in two independent collections: online controllers
//! (connected right now) and bookings (reserved future sessions). Both may
//! reference the same callsign. Client records carry capability metadata
//! for other connected users; they are joined to aircraft and stations by
//! callsign for display purposes and are never authoritative position data.

use crate::callsign::Callsign;
use crate::error::ValidationError;
use crate::situation::GeoPosition;

/// Connection status of an ATC station.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StationStatus {
    /// Controller is online.
    Connected,
    /// Future session booked, controller not connected.
    Booked,
    /// No longer connected.
    #[default]
    Disconnected,
}

/// An online or booked controller.
#[derive(Debug, Clone, PartialEq)]
pub struct AtcStation {
    /// Identity key, e.g. "EDDM_TWR".
    pub callsign: Callsign,

    /// Primary frequency in MHz.
    pub frequency_mhz: f64,

    /// Station position (tower/center reference point).
    pub position: GeoPosition,

    /// Service range in nautical miles.
    pub range_nm: f64,

    /// Connection status.
    pub status: StationStatus,

    /// Voice room URL, when the controller provides voice.
    pub voice_room: Option<String>,

    /// Current ATIS text, one entry per line.
    pub atis_lines: Vec<String>,

    /// Booking window (epoch ms UTC), set only on booked entries.
    pub booked_from_ms: Option<i64>,
    pub booked_until_ms: Option<i64>,
}

impl AtcStation {
    /// Create a validated online station record.
    pub fn online(
        callsign: Callsign,
        frequency_mhz: f64,
        position: GeoPosition,
        range_nm: f64,
    ) -> Result<Self, ValidationError> {
        // VHF airband plus a little slack for UNICOM-style frequencies
        if !frequency_mhz.is_finite() || !(118.0..=137.0).contains(&frequency_mhz) {
            return Err(ValidationError::InvalidFrequency(frequency_mhz));
        }
        Ok(Self {
            callsign,
            frequency_mhz,
            position,
            range_nm: range_nm.max(0.0),
            status: StationStatus::Connected,
            voice_room: None,
            atis_lines: Vec::new(),
            booked_from_ms: None,
            booked_until_ms: None,
        })
    }

    /// Create a validated booking record for a future session.
    pub fn booked(
        callsign: Callsign,
        frequency_mhz: f64,
        position: GeoPosition,
        range_nm: f64,
        from_ms: i64,
        until_ms: i64,
    ) -> Result<Self, ValidationError> {
        let mut station = Self::online(callsign, frequency_mhz, position, range_nm)?;
        station.status = StationStatus::Booked;
        station.booked_from_ms = Some(from_ms);
        station.booked_until_ms = Some(until_ms);
        Ok(station)
    }

    /// Attach a voice room URL.
    pub fn with_voice_room(mut self, url: impl Into<String>) -> Self {
        self.voice_room = Some(url.into());
        self
    }
}

/// Voice capability of a connected user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VoiceCapability {
    #[default]
    Unknown,
    Voice,
    TextOnly,
    ReceiveOnly,
}

/// Capability/metadata record for another connected user.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Client {
    /// Voice capability announced by the client.
    pub voice_capability: VoiceCapability,

    /// Server the client is connected to.
    pub server: Option<String>,

    /// Real name, when published.
    pub real_name: Option<String>,

    /// Model string the client reports for itself.
    pub model_string: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position() -> GeoPosition {
        GeoPosition::new(48.3538, 11.7861, 1487.0).unwrap()
    }

    #[test]
    fn test_online_station() {
        let station = AtcStation::online(
            Callsign::new("EDDM_TWR").unwrap(),
            118.7,
            position(),
            50.0,
        )
        .unwrap();
        assert_eq!(station.status, StationStatus::Connected);
        assert!(station.booked_from_ms.is_none());
    }

    #[test]
    fn test_invalid_frequency_rejected() {
        let result = AtcStation::online(Callsign::new("EDDM_TWR").unwrap(), 12.3, position(), 50.0);
        assert_eq!(result, Err(ValidationError::InvalidFrequency(12.3)));
    }

    #[test]
    fn test_booked_station_window() {
        let station = AtcStation::booked(
            Callsign::new("EDDM_APP").unwrap(),
            123.9,
            position(),
            80.0,
            1_000,
            2_000,
        )
        .unwrap();
        assert_eq!(station.status, StationStatus::Booked);
        assert_eq!(station.booked_from_ms, Some(1_000));
        assert_eq!(station.booked_until_ms, Some(2_000));
    }

    #[test]
    fn test_negative_range_clamped() {
        let station =
            AtcStation::online(Callsign::new("EDDM_GND").unwrap(), 121.7, position(), -1.0)
                .unwrap();
        assert_eq!(station.range_nm, 0.0);
    }

    #[test]
    fn test_voice_room_builder() {
        let station = AtcStation::online(
            Callsign::new("EDDM_TWR").unwrap(),
            118.7,
            position(),
            50.0,
        )
        .unwrap()
        .with_voice_room("vvl://voice.example/eddm_twr");
        assert_eq!(
            station.voice_room.as_deref(),
            Some("vvl://voice.example/eddm_twr")
        );
    }
}
