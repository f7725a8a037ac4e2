//! Decoded network events.
//!
//! The wire protocol layer (out of scope here) parses raw traffic into
//! these typed events and feeds them to the reconciler over a channel.
//! Payload scalars are still raw: validation into domain types happens at
//! the ingestion boundary so a malformed message never reaches the
//! registry.

use crate::parts::PartsMessage;
use crate::station::VoiceCapability;

/// A decoded message from the traffic network.
#[derive(Debug, Clone)]
pub enum NetworkEvent {
    /// Position/attitude report for a remote aircraft.
    PositionUpdate {
        callsign: String,
        /// Sender timestamp, epoch ms UTC.
        timestamp_ms: i64,
        latitude: f64,
        longitude: f64,
        altitude_ft: f64,
        pitch: f64,
        bank: f64,
        heading: f64,
        ground_speed_kts: f64,
        /// Ground elevation under the aircraft, when the sender knows it.
        ground_elevation_ft: Option<f64>,
    },

    /// Full or incremental parts report for a remote aircraft.
    PartsUpdate {
        callsign: String,
        message: PartsMessage,
    },

    /// Capability/metadata report for another connected user. Never
    /// carries position data.
    CapabilityUpdate {
        callsign: String,
        supports_parts: bool,
        supports_fast_position: bool,
        voice_capability: VoiceCapability,
        server: Option<String>,
        real_name: Option<String>,
        model_string: Option<String>,
    },

    /// An ATC station is online (or refreshed its data).
    StationUpdate {
        callsign: String,
        frequency_mhz: f64,
        latitude: f64,
        longitude: f64,
        altitude_ft: f64,
        range_nm: f64,
        voice_room: Option<String>,
    },

    /// A future controller session was booked.
    StationBooked {
        callsign: String,
        frequency_mhz: f64,
        latitude: f64,
        longitude: f64,
        altitude_ft: f64,
        range_nm: f64,
        from_utc_ms: i64,
        until_utc_ms: i64,
    },

    /// ATIS text for an online station.
    AtisUpdate {
        callsign: String,
        lines: Vec<String>,
    },

    /// The aircraft left the network or moved out of range.
    AircraftGone { callsign: String },

    /// The station disconnected.
    StationGone { callsign: String },

    /// The local user disconnected from the network; all remote state is
    /// discarded.
    Disconnected,
}

impl NetworkEvent {
    /// The callsign the event refers to, when it has one.
    pub fn callsign(&self) -> Option<&str> {
        match self {
            NetworkEvent::PositionUpdate { callsign, .. }
            | NetworkEvent::PartsUpdate { callsign, .. }
            | NetworkEvent::CapabilityUpdate { callsign, .. }
            | NetworkEvent::StationUpdate { callsign, .. }
            | NetworkEvent::StationBooked { callsign, .. }
            | NetworkEvent::AtisUpdate { callsign, .. }
            | NetworkEvent::AircraftGone { callsign }
            | NetworkEvent::StationGone { callsign } => Some(callsign),
            NetworkEvent::Disconnected => None,
        }
    }

    /// Short event name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            NetworkEvent::PositionUpdate { .. } => "position",
            NetworkEvent::PartsUpdate { .. } => "parts",
            NetworkEvent::CapabilityUpdate { .. } => "capability",
            NetworkEvent::StationUpdate { .. } => "station",
            NetworkEvent::StationBooked { .. } => "station-booked",
            NetworkEvent::AtisUpdate { .. } => "atis",
            NetworkEvent::AircraftGone { .. } => "aircraft-gone",
            NetworkEvent::StationGone { .. } => "station-gone",
            NetworkEvent::Disconnected => "disconnected",
        }
    }
}
