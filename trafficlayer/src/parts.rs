//! Aircraft parts: timestamped discrete aircraft state.
//!
//! Parts cover everything visible on a remote aircraft that is not pose:
//! gear, flaps, spoilers, lights, engines and the on-ground flag. The wire
//! protocol sends either full snapshots or incremental deltas; a delta only
//! carries the fields that changed and is merged onto the last known
//! absolute state. The merge is associative forward in time only.

/// Exterior light state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AircraftLights {
    pub strobe_on: bool,
    pub landing_on: bool,
    pub taxi_on: bool,
    pub beacon_on: bool,
    pub nav_on: bool,
}

/// One timestamped absolute parts snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct AircraftParts {
    /// Network timestamp, epoch milliseconds UTC.
    pub timestamp_ms: i64,

    /// Landing gear down.
    pub gear_down: bool,

    /// Flap deployment, 0-100 percent.
    pub flaps_percent: u8,

    /// Spoilers/speedbrakes deployed.
    pub spoilers_out: bool,

    /// Exterior lights.
    pub lights: AircraftLights,

    /// Per-engine running flags (index 0 = engine 1).
    pub engines_on: Vec<bool>,

    /// Aircraft is on the ground.
    pub on_ground: bool,
}

impl AircraftParts {
    /// Default absolute baseline used when an incremental delta arrives for
    /// a callsign with no prior parts record: airborne, clean configuration,
    /// engines running, beacon and nav lights on.
    pub fn baseline(timestamp_ms: i64) -> Self {
        Self {
            timestamp_ms,
            gear_down: false,
            flaps_percent: 0,
            spoilers_out: false,
            lights: AircraftLights {
                strobe_on: true,
                landing_on: false,
                taxi_on: false,
                beacon_on: true,
                nav_on: true,
            },
            engines_on: vec![true, true],
            on_ground: false,
        }
    }

    /// Apply an incremental delta on top of this state, producing the new
    /// absolute state stamped with the delta's timestamp.
    pub fn merged(&self, delta: &PartsDelta) -> AircraftParts {
        AircraftParts {
            timestamp_ms: delta.timestamp_ms,
            gear_down: delta.gear_down.unwrap_or(self.gear_down),
            flaps_percent: delta.flaps_percent.unwrap_or(self.flaps_percent),
            spoilers_out: delta.spoilers_out.unwrap_or(self.spoilers_out),
            lights: delta.lights.unwrap_or(self.lights),
            engines_on: delta
                .engines_on
                .clone()
                .unwrap_or_else(|| self.engines_on.clone()),
            on_ground: delta.on_ground.unwrap_or(self.on_ground),
        }
    }
}

/// An incremental parts update: only the changed fields are present.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PartsDelta {
    /// Network timestamp, epoch milliseconds UTC.
    pub timestamp_ms: i64,
    pub gear_down: Option<bool>,
    pub flaps_percent: Option<u8>,
    pub spoilers_out: Option<bool>,
    pub lights: Option<AircraftLights>,
    pub engines_on: Option<Vec<bool>>,
    pub on_ground: Option<bool>,
}

impl PartsDelta {
    /// A delta that changes nothing (useful as a builder starting point).
    pub fn at(timestamp_ms: i64) -> Self {
        Self {
            timestamp_ms,
            ..Default::default()
        }
    }
}

/// A parts update as presented by the protocol layer: either a full
/// snapshot or an incremental delta.
#[derive(Debug, Clone, PartialEq)]
pub enum PartsMessage {
    Full(AircraftParts),
    Incremental(PartsDelta),
}

impl PartsMessage {
    /// Timestamp of the update, whichever kind it is.
    pub fn timestamp_ms(&self) -> i64 {
        match self {
            PartsMessage::Full(parts) => parts.timestamp_ms,
            PartsMessage::Incremental(delta) => delta.timestamp_ms,
        }
    }
}
