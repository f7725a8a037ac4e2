//! Immutable airspace snapshots.
//!
//! A snapshot is a consistent point-in-time copy of "aircraft in range",
//! published periodically by the analyzer and handed to high-frequency
//! consumers (rendering restriction logic, model matching) so they never
//! touch the live registry lock. Entries carry only the minimal fields
//! those consumers need.

use std::sync::Arc;

use crate::callsign::Callsign;
use crate::situation::GeoPosition;

/// Minimal per-aircraft data inside a snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotEntry {
    pub callsign: Callsign,

    /// Position at snapshot time.
    pub position: GeoPosition,

    /// Ground speed in knots.
    pub ground_speed_kts: f64,

    /// Distance from the own aircraft in NM, when the own position is
    /// known.
    pub distance_nm: Option<f64>,

    /// Local flags as of the same generation (never torn across
    /// generations).
    pub enabled: bool,
    pub rendered: bool,
}

/// An immutable, generation-stamped copy of the airspace.
///
/// Entries are sorted closest-first; aircraft with unknown distance sort
/// last, tie-broken by callsign for stability.
#[derive(Debug, Clone, PartialEq)]
pub struct AirspaceAircraftSnapshot {
    /// Monotonically increasing snapshot generation.
    pub generation: u64,

    /// Wall-clock time the snapshot was taken, epoch ms UTC.
    pub timestamp_ms: i64,

    /// Aircraft entries, closest-first.
    pub entries: Vec<SnapshotEntry>,
}

impl AirspaceAircraftSnapshot {
    /// The empty snapshot published before the first regeneration.
    pub fn empty() -> Arc<Self> {
        Arc::new(Self {
            generation: 0,
            timestamp_ms: 0,
            entries: Vec::new(),
        })
    }

    /// Sort entries closest-first with a stable tie-break.
    pub(crate) fn sort_entries(entries: &mut [SnapshotEntry]) {
        entries.sort_by(|a, b| match (a.distance_nm, b.distance_nm) {
            (Some(da), Some(db)) => da
                .partial_cmp(&db)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.callsign.cmp(&b.callsign)),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => a.callsign.cmp(&b.callsign),
        });
    }

    /// Entry for a callsign, if present in this generation.
    pub fn entry(&self, callsign: &Callsign) -> Option<&SnapshotEntry> {
        self.entries.iter().find(|e| &e.callsign == callsign)
    }
}
