//! Remote aircraft/ATC registry.
//!
//! Exclusive owner of the canonical per-callsign state: aircraft records,
//! situation and parts histories, online and booked ATC stations and client
//! metadata. All mutation goes through this type; readers only ever receive
//! value copies, never references into live storage.
//!
//! # Concurrency
//!
//! One `parking_lot::RwLock` guards an inner struct holding all maps, so a
//! removal is atomic across every sub-collection. Mutations take the write
//! lock briefly for in-memory merges only; no operation blocks on I/O or
//! calls back into consumer code under the lock.
//!
//! # Change notifications
//!
//! After each successful mutation the registry broadcasts an
//! [`AircraftChange`] on a `tokio::sync::broadcast` channel. Delivery is
//! fire-and-forget: a send with no subscribers (or a lagging subscriber)
//! never blocks or fails ingestion.
//!
//! # Snapshots
//!
//! [`AirspaceRegistry::publish_snapshot`] walks the aircraft map once under
//! the read lock, copies the minimal fields, releases the lock, then sorts.
//! High-frequency callers read the latest published generation via
//! [`AirspaceRegistry::latest_snapshot`] in O(1).

mod snapshot;

pub use snapshot::{AirspaceAircraftSnapshot, SnapshotEntry};

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::{debug, info, trace};

use crate::aircraft::{ModelInfo, SimulatedAircraft};
use crate::callsign::Callsign;
use crate::clock;
use crate::config::TrafficConfig;
use crate::parts::{AircraftParts, PartsMessage};
use crate::situation::AircraftSituation;
use crate::station::{AtcStation, Client};

/// Change notification emitted after a successful mutation.
///
/// Carries a value copy of the affected record so subscribers never need to
/// query back into the registry.
#[derive(Debug, Clone)]
pub enum AircraftChange {
    /// First sighting of a callsign.
    Added(SimulatedAircraft),
    /// Existing record updated.
    Updated(SimulatedAircraft),
    /// Callsign removed (explicit disconnect or analyzer timeout).
    Removed(Callsign),
}

/// Result of an upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// A new record was created for the callsign.
    Added,
    /// An existing record was updated.
    Updated,
    /// The sample was older than (or a duplicate of) retained data and was
    /// dropped. Not an error; counted by the ingestion layer.
    Stale,
}

/// Everything guarded by the registry lock.
#[derive(Default)]
struct RegistryInner {
    aircraft: HashMap<Callsign, SimulatedAircraft>,
    /// Newest-first bounded situation history per callsign.
    situations: HashMap<Callsign, VecDeque<AircraftSituation>>,
    /// Newest-first bounded parts history per callsign.
    parts: HashMap<Callsign, VecDeque<AircraftParts>>,
    stations_online: HashMap<Callsign, AtcStation>,
    stations_booked: HashMap<Callsign, AtcStation>,
    clients: HashMap<Callsign, Client>,
    /// Own aircraft situation, fed by the local simulator (not network
    /// traffic); used for distance calculations.
    own_situation: Option<AircraftSituation>,
}

/// Thread-safe owner of all remote aircraft and ATC station state.
pub struct AirspaceRegistry {
    inner: RwLock<RegistryInner>,
    changes_tx: broadcast::Sender<AircraftChange>,
    latest_snapshot: RwLock<Arc<AirspaceAircraftSnapshot>>,
    snapshot_generation: AtomicU64,
    max_situation_history: usize,
    max_parts_history: usize,
    stale_tolerance_ms: i64,
}

impl AirspaceRegistry {
    /// Create an empty registry with the given configuration.
    pub fn new(config: &TrafficConfig) -> Self {
        let (changes_tx, _) = broadcast::channel(config.change_channel_capacity.max(1));
        Self {
            inner: RwLock::new(RegistryInner::default()),
            changes_tx,
            latest_snapshot: RwLock::new(AirspaceAircraftSnapshot::empty()),
            snapshot_generation: AtomicU64::new(0),
            max_situation_history: config.max_situation_history.max(1),
            max_parts_history: config.max_parts_history.max(1),
            stale_tolerance_ms: config.stale_tolerance_ms,
        }
    }

    /// Subscribe to change notifications.
    pub fn subscribe_changes(&self) -> broadcast::Receiver<AircraftChange> {
        self.changes_tx.subscribe()
    }

    // ---- mutation ------------------------------------------------------

    /// Insert a situation sample into a callsign's history.
    ///
    /// Creates the aircraft record on first sighting. A sample whose
    /// timestamp precedes the newest retained one by more than the stale
    /// tolerance, or that duplicates a retained timestamp, is dropped.
    /// Slightly-late samples inside the tolerance are inserted in timestamp
    /// order so the retained history stays monotonic.
    pub fn upsert_situation(
        &self,
        callsign: &Callsign,
        situation: AircraftSituation,
    ) -> UpsertOutcome {
        let change;
        let outcome;
        {
            let mut guard = self.inner.write();
            let inner = &mut *guard;
            let history = inner.situations.entry(callsign.clone()).or_default();

            if let Some(newest) = history.front() {
                // Drop only samples more than the tolerance behind the
                // newest; exactly at the boundary is still accepted.
                if situation.timestamp_ms < newest.timestamp_ms - self.stale_tolerance_ms {
                    debug!(callsign = %callsign, ts = situation.timestamp_ms, "Dropping stale situation");
                    return UpsertOutcome::Stale;
                }
            }
            if history
                .iter()
                .any(|s| s.timestamp_ms == situation.timestamp_ms)
            {
                debug!(callsign = %callsign, ts = situation.timestamp_ms, "Dropping duplicate situation");
                return UpsertOutcome::Stale;
            }

            // Insert keeping newest-first order; late-but-tolerated samples
            // land behind newer ones.
            let pos = history
                .iter()
                .position(|s| s.timestamp_ms < situation.timestamp_ms)
                .unwrap_or(history.len());
            history.insert(pos, situation);
            history.truncate(self.max_situation_history);

            let latest = history.front().cloned();
            let now = clock::now_ms();
            let is_new = !inner.aircraft.contains_key(callsign);
            let record = inner
                .aircraft
                .entry(callsign.clone())
                .or_insert_with(|| SimulatedAircraft::new(callsign.clone(), now));
            record.situation = latest;
            record.last_update_ms = now;
            let copy = record.clone();

            outcome = if is_new {
                UpsertOutcome::Added
            } else {
                UpsertOutcome::Updated
            };
            change = if is_new {
                AircraftChange::Added(copy)
            } else {
                AircraftChange::Updated(copy)
            };
        }

        if matches!(outcome, UpsertOutcome::Added) {
            info!(callsign = %callsign, "Aircraft added");
        }
        self.notify(change);
        outcome
    }

    /// Apply a parts update (full snapshot or incremental delta).
    ///
    /// An incremental delta merges onto the last known absolute state; when
    /// no prior record exists, a default baseline is synthesized first.
    /// Parts whose timestamp is not newer than the newest retained sample
    /// are dropped (merging backwards would corrupt the state).
    pub fn upsert_parts(&self, callsign: &Callsign, message: PartsMessage) -> UpsertOutcome {
        let change;
        let outcome;
        {
            let mut guard = self.inner.write();
            let inner = &mut *guard;
            let history = inner.parts.entry(callsign.clone()).or_default();

            if let Some(newest) = history.front() {
                if message.timestamp_ms() <= newest.timestamp_ms {
                    debug!(callsign = %callsign, ts = message.timestamp_ms(), "Dropping stale parts");
                    return UpsertOutcome::Stale;
                }
            }

            let absolute = match message {
                PartsMessage::Full(parts) => parts,
                PartsMessage::Incremental(delta) => match history.front() {
                    Some(prior) => prior.merged(&delta),
                    None => {
                        trace!(callsign = %callsign, "Synthesizing parts baseline for incremental update");
                        AircraftParts::baseline(delta.timestamp_ms).merged(&delta)
                    }
                },
            };

            history.push_front(absolute.clone());
            history.truncate(self.max_parts_history);

            let now = clock::now_ms();
            let is_new = !inner.aircraft.contains_key(callsign);
            let record = inner
                .aircraft
                .entry(callsign.clone())
                .or_insert_with(|| SimulatedAircraft::new(callsign.clone(), now));
            record.parts = Some(absolute);
            record.supports_parts = true;
            record.last_update_ms = now;
            let copy = record.clone();

            outcome = if is_new {
                UpsertOutcome::Added
            } else {
                UpsertOutcome::Updated
            };
            change = if is_new {
                AircraftChange::Added(copy)
            } else {
                AircraftChange::Updated(copy)
            };
        }

        self.notify(change);
        outcome
    }

    /// Update capability flags and the client metadata record for a
    /// callsign.
    ///
    /// Client records are kept even for callsigns with no aircraft record
    /// (ATC stations have clients too); aircraft capability flags are only
    /// touched when an aircraft record exists. Never touches position or
    /// parts history.
    pub fn apply_capabilities(
        &self,
        callsign: &Callsign,
        client: Client,
        supports_parts: bool,
        supports_fast_position: bool,
    ) -> bool {
        let change;
        {
            let mut inner = self.inner.write();
            inner.clients.insert(callsign.clone(), client);

            match inner.aircraft.get_mut(callsign) {
                Some(record) => {
                    record.supports_parts = record.supports_parts || supports_parts;
                    record.supports_fast_position = supports_fast_position;
                    record.last_update_ms = clock::now_ms();
                    change = Some(AircraftChange::Updated(record.clone()));
                }
                None => change = None,
            }
        }

        match change {
            Some(change) => {
                self.notify(change);
                true
            }
            None => false,
        }
    }

    /// Update model-matching metadata for an aircraft.
    ///
    /// Used by the external model matcher to write back the assigned model.
    pub fn update_model(&self, callsign: &Callsign, model: ModelInfo) -> bool {
        let change;
        {
            let mut inner = self.inner.write();
            match inner.aircraft.get_mut(callsign) {
                Some(record) => {
                    record.model = model;
                    change = AircraftChange::Updated(record.clone());
                }
                None => return false,
            }
        }
        self.notify(change);
        true
    }

    /// Toggle the local `enabled` flag. Returns false for unknown
    /// callsigns.
    pub fn set_enabled(&self, callsign: &Callsign, enabled: bool) -> bool {
        self.set_flag(callsign, |record| record.enabled = enabled)
    }

    /// Toggle the local `rendered` flag. Returns false for unknown
    /// callsigns.
    pub fn set_rendered(&self, callsign: &Callsign, rendered: bool) -> bool {
        self.set_flag(callsign, |record| record.rendered = rendered)
    }

    fn set_flag(&self, callsign: &Callsign, apply: impl FnOnce(&mut SimulatedAircraft)) -> bool {
        let change;
        {
            let mut inner = self.inner.write();
            match inner.aircraft.get_mut(callsign) {
                Some(record) => {
                    apply(record);
                    change = AircraftChange::Updated(record.clone());
                }
                None => return false,
            }
        }
        self.notify(change);
        true
    }

    /// Apply a batch of rendered-flag decisions under one write lock.
    ///
    /// Used by the analyzer's rendering-restriction pass; flags that do not
    /// change are skipped silently and no per-aircraft notification storm
    /// is produced.
    pub fn apply_rendered_flags(&self, decisions: &[(Callsign, bool)]) {
        let mut inner = self.inner.write();
        for (callsign, rendered) in decisions {
            if let Some(record) = inner.aircraft.get_mut(callsign) {
                record.rendered = *rendered;
            }
        }
    }

    /// Remove an aircraft and every trace of it: record, situation history,
    /// parts history, client metadata. Idempotent; returns whether the
    /// callsign was present.
    pub fn remove_aircraft(&self, callsign: &Callsign) -> bool {
        let present;
        {
            let mut inner = self.inner.write();
            present = inner.aircraft.remove(callsign).is_some();
            inner.situations.remove(callsign);
            inner.parts.remove(callsign);
            inner.clients.remove(callsign);
        }
        if present {
            info!(callsign = %callsign, "Aircraft removed");
            self.notify(AircraftChange::Removed(callsign.clone()));
        }
        present
    }

    /// Insert or replace an online station.
    pub fn upsert_station_online(&self, station: AtcStation) {
        let mut inner = self.inner.write();
        inner
            .stations_online
            .insert(station.callsign.clone(), station);
    }

    /// Insert or replace a booked station.
    pub fn upsert_station_booked(&self, station: AtcStation) {
        let mut inner = self.inner.write();
        inner
            .stations_booked
            .insert(station.callsign.clone(), station);
    }

    /// Replace the ATIS text of an online station. Returns false when the
    /// station is unknown.
    pub fn set_station_atis(&self, callsign: &Callsign, lines: Vec<String>) -> bool {
        let mut inner = self.inner.write();
        match inner.stations_online.get_mut(callsign) {
            Some(station) => {
                station.atis_lines = lines;
                true
            }
            None => false,
        }
    }

    /// Remove a station from both the online and booked collections plus
    /// its client record. Idempotent.
    pub fn remove_station(&self, callsign: &Callsign) -> bool {
        let mut inner = self.inner.write();
        let online = inner.stations_online.remove(callsign).is_some();
        let booked = inner.stations_booked.remove(callsign).is_some();
        inner.clients.remove(callsign);
        if online {
            info!(callsign = %callsign, "Station removed");
        }
        online || booked
    }

    /// Feed the own aircraft situation from the local simulator.
    pub fn set_own_situation(&self, situation: AircraftSituation) {
        self.inner.write().own_situation = Some(situation);
    }

    /// Full reset of all remote state, used on network disconnect.
    ///
    /// The own situation is kept: it comes from the local simulator, not
    /// from network traffic. Updates arriving concurrently with or after
    /// the clear are treated as fresh first sightings.
    pub fn clear(&self) {
        {
            let mut inner = self.inner.write();
            let own = inner.own_situation.take();
            *inner = RegistryInner {
                own_situation: own,
                ..RegistryInner::default()
            };
        }
        *self.latest_snapshot.write() = AirspaceAircraftSnapshot::empty();
        info!("Airspace registry cleared");
    }

    // ---- queries -------------------------------------------------------

    /// All aircraft currently in range, as value copies.
    pub fn aircraft_in_range(&self) -> Vec<SimulatedAircraft> {
        self.inner.read().aircraft.values().cloned().collect()
    }

    /// Number of aircraft currently in range.
    pub fn aircraft_count(&self) -> usize {
        self.inner.read().aircraft.len()
    }

    /// One aircraft by callsign, or `None`.
    pub fn aircraft_for_callsign(&self, callsign: &Callsign) -> Option<SimulatedAircraft> {
        self.inner.read().aircraft.get(callsign).cloned()
    }

    /// Situation history for a callsign, newest first.
    pub fn situations(&self, callsign: &Callsign) -> Vec<AircraftSituation> {
        self.inner
            .read()
            .situations
            .get(callsign)
            .map(|h| h.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Parts history for a callsign, newest first, excluding samples older
    /// than `cutoff_time_ms`. A cutoff of 0 or less disables the filter.
    pub fn parts_before(&self, callsign: &Callsign, cutoff_time_ms: i64) -> Vec<AircraftParts> {
        self.inner
            .read()
            .parts
            .get(callsign)
            .map(|h| {
                h.iter()
                    .filter(|p| cutoff_time_ms <= 0 || p.timestamp_ms >= cutoff_time_ms)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Callsigns whose remote client sends parts updates.
    pub fn supporting_parts(&self) -> Vec<Callsign> {
        self.inner
            .read()
            .aircraft
            .values()
            .filter(|a| a.supports_parts)
            .map(|a| a.callsign.clone())
            .collect()
    }

    /// Whether a specific remote aircraft sends parts updates.
    pub fn is_supporting_parts(&self, callsign: &Callsign) -> bool {
        self.inner
            .read()
            .aircraft
            .get(callsign)
            .is_some_and(|a| a.supports_parts)
    }

    /// The `n` aircraft closest to the own aircraft, closest first.
    ///
    /// Returns an empty list when the own position is unknown; aircraft
    /// without a situation are excluded.
    pub fn nearest_aircraft(&self, n: usize) -> Vec<SimulatedAircraft> {
        let inner = self.inner.read();
        let own = match &inner.own_situation {
            Some(own) => own.position,
            None => return Vec::new(),
        };
        let mut with_distance: Vec<(f64, SimulatedAircraft)> = inner
            .aircraft
            .values()
            .filter_map(|a| {
                a.situation
                    .as_ref()
                    .map(|s| (own.distance_nm(&s.position), a.clone()))
            })
            .collect();
        drop(inner);

        with_distance.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        with_distance
            .into_iter()
            .take(n)
            .map(|(_, a)| a)
            .collect()
    }

    /// All online stations, as value copies.
    pub fn stations_online(&self) -> Vec<AtcStation> {
        self.inner.read().stations_online.values().cloned().collect()
    }

    /// All booked stations, as value copies.
    pub fn stations_booked(&self) -> Vec<AtcStation> {
        self.inner.read().stations_booked.values().cloned().collect()
    }

    /// One station by callsign: the online record wins over a booking.
    pub fn station_for_callsign(&self, callsign: &Callsign) -> Option<AtcStation> {
        let inner = self.inner.read();
        inner
            .stations_online
            .get(callsign)
            .or_else(|| inner.stations_booked.get(callsign))
            .cloned()
    }

    /// Client metadata record for a callsign.
    pub fn client_for_callsign(&self, callsign: &Callsign) -> Option<Client> {
        self.inner.read().clients.get(callsign).cloned()
    }

    /// Own aircraft situation, when the simulator has reported one.
    pub fn own_situation(&self) -> Option<AircraftSituation> {
        self.inner.read().own_situation.clone()
    }

    // ---- snapshots -----------------------------------------------------

    /// Build and publish a new snapshot generation.
    ///
    /// Walks the aircraft map once under the read lock, then releases the
    /// lock before sorting, so the lock hold time does not grow with the
    /// filtering cost.
    pub fn publish_snapshot(&self) -> Arc<AirspaceAircraftSnapshot> {
        let mut entries: Vec<SnapshotEntry>;
        {
            let inner = self.inner.read();
            let own = inner.own_situation.as_ref().map(|s| s.position);
            entries = inner
                .aircraft
                .values()
                .filter_map(|a| {
                    a.situation.as_ref().map(|s| SnapshotEntry {
                        callsign: a.callsign.clone(),
                        position: s.position,
                        ground_speed_kts: s.ground_speed_kts,
                        distance_nm: own.map(|o| o.distance_nm(&s.position)),
                        enabled: a.enabled,
                        rendered: a.rendered,
                    })
                })
                .collect();
        }

        AirspaceAircraftSnapshot::sort_entries(&mut entries);
        let snapshot = Arc::new(AirspaceAircraftSnapshot {
            generation: self.snapshot_generation.fetch_add(1, Ordering::Relaxed) + 1,
            timestamp_ms: clock::now_ms(),
            entries,
        });

        *self.latest_snapshot.write() = Arc::clone(&snapshot);
        trace!(
            generation = snapshot.generation,
            aircraft = snapshot.entries.len(),
            "Published airspace snapshot"
        );
        snapshot
    }

    /// The most recently published snapshot. O(1); never computes on
    /// demand.
    pub fn latest_snapshot(&self) -> Arc<AirspaceAircraftSnapshot> {
        Arc::clone(&self.latest_snapshot.read())
    }

    fn notify(&self, change: AircraftChange) {
        // Fire-and-forget: no subscribers is fine.
        let _ = self.changes_tx.send(change);
    }
}
