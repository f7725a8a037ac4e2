//! Update ingestion and reconciliation.
//!
//! Translates decoded [`NetworkEvent`]s into registry operations, applying
//! the ordering/staleness/idempotence policy:
//!
//! - A per-callsign "last applied timestamp" makes ingestion idempotent
//!   under redelivery: a replayed message with the same or an earlier
//!   timestamp is dropped before it reaches the registry. Position and
//!   parts streams are tracked separately so a parts report sharing a
//!   timestamp with a position report is not a false duplicate. The
//!   timestamps are only authoritative while the registry still tracks
//!   the callsign: any removal (explicit gone event or analyzer timeout)
//!   resets them, so a re-sighting is a fresh first contact.
//! - Failures are isolated per event: a validation rejection for one
//!   callsign is logged and counted, and the loop moves on to the next
//!   message. Nothing unwinds the ingestion loop.
//!
//! The reconciler emits no notifications of its own; the registry
//! broadcasts changes after each successful mutation.

mod event;

pub use event::NetworkEvent;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::callsign::Callsign;
use crate::error::ValidationError;
use crate::registry::{AircraftChange, AirspaceRegistry, UpsertOutcome};
use crate::situation::{AircraftSituation, Attitude, GeoPosition};
use crate::station::{AtcStation, Client};

/// Result of applying one event.
#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    /// The event mutated the registry (or was a structural event like a
    /// removal that found nothing to remove).
    Applied,
    /// Duplicate or out-of-date delivery; dropped, counted, not an error.
    Stale,
    /// The payload failed validation; dropped, counted, reported.
    Rejected(ValidationError),
}

/// Snapshot of ingestion diagnostics counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub applied: u64,
    pub stale: u64,
    pub rejected: u64,
}

#[derive(Default)]
struct Counters {
    applied: AtomicU64,
    stale: AtomicU64,
    rejected: AtomicU64,
}

/// Reconciles decoded network events into the registry.
pub struct Reconciler {
    registry: Arc<AirspaceRegistry>,
    /// Last applied position timestamp per callsign.
    last_position_ms: DashMap<Callsign, i64>,
    /// Last applied parts timestamp per callsign.
    last_parts_ms: DashMap<Callsign, i64>,
    counters: Counters,
}

impl Reconciler {
    /// Create a reconciler writing into the given registry.
    pub fn new(registry: Arc<AirspaceRegistry>) -> Self {
        Self {
            registry,
            last_position_ms: DashMap::new(),
            last_parts_ms: DashMap::new(),
            counters: Counters::default(),
        }
    }

    /// Apply a single event. Never panics; per-event failures are returned
    /// as [`IngestOutcome`] values.
    pub fn apply(&self, event: NetworkEvent) -> IngestOutcome {
        let outcome = self.dispatch(event);
        match &outcome {
            IngestOutcome::Applied => self.counters.applied.fetch_add(1, Ordering::Relaxed),
            IngestOutcome::Stale => self.counters.stale.fetch_add(1, Ordering::Relaxed),
            IngestOutcome::Rejected(_) => self.counters.rejected.fetch_add(1, Ordering::Relaxed),
        };
        outcome
    }

    /// Last applied position timestamp for a callsign, when any.
    pub fn last_applied_position_ms(&self, callsign: &Callsign) -> Option<i64> {
        self.last_position_ms.get(callsign).map(|e| *e.value())
    }

    /// Current diagnostics counters.
    pub fn stats(&self) -> IngestStats {
        IngestStats {
            applied: self.counters.applied.load(Ordering::Relaxed),
            stale: self.counters.stale.load(Ordering::Relaxed),
            rejected: self.counters.rejected.load(Ordering::Relaxed),
        }
    }

    /// Consume events from the channel until cancellation or until all
    /// producers dropped their senders.
    ///
    /// A rejected event is logged and the loop continues with the next
    /// message; one bad callsign never aborts a batch.
    pub async fn run(
        self: Arc<Self>,
        mut events: mpsc::Receiver<NetworkEvent>,
        shutdown: CancellationToken,
    ) {
        // Removals the reconciler did not perform itself (analyzer
        // timeouts) must also reset replay tracking.
        let mut changes = self.registry.subscribe_changes();
        info!("Ingestion loop started");
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!("Ingestion loop cancelled");
                    break;
                }
                change = changes.recv() => {
                    match change {
                        Ok(AircraftChange::Removed(callsign)) => self.forget(&callsign),
                        Ok(_) => {}
                        // Missed notifications are harmless: defunct
                        // entries are also reclaimed lazily on the next
                        // sighting of the callsign.
                        Err(broadcast::error::RecvError::Lagged(_)) => {}
                        Err(broadcast::error::RecvError::Closed) => {}
                    }
                }
                event = events.recv() => {
                    let Some(event) = event else {
                        debug!("Event channel closed, stopping ingestion");
                        break;
                    };
                    let kind = event.kind();
                    let callsign = event.callsign().map(str::to_owned);
                    match self.apply(event) {
                        IngestOutcome::Applied => {}
                        IngestOutcome::Stale => {
                            trace!(kind, callsign = callsign.as_deref(), "Dropped stale event");
                        }
                        IngestOutcome::Rejected(error) => {
                            warn!(
                                kind,
                                callsign = callsign.as_deref(),
                                error = %error,
                                "Rejected network event"
                            );
                        }
                    }
                }
            }
        }
        let stats = self.stats();
        info!(
            applied = stats.applied,
            stale = stats.stale,
            rejected = stats.rejected,
            "Ingestion loop stopped"
        );
    }

    fn dispatch(&self, event: NetworkEvent) -> IngestOutcome {
        match event {
            NetworkEvent::PositionUpdate {
                callsign,
                timestamp_ms,
                latitude,
                longitude,
                altitude_ft,
                pitch,
                bank,
                heading,
                ground_speed_kts,
                ground_elevation_ft,
            } => {
                let callsign = match Callsign::new(&callsign) {
                    Ok(cs) => cs,
                    Err(e) => return IngestOutcome::Rejected(e),
                };
                if self.is_replay(&self.last_position_ms, &callsign, timestamp_ms) {
                    return IngestOutcome::Stale;
                }

                let situation = match Self::build_situation(
                    timestamp_ms,
                    latitude,
                    longitude,
                    altitude_ft,
                    pitch,
                    bank,
                    heading,
                    ground_speed_kts,
                    ground_elevation_ft,
                ) {
                    Ok(s) => s,
                    Err(e) => return IngestOutcome::Rejected(e),
                };

                match self.registry.upsert_situation(&callsign, situation) {
                    UpsertOutcome::Stale => IngestOutcome::Stale,
                    _ => {
                        self.last_position_ms.insert(callsign, timestamp_ms);
                        IngestOutcome::Applied
                    }
                }
            }

            NetworkEvent::PartsUpdate { callsign, message } => {
                let callsign = match Callsign::new(&callsign) {
                    Ok(cs) => cs,
                    Err(e) => return IngestOutcome::Rejected(e),
                };
                let timestamp_ms = message.timestamp_ms();
                if self.is_replay(&self.last_parts_ms, &callsign, timestamp_ms) {
                    return IngestOutcome::Stale;
                }

                match self.registry.upsert_parts(&callsign, message) {
                    UpsertOutcome::Stale => IngestOutcome::Stale,
                    _ => {
                        self.last_parts_ms.insert(callsign, timestamp_ms);
                        IngestOutcome::Applied
                    }
                }
            }

            NetworkEvent::CapabilityUpdate {
                callsign,
                supports_parts,
                supports_fast_position,
                voice_capability,
                server,
                real_name,
                model_string,
            } => {
                let callsign = match Callsign::new(&callsign) {
                    Ok(cs) => cs,
                    Err(e) => return IngestOutcome::Rejected(e),
                };
                let client = Client {
                    voice_capability,
                    server,
                    real_name,
                    model_string,
                };
                self.registry.apply_capabilities(
                    &callsign,
                    client,
                    supports_parts,
                    supports_fast_position,
                );
                IngestOutcome::Applied
            }

            NetworkEvent::StationUpdate {
                callsign,
                frequency_mhz,
                latitude,
                longitude,
                altitude_ft,
                range_nm,
                voice_room,
            } => {
                let station = match Self::build_station(
                    &callsign,
                    frequency_mhz,
                    latitude,
                    longitude,
                    altitude_ft,
                    range_nm,
                ) {
                    Ok(s) => s,
                    Err(e) => return IngestOutcome::Rejected(e),
                };
                let station = match voice_room {
                    Some(url) => station.with_voice_room(url),
                    None => station,
                };
                self.registry.upsert_station_online(station);
                IngestOutcome::Applied
            }

            NetworkEvent::StationBooked {
                callsign,
                frequency_mhz,
                latitude,
                longitude,
                altitude_ft,
                range_nm,
                from_utc_ms,
                until_utc_ms,
            } => {
                let callsign = match Callsign::new(&callsign) {
                    Ok(cs) => cs,
                    Err(e) => return IngestOutcome::Rejected(e),
                };
                let position = match GeoPosition::new(latitude, longitude, altitude_ft) {
                    Ok(p) => p,
                    Err(e) => return IngestOutcome::Rejected(e),
                };
                match AtcStation::booked(
                    callsign,
                    frequency_mhz,
                    position,
                    range_nm,
                    from_utc_ms,
                    until_utc_ms,
                ) {
                    Ok(station) => {
                        self.registry.upsert_station_booked(station);
                        IngestOutcome::Applied
                    }
                    Err(e) => IngestOutcome::Rejected(e),
                }
            }

            NetworkEvent::AtisUpdate { callsign, lines } => {
                let callsign = match Callsign::new(&callsign) {
                    Ok(cs) => cs,
                    Err(e) => return IngestOutcome::Rejected(e),
                };
                if !self.registry.set_station_atis(&callsign, lines) {
                    debug!(callsign = %callsign, "ATIS for unknown station ignored");
                }
                IngestOutcome::Applied
            }

            NetworkEvent::AircraftGone { callsign } => {
                let callsign = match Callsign::new(&callsign) {
                    Ok(cs) => cs,
                    Err(e) => return IngestOutcome::Rejected(e),
                };
                self.registry.remove_aircraft(&callsign);
                self.forget(&callsign);
                IngestOutcome::Applied
            }

            NetworkEvent::StationGone { callsign } => {
                let callsign = match Callsign::new(&callsign) {
                    Ok(cs) => cs,
                    Err(e) => return IngestOutcome::Rejected(e),
                };
                self.registry.remove_station(&callsign);
                IngestOutcome::Applied
            }

            NetworkEvent::Disconnected => {
                self.registry.clear();
                self.last_position_ms.clear();
                self.last_parts_ms.clear();
                IngestOutcome::Applied
            }
        }
    }

    fn is_replay(&self, map: &DashMap<Callsign, i64>, callsign: &Callsign, ts: i64) -> bool {
        let Some(last) = map.get(callsign).map(|e| *e.value()) else {
            return false;
        };
        if ts > last {
            return false;
        }
        // The registry no longer tracks this callsign (analyzer timeout
        // removal); the retained timestamps are defunct and this sighting
        // is a fresh first contact.
        if self.registry.aircraft_for_callsign(callsign).is_none() {
            self.forget(callsign);
            return false;
        }
        true
    }

    /// Drop the replay-tracking timestamps for a callsign.
    fn forget(&self, callsign: &Callsign) {
        self.last_position_ms.remove(callsign);
        self.last_parts_ms.remove(callsign);
    }

    #[allow(clippy::too_many_arguments)]
    fn build_situation(
        timestamp_ms: i64,
        latitude: f64,
        longitude: f64,
        altitude_ft: f64,
        pitch: f64,
        bank: f64,
        heading: f64,
        ground_speed_kts: f64,
        ground_elevation_ft: Option<f64>,
    ) -> Result<AircraftSituation, ValidationError> {
        let position = GeoPosition::new(latitude, longitude, altitude_ft)?;
        let attitude = Attitude::new(pitch, bank, heading)?;
        let situation = AircraftSituation::new(timestamp_ms, position, attitude, ground_speed_kts)?;
        Ok(match ground_elevation_ft {
            Some(elevation) => situation.with_ground_elevation(elevation),
            None => situation,
        })
    }

    fn build_station(
        callsign: &str,
        frequency_mhz: f64,
        latitude: f64,
        longitude: f64,
        altitude_ft: f64,
        range_nm: f64,
    ) -> Result<AtcStation, ValidationError> {
        let callsign = Callsign::new(callsign)?;
        let position = GeoPosition::new(latitude, longitude, altitude_ft)?;
        AtcStation::online(callsign, frequency_mhz, position, range_nm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrafficConfig;
    use crate::parts::{AircraftParts, PartsDelta, PartsMessage};

    fn setup() -> (Arc<AirspaceRegistry>, Reconciler) {
        let registry = Arc::new(AirspaceRegistry::new(&TrafficConfig::default()));
        let reconciler = Reconciler::new(Arc::clone(&registry));
        (registry, reconciler)
    }

    fn position_update(callsign: &str, ts: i64, lat: f64) -> NetworkEvent {
        NetworkEvent::PositionUpdate {
            callsign: callsign.into(),
            timestamp_ms: ts,
            latitude: lat,
            longitude: 11.0,
            altitude_ft: 10000.0,
            pitch: 1.0,
            bank: 0.0,
            heading: 90.0,
            ground_speed_kts: 250.0,
            ground_elevation_ft: None,
        }
    }

    #[test]
    fn test_position_update_applied() {
        let (registry, reconciler) = setup();

        let outcome = reconciler.apply(position_update("DLH123", 1000, 48.0));
        assert_eq!(outcome, IngestOutcome::Applied);
        assert_eq!(registry.aircraft_count(), 1);
        assert_eq!(
            reconciler.last_applied_position_ms(&Callsign::new("DLH123").unwrap()),
            Some(1000)
        );
    }

    #[test]
    fn test_redelivery_is_idempotent() {
        let (registry, reconciler) = setup();

        assert_eq!(
            reconciler.apply(position_update("DLH123", 1000, 48.0)),
            IngestOutcome::Applied
        );
        // Identical timestamp: dropped before it reaches the registry
        assert_eq!(
            reconciler.apply(position_update("DLH123", 1000, 49.0)),
            IngestOutcome::Stale
        );
        // Earlier timestamp: also dropped
        assert_eq!(
            reconciler.apply(position_update("DLH123", 500, 49.0)),
            IngestOutcome::Stale
        );

        let cs = Callsign::new("DLH123").unwrap();
        let record = registry.aircraft_for_callsign(&cs).unwrap();
        assert_eq!(record.situation.unwrap().position.latitude, 48.0);
        assert_eq!(reconciler.stats().stale, 2);
    }

    #[test]
    fn test_rejection_does_not_abort_batch() {
        let (registry, reconciler) = setup();

        let batch = vec![
            position_update("DLH123", 1000, 48.0),
            position_update("BAD1", 1000, f64::NAN),
            position_update("", 1000, 48.0),
            position_update("BAW42H", 1000, 49.0),
        ];

        let outcomes: Vec<IngestOutcome> =
            batch.into_iter().map(|e| reconciler.apply(e)).collect();

        assert_eq!(outcomes[0], IngestOutcome::Applied);
        assert!(matches!(outcomes[1], IngestOutcome::Rejected(_)));
        assert_eq!(
            outcomes[2],
            IngestOutcome::Rejected(ValidationError::EmptyCallsign)
        );
        assert_eq!(outcomes[3], IngestOutcome::Applied);

        assert_eq!(registry.aircraft_count(), 2);
        assert_eq!(reconciler.stats().rejected, 2);
    }

    #[test]
    fn test_parts_and_position_timestamps_tracked_separately() {
        let (_, reconciler) = setup();

        assert_eq!(
            reconciler.apply(position_update("DLH123", 1000, 48.0)),
            IngestOutcome::Applied
        );
        // Parts with the same timestamp must not be treated as a replay
        let parts = NetworkEvent::PartsUpdate {
            callsign: "DLH123".into(),
            message: PartsMessage::Full(AircraftParts::baseline(1000)),
        };
        assert_eq!(reconciler.apply(parts), IngestOutcome::Applied);
    }

    #[test]
    fn test_incremental_parts_flow() {
        let (registry, reconciler) = setup();

        let delta = PartsDelta {
            timestamp_ms: 1000,
            gear_down: Some(true),
            ..Default::default()
        };
        let outcome = reconciler.apply(NetworkEvent::PartsUpdate {
            callsign: "DLH123".into(),
            message: PartsMessage::Incremental(delta),
        });
        assert_eq!(outcome, IngestOutcome::Applied);

        let cs = Callsign::new("DLH123").unwrap();
        assert!(registry.aircraft_for_callsign(&cs).unwrap().parts.unwrap().gear_down);
    }

    #[test]
    fn test_capability_update_touches_no_history() {
        let (registry, reconciler) = setup();
        reconciler.apply(position_update("DLH123", 1000, 48.0));

        let outcome = reconciler.apply(NetworkEvent::CapabilityUpdate {
            callsign: "DLH123".into(),
            supports_parts: true,
            supports_fast_position: true,
            voice_capability: crate::station::VoiceCapability::Voice,
            server: Some("GERMANY1".into()),
            real_name: None,
            model_string: Some("A320 Lufthansa".into()),
        });
        assert_eq!(outcome, IngestOutcome::Applied);

        let cs = Callsign::new("DLH123").unwrap();
        let record = registry.aircraft_for_callsign(&cs).unwrap();
        assert!(record.supports_parts);
        assert!(record.supports_fast_position);
        assert_eq!(registry.situations(&cs).len(), 1);

        let client = registry.client_for_callsign(&cs).unwrap();
        assert_eq!(client.server.as_deref(), Some("GERMANY1"));
    }

    #[test]
    fn test_aircraft_gone_resets_replay_tracking() {
        let (registry, reconciler) = setup();
        reconciler.apply(position_update("DLH123", 1000, 48.0));
        reconciler.apply(NetworkEvent::AircraftGone {
            callsign: "DLH123".into(),
        });

        assert_eq!(registry.aircraft_count(), 0);
        // Re-sighting with an older timestamp is a fresh first sighting
        assert_eq!(
            reconciler.apply(position_update("DLH123", 500, 47.0)),
            IngestOutcome::Applied
        );
    }

    #[test]
    fn test_timeout_removal_resets_replay_tracking() {
        let (registry, reconciler) = setup();
        let analyzer =
            crate::analyzer::Analyzer::new(Arc::clone(&registry), &TrafficConfig::default());

        reconciler.apply(position_update("DLH123", 1000, 48.0));
        let cs = Callsign::new("DLH123").unwrap();
        let base = registry.aircraft_for_callsign(&cs).unwrap().last_update_ms;

        // Aircraft goes silent and the sweep removes it
        analyzer.sweep_once_at(base + 61_000);
        assert_eq!(registry.aircraft_count(), 0);

        // Re-sighting with an equal-or-earlier timestamp is a fresh first
        // contact, exactly as after an explicit gone event
        assert_eq!(
            reconciler.apply(position_update("DLH123", 500, 47.0)),
            IngestOutcome::Applied
        );
        assert_eq!(reconciler.last_applied_position_ms(&cs), Some(500));
        assert_eq!(registry.aircraft_count(), 1);
    }

    #[tokio::test]
    async fn test_run_loop_forgets_externally_removed_aircraft() {
        let (registry, reconciler) = setup();
        let reconciler = Arc::new(reconciler);
        let (tx, rx) = mpsc::channel(16);
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(Arc::clone(&reconciler).run(rx, shutdown.clone()));

        tx.send(position_update("DLH123", 1000, 48.0)).await.unwrap();
        let cs = Callsign::new("DLH123").unwrap();
        for _ in 0..100 {
            if reconciler.last_applied_position_ms(&cs).is_some() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }

        // Removal by someone other than the reconciler (the analyzer path)
        registry.remove_aircraft(&cs);
        for _ in 0..100 {
            if reconciler.last_applied_position_ms(&cs).is_none() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        assert!(reconciler.last_applied_position_ms(&cs).is_none());

        shutdown.cancel();
        handle.await.unwrap();
    }

    #[test]
    fn test_station_lifecycle() {
        let (registry, reconciler) = setup();

        let outcome = reconciler.apply(NetworkEvent::StationUpdate {
            callsign: "EDDM_TWR".into(),
            frequency_mhz: 118.7,
            latitude: 48.35,
            longitude: 11.79,
            altitude_ft: 1487.0,
            range_nm: 50.0,
            voice_room: Some("vvl://voice.example/eddm_twr".into()),
        });
        assert_eq!(outcome, IngestOutcome::Applied);

        reconciler.apply(NetworkEvent::AtisUpdate {
            callsign: "EDDM_TWR".into(),
            lines: vec!["INFO K".into()],
        });

        let cs = Callsign::new("EDDM_TWR").unwrap();
        let station = registry.station_for_callsign(&cs).unwrap();
        assert_eq!(station.atis_lines, vec!["INFO K".to_string()]);
        assert!(station.voice_room.is_some());

        reconciler.apply(NetworkEvent::StationGone {
            callsign: "EDDM_TWR".into(),
        });
        assert!(registry.station_for_callsign(&cs).is_none());
    }

    #[test]
    fn test_invalid_station_frequency_rejected() {
        let (registry, reconciler) = setup();
        let outcome = reconciler.apply(NetworkEvent::StationUpdate {
            callsign: "EDDM_TWR".into(),
            frequency_mhz: 999.0,
            latitude: 48.35,
            longitude: 11.79,
            altitude_ft: 1487.0,
            range_nm: 50.0,
            voice_room: None,
        });
        assert!(matches!(outcome, IngestOutcome::Rejected(_)));
        assert!(registry.stations_online().is_empty());
    }

    #[test]
    fn test_disconnect_clears_everything() {
        let (registry, reconciler) = setup();
        reconciler.apply(position_update("DLH123", 1000, 48.0));
        reconciler.apply(NetworkEvent::Disconnected);

        assert_eq!(registry.aircraft_count(), 0);
        // Replay tracking cleared: the same timestamp applies again
        assert_eq!(
            reconciler.apply(position_update("DLH123", 1000, 48.0)),
            IngestOutcome::Applied
        );
    }

    #[tokio::test]
    async fn test_run_loop_processes_and_shuts_down() {
        let (registry, reconciler) = setup();
        let reconciler = Arc::new(reconciler);
        let (tx, rx) = mpsc::channel(16);
        let shutdown = CancellationToken::new();

        let handle = tokio::spawn(Arc::clone(&reconciler).run(rx, shutdown.clone()));

        tx.send(position_update("DLH123", 1000, 48.0)).await.unwrap();
        tx.send(position_update("BAD1", 1000, f64::NAN)).await.unwrap();
        tx.send(position_update("BAW42H", 1000, 49.0)).await.unwrap();

        // Give the loop a moment to drain, then stop it
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        shutdown.cancel();
        handle.await.unwrap();

        assert_eq!(registry.aircraft_count(), 2);
        let stats = reconciler.stats();
        assert_eq!(stats.applied, 2);
        assert_eq!(stats.rejected, 1);
    }
}
