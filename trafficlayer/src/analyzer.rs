//! Airspace analyzer daemon.
//!
//! A periodic sweep over the registry that does the housekeeping no
//! network event triggers:
//!
//! 1. **Timeout removal** — a callsign with no accepted update for the
//!    configured staleness timeout is removed, exactly as if the network
//!    had announced its departure.
//! 2. **Rendering restrictions** — at most N aircraft within D nautical
//!    miles of the own aircraft get `rendered = true`, closest first;
//!    everything else is cleared. Disabled aircraft are never rendered.
//! 3. **Snapshot publication** — each sweep ends by publishing a fresh
//!    snapshot generation so readers always see post-sweep state.
//!
//! The sweep body is synchronous and driven by an explicit timestamp
//! (`sweep_once_at`), so staleness behaviour is testable without waiting
//! out real timeouts. `run` is the async wrapper that ticks it on the
//! configured interval until cancelled.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::callsign::Callsign;
use crate::clock;
use crate::config::TrafficConfig;
use crate::geo;
use crate::registry::AirspaceRegistry;

/// Result of one analyzer sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepOutcome {
    /// Callsigns removed for staleness in this sweep.
    pub removed: Vec<Callsign>,

    /// Number of aircraft left rendered after the restriction pass.
    pub rendered: usize,

    /// Generation of the snapshot published at the end of the sweep.
    pub snapshot_generation: u64,
}

/// Cumulative analyzer statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnalyzerStats {
    pub sweeps: u64,
    pub timed_out: u64,
}

#[derive(Default)]
struct Counters {
    sweeps: AtomicU64,
    timed_out: AtomicU64,
}

/// Periodic registry housekeeping.
pub struct Analyzer {
    registry: Arc<AirspaceRegistry>,
    stale_timeout_ms: i64,
    sweep_interval: Duration,
    max_rendered_aircraft: usize,
    max_rendered_distance_nm: f64,
    counters: Counters,
}

impl Analyzer {
    /// Create an analyzer over the given registry.
    pub fn new(registry: Arc<AirspaceRegistry>, config: &TrafficConfig) -> Self {
        Self {
            registry,
            stale_timeout_ms: config.stale_timeout.as_millis() as i64,
            sweep_interval: config.sweep_interval,
            max_rendered_aircraft: config.max_rendered_aircraft,
            max_rendered_distance_nm: config.max_rendered_distance_nm,
            counters: Counters::default(),
        }
    }

    /// Run sweeps on the configured interval until cancelled.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.sweep_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        info!(
            interval_ms = self.sweep_interval.as_millis() as u64,
            timeout_ms = self.stale_timeout_ms,
            "analyzer started"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("analyzer stopping");
                    return;
                }
                _ = ticker.tick() => {
                    let outcome = self.sweep_once_at(clock::now_ms());
                    debug!(
                        removed = outcome.removed.len(),
                        rendered = outcome.rendered,
                        generation = outcome.snapshot_generation,
                        "sweep complete"
                    );
                }
            }
        }
    }

    /// Run one sweep with an explicit "now".
    ///
    /// Split out from [`run`](Self::run) so timeout behaviour can be
    /// exercised at arbitrary timestamps.
    pub fn sweep_once_at(&self, now_ms: i64) -> SweepOutcome {
        let removed = self.remove_timed_out(now_ms);
        let rendered = self.apply_rendering_restrictions();
        let snapshot = self.registry.publish_snapshot();

        self.counters.sweeps.fetch_add(1, Ordering::Relaxed);
        SweepOutcome {
            removed,
            rendered,
            snapshot_generation: snapshot.generation,
        }
    }

    /// Cumulative statistics snapshot.
    pub fn stats(&self) -> AnalyzerStats {
        AnalyzerStats {
            sweeps: self.counters.sweeps.load(Ordering::Relaxed),
            timed_out: self.counters.timed_out.load(Ordering::Relaxed),
        }
    }

    fn remove_timed_out(&self, now_ms: i64) -> Vec<Callsign> {
        let mut removed = Vec::new();
        for aircraft in self.registry.aircraft_in_range() {
            let age_ms = now_ms - aircraft.last_update_ms;
            if age_ms > self.stale_timeout_ms {
                info!(
                    callsign = %aircraft.callsign,
                    age_ms,
                    "removing aircraft after staleness timeout"
                );
                self.registry.remove_aircraft(&aircraft.callsign);
                self.counters.timed_out.fetch_add(1, Ordering::Relaxed);
                removed.push(aircraft.callsign);
            }
        }
        removed
    }

    /// Decide which aircraft the simulator may draw.
    ///
    /// Closest-first within the distance limit, capped at the configured
    /// count. Without an own-aircraft position the distance limit cannot
    /// be judged, so only the count cap applies. Returns the number of
    /// aircraft left rendered.
    fn apply_rendering_restrictions(&self) -> usize {
        let own = self.registry.own_situation().map(|s| s.position);

        // (callsign, distance) for every aircraft eligible to render
        let mut candidates: Vec<(Callsign, Option<f64>)> = Vec::new();
        let mut decisions: Vec<(Callsign, bool)> = Vec::new();

        for aircraft in self.registry.aircraft_in_range() {
            if !aircraft.enabled {
                decisions.push((aircraft.callsign, false));
                continue;
            }
            let distance = match (&own, &aircraft.situation) {
                (Some(own_pos), Some(situation)) => Some(geo::haversine_nm(
                    own_pos.latitude,
                    own_pos.longitude,
                    situation.position.latitude,
                    situation.position.longitude,
                )),
                _ => None,
            };
            if let Some(d) = distance {
                if d > self.max_rendered_distance_nm {
                    decisions.push((aircraft.callsign, false));
                    continue;
                }
            }
            candidates.push((aircraft.callsign, distance));
        }

        candidates.sort_by(|a, b| {
            match (a.1, b.1) {
                (Some(da), Some(db)) => da
                    .partial_cmp(&db)
                    .unwrap_or(std::cmp::Ordering::Equal),
                // Unknown distance sorts last
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => a.0.cmp(&b.0),
            }
        });

        let mut rendered = 0;
        for (i, (callsign, _)) in candidates.into_iter().enumerate() {
            let draw = i < self.max_rendered_aircraft;
            if draw {
                rendered += 1;
            }
            decisions.push((callsign, draw));
        }

        self.registry.apply_rendered_flags(&decisions);
        rendered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::situation::{AircraftSituation, Attitude, GeoPosition};

    fn situation(ts: i64, lat: f64, lon: f64) -> AircraftSituation {
        AircraftSituation::new(
            ts,
            GeoPosition::new(lat, lon, 10000.0).unwrap(),
            Attitude::new(0.0, 0.0, 90.0).unwrap(),
            250.0,
        )
        .unwrap()
    }

    fn setup(config: &TrafficConfig) -> (Arc<AirspaceRegistry>, Analyzer) {
        let registry = Arc::new(AirspaceRegistry::new(config));
        let analyzer = Analyzer::new(Arc::clone(&registry), config);
        (registry, analyzer)
    }

    #[test]
    fn test_timeout_removes_stale_aircraft() {
        let config = TrafficConfig::default();
        let (registry, analyzer) = setup(&config);
        let cs = Callsign::new("DLH123").unwrap();
        registry.upsert_situation(&cs, situation(0, 48.0, 11.0));

        let base = registry
            .aircraft_for_callsign(&cs)
            .unwrap()
            .last_update_ms;

        // 59 s of silence: still present
        let outcome = analyzer.sweep_once_at(base + 59_000);
        assert!(outcome.removed.is_empty());
        assert_eq!(registry.aircraft_count(), 1);

        // 61 s of silence: removed
        let outcome = analyzer.sweep_once_at(base + 61_000);
        assert_eq!(outcome.removed, vec![cs.clone()]);
        assert_eq!(registry.aircraft_count(), 0);
        assert!(registry.situations(&cs).is_empty());
        assert_eq!(analyzer.stats().timed_out, 1);
    }

    #[test]
    fn test_timeout_sweep_is_idempotent() {
        let config = TrafficConfig::default();
        let (registry, analyzer) = setup(&config);
        let cs = Callsign::new("DLH123").unwrap();
        registry.upsert_situation(&cs, situation(0, 48.0, 11.0));
        let base = registry
            .aircraft_for_callsign(&cs)
            .unwrap()
            .last_update_ms;

        analyzer.sweep_once_at(base + 120_000);
        let outcome = analyzer.sweep_once_at(base + 121_000);
        assert!(outcome.removed.is_empty());
    }

    #[test]
    fn test_rendering_distance_limit() {
        let config = TrafficConfig::default().with_rendering_limits(100, 50.0);
        let (registry, analyzer) = setup(&config);
        registry.set_own_situation(situation(0, 48.0, 11.0));

        let near = Callsign::new("NEAR1").unwrap();
        let far = Callsign::new("FAR1").unwrap();
        registry.upsert_situation(&near, situation(0, 48.1, 11.0));
        // Roughly 5 degrees of latitude away, ~300 NM
        registry.upsert_situation(&far, situation(0, 53.0, 11.0));

        let outcome = analyzer.sweep_once_at(clock::now_ms());
        assert_eq!(outcome.rendered, 1);
        assert!(registry.aircraft_for_callsign(&near).unwrap().rendered);
        assert!(!registry.aircraft_for_callsign(&far).unwrap().rendered);
    }

    #[test]
    fn test_rendering_count_cap_prefers_closest() {
        let config = TrafficConfig::default().with_rendering_limits(2, 1000.0);
        let (registry, analyzer) = setup(&config);
        registry.set_own_situation(situation(0, 48.0, 11.0));

        let close = Callsign::new("AC1").unwrap();
        let mid = Callsign::new("AC2").unwrap();
        let distant = Callsign::new("AC3").unwrap();
        registry.upsert_situation(&close, situation(0, 48.05, 11.0));
        registry.upsert_situation(&mid, situation(0, 48.5, 11.0));
        registry.upsert_situation(&distant, situation(0, 50.0, 11.0));

        let outcome = analyzer.sweep_once_at(clock::now_ms());
        assert_eq!(outcome.rendered, 2);
        assert!(registry.aircraft_for_callsign(&close).unwrap().rendered);
        assert!(registry.aircraft_for_callsign(&mid).unwrap().rendered);
        assert!(!registry.aircraft_for_callsign(&distant).unwrap().rendered);
    }

    #[test]
    fn test_disabled_aircraft_never_rendered() {
        let config = TrafficConfig::default();
        let (registry, analyzer) = setup(&config);
        registry.set_own_situation(situation(0, 48.0, 11.0));

        let cs = Callsign::new("DLH123").unwrap();
        registry.upsert_situation(&cs, situation(0, 48.1, 11.0));
        registry.set_enabled(&cs, false);

        let outcome = analyzer.sweep_once_at(clock::now_ms());
        assert_eq!(outcome.rendered, 0);
        assert!(!registry.aircraft_for_callsign(&cs).unwrap().rendered);
    }

    #[test]
    fn test_no_own_position_applies_count_cap_only() {
        let config = TrafficConfig::default().with_rendering_limits(1, 10.0);
        let (registry, analyzer) = setup(&config);

        let a = Callsign::new("AC1").unwrap();
        let b = Callsign::new("AC2").unwrap();
        registry.upsert_situation(&a, situation(0, 48.0, 11.0));
        registry.upsert_situation(&b, situation(0, 52.0, 11.0));

        let outcome = analyzer.sweep_once_at(clock::now_ms());
        assert_eq!(outcome.rendered, 1);
    }

    #[test]
    fn test_sweep_publishes_fresh_snapshot() {
        let config = TrafficConfig::default();
        let (registry, analyzer) = setup(&config);
        registry.set_own_situation(situation(0, 48.0, 11.0));
        let cs = Callsign::new("DLH123").unwrap();
        registry.upsert_situation(&cs, situation(0, 48.1, 11.0));

        let outcome = analyzer.sweep_once_at(clock::now_ms());
        let snapshot = registry.latest_snapshot();
        assert_eq!(snapshot.generation, outcome.snapshot_generation);
        assert_eq!(snapshot.entries.len(), 1);
        assert!(snapshot.entries[0].rendered, "snapshot reflects post-sweep flags");
    }

    #[tokio::test]
    async fn test_run_stops_on_cancel() {
        let config = TrafficConfig::default().with_sweep_interval(Duration::from_millis(10));
        let (registry, analyzer) = setup(&config);
        let _ = registry;
        let analyzer = Arc::new(analyzer);
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(Arc::clone(&analyzer).run(cancel.clone()));
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
        handle.await.unwrap();
        assert!(analyzer.stats().sweeps >= 1);
    }
}
