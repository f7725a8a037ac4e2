//! Engine runtime: wiring and lifecycle.
//!
//! [`TrafficRuntime`] coordinates the startup, operation and shutdown of
//! the engine's background tasks. It owns:
//!
//! - the [`AirspaceRegistry`] (shared state),
//! - the [`Reconciler`] ingestion loop (network events in),
//! - the [`Analyzer`] sweep loop (timeouts, rendering, snapshots),
//! - the inbound event channel and the shutdown token.
//!
//! The network protocol layer pushes decoded events through
//! [`event_sender`](TrafficRuntime::event_sender); consumers read through
//! the registry handle and the [`Interpolator`]. `shutdown` cancels both
//! loops and waits for them to stop.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::analyzer::{Analyzer, AnalyzerStats};
use crate::config::TrafficConfig;
use crate::ingest::{IngestStats, NetworkEvent, Reconciler};
use crate::interpolator::Interpolator;
use crate::registry::{AircraftChange, AirspaceRegistry};

/// A running traffic engine.
pub struct TrafficRuntime {
    registry: Arc<AirspaceRegistry>,
    reconciler: Arc<Reconciler>,
    analyzer: Arc<Analyzer>,
    interpolator: Interpolator,
    events_tx: mpsc::Sender<NetworkEvent>,
    shutdown: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl TrafficRuntime {
    /// Build the engine and spawn its background tasks.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(config: TrafficConfig) -> Self {
        let registry = Arc::new(AirspaceRegistry::new(&config));
        let reconciler = Arc::new(Reconciler::new(Arc::clone(&registry)));
        let analyzer = Arc::new(Analyzer::new(Arc::clone(&registry), &config));
        let interpolator = Interpolator::new(Arc::clone(&registry), &config);

        let (events_tx, events_rx) = mpsc::channel(config.event_channel_capacity);
        let shutdown = CancellationToken::new();

        let tasks = vec![
            tokio::spawn(Arc::clone(&reconciler).run(events_rx, shutdown.clone())),
            tokio::spawn(Arc::clone(&analyzer).run(shutdown.clone())),
        ];
        info!("traffic runtime started");

        Self {
            registry,
            reconciler,
            analyzer,
            interpolator,
            events_tx,
            shutdown,
            tasks,
        }
    }

    /// Sender for decoded network events.
    ///
    /// Cheap to clone; the protocol layer keeps one per connection.
    pub fn event_sender(&self) -> mpsc::Sender<NetworkEvent> {
        self.events_tx.clone()
    }

    /// Shared registry handle for queries and local flag changes.
    pub fn registry(&self) -> Arc<AirspaceRegistry> {
        Arc::clone(&self.registry)
    }

    /// Interpolator for per-frame pose sampling.
    pub fn interpolator(&self) -> Interpolator {
        self.interpolator.clone()
    }

    /// Subscribe to add/update/remove change notifications.
    pub fn subscribe_changes(&self) -> broadcast::Receiver<AircraftChange> {
        self.registry.subscribe_changes()
    }

    /// Ingestion diagnostics counters.
    pub fn ingest_stats(&self) -> IngestStats {
        self.reconciler.stats()
    }

    /// Analyzer diagnostics counters.
    pub fn analyzer_stats(&self) -> AnalyzerStats {
        self.analyzer.stats()
    }

    /// Cancel the background tasks and wait for them to stop.
    pub async fn shutdown(mut self) {
        info!("traffic runtime shutting down");
        self.shutdown.cancel();
        for task in self.tasks.drain(..) {
            // A task that panicked is already gone; nothing to unwind here.
            let _ = task.await;
        }
        info!("traffic runtime stopped");
    }
}
