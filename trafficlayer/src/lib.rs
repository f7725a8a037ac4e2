//! TrafficLayer - Airspace and traffic state engine for flight-sim network clients
//!
//! This library maintains the client-side picture of a multiplayer flight
//! network: remote aircraft with their position and parts history, online
//! and booked ATC stations, and the own aircraft's situation. Decoded
//! network events flow in; consistent snapshots and interpolated poses
//! flow out to the simulator driver.
//!
//! # High-Level API
//!
//! For most use cases, the [`runtime`] module provides a simplified facade:
//!
//! ```ignore
//! use trafficlayer::config::TrafficConfig;
//! use trafficlayer::runtime::TrafficRuntime;
//!
//! let runtime = TrafficRuntime::start(TrafficConfig::default());
//!
//! // Protocol layer pushes decoded events
//! let events = runtime.event_sender();
//!
//! // Simulator driver samples poses per frame
//! let interpolator = runtime.interpolator();
//!
//! // Graceful shutdown
//! runtime.shutdown().await;
//! ```

pub mod aircraft;
pub mod analyzer;
pub mod callsign;
pub mod clock;
pub mod config;
pub mod error;
pub mod geo;
pub mod ingest;
pub mod interpolator;
pub mod logging;
pub mod parts;
pub mod registry;
pub mod runtime;
pub mod situation;
pub mod station;

/// Version of the TrafficLayer library.
///
/// The version is defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
