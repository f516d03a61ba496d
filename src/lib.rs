//! Race-strategy telemetry bridge for rFactor 2 engine simulators.
//!
//! Pitlink samples a running simulator's state at a fixed cadence, derives
//! race-strategy metrics (pit-stop time estimates, fuel/energy burn trends,
//! tire-wear projections) and publishes the latest snapshot to a cloud
//! document store: at most one in flight, dropping stale updates under
//! backpressure.
//!
//! # Architecture
//!
//! - **Sampling loop** ([`Bridge`]): polls a [`TelemetrySource`] and the
//!   game's pit-menu REST endpoint, feeds the trackers, assembles snapshots
//! - **Pit estimator** ([`pit::estimate`]): pure service-time computation
//!   over the pit-menu state
//! - **Lap metrics** ([`LapMetricsTracker`]): rolling averages updated at
//!   lap boundaries, robust to session resets
//! - **Publisher** ([`Publisher`]): single-slot latest-wins queue drained by
//!   a background worker through a pluggable [`StoreAdapter`]
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use pitlink::{Bridge, BridgeConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! # struct MySource;
//! # impl pitlink::TelemetrySource for MySource {
//! #     fn is_running(&self) -> bool { false }
//! #     fn player_telemetry(&mut self) -> Option<pitlink::PlayerTelemetry> { None }
//! #     fn player_scoring(&mut self) -> Option<pitlink::PlayerScoring> { None }
//! #     fn session(&mut self) -> Option<pitlink::SessionState> { None }
//! # }
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = BridgeConfig::from_yaml(&std::fs::read_to_string("bridge.yaml")?)?;
//!     let bridge = Bridge::new(config, MySource, "Hypercar #50")?;
//!
//!     let cancel = CancellationToken::new();
//!     bridge.run(cancel).await?;
//!     Ok(())
//! }
//! ```

mod bridge;
mod config;
mod error;
pub mod metrics;
pub mod pit;
pub mod publish;
pub mod source;
pub mod types;

#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;

// Core exports
pub use bridge::{Bridge, normalize_team_id};
pub use config::{BridgeConfig, RestConfig, StoreConfig};
pub use error::{BridgeError, Result};

// Metric exports
pub use metrics::{LapMetrics, LapMetricsTracker};

// Pit strategy exports
pub use pit::{PitData, PitEstimate, PitRestClient, StopGoPenalty};

// Publish pipeline exports
pub use publish::{FirestoreAdapter, Publisher, RetryPolicy, StoreAdapter, SupabaseAdapter};

// Data source exports
pub use source::{
    PlayerScoring, PlayerTelemetry, SessionFingerprint, SessionState, TelemetrySource,
    WheelTelemetry,
};

// Value model exports
pub use types::{Snapshot, Value};
