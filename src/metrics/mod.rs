//! Rolling race-strategy metrics derived at lap boundaries

mod lap;

pub use lap::{LapMetrics, LapMetricsTracker};
