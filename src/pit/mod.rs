//! Pit-stop strategy: menu model, service-time estimation, REST fetch

mod estimator;
mod menu;
mod rest;

pub use estimator::{PitEstimate, StopGoPenalty, estimate};
pub use menu::{FuelInfo, PitData, PitMenuChoice, PitMenuEntry, PitTimeTable};
pub use rest::PitRestClient;
