//! Shared fixtures for unit tests and benches

use serde_json::Value as Json;

use crate::pit::{FuelInfo, PitMenuChoice, PitMenuEntry, PitTimeTable};

/// Build a pit-menu row.
pub fn entry(name: &str, current: i64, default: i64, settings: &[&str]) -> PitMenuEntry {
    PitMenuEntry {
        name: name.to_string(),
        current_setting: current,
        default,
        settings: settings.iter().map(|text| PitMenuChoice { text: text.to_string() }).collect(),
    }
}

/// Build a timing-constant table from key/value pairs.
pub fn times(pairs: &[(&str, Json)]) -> PitTimeTable {
    PitTimeTable::from_pairs(pairs)
}

/// Fuel info with the given tank level and no virtual energy.
pub fn fuel_info(current_fuel: f64) -> FuelInfo {
    FuelInfo { current_fuel, current_virtual_energy: 0.0, max_virtual_energy: 0.0 }
}
