//! Pit-menu data model from the game's repair-and-refuel screen
//!
//! The game's REST endpoint returns `{pitMenu: {pitMenu: [...]}, pitStopTimes:
//! {times: {...}}, fuelInfo: {...}}`. Mid-transition (menu closed, garage
//! screen loading) any of the three sections can be missing, null, or of the
//! wrong shape; extraction is therefore lenient throughout and the estimator
//! treats absent sections as "no service configured".

use serde::Deserialize;
use serde_json::Value as Json;

/// One selectable choice of a pit-menu category.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct PitMenuChoice {
    pub text: String,
}

/// One category row of the pit menu (fuel amount, a tire corner, repairs...).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PitMenuEntry {
    /// Category label, e.g. `"FUEL:"` or `"FL TIRE:"`.
    pub name: String,
    pub current_setting: i64,
    pub default: i64,
    /// Display strings for the numbered choices.
    pub settings: Vec<PitMenuChoice>,
}

impl PitMenuEntry {
    /// Whether the crew was asked for something other than the default.
    pub fn is_changed(&self) -> bool {
        self.current_setting != self.default
    }

    /// Display text of the currently selected choice.
    pub fn selected_text(&self) -> Option<&str> {
        usize::try_from(self.current_setting)
            .ok()
            .and_then(|index| self.settings.get(index))
            .map(|choice| choice.text.as_str())
    }
}

/// Reference table of pit-service timing constants.
///
/// Keys are the game's own names (`"FuelFillRate"`, `"TwoTireChange"`,
/// `"DriverConcurrent"`, ...). Values arrive as numbers or booleans
/// depending on the key and game version, so the accessors coerce.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PitTimeTable {
    entries: serde_json::Map<String, Json>,
}

impl PitTimeTable {
    /// Build from a JSON value; anything but an object yields `None`.
    pub fn from_json(value: &Json) -> Option<Self> {
        value.as_object().map(|entries| Self { entries: entries.clone() })
    }

    /// Numeric constant under `key`, 0.0 when absent or non-numeric.
    pub fn seconds(&self, key: &str) -> f64 {
        match self.entries.get(key) {
            Some(Json::Number(n)) => n.as_f64().unwrap_or(0.0),
            Some(Json::Bool(b)) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            _ => 0.0,
        }
    }

    /// Boolean constant under `key`; numbers coerce by non-zero test.
    pub fn flag(&self, key: &str) -> bool {
        match self.entries.get(key) {
            Some(Json::Bool(b)) => *b,
            Some(Json::Number(n)) => n.as_f64().unwrap_or(0.0) != 0.0,
            _ => false,
        }
    }

    #[cfg(any(test, feature = "benchmark"))]
    pub fn from_pairs(pairs: &[(&str, Json)]) -> Self {
        Self {
            entries: pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect(),
        }
    }
}

/// Fuel and virtual-energy levels reported alongside the pit menu.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FuelInfo {
    pub current_fuel: f64,
    pub current_virtual_energy: f64,
    pub max_virtual_energy: f64,
}

impl FuelInfo {
    /// Remaining virtual energy as a percentage, 0 when the car has none.
    pub fn energy_remaining_pct(&self) -> f64 {
        if self.max_virtual_energy > 0.0 {
            self.current_virtual_energy / self.max_virtual_energy * 100.0
        } else {
            0.0
        }
    }
}

/// Everything the estimator needs from one repair-and-refuel poll.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PitData {
    /// Menu rows in display order; `None` when the payload had no list.
    pub menu: Option<Vec<PitMenuEntry>>,
    /// Timing-constant table; `None` when the payload had no map.
    pub times: Option<PitTimeTable>,
    pub fuel: FuelInfo,
}

impl PitData {
    /// Extract from the raw REST payload.
    ///
    /// Sections of the wrong shape become `None`/default rather than errors;
    /// individual menu rows that fail to deserialize are skipped.
    pub fn from_json(payload: &Json) -> Self {
        let menu = payload
            .pointer("/pitMenu/pitMenu")
            .and_then(Json::as_array)
            .map(|rows| {
                rows.iter()
                    .filter(|row| row.is_object())
                    .filter_map(|row| serde_json::from_value(row.clone()).ok())
                    .collect()
            });

        let times = payload
            .pointer("/pitStopTimes/times")
            .and_then(PitTimeTable::from_json);

        let fuel = payload
            .get("fuelInfo")
            .and_then(|section| serde_json::from_value(section.clone()).ok())
            .unwrap_or_default();

        Self { menu, times, fuel }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn entry_deserializes_with_camel_case_and_defaults() {
        let entry: PitMenuEntry = serde_json::from_value(json!({
            "name": "FUEL:",
            "currentSetting": 2,
            "settings": [{"text": "0"}, {"text": "10.0 L"}, {"text": "20.0 L"}],
        }))
        .unwrap();

        assert_eq!(entry.name, "FUEL:");
        assert_eq!(entry.current_setting, 2);
        assert_eq!(entry.default, 0);
        assert!(entry.is_changed());
        assert_eq!(entry.selected_text(), Some("20.0 L"));
    }

    #[test]
    fn selected_text_handles_out_of_range_and_negative() {
        let mut entry = PitMenuEntry {
            name: "FUEL:".into(),
            current_setting: 5,
            default: 0,
            settings: vec![PitMenuChoice { text: "0".into() }],
        };
        assert_eq!(entry.selected_text(), None);
        entry.current_setting = -1;
        assert_eq!(entry.selected_text(), None);
    }

    #[test]
    fn time_table_coerces_numbers_and_booleans() {
        let table = PitTimeTable::from_json(&json!({
            "FuelFillRate": 1.5,
            "TwoTireChange": 24,
            "SimultaneousStopGo": true,
            "DriverConcurrent": 1,
            "OnTheFlyPressure": false,
        }))
        .unwrap();

        assert_eq!(table.seconds("FuelFillRate"), 1.5);
        assert_eq!(table.seconds("TwoTireChange"), 24.0);
        assert_eq!(table.seconds("Missing"), 0.0);
        assert!(table.flag("SimultaneousStopGo"));
        assert!(table.flag("DriverConcurrent"));
        assert!(!table.flag("OnTheFlyPressure"));
        assert!(!table.flag("Missing"));
    }

    #[test]
    fn time_table_rejects_non_objects() {
        assert_eq!(PitTimeTable::from_json(&json!([1, 2, 3])), None);
        assert_eq!(PitTimeTable::from_json(&json!("times")), None);
        assert_eq!(PitTimeTable::from_json(&Json::Null), None);
    }

    #[test]
    fn fuel_info_percentage() {
        let fuel = FuelInfo {
            current_fuel: 10.0,
            current_virtual_energy: 450.0,
            max_virtual_energy: 900.0,
        };
        assert_eq!(fuel.energy_remaining_pct(), 50.0);

        let no_energy = FuelInfo { max_virtual_energy: 0.0, ..fuel };
        assert_eq!(no_energy.energy_remaining_pct(), 0.0);
    }

    #[test]
    fn from_json_extracts_all_sections() {
        let data = PitData::from_json(&json!({
            "pitMenu": {"pitMenu": [
                {"name": "FUEL:", "currentSetting": 1, "default": 0, "settings": [{"text": "0"}, {"text": "40.0 L"}]},
                "not an entry",
            ]},
            "pitStopTimes": {"times": {"FuelInsert": 2}},
            "fuelInfo": {"currentFuel": 12.5},
        }));

        let menu = data.menu.unwrap();
        assert_eq!(menu.len(), 1);
        assert_eq!(menu[0].name, "FUEL:");
        assert_eq!(data.times.unwrap().seconds("FuelInsert"), 2.0);
        assert_eq!(data.fuel.current_fuel, 12.5);
    }

    #[test]
    fn from_json_tolerates_malformed_sections() {
        let data = PitData::from_json(&json!({
            "pitMenu": {"pitMenu": "closed"},
            "pitStopTimes": {"times": [1, 2]},
        }));
        assert!(data.menu.is_none());
        assert!(data.times.is_none());
        assert_eq!(data.fuel, FuelInfo::default());

        let empty = PitData::from_json(&json!({}));
        assert!(empty.menu.is_none());
        assert!(empty.times.is_none());
    }
}
