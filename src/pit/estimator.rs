//! Pit service-time estimation
//!
//! A single pass over the pit-menu rows dispatches each row to its service
//! category. Categories either mutate the accumulator (tire/pressure
//! counters, the stop-go flag) or yield a `(seconds, random delay,
//! concurrent)` contribution. Concurrent contributions are performed by
//! separate crew members and bound the stop by their maximum; everything
//! else is strictly sequential and sums. An exclusive stop-go penalty makes
//! all other service irrelevant and short-circuits the pass.

use super::menu::{FuelInfo, PitData, PitMenuEntry, PitTimeTable};

/// US gallon to liters, for fuel menus in imperial units.
const GAL_TO_LITERS: f64 = 3.7854118;

/// Stop-go penalty mode selected in the pit menu.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StopGoPenalty {
    /// No penalty scheduled.
    #[default]
    None,
    /// Penalty served alone; no other service may be performed.
    Exclusive,
    /// Penalty served alongside regular service.
    Simultaneous,
}

impl StopGoPenalty {
    /// Wire representation (0/1/2), matching the game's own encoding.
    pub fn as_i64(self) -> i64 {
        match self {
            StopGoPenalty::None => 0,
            StopGoPenalty::Exclusive => 1,
            StopGoPenalty::Simultaneous => 2,
        }
    }
}

/// Result of one estimation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PitEstimate {
    /// Best-case total stop duration in seconds.
    pub total_time: f64,
    /// Worst-case total including each service's random crew delay.
    pub total_time_with_delay: f64,
    /// Liters of fuel to be added (target minus remaining; raw, may be zero or negative).
    pub fuel_delta: f64,
    /// Virtual-energy percentage points to be added (raw, may be zero or negative).
    pub energy_delta: f64,
    /// Stop-go penalty mode.
    pub stop_go: StopGoPenalty,
    /// Absolute fuel target selected in the menu, liters.
    pub fuel_target: f64,
    /// Number of tire corners scheduled for change, 0..=4.
    pub tire_changes: u8,
}

/// Accumulator threaded through the category handlers of one pass.
#[derive(Debug, Default)]
struct EstimatorState {
    stop_go: StopGoPenalty,
    tire_changes: u8,
    pressure_changes: u8,
    fuel_target: f64,
    fuel_delta: f64,
    energy_target: f64,
    energy_delta: f64,
    fuel_remaining: f64,
    energy_remaining_pct: f64,
}

impl EstimatorState {
    fn new(fuel: &FuelInfo) -> Self {
        Self {
            fuel_remaining: fuel.current_fuel,
            energy_remaining_pct: fuel.energy_remaining_pct(),
            ..Self::default()
        }
    }
}

/// One service contribution to the stop duration.
#[derive(Debug, Clone, Copy, PartialEq)]
struct ServiceTime {
    seconds: f64,
    random_delay: f64,
    concurrent: bool,
}

/// Closed set of pit-menu categories the estimator understands.
///
/// Unrecognized labels are skipped; the game adds and removes rows per car
/// type (e.g. `FUEL RATIO:` only appears on virtual-energy classes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ServiceCategory {
    StopGo,
    Damage,
    Driver,
    VirtualEnergy,
    FuelRatio,
    FuelVolume,
    TireChange,
    PressureChange,
    FrontWing,
    RearWing,
    Radiator,
    BrakeReplace,
}

impl ServiceCategory {
    fn from_label(label: &str) -> Option<Self> {
        match label {
            "STOP/GO:" => Some(Self::StopGo),
            "DAMAGE:" => Some(Self::Damage),
            "DRIVER:" => Some(Self::Driver),
            "VIRTUAL ENERGY:" => Some(Self::VirtualEnergy),
            "FUEL RATIO:" => Some(Self::FuelRatio),
            "FUEL:" => Some(Self::FuelVolume),
            "FL TIRE:" | "FR TIRE:" | "RL TIRE:" | "RR TIRE:" => Some(Self::TireChange),
            "FL PRESS:" | "FR PRESS:" | "RL PRESS:" | "RR PRESS:" => Some(Self::PressureChange),
            "F WING:" => Some(Self::FrontWing),
            "R WING:" => Some(Self::RearWing),
            "GRILLE:" => Some(Self::Radiator),
            "REPLACE BRAKES:" => Some(Self::BrakeReplace),
            _ => None,
        }
    }

    /// Apply this category's handler to one menu row.
    ///
    /// Returns `None` for state-only categories (counters, stop-go) and a
    /// contribution for time-yielding ones.
    fn apply(
        self,
        entry: &PitMenuEntry,
        times: &PitTimeTable,
        state: &mut EstimatorState,
    ) -> Option<ServiceTime> {
        match self {
            Self::StopGo => {
                if entry.current_setting != 0 {
                    state.stop_go = if times.flag("SimultaneousStopGo") {
                        StopGoPenalty::Simultaneous
                    } else {
                        StopGoPenalty::Exclusive
                    };
                }
                None
            }
            Self::TireChange => {
                state.tire_changes =
                    (state.tire_changes + entry.is_changed() as u8).min(4);
                None
            }
            Self::PressureChange => {
                state.pressure_changes =
                    (state.pressure_changes + entry.is_changed() as u8).min(4);
                None
            }
            Self::Damage => {
                let mut delay = times.seconds("FixRandomDelay");
                let concurrent = times.flag("FixTimeConcurrent");
                let seconds = match entry.current_setting {
                    1 => times.seconds("FixAeroDamage"),
                    2 => times.seconds("FixAllDamage"),
                    _ => {
                        delay = 0.0;
                        0.0
                    }
                };
                Some(ServiceTime { seconds, random_delay: delay, concurrent })
            }
            Self::Driver => {
                let mut delay = times.seconds("DriverRandom");
                let concurrent = times.flag("DriverConcurrent");
                let seconds = if entry.is_changed() {
                    times.seconds("DriverChange")
                } else {
                    delay = 0.0;
                    0.0
                };
                Some(ServiceTime { seconds, random_delay: delay, concurrent })
            }
            Self::VirtualEnergy => {
                let target = entry.current_setting as f64;
                let delay = times.seconds("virtualEnergyRandomDelay");
                let concurrent = times.flag("virtualEnergyTimeConcurrent");
                let base = times.seconds("virtualEnergyInsert")
                    + times.seconds("virtualEnergyRemove");
                let fill_rate = times.seconds("virtualEnergyFillRate") * 100.0;
                let refill = target - state.energy_remaining_pct;
                state.energy_target = target;
                state.energy_delta = refill;
                if refill > 0.0 && fill_rate > 0.0 {
                    Some(ServiceTime {
                        seconds: base + refill / fill_rate,
                        random_delay: delay,
                        concurrent,
                    })
                } else {
                    Some(ServiceTime { seconds: 0.0, random_delay: 0.0, concurrent })
                }
            }
            Self::FuelRatio => {
                // Ratio menus express fuel as a multiplier of the energy
                // target; the selector text is the bare ratio number.
                let fuel = entry
                    .selected_text()
                    .and_then(|text| text.trim().parse::<f64>().ok())
                    .map(|ratio| ratio * state.energy_target)
                    .unwrap_or(0.0);
                Some(fuel_service(fuel, times, state))
            }
            Self::FuelVolume => {
                // Volume menus embed the amount in free text ("40.0 L",
                // "10.6 gal"); take the first numeric substring.
                let fuel = entry
                    .selected_text()
                    .and_then(|text| {
                        extract_number(text).map(|amount| {
                            if text.to_ascii_lowercase().contains("gal") {
                                amount * GAL_TO_LITERS
                            } else {
                                amount
                            }
                        })
                    })
                    .unwrap_or(0.0);
                Some(fuel_service(fuel, times, state))
            }
            Self::FrontWing => Some(adjustment(entry, times.seconds("FrontWingAdjust"))),
            Self::RearWing => Some(adjustment(entry, times.seconds("RearWingAdjust"))),
            Self::Radiator => Some(adjustment(entry, times.seconds("RadiatorChange"))),
            Self::BrakeReplace => {
                let delay = times.seconds("RandomBrakeDelay");
                let concurrent = times.flag("BrakeTimeConcurrent");
                let seconds = if entry.current_setting > 0 {
                    times.seconds("BrakeChange")
                } else {
                    0.0
                };
                Some(ServiceTime { seconds, random_delay: delay, concurrent })
            }
        }
    }
}

/// Wing/radiator adjustments: always concurrent, no random delay.
fn adjustment(entry: &PitMenuEntry, seconds: f64) -> ServiceTime {
    ServiceTime {
        seconds: if entry.is_changed() { seconds } else { 0.0 },
        random_delay: 0.0,
        concurrent: true,
    }
}

/// Shared refuel-time computation for the volume and ratio paths.
fn fuel_service(target: f64, times: &PitTimeTable, state: &mut EstimatorState) -> ServiceTime {
    let mut delay = times.seconds("FuelRandomDelay");
    let concurrent = times.flag("FuelTimeConcurrent");
    let mut seconds = times.seconds("FuelInsert") + times.seconds("FuelRemove");
    let fill_rate = times.seconds("FuelFillRate");
    let refill = target - state.fuel_remaining;
    if refill > 0.0 && fill_rate > 0.0 {
        seconds += refill / fill_rate;
    } else {
        delay = 0.0;
        seconds = 0.0;
    }
    state.fuel_target = target;
    state.fuel_delta = refill;
    ServiceTime { seconds, random_delay: delay, concurrent }
}

/// Tire/pressure aggregate, evaluated once after the row pass.
///
/// Pressure work only costs time when wheels come off anyway or the rules
/// allow on-the-fly adjustment; it overlaps the tire change, hence the max.
fn tire_pass(times: &PitTimeTable, state: &EstimatorState) -> ServiceTime {
    let mut delay = times.seconds("RandomTireDelay");
    let concurrent = times.flag("TireTimeConcurrent");
    let pressure_seconds = if state.pressure_changes > 0
        && (state.tire_changes > 0 || times.flag("OnTheFlyPressure"))
    {
        times.seconds("PressureChange")
    } else {
        0.0
    };
    let seconds = if state.tire_changes > 2 {
        times.seconds("FourTireChange")
    } else if state.tire_changes > 0 {
        times.seconds("TwoTireChange")
    } else {
        delay = 0.0;
        0.0
    };
    ServiceTime { seconds: seconds.max(pressure_seconds), random_delay: delay, concurrent }
}

/// Estimate the total pit-stop service time for the current menu state.
///
/// Pure function of its input; malformed input (missing menu list or
/// timing table) yields the all-zero default estimate rather than an error,
/// because the game serves partial payloads mid-transition.
pub fn estimate(data: &PitData) -> PitEstimate {
    let (Some(menu), Some(times)) = (&data.menu, &data.times) else {
        return PitEstimate::default();
    };

    let mut state = EstimatorState::new(&data.fuel);
    let mut contributions: Vec<ServiceTime> = Vec::with_capacity(menu.len() + 1);
    let mut short_circuit = false;

    for entry in menu {
        let Some(category) = ServiceCategory::from_label(&entry.name) else {
            continue;
        };
        match category.apply(entry, times, &mut state) {
            Some(contribution) => contributions.push(contribution),
            // An exclusive stop-go voids every other service time.
            None if state.stop_go == StopGoPenalty::Exclusive => {
                short_circuit = true;
                break;
            }
            None => {}
        }
    }

    if !short_circuit {
        contributions.push(tire_pass(times, &state));
    }

    let mut max_concurrent = 0.0f64;
    let mut max_concurrent_delay = 0.0f64;
    let mut sum_sequential = 0.0f64;
    let mut sum_sequential_delay = 0.0f64;

    for contribution in &contributions {
        let with_delay = contribution.seconds + contribution.random_delay;
        if contribution.concurrent {
            max_concurrent = max_concurrent.max(contribution.seconds);
            max_concurrent_delay = max_concurrent_delay.max(with_delay);
        } else {
            sum_sequential += contribution.seconds;
            sum_sequential_delay += with_delay;
        }
    }

    PitEstimate {
        total_time: max_concurrent + sum_sequential,
        total_time_with_delay: max_concurrent_delay + sum_sequential_delay,
        fuel_delta: state.fuel_delta,
        energy_delta: state.energy_delta,
        stop_go: state.stop_go,
        fuel_target: state.fuel_target,
        tire_changes: state.tire_changes,
    }
}

/// First numeric substring of `text` (digits with an optional decimal
/// point), mirroring the menu text format the game renders.
fn extract_number(text: &str) -> Option<f64> {
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i].is_ascii_digit()
            || (bytes[i] == b'.' && bytes.get(i + 1).is_some_and(u8::is_ascii_digit))
        {
            let start = i;
            let mut seen_dot = false;
            while i < bytes.len()
                && (bytes[i].is_ascii_digit() || (bytes[i] == b'.' && !seen_dot))
            {
                if bytes[i] == b'.' {
                    seen_dot = true;
                }
                i += 1;
            }
            let mut end = i;
            // A trailing dot is not part of the number ("40." parses as 40).
            if bytes[end - 1] == b'.' {
                end -= 1;
            }
            return text[start..end].parse().ok();
        }
        i += 1;
    }
    None
}
