//! Lap-boundary incremental metrics
//!
//! The tracker consumes one sample per cycle and only does work when the
//! lap counter strictly increases. Consumption averages run over a short
//! FIFO window so they follow stint conditions; lap time and tire wear use
//! exponential smoothing. Refuels and tire changes produce negative or
//! near-zero deltas which are filtered out of the rolling windows but still
//! reported raw for the last lap.

use std::collections::VecDeque;

use tracing::debug;

/// Rolling window length for consumption averages, in laps.
const HISTORY_LAPS: usize = 5;

/// Smoothing factor for the lap-time and wear EMAs.
const EMA_ALPHA: f64 = 0.1;

/// Laps of equal-weight accumulation before wear switches to EMA blending.
const WEAR_SEED_LAPS: u32 = 5;

/// Fuel deltas at or below this are refuels or noise, not consumption.
const FUEL_NOISE_FLOOR: f64 = 0.5;

/// Energy-percentage deltas at or below this are regen events or noise.
const ENERGY_NOISE_FLOOR: f64 = 0.1;

/// Lap times outside (0, 999) are the game's invalid sentinels.
const LAP_TIME_MAX: f64 = 999.0;

/// Derived metrics exposed to snapshot assembly.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LapMetrics {
    /// Mean fuel burn over the rolling window, liters per lap.
    pub fuel_per_lap_avg: f64,
    /// Raw fuel delta of the last completed lap (negative after a refuel).
    pub last_lap_fuel: f64,
    /// Mean virtual-energy burn over the rolling window, points per lap.
    pub energy_per_lap_avg: f64,
    /// Energy delta of the last completed lap that passed the noise floor.
    pub last_lap_energy: f64,
    /// Exponentially smoothed lap time, seconds.
    pub lap_time_ema: f64,
    /// Smoothed tread wear per lap, per wheel (FL, FR, RL, RR).
    pub wear_per_lap: [f64; 4],
}

/// Stateful accumulator fed once per sample by the sampling loop.
///
/// Exclusively owned by the sampling task; the publisher only ever sees the
/// derived [`LapMetrics`] copied into a snapshot.
#[derive(Debug)]
pub struct LapMetricsTracker {
    /// Last lap number seen; -1 means no baseline captured yet.
    last_lap: i64,
    fuel_at_lap_start: f64,
    /// Energy baseline; negative means not yet valid.
    energy_pct_at_lap_start: f64,
    fuel_history: VecDeque<f64>,
    fuel_avg: f64,
    last_lap_fuel: f64,
    energy_history: VecDeque<f64>,
    energy_avg: f64,
    last_lap_energy: f64,
    lap_time_ema: f64,
    wear_at_lap_start: [f64; 4],
    wear_per_lap: [f64; 4],
    wear_samples: u32,
}

impl Default for LapMetricsTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl LapMetricsTracker {
    pub fn new() -> Self {
        Self {
            last_lap: -1,
            fuel_at_lap_start: 0.0,
            energy_pct_at_lap_start: -1.0,
            fuel_history: VecDeque::with_capacity(HISTORY_LAPS),
            fuel_avg: 0.0,
            last_lap_fuel: 0.0,
            energy_history: VecDeque::with_capacity(HISTORY_LAPS),
            energy_avg: 0.0,
            last_lap_energy: 0.0,
            lap_time_ema: 0.0,
            wear_at_lap_start: [0.0; 4],
            wear_per_lap: [0.0; 4],
            wear_samples: 0,
        }
    }

    /// Drop all accumulated state and baselines.
    ///
    /// Called on session change or lap-counter regression; the next
    /// [`update`](Self::update) re-arms baselines without touching averages.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Current derived metrics.
    pub fn metrics(&self) -> LapMetrics {
        LapMetrics {
            fuel_per_lap_avg: self.fuel_avg,
            last_lap_fuel: self.last_lap_fuel,
            energy_per_lap_avg: self.energy_avg,
            last_lap_energy: self.last_lap_energy,
            lap_time_ema: self.lap_time_ema,
            wear_per_lap: self.wear_per_lap,
        }
    }

    /// Wear samples accumulated so far, frozen at the EMA switch point.
    pub fn wear_sample_count(&self) -> u32 {
        self.wear_samples
    }

    /// Feed one sample.
    ///
    /// `wear` is the game's cumulative per-wheel tread wear (0..1, FL, FR,
    /// RL, RR order). Exactly one averages update happens per strictly
    /// increasing lap transition; everything else is a no-op or a re-arm.
    pub fn update(
        &mut self,
        current_lap: i64,
        current_fuel: f64,
        current_energy_pct: f64,
        last_lap_time: f64,
        wear: [f64; 4],
    ) {
        if self.last_lap >= 0 && current_lap < self.last_lap {
            // The counter only moves backwards when the session restarted
            // under us; everything accumulated belongs to the old session.
            debug!(
                "Lap counter regressed {} -> {}, resetting lap metrics",
                self.last_lap, current_lap
            );
            self.reset();
        }

        if self.last_lap < 0 {
            self.rebase(current_lap, current_fuel, current_energy_pct, wear);
            return;
        }

        if current_lap == self.last_lap {
            return;
        }

        self.on_lap_completed(current_fuel, current_energy_pct, last_lap_time, wear);
        self.rebase(current_lap, current_fuel, current_energy_pct, wear);
    }

    fn on_lap_completed(
        &mut self,
        current_fuel: f64,
        current_energy_pct: f64,
        last_lap_time: f64,
        wear: [f64; 4],
    ) {
        let fuel_used = self.fuel_at_lap_start - current_fuel;
        self.last_lap_fuel = fuel_used;
        if fuel_used > FUEL_NOISE_FLOOR {
            push_window(&mut self.fuel_history, fuel_used);
            self.fuel_avg = mean(&self.fuel_history);
        }

        if self.energy_pct_at_lap_start >= 0.0 {
            let energy_used = self.energy_pct_at_lap_start - current_energy_pct;
            if energy_used > ENERGY_NOISE_FLOOR {
                self.last_lap_energy = energy_used;
                push_window(&mut self.energy_history, energy_used);
                self.energy_avg = mean(&self.energy_history);
            }
        }

        if last_lap_time > 0.0 && last_lap_time < LAP_TIME_MAX {
            self.lap_time_ema = if self.lap_time_ema == 0.0 {
                // Seed directly instead of blending against zero.
                last_lap_time
            } else {
                EMA_ALPHA * last_lap_time + (1.0 - EMA_ALPHA) * self.lap_time_ema
            };
        }

        for i in 0..4 {
            // A tire change resets cumulative wear, producing a negative
            // delta; clamp rather than poison the average.
            let delta = (wear[i] - self.wear_at_lap_start[i]).max(0.0);
            if self.wear_samples < WEAR_SEED_LAPS {
                if delta > 0.0 {
                    let count = self.wear_samples as f64;
                    self.wear_per_lap[i] =
                        self.wear_per_lap[i] * count + delta / (count + 1.0);
                }
            } else {
                self.wear_per_lap[i] =
                    EMA_ALPHA * delta + (1.0 - EMA_ALPHA) * self.wear_per_lap[i];
            }
        }
        if self.wear_samples < WEAR_SEED_LAPS {
            self.wear_samples += 1;
        }
    }

    fn rebase(&mut self, lap: i64, fuel: f64, energy_pct: f64, wear: [f64; 4]) {
        self.fuel_at_lap_start = fuel;
        self.energy_pct_at_lap_start = energy_pct;
        self.wear_at_lap_start = wear;
        self.last_lap = lap;
    }
}

fn push_window(window: &mut VecDeque<f64>, sample: f64) {
    window.push_back(sample);
    while window.len() > HISTORY_LAPS {
        window.pop_front();
    }
}

fn mean(window: &VecDeque<f64>) -> f64 {
    if window.is_empty() {
        0.0
    } else {
        window.iter().sum::<f64>() / window.len() as f64
    }
}
