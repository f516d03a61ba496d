//! Data-source abstraction over the simulator's shared state
//!
//! The shared-memory reader itself lives outside this crate; embedding
//! applications implement [`TelemetrySource`] on top of whatever transport
//! they have (memory-mapped plugin buffers on Windows, a replay file, a
//! network relay). The bridge only requires the polling surface below and
//! tolerates every accessor returning `None` while the game is loading or
//! between sessions.

use crate::types::scrub_f64;

/// Polling interface to the running simulator.
///
/// All methods are cheap, synchronous reads of the source's latest state.
/// The sampling loop calls them once per cycle; returning `None` (or
/// `false` from [`is_running`](TelemetrySource::is_running)) makes the loop
/// skip the cycle and retry at the next tick, never fail.
pub trait TelemetrySource: Send + 'static {
    /// Whether the simulator process is up and its buffers are mapped.
    fn is_running(&self) -> bool;

    /// Physics-rate telemetry for the player vehicle.
    fn player_telemetry(&mut self) -> Option<PlayerTelemetry>;

    /// Scoring-rate timing and status for the player vehicle.
    fn player_scoring(&mut self) -> Option<PlayerScoring>;

    /// Session, weather and rules state shared by every vehicle.
    fn session(&mut self) -> Option<SessionState>;
}

/// Per-wheel telemetry sample. Wheels are ordered FL, FR, RL, RR.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WheelTelemetry {
    /// Cumulative tread wear, 0.0 (new) to 1.0 (gone).
    pub wear: f64,
    /// Brake disc temperature in Kelvin.
    pub brake_temp_k: f64,
    /// Center tread surface temperature in Kelvin.
    pub tread_temp_k: f64,
}

/// Physics-rate state of the player vehicle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayerTelemetry {
    pub fuel: f64,
    pub fuel_capacity: f64,
    /// Hybrid battery state of charge, 0.0..=1.0.
    pub battery_charge_fraction: f64,
    pub unfiltered_throttle: f64,
    pub unfiltered_brake: f64,
    /// Local-frame velocity components in m/s.
    pub local_velocity: [f64; 3],
    pub engine_rpm: f64,
    pub engine_max_rpm: f64,
    pub engine_water_temp: f64,
    pub engine_oil_temp: f64,
    pub wheels: [WheelTelemetry; 4],
    /// Dent severity per body section.
    pub dent_severity: [u8; 8],
    pub overheating: bool,
    /// Electric boost motor state (doubles as the engine-mode indicator).
    pub boost_motor_state: i32,
    /// Rear brake bias fraction, 0.0..=1.0.
    pub rear_brake_bias: f64,
}

impl PlayerTelemetry {
    /// Ground speed in m/s from the local velocity vector.
    pub fn speed_ms(&self) -> f64 {
        let [vx, vy, vz] = self.local_velocity;
        scrub_f64((vx * vx + vy * vy + vz * vz).sqrt())
    }

    /// Sum of dent severities, used as a coarse damage index.
    pub fn damage_index(&self) -> i64 {
        self.dent_severity.iter().map(|&d| d as i64).sum()
    }
}

/// Scoring-rate state of the player vehicle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayerScoring {
    pub driver_name: String,
    pub vehicle_name: String,
    pub vehicle_class: String,
    pub place: i32,
    pub total_laps: i32,
    pub last_lap_time: f64,
    pub estimated_lap_time: f64,
    pub in_pits: bool,
    pub in_garage_stall: bool,
    pub pit_state: i32,
}

impl PlayerScoring {
    /// In the pit lane proper, not parked in the garage stall.
    pub fn in_pit_lane(&self) -> bool {
        self.in_pits && !self.in_garage_stall
    }
}

/// Session, weather and rules state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    pub server_name: String,
    pub track_name: String,
    pub session_type: i32,
    /// Session start, seconds of elapsed game time.
    pub start_et: f64,
    pub current_et: f64,
    pub end_et: f64,
    pub ambient_temp_c: f64,
    /// Rain severity, 0.0..=1.0.
    pub raining: f64,
    /// Dark cloud cover, 0.0..=1.0.
    pub dark_cloud: f64,
    /// Average racing-line wetness, 0.0..=1.0.
    pub avg_path_wetness: f64,
    pub traction_control: i32,
}

impl SessionState {
    /// Human-readable session name, matching the game's own labels.
    pub fn session_name(&self) -> &'static str {
        match self.session_type {
            0 => "TEST DAY",
            1 => "PRACTICE 1",
            2 => "PRACTICE 2",
            3 => "PRACTICE 3",
            4 => "PRACTICE 4",
            5 => "QUALIFY 1",
            6 => "QUALIFY 2",
            7 => "QUALIFY 3",
            8 => "QUALIFY 4",
            9 => "WARMUP",
            10 => "RACE 1",
            11 => "RACE 2",
            12 => "RACE 3",
            13 => "RACE 4",
            _ => "UNKNOWN",
        }
    }

    /// Seconds of session time left, clamped at zero.
    pub fn time_remaining(&self) -> f64 {
        (self.end_et - self.current_et).max(0.0)
    }

    /// Identity of this session for reset detection.
    ///
    /// Server, track, session type and start time together distinguish one
    /// session from the next; a change in any of them means lap metrics
    /// accumulated so far describe a different stint of history.
    pub fn fingerprint(&self) -> SessionFingerprint {
        SessionFingerprint {
            server_name: self.server_name.clone(),
            track_name: self.track_name.clone(),
            session_type: self.session_type,
            // Start time only moves in whole-second steps; millisecond bits
            // are shared-memory jitter.
            start_et_ms: (self.start_et * 1000.0) as i64,
        }
    }
}

/// Comparable session identity, see [`SessionState::fingerprint`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionFingerprint {
    server_name: String,
    track_name: String,
    session_type: i32,
    start_et_ms: i64,
}
