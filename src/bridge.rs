//! Sampling loop and snapshot assembly
//!
//! The bridge polls the data source at a fixed cadence, derives strategy
//! metrics, assembles one flat snapshot document per cycle and hands it to
//! the publisher. Skipped cycles (game down, no player vehicle, no session
//! data) are normal operation, not errors.

use std::time::{SystemTime, UNIX_EPOCH};

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use crate::config::BridgeConfig;
use crate::error::{BridgeError, Result};
use crate::metrics::{LapMetrics, LapMetricsTracker};
use crate::pit::{self, PitData, PitEstimate, PitRestClient};
use crate::publish::{Publisher, StoreAdapter, build_adapter};
use crate::source::{
    PlayerScoring, PlayerTelemetry, SessionFingerprint, SessionState, TelemetrySource,
};
use crate::types::Snapshot;

/// The telemetry-to-dashboard bridge.
///
/// Owns the sampling loop, the lap-metrics state and the publisher handle.
/// Construct with [`Bridge::new`] (store adapter from config) or
/// [`Bridge::with_adapter`], then drive with [`Bridge::run`].
pub struct Bridge<S: TelemetrySource> {
    config: BridgeConfig,
    source: S,
    rest: PitRestClient,
    publisher: Publisher,
    tracker: LapMetricsTracker,
    team_id: String,
    session_fingerprint: Option<SessionFingerprint>,
    team_registered: bool,
}

impl<S: TelemetrySource> Bridge<S> {
    /// Build a bridge publishing to the store named in `config`.
    pub fn new(config: BridgeConfig, source: S, team_id: &str) -> Result<Self> {
        let adapter = build_adapter(&config.store)?;
        Self::with_adapter(config, source, adapter, team_id)
    }

    /// Build a bridge with an explicit store adapter.
    pub fn with_adapter<A: StoreAdapter>(
        config: BridgeConfig,
        source: S,
        adapter: A,
        team_id: &str,
    ) -> Result<Self> {
        config.validate()?;
        let team_id = normalize_team_id(team_id)?;
        let rest = PitRestClient::new(&config.rest)?;
        let publisher = Publisher::spawn(adapter);
        Ok(Self {
            config,
            source,
            rest,
            publisher,
            tracker: LapMetricsTracker::new(),
            team_id,
            session_fingerprint: None,
            team_registered: false,
        })
    }

    /// Normalized team identifier this bridge publishes under.
    pub fn team_id(&self) -> &str {
        &self.team_id
    }

    /// Run the sampling loop until `cancel` fires, then drain the publisher.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<()> {
        let mut ticker = tokio::time::interval(self.config.poll_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            "Bridge started for team '{}' -> collection '{}'",
            self.team_id, self.config.collection
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            self.cycle().await;
        }

        info!("Bridge stopping, draining publisher");
        self.publisher.shutdown(self.config.shutdown_grace()).await;
        info!("Bridge stopped");
        Ok(())
    }

    /// One sampling cycle. Never fails; anything missing skips the cycle.
    async fn cycle(&mut self) {
        if !self.source.is_running() {
            trace!("Game not running, skipping cycle");
            return;
        }

        let Some(session) = self.source.session() else {
            trace!("No session data, skipping cycle");
            return;
        };
        self.detect_session_change(&session);

        let (Some(telemetry), Some(scoring)) =
            (self.source.player_telemetry(), self.source.player_scoring())
        else {
            trace!("No player vehicle, skipping cycle");
            return;
        };

        // A slow or absent game-side webserver must not stall the loop: the
        // fetch is timeout-bounded and failure just means defaults.
        let pit_data = match self.rest.fetch().await {
            Ok(data) => data,
            Err(err) => {
                debug!("No pit data this cycle: {}", err);
                PitData::default()
            }
        };
        let energy_pct = pit_data.fuel.energy_remaining_pct();
        let estimate = pit::estimate(&pit_data);

        self.tracker.update(
            scoring.total_laps as i64,
            telemetry.fuel,
            energy_pct,
            scoring.last_lap_time,
            telemetry.wheels.map(|wheel| wheel.wear),
        );

        if !self.team_registered {
            // Out-of-band so the telemetry stream cannot supersede it in
            // the latest-wins slot.
            let team_doc = team_document(&self.team_id, &scoring);
            self.publisher.publish_once(&self.config.teams_collection, &self.team_id, team_doc);
            self.team_registered = true;
            info!("Registered team '{}' in directory", self.team_id);
        }

        let snapshot = build_snapshot(
            &self.team_id,
            &telemetry,
            &scoring,
            &session,
            &self.tracker.metrics(),
            &estimate,
            energy_pct,
            epoch_millis(),
        );
        self.publisher.publish(&self.config.collection, &self.team_id, snapshot);
        trace!(
            "Published cycle: lap {}, fuel {:.2}L",
            scoring.total_laps, telemetry.fuel
        );
    }

    fn detect_session_change(&mut self, session: &SessionState) {
        let fingerprint = session.fingerprint();
        if self.session_fingerprint.as_ref() != Some(&fingerprint) {
            if self.session_fingerprint.is_some() {
                info!(
                    "New session detected ({} @ {}), resetting lap metrics",
                    session.session_name(),
                    session.track_name
                );
                self.tracker.reset();
            }
            self.session_fingerprint = Some(fingerprint);
        }
    }
}

/// Normalize a team/line-up identifier for use as a document id.
///
/// Runs of non-alphanumeric characters collapse to a single hyphen and the
/// result is lowercased: `"Hypercar #50"` becomes `"hypercar-50"`.
pub fn normalize_team_id(raw: &str) -> Result<String> {
    let mut id = String::with_capacity(raw.len());
    let mut pending_hyphen = false;
    for ch in raw.chars() {
        if ch.is_alphanumeric() {
            if pending_hyphen && !id.is_empty() {
                id.push('-');
            }
            pending_hyphen = false;
            id.extend(ch.to_lowercase());
        } else {
            pending_hyphen = true;
        }
    }
    if id.is_empty() {
        return Err(BridgeError::config_error("team id must contain alphanumeric characters"));
    }
    Ok(id)
}

/// Kelvin reading to Celsius, with a sensor-invalid guard.
///
/// Readings below 10 K are the game reporting an unpowered sensor; fall
/// back to ambient temperature like the dashboard expects.
fn sensor_temp_c(kelvin: f64, ambient_c: f64) -> f64 {
    if kelvin < 10.0 { ambient_c } else { kelvin - 273.15 }
}

/// Coarse weather bucket from rain severity and cloud cover.
fn weather_status(session: &SessionState) -> &'static str {
    if session.raining > 0.4 {
        "RAIN"
    } else if session.raining > 0.05 || session.dark_cloud > 0.5 {
        "CLOUDY"
    } else {
        "SUNNY"
    }
}

/// Car number from the vehicle name's first token, e.g. `"#50 Ferrari"`.
fn car_number(vehicle_name: &str) -> String {
    vehicle_name
        .split_whitespace()
        .next()
        .map(|token| token.replace('#', ""))
        .filter(|number| !number.is_empty())
        .unwrap_or_else(|| "0".to_string())
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

fn epoch_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or(0)
}

/// Category bucket for the team directory.
fn category_bucket(vehicle_class: &str) -> &'static str {
    let class = vehicle_class.to_ascii_lowercase();
    if class.contains("hyper") {
        "hypercar"
    } else if class.contains("lmp2") {
        "lmp2"
    } else {
        "other"
    }
}

fn category_color(bucket: &str) -> &'static str {
    match bucket {
        "hypercar" => "bg-red-600",
        "lmp2" => "bg-blue-600",
        _ => "bg-slate-600",
    }
}

/// One-time team directory document.
fn team_document(team_id: &str, scoring: &PlayerScoring) -> Snapshot {
    let bucket = category_bucket(&scoring.vehicle_class);
    let display_name = if scoring.vehicle_name.is_empty() {
        team_id.to_uppercase()
    } else {
        scoring.vehicle_name.replace(" #", " ").to_uppercase()
    };

    let mut doc = Snapshot::new();
    doc.set("id", team_id);
    doc.set("name", display_name);
    doc.set("category", bucket);
    doc.set("color", category_color(bucket));
    doc.set("isActive", true);
    doc
}

/// Assemble the per-cycle strategy snapshot.
#[allow(clippy::too_many_arguments)]
fn build_snapshot(
    team_id: &str,
    telemetry: &PlayerTelemetry,
    scoring: &PlayerScoring,
    session: &SessionState,
    metrics: &LapMetrics,
    estimate: &PitEstimate,
    energy_pct: f64,
    timestamp_ms: i64,
) -> Snapshot {
    let mut doc = Snapshot::new();
    let ambient = round_to(session.ambient_temp_c, 1);

    doc.set("isRaceRunning", true);
    doc.set("teamId", team_id);
    doc.set("driverName", scoring.driver_name.as_str());
    doc.set("carNumber", car_number(&scoring.vehicle_name));
    doc.set("carCategory", scoring.vehicle_class.as_str());
    doc.set("trackName", session.track_name.as_str());
    doc.set("sessionType", session.session_name());
    doc.set("position", scoring.place as i64);
    doc.set("currentLap", scoring.total_laps as i64);
    doc.set("lapTimeLast", scoring.last_lap_time);
    doc.set("gameEstimatedLapTime", scoring.estimated_lap_time);

    // Only the driving rig may claim the active-driver field; a spectating
    // rig in the garage would otherwise overwrite it on every cycle.
    if !scoring.in_garage_stall {
        doc.set("activeDriverId", scoring.driver_name.as_str());
    }

    doc.set("throttle", round_to(telemetry.unfiltered_throttle * 100.0, 1));
    doc.set("brake", round_to(telemetry.unfiltered_brake * 100.0, 1));
    doc.set("speedKmh", round_to(telemetry.speed_ms() * 3.6, 0));
    doc.set("rpm", round_to(telemetry.engine_rpm, 0));
    doc.set("maxRpm", round_to(telemetry.engine_max_rpm, 0));
    doc.set("waterTemp", round_to(telemetry.engine_water_temp, 1));
    doc.set("oilTemp", round_to(telemetry.engine_oil_temp, 1));
    doc.set("fuelRemainingL", round_to(telemetry.fuel, 2));
    doc.set("fuelTankCapacityL", round_to(telemetry.fuel_capacity, 2));
    doc.set("batterySoc", round_to(telemetry.battery_charge_fraction * 100.0, 1));

    doc.set("averageConsumptionFuel", round_to(metrics.fuel_per_lap_avg, 3));
    doc.set("lastLapFuelConsumption", round_to(metrics.last_lap_fuel, 2));
    doc.set("virtualEnergyRemainingPct", round_to(energy_pct, 1));
    doc.set("virtualEnergyConsumptionLastLap", round_to(metrics.last_lap_energy, 2));
    doc.set("virtualEnergyAverageConsumption", round_to(metrics.energy_per_lap_avg, 2));
    doc.set("averageLapTime", round_to(metrics.lap_time_ema, 3));

    doc.set("sessionTimeRemainingSeconds", round_to(session.time_remaining(), 0));
    doc.set("weather", weather_status(session));
    doc.set("airTemp", ambient);
    doc.set("trackWetness", round_to(session.avg_path_wetness * 100.0, 1));

    doc.set("pitState", scoring.pit_state as i64);
    doc.set("inPitLane", scoring.in_pit_lane());
    doc.set("inGarage", scoring.in_garage_stall);
    doc.set("damageIndex", telemetry.damage_index());
    doc.set("isOverheating", telemetry.overheating);

    let engine_mode = telemetry.boost_motor_state;
    let tc_setting =
        if session.traction_control == 0 { engine_mode } else { session.traction_control };
    doc.set("tcSetting", tc_setting as i64);
    doc.set("engineMode", engine_mode as i64);
    doc.set("brakeBiasFront", round_to((1.0 - telemetry.rear_brake_bias) * 100.0, 1));

    doc.set("strategyEstPitTime", round_to(estimate.total_time, 1));
    doc.set("strategyFuelToAdd", round_to(estimate.fuel_target, 1));
    doc.set("strategyTiresChanged", estimate.tire_changes as i64);

    for (suffix, wheel) in ["FL", "FR", "RL", "RR"].iter().zip(&telemetry.wheels) {
        doc.set(format!("tireWear{suffix}"), round_to(wheel.wear * 100.0, 1));
        doc.set(
            format!("brakeTemp{suffix}C"),
            round_to(sensor_temp_c(wheel.brake_temp_k, ambient), 1),
        );
        doc.set(
            format!("tireTempCenter{suffix}C"),
            round_to(sensor_temp_c(wheel.tread_temp_k, ambient), 1),
        );
    }
    for (suffix, rate) in ["FL", "FR", "RL", "RR"].iter().zip(&metrics.wear_per_lap) {
        doc.set(format!("avgWearPerLap{suffix}"), round_to(*rate, 4));
    }

    doc.set("lastPacketTime", timestamp_ms);
    doc
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::WheelTelemetry;
    use async_trait::async_trait;

    struct NullSource;

    impl TelemetrySource for NullSource {
        fn is_running(&self) -> bool {
            false
        }
        fn player_telemetry(&mut self) -> Option<PlayerTelemetry> {
            None
        }
        fn player_scoring(&mut self) -> Option<PlayerScoring> {
            None
        }
        fn session(&mut self) -> Option<SessionState> {
            None
        }
    }

    struct NullAdapter;

    #[async_trait]
    impl StoreAdapter for NullAdapter {
        fn name(&self) -> &'static str {
            "null"
        }
        fn serialize(&self, snapshot: &Snapshot) -> serde_json::Value {
            snapshot.to_json()
        }
        async fn send(
            &self,
            _collection: &str,
            _document: &str,
            _body: serde_json::Value,
        ) -> Result<()> {
            Ok(())
        }
    }

    fn test_config() -> BridgeConfig {
        BridgeConfig {
            poll_interval_ms: 100,
            rest: crate::config::RestConfig::default(),
            store: crate::config::StoreConfig::Firestore {
                project_id: "p".to_string(),
                api_key: "k".to_string(),
            },
            collection: "strategies".to_string(),
            teams_collection: "teams".to_string(),
            shutdown_grace_ms: 1000,
        }
    }

    #[tokio::test]
    async fn session_fingerprint_change_resets_tracker() {
        let mut bridge =
            Bridge::with_adapter(test_config(), NullSource, NullAdapter, "team").unwrap();

        // Accumulate some lap history.
        bridge.tracker.update(0, 100.0, 0.0, 0.0, [0.0; 4]);
        bridge.tracker.update(1, 96.0, 0.0, 205.0, [0.01; 4]);
        assert_ne!(bridge.tracker.metrics(), LapMetrics::default());

        // First sighting and a repeat of the same session: no reset.
        let session = sample_session();
        bridge.detect_session_change(&session);
        bridge.detect_session_change(&session);
        assert_ne!(bridge.tracker.metrics(), LapMetrics::default());

        // Restarted session (same track, new start time) wipes the metrics.
        let mut restarted = sample_session();
        restarted.start_et += 600.0;
        bridge.detect_session_change(&restarted);
        assert_eq!(bridge.tracker.metrics(), LapMetrics::default());
    }

    fn sample_session() -> SessionState {
        SessionState {
            server_name: "WeRace".into(),
            track_name: "Circuit de la Sarthe".into(),
            session_type: 10,
            start_et: 60.0,
            current_et: 400.0,
            end_et: 1000.0,
            ambient_temp_c: 21.0,
            raining: 0.0,
            dark_cloud: 0.0,
            avg_path_wetness: 0.0,
            traction_control: 3,
        }
    }

    fn sample_scoring() -> PlayerScoring {
        PlayerScoring {
            driver_name: "J. Martin".into(),
            vehicle_name: "#50 Baliverne LMH".into(),
            vehicle_class: "Hypercar".into(),
            place: 4,
            total_laps: 17,
            last_lap_time: 212.4,
            estimated_lap_time: 210.8,
            in_pits: false,
            in_garage_stall: false,
            pit_state: 0,
        }
    }

    fn sample_telemetry() -> PlayerTelemetry {
        PlayerTelemetry {
            fuel: 61.37,
            fuel_capacity: 105.0,
            battery_charge_fraction: 0.724,
            unfiltered_throttle: 0.85,
            unfiltered_brake: 0.0,
            local_velocity: [0.0, 0.0, -83.33],
            engine_rpm: 7421.0,
            engine_max_rpm: 8000.0,
            engine_water_temp: 88.2,
            engine_oil_temp: 102.7,
            wheels: [WheelTelemetry { wear: 0.12, brake_temp_k: 650.0, tread_temp_k: 360.0 }; 4],
            dent_severity: [0; 8],
            overheating: false,
            boost_motor_state: 2,
            rear_brake_bias: 0.46,
        }
    }

    #[test]
    fn normalize_team_id_collapses_runs() {
        assert_eq!(normalize_team_id("Hypercar #50").unwrap(), "hypercar-50");
        assert_eq!(normalize_team_id("  baliverne  ").unwrap(), "baliverne");
        assert_eq!(normalize_team_id("AF_Corse//51").unwrap(), "af-corse-51");
        assert_eq!(normalize_team_id("TEAM").unwrap(), "team");
        assert!(normalize_team_id("###").is_err());
        assert!(normalize_team_id("").is_err());
    }

    #[test]
    fn sensor_temp_falls_back_below_ten_kelvin() {
        assert_eq!(sensor_temp_c(300.0, 20.0), 300.0 - 273.15);
        assert_eq!(sensor_temp_c(0.0, 20.0), 20.0);
        assert_eq!(sensor_temp_c(9.9, 18.5), 18.5);
    }

    #[test]
    fn weather_buckets() {
        let mut session = sample_session();
        assert_eq!(weather_status(&session), "SUNNY");
        session.dark_cloud = 0.8;
        assert_eq!(weather_status(&session), "CLOUDY");
        session.raining = 0.2;
        assert_eq!(weather_status(&session), "CLOUDY");
        session.raining = 0.7;
        assert_eq!(weather_status(&session), "RAIN");
    }

    #[test]
    fn car_number_extraction() {
        assert_eq!(car_number("#50 Baliverne LMH"), "50");
        assert_eq!(car_number("Porsche 963"), "Porsche");
        assert_eq!(car_number(""), "0");
        assert_eq!(car_number("#"), "0");
    }

    #[test]
    fn snapshot_carries_identity_and_telemetry() {
        let doc = build_snapshot(
            "hypercar-50",
            &sample_telemetry(),
            &sample_scoring(),
            &sample_session(),
            &LapMetrics::default(),
            &PitEstimate::default(),
            43.8,
            1_700_000_000_000,
        );

        assert_eq!(doc.get("teamId"), Some(&"hypercar-50".into()));
        assert_eq!(doc.get("carNumber"), Some(&"50".into()));
        assert_eq!(doc.get("sessionType"), Some(&"RACE 1".into()));
        assert_eq!(doc.get("position"), Some(&4i64.into()));
        assert_eq!(doc.get("speedKmh"), Some(&300.0.into()));
        assert_eq!(doc.get("throttle"), Some(&85.0.into()));
        assert_eq!(doc.get("batterySoc"), Some(&72.4.into()));
        assert_eq!(doc.get("virtualEnergyRemainingPct"), Some(&43.8.into()));
        assert_eq!(doc.get("sessionTimeRemainingSeconds"), Some(&600.0.into()));
        assert_eq!(doc.get("brakeBiasFront"), Some(&54.0.into()));
        assert_eq!(doc.get("lastPacketTime"), Some(&1_700_000_000_000i64.into()));
        // TC comes from the physics options when set, engine mode otherwise.
        assert_eq!(doc.get("tcSetting"), Some(&3i64.into()));
    }

    #[test]
    fn snapshot_wheel_fields_convert_and_guard() {
        let mut telemetry = sample_telemetry();
        telemetry.wheels[2].brake_temp_k = 0.0; // unpowered sensor
        let doc = build_snapshot(
            "t",
            &telemetry,
            &sample_scoring(),
            &sample_session(),
            &LapMetrics::default(),
            &PitEstimate::default(),
            0.0,
            0,
        );

        assert_eq!(doc.get("tireWearFL"), Some(&12.0.into()));
        assert_eq!(doc.get("brakeTempFLC"), Some(&round_to(650.0 - 273.15, 1).into()));
        // RL fell back to ambient.
        assert_eq!(doc.get("brakeTempRLC"), Some(&21.0.into()));
        assert_eq!(doc.get("tireTempCenterRRC"), Some(&round_to(360.0 - 273.15, 1).into()));
    }

    #[test]
    fn active_driver_omitted_in_garage() {
        let mut scoring = sample_scoring();
        let present = build_snapshot(
            "t",
            &sample_telemetry(),
            &scoring,
            &sample_session(),
            &LapMetrics::default(),
            &PitEstimate::default(),
            0.0,
            0,
        );
        assert_eq!(present.get("activeDriverId"), Some(&"J. Martin".into()));

        scoring.in_garage_stall = true;
        let absent = build_snapshot(
            "t",
            &sample_telemetry(),
            &scoring,
            &sample_session(),
            &LapMetrics::default(),
            &PitEstimate::default(),
            0.0,
            0,
        );
        assert_eq!(absent.get("activeDriverId"), None);
        assert_eq!(absent.get("inGarage"), Some(&true.into()));
    }

    #[test]
    fn strategy_fields_come_from_estimate() {
        let estimate = PitEstimate {
            total_time: 23.04,
            total_time_with_delay: 26.0,
            fuel_delta: 30.0,
            energy_delta: 0.0,
            stop_go: crate::pit::StopGoPenalty::None,
            fuel_target: 40.0,
            tire_changes: 2,
        };
        let doc = build_snapshot(
            "t",
            &sample_telemetry(),
            &sample_scoring(),
            &sample_session(),
            &LapMetrics::default(),
            &estimate,
            0.0,
            0,
        );
        assert_eq!(doc.get("strategyEstPitTime"), Some(&23.0.into()));
        assert_eq!(doc.get("strategyFuelToAdd"), Some(&40.0.into()));
        assert_eq!(doc.get("strategyTiresChanged"), Some(&2i64.into()));
    }

    #[test]
    fn team_document_buckets_category() {
        let mut scoring = sample_scoring();
        let doc = team_document("hypercar-50", &scoring);
        assert_eq!(doc.get("category"), Some(&"hypercar".into()));
        assert_eq!(doc.get("color"), Some(&"bg-red-600".into()));
        assert_eq!(doc.get("name"), Some(&"#50 BALIVERNE LMH".into()));
        assert_eq!(doc.get("isActive"), Some(&true.into()));

        scoring.vehicle_class = "LMP2".into();
        scoring.vehicle_name = String::new();
        let doc = team_document("oreca-23", &scoring);
        assert_eq!(doc.get("category"), Some(&"lmp2".into()));
        assert_eq!(doc.get("color"), Some(&"bg-blue-600".into()));
        assert_eq!(doc.get("name"), Some(&"ORECA-23".into()));
    }
}
