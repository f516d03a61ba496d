//! End-to-end bridge cycle: scripted source in, recorded upserts out.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value as Json;
use tokio_util::sync::CancellationToken;

use pitlink::{
    Bridge, BridgeConfig, PlayerScoring, PlayerTelemetry, Result, SessionState, Snapshot,
    StoreAdapter, TelemetrySource, WheelTelemetry,
};

/// Source that completes one lap every few samples, burning fuel as it goes.
struct ScriptedSource {
    cycles: AtomicU64,
}

impl ScriptedSource {
    fn new() -> Self {
        Self { cycles: AtomicU64::new(0) }
    }
}

impl TelemetrySource for ScriptedSource {
    fn is_running(&self) -> bool {
        true
    }

    fn player_telemetry(&mut self) -> Option<PlayerTelemetry> {
        let cycle = self.cycles.load(Ordering::Relaxed);
        let lap = cycle / 3;
        Some(PlayerTelemetry {
            fuel: 100.0 - 3.0 * lap as f64,
            fuel_capacity: 105.0,
            local_velocity: [0.0, 0.0, -70.0],
            engine_rpm: 7000.0,
            engine_max_rpm: 8200.0,
            wheels: [WheelTelemetry { wear: 0.01 * lap as f64, brake_temp_k: 600.0, tread_temp_k: 350.0 }; 4],
            ..Default::default()
        })
    }

    fn player_scoring(&mut self) -> Option<PlayerScoring> {
        // Advance the script on the last accessor the bridge calls per cycle.
        let cycle = self.cycles.fetch_add(1, Ordering::Relaxed);
        Some(PlayerScoring {
            driver_name: "A. Pilot".into(),
            vehicle_name: "#5 Test LMH".into(),
            vehicle_class: "Hypercar".into(),
            place: 2,
            total_laps: (cycle / 3) as i32,
            last_lap_time: 208.0,
            ..Default::default()
        })
    }

    fn session(&mut self) -> Option<SessionState> {
        Some(SessionState {
            server_name: "test".into(),
            track_name: "Sarthe".into(),
            session_type: 10,
            start_et: 0.0,
            current_et: 100.0,
            end_et: 86_400.0,
            ambient_temp_c: 19.0,
            ..Default::default()
        })
    }
}

#[derive(Default)]
struct RecordingAdapter {
    upserts: Mutex<Vec<(String, String, Json)>>,
}

/// Shareable handle to a [`RecordingAdapter`]. A newtype is required because
/// the orphan rule forbids implementing the foreign `StoreAdapter` trait
/// directly for `Arc<RecordingAdapter>` from this external test crate.
#[derive(Clone)]
struct SharedRecorder(Arc<RecordingAdapter>);

#[async_trait]
impl StoreAdapter for SharedRecorder {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn serialize(&self, snapshot: &Snapshot) -> Json {
        snapshot.to_json()
    }

    async fn send(&self, collection: &str, document: &str, body: Json) -> Result<()> {
        self.0.upserts.lock().unwrap().push((collection.to_string(), document.to_string(), body));
        Ok(())
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn test_config() -> BridgeConfig {
    BridgeConfig::from_yaml(
        r#"
poll_interval_ms: 10
rest:
  host: 127.0.0.1
  port: 9
  timeout_ms: 20
store:
  provider: firestore
  project_id: unused
  api_key: unused
"#,
    )
    .unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn bridge_publishes_snapshots_and_registers_team() -> anyhow::Result<()> {
    init_tracing();
    let adapter = Arc::new(RecordingAdapter::default());
    let bridge = Bridge::with_adapter(
        test_config(),
        ScriptedSource::new(),
        SharedRecorder(Arc::clone(&adapter)),
        "Test Team #5",
    )?;
    assert_eq!(bridge.team_id(), "test-team-5");

    let cancel = CancellationToken::new();
    let runner = {
        let cancel = cancel.clone();
        tokio::spawn(bridge.run(cancel))
    };

    tokio::time::sleep(Duration::from_millis(400)).await;
    cancel.cancel();
    runner.await??;

    let upserts = adapter.upserts.lock().unwrap();

    // Team directory registration happened exactly once.
    let team_docs: Vec<_> =
        upserts.iter().filter(|(collection, _, _)| collection == "teams").collect();
    assert_eq!(team_docs.len(), 1);
    let (_, document, body) = team_docs[0];
    assert_eq!(document, "test-team-5");
    assert_eq!(body["category"], "hypercar");
    assert_eq!(body["isActive"], true);

    // Strategy snapshots flowed to the configured collection; under the
    // latest-wins queue some cycles are superseded, but never reordered.
    let snapshots: Vec<&Json> = upserts
        .iter()
        .filter(|(collection, _, _)| collection == "strategies")
        .map(|(_, _, body)| body)
        .collect();
    assert!(!snapshots.is_empty(), "no strategy snapshots published");

    let laps: Vec<i64> =
        snapshots.iter().map(|body| body["currentLap"].as_i64().unwrap()).collect();
    assert!(laps.windows(2).all(|pair| pair[0] <= pair[1]), "laps went backwards: {laps:?}");

    let last = snapshots.last().unwrap();
    assert_eq!(last["teamId"], "test-team-5");
    assert_eq!(last["driverName"], "A. Pilot");
    assert_eq!(last["carNumber"], "5");
    assert_eq!(last["sessionType"], "RACE 1");
    assert_eq!(last["weather"], "SUNNY");
    assert_eq!(last["speedKmh"], 252.0);
    // No pit endpoint in the test environment: estimator defaults.
    assert_eq!(last["strategyEstPitTime"], 0.0);
    assert_eq!(last["strategyTiresChanged"], 0);
    // Once a few laps completed, consumption settles on the scripted burn.
    if laps.last().copied().unwrap_or(0) >= 2 {
        assert_eq!(last["averageConsumptionFuel"], 3.0);
    }
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn bridge_skips_cycles_while_game_is_down() {
    struct DownSource;
    impl TelemetrySource for DownSource {
        fn is_running(&self) -> bool {
            false
        }
        fn player_telemetry(&mut self) -> Option<PlayerTelemetry> {
            panic!("must not be polled while down")
        }
        fn player_scoring(&mut self) -> Option<PlayerScoring> {
            panic!("must not be polled while down")
        }
        fn session(&mut self) -> Option<SessionState> {
            panic!("must not be polled while down")
        }
    }

    init_tracing();
    let adapter = Arc::new(RecordingAdapter::default());
    let bridge =
        Bridge::with_adapter(test_config(), DownSource, SharedRecorder(Arc::clone(&adapter)), "idle")
            .unwrap();

    let cancel = CancellationToken::new();
    let runner = {
        let cancel = cancel.clone();
        tokio::spawn(bridge.run(cancel))
    };

    tokio::time::sleep(Duration::from_millis(100)).await;
    cancel.cancel();
    runner.await.unwrap().unwrap();

    assert!(adapter.upserts.lock().unwrap().is_empty());
}
