//! Daemon integration tests: gate, registry and router wired together

use std::time::Duration;

use ptz_gateway::config::file::ConfigFile;
use ptz_gateway::{Action, AdapterSet, Config, Daemon, DispatchOutcome, Protocol};
use serde_json::json;
use tokio::io::BufReader;

mod common;
use common::{Call, MockAdapter, calls, stops};

const CONFIG: &str = r#"
[security]
room_secret = "letmein"

[discovery]
enabled = false

[[devices]]
ip = "10.0.0.10"
protocol = "panasonic"

[[devices]]
ip = "10.0.0.11"
port = 52381

[[devices]]
ip = "not-an-ip"
"#;

fn config() -> Config {
    let file: ConfigFile = toml::from_str(CONFIG).unwrap();
    Config::resolve(file, |_| None)
}

#[tokio::test]
async fn test_configured_devices_are_registered() {
    let daemon = Daemon::with_adapters(config(), AdapterSet::new()).unwrap();
    let devices = daemon.devices().await;

    assert_eq!(devices.len(), 2);
    assert_eq!(devices[0].id, "10.0.0.10");
    assert_eq!(devices[0].protocol, Protocol::Panasonic);
    assert_eq!(devices[1].protocol, Protocol::Visca);
}

#[test]
fn test_missing_secret_refuses_to_start() {
    let result = Daemon::with_adapters(Config::default(), AdapterSet::new());
    assert!(result.is_err());
}

#[tokio::test]
async fn test_wrong_password_never_reaches_a_camera() {
    let adapter = MockAdapter::new(Protocol::Panasonic);
    let log = adapter.log();
    let daemon = Daemon::with_adapters(config(), AdapterSet::new().with(adapter)).unwrap();

    let reports = daemon
        .handle(&json!({"password": "guess", "action": "PAN_LEFT"}))
        .await;
    assert!(reports.is_empty());
    assert!(calls(&log).await.is_empty());
}

#[tokio::test]
async fn test_disallowed_action_is_dropped() {
    let adapter = MockAdapter::new(Protocol::Panasonic);
    let log = adapter.log();
    let daemon = Daemon::with_adapters(config(), AdapterSet::new().with(adapter)).unwrap();

    let reports = daemon
        .handle(&json!({"password": "letmein", "action": "REBOOT"}))
        .await;
    assert!(reports.is_empty());
    assert!(calls(&log).await.is_empty());
}

#[tokio::test]
async fn test_admitted_command_reaches_targets() {
    let pana = MockAdapter::new(Protocol::Panasonic);
    let visca = MockAdapter::new(Protocol::Visca);
    let (pana_log, visca_log) = (pana.log(), visca.log());
    let daemon = Daemon::with_adapters(config(), AdapterSet::new().with(pana).with(visca)).unwrap();

    let reports = daemon
        .handle(&json!({"password": "letmein", "action": "preset-recall", "preset": 3}))
        .await;
    assert_eq!(reports.len(), 2);
    assert!(reports.iter().all(|r| matches!(r.outcome, DispatchOutcome::Sent(_))));
    assert_eq!(
        calls(&pana_log).await,
        vec![Call::Send("10.0.0.10".to_string(), Action::PresetRecall(3))]
    );
    assert_eq!(
        calls(&visca_log).await,
        vec![Call::Send("10.0.0.11".to_string(), Action::PresetRecall(3))]
    );
}

#[tokio::test(start_paused = true)]
async fn test_serve_routes_lines_then_stops_everything() {
    let adapter = MockAdapter::new(Protocol::Panasonic).with_delay(Duration::from_millis(20));
    let log = adapter.log();
    let daemon = Daemon::with_adapters(config(), AdapterSet::new().with(adapter)).unwrap();

    let input = tokio_test::io::Builder::new()
        .read(b"{\"password\":\"letmein\",\"action\":\"pan_left\",\"target\":\"10.0.0.10\"}\n")
        .read(b"garbage\n")
        .read(b"{\"password\":\"nope\",\"action\":\"PAN_RIGHT\"}\n")
        .build();

    daemon
        .serve(BufReader::new(input), std::future::pending())
        .await
        .unwrap();

    // the motion lands before the shutdown stop
    assert_eq!(
        calls(&log).await,
        vec![
            Call::Send("10.0.0.10".to_string(), Action::PanLeft),
            Call::Stop("10.0.0.10".to_string()),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_signal_ends_serving() {
    let adapter = MockAdapter::new(Protocol::Panasonic);
    let log = adapter.log();
    let daemon = Daemon::with_adapters(config(), AdapterSet::new().with(adapter)).unwrap();

    // the inbound side never yields a line
    let (reader, _writer) = tokio::io::duplex(64);
    let shutdown = tokio::time::sleep(Duration::from_millis(100));

    daemon.serve(BufReader::new(reader), shutdown).await.unwrap();
    assert_eq!(stops(&log).await, 1);
}
