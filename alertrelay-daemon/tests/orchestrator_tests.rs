//! Orchestrator lifecycle tests.
//!
//! Runs the full daemon wiring (startup notice, engine, watcher, signal task)
//! against a tailed file in a temp directory.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use alertrelay_core::config::AlertrelayConfig;
use alertrelay_core::pipeline::{DynNotifier, Notifier};
use alertrelay_daemon::orchestrator::Orchestrator;
use alertrelay_shipper::{EngineExit, ExitStatus};

struct RecordingNotifier {
    titles: Mutex<Vec<String>>,
    cancel_after: Option<(usize, CancellationToken)>,
}

impl RecordingNotifier {
    fn new(cancel_after: Option<(usize, CancellationToken)>) -> Arc<Self> {
        Arc::new(Self {
            titles: Mutex::new(Vec::new()),
            cancel_after,
        })
    }

    fn titles(&self) -> Vec<String> {
        self.titles.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn name(&self) -> &str {
        "recording"
    }

    async fn send_notification(&self, _message: Value, title: &str) {
        let count = {
            let mut titles = self.titles.lock().unwrap();
            titles.push(title.to_owned());
            titles.len()
        };
        if let Some((limit, token)) = &self.cancel_after {
            if count >= *limit {
                token.cancel();
            }
        }
    }
}

const EVE_ALERT: &str = r#"{"event_type":"alert","src_ip":"10.0.0.1","dest_ip":"192.168.0.1","alert":{"signature":"test","severity":2}}"#;

struct Fixture {
    dir: tempfile::TempDir,
    config_path: PathBuf,
}

impl Fixture {
    fn new(extra_general: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("eve.json");
        std::fs::File::create(&log).unwrap();

        let config_path = dir.path().join("alertrelay.toml");
        let toml = format!(
            r#"
[general]
state_file = '{state}'
{extra_general}

[notify]
notify_on_startup = true

[sensors.suricata]
enabled = true
interface = "eth0"
source = "file"
log_type = "eve"
file_path = '{log}'
"#,
            state = dir.path().join("checkpoints.json").display(),
            log = log.display(),
        );
        std::fs::write(&config_path, toml).unwrap();

        Self { dir, config_path }
    }

    fn config(&self) -> AlertrelayConfig {
        let text = std::fs::read_to_string(&self.config_path).unwrap();
        AlertrelayConfig::parse(&text).unwrap()
    }

    fn append_alert(&self) {
        let mut file = std::fs::OpenOptions::new()
            .append(true)
            .open(self.dir.path().join("eve.json"))
            .unwrap();
        writeln!(file, "{EVE_ALERT}").unwrap();
    }

    fn state_file(&self) -> PathBuf {
        self.dir.path().join("checkpoints.json")
    }
}

fn saved_cursor(path: &Path) -> u64 {
    let table: Value = serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
    table["suricata"]["eth0"].as_u64().unwrap()
}

async fn run_to_exit(orchestrator: Orchestrator) -> EngineExit {
    tokio::time::timeout(Duration::from_secs(10), orchestrator.run())
        .await
        .expect("orchestrator did not exit in time")
        .expect("startup should succeed")
}

#[tokio::test]
async fn test_cold_start_announces_and_ships_alert() {
    // Given: A tailed file with one alert and a notifier that stops after two sends
    let fixture = Fixture::new("");
    fixture.append_alert();
    let orchestrator = Orchestrator::new(fixture.config(), &fixture.config_path, false).unwrap();
    let notifier = RecordingNotifier::new(Some((2, orchestrator.shutdown_token())));
    let orchestrator = orchestrator.with_notifier(notifier.clone() as Arc<dyn DynNotifier>);

    // When: Running until the notifier cancels
    let exit = run_to_exit(orchestrator).await;

    // Then: Startup notice first, then the alert, then a graceful exit with a saved cursor
    assert_eq!(notifier.titles(), vec!["Upstart event", "Suricata Event"]);
    assert_eq!(exit.status, ExitStatus::Graceful);
    assert!(exit.restart.is_none());
    assert_eq!(saved_cursor(&fixture.state_file()), EVE_ALERT.len() as u64 + 1);
}

#[tokio::test]
async fn test_restarted_process_announces_restart() {
    // Given: A process launched with the restart marker, cancelled up front
    let fixture = Fixture::new("");
    let orchestrator = Orchestrator::new(fixture.config(), &fixture.config_path, true).unwrap();
    let notifier = RecordingNotifier::new(None);
    let orchestrator = orchestrator.with_notifier(notifier.clone() as Arc<dyn DynNotifier>);
    orchestrator.shutdown_token().cancel();

    // When: Running
    let exit = run_to_exit(orchestrator).await;

    // Then: The restart notice is sent and shutdown is graceful
    assert_eq!(notifier.titles(), vec!["Restart event"]);
    assert_eq!(exit.status, ExitStatus::Graceful);
}

#[tokio::test]
async fn test_corrupt_state_file_fails_startup() {
    // Given: An undecodable checkpoint file
    let fixture = Fixture::new("");
    std::fs::write(fixture.state_file(), "{not json").unwrap();
    let orchestrator = Orchestrator::new(fixture.config(), &fixture.config_path, false).unwrap();

    // When: Running
    let result = orchestrator.run().await;

    // Then: Startup fails and the file is left untouched
    let err = result.expect_err("corrupt state must be fatal");
    assert!(err.to_string().contains("startup failed"));
    assert_eq!(
        std::fs::read_to_string(fixture.state_file()).unwrap(),
        "{not json"
    );
}

#[tokio::test]
async fn test_config_change_requests_restart() {
    // Given: Restart-on-change enabled with a one second poll
    let fixture = Fixture::new("restart_on_change = true\nwatch_interval_secs = 1");
    let orchestrator = Orchestrator::new(fixture.config(), &fixture.config_path, false).unwrap();
    let config_path = fixture.config_path.clone();

    // When: The config file changes while the daemon runs
    let edit = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        let mut file = std::fs::OpenOptions::new()
            .append(true)
            .open(&config_path)
            .unwrap();
        writeln!(file, "# edited").unwrap();
    });
    let exit = run_to_exit(orchestrator).await;
    edit.await.unwrap();

    // Then: The engine exits gracefully and reports the changed file
    assert_eq!(exit.status, ExitStatus::Graceful);
    assert_eq!(exit.restart, Some(fixture.config_path.clone()));
}

#[test]
fn test_watched_paths_include_config_once() {
    // Given: watched_files repeating the config path
    let fixture = Fixture::new("");
    let mut config = fixture.config();
    config.general.watched_files = vec![
        fixture.config_path.display().to_string(),
        "filter.json".to_owned(),
    ];

    // When: Building the orchestrator
    let orchestrator = Orchestrator::new(config, &fixture.config_path, false).unwrap();

    // Then: The config file is listed once, first
    assert_eq!(
        orchestrator.watched_paths(),
        vec![fixture.config_path.clone(), PathBuf::from("filter.json")]
    );
}
