//! alertrelay.toml 통합 설정 테스트
//!
//! - alertrelay.toml.example 파싱 및 검증
//! - 부분 설정 로딩
//! - 환경변수 우선순위
//! - 잘못된 형식 에러

use alertrelay_core::config::{AlertrelayConfig, GeneralConfig, MetricsConfig, NotifyConfig};
use alertrelay_core::error::{AlertrelayError, ConfigError};
use alertrelay_core::types::{CheckpointKey, SourceKind};

const EXAMPLE: &str = include_str!("../../../alertrelay.toml.example");

const MINIMAL_SENSOR: &str = r#"
[sensors.suricata]
enabled = true
interface = "eth0"
log_type = "eve"
file_path = "/var/log/suricata/eve.json"
"#;

// =============================================================================
// alertrelay.toml.example
// =============================================================================

#[test]
fn example_config_parses_and_validates() {
    let config = AlertrelayConfig::parse(EXAMPLE).expect("example config should parse");
    config
        .validate()
        .expect("example config should pass validation");

    let (name, sensor) = config.enabled_sensor().expect("one sensor enabled");
    assert_eq!(name, "suricata");
    assert_eq!(sensor.source, SourceKind::File);
    assert_eq!(sensor.log_type, "eve");
}

#[test]
fn example_config_matches_code_defaults() {
    let config = AlertrelayConfig::parse(EXAMPLE).expect("should parse");

    let general = GeneralConfig::default();
    assert_eq!(config.general.log_level, general.log_level);
    assert_eq!(config.general.log_format, general.log_format);
    assert_eq!(config.general.state_file, general.state_file);
    assert_eq!(config.general.watch_interval_secs, general.watch_interval_secs);
    assert_eq!(
        config.general.reverse_dns_timeout_secs,
        general.reverse_dns_timeout_secs
    );

    assert_eq!(config.notify.timeout_secs, NotifyConfig::default().timeout_secs);

    let metrics = MetricsConfig::default();
    assert_eq!(config.metrics.listen_addr, metrics.listen_addr);
    assert_eq!(config.metrics.port, metrics.port);
}

#[test]
fn example_config_http_sensor() {
    let config = AlertrelayConfig::parse(EXAMPLE).expect("should parse");
    let paloalto = &config.sensors["paloalto"];

    assert!(!paloalto.enabled);
    assert_eq!(paloalto.source, SourceKind::Http);
    assert_eq!(paloalto.log_type, "threat");
    assert_eq!(paloalto.pull_interval_secs, 120);
    assert_eq!(paloalto.nlogs, 100);
}

#[test]
fn example_config_default_checkpoint_keys() {
    let config = AlertrelayConfig::parse(EXAMPLE).expect("should parse");
    let keys = config.default_checkpoint_keys();

    assert_eq!(keys.len(), 3);
    assert!(keys.contains(&CheckpointKey::new("suricata", "eth0")));
    assert!(keys.contains(&CheckpointKey::new("snort", "eth0")));
    assert!(keys.contains(&CheckpointKey::new("paloalto", "ethernet1/1")));
}

// =============================================================================
// 부분 설정
// =============================================================================

#[test]
fn partial_config_sensor_only() {
    let config = AlertrelayConfig::parse(MINIMAL_SENSOR).expect("should parse");
    config.validate().expect("minimal config should validate");

    assert_eq!(config.general.state_file, "checkpoints.json");
    assert!(!config.filter.enabled);
    assert_eq!(config.filter.path, "filter.json");
    assert!(!config.notify.enabled);
    assert!(!config.metrics.enabled);
}

#[test]
fn partial_config_general_and_sensor() {
    let toml = format!(
        r#"
[general]
log_level = "debug"
reverse_dns = true
{MINIMAL_SENSOR}"#
    );
    let config = AlertrelayConfig::parse(&toml).expect("should parse");
    config.validate().expect("should validate");

    assert_eq!(config.general.log_level, "debug");
    assert!(config.general.reverse_dns);
    assert_eq!(config.general.log_format, "json");
}

#[test]
fn config_without_sensors_fails_validation() {
    let config = AlertrelayConfig::parse("[general]\nlog_level = \"info\"\n").expect("should parse");
    let err = config.validate().unwrap_err();
    assert!(matches!(
        err,
        AlertrelayError::Config(ConfigError::NoSensorEnabled)
    ));
}

#[test]
fn notify_without_webhook_fails_validation() {
    let toml = format!("[notify]\nenabled = true\n{MINIMAL_SENSOR}");
    let config = AlertrelayConfig::parse(&toml).expect("should parse");
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("notify.webhook_url"));
}

// =============================================================================
// 환경변수 우선순위
// =============================================================================

#[test]
#[serial_test::serial]
fn env_override_takes_precedence_over_toml() {
    let toml = format!("[general]\nlog_level = \"info\"\n{MINIMAL_SENSOR}");

    let original = std::env::var("ALERTRELAY_GENERAL_LOG_LEVEL").ok();
    // SAFETY: serial_test로 직렬화되어 환경변수 조작이 안전합니다.
    unsafe {
        std::env::set_var("ALERTRELAY_GENERAL_LOG_LEVEL", "error");
    }

    let mut config = AlertrelayConfig::parse(&toml).expect("should parse");
    config.apply_env_overrides();
    let result = config.general.log_level.clone();

    // SAFETY: 테스트 정리
    unsafe {
        match original {
            Some(val) => std::env::set_var("ALERTRELAY_GENERAL_LOG_LEVEL", val),
            None => std::env::remove_var("ALERTRELAY_GENERAL_LOG_LEVEL"),
        }
    }

    assert_eq!(result, "error");
}

#[test]
#[serial_test::serial]
fn env_override_injects_sensor_api_key() {
    let original = std::env::var("ALERTRELAY_SENSORS_PALOALTO_API_KEY").ok();
    // SAFETY: serial_test로 직렬화되어 환경변수 조작이 안전합니다.
    unsafe {
        std::env::set_var("ALERTRELAY_SENSORS_PALOALTO_API_KEY", "secret-key");
    }

    let mut config = AlertrelayConfig::parse(EXAMPLE).expect("should parse");
    config.apply_env_overrides();
    let key = config.sensors["paloalto"].api_key.clone();

    // SAFETY: 테스트 정리
    unsafe {
        match original {
            Some(val) => std::env::set_var("ALERTRELAY_SENSORS_PALOALTO_API_KEY", val),
            None => std::env::remove_var("ALERTRELAY_SENSORS_PALOALTO_API_KEY"),
        }
    }

    assert_eq!(key, "secret-key");
}

// =============================================================================
// 에러 케이스
// =============================================================================

#[test]
fn malformed_toml_returns_parse_error() {
    let err = AlertrelayConfig::parse("[general\nlog_level = ").unwrap_err();
    assert!(matches!(
        err,
        AlertrelayError::Config(ConfigError::ParseFailed { .. })
    ));
}

#[test]
fn unknown_source_kind_returns_parse_error() {
    let toml = MINIMAL_SENSOR.replace("log_type", "source = \"kafka\"\nlog_type");
    let err = AlertrelayConfig::parse(&toml).unwrap_err();
    assert!(matches!(
        err,
        AlertrelayError::Config(ConfigError::ParseFailed { .. })
    ));
}

#[tokio::test]
async fn from_file_nonexistent_returns_file_not_found() {
    let err = AlertrelayConfig::from_file("/nonexistent/alertrelay.toml")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AlertrelayError::Config(ConfigError::FileNotFound { .. })
    ));
}

#[tokio::test]
#[serial_test::serial]
async fn load_example_config_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("alertrelay.toml");
    std::fs::write(&path, EXAMPLE).unwrap();

    let config = AlertrelayConfig::load(&path).await.expect("should load");
    assert!(config.sensors["suricata"].enabled);
}
