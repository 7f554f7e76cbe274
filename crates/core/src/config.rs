//! 설정 관리 -- alertrelay.toml 파싱 및 런타임 설정
//!
//! [`AlertrelayConfig`]는 기동 시 한 번 만들어져 엔진과 알림 파이프라인에
//! 참조로 전달되는 불변 설정입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`ALERTRELAY_GENERAL_LOG_LEVEL=debug` 형식)
//! 3. 설정 파일 (`alertrelay.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), alertrelay_core::error::AlertrelayError> {
//! use alertrelay_core::config::AlertrelayConfig;
//!
//! let config = AlertrelayConfig::load("alertrelay.toml").await?;
//! let (name, sensor) = config.enabled_sensor()?;
//! println!("{name} on {}", sensor.interface);
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{AlertrelayError, ConfigError};
use crate::types::{CheckpointKey, SourceKind};

/// alertrelay 통합 설정
///
/// `alertrelay.toml` 파일의 최상위 구조를 나타냅니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlertrelayConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 알림 필터 설정
    #[serde(default)]
    pub filter: FilterConfig,
    /// 알림 채널 설정
    #[serde(default)]
    pub notify: NotifyConfig,
    /// 메트릭 설정
    #[serde(default)]
    pub metrics: MetricsConfig,
    /// 센서 설정 (키 = 센서 유형 이름, 예: `suricata`)
    #[serde(default)]
    pub sensors: BTreeMap<String, SensorConfig>,
}

impl AlertrelayConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, AlertrelayError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드, 검증 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, AlertrelayError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AlertrelayError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                AlertrelayError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, AlertrelayError> {
        toml::from_str(toml_str).map_err(|e| {
            AlertrelayError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `ALERTRELAY_{SECTION}_{FIELD}`
    /// 센서 API 키는 `ALERTRELAY_SENSORS_{NAME}_API_KEY`로 주입할 수 있습니다.
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "ALERTRELAY_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "ALERTRELAY_GENERAL_LOG_FORMAT");
        override_string(&mut self.general.state_file, "ALERTRELAY_GENERAL_STATE_FILE");
        override_bool(&mut self.general.reverse_dns, "ALERTRELAY_GENERAL_REVERSE_DNS");
        override_u64(
            &mut self.general.reverse_dns_timeout_secs,
            "ALERTRELAY_GENERAL_REVERSE_DNS_TIMEOUT_SECS",
        );
        override_bool(
            &mut self.general.restart_on_change,
            "ALERTRELAY_GENERAL_RESTART_ON_CHANGE",
        );
        override_u64(
            &mut self.general.watch_interval_secs,
            "ALERTRELAY_GENERAL_WATCH_INTERVAL_SECS",
        );
        override_csv(
            &mut self.general.watched_files,
            "ALERTRELAY_GENERAL_WATCHED_FILES",
        );

        // Filter
        override_bool(&mut self.filter.enabled, "ALERTRELAY_FILTER_ENABLED");
        override_string(&mut self.filter.path, "ALERTRELAY_FILTER_PATH");
        override_string(&mut self.filter.stats_path, "ALERTRELAY_FILTER_STATS_PATH");

        // Notify
        override_bool(&mut self.notify.enabled, "ALERTRELAY_NOTIFY_ENABLED");
        override_bool(
            &mut self.notify.notify_on_startup,
            "ALERTRELAY_NOTIFY_NOTIFY_ON_STARTUP",
        );
        override_string(&mut self.notify.webhook_url, "ALERTRELAY_NOTIFY_WEBHOOK_URL");
        override_u64(&mut self.notify.timeout_secs, "ALERTRELAY_NOTIFY_TIMEOUT_SECS");

        // Metrics
        override_bool(&mut self.metrics.enabled, "ALERTRELAY_METRICS_ENABLED");
        override_string(&mut self.metrics.listen_addr, "ALERTRELAY_METRICS_LISTEN_ADDR");
        override_u16(&mut self.metrics.port, "ALERTRELAY_METRICS_PORT");

        // Sensors
        for (name, sensor) in &mut self.sensors {
            let env_key = format!("ALERTRELAY_SENSORS_{}_API_KEY", name.to_uppercase());
            override_string(&mut sensor.api_key, &env_key);
        }
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), AlertrelayError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        if self.general.state_file.is_empty() {
            return Err(invalid("general.state_file", "must not be empty"));
        }

        if self.general.reverse_dns && self.general.reverse_dns_timeout_secs == 0 {
            return Err(invalid(
                "general.reverse_dns_timeout_secs",
                "must be greater than 0 when reverse_dns is enabled",
            ));
        }

        if self.general.restart_on_change && self.general.watch_interval_secs == 0 {
            return Err(invalid(
                "general.watch_interval_secs",
                "must be greater than 0 when restart_on_change is enabled",
            ));
        }

        if self.filter.enabled && self.filter.path.is_empty() {
            return Err(invalid(
                "filter.path",
                "must not be empty when filter is enabled",
            ));
        }

        if self.notify.enabled {
            if self.notify.webhook_url.is_empty() {
                return Err(invalid(
                    "notify.webhook_url",
                    "must not be empty when notify is enabled",
                ));
            }
            if self.notify.timeout_secs == 0 {
                return Err(invalid("notify.timeout_secs", "must be greater than 0"));
            }
        }

        for (name, sensor) in &self.sensors {
            sensor.validate(name)?;
        }

        self.enabled_sensor()?;

        Ok(())
    }

    /// 활성화된 단 하나의 센서를 반환합니다.
    ///
    /// 활성 센서가 없거나 둘 이상이면 치명적인 설정 에러입니다.
    pub fn enabled_sensor(&self) -> Result<(&str, &SensorConfig), ConfigError> {
        let enabled: Vec<(&String, &SensorConfig)> =
            self.sensors.iter().filter(|(_, s)| s.enabled).collect();

        match enabled[..] {
            [] => Err(ConfigError::NoSensorEnabled),
            [(name, sensor)] => Ok((name.as_str(), sensor)),
            _ => Err(ConfigError::MultipleSensorsEnabled {
                count: enabled.len(),
                names: enabled
                    .iter()
                    .map(|(name, _)| name.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            }),
        }
    }

    /// 설정된 모든 센서/인터페이스의 체크포인트 키를 반환합니다.
    ///
    /// 체크포인트 파일이 없을 때 기본 테이블(커서 0)을 만드는 데 사용합니다.
    pub fn default_checkpoint_keys(&self) -> Vec<CheckpointKey> {
        self.sensors
            .iter()
            .map(|(name, sensor)| CheckpointKey::new(name.clone(), sensor.interface.clone()))
            .collect()
    }
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
    /// 체크포인트 파일 경로
    pub state_file: String,
    /// 알림의 src/dest에 역방향 DNS 이름 추가
    pub reverse_dns: bool,
    /// 역방향 DNS 조회 한 건의 제한 시간 (초)
    pub reverse_dns_timeout_secs: u64,
    /// 감시 파일 변경 시 프로세스 재실행
    pub restart_on_change: bool,
    /// 변경 감지 주기 (초)
    pub watch_interval_secs: u64,
    /// 변경을 감시할 파일 목록 (설정 파일은 자동 포함)
    pub watched_files: Vec<String>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
            state_file: "checkpoints.json".to_owned(),
            reverse_dns: false,
            reverse_dns_timeout_secs: 2,
            restart_on_change: false,
            watch_interval_secs: 60,
            watched_files: Vec::new(),
        }
    }
}

/// 알림 필터 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// JSON 규칙 파일 경로
    pub path: String,
    /// 필터 통계 출력 파일 경로
    pub stats_path: String,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: "filter.json".to_owned(),
            stats_path: "filter_stats.json".to_owned(),
        }
    }
}

/// 알림 채널 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 기동 시 알림 전송
    pub notify_on_startup: bool,
    /// 웹훅 URL
    pub webhook_url: String,
    /// 전송 타임아웃 (초)
    pub timeout_secs: u64,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            notify_on_startup: false,
            webhook_url: String::new(),
            timeout_secs: 10,
        }
    }
}

/// 메트릭 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Prometheus 엔드포인트 활성화 여부
    pub enabled: bool,
    /// 바인드 주소
    pub listen_addr: String,
    /// 포트
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9100,
        }
    }
}

/// 센서 설정
///
/// `source = "file"`이면 `file_path`를, `source = "http"`이면
/// `base_url`/`api_key`/`pull_interval_secs`/`nlogs`를 사용합니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    /// 활성화 여부 (정확히 하나만 활성화)
    pub enabled: bool,
    /// 인터페이스 이름 (체크포인트 키의 일부)
    pub interface: String,
    /// 로그 소스 유형
    pub source: SourceKind,
    /// 로그 하위 유형 (파서 선택: eve, fast, threat 등)
    pub log_type: String,
    /// 로그 파일 경로 (file)
    pub file_path: String,
    /// 원격 API 기본 URL (http)
    pub base_url: String,
    /// 원격 API 키 (http)
    pub api_key: String,
    /// 폴링 주기 (초, http)
    pub pull_interval_secs: u64,
    /// 한 번에 조회할 최대 로그 수 (http)
    pub nlogs: u32,
    /// 조회 요청 타임아웃 (초, http)
    pub query_timeout_secs: u64,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interface: String::new(),
            source: SourceKind::File,
            log_type: String::new(),
            file_path: String::new(),
            base_url: String::new(),
            api_key: String::new(),
            pull_interval_secs: 120,
            nlogs: 100,
            query_timeout_secs: 30,
        }
    }
}

impl SensorConfig {
    /// 센서 설정의 유효성을 검증합니다.
    fn validate(&self, name: &str) -> Result<(), AlertrelayError> {
        if self.interface.is_empty() {
            return Err(invalid(
                format!("sensors.{name}.interface"),
                "must not be empty",
            ));
        }

        if self.log_type.is_empty() {
            return Err(invalid(
                format!("sensors.{name}.log_type"),
                "must not be empty",
            ));
        }

        match self.source {
            SourceKind::File => {
                if self.file_path.is_empty() {
                    return Err(invalid(
                        format!("sensors.{name}.file_path"),
                        "must not be empty for file sources",
                    ));
                }
            }
            SourceKind::Http => {
                if self.base_url.is_empty() {
                    return Err(invalid(
                        format!("sensors.{name}.base_url"),
                        "must not be empty for http sources",
                    ));
                }
                if self.pull_interval_secs == 0 {
                    return Err(invalid(
                        format!("sensors.{name}.pull_interval_secs"),
                        "must be greater than 0",
                    ));
                }
                if self.nlogs == 0 || self.nlogs > 5000 {
                    return Err(invalid(format!("sensors.{name}.nlogs"), "must be 1-5000"));
                }
                if self.query_timeout_secs == 0 {
                    return Err(invalid(
                        format!("sensors.{name}.query_timeout_secs"),
                        "must be greater than 0",
                    ));
                }
            }
        }

        Ok(())
    }
}

fn invalid(field: impl Into<String>, reason: impl Into<String>) -> AlertrelayError {
    ConfigError::InvalidValue {
        field: field.into(),
        reason: reason.into(),
    }
    .into()
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_u16(target: &mut u16, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u16>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u16 from env var, ignoring"
            ),
        }
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}

fn override_csv(target: &mut Vec<String>, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val
            .split(',')
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .collect();
    }
}
