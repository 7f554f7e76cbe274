//! 쉬퍼 에러 타입
//!
//! [`ShipperError`]는 체크포인트, 소스 어댑터, 필터, 엔진 내부에서 발생하는
//! 모든 에러를 표현합니다. `From<ShipperError> for AlertrelayError` 변환이
//! 구현되어 있어 데몬에서 `?` 연산자로 자연스럽게 전파할 수 있습니다.

use alertrelay_core::error::{
    AlertrelayError, CheckpointError, ConfigError, FilterError, SourceError,
};

/// 쉬퍼 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum ShipperError {
    /// 체크포인트 저장소 에러 (손상 포함)
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),

    /// 소스 어댑터 에러
    #[error(transparent)]
    Source(#[from] SourceError),

    /// 필터 규칙 에러
    #[error(transparent)]
    Filter(#[from] FilterError),

    /// 설정 에러
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// 센서/로그 유형 조합에 해당하는 파서가 없음
    #[error("no parser for sensor '{sensor}' log type '{log_type}'")]
    UnsupportedLogType {
        /// 센서 유형
        sensor: String,
        /// 로그 하위 유형
        log_type: String,
    },

    /// 알림 채널 구성 실패
    #[error("notifier error: {0}")]
    Notifier(String),

    /// 역방향 DNS 리졸버 구성 실패
    #[error("resolver error: {0}")]
    Resolver(String),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ShipperError> for AlertrelayError {
    fn from(err: ShipperError) -> Self {
        match err {
            ShipperError::Checkpoint(e) => AlertrelayError::Checkpoint(e),
            ShipperError::Source(e) => AlertrelayError::Source(e),
            ShipperError::Filter(e) => AlertrelayError::Filter(e),
            ShipperError::Config(e) => AlertrelayError::Config(e),
            ShipperError::UnsupportedLogType { sensor, log_type } => {
                AlertrelayError::Config(ConfigError::InvalidValue {
                    field: format!("sensors.{sensor}.log_type"),
                    reason: format!("unsupported log type '{log_type}'"),
                })
            }
            ShipperError::Notifier(reason) => AlertrelayError::Config(ConfigError::InvalidValue {
                field: "notify".to_owned(),
                reason,
            }),
            ShipperError::Resolver(reason) => {
                AlertrelayError::Config(ConfigError::InvalidValue {
                    field: "general.reverse_dns".to_owned(),
                    reason,
                })
            }
            ShipperError::Io(e) => AlertrelayError::Io(e),
        }
    }
}
