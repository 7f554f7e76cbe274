//! 에러 타입 -- 도메인별 에러 정의
//!
//! 설정 시점 에러([`ConfigError`], [`FilterError`], [`SourceError::Unreachable`])와
//! 체크포인트 손상([`CheckpointError::Corrupt`])은 기동 시 치명적입니다.
//! 실행 루프 안에서 발생하는 나머지 에러는 [`AlertrelayError`]로 모여
//! 비정상 종료 경로를 트리거합니다.

/// alertrelay 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum AlertrelayError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 체크포인트 저장소 에러
    #[error("checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    /// 로그 소스 에러
    #[error("source error: {0}")]
    Source(#[from] SourceError),

    /// 필터 규칙 에러
    #[error("filter error: {0}")]
    Filter(#[from] FilterError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl AlertrelayError {
    /// 운영자가 설정을 고쳐야 하는 기동 시점 에러인지 확인합니다.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::Filter(_) | Self::Source(SourceError::Unreachable { .. })
        )
    }
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    /// 활성화된 센서가 없음
    #[error("no sensor is enabled, enable exactly one")]
    NoSensorEnabled,

    /// 둘 이상의 센서가 활성화됨
    #[error("{count} sensors enabled ({names}), only one can be enabled")]
    MultipleSensorsEnabled { count: usize, names: String },
}

/// 체크포인트 저장소 에러
#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    /// 저장된 내용이 존재하지만 디코딩할 수 없음
    ///
    /// 기본값(0)으로 되돌리지 않습니다. 중복 전송이나 유실을 가리게 되기 때문입니다.
    #[error("checkpoint file {path} is corrupt: {reason}")]
    Corrupt { path: String, reason: String },

    /// 읽기/쓰기 실패
    #[error("checkpoint file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// 로그 소스 에러
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// 기동 시 원격 엔드포인트에 연결/인증할 수 없음
    #[error("remote log api {endpoint} unreachable: {reason}")]
    Unreachable { endpoint: String, reason: String },

    /// 한 폴링 주기의 조회 실패 (재시도 대상)
    #[error("log query failed: {0}")]
    Query(String),

    /// 로그 파일 I/O 실패
    #[error("log file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// 필터 규칙 에러
#[derive(Debug, thiserror::Error)]
pub enum FilterError {
    /// 규칙 파일 디코딩 실패
    #[error("failed to decode filter rules {path}: {reason}")]
    Decode { path: String, reason: String },

    /// 규칙 유효성 검증 실패
    #[error("invalid filter rule '{rule_id}': {reason}")]
    Invalid { rule_id: String, reason: String },
}
