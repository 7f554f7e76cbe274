//! alertrelay 공통 크레이트 -- 설정, 에러, 도메인 타입, 확장 trait
//!
//! # 모듈 구성
//!
//! - [`config`]: `alertrelay.toml` 파싱, 환경변수 오버라이드, 검증
//! - [`error`]: 도메인 에러 타입
//! - [`types`]: 커서, 체크포인트 키, 정규화된 알림
//! - [`pipeline`]: 알림 채널 trait
//! - [`metrics`]: 메트릭 이름 상수

pub mod config;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod types;

// --- 주요 타입 re-export ---

// 에러
pub use error::{AlertrelayError, CheckpointError, ConfigError, FilterError, SourceError};

// 설정
pub use config::{AlertrelayConfig, SensorConfig};

// 파이프라인 trait
pub use pipeline::{BoxFuture, DynNotifier, Notifier};

// 도메인 타입
pub use types::{CheckpointKey, Cursor, NormalizedAlert, SourceKind};
