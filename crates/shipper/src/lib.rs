//! alertrelay 쉬퍼 -- 증분 로그 소비, 체크포인트, 필터, 알림 엔진
//!
//! # 아키텍처
//! ```text
//! CheckpointStore ──(재개 커서)──> SourceAdapter ──RawRecord──> RecordParser
//!        ^                                                          │
//!        │                                                          v
//!        └──────(커서 저장)────── Engine <──── AlertPipeline (filter → enrich → notify)
//! ```
//!
//! # 모듈 구성
//! - [`checkpoint`]: `(센서, 인터페이스) → 커서` 테이블의 원자적 영속화
//! - [`source`]: 파일 tail / HTTP 폴링 소스 어댑터
//! - [`parser`]: 센서별 레코드 파서
//! - [`filter`]: JSON 규칙 기반 알림 억제
//! - [`enrich`]: 역방향 DNS 보강
//! - [`notify`]: 웹훅 알림 채널
//! - [`pipeline`]: 필터 → 보강 → 알림 조합
//! - [`engine`]: 실행 루프와 종료 프로토콜
//! - [`watcher`]: 파일 변경 감시

pub mod checkpoint;
pub mod engine;
pub mod enrich;
pub mod error;
pub mod filter;
pub mod notify;
pub mod parser;
pub mod pipeline;
pub mod source;
pub mod watcher;

pub use checkpoint::{CheckpointStore, CheckpointTable};
pub use engine::{Engine, EngineExit, EngineParts, EngineState, ExitStatus};
pub use error::ShipperError;
pub use filter::AlertFilter;
pub use notify::WebhookNotifier;
pub use pipeline::{AlertPipeline, Disposition};
pub use source::{RawRecord, RecordPayload, SourceAdapter};
pub use watcher::{ChangeWatcher, WatchOutcome, WatcherHandle};
