//! 엔진 -- 실행 루프와 종료 프로토콜
//!
//! # 상태 전이
//! ```text
//! Startup -> Running -> ShuttingDown  -> Exited (성공)
//!                    \-> ErrorShutdown -> Exited (실패)
//! ```
//!
//! # 실행 루프
//! 1. 소스 어댑터에서 다음 작업 단위를 가져옵니다.
//! 2. 레코드마다 파서를 실행합니다. 알림이 아니면 건너뜁니다.
//! 3. 알림이면 인터페이스를 붙여 파이프라인(필터 → 보강 → 알림)에 넘깁니다.
//! 4. 결과와 무관하게 레코드의 커서를 확정하고 체크포인트를 저장합니다.
//!
//! 커서는 레코드 처리가 끝난 뒤에만 저장되므로 크래시 후 재시작하면
//! 마지막으로 저장된 레코드 다음부터 다시 읽습니다 (at-least-once).
//!
//! # 종료
//! - 취소 토큰(시그널 또는 파일 변경 감시)에 의한 종료: 최종 커서 저장, 필터 통계,
//!   감시 태스크 정리 후 성공 상태로 종료합니다.
//! - 예기치 않은 에러: 실패 알림을 시도하고 커서는 저장하지 않습니다.
//!   필터 통계와 감시 태스크 정리 후 실패 상태로 종료합니다.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use alertrelay_core::config::AlertrelayConfig;
use alertrelay_core::metrics as m;
use alertrelay_core::pipeline::DynNotifier;
use alertrelay_core::types::{CheckpointKey, Cursor, SourceKind};

use crate::checkpoint::CheckpointStore;
use crate::enrich::ReverseDnsEnricher;
use crate::error::ShipperError;
use crate::filter::AlertFilter;
use crate::parser::{RecordParser, parser_for};
use crate::pipeline::AlertPipeline;
use crate::source::{FileTail, HttpPoll, PanOsClient, RawRecord, SourceAdapter};
use crate::watcher::WatcherHandle;

/// 실패 알림 제목
pub const FAILURE_TITLE: &str = "Unexpected error Event";

/// 엔진 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// 구성 중
    Startup,
    /// 실행 루프 동작 중
    Running,
    /// 취소 요청에 의한 정상 종료 중
    ShuttingDown,
    /// 예기치 않은 에러로 종료 중
    ErrorShutdown,
    /// 종료됨
    Exited,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Startup => "startup",
            Self::Running => "running",
            Self::ShuttingDown => "shutting_down",
            Self::ErrorShutdown => "error_shutdown",
            Self::Exited => "exited",
        };
        f.write_str(name)
    }
}

/// 종료 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    /// 정상 종료 (프로세스 종료 코드 0)
    Graceful,
    /// 실패 (프로세스 종료 코드 1)
    Failed,
}

/// 엔진 실행 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineExit {
    /// 종료 상태
    pub status: ExitStatus,
    /// 파일 변경으로 재실행이 요청된 경우, 변경된 경로
    pub restart: Option<PathBuf>,
}

/// 엔진 구성 요소
///
/// [`Engine::build`]가 설정으로부터 조립하며, 테스트에서는 직접 채워 넣을 수 있습니다.
pub struct EngineParts {
    /// 활성 센서 이름
    pub sensor: String,
    /// 활성 체크포인트 키
    pub key: CheckpointKey,
    /// 체크포인트 저장소
    pub store: CheckpointStore,
    /// 소스 어댑터
    pub source: SourceAdapter,
    /// 레코드 파서
    pub parser: Box<dyn RecordParser>,
    /// 알림 파이프라인
    pub pipeline: AlertPipeline,
    /// 필터 통계 파일 경로
    pub filter_stats_path: PathBuf,
}

/// 실행 엔진
pub struct Engine {
    sensor: String,
    key: CheckpointKey,
    store: CheckpointStore,
    source: SourceAdapter,
    parser: Box<dyn RecordParser>,
    pipeline: AlertPipeline,
    filter_stats_path: PathBuf,
    watcher: Option<WatcherHandle>,
    state: EngineState,
}

impl Engine {
    /// 설정으로부터 엔진을 조립합니다.
    ///
    /// 활성 센서 확인, 체크포인트 로드, 활성 키 보장, 파서 선택, 필터 로드,
    /// 소스 어댑터 연결 순서로 진행하며 하나라도 실패하면 기동 실패입니다.
    pub async fn build(
        config: &AlertrelayConfig,
        notifier: Option<Arc<dyn DynNotifier>>,
    ) -> Result<Self, ShipperError> {
        let (name, sensor) = config.enabled_sensor()?;
        tracing::info!(
            sensor = name,
            interface = %sensor.interface,
            source = %sensor.source,
            log_type = %sensor.log_type,
            "enabled sensor"
        );

        let store = CheckpointStore::new(
            &config.general.state_file,
            config.default_checkpoint_keys(),
        );
        let key = CheckpointKey::new(name, sensor.interface.clone());
        let start = store.ensure_key(&key)?;

        let parser = parser_for(name, &sensor.log_type)?;

        let mut pipeline = AlertPipeline::new(name);
        if config.filter.enabled {
            pipeline = pipeline.with_filter(AlertFilter::load(&config.filter.path).await?);
        } else {
            tracing::info!("alert filter disabled");
        }
        if config.general.reverse_dns {
            let timeout = Duration::from_secs(config.general.reverse_dns_timeout_secs);
            pipeline = pipeline.with_enricher(ReverseDnsEnricher::system(timeout)?);
        }
        if let Some(notifier) = notifier {
            pipeline = pipeline.with_notifier(notifier);
        }

        let source = match sensor.source {
            SourceKind::File => SourceAdapter::File(FileTail::open(&sensor.file_path, start).await?),
            SourceKind::Http => {
                let client = PanOsClient::connect(sensor).await?;
                SourceAdapter::Http(HttpPoll::new(
                    Box::new(client),
                    start,
                    Duration::from_secs(sensor.pull_interval_secs),
                ))
            }
        };

        Ok(Self::from_parts(EngineParts {
            sensor: name.to_owned(),
            key,
            store,
            source,
            parser,
            pipeline,
            filter_stats_path: PathBuf::from(&config.filter.stats_path),
        }))
    }

    /// 구성 요소로 엔진을 생성합니다.
    pub fn from_parts(parts: EngineParts) -> Self {
        Self {
            sensor: parts.sensor,
            key: parts.key,
            store: parts.store,
            source: parts.source,
            parser: parts.parser,
            pipeline: parts.pipeline,
            filter_stats_path: parts.filter_stats_path,
            watcher: None,
            state: EngineState::Startup,
        }
    }

    /// 종료 시 함께 정리할 감시 태스크를 등록합니다.
    pub fn with_watcher(mut self, watcher: WatcherHandle) -> Self {
        self.watcher = Some(watcher);
        self
    }

    /// 현재 상태
    pub fn state(&self) -> EngineState {
        self.state
    }

    /// 활성 체크포인트 키
    pub fn key(&self) -> &CheckpointKey {
        &self.key
    }

    /// 취소되거나 예기치 않은 에러가 날 때까지 실행합니다.
    pub async fn run(mut self, cancel: &CancellationToken) -> EngineExit {
        self.enter(EngineState::Running);
        tracing::info!(
            key = %self.key,
            source = %self.source.kind(),
            cursor = self.source.position().get(),
            "consuming alerts"
        );

        let exit = match self.run_loop(cancel).await {
            Ok(()) => {
                self.enter(EngineState::ShuttingDown);
                self.shutdown_gracefully().await
            }
            Err(err) => {
                self.enter(EngineState::ErrorShutdown);
                self.shutdown_on_error(err).await
            }
        };

        self.enter(EngineState::Exited);
        exit
    }

    async fn run_loop(&mut self, cancel: &CancellationToken) -> Result<(), ShipperError> {
        loop {
            let Some(unit) = self.source.next_unit(cancel).await? else {
                return Ok(());
            };

            for record in unit {
                self.process(record).await?;
                if cancel.is_cancelled() {
                    return Ok(());
                }
            }
        }
    }

    /// 레코드 하나를 처리하고 커서를 저장합니다.
    async fn process(&mut self, record: RawRecord) -> Result<(), ShipperError> {
        match self.parser.parse(&record.payload) {
            Some(mut alert) => {
                alert.interface.clone_from(&self.key.interface);
                let disposition = self.pipeline.handle(alert).await;
                tracing::debug!(cursor = record.cursor.get(), ?disposition, "alert handled");
            }
            None => {
                metrics::counter!(m::RECORDS_SKIPPED_TOTAL, m::LABEL_SENSOR => self.sensor.clone())
                    .increment(1);
                tracing::trace!(cursor = record.cursor.get(), "record skipped");
            }
        }

        self.checkpoint(record.cursor)
    }

    fn checkpoint(&mut self, cursor: Cursor) -> Result<(), ShipperError> {
        self.store.advance(&self.key, cursor)?;
        self.source.commit(cursor);
        Ok(())
    }

    async fn shutdown_gracefully(&mut self) -> EngineExit {
        let position = self.source.position();
        let status = match self.store.advance(&self.key, position) {
            Ok(()) => {
                tracing::info!(key = %self.key, cursor = position.get(), "final checkpoint saved");
                ExitStatus::Graceful
            }
            Err(e) => {
                tracing::error!(key = %self.key, error = %e, "failed to save final checkpoint");
                ExitStatus::Failed
            }
        };

        self.pipeline.emit_filter_stats(&self.filter_stats_path);
        let restart = self.stop_watcher().await;

        EngineExit { status, restart }
    }

    async fn shutdown_on_error(&mut self, err: ShipperError) -> EngineExit {
        let chain = error_chain(&err);
        tracing::error!(
            key = %self.key,
            error = %chain,
            "unexpected error, shutting down without saving the current position"
        );

        if let Some(notifier) = self.pipeline.notifier() {
            let message = format!(
                "An unexpected error has occurred! Check logs! Shutting down..\n{chain}"
            );
            notifier
                .send_notification(serde_json::Value::String(message), FAILURE_TITLE)
                .await;
        }

        self.pipeline.emit_filter_stats(&self.filter_stats_path);
        // 에러 경로에서는 재실행하지 않음
        let _ = self.stop_watcher().await;

        EngineExit {
            status: ExitStatus::Failed,
            restart: None,
        }
    }

    async fn stop_watcher(&mut self) -> Option<PathBuf> {
        match self.watcher.take() {
            Some(watcher) => watcher.finish().await,
            None => None,
        }
    }

    fn enter(&mut self, next: EngineState) {
        tracing::info!(from = %self.state, to = %next, "engine state");
        self.state = next;
    }
}

/// 에러와 그 원인들을 한 문자열로 이어 붙입니다.
pub fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        out.push_str("\ncaused by: ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use alertrelay_core::error::{CheckpointError, SourceError};

    #[test]
    fn error_chain_includes_sources() {
        let err = ShipperError::Checkpoint(CheckpointError::Io {
            path: "checkpoints.json".to_owned(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        });
        let chain = error_chain(&err);
        assert!(chain.contains("checkpoints.json"));
        assert!(chain.contains("caused by: denied"));
    }

    #[test]
    fn error_chain_single_error() {
        let err = ShipperError::Source(SourceError::Query("boom".to_owned()));
        assert_eq!(error_chain(&err), "log query failed: boom");
    }

    #[test]
    fn state_display() {
        assert_eq!(EngineState::ErrorShutdown.to_string(), "error_shutdown");
    }
}
