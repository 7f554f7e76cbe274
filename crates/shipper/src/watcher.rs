//! 파일 변경 감시 -- 변경 시 프로세스 재실행을 요청합니다.
//!
//! 감시 대상 파일의 수정 시각과 크기를 주기적으로 비교합니다.
//! 변경을 감지하면 공유 취소 토큰을 취소해 엔진의 정상 종료를 유도하고,
//! 변경된 경로를 결과로 돌려줍니다. 실제 재실행은 데몬이 수행합니다.
//!
//! 감시 태스크는 체크포인트 저장소를 건드리지 않습니다.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// 감시 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchOutcome {
    /// 파일이 바뀌어 재실행이 필요함
    Changed(PathBuf),
    /// 변경 없이 중지됨
    Cancelled,
}

/// 파일 상태 (없으면 `None`)
type Fingerprint = Option<(Option<SystemTime>, u64)>;

/// 파일 변경 감시자
#[derive(Debug, Clone)]
pub struct ChangeWatcher {
    paths: Vec<PathBuf>,
    interval: Duration,
}

impl ChangeWatcher {
    /// 감시자를 생성합니다.
    pub fn new(paths: Vec<PathBuf>, interval: Duration) -> Self {
        Self { paths, interval }
    }

    /// 감시 주기
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// 감시 태스크를 시작합니다.
    ///
    /// 변경을 감지하면 `shutdown`을 취소합니다. `shutdown`이 취소되면 감시도 멈춥니다.
    pub fn spawn(self, shutdown: CancellationToken) -> WatcherHandle {
        let stop = shutdown.child_token();
        let grace = self.interval;
        let task = {
            let stop = stop.clone();
            tokio::spawn(async move {
                let outcome = self.watch(&stop).await;
                if matches!(outcome, WatchOutcome::Changed(_)) {
                    shutdown.cancel();
                }
                outcome
            })
        };
        WatcherHandle { stop, task, grace }
    }

    /// 변경이 생기거나 `stop`이 취소될 때까지 감시합니다.
    pub async fn watch(&self, stop: &CancellationToken) -> WatchOutcome {
        let mut baseline = Vec::with_capacity(self.paths.len());
        for path in &self.paths {
            baseline.push(fingerprint(path).await);
        }
        tracing::info!(
            files = self.paths.len(),
            interval_secs = self.interval.as_secs(),
            "watching files for changes"
        );

        loop {
            tokio::select! {
                () = stop.cancelled() => return WatchOutcome::Cancelled,
                () = tokio::time::sleep(self.interval) => {}
            }

            for (path, before) in self.paths.iter().zip(&baseline) {
                if fingerprint(path).await != *before {
                    tracing::info!(path = %path.display(), "watched file changed, requesting restart");
                    return WatchOutcome::Changed(path.clone());
                }
            }
        }
    }
}

async fn fingerprint(path: &Path) -> Fingerprint {
    let meta = tokio::fs::metadata(path).await.ok()?;
    Some((meta.modified().ok(), meta.len()))
}

/// 실행 중인 감시 태스크 핸들
pub struct WatcherHandle {
    stop: CancellationToken,
    task: JoinHandle<WatchOutcome>,
    grace: Duration,
}

impl WatcherHandle {
    /// 감시를 멈추고 최대 감시 주기만큼 종료를 기다립니다.
    ///
    /// 변경이 감지되어 멈춘 경우 변경된 경로를 반환합니다.
    pub async fn finish(self) -> Option<PathBuf> {
        self.stop.cancel();
        match tokio::time::timeout(self.grace, self.task).await {
            Ok(Ok(WatchOutcome::Changed(path))) => Some(path),
            Ok(Ok(WatchOutcome::Cancelled)) => None,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "watcher task failed");
                None
            }
            Err(_) => {
                tracing::warn!(
                    grace_secs = self.grace.as_secs(),
                    "watcher did not stop in time, continuing shutdown"
                );
                None
            }
        }
    }
}
