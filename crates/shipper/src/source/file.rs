//! 파일 tail 어댑터 -- 바이트 오프셋 커서
//!
//! `tail -f`처럼 파일 끝에 추가되는 줄을 읽습니다.
//!
//! # 동작
//! 1. 매 반복마다 열린 디스크립터의 현재 크기를 확인합니다.
//! 2. 크기가 현재 오프셋보다 작으면 truncation/rotation으로 보고 오프셋을 0으로 되돌립니다.
//! 3. 오프셋으로 seek 후 한 줄을 읽습니다. 줄바꿈으로 끝나는 완전한 줄만 내보냅니다.
//! 4. 읽을 줄이 없으면 경로의 inode가 열린 파일과 같은지 확인합니다.
//!    다르면 (logrotate의 rename 후 재생성) 새 파일을 열고 오프셋 0부터 읽습니다.
//!    옛 파일에 남은 줄은 이미 다 읽은 뒤입니다.
//! 5. 그래도 읽을 줄이 없으면 고정 백오프만큼 대기하고 오프셋은 그대로 둡니다.
//!
//! 파일은 어댑터가 닫지 않습니다. 디스크립터는 어댑터와 함께 엔진이 소유합니다.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncSeekExt, BufReader, SeekFrom};
use tokio_util::sync::CancellationToken;

use alertrelay_core::error::SourceError;
use alertrelay_core::metrics as m;
use alertrelay_core::types::Cursor;

use super::RawRecord;

/// 새 줄이 없을 때의 기본 대기 시간
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(1);

/// 파일 tail 어댑터
pub struct FileTail {
    path: PathBuf,
    reader: BufReader<File>,
    /// 마지막으로 내보낸 줄 바로 뒤의 오프셋
    offset: u64,
    /// 리더의 실제 파일 위치
    reader_pos: u64,
    /// 엔진이 처리 완료를 확인한 커서
    committed: Cursor,
    backoff: Duration,
    /// 열린 파일의 (장치, inode). inode가 없는 플랫폼에서는 `None`
    identity: Option<(u64, u64)>,
}

#[cfg(unix)]
fn file_identity(meta: &std::fs::Metadata) -> Option<(u64, u64)> {
    use std::os::unix::fs::MetadataExt;
    Some((meta.dev(), meta.ino()))
}

#[cfg(not(unix))]
fn file_identity(_meta: &std::fs::Metadata) -> Option<(u64, u64)> {
    None
}

impl FileTail {
    /// 파일을 열고 `start` 오프셋부터 읽을 준비를 합니다.
    pub async fn open(path: impl Into<PathBuf>, start: Cursor) -> Result<Self, SourceError> {
        let path = path.into();
        let io_error = |source: std::io::Error| SourceError::Io {
            path: path.display().to_string(),
            source,
        };
        let file = File::open(&path).await.map_err(io_error)?;
        let identity = file_identity(&file.metadata().await.map_err(io_error)?);

        tracing::info!(
            path = %path.display(),
            offset = start.get(),
            "tailing log file"
        );

        Ok(Self {
            path,
            reader: BufReader::new(file),
            offset: start.get(),
            reader_pos: 0,
            committed: start,
            backoff: DEFAULT_BACKOFF,
            identity,
        })
    }

    /// 새 줄이 없을 때의 대기 시간을 설정합니다.
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// tail 중인 파일 경로
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 다음 완전한 줄을 읽습니다. 취소되면 `Ok(None)`을 반환합니다.
    pub async fn next_line(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<Option<RawRecord>, SourceError> {
        loop {
            if cancel.is_cancelled() {
                return Ok(None);
            }

            if let Some(record) = self.try_read_line().await? {
                return Ok(Some(record));
            }
            if self.reopen_if_rotated().await? {
                continue;
            }

            tokio::select! {
                () = cancel.cancelled() => return Ok(None),
                () = tokio::time::sleep(self.backoff) => {}
            }
        }
    }

    /// 한 번의 tail 반복. 완전한 줄이 없으면 `Ok(None)`입니다.
    async fn try_read_line(&mut self) -> Result<Option<RawRecord>, SourceError> {
        let len = self
            .reader
            .get_ref()
            .metadata()
            .await
            .map_err(|e| self.io_error(e))?
            .len();

        if len < self.offset {
            tracing::warn!(
                path = %self.path.display(),
                offset = self.offset,
                size = len,
                "log file shrank, assuming truncation and reading from the start"
            );
            metrics::counter!(m::SOURCE_TRUNCATIONS_TOTAL).increment(1);
            self.offset = 0;
        }

        if len == self.offset {
            return Ok(None);
        }

        if self.reader_pos != self.offset {
            self.reader
                .seek(SeekFrom::Start(self.offset))
                .await
                .map_err(|e| self.io_error(e))?;
            self.reader_pos = self.offset;
        }

        let mut buf = Vec::new();
        let read = self
            .reader
            .read_until(b'\n', &mut buf)
            .await
            .map_err(|e| self.io_error(e))?;
        self.reader_pos += read as u64;

        if !buf.ends_with(b"\n") {
            // 쓰는 중인 줄은 줄바꿈이 붙을 때까지 기다림
            return Ok(None);
        }

        self.offset = self.reader_pos;
        let line = String::from_utf8_lossy(&buf);
        let line = line.trim_end_matches(['\n', '\r']);

        metrics::counter!(m::RECORDS_READ_TOTAL, m::LABEL_SOURCE => "file").increment(1);
        Ok(Some(RawRecord::line(line, Cursor(self.offset))))
    }

    /// 경로가 다른 파일을 가리키면 새 파일로 바꿔 엽니다.
    ///
    /// 바꿨으면 `true`입니다. 경로에 아직 새 파일이 없으면 옛 파일을 계속 읽습니다.
    async fn reopen_if_rotated(&mut self) -> Result<bool, SourceError> {
        let Some(current) = self.identity else {
            return Ok(false);
        };

        let meta = match tokio::fs::metadata(&self.path).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(self.io_error(e)),
        };
        let Some(identity) = file_identity(&meta) else {
            return Ok(false);
        };
        if identity == current {
            return Ok(false);
        }

        let file = match File::open(&self.path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(self.io_error(e)),
        };
        // 경로가 아니라 실제로 연 파일의 inode를 기록
        let opened = file.metadata().await.map_err(|e| self.io_error(e))?;

        tracing::warn!(
            path = %self.path.display(),
            offset = self.offset,
            "log file replaced, reading the new file from the start"
        );
        metrics::counter!(m::SOURCE_TRUNCATIONS_TOTAL).increment(1);

        self.reader = BufReader::new(file);
        self.identity = file_identity(&opened);
        self.offset = 0;
        self.reader_pos = 0;
        Ok(true)
    }

    /// 처리 완료된 커서를 확정합니다.
    pub fn commit(&mut self, cursor: Cursor) {
        self.committed = cursor;
    }

    /// 마지막으로 확정된 커서
    pub fn position(&self) -> Cursor {
        self.committed
    }

    fn io_error(&self, source: std::io::Error) -> SourceError {
        SourceError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }
}
