//! 로그 소스 어댑터 -- 재개 가능한 커서와 함께 원시 레코드를 공급합니다.
//!
//! # 변형
//! - [`FileTail`]: 로컬 로그 파일을 바이트 오프셋 커서로 tail
//! - [`HttpPoll`]: 원격 로그 조회 API를 시퀀스 번호 커서로 폴링
//!
//! 엔진은 두 변형을 [`SourceAdapter`] 하나의 계약으로만 다룹니다.
//! "다음 작업 단위와 그 재개 커서를 달라"는 [`SourceAdapter::next_unit`]이 전부입니다.
//!
//! # 커서 커밋
//! 어댑터는 레코드를 내보낸다고 커서를 확정하지 않습니다.
//! 엔진이 레코드 처리를 마친 뒤 [`SourceAdapter::commit`]을 호출해야
//! [`SourceAdapter::position`]이 앞으로 이동합니다.

pub mod file;
pub mod http;
pub mod xml;

pub use file::FileTail;
pub use http::{DynLogQueryClient, HttpPoll, LogQueryClient, PanOsClient};

use tokio_util::sync::CancellationToken;

use alertrelay_core::error::SourceError;
use alertrelay_core::types::{Cursor, SourceKind};

/// 원시 레코드 내용
#[derive(Debug, Clone, PartialEq)]
pub enum RecordPayload {
    /// 파일에서 읽은 한 줄 (줄바꿈 제외)
    Line(String),
    /// 원격 API에서 받은 로그 항목 하나
    Entry(serde_json::Value),
}

/// 소스에서 꺼낸 레코드 하나와, 처리 후 저장해야 할 커서
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    /// 레코드 내용
    pub payload: RecordPayload,
    /// 이 레코드 바로 뒤에서 재개할 수 있는 커서
    pub cursor: Cursor,
}

impl RawRecord {
    /// 텍스트 줄 레코드를 생성합니다.
    pub fn line(line: impl Into<String>, cursor: Cursor) -> Self {
        Self {
            payload: RecordPayload::Line(line.into()),
            cursor,
        }
    }

    /// 로그 항목 레코드를 생성합니다.
    pub fn entry(entry: serde_json::Value, cursor: Cursor) -> Self {
        Self {
            payload: RecordPayload::Entry(entry),
            cursor,
        }
    }
}

/// 활성 소스 어댑터
pub enum SourceAdapter {
    /// 로컬 파일 tail
    File(FileTail),
    /// 원격 API 폴링
    Http(HttpPoll),
}

impl SourceAdapter {
    /// 소스 유형
    pub fn kind(&self) -> SourceKind {
        match self {
            Self::File(_) => SourceKind::File,
            Self::Http(_) => SourceKind::Http,
        }
    }

    /// 다음 작업 단위를 가져옵니다.
    ///
    /// 파일 소스는 레코드 하나, HTTP 소스는 seqno 오름차순으로 정렬된 배치 하나를
    /// 반환합니다. 새 데이터가 생길 때까지 대기하며, 취소되면 `Ok(None)`입니다.
    pub async fn next_unit(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<Option<Vec<RawRecord>>, SourceError> {
        match self {
            Self::File(tail) => Ok(tail.next_line(cancel).await?.map(|record| vec![record])),
            Self::Http(poll) => poll.next_batch(cancel).await,
        }
    }

    /// 처리가 끝난 레코드의 커서를 확정합니다.
    pub fn commit(&mut self, cursor: Cursor) {
        match self {
            Self::File(tail) => tail.commit(cursor),
            Self::Http(poll) => poll.commit(cursor),
        }
    }

    /// 마지막으로 확정된 커서
    pub fn position(&self) -> Cursor {
        match self {
            Self::File(tail) => tail.position(),
            Self::Http(poll) => poll.position(),
        }
    }
}
