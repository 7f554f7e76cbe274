//! 체크포인트 저장소 -- `(센서, 인터페이스) → 커서` 영속화
//!
//! 전체 테이블을 JSON 파일 하나에 저장합니다.
//!
//! ```json
//! {"suricata": {"eth0": 18234}, "paloalto": {"ethernet1/1": 30334}}
//! ```
//!
//! # 원자성
//! 저장은 항상 같은 디렉토리의 임시 파일에 쓰고 `fsync` 후 rename으로 교체합니다.
//! 쓰기 도중 크래시가 나도 이전의 유효한 파일이 남습니다.
//!
//! # 손상 처리
//! 파일이 없거나 비어 있으면 모든 센서에 커서 0을 채운 기본 테이블을 만들고 저장합니다.
//! 내용이 있지만 디코딩할 수 없으면 [`CheckpointError::Corrupt`]를 반환합니다.
//! 조용히 0으로 되돌리지 않습니다.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use alertrelay_core::error::CheckpointError;
use alertrelay_core::metrics as m;
use alertrelay_core::types::{CheckpointKey, Cursor};

/// 체크포인트 테이블 -- 영속 상태 전체
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CheckpointTable {
    sensors: BTreeMap<String, BTreeMap<String, Cursor>>,
}

impl CheckpointTable {
    /// 빈 테이블을 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 주어진 모든 키에 커서 0을 채운 테이블을 생성합니다.
    pub fn with_defaults<'a>(keys: impl IntoIterator<Item = &'a CheckpointKey>) -> Self {
        let mut table = Self::new();
        for key in keys {
            table.set(key, Cursor::START);
        }
        table
    }

    /// 키의 커서를 조회합니다.
    pub fn get(&self, key: &CheckpointKey) -> Option<Cursor> {
        self.sensors
            .get(&key.sensor)
            .and_then(|interfaces| interfaces.get(&key.interface))
            .copied()
    }

    /// 키의 커서를 설정합니다. 다른 항목은 건드리지 않습니다.
    pub fn set(&mut self, key: &CheckpointKey, cursor: Cursor) {
        self.sensors
            .entry(key.sensor.clone())
            .or_default()
            .insert(key.interface.clone(), cursor);
    }

    /// 키가 존재하는지 확인합니다.
    pub fn contains(&self, key: &CheckpointKey) -> bool {
        self.get(key).is_some()
    }

    /// 전체 항목 수를 반환합니다.
    pub fn len(&self) -> usize {
        self.sensors.values().map(BTreeMap::len).sum()
    }

    /// 항목이 하나도 없는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// 체크포인트 저장소
///
/// 실행 루프 하나만 쓰기를 수행합니다. 같은 파일을 두 프로세스가 공유하는 것은
/// 지원하지 않습니다.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    /// 체크포인트 파일 경로
    path: PathBuf,
    /// 파일이 없을 때 커서 0으로 채울 키 목록
    default_keys: Vec<CheckpointKey>,
}

impl CheckpointStore {
    /// 새 저장소를 생성합니다. 파일은 `load()` 시점에 읽습니다.
    pub fn new(path: impl Into<PathBuf>, default_keys: Vec<CheckpointKey>) -> Self {
        Self {
            path: path.into(),
            default_keys,
        }
    }

    /// 체크포인트 파일 경로를 반환합니다.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 전체 테이블을 읽습니다.
    ///
    /// 파일이 없거나 비어 있으면 기본 테이블을 만들어 저장한 뒤 반환합니다.
    pub fn load(&self) -> Result<CheckpointTable, CheckpointError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(self.io_error(e)),
        };

        if content.trim().is_empty() {
            tracing::info!(
                path = %self.path.display(),
                sensors = self.default_keys.len(),
                "checkpoint file missing or empty, creating defaults"
            );
            let table = CheckpointTable::with_defaults(&self.default_keys);
            self.save(&table)?;
            return Ok(table);
        }

        serde_json::from_str(&content).map_err(|e| CheckpointError::Corrupt {
            path: self.path.display().to_string(),
            reason: e.to_string(),
        })
    }

    /// 전체 테이블을 원자적으로 덮어씁니다.
    pub fn save(&self, table: &CheckpointTable) -> Result<(), CheckpointError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let bytes = serde_json::to_vec(table).map_err(|e| {
            self.io_error(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        })?;

        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| self.io_error(e))?;
        tmp.write_all(&bytes).map_err(|e| self.io_error(e))?;
        tmp.as_file().sync_all().map_err(|e| self.io_error(e))?;
        tmp.persist(&self.path)
            .map_err(|e| self.io_error(e.error))?;

        metrics::counter!(m::CHECKPOINTS_SAVED_TOTAL).increment(1);
        Ok(())
    }

    /// 키가 없으면 커서 0으로 추가합니다.
    ///
    /// 운영자가 활성 센서의 인터페이스를 바꾼 경우 등에 사용합니다.
    /// 다른 항목(이전 센서의 오래된 키 포함)은 그대로 둡니다.
    pub fn ensure_key(&self, key: &CheckpointKey) -> Result<Cursor, CheckpointError> {
        let mut table = self.load()?;
        if let Some(cursor) = table.get(key) {
            return Ok(cursor);
        }

        tracing::info!(key = %key, "adding new checkpoint key");
        table.set(key, Cursor::START);
        self.save(&table)?;
        Ok(Cursor::START)
    }

    /// 키의 커서를 갱신합니다 (전체 읽기 → 수정 → 전체 쓰기).
    pub fn advance(&self, key: &CheckpointKey, cursor: Cursor) -> Result<(), CheckpointError> {
        let mut table = self.load()?;
        table.set(key, cursor);
        self.save(&table)?;

        #[allow(clippy::cast_precision_loss)]
        metrics::gauge!(m::CURSOR_POSITION).set(cursor.get() as f64);
        tracing::trace!(key = %key, cursor = cursor.get(), "checkpoint saved");
        Ok(())
    }

    fn io_error(&self, source: std::io::Error) -> CheckpointError {
        CheckpointError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }
}
