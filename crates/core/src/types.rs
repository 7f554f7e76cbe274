//! 도메인 타입 -- 시스템 전역에서 사용되는 공통 타입
//!
//! 소스 어댑터, 체크포인트 저장소, 알림 파이프라인이 공유하는
//! 데이터 구조를 정의합니다.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// 재개 가능한 진행 위치
///
/// 파일 소스에서는 바이트 오프셋, HTTP 소스에서는 마지막으로 처리한 시퀀스 번호입니다.
/// 체크포인트 파일에는 부호 없는 정수 그대로 저장됩니다.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Cursor(pub u64);

impl Cursor {
    /// 처음부터 읽는 위치
    pub const START: Cursor = Cursor(0);

    /// 내부 값을 반환합니다.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl From<u64> for Cursor {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 체크포인트 키 -- (센서 이름, 인터페이스 이름)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CheckpointKey {
    /// 센서 이름 (`[sensors.<name>]`의 키)
    pub sensor: String,
    /// 인터페이스 이름
    pub interface: String,
}

impl CheckpointKey {
    /// 새 키를 생성합니다.
    pub fn new(sensor: impl Into<String>, interface: impl Into<String>) -> Self {
        Self {
            sensor: sensor.into(),
            interface: interface.into(),
        }
    }
}

impl fmt::Display for CheckpointKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.sensor, self.interface)
    }
}

/// 로그 소스 유형
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// 로컬 로그 파일 tail
    #[default]
    File,
    /// 원격 로그 조회 API 폴링
    Http,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File => write!(f, "file"),
            Self::Http => write!(f, "http"),
        }
    }
}

/// 정규화된 알림
///
/// 파서가 원시 레코드마다 새로 만들고, 역방향 DNS 보강이 `src`/`dest`를
/// 제자리에서 수정한 뒤 알림 채널로 전달됩니다.
/// 센서별 필드(`signature`, `severity` 등)는 `fields`에 평탄화되어 직렬화됩니다.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedAlert {
    /// 출발지 주소
    pub src: String,
    /// 목적지 주소
    pub dest: String,
    /// 수신 인터페이스 (엔진이 채움)
    #[serde(default)]
    pub interface: String,
    /// 원격 API 시퀀스 번호 (HTTP 소스 전용)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seqno: Option<u64>,
    /// 센서별 추가 필드
    #[serde(flatten)]
    pub fields: BTreeMap<String, serde_json::Value>,
}

impl NormalizedAlert {
    /// 출발지/목적지로 새 알림을 생성합니다.
    pub fn new(src: impl Into<String>, dest: impl Into<String>) -> Self {
        Self {
            src: src.into(),
            dest: dest.into(),
            ..Self::default()
        }
    }

    /// 센서별 필드를 추가합니다.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// 필드 이름으로 문자열 값을 조회합니다.
    ///
    /// 숫자와 불리언은 JSON 표기 그대로 문자열화합니다.
    /// 객체/배열/null 값은 `None`입니다.
    pub fn field_value(&self, field: &str) -> Option<Cow<'_, str>> {
        match field {
            "src" => Some(Cow::Borrowed(self.src.as_str())),
            "dest" => Some(Cow::Borrowed(self.dest.as_str())),
            "interface" => Some(Cow::Borrowed(self.interface.as_str())),
            "seqno" => self.seqno.map(|s| Cow::Owned(s.to_string())),
            _ => match self.fields.get(field)? {
                serde_json::Value::String(s) => Some(Cow::Borrowed(s.as_str())),
                serde_json::Value::Number(n) => Some(Cow::Owned(n.to_string())),
                serde_json::Value::Bool(b) => Some(Cow::Owned(b.to_string())),
                _ => None,
            },
        }
    }

    /// 알림 본문으로 쓰이는 JSON 객체로 변환합니다.
    pub fn to_message(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|_| serde_json::Value::Null)
    }
}

impl fmt::Display for NormalizedAlert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {} ({})", self.src, self.dest, self.interface)?;
        if let Some(seqno) = self.seqno {
            write!(f, " seqno={seqno}")?;
        }
        Ok(())
    }
}
