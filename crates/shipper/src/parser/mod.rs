//! 레코드 파서 -- 원시 레코드를 정규화된 알림 또는 "건너뜀"으로 변환
//!
//! 파서는 `(센서 유형, 로그 유형)` 조합으로 선택됩니다.
//! 센서 유형은 설정의 `[sensors.<name>]` 키입니다.
//!
//! | 센서       | 로그 유형 | 파서 |
//! |------------|-----------|------|
//! | `suricata` | `eve`     | [`SuricataEveParser`] |
//! | `suricata` | `fast`    | [`FastLogParser::suricata`] |
//! | `snort`    | `fast`    | [`FastLogParser::snort`] |
//! | `paloalto` | `threat`  | [`PaloAltoThreatParser`] |
//!
//! 파서는 순수 함수입니다. 커서를 건드리지 않고, 잘못된 입력은 에러 대신 `None`을 반환합니다.

pub mod fast;
pub mod paloalto;
pub mod suricata;

pub use fast::FastLogParser;
pub use paloalto::PaloAltoThreatParser;
pub use suricata::SuricataEveParser;

use alertrelay_core::types::NormalizedAlert;

use crate::error::ShipperError;
use crate::source::RecordPayload;

/// 레코드 파서 trait
pub trait RecordParser: Send + Sync {
    /// 파서 이름 (예: `"suricata-eve"`)
    fn name(&self) -> &str;

    /// 레코드 하나를 파싱합니다. 알림이 아니거나 형식이 맞지 않으면 `None`입니다.
    fn parse(&self, payload: &RecordPayload) -> Option<NormalizedAlert>;
}

/// 지원하는 `(센서 유형, 로그 유형)` 조합
pub const SUPPORTED: &[(&str, &str)] = &[
    ("suricata", "eve"),
    ("suricata", "fast"),
    ("snort", "fast"),
    ("paloalto", "threat"),
];

/// 센서/로그 유형에 맞는 파서를 생성합니다.
pub fn parser_for(sensor: &str, log_type: &str) -> Result<Box<dyn RecordParser>, ShipperError> {
    let parser: Box<dyn RecordParser> = match (sensor, log_type) {
        ("suricata", "eve") => Box::new(SuricataEveParser),
        ("suricata", "fast") => Box::new(FastLogParser::suricata()?),
        ("snort", "fast") => Box::new(FastLogParser::snort()?),
        ("paloalto", "threat") => Box::new(PaloAltoThreatParser),
        _ => {
            return Err(ShipperError::UnsupportedLogType {
                sensor: sensor.to_owned(),
                log_type: log_type.to_owned(),
            });
        }
    };
    tracing::debug!(sensor, log_type, parser = parser.name(), "parser selected");
    Ok(parser)
}

/// 레코드를 JSON 객체로 읽습니다. 줄이면 디코딩하고, 항목이면 그대로 씁니다.
pub(crate) fn json_object(payload: &RecordPayload) -> Option<std::borrow::Cow<'_, serde_json::Value>> {
    use std::borrow::Cow;

    let value = match payload {
        RecordPayload::Entry(entry) => Cow::Borrowed(entry),
        RecordPayload::Line(line) => Cow::Owned(serde_json::from_str(line).ok()?),
    };
    value.is_object().then_some(value)
}

/// JSON 객체의 문자열 필드를 읽습니다.
pub(crate) fn str_field<'a>(value: &'a serde_json::Value, key: &str) -> Option<&'a str> {
    value.get(key)?.as_str().filter(|s| !s.is_empty())
}
