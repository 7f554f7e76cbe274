//! Palo Alto threat 로그 파서
//!
//! 로그 조회 API의 `entry` 객체 하나를 알림으로 바꿉니다.
//! `src`, `dst`, `seqno`가 모두 있어야 알림으로 인정합니다.

use alertrelay_core::types::NormalizedAlert;

use super::{RecordParser, json_object, str_field};
use crate::source::RecordPayload;
use crate::source::http::seqno_of;

/// 항목에서 그대로 옮기는 필드
const THREAT_FIELDS: &[&str] = &[
    "receive_time",
    "time_generated",
    "serial",
    "subtype",
    "threatid",
    "threat_name",
    "category",
    "severity",
    "action",
    "direction",
    "rule",
    "app",
    "proto",
    "sport",
    "dport",
    "srcloc",
    "dstloc",
    "from",
    "to",
    "misc",
];

/// Palo Alto threat 파서
#[derive(Debug, Clone, Copy, Default)]
pub struct PaloAltoThreatParser;

impl RecordParser for PaloAltoThreatParser {
    fn name(&self) -> &str {
        "paloalto-threat"
    }

    fn parse(&self, payload: &RecordPayload) -> Option<NormalizedAlert> {
        let entry = json_object(payload)?;

        let src = str_field(&entry, "src")?;
        let dest = str_field(&entry, "dst")?;
        let seqno = entry.get("seqno").and_then(seqno_of)?;

        let mut alert = NormalizedAlert::new(src, dest);
        alert.seqno = Some(seqno);
        for key in THREAT_FIELDS {
            if let Some(value) = entry.get(*key).filter(|v| !v.is_null()) {
                alert.fields.insert((*key).to_owned(), value.clone());
            }
        }

        Some(alert)
    }
}
