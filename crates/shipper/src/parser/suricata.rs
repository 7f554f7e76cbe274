//! Suricata EVE JSON 파서
//!
//! `eve.json`의 한 줄은 하나의 이벤트입니다. `event_type == "alert"`인 줄만 알림이고
//! `flow`, `dns`, `stats` 같은 나머지 이벤트는 건너뜁니다.

use serde_json::Value;

use alertrelay_core::types::NormalizedAlert;

use super::{RecordParser, json_object, str_field};
use crate::source::RecordPayload;

/// 최상위에서 그대로 옮기는 필드
const TOP_LEVEL_FIELDS: &[&str] = &[
    "timestamp",
    "flow_id",
    "in_iface",
    "proto",
    "app_proto",
    "src_port",
    "dest_port",
];

/// `alert` 객체에서 옮기는 필드
const ALERT_FIELDS: &[&str] = &[
    "action",
    "gid",
    "signature_id",
    "rev",
    "signature",
    "category",
    "severity",
];

/// Suricata EVE 파서
#[derive(Debug, Clone, Copy, Default)]
pub struct SuricataEveParser;

impl RecordParser for SuricataEveParser {
    fn name(&self) -> &str {
        "suricata-eve"
    }

    fn parse(&self, payload: &RecordPayload) -> Option<NormalizedAlert> {
        let event = json_object(payload)?;
        if event.get("event_type").and_then(Value::as_str) != Some("alert") {
            return None;
        }

        let src = str_field(&event, "src_ip")?;
        let dest = str_field(&event, "dest_ip")?;
        let mut alert = NormalizedAlert::new(src, dest);

        for key in TOP_LEVEL_FIELDS {
            if let Some(value) = event.get(*key) {
                alert.fields.insert((*key).to_owned(), value.clone());
            }
        }
        if let Some(details) = event.get("alert").filter(|v| v.is_object()) {
            for key in ALERT_FIELDS {
                if let Some(value) = details.get(*key) {
                    alert.fields.insert((*key).to_owned(), value.clone());
                }
            }
        }

        Some(alert)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALERT_LINE: &str = r#"{"timestamp":"2023-10-05T14:31:02.123456+0000","flow_id":1234,"in_iface":"eth0","event_type":"alert","src_ip":"192.168.1.5","src_port":51234,"dest_ip":"10.0.0.2","dest_port":1433,"proto":"TCP","alert":{"action":"allowed","gid":1,"signature_id":2010935,"rev":3,"signature":"ET POLICY Suspicious inbound to MSSQL port 1433","category":"Potentially Bad Traffic","severity":2}}"#;

    #[test]
    fn parses_alert_event() {
        let alert = SuricataEveParser
            .parse(&RecordPayload::Line(ALERT_LINE.to_owned()))
            .unwrap();

        assert_eq!(alert.src, "192.168.1.5");
        assert_eq!(alert.dest, "10.0.0.2");
        assert_eq!(alert.fields["signature_id"], 2010935);
        assert_eq!(alert.fields["severity"], 2);
        assert_eq!(alert.fields["dest_port"], 1433);
        assert_eq!(alert.fields["category"], "Potentially Bad Traffic");
        assert!(alert.fields.get("event_type").is_none());
    }

    #[test]
    fn non_alert_events_are_skipped() {
        for line in [
            r#"{"event_type":"flow","src_ip":"1.1.1.1","dest_ip":"2.2.2.2"}"#,
            r#"{"event_type":"stats","stats":{}}"#,
            r#"{"src_ip":"1.1.1.1","dest_ip":"2.2.2.2"}"#,
        ] {
            assert!(
                SuricataEveParser
                    .parse(&RecordPayload::Line(line.to_owned()))
                    .is_none(),
                "{line}"
            );
        }
    }

    #[test]
    fn malformed_json_is_skipped() {
        assert!(
            SuricataEveParser
                .parse(&RecordPayload::Line("{\"event_type\":\"alert\"".to_owned()))
                .is_none()
        );
    }

    #[test]
    fn alert_without_addresses_is_skipped() {
        let line = r#"{"event_type":"alert","alert":{"signature":"x"}}"#;
        assert!(
            SuricataEveParser
                .parse(&RecordPayload::Line(line.to_owned()))
                .is_none()
        );
    }
}
