//! Snort/Suricata fast 로그 파서
//!
//! 한 줄 형식:
//!
//! ```text
//! 10/05/2023-14:31:02.123456  [**] [1:2010935:3] ET POLICY MSSQL [**] [Classification: Potentially Bad Traffic] [Priority: 2] {TCP} 192.168.1.5:51234 -> 10.0.0.2:1433
//! ```
//!
//! Snort는 타임스탬프에 연도가 없습니다 (`10/05-14:31:02.123456`).
//! 이 경우 현재 연도를 붙여 해석합니다.

use chrono::{Datelike, NaiveDateTime};
use regex::Regex;
use serde_json::Value;

use alertrelay_core::error::ConfigError;
use alertrelay_core::types::NormalizedAlert;

use super::RecordParser;
use crate::source::RecordPayload;

const FAST_PATTERN: &str = r"^(?P<timestamp>\S+)\s+\[\*\*\]\s+\[(?P<gid>\d+):(?P<sid>\d+):(?P<rev>\d+)\]\s+(?P<signature>.*?)\s+\[\*\*\]\s+(?:\[Classification:\s*(?P<classification>[^\]]*)\]\s+)?\[Priority:\s*(?P<priority>\d+)\]\s+\{(?P<proto>[^}]+)\}\s+(?P<src>\S+?)(?::(?P<src_port>\d+))?\s+->\s+(?P<dest>\S+?)(?::(?P<dest_port>\d+))?\s*$";

/// 타임스탬프 표기
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimestampStyle {
    /// `MM/DD/YYYY-hh:mm:ss.uuuuuu`
    WithYear,
    /// `MM/DD-hh:mm:ss.uuuuuu`
    WithoutYear,
}

/// fast 로그 파서
pub struct FastLogParser {
    name: &'static str,
    pattern: Regex,
    style: TimestampStyle,
}

impl FastLogParser {
    /// Suricata `fast.log` 파서
    pub fn suricata() -> Result<Self, ConfigError> {
        Self::build("suricata-fast", TimestampStyle::WithYear)
    }

    /// Snort `alert_fast` 파서
    pub fn snort() -> Result<Self, ConfigError> {
        Self::build("snort-fast", TimestampStyle::WithoutYear)
    }

    fn build(name: &'static str, style: TimestampStyle) -> Result<Self, ConfigError> {
        let pattern = Regex::new(FAST_PATTERN).map_err(|e| ConfigError::InvalidValue {
            field: "parser".to_owned(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            name,
            pattern,
            style,
        })
    }

    fn normalize_timestamp(&self, raw: &str) -> String {
        let parsed = match self.style {
            TimestampStyle::WithYear => NaiveDateTime::parse_from_str(raw, "%m/%d/%Y-%H:%M:%S%.f"),
            TimestampStyle::WithoutYear => {
                let year = chrono::Local::now().year();
                NaiveDateTime::parse_from_str(&format!("{year}/{raw}"), "%Y/%m/%d-%H:%M:%S%.f")
            }
        };
        match parsed {
            Ok(ts) => ts.format("%Y-%m-%dT%H:%M:%S%.6f").to_string(),
            Err(_) => raw.to_owned(),
        }
    }
}

impl RecordParser for FastLogParser {
    fn name(&self) -> &str {
        self.name
    }

    fn parse(&self, payload: &RecordPayload) -> Option<NormalizedAlert> {
        let RecordPayload::Line(line) = payload else {
            return None;
        };
        let caps = self.pattern.captures(line.trim())?;

        let number = |name: &str| -> Option<Value> {
            caps.name(name)?.as_str().parse::<u64>().ok().map(Value::from)
        };

        let mut alert = NormalizedAlert::new(&caps["src"], &caps["dest"])
            .with_field("timestamp", self.normalize_timestamp(&caps["timestamp"]))
            .with_field("signature", caps["signature"].trim())
            .with_field("proto", &caps["proto"]);

        for key in ["gid", "sid", "rev", "priority", "src_port", "dest_port"] {
            if let Some(value) = number(key) {
                alert.fields.insert(key.to_owned(), value);
            }
        }
        if let Some(classification) = caps.name("classification") {
            alert
                .fields
                .insert("classification".to_owned(), classification.as_str().trim().into());
        }

        Some(alert)
    }
}
