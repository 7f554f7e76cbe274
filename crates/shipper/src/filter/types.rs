//! 필터 규칙 데이터 타입
//!
//! JSON 규칙 파일에서 역직렬화되는 구조체들을 정의합니다.

use serde::{Deserialize, Serialize};

use alertrelay_core::error::FilterError;

/// 필터 규칙 -- 규칙 파일 배열의 원소 하나
///
/// # JSON 스키마
/// ```json
/// {
///   "id": "scanner_noise",
///   "description": "Internal vulnerability scanner",
///   "conditions": [
///     { "field": "src", "modifier": "startswith", "value": "10.20.0." },
///     { "field": "signature", "modifier": "contains", "value": "ET SCAN" }
///   ]
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterRule {
    /// 규칙 고유 ID
    pub id: String,
    /// 규칙 설명
    #[serde(default)]
    pub description: String,
    /// 필드 매칭 조건 목록 (AND 결합)
    pub conditions: Vec<FieldCondition>,
}

impl FilterRule {
    /// 규칙의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), FilterError> {
        if self.id.is_empty() {
            return Err(FilterError::Invalid {
                rule_id: "(empty)".to_owned(),
                reason: "rule id must not be empty".to_owned(),
            });
        }

        if self.conditions.is_empty() {
            return Err(FilterError::Invalid {
                rule_id: self.id.clone(),
                reason: "rule must have at least one condition".to_owned(),
            });
        }

        if let Some(idx) = self.conditions.iter().position(|c| c.field.is_empty()) {
            return Err(FilterError::Invalid {
                rule_id: self.id.clone(),
                reason: format!("condition[{idx}] field must not be empty"),
            });
        }

        Ok(())
    }
}

/// 필드 매칭 조건
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldCondition {
    /// 대상 필드명 (src, dest, interface, seqno 또는 센서별 필드)
    pub field: String,
    /// 매칭 수정자
    #[serde(default)]
    pub modifier: ConditionModifier,
    /// 매칭할 값
    pub value: String,
}

/// 조건 수정자
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConditionModifier {
    /// 정확히 일치
    #[default]
    Exact,
    /// 부분 문자열 포함
    Contains,
    /// 접두사 일치
    StartsWith,
    /// 접미사 일치
    EndsWith,
    /// 정규식 매칭
    Regex,
}
