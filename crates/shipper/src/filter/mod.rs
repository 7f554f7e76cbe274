//! 알림 필터 -- JSON 규칙으로 알림을 억제하고 통계를 남깁니다.
//!
//! 규칙 파일은 [`FilterRule`]의 JSON 배열입니다. 한 규칙의 조건은 AND로 결합되며,
//! 어느 규칙이든 매칭되면 해당 알림은 전송되지 않습니다.
//!
//! # 아키텍처
//! - [`AlertFilter`]: 규칙 목록, 매처, 통계를 묶는 코디네이터
//! - [`matcher`]: 조건 매칭 로직 (exact, contains, regex 등)
//! - [`types`]: 규칙 데이터 구조 정의

pub mod matcher;
pub mod types;

pub use matcher::RuleMatcher;
pub use types::{ConditionModifier, FieldCondition, FilterRule};

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::Serialize;

use alertrelay_core::error::FilterError;
use alertrelay_core::metrics as m;
use alertrelay_core::types::NormalizedAlert;

/// 필터 통계
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterStats {
    /// 검사한 알림 수
    pub alerts_checked: u64,
    /// 억제한 알림 수
    pub alerts_suppressed: u64,
    /// 규칙별 매칭 횟수
    pub rule_hits: BTreeMap<String, u64>,
}

/// 알림 필터
pub struct AlertFilter {
    rules: Vec<FilterRule>,
    matcher: RuleMatcher,
    stats: FilterStats,
}

impl AlertFilter {
    /// 규칙 파일을 읽어 필터를 생성합니다.
    ///
    /// 파일이 없거나 디코딩할 수 없으면 [`FilterError::Decode`]입니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, FilterError> {
        let path = path.as_ref();
        let decode_error = |reason: String| FilterError::Decode {
            path: path.display().to_string(),
            reason,
        };

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| decode_error(e.to_string()))?;
        let rules: Vec<FilterRule> =
            serde_json::from_str(&content).map_err(|e| decode_error(e.to_string()))?;

        let filter = Self::from_rules(rules)?;
        tracing::info!(
            path = %path.display(),
            rules = filter.rules.len(),
            "filter rules loaded"
        );
        Ok(filter)
    }

    /// 규칙 목록으로 필터를 생성합니다.
    pub fn from_rules(rules: Vec<FilterRule>) -> Result<Self, FilterError> {
        let mut matcher = RuleMatcher::new();
        let mut seen = HashSet::new();

        for rule in &rules {
            rule.validate()?;
            if !seen.insert(rule.id.as_str()) {
                return Err(FilterError::Invalid {
                    rule_id: rule.id.clone(),
                    reason: "duplicate rule id".to_owned(),
                });
            }
            matcher.compile_rule(rule)?;
        }

        Ok(Self {
            rules,
            matcher,
            stats: FilterStats::default(),
        })
    }

    /// 알림을 규칙과 비교합니다. 억제해야 하면 `true`입니다.
    pub fn run_filter(&mut self, alert: &NormalizedAlert) -> bool {
        self.stats.alerts_checked += 1;

        for rule in &self.rules {
            match self.matcher.matches(rule, alert) {
                Ok(true) => {
                    self.stats.alerts_suppressed += 1;
                    *self.stats.rule_hits.entry(rule.id.clone()).or_default() += 1;
                    metrics::counter!(m::ALERTS_FILTERED_TOTAL).increment(1);
                    tracing::debug!(rule_id = %rule.id, alert = %alert, "alert suppressed");
                    return true;
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(rule_id = %rule.id, error = %e, "filter rule evaluation failed");
                }
            }
        }

        false
    }

    /// 등록된 규칙 수
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// 현재까지의 통계
    pub fn stats(&self) -> &FilterStats {
        &self.stats
    }

    /// 통계를 로그로 남깁니다.
    pub fn log_stats(&self) {
        tracing::info!(
            checked = self.stats.alerts_checked,
            suppressed = self.stats.alerts_suppressed,
            rules_hit = self.stats.rule_hits.len(),
            "filter statistics"
        );
        for (rule_id, hits) in &self.stats.rule_hits {
            tracing::info!(rule_id = %rule_id, hits, "filter rule hits");
        }
    }

    /// 통계를 JSON 파일로 저장합니다.
    pub fn save_stats(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let json = serde_json::to_vec_pretty(&self.stats)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, json)
    }
}
