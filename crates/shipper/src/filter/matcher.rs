//! 규칙 매칭 로직 -- 조건 평가 및 정규식 캐싱
//!
//! [`RuleMatcher`]는 규칙의 조건을 [`NormalizedAlert`]에 대해 평가합니다.
//! 정규식은 규칙 로딩 시 한 번만 컴파일합니다.

use std::collections::HashMap;

use regex::Regex;

use alertrelay_core::error::FilterError;
use alertrelay_core::types::NormalizedAlert;

use super::types::{ConditionModifier, FieldCondition, FilterRule};

/// 규칙 매처
#[derive(Default)]
pub struct RuleMatcher {
    /// 컴파일된 정규식 캐시: (rule_id, condition_index) -> Regex
    regex_cache: HashMap<(String, usize), Regex>,
}

impl RuleMatcher {
    /// 새 매처를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 규칙의 정규식 조건을 미리 컴파일합니다.
    pub fn compile_rule(&mut self, rule: &FilterRule) -> Result<(), FilterError> {
        for (idx, condition) in rule.conditions.iter().enumerate() {
            if condition.modifier == ConditionModifier::Regex {
                let regex = Regex::new(&condition.value).map_err(|e| FilterError::Invalid {
                    rule_id: rule.id.clone(),
                    reason: format!(
                        "invalid regex in condition[{idx}] for field '{}': {e}",
                        condition.field
                    ),
                })?;
                self.regex_cache.insert((rule.id.clone(), idx), regex);
            }
        }
        Ok(())
    }

    /// 규칙의 모든 조건이 알림에 매칭되는지 평가합니다.
    ///
    /// 필드가 없는 조건은 실패로 봅니다.
    pub fn matches(&self, rule: &FilterRule, alert: &NormalizedAlert) -> Result<bool, FilterError> {
        for (idx, condition) in rule.conditions.iter().enumerate() {
            let Some(value) = alert.field_value(&condition.field) else {
                return Ok(false);
            };
            if !self.evaluate_condition(condition, &value, &rule.id, idx)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn evaluate_condition(
        &self,
        condition: &FieldCondition,
        field_value: &str,
        rule_id: &str,
        condition_idx: usize,
    ) -> Result<bool, FilterError> {
        match condition.modifier {
            ConditionModifier::Exact => Ok(field_value == condition.value),
            ConditionModifier::Contains => Ok(field_value.contains(&condition.value)),
            ConditionModifier::StartsWith => Ok(field_value.starts_with(&condition.value)),
            ConditionModifier::EndsWith => Ok(field_value.ends_with(&condition.value)),
            ConditionModifier::Regex => {
                let regex = self
                    .regex_cache
                    .get(&(rule_id.to_owned(), condition_idx))
                    .ok_or_else(|| FilterError::Invalid {
                        rule_id: rule_id.to_owned(),
                        reason: format!("regex not compiled for condition[{condition_idx}]"),
                    })?;
                Ok(regex.is_match(field_value))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alert() -> NormalizedAlert {
        let mut alert = NormalizedAlert::new("10.20.0.15", "192.168.1.1")
            .with_field("signature", "ET SCAN Nmap Scripting Engine")
            .with_field("priority", 3);
        alert.interface = "eth0".to_owned();
        alert
    }

    fn rule(conditions: Vec<(&str, ConditionModifier, &str)>) -> FilterRule {
        FilterRule {
            id: "test_rule".to_owned(),
            description: String::new(),
            conditions: conditions
                .into_iter()
                .map(|(field, modifier, value)| FieldCondition {
                    field: field.to_owned(),
                    modifier,
                    value: value.to_owned(),
                })
                .collect(),
        }
    }

    fn check(rule: &FilterRule) -> bool {
        let mut matcher = RuleMatcher::new();
        matcher.compile_rule(rule).unwrap();
        matcher.matches(rule, &alert()).unwrap()
    }

    #[test]
    fn exact_match() {
        assert!(check(&rule(vec![("interface", ConditionModifier::Exact, "eth0")])));
        assert!(!check(&rule(vec![("interface", ConditionModifier::Exact, "eth1")])));
    }

    #[test]
    fn substring_modifiers() {
        assert!(check(&rule(vec![("signature", ConditionModifier::Contains, "Nmap")])));
        assert!(check(&rule(vec![("src", ConditionModifier::StartsWith, "10.20.")])));
        assert!(check(&rule(vec![("dest", ConditionModifier::EndsWith, ".1.1")])));
        assert!(!check(&rule(vec![("dest", ConditionModifier::StartsWith, "10.")])));
    }

    #[test]
    fn numeric_field_compared_as_text() {
        assert!(check(&rule(vec![("priority", ConditionModifier::Exact, "3")])));
    }

    #[test]
    fn regex_match() {
        assert!(check(&rule(vec![(
            "signature",
            ConditionModifier::Regex,
            r"^ET (SCAN|POLICY)\b"
        )])));
    }

    #[test]
    fn conditions_are_anded() {
        assert!(!check(&rule(vec![
            ("src", ConditionModifier::StartsWith, "10.20."),
            ("signature", ConditionModifier::Contains, "SQL"),
        ])));
    }

    #[test]
    fn missing_field_does_not_match() {
        assert!(!check(&rule(vec![("category", ConditionModifier::Contains, "")])));
    }

    #[test]
    fn invalid_regex_rejected_at_compile() {
        let mut matcher = RuleMatcher::new();
        let err = matcher
            .compile_rule(&rule(vec![("src", ConditionModifier::Regex, "(unclosed")]))
            .unwrap_err();
        assert!(matches!(err, FilterError::Invalid { .. }));
    }

    #[test]
    fn uncompiled_regex_is_an_error() {
        let matcher = RuleMatcher::new();
        let r = rule(vec![("src", ConditionModifier::Regex, ".*")]);
        assert!(matcher.matches(&r, &alert()).is_err());
    }
}
