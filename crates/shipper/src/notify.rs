//! 웹훅 알림 채널
//!
//! `{"title": ..., "message": ...}` JSON을 설정된 URL로 POST합니다.
//! 전송은 best-effort입니다. 실패는 로그로만 남고 호출자에게 전파되지 않습니다.

use std::time::Duration;

use serde_json::{Value, json};

use alertrelay_core::config::NotifyConfig;
use alertrelay_core::pipeline::Notifier;

use crate::error::ShipperError;

/// 콜드 스타트 알림 본문
pub const STARTUP_MESSAGE: &str = "powered up";

/// 재실행 후 기동 알림 본문
pub const RESTART_MESSAGE: &str = "started after successful restart";

/// 콜드 스타트 알림 제목
pub const STARTUP_TITLE: &str = "Upstart event";

/// 재실행 후 기동 알림 제목
pub const RESTART_TITLE: &str = "Restart event";

/// 기동 알림의 `(제목, 본문)`을 반환합니다.
pub fn startup_notice(restarted: bool) -> (&'static str, &'static str) {
    if restarted {
        (RESTART_TITLE, RESTART_MESSAGE)
    } else {
        (STARTUP_TITLE, STARTUP_MESSAGE)
    }
}

/// 웹훅 알림 채널
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    /// 설정으로부터 채널을 생성합니다.
    pub fn new(config: &NotifyConfig) -> Result<Self, ShipperError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ShipperError::Notifier(e.to_string()))?;
        Ok(Self {
            client,
            url: config.webhook_url.clone(),
        })
    }
}

impl Notifier for WebhookNotifier {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn send_notification(&self, message: Value, title: &str) {
        let body = json!({ "title": title, "message": message });

        match self.client.post(&self.url).json(&body).send().await {
            Ok(response) if response.status().is_success() => {
                tracing::debug!(title, "notification sent");
            }
            Ok(response) => {
                tracing::warn!(
                    title,
                    status = %response.status(),
                    "webhook returned non-success status"
                );
            }
            Err(e) => {
                tracing::warn!(title, error = %e, "webhook send failed");
            }
        }
    }
}

/// 센서 이름으로 알림 제목을 만듭니다 (`"suricata"` → `"Suricata Event"`).
pub fn alert_title(sensor: &str) -> String {
    format!("{} Event", title_case(sensor))
}

/// 단어마다 첫 글자를 대문자, 나머지를 소문자로 바꿉니다.
///
/// 영숫자가 아닌 문자가 단어를 나눕니다.
pub fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut word_start = true;
    for ch in text.chars() {
        if ch.is_alphanumeric() {
            if word_start {
                out.extend(ch.to_uppercase());
            } else {
                out.extend(ch.to_lowercase());
            }
            word_start = false;
        } else {
            out.push(ch);
            word_start = true;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_case_words() {
        assert_eq!(title_case("suricata"), "Suricata");
        assert_eq!(title_case("PALOALTO"), "Paloalto");
        assert_eq!(title_case("unexpected error"), "Unexpected Error");
        assert_eq!(title_case("palo-alto"), "Palo-Alto");
        assert_eq!(title_case(""), "");
    }

    #[test]
    fn alert_title_format() {
        assert_eq!(alert_title("snort"), "Snort Event");
    }

    #[test]
    fn startup_notice_depends_on_restart_marker() {
        assert_eq!(startup_notice(false), ("Upstart event", "powered up"));
        assert_eq!(
            startup_notice(true),
            ("Restart event", "started after successful restart")
        );
    }

    #[test]
    fn webhook_builds_from_config() {
        let config = NotifyConfig {
            enabled: true,
            notify_on_startup: false,
            webhook_url: "http://127.0.0.1:9/hook".to_owned(),
            timeout_secs: 1,
        };
        let notifier = WebhookNotifier::new(&config).unwrap();
        assert_eq!(Notifier::name(&notifier), "webhook");
    }

    #[tokio::test]
    async fn unreachable_webhook_is_swallowed() {
        let config = NotifyConfig {
            enabled: true,
            notify_on_startup: false,
            webhook_url: "http://127.0.0.1:9/hook".to_owned(),
            timeout_secs: 1,
        };
        let notifier = WebhookNotifier::new(&config).unwrap();
        notifier
            .send_notification(json!({"src": "a"}), "Test Event")
            .await;
    }
}
