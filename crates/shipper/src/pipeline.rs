//! 알림 파이프라인 -- 필터 → 보강 → 알림 전송
//!
//! 정규화된 알림 하나를 받아 선택적 필터와 역방향 DNS 보강을 거쳐
//! 알림 채널로 넘깁니다. 각 단계는 설정에 따라 빠질 수 있습니다.

use std::path::Path;
use std::sync::Arc;

use alertrelay_core::metrics as m;
use alertrelay_core::pipeline::DynNotifier;
use alertrelay_core::types::NormalizedAlert;

use crate::enrich::ReverseDnsEnricher;
use crate::filter::AlertFilter;
use crate::notify::alert_title;

/// 알림 처리 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// 필터 규칙에 의해 억제됨
    Suppressed,
    /// 알림 채널로 전달됨
    Notified,
    /// 알림 채널이 없어 로그로만 남김
    Logged,
}

/// 알림 파이프라인
pub struct AlertPipeline {
    title: String,
    filter: Option<AlertFilter>,
    enricher: Option<ReverseDnsEnricher>,
    notifier: Option<Arc<dyn DynNotifier>>,
}

impl AlertPipeline {
    /// 필터, 보강, 채널이 없는 파이프라인을 생성합니다.
    pub fn new(sensor: &str) -> Self {
        Self {
            title: alert_title(sensor),
            filter: None,
            enricher: None,
            notifier: None,
        }
    }

    /// 필터를 설정합니다.
    pub fn with_filter(mut self, filter: AlertFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// 역방향 DNS 보강을 설정합니다.
    pub fn with_enricher(mut self, enricher: ReverseDnsEnricher) -> Self {
        self.enricher = Some(enricher);
        self
    }

    /// 알림 채널을 설정합니다.
    pub fn with_notifier(mut self, notifier: Arc<dyn DynNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// 알림 제목
    pub fn title(&self) -> &str {
        &self.title
    }

    /// 필터 (설정된 경우)
    pub fn filter(&self) -> Option<&AlertFilter> {
        self.filter.as_ref()
    }

    /// 알림 하나를 처리합니다.
    pub async fn handle(&mut self, mut alert: NormalizedAlert) -> Disposition {
        if let Some(filter) = self.filter.as_mut() {
            if filter.run_filter(&alert) {
                return Disposition::Suppressed;
            }
        }

        if let Some(enricher) = &self.enricher {
            enricher.enrich(&mut alert).await;
        }

        match &self.notifier {
            Some(notifier) => {
                notifier
                    .send_notification(alert.to_message(), &self.title)
                    .await;
                metrics::counter!(m::ALERTS_NOTIFIED_TOTAL).increment(1);
                Disposition::Notified
            }
            None => {
                tracing::info!(alert = %alert.to_message(), "alert");
                Disposition::Logged
            }
        }
    }

    /// 필터 통계를 로그로 남기고 파일로 저장합니다. 필터가 없으면 아무것도 하지 않습니다.
    pub fn emit_filter_stats(&self, stats_path: &Path) {
        let Some(filter) = &self.filter else {
            return;
        };
        filter.log_stats();
        if let Err(e) = filter.save_stats(stats_path) {
            tracing::warn!(
                path = %stats_path.display(),
                error = %e,
                "failed to write filter statistics"
            );
        }
    }

    /// 알림 채널 (설정된 경우)
    pub fn notifier(&self) -> Option<&Arc<dyn DynNotifier>> {
        self.notifier.as_ref()
    }
}
