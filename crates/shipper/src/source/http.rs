//! HTTP 폴링 어댑터 -- 시퀀스 번호 커서
//!
//! 원격 로그 조회 API를 주기적으로 질의해 `seqno > 현재 커서`인 항목을 가져옵니다.
//! API는 결과 순서를 보장하지 않으므로 배치를 seqno 오름차순으로 정렬한 뒤 내보냅니다.
//! 레코드 커서는 완전히 처리된 마지막 seqno라서 배치의 어느 항목 뒤에서
//! 체크포인트해도 남은 항목(같은 seqno의 중복 포함)을 다시 받을 수 있습니다.
//!
//! 조회 실패는 치명적이지 않습니다. 경고를 남기고 같은 커서로 다음 주기에 재시도합니다.
//! 기동 시 엔드포인트 연결 확인([`PanOsClient::connect`])만 치명적입니다.

use std::future::Future;
use std::time::Duration;

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use alertrelay_core::config::SensorConfig;
use alertrelay_core::error::SourceError;
use alertrelay_core::metrics as m;
use alertrelay_core::pipeline::BoxFuture;
use alertrelay_core::types::Cursor;

use super::RawRecord;
use super::xml::{api_error, xml_to_value};

/// 잡 상태 확인 간격
const JOB_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// 잡 상태 확인 최대 횟수
const MAX_JOB_POLLS: u32 = 30;

/// 원격 로그 조회 클라이언트 trait
///
/// `after`보다 큰 seqno를 가진 로그 항목을 순서 보장 없이 반환합니다.
/// 결과가 없으면 빈 벡터입니다.
pub trait LogQueryClient: Send + Sync {
    /// 로그에 표시할 엔드포인트 (자격 증명 제외)
    fn endpoint(&self) -> &str;

    /// `after` 이후의 로그 항목을 조회합니다.
    fn query_after(
        &self,
        after: Cursor,
    ) -> impl Future<Output = Result<Vec<Value>, SourceError>> + Send;
}

/// dyn-compatible 로그 조회 클라이언트 trait
pub trait DynLogQueryClient: Send + Sync {
    /// 로그에 표시할 엔드포인트
    fn endpoint(&self) -> &str;

    /// `after` 이후의 로그 항목을 조회합니다.
    fn query_after(&self, after: Cursor) -> BoxFuture<'_, Result<Vec<Value>, SourceError>>;
}

impl<T: LogQueryClient> DynLogQueryClient for T {
    fn endpoint(&self) -> &str {
        LogQueryClient::endpoint(self)
    }

    fn query_after(&self, after: Cursor) -> BoxFuture<'_, Result<Vec<Value>, SourceError>> {
        Box::pin(LogQueryClient::query_after(self, after))
    }
}

/// HTTP 폴링 어댑터
pub struct HttpPoll {
    client: Box<dyn DynLogQueryClient>,
    /// 처리 완료된 마지막 seqno
    current: Cursor,
    interval: Duration,
    /// 다음 조회 전에 폴링 주기만큼 대기해야 하는지
    sleep_pending: bool,
}

impl HttpPoll {
    /// `start` 이후부터 조회하는 어댑터를 생성합니다.
    pub fn new(client: Box<dyn DynLogQueryClient>, start: Cursor, interval: Duration) -> Self {
        Self {
            client,
            current: start,
            interval,
            sleep_pending: false,
        }
    }

    /// 정렬된 다음 배치를 가져옵니다. 취소되면 `Ok(None)`입니다.
    ///
    /// 빈 결과와 조회 실패는 다음 주기로 넘어갑니다.
    pub async fn next_batch(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<Option<Vec<RawRecord>>, SourceError> {
        loop {
            if self.sleep_pending {
                tokio::select! {
                    () = cancel.cancelled() => return Ok(None),
                    () = tokio::time::sleep(self.interval) => {}
                }
            }
            if cancel.is_cancelled() {
                return Ok(None);
            }
            self.sleep_pending = true;

            tracing::debug!(
                endpoint = self.client.endpoint(),
                after = self.current.get(),
                "querying remote log api"
            );

            let result = tokio::select! {
                () = cancel.cancelled() => return Ok(None),
                result = self.client.query_after(self.current) => result,
            };

            match result {
                Ok(entries) => {
                    let batch = order_batch(entries, self.current);
                    if batch.is_empty() {
                        tracing::debug!(after = self.current.get(), "no new log entries");
                        continue;
                    }
                    metrics::counter!(m::RECORDS_READ_TOTAL, m::LABEL_SOURCE => "http")
                        .increment(batch.len() as u64);
                    return Ok(Some(batch));
                }
                Err(e) => {
                    tracing::warn!(
                        endpoint = self.client.endpoint(),
                        after = self.current.get(),
                        error = %e,
                        "log query failed, retrying next cycle"
                    );
                    metrics::counter!(m::SOURCE_QUERY_ERRORS_TOTAL).increment(1);
                }
            }
        }
    }

    /// 처리 완료된 seqno를 확정합니다. 커서는 뒤로 가지 않습니다.
    pub fn commit(&mut self, cursor: Cursor) {
        self.current = self.current.max(cursor);
    }

    /// 마지막으로 확정된 seqno
    pub fn position(&self) -> Cursor {
        self.current
    }
}

/// 조회 결과를 seqno 오름차순 레코드로 변환합니다.
///
/// seqno가 없거나 `after` 이하인 항목은 버립니다. 정렬은 안정 정렬이라
/// 같은 seqno의 항목은 받은 순서를 유지합니다.
///
/// 각 레코드의 커서는 그 레코드까지 처리했을 때 완전히 끝난 마지막 seqno입니다.
/// 같은 seqno가 여러 개면 마지막 항목만 자기 seqno를 커서로 갖고, 앞선 항목은
/// 직전 seqno(또는 `after`)를 유지합니다. 다음 조회는 `seqno > 커서`이므로
/// 중간에 멈춰도 남은 중복 항목을 다시 받습니다.
pub fn order_batch(entries: Vec<Value>, after: Cursor) -> Vec<RawRecord> {
    let mut keyed: Vec<(u64, Value)> = entries
        .into_iter()
        .filter_map(|entry| {
            let Some(seqno) = entry.get("seqno").and_then(seqno_of) else {
                tracing::warn!(entry = %entry, "log entry without usable seqno, skipping");
                return None;
            };
            if seqno <= after.get() {
                tracing::debug!(seqno, after = after.get(), "dropping already processed entry");
                return None;
            }
            Some((seqno, entry))
        })
        .collect();
    keyed.sort_by_key(|(seqno, _)| *seqno);

    let seqnos: Vec<u64> = keyed.iter().map(|(seqno, _)| *seqno).collect();
    let mut completed = after;
    keyed
        .into_iter()
        .enumerate()
        .map(|(i, (seqno, entry))| {
            if seqnos.get(i + 1) != Some(&seqno) {
                completed = Cursor(seqno);
            }
            RawRecord::entry(entry, completed)
        })
        .collect()
}

/// seqno 값을 정수로 읽습니다. 문자열과 숫자 모두 허용합니다.
pub(crate) fn seqno_of(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// PAN-OS 스타일 로그 조회 API 클라이언트
///
/// 응답은 XML이며 [`xml_to_value`]로 변환한 뒤 JSON 포인터로 읽습니다.
pub struct PanOsClient {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    log_type: String,
    nlogs: u32,
}

impl PanOsClient {
    /// 클라이언트를 만들고 `type=version` 요청으로 연결과 인증을 확인합니다.
    ///
    /// HTTP 상태가 성공이어도 응답이 `<response status="error">`이면 실패입니다.
    /// 실패하면 [`SourceError::Unreachable`]입니다. 재시도하지 않습니다.
    pub async fn connect(sensor: &SensorConfig) -> Result<Self, SourceError> {
        let api_url = format!("{}/api/", sensor.base_url.trim_end_matches('/'));
        let unreachable = |reason: String| SourceError::Unreachable {
            endpoint: api_url.clone(),
            reason,
        };

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(sensor.query_timeout_secs))
            .build()
            .map_err(|e| unreachable(e.to_string()))?;

        let response = client
            .get(&api_url)
            .query(&[("type", "version"), ("key", sensor.api_key.as_str())])
            .send()
            .await
            .map_err(|e| unreachable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(unreachable(format!("version check returned HTTP {status}")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| unreachable(e.to_string()))?;
        let doc = xml_to_value(&body).map_err(|e| unreachable(e.to_string()))?;
        if let Some(msg) = api_error(&doc) {
            return Err(unreachable(format!("version check rejected: {msg}")));
        }

        tracing::info!(endpoint = %api_url, "remote log api reachable");

        Ok(Self {
            client,
            api_url: api_url.clone(),
            api_key: sensor.api_key.clone(),
            log_type: sensor.log_type.clone(),
            nlogs: sensor.nlogs,
        })
    }

    async fn get_xml(&self, params: &[(&str, &str)]) -> Result<Value, SourceError> {
        let response = self
            .client
            .get(&self.api_url)
            .query(params)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| SourceError::Query(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Query(format!("HTTP {status}")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| SourceError::Query(format!("unreadable response body: {e}")))?;
        let doc = xml_to_value(&body)?;

        if let Some(msg) = api_error(&doc) {
            return Err(SourceError::Query(format!("api error: {msg}")));
        }

        Ok(doc)
    }

    async fn wait_for_job(&self, job_id: &str) -> Result<Value, SourceError> {
        for attempt in 1..=MAX_JOB_POLLS {
            tokio::time::sleep(JOB_POLL_INTERVAL).await;

            let body = self
                .get_xml(&[("type", "log"), ("action", "get"), ("job-id", job_id)])
                .await?;

            let status = body
                .pointer("/response/result/job/status")
                .and_then(Value::as_str);
            if status == Some("FIN") {
                return Ok(body);
            }
            tracing::trace!(job_id, attempt, ?status, "log query job still running");
        }

        Err(SourceError::Query(format!(
            "log query job {job_id} did not finish after {MAX_JOB_POLLS} checks"
        )))
    }
}

impl LogQueryClient for PanOsClient {
    fn endpoint(&self) -> &str {
        &self.api_url
    }

    async fn query_after(&self, after: Cursor) -> Result<Vec<Value>, SourceError> {
        let query = seqno_query(after);
        let nlogs = self.nlogs.to_string();
        let body = self
            .get_xml(&[
                ("type", "log"),
                ("log-type", self.log_type.as_str()),
                ("nlogs", nlogs.as_str()),
                ("query", query.as_str()),
            ])
            .await?;

        let body = match body.pointer("/response/result/job") {
            Some(Value::String(job_id)) => self.wait_for_job(job_id).await?,
            Some(Value::Number(job_id)) => self.wait_for_job(&job_id.to_string()).await?,
            _ => body,
        };

        Ok(log_entries(&body))
    }
}

/// `seqno > after` 조회 식
pub fn seqno_query(after: Cursor) -> String {
    let n = after.get();
    format!("( seqno geq {n} ) and !( seqno eq {n} )")
}

/// 응답에서 로그 항목 목록을 꺼냅니다.
///
/// 항목이 하나이면 객체로 올 수 있어 한 개짜리 목록으로 취급합니다.
pub fn log_entries(body: &Value) -> Vec<Value> {
    match body.pointer("/response/result/log/logs/entry") {
        Some(Value::Array(entries)) => entries.clone(),
        Some(entry @ Value::Object(_)) => vec![entry.clone()],
        _ => Vec::new(),
    }
}
