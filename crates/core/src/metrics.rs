//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 엔진과 소스 어댑터는 이 상수로 `metrics::counter!()` 매크로를 호출합니다.
//! 레코더가 설치되지 않은 경우 호출은 아무 일도 하지 않습니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `alertrelay_`
//! - 접미어: `_total` (counter), 없음 (gauge)

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 센서 레이블 키
pub const LABEL_SENSOR: &str = "sensor";

/// 소스 유형 레이블 키 (file, http)
pub const LABEL_SOURCE: &str = "source";

// ─── 엔진 메트릭 ───────────────────────────────────────────────────

/// 소스에서 읽은 원시 레코드 수 (counter)
pub const RECORDS_READ_TOTAL: &str = "alertrelay_records_read_total";

/// 알림이 아니어서 건너뛴 레코드 수 (counter)
pub const RECORDS_SKIPPED_TOTAL: &str = "alertrelay_records_skipped_total";

/// 알림 채널로 전달된 알림 수 (counter)
pub const ALERTS_NOTIFIED_TOTAL: &str = "alertrelay_alerts_notified_total";

/// 필터 규칙에 의해 억제된 알림 수 (counter)
pub const ALERTS_FILTERED_TOTAL: &str = "alertrelay_alerts_filtered_total";

/// 저장된 체크포인트 수 (counter)
pub const CHECKPOINTS_SAVED_TOTAL: &str = "alertrelay_checkpoints_saved_total";

/// 현재 커서 값 (gauge)
pub const CURSOR_POSITION: &str = "alertrelay_cursor_position";

// ─── 소스 메트릭 ───────────────────────────────────────────────────

/// 파일 truncation/rotation 감지 횟수 (counter)
pub const SOURCE_TRUNCATIONS_TOTAL: &str = "alertrelay_source_truncations_total";

/// 원격 로그 조회 실패 횟수 (counter)
pub const SOURCE_QUERY_ERRORS_TOTAL: &str = "alertrelay_source_query_errors_total";

/// 모든 메트릭의 설명을 등록합니다.
///
/// 레코더 설치 직후 한 번 호출합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge};

    describe_counter!(RECORDS_READ_TOTAL, "Raw records pulled from the active source");
    describe_counter!(
        RECORDS_SKIPPED_TOTAL,
        "Records classified as non-alert noise or malformed"
    );
    describe_counter!(
        ALERTS_NOTIFIED_TOTAL,
        "Alerts handed to the notification channel"
    );
    describe_counter!(ALERTS_FILTERED_TOTAL, "Alerts suppressed by filter rules");
    describe_counter!(CHECKPOINTS_SAVED_TOTAL, "Checkpoint table rewrites");
    describe_gauge!(CURSOR_POSITION, "Last checkpointed cursor value");
    describe_counter!(
        SOURCE_TRUNCATIONS_TOTAL,
        "Tailed file truncations that reset the offset to zero"
    );
    describe_counter!(
        SOURCE_QUERY_ERRORS_TOTAL,
        "Failed remote log queries (retried with an unchanged cursor)"
    );
}
