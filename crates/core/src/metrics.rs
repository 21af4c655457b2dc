//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 감시 파이프라인은 이 상수를 사용하여 `metrics::counter!()`,
//! `metrics::histogram!()` 매크로를 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `logsentinel_`
//! - 접미어: `_total` (counter), `_seconds` (histogram), 없음 (gauge)

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 결과 레이블 키 (success, failure)
pub const LABEL_RESULT: &str = "result";

/// 실패 원인 레이블 키 (error, timeout)
pub const LABEL_REASON: &str = "reason";

/// 버전 레이블 키
pub const LABEL_VERSION: &str = "version";

// ─── 데몬 메트릭 ────────────────────────────────────────────────────

/// 빌드 정보 (gauge, 항상 1, label: version)
pub const BUILD_INFO: &str = "logsentinel_build_info";

// ─── 패스 메트릭 ────────────────────────────────────────────────────

/// 완료된 패스 수 (counter, label: result)
pub const PASSES_TOTAL: &str = "logsentinel_passes_total";

/// 패스 소요 시간 (histogram, 초)
pub const PASS_DURATION_SECONDS: &str = "logsentinel_pass_duration_seconds";

/// 발견된 로그 파일 수 (gauge, 마지막 패스 기준)
pub const FILES_DISCOVERED: &str = "logsentinel_files_discovered";

// ─── 파일 처리 메트릭 ───────────────────────────────────────────────

/// 새 내용을 읽은 파일 수 (counter)
pub const FILES_SCANNED_TOTAL: &str = "logsentinel_files_scanned_total";

/// 읽은 바이트 수 (counter)
pub const BYTES_READ_TOTAL: &str = "logsentinel_bytes_read_total";

/// 읽기 실패 수 (counter)
pub const READ_FAILURES_TOTAL: &str = "logsentinel_read_failures_total";

/// 감지된 truncation/rotation 수 (counter)
pub const TRUNCATIONS_TOTAL: &str = "logsentinel_truncations_total";

// ─── 분석/알림 메트릭 ───────────────────────────────────────────────

/// 분석 실패 수 (counter, label: reason)
pub const ANALYSIS_FAILURES_TOTAL: &str = "logsentinel_analysis_failures_total";

/// 분석 소요 시간 (histogram, 초)
pub const ANALYSIS_DURATION_SECONDS: &str = "logsentinel_analysis_duration_seconds";

/// 전송된 알림 수 (counter)
pub const ALERTS_SENT_TOTAL: &str = "logsentinel_alerts_sent_total";

/// 알림 전송 실패 수 (counter)
pub const NOTIFICATION_FAILURES_TOTAL: &str = "logsentinel_notification_failures_total";

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 전역 레코더 설치 후 한 번만 호출해야 합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge, describe_histogram};

    describe_gauge!(BUILD_INFO, "Build information, always 1");

    describe_counter!(PASSES_TOTAL, "Total number of monitoring passes completed");
    describe_histogram!(
        PASS_DURATION_SECONDS,
        "Time to complete a single monitoring pass in seconds"
    );
    describe_gauge!(
        FILES_DISCOVERED,
        "Number of log files discovered in the most recent pass"
    );

    describe_counter!(
        FILES_SCANNED_TOTAL,
        "Total number of log files that had new content"
    );
    describe_counter!(BYTES_READ_TOTAL, "Total bytes of new log content read");
    describe_counter!(
        READ_FAILURES_TOTAL,
        "Total number of log files that could not be read"
    );
    describe_counter!(
        TRUNCATIONS_TOTAL,
        "Total number of truncated or rotated log files detected"
    );

    describe_counter!(
        ANALYSIS_FAILURES_TOTAL,
        "Total number of failed analysis engine invocations"
    );
    describe_histogram!(
        ANALYSIS_DURATION_SECONDS,
        "Analysis engine latency in seconds"
    );
    describe_counter!(ALERTS_SENT_TOTAL, "Total number of alerts delivered");
    describe_counter!(
        NOTIFICATION_FAILURES_TOTAL,
        "Total number of alerts that could not be delivered"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_names_share_prefix() {
        let names = [
            BUILD_INFO,
            PASSES_TOTAL,
            PASS_DURATION_SECONDS,
            FILES_DISCOVERED,
            FILES_SCANNED_TOTAL,
            BYTES_READ_TOTAL,
            READ_FAILURES_TOTAL,
            TRUNCATIONS_TOTAL,
            ANALYSIS_FAILURES_TOTAL,
            ANALYSIS_DURATION_SECONDS,
            ALERTS_SENT_TOTAL,
            NOTIFICATION_FAILURES_TOTAL,
        ];
        for name in names {
            assert!(name.starts_with("logsentinel_"), "{name}");
        }
    }

    #[test]
    fn describe_all_without_recorder_is_noop() {
        // 레코더가 없으면 no-op이어야 함
        describe_all();
    }
}
