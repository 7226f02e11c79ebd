//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 집계기는 이 상수와 [`LABEL_AGGREGATOR`] 레이블로 `metrics::counter!()`,
//! `metrics::gauge!()` 매크로를 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `sluice_`
//! - 컴포넌트명: `aggregator_`, `reporter_`, `receiver_`, `daemon_`
//! - 접미어: `_total` (counter), 없음 (gauge)
//!
//! # 사용 예시
//!
//! ```ignore
//! use sluice_core::metrics as m;
//!
//! metrics::counter!(m::AGGREGATOR_EVENTS_INGESTED_TOTAL, m::LABEL_AGGREGATOR => "l7").increment(1);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 집계기 레이블 키 (dns, l7)
pub const LABEL_AGGREGATOR: &str = "aggregator";

/// 싱크 레이블 키
pub const LABEL_SINK: &str = "sink";

/// 이벤트 종류 레이블 키 (dns, l7)
pub const LABEL_KIND: &str = "kind";

// ─── Aggregator 메트릭 ─────────────────────────────────────────────

/// Aggregator: 캐시에 반영된 이벤트 수 (counter)
pub const AGGREGATOR_EVENTS_INGESTED_TOTAL: &str = "sluice_aggregator_events_ingested_total";

/// Aggregator: 키를 도출하지 못해 버린 이벤트 수 (counter)
pub const AGGREGATOR_EVENTS_MALFORMED_TOTAL: &str = "sluice_aggregator_events_malformed_total";

/// Aggregator: 용량 초과로 버린 이벤트 수 (counter)
pub const AGGREGATOR_EVENTS_DROPPED_TOTAL: &str = "sluice_aggregator_events_dropped_total";

/// Aggregator: 플러시 시점에 기록되지 못한 이벤트 수 (counter)
pub const AGGREGATOR_UNLOGGED_TOTAL: &str = "sluice_aggregator_unlogged_total";

/// Aggregator: 플러시로 내보낸 레코드 수 (counter)
pub const AGGREGATOR_RECORDS_FLUSHED_TOTAL: &str = "sluice_aggregator_records_flushed_total";

/// Aggregator: 현재 primary 저장소의 엔트리 수 (gauge)
pub const AGGREGATOR_CACHE_ENTRIES: &str = "sluice_aggregator_cache_entries";

// ─── Reporter 메트릭 ───────────────────────────────────────────────

/// Reporter: 싱크 전송 실패 수 (counter, label: sink)
pub const REPORTER_DISPATCH_ERRORS_TOTAL: &str = "sluice_reporter_dispatch_errors_total";

/// Reporter: 싱크 준비 상태 (gauge, 1 = ready)
pub const REPORTER_READY: &str = "sluice_reporter_ready";

// ─── Receiver 메트릭 ───────────────────────────────────────────────

/// Receiver: 수신한 데이터그램 수 (counter)
pub const RECEIVER_DATAGRAMS_TOTAL: &str = "sluice_receiver_datagrams_total";

/// Receiver: 디코딩 실패 데이터그램 수 (counter)
pub const RECEIVER_DECODE_ERRORS_TOTAL: &str = "sluice_receiver_decode_errors_total";

// ─── Daemon 메트릭 ──────────────────────────────────────────────────

/// Daemon: 가동 시간 (gauge, 초)
pub const DAEMON_UPTIME_SECONDS: &str = "sluice_daemon_uptime_seconds";

/// Daemon: 빌드 정보 (gauge, 항상 1, label: version)
pub const DAEMON_BUILD_INFO: &str = "sluice_daemon_build_info";

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 전역 레코더 설치 후 한 번만 호출합니다. 일반적으로 `sluice-daemon`의
/// 시작 시점에서 호출합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge};

    // Aggregator
    describe_counter!(
        AGGREGATOR_EVENTS_INGESTED_TOTAL,
        "Total number of events merged or inserted into an aggregation cache"
    );
    describe_counter!(
        AGGREGATOR_EVENTS_MALFORMED_TOTAL,
        "Total number of events rejected because no aggregation key could be derived"
    );
    describe_counter!(
        AGGREGATOR_EVENTS_DROPPED_TOTAL,
        "Total number of events dropped because the cache was at capacity"
    );
    describe_counter!(
        AGGREGATOR_UNLOGGED_TOTAL,
        "Total number of events summarized into unlogged records at flush time"
    );
    describe_counter!(
        AGGREGATOR_RECORDS_FLUSHED_TOTAL,
        "Total number of aggregated records emitted by flushes"
    );
    describe_gauge!(
        AGGREGATOR_CACHE_ENTRIES,
        "Number of entries in the primary aggregation store"
    );

    // Reporter
    describe_counter!(
        REPORTER_DISPATCH_ERRORS_TOTAL,
        "Total number of failed batch deliveries per sink"
    );
    describe_gauge!(
        REPORTER_READY,
        "Whether every sink bound to the reporter accepted start (1) or not (0)"
    );

    // Receiver
    describe_counter!(
        RECEIVER_DATAGRAMS_TOTAL,
        "Total number of event datagrams received"
    );
    describe_counter!(
        RECEIVER_DECODE_ERRORS_TOTAL,
        "Total number of datagrams that could not be decoded into events"
    );

    // Daemon
    describe_gauge!(DAEMON_UPTIME_SECONDS, "sluice daemon uptime in seconds");
    describe_gauge!(
        DAEMON_BUILD_INFO,
        "Build information (always 1, with version label)"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_METRIC_NAMES: &[&str] = &[
        AGGREGATOR_EVENTS_INGESTED_TOTAL,
        AGGREGATOR_EVENTS_MALFORMED_TOTAL,
        AGGREGATOR_EVENTS_DROPPED_TOTAL,
        AGGREGATOR_UNLOGGED_TOTAL,
        AGGREGATOR_RECORDS_FLUSHED_TOTAL,
        AGGREGATOR_CACHE_ENTRIES,
        REPORTER_DISPATCH_ERRORS_TOTAL,
        REPORTER_READY,
        RECEIVER_DATAGRAMS_TOTAL,
        RECEIVER_DECODE_ERRORS_TOTAL,
        DAEMON_UPTIME_SECONDS,
        DAEMON_BUILD_INFO,
    ];

    #[test]
    fn all_metrics_start_with_sluice_prefix() {
        for name in ALL_METRIC_NAMES {
            assert!(
                name.starts_with("sluice_"),
                "Metric '{}' does not start with 'sluice_' prefix",
                name
            );
        }
    }

    #[test]
    fn counters_end_with_total() {
        let counters = [
            AGGREGATOR_EVENTS_INGESTED_TOTAL,
            AGGREGATOR_EVENTS_MALFORMED_TOTAL,
            AGGREGATOR_EVENTS_DROPPED_TOTAL,
            AGGREGATOR_UNLOGGED_TOTAL,
            AGGREGATOR_RECORDS_FLUSHED_TOTAL,
            REPORTER_DISPATCH_ERRORS_TOTAL,
            RECEIVER_DATAGRAMS_TOTAL,
            RECEIVER_DECODE_ERRORS_TOTAL,
        ];
        for name in counters {
            assert!(name.ends_with("_total"), "counter '{}' lacks _total", name);
        }
    }

    #[test]
    fn describe_all_does_not_panic() {
        // 레코더가 설치되지 않아도 패닉하지 않아야 함
        describe_all();
    }

    #[test]
    fn label_keys_are_lowercase() {
        for label in [LABEL_AGGREGATOR, LABEL_SINK, LABEL_KIND] {
            assert_eq!(label.to_lowercase(), label);
        }
    }
}
