//! L7/HTTP 트랜잭션 집계 정책
//!
//! 필드별 포함 여부와 URL 트리밍 설정으로 집계 단위를 정합니다.
//! 제외된 문자열 필드는 `-`, 제외된 포트는 `0`이 됩니다.
//! 프로토콜 타입이 비어 있는 업데이트는 overflow 티어로 분류됩니다.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use sluice_core::types::{EndpointMetadata, Labels};

use super::url::UrlTrim;
use crate::error::AggregatorError;
use crate::labels::{intersect_in_place, strip_reserved};
use crate::policy::{AggregationPolicy, Derived, FIELD_NOT_INCLUDED, Mergeable, Tier};

// ─── 집계 단위 ───────────────────────────────────────────────────────

/// L7 집계 단위
///
/// `false`인 필드는 집계 키에서 지워집니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct L7AggregationKind {
    /// user agent와 프로토콜 타입
    pub http_header: bool,
    pub http_method: bool,
    /// 서비스 이름, 네임스페이스, 포트 이름
    pub service: bool,
    pub destination: bool,
    pub source: bool,
    pub response_code: bool,
    pub url: UrlTrim,
}

impl Default for L7AggregationKind {
    fn default() -> Self {
        Self {
            http_header: false,
            http_method: true,
            service: true,
            destination: true,
            source: true,
            response_code: true,
            url: UrlTrim::default(),
        }
    }
}

impl L7AggregationKind {
    /// 모든 필드를 포함하고 URL을 자르지 않는 집계 단위
    pub fn everything() -> Self {
        Self {
            http_header: true,
            http_method: true,
            service: true,
            destination: true,
            source: true,
            response_code: true,
            url: UrlTrim {
                mode: super::url::TrimUrl::FullUrl,
                num_url_path_parts: None,
                url_char_limit: usize::MAX,
            },
        }
    }
}

// ─── 이벤트 ──────────────────────────────────────────────────────────

fn default_count() -> u64 {
    1
}

/// 관측된 L7 트랜잭션 (또는 overflow 요약)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct L7Update {
    pub src: EndpointMetadata,
    pub src_labels: Labels,
    pub src_port: u16,
    pub dst: EndpointMetadata,
    pub dst_labels: Labels,
    pub dst_port: u16,

    pub duration_ms: u64,
    pub duration_max_ms: u64,
    pub bytes_received: u64,
    pub bytes_sent: u64,
    pub latency_ms: u64,

    pub response_code: String,
    pub method: String,
    pub domain: String,
    pub path: String,
    pub user_agent: String,
    /// 프로토콜 타입 (예: `http/1.1`). 비어 있으면 overflow 요약입니다.
    #[serde(rename = "type")]
    pub protocol: String,
    /// 이 업데이트가 대표하는 요청 수
    #[serde(default = "default_count")]
    pub count: u64,

    pub service_name: String,
    pub service_namespace: String,
    pub service_port_name: String,
}

// ─── 키와 통계 ───────────────────────────────────────────────────────

/// 한쪽 엔드포인트의 키 부분
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct L7Endpoint {
    pub name_aggr: String,
    pub namespace: String,
    pub endpoint_type: String,
    pub port: u16,
}

impl L7Endpoint {
    fn new(meta: &EndpointMetadata, port: u16, include: bool) -> Self {
        if include {
            Self {
                name_aggr: meta.aggregated_name.clone(),
                namespace: meta.namespace.clone(),
                endpoint_type: meta.endpoint_type.to_string(),
                port,
            }
        } else {
            Self {
                name_aggr: FIELD_NOT_INCLUDED.to_owned(),
                namespace: FIELD_NOT_INCLUDED.to_owned(),
                endpoint_type: FIELD_NOT_INCLUDED.to_owned(),
                port: 0,
            }
        }
    }
}

/// L7 집계 키
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct L7Key {
    pub src: L7Endpoint,
    pub dst: L7Endpoint,
    pub service_name: String,
    pub service_namespace: String,
    pub service_port_name: String,
    pub response_code: String,
    pub method: String,
    pub domain: String,
    pub path: String,
    pub user_agent: String,
    pub protocol: String,
}

/// L7 통계 누적기
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct L7Stats {
    pub duration_sum_ms: u64,
    pub duration_max_ms: u64,
    pub bytes_in: u64,
    pub bytes_out: u64,
    pub latency_sum_ms: u64,
    pub count: u64,
    pub src_labels: Labels,
    pub dst_labels: Labels,
}

impl Mergeable for L7Stats {
    fn merge(&mut self, other: Self) {
        self.duration_sum_ms += other.duration_sum_ms;
        self.duration_max_ms = self.duration_max_ms.max(other.duration_max_ms);
        self.bytes_in += other.bytes_in;
        self.bytes_out += other.bytes_out;
        self.latency_sum_ms += other.latency_sum_ms;
        self.count += other.count;
        intersect_in_place(&mut self.src_labels, &other.src_labels);
        intersect_in_place(&mut self.dst_labels, &other.dst_labels);
    }

    fn count(&self) -> u64 {
        self.count
    }
}

// ─── 출력 레코드 ─────────────────────────────────────────────────────

/// 레코드 유형
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum L7LogType {
    Log,
    Unlogged,
}

/// 집계된 L7 레코드 본문
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct L7LogDetails {
    pub src_name_aggr: String,
    pub src_namespace: String,
    pub src_type: String,
    pub src_port: u16,
    pub src_labels: Labels,

    pub dest_name_aggr: String,
    pub dest_namespace: String,
    pub dest_type: String,
    pub dest_port: u16,
    pub dest_labels: Labels,

    pub dest_service_name: String,
    pub dest_service_namespace: String,
    pub dest_service_port_name: String,

    pub method: String,
    pub user_agent: String,
    pub url: String,
    pub response_code: String,
    pub protocol: String,

    pub duration_mean: u64,
    pub duration_max: u64,
    pub bytes_in: u64,
    pub bytes_out: u64,
    pub latency_mean: u64,
}

/// L7 출력 레코드
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct L7Log {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(rename = "type")]
    pub log_type: L7LogType,
    pub count: u64,
    #[serde(flatten)]
    pub details: Option<L7LogDetails>,
}

/// 키의 도메인과 경로를 출력용 URL로 합칩니다.
fn join_url(domain: &str, path: &str) -> String {
    match (domain == FIELD_NOT_INCLUDED, path == FIELD_NOT_INCLUDED) {
        (true, true) => FIELD_NOT_INCLUDED.to_owned(),
        (false, true) => domain.to_owned(),
        (true, false) => path.to_owned(),
        (false, false) => format!("{domain}{path}"),
    }
}

// ─── 정책 ────────────────────────────────────────────────────────────

/// L7 집계 정책
#[derive(Debug, Clone, Default)]
pub struct L7Policy {
    kind: L7AggregationKind,
}

impl L7Policy {
    pub fn new(kind: L7AggregationKind) -> Self {
        Self { kind }
    }

    pub fn kind(&self) -> &L7AggregationKind {
        &self.kind
    }

    /// 업데이트에서 집계 키를 만듭니다.
    pub fn key_for(&self, update: &L7Update) -> L7Key {
        let k = &self.kind;
        let pick = |include: bool, value: &str| {
            if include {
                value.to_owned()
            } else {
                FIELD_NOT_INCLUDED.to_owned()
            }
        };
        let (domain, path) = k.url.apply(&update.domain, &update.path);

        L7Key {
            src: L7Endpoint::new(&update.src, update.src_port, k.source),
            dst: L7Endpoint::new(&update.dst, update.dst_port, k.destination),
            service_name: pick(k.service, &update.service_name),
            service_namespace: pick(k.service, &update.service_namespace),
            service_port_name: pick(k.service, &update.service_port_name),
            response_code: pick(k.response_code, &update.response_code),
            method: pick(k.http_method, &update.method),
            domain,
            path,
            user_agent: pick(k.http_header, &update.user_agent),
            protocol: pick(k.http_header, &update.protocol),
        }
    }
}

impl AggregationPolicy for L7Policy {
    type Event = L7Update;
    type Key = L7Key;
    type Stats = L7Stats;
    type Record = L7Log;

    fn name(&self) -> &'static str {
        "l7"
    }

    fn derive(&self, update: &L7Update) -> Result<Derived<L7Key, L7Stats>, AggregatorError> {
        if update.count == 0 {
            return Err(AggregatorError::MalformedEvent {
                reason: "l7 update with zero count".to_owned(),
            });
        }

        let tier = if update.protocol.is_empty() {
            Tier::Overflow
        } else {
            Tier::Full
        };

        let stats = L7Stats {
            duration_sum_ms: update.duration_ms,
            duration_max_ms: update.duration_max_ms,
            bytes_in: update.bytes_received,
            bytes_out: update.bytes_sent,
            latency_sum_ms: update.latency_ms,
            count: update.count,
            src_labels: strip_reserved(&update.src_labels),
            dst_labels: strip_reserved(&update.dst_labels),
        };

        Ok(Derived {
            key: self.key_for(update),
            stats,
            tier,
        })
    }

    fn record(
        &self,
        key: &L7Key,
        stats: L7Stats,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> L7Log {
        let count = stats.count.max(1);
        L7Log {
            start_time: start,
            end_time: end,
            log_type: L7LogType::Log,
            count: stats.count,
            details: Some(L7LogDetails {
                src_name_aggr: key.src.name_aggr.clone(),
                src_namespace: key.src.namespace.clone(),
                src_type: key.src.endpoint_type.clone(),
                src_port: key.src.port,
                src_labels: stats.src_labels,
                dest_name_aggr: key.dst.name_aggr.clone(),
                dest_namespace: key.dst.namespace.clone(),
                dest_type: key.dst.endpoint_type.clone(),
                dest_port: key.dst.port,
                dest_labels: stats.dst_labels,
                dest_service_name: key.service_name.clone(),
                dest_service_namespace: key.service_namespace.clone(),
                dest_service_port_name: key.service_port_name.clone(),
                method: key.method.clone(),
                user_agent: key.user_agent.clone(),
                url: join_url(&key.domain, &key.path),
                response_code: key.response_code.clone(),
                protocol: key.protocol.clone(),
                duration_mean: stats.duration_sum_ms / count,
                duration_max: stats.duration_max_ms,
                bytes_in: stats.bytes_in,
                bytes_out: stats.bytes_out,
                latency_mean: stats.latency_sum_ms / count,
            }),
        }
    }

    fn unlogged_record(&self, start: DateTime<Utc>, end: DateTime<Utc>, count: u64) -> L7Log {
        L7Log {
            start_time: start,
            end_time: end,
            log_type: L7LogType::Unlogged,
            count,
            details: None,
        }
    }
}
