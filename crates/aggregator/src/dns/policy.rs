//! DNS 응답 집계 정책
//!
//! 클라이언트 식별자, 정규화된 질문, 응답 코드, 레코드 셋 문자열로 집계 키를 만들고
//! 서버 목록과 레이블, 지연 통계를 병합합니다.

use std::collections::BTreeMap;
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use sluice_core::types::{EndpointMetadata, EndpointMetadataWithIp, Labels};

use super::types::{
    DnsClass, DnsMessage, DnsName, DnsResponseCode, DnsRrSets, DnsType, LatencyStats,
    canonicalize_name, opt_duration_nanos,
};
use crate::error::AggregatorError;
use crate::labels::{intersect_in_place, strip_reserved};
use crate::policy::{AggregationPolicy, Derived, FIELD_NOT_INCLUDED, Mergeable};

// ─── 집계 단위 ───────────────────────────────────────────────────────

/// DNS 집계 단위
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DnsAggregationKind {
    /// 클라이언트 메타데이터와 IP를 모두 키에 포함
    Default,
    /// 클라이언트 이름을 `-`로, IP를 제거하여 집계
    #[default]
    PrefixNameAndIp,
}

impl FromStr for DnsAggregationKind {
    type Err = AggregatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "default" => Ok(Self::Default),
            "prefix_name_and_ip" => Ok(Self::PrefixNameAndIp),
            other => Err(AggregatorError::Config {
                field: "dns_log.aggregation_kind".to_owned(),
                reason: format!("unknown aggregation kind '{other}'"),
            }),
        }
    }
}

impl fmt::Display for DnsAggregationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => f.write_str("default"),
            Self::PrefixNameAndIp => f.write_str("prefix_name_and_ip"),
        }
    }
}

// ─── 이벤트 ──────────────────────────────────────────────────────────

/// 관측된 DNS 응답 하나
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DnsUpdate {
    /// 질의한 클라이언트
    pub client: EndpointMetadata,
    pub client_ip: IpAddr,
    #[serde(default)]
    pub client_labels: Labels,
    /// 응답한 서버
    pub server: EndpointMetadataWithIp,
    #[serde(default)]
    pub server_labels: Labels,
    pub message: DnsMessage,
    /// 질의-응답 지연 (측정된 경우)
    #[serde(default, with = "opt_duration_nanos")]
    pub latency: Option<Duration>,
}

// ─── 키와 통계 ───────────────────────────────────────────────────────

/// DNS 집계 키
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DnsKey {
    pub client: EndpointMetadataWithIp,
    pub question: DnsName,
    pub rcode: DnsResponseCode,
    /// 응답/추가/권한 레코드 셋의 정규 문자열
    pub rrsets: String,
}

/// DNS 통계 누적기
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DnsStats {
    /// 서버별 레이블 (키는 합집합, 레이블은 교집합)
    pub servers: BTreeMap<EndpointMetadataWithIp, Labels>,
    pub client_labels: Labels,
    pub count: u64,
    pub rrsets: DnsRrSets,
    pub latency: Option<LatencyStats>,
}

impl Mergeable for DnsStats {
    fn merge(&mut self, other: Self) {
        for (server, labels) in other.servers {
            match self.servers.get_mut(&server) {
                Some(existing) => intersect_in_place(existing, &labels),
                None => {
                    self.servers.insert(server, labels);
                }
            }
        }
        intersect_in_place(&mut self.client_labels, &other.client_labels);
        self.count += other.count;
        self.rrsets.union(other.rrsets);
        self.latency = match (self.latency.take(), other.latency) {
            (Some(mut a), Some(b)) => {
                a.merge(b);
                Some(a)
            }
            (a, b) => a.or(b),
        };
    }

    fn count(&self) -> u64 {
        self.count
    }
}

// ─── 출력 레코드 ─────────────────────────────────────────────────────

/// 레코드 유형
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DnsLogType {
    Log,
    Unlogged,
}

/// 출력 레코드의 서버 엔트리
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DnsServer {
    #[serde(flatten)]
    pub endpoint: EndpointMetadataWithIp,
    #[serde(skip_serializing_if = "Labels::is_empty")]
    pub labels: Labels,
}

/// 집계된 DNS 레코드 본문
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DnsLogDetails {
    pub client_name: String,
    pub client_name_aggr: String,
    pub client_namespace: String,
    pub client_type: String,
    pub client_ip: Option<String>,
    pub client_labels: Labels,
    pub servers: Vec<DnsServer>,
    pub qname: String,
    pub qclass: DnsClass,
    pub qtype: DnsType,
    pub rcode: DnsResponseCode,
    pub rrsets: DnsRrSets,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency: Option<LatencyStats>,
}

/// DNS 출력 레코드
///
/// `unlogged` 레코드는 시간 구간과 count만 가집니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DnsLog {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(rename = "type")]
    pub log_type: DnsLogType,
    pub count: u64,
    #[serde(flatten)]
    pub details: Option<DnsLogDetails>,
}

// ─── 정책 ────────────────────────────────────────────────────────────

/// DNS 집계 정책
#[derive(Debug, Clone)]
pub struct DnsPolicy {
    kind: DnsAggregationKind,
    include_labels: bool,
}

impl Default for DnsPolicy {
    fn default() -> Self {
        Self::new(DnsAggregationKind::default(), true)
    }
}

impl DnsPolicy {
    pub fn new(kind: DnsAggregationKind, include_labels: bool) -> Self {
        Self {
            kind,
            include_labels,
        }
    }

    pub fn kind(&self) -> DnsAggregationKind {
        self.kind
    }

    fn client_identity(&self, update: &DnsUpdate) -> EndpointMetadataWithIp {
        match self.kind {
            DnsAggregationKind::Default => EndpointMetadataWithIp {
                endpoint: update.client.clone(),
                ip: Some(update.client_ip.to_string()),
            },
            DnsAggregationKind::PrefixNameAndIp => EndpointMetadataWithIp {
                endpoint: EndpointMetadata {
                    name: FIELD_NOT_INCLUDED.to_owned(),
                    ..update.client.clone()
                },
                ip: None,
            },
        }
    }
}

impl AggregationPolicy for DnsPolicy {
    type Event = DnsUpdate;
    type Key = DnsKey;
    type Stats = DnsStats;
    type Record = DnsLog;

    fn name(&self) -> &'static str {
        "dns"
    }

    fn derive(&self, update: &DnsUpdate) -> Result<Derived<DnsKey, DnsStats>, AggregatorError> {
        let question = update.message.questions.first().ok_or_else(|| {
            AggregatorError::MalformedEvent {
                reason: "dns message has no questions".to_owned(),
            }
        })?;

        let mut rrsets = DnsRrSets::new();
        rrsets.extend_from_records(&update.message.answers);
        rrsets.extend_from_records(&update.message.additionals);
        rrsets.extend_from_records(&update.message.authorities);

        let key = DnsKey {
            client: self.client_identity(update),
            question: DnsName::new(
                canonicalize_name(&question.name),
                question.class,
                question.rtype,
            ),
            rcode: update.message.rcode,
            rrsets: rrsets.to_string(),
        };

        let mut servers = BTreeMap::new();
        servers.insert(update.server.clone(), strip_reserved(&update.server_labels));

        let stats = DnsStats {
            servers,
            client_labels: strip_reserved(&update.client_labels),
            count: 1,
            rrsets,
            latency: update.latency.map(LatencyStats::single),
        };

        Ok(Derived::full(key, stats))
    }

    fn record(
        &self,
        key: &DnsKey,
        stats: DnsStats,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> DnsLog {
        let include = self.include_labels;
        let servers = stats
            .servers
            .into_iter()
            .map(|(endpoint, labels)| DnsServer {
                endpoint,
                labels: if include { labels } else { Labels::new() },
            })
            .collect();

        let client = &key.client.endpoint;
        DnsLog {
            start_time: start,
            end_time: end,
            log_type: DnsLogType::Log,
            count: stats.count,
            details: Some(DnsLogDetails {
                client_name: client.name.clone(),
                client_name_aggr: client.aggregated_name.clone(),
                client_namespace: client.namespace.clone(),
                client_type: client.endpoint_type.to_string(),
                client_ip: key.client.ip.clone(),
                client_labels: if include {
                    stats.client_labels
                } else {
                    Labels::new()
                },
                servers,
                qname: key.question.name.clone(),
                qclass: key.question.class,
                qtype: key.question.rtype,
                rcode: key.rcode,
                rrsets: stats.rrsets,
                latency: stats.latency,
            }),
        }
    }

    fn unlogged_record(&self, start: DateTime<Utc>, end: DateTime<Utc>, count: u64) -> DnsLog {
        DnsLog {
            start_time: start,
            end_time: end,
            log_type: DnsLogType::Unlogged,
            count,
            details: None,
        }
    }
}
