//! DNS 응답 집계
//!
//! - [`types`]: DNS 메시지, 이름, 레코드 셋, 지연 통계
//! - [`policy`]: 집계 키 정책과 출력 레코드

pub mod policy;
pub mod types;

pub use policy::{
    DnsAggregationKind, DnsKey, DnsLog, DnsLogDetails, DnsLogType, DnsPolicy, DnsServer,
    DnsStats, DnsUpdate,
};
pub use types::{
    DnsClass, DnsMessage, DnsName, DnsQuestion, DnsResponseCode, DnsRrSets, DnsType,
    LatencyStats, Mx, RData, ResourceRecord, Soa, Srv, canonicalize_name,
};
