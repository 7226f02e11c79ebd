//! 집계기 설정
//!
//! core의 [`DnsLogConfig`]와 [`L7LogConfig`]를 검증된 타입으로 변환합니다.
//! 문자열 열거값과 `-1` 같은 센티널 값은 여기서 한 번만 해석됩니다.
//!
//! # 사용 예시
//! ```ignore
//! use sluice_core::config::SluiceConfig;
//! use sluice_aggregator::config::L7AggregatorConfig;
//!
//! let core_config = SluiceConfig::default();
//! let l7 = L7AggregatorConfig::from_core(&core_config.l7_log)?;
//! let cache = l7.build_cache();
//! ```

use std::time::Duration;

use sluice_core::config::{DnsLogConfig, L7LogConfig};

use crate::cache::{AggregationCache, Capacity};
use crate::dns::{DnsAggregationKind, DnsPolicy};
use crate::error::AggregatorError;
use crate::l7::{L7AggregationKind, L7Policy, TrimUrl, UrlTrim};

/// DNS 집계기 설정
#[derive(Debug, Clone)]
pub struct DnsAggregatorConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 플러시 주기
    pub flush_interval: Duration,
    /// 캐시 용량
    pub capacity: Capacity,
    /// 집계 정책
    pub policy: DnsPolicy,
    /// 바인딩할 싱크 이름
    pub sinks: Vec<String>,
}

impl DnsAggregatorConfig {
    /// core의 `[dns_log]` 섹션에서 설정을 생성합니다.
    pub fn from_core(core: &DnsLogConfig) -> Result<Self, AggregatorError> {
        if core.flush_interval_secs == 0 {
            return Err(AggregatorError::Config {
                field: "dns_log.flush_interval_secs".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        let kind: DnsAggregationKind = core.aggregation_kind.parse()?;

        Ok(Self {
            enabled: core.enabled,
            flush_interval: Duration::from_secs(core.flush_interval_secs),
            capacity: Capacity::from_limit(core.per_node_limit),
            policy: DnsPolicy::new(kind, core.include_labels),
            sinks: core.sinks.clone(),
        })
    }

    /// 설정대로 DNS 집계 캐시를 생성합니다.
    pub fn build_cache(&self) -> AggregationCache<DnsPolicy> {
        AggregationCache::new(self.policy.clone(), self.capacity)
    }
}

/// L7 집계기 설정
#[derive(Debug, Clone)]
pub struct L7AggregatorConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 플러시 주기
    pub flush_interval: Duration,
    /// 캐시 용량
    pub capacity: Capacity,
    /// 집계 단위
    pub kind: L7AggregationKind,
    /// 바인딩할 싱크 이름
    pub sinks: Vec<String>,
}

impl L7AggregatorConfig {
    /// core의 `[l7_log]` 섹션에서 설정을 생성합니다.
    ///
    /// `num_url_path_parts`가 음수이면 경로 조각 수를 제한하지 않습니다.
    pub fn from_core(core: &L7LogConfig) -> Result<Self, AggregatorError> {
        if core.flush_interval_secs == 0 {
            return Err(AggregatorError::Config {
                field: "l7_log.flush_interval_secs".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        let mode: TrimUrl = core.trim_url.parse()?;
        let num_url_path_parts = usize::try_from(core.num_url_path_parts).ok();

        Ok(Self {
            enabled: core.enabled,
            flush_interval: Duration::from_secs(core.flush_interval_secs),
            capacity: Capacity::from_limit(core.per_node_limit),
            kind: L7AggregationKind {
                http_header: core.include_http_header_info,
                http_method: core.include_http_method,
                service: core.include_service,
                destination: core.include_destination,
                source: core.include_source,
                response_code: core.include_response_code,
                url: UrlTrim {
                    mode,
                    num_url_path_parts,
                    url_char_limit: core.url_char_limit,
                },
            },
            sinks: core.sinks.clone(),
        })
    }

    /// 설정대로 L7 집계 캐시를 생성합니다.
    pub fn build_cache(&self) -> AggregationCache<L7Policy> {
        AggregationCache::new(L7Policy::new(self.kind), self.capacity)
    }
}
