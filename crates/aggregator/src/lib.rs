#![doc = include_str!("../README.md")]
//!
//! # 모듈 구성
//!
//! - [`policy`]: 집계 정책 trait과 `Aggregator` 경계
//! - [`cache`]: 용량 제한 병합 캐시와 플러시
//! - [`labels`]: 레이블 교집합과 예약 레이블 제거
//! - [`dns`]: DNS 응답 집계 정책
//! - [`l7`]: L7/HTTP 트랜잭션 집계 정책
//! - [`sink`]: 외부 싱크 계약
//! - [`reporter`]: 플러시 루프와 팬아웃
//! - [`health`]: liveness/readiness 집계
//! - [`config`]: core 설정 -> 집계기 설정 변환
//! - [`error`]: 도메인 에러 타입

pub mod cache;
pub mod config;
pub mod dns;
pub mod error;
pub mod health;
pub mod l7;
pub mod labels;
pub mod policy;
pub mod reporter;
pub mod sink;

// --- 주요 타입 re-export ---

// 캐시와 정책
pub use cache::{AggregationCache, CacheStats, Capacity};
pub use policy::{AggregationPolicy, Aggregator, Derived, FIELD_NOT_INCLUDED, Mergeable, Tier};

// 리포터
pub use health::{ComponentHealth, HealthAggregator, HealthReport};
pub use reporter::{Reporter, ReporterBuilder, ReporterSettings, SinkMap};
pub use sink::{DynSink, Sink};

// 설정
pub use config::{DnsAggregatorConfig, L7AggregatorConfig};

// 에러
pub use error::{AggregatorError, SinkError};
