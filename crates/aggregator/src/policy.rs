//! 집계 정책 trait
//!
//! [`AggregationPolicy`]는 이벤트 하나를 `(집계 키, 통계, 티어)`로 변환하는 순수 함수와,
//! 병합된 통계를 출력 레코드로 만드는 함수를 정의합니다.
//! 캐시([`AggregationCache`](crate::cache::AggregationCache))는 정책에 대해
//! 제네릭이므로 DNS와 L7이 같은 병합/오버플로우/플러시 로직을 공유합니다.
//!
//! [`Aggregator`]는 리포터가 이벤트 타입 `E`와 레코드 타입 `R`만 알고
//! 집계기를 다룰 수 있도록 하는 dyn-compatible 경계입니다.

use std::hash::Hash;

use chrono::{DateTime, Utc};

use crate::error::AggregatorError;

/// 집계 단위에서 제외되어 지워진 필드 값
pub const FIELD_NOT_INCLUDED: &str = "-";

/// 레코드 저장 티어
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    /// 모든 필드를 가진 레코드. primary 저장소에 들어갑니다.
    Full,
    /// 연결 수준 필드만 가진 레코드 (L7 전용). overflow 저장소에 들어갑니다.
    Overflow,
}

/// 병합 가능한 통계 누적기
///
/// 카운터, 합계, 최대값의 병합은 교환 법칙을 만족해야 하고
/// 레이블은 교집합으로 병합되어야 합니다. `count()`는 병합으로 감소하지 않습니다.
pub trait Mergeable {
    /// 다른 누적기를 이 누적기에 병합합니다.
    fn merge(&mut self, other: Self);

    /// 이 누적기가 대표하는 원본 이벤트 수를 반환합니다.
    fn count(&self) -> u64;
}

/// 정책이 이벤트 하나에서 도출한 결과
#[derive(Debug, Clone)]
pub struct Derived<K, S> {
    /// 집계 키
    pub key: K,
    /// 이벤트 하나 분량의 통계
    pub stats: S,
    /// 저장 티어
    pub tier: Tier,
}

impl<K, S> Derived<K, S> {
    /// full 티어 결과를 생성합니다.
    pub fn full(key: K, stats: S) -> Self {
        Self {
            key,
            stats,
            tier: Tier::Full,
        }
    }
}

/// 집계 키 정책
pub trait AggregationPolicy: Send + Sync + 'static {
    /// 입력 이벤트 타입
    type Event;
    /// 집계 키 타입
    type Key: Eq + Hash + Send;
    /// 통계 누적기 타입
    type Stats: Mergeable + Send;
    /// 출력 레코드 타입
    type Record: Send;

    /// 메트릭 레이블과 로그에 쓰이는 정책 이름 (`dns`, `l7`)
    fn name(&self) -> &'static str;

    /// 이벤트에서 집계 키와 통계를 도출합니다.
    ///
    /// 키를 도출할 수 없으면 `AggregatorError::MalformedEvent`를 반환합니다.
    fn derive(
        &self,
        event: &Self::Event,
    ) -> Result<Derived<Self::Key, Self::Stats>, AggregatorError>;

    /// 병합된 통계로 `[start, end)` 구간의 출력 레코드를 만듭니다.
    fn record(
        &self,
        key: &Self::Key,
        stats: Self::Stats,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Self::Record;

    /// 기록되지 못한 이벤트 수를 담는 `unlogged` 레코드를 만듭니다.
    fn unlogged_record(&self, start: DateTime<Utc>, end: DateTime<Utc>, count: u64)
    -> Self::Record;
}

/// 리포터가 다루는 집계기
///
/// `ingest`는 동기 호출이며 캐시의 임계 구역 외에는 블로킹하지 않습니다.
pub trait Aggregator<E, R>: Send + Sync {
    /// 집계기 이름
    fn name(&self) -> &str;

    /// 이벤트 하나를 캐시에 반영합니다.
    fn ingest(&self, event: &E) -> Result<(), AggregatorError>;

    /// 현재 윈도우의 레코드를 모두 꺼내고 새 윈도우를 시작합니다.
    fn drain(&self) -> Vec<R>;
}
