//! 용량 제한 집계 캐시
//!
//! [`AggregationCache`]는 집계 키에서 병합된 통계로의 맵입니다.
//! primary 저장소의 크기는 [`Capacity`]를 넘지 않으며, overflow 티어 레코드는
//! 같은 용량 제한을 가진 별도 저장소에 보관됩니다.
//!
//! # 플러시
//! [`drain`](AggregationCache::drain)은 잠금을 잡은 채로 상태 전체를 빈 상태로
//! 교체하고, 레코드 생성은 잠금을 놓은 뒤에 수행합니다. 따라서 같은 이벤트가
//! 두 윈도우에 중복 집계되거나 누락되는 일이 없습니다.
//!
//! # 오버플로우
//! 저장하지 못한 이벤트와 backfill되지 못한 overflow 엔트리는 플러시 시점에
//! `unlogged` 레코드 하나로 요약되고 경고 로그를 남깁니다.

use std::collections::HashMap;
use std::fmt;
use std::num::NonZeroUsize;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use sluice_core::metrics as m;

use crate::error::AggregatorError;
use crate::policy::{AggregationPolicy, Aggregator, Derived, Mergeable, Tier};

// ─── Capacity ────────────────────────────────────────────────────────

/// 캐시 용량
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capacity {
    /// 제한 없음
    Unbounded,
    /// 최대 엔트리 수
    Bounded(NonZeroUsize),
}

impl Capacity {
    /// 설정값에서 용량을 만듭니다. `0`은 무제한을 뜻합니다.
    pub fn from_limit(limit: usize) -> Self {
        match NonZeroUsize::new(limit) {
            Some(n) => Self::Bounded(n),
            None => Self::Unbounded,
        }
    }

    /// 현재 `len`개가 들어 있을 때 하나 더 넣을 수 있는지 확인합니다.
    pub fn has_room(&self, len: usize) -> bool {
        match self {
            Self::Unbounded => true,
            Self::Bounded(n) => len < n.get(),
        }
    }

    /// 남은 자리 수를 반환합니다. 무제한이면 `None`입니다.
    pub fn remaining(&self, len: usize) -> Option<usize> {
        match self {
            Self::Unbounded => None,
            Self::Bounded(n) => Some(n.get().saturating_sub(len)),
        }
    }
}

impl fmt::Display for Capacity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unbounded => f.write_str("unbounded"),
            Self::Bounded(n) => write!(f, "{n}"),
        }
    }
}

// ─── CacheState ──────────────────────────────────────────────────────

/// ingest 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Merged,
    Inserted,
    Dropped,
}

struct CacheState<K, S> {
    primary: HashMap<K, S>,
    overflow: HashMap<K, S>,
    dropped: u64,
    window_start: DateTime<Utc>,
}

impl<K, S> CacheState<K, S>
where
    K: Eq + std::hash::Hash,
    S: Mergeable,
{
    fn new(window_start: DateTime<Utc>) -> Self {
        Self {
            primary: HashMap::new(),
            overflow: HashMap::new(),
            dropped: 0,
            window_start,
        }
    }

    fn insert(&mut self, derived: Derived<K, S>, capacity: Capacity) -> Outcome {
        let Derived { key, stats, tier } = derived;

        if let Some(existing) = self.primary.get_mut(&key) {
            existing.merge(stats);
            return Outcome::Merged;
        }
        if let Some(existing) = self.overflow.get_mut(&key) {
            existing.merge(stats);
            return Outcome::Merged;
        }
        // 버려진 이벤트는 남은 overflow 엔트리와 같은 단위(count)로 셉니다
        if !capacity.has_room(self.primary.len()) {
            self.dropped += stats.count();
            return Outcome::Dropped;
        }

        match tier {
            Tier::Full => {
                self.primary.insert(key, stats);
                Outcome::Inserted
            }
            Tier::Overflow if capacity.has_room(self.overflow.len()) => {
                self.overflow.insert(key, stats);
                Outcome::Inserted
            }
            Tier::Overflow => {
                self.dropped += stats.count();
                Outcome::Dropped
            }
        }
    }
}

// ─── CacheStats ──────────────────────────────────────────────────────

/// 캐시 상태 스냅샷
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    /// primary 엔트리 수
    pub primary: usize,
    /// overflow 엔트리 수
    pub overflow: usize,
    /// 현재 윈도우에서 버려진 이벤트의 count 합
    pub dropped: u64,
}

// ─── AggregationCache ────────────────────────────────────────────────

/// 정책 `P`에 대해 제네릭한 용량 제한 집계 캐시
///
/// `ingest`와 `drain`은 캐시마다 하나인 `parking_lot::Mutex`로 상호 배제됩니다.
/// 서로 다른 캐시는 독립적입니다.
pub struct AggregationCache<P: AggregationPolicy> {
    policy: P,
    capacity: Capacity,
    state: Mutex<CacheState<P::Key, P::Stats>>,
}

impl<P: AggregationPolicy> AggregationCache<P> {
    /// 현재 시각을 윈도우 시작으로 하는 빈 캐시를 생성합니다.
    pub fn new(policy: P, capacity: Capacity) -> Self {
        Self::with_window_start(policy, capacity, Utc::now())
    }

    /// 윈도우 시작 시각을 지정하여 빈 캐시를 생성합니다.
    pub fn with_window_start(policy: P, capacity: Capacity, start: DateTime<Utc>) -> Self {
        Self {
            policy,
            capacity,
            state: Mutex::new(CacheState::new(start)),
        }
    }

    /// 캐시의 정책을 반환합니다.
    pub fn policy(&self) -> &P {
        &self.policy
    }

    /// 캐시 용량을 반환합니다.
    pub fn capacity(&self) -> Capacity {
        self.capacity
    }

    /// 현재 상태 스냅샷을 반환합니다.
    pub fn stats(&self) -> CacheStats {
        let state = self.state.lock();
        CacheStats {
            primary: state.primary.len(),
            overflow: state.overflow.len(),
            dropped: state.dropped,
        }
    }

    /// 이벤트 하나를 반영합니다.
    ///
    /// 키 도출에 실패하면 캐시를 건드리지 않고 에러를 반환합니다.
    /// 용량 초과는 에러가 아니며, 플러시 때 `unlogged` 레코드로 드러납니다.
    pub fn ingest(&self, event: &P::Event) -> Result<(), AggregatorError> {
        let name = self.policy.name();
        let derived = match self.policy.derive(event) {
            Ok(derived) => derived,
            Err(e) => {
                metrics::counter!(m::AGGREGATOR_EVENTS_MALFORMED_TOTAL, m::LABEL_AGGREGATOR => name)
                    .increment(1);
                return Err(e);
            }
        };

        let (outcome, primary_len) = {
            let mut state = self.state.lock();
            let outcome = state.insert(derived, self.capacity);
            (outcome, state.primary.len())
        };

        match outcome {
            Outcome::Merged | Outcome::Inserted => {
                metrics::counter!(m::AGGREGATOR_EVENTS_INGESTED_TOTAL, m::LABEL_AGGREGATOR => name)
                    .increment(1);
            }
            Outcome::Dropped => {
                metrics::counter!(m::AGGREGATOR_EVENTS_DROPPED_TOTAL, m::LABEL_AGGREGATOR => name)
                    .increment(1);
            }
        }
        if outcome == Outcome::Inserted {
            metrics::gauge!(m::AGGREGATOR_CACHE_ENTRIES, m::LABEL_AGGREGATOR => name)
                .set(primary_len as f64);
        }

        Ok(())
    }

    /// 현재 시각을 윈도우 끝으로 하여 모든 레코드를 꺼냅니다.
    pub fn drain(&self) -> Vec<P::Record> {
        self.drain_at(Utc::now())
    }

    /// `now`를 윈도우 끝으로 하여 모든 레코드를 꺼냅니다.
    ///
    /// primary 엔트리를 모두 내보내고, 남은 자리만큼 overflow에서 채웁니다.
    /// 나머지 overflow 엔트리의 count와 버려진 이벤트의 count 합이 0보다 크면
    /// `unlogged` 레코드 하나를 덧붙입니다.
    pub fn drain_at(&self, now: DateTime<Utc>) -> Vec<P::Record> {
        let state = std::mem::replace(&mut *self.state.lock(), CacheState::new(now));
        let CacheState {
            primary,
            overflow,
            dropped,
            window_start,
        } = state;

        let name = self.policy.name();
        let mut backfill = self
            .capacity
            .remaining(primary.len())
            .unwrap_or(usize::MAX);
        let mut records = Vec::with_capacity(primary.len() + overflow.len().min(backfill) + 1);

        for (key, stats) in primary {
            records.push(self.policy.record(&key, stats, window_start, now));
        }

        let mut unlogged = dropped;
        for (key, stats) in overflow {
            if backfill > 0 {
                backfill -= 1;
                records.push(self.policy.record(&key, stats, window_start, now));
            } else {
                unlogged += stats.count();
            }
        }

        if unlogged > 0 {
            tracing::warn!(
                aggregator = name,
                unlogged,
                capacity = %self.capacity,
                "{} logs were not logged",
                unlogged
            );
            metrics::counter!(m::AGGREGATOR_UNLOGGED_TOTAL, m::LABEL_AGGREGATOR => name)
                .increment(unlogged);
            records.push(self.policy.unlogged_record(window_start, now, unlogged));
        }

        metrics::counter!(m::AGGREGATOR_RECORDS_FLUSHED_TOTAL, m::LABEL_AGGREGATOR => name)
            .increment(records.len() as u64);
        metrics::gauge!(m::AGGREGATOR_CACHE_ENTRIES, m::LABEL_AGGREGATOR => name).set(0.0);

        tracing::debug!(aggregator = name, records = records.len(), "drained cache");
        records
    }
}

impl<P: AggregationPolicy> Aggregator<P::Event, P::Record> for AggregationCache<P> {
    fn name(&self) -> &str {
        self.policy.name()
    }

    fn ingest(&self, event: &P::Event) -> Result<(), AggregatorError> {
        AggregationCache::ingest(self, event)
    }

    fn drain(&self) -> Vec<P::Record> {
        AggregationCache::drain(self)
    }
}
