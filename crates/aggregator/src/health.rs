//! 컴포넌트별 liveness/readiness 집계
//!
//! 리포터는 헬스 프로브 결과를 [`HealthAggregator`]에 보고하고,
//! 데몬은 집계된 상태를 [`HealthStatus`]로 읽어 로그와 헬스 체크에 사용합니다.
//!
//! 등록 후 한 번도 보고하지 않았거나 마지막 보고가 타임아웃보다 오래된 컴포넌트는
//! live도 ready도 아닌 것으로 간주합니다.
//!
//! # 집계 규칙
//!
//! - 모두 live + ready -> `Healthy`
//! - live지만 ready가 아닌 컴포넌트가 있음 -> `Degraded(reason)`
//! - live가 아닌 컴포넌트가 있음 -> `Unhealthy(reason)`

use std::collections::BTreeMap;
use std::time::Duration;

use parking_lot::RwLock;
use serde::Serialize;
use tokio::time::Instant;
use tracing::warn;

use sluice_core::pipeline::HealthStatus;

/// 컴포넌트 하나의 헬스 보고
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    /// 루프가 살아 있음
    pub live: bool,
    /// 데이터를 내보낼 준비가 됨
    pub ready: bool,
}

/// 조회 시점의 컴포넌트 상태
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComponentHealth {
    pub name: String,
    pub live: bool,
    pub ready: bool,
}

#[derive(Debug)]
struct Entry {
    timeout: Duration,
    last: Option<(HealthReport, Instant)>,
}

impl Entry {
    fn current(&self, now: Instant) -> HealthReport {
        match self.last {
            Some((report, at)) if now.duration_since(at) <= self.timeout => report,
            _ => HealthReport::default(),
        }
    }
}

/// 헬스 집계기
#[derive(Debug, Default)]
pub struct HealthAggregator {
    components: RwLock<BTreeMap<String, Entry>>,
}

impl HealthAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// 컴포넌트를 등록합니다. 이미 등록되어 있으면 타임아웃만 갱신합니다.
    pub fn register(&self, name: &str, timeout: Duration) {
        let mut components = self.components.write();
        components
            .entry(name.to_owned())
            .and_modify(|e| e.timeout = timeout)
            .or_insert(Entry {
                timeout,
                last: None,
            });
    }

    /// 컴포넌트의 현재 상태를 보고합니다.
    ///
    /// 등록되지 않은 이름의 보고는 무시됩니다.
    pub fn report(&self, name: &str, report: HealthReport) {
        let mut components = self.components.write();
        match components.get_mut(name) {
            Some(entry) => entry.last = Some((report, Instant::now())),
            None => warn!(component = name, "health report for unregistered component"),
        }
    }

    /// 모든 컴포넌트의 현재 상태를 이름 순으로 반환합니다.
    pub fn components(&self) -> Vec<ComponentHealth> {
        let now = Instant::now();
        self.components
            .read()
            .iter()
            .map(|(name, entry)| {
                let r = entry.current(now);
                ComponentHealth {
                    name: name.clone(),
                    live: r.live,
                    ready: r.ready,
                }
            })
            .collect()
    }

    /// 전체 liveness/readiness (모든 컴포넌트의 AND)
    pub fn summary(&self) -> HealthReport {
        let components = self.components();
        HealthReport {
            live: components.iter().all(|c| c.live),
            ready: components.iter().all(|c| c.ready),
        }
    }

    /// 집계 상태를 [`HealthStatus`]로 변환합니다.
    pub fn status(&self) -> HealthStatus {
        let components = self.components();

        let not_live: Vec<_> = components
            .iter()
            .filter(|c| !c.live)
            .map(|c| format!("{}: not live", c.name))
            .collect();
        if !not_live.is_empty() {
            return HealthStatus::Unhealthy(not_live.join("; "));
        }

        let not_ready: Vec<_> = components
            .iter()
            .filter(|c| !c.ready)
            .map(|c| format!("{}: not ready", c.name))
            .collect();
        if !not_ready.is_empty() {
            return HealthStatus::Degraded(not_ready.join("; "));
        }

        HealthStatus::Healthy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const READY: HealthReport = HealthReport {
        live: true,
        ready: true,
    };

    #[test]
    fn empty_aggregator_is_healthy() {
        let health = HealthAggregator::new();
        assert!(health.status().is_healthy());
        assert_eq!(health.summary(), READY);
    }

    #[tokio::test(start_paused = true)]
    async fn registered_without_report_is_unhealthy() {
        let health = HealthAggregator::new();
        health.register("dns", Duration::from_secs(20));
        assert!(health.status().is_unhealthy());
        assert!(!health.summary().live);
    }

    #[tokio::test(start_paused = true)]
    async fn live_but_not_ready_is_degraded() {
        let health = HealthAggregator::new();
        health.register("l7", Duration::from_secs(20));
        health.report(
            "l7",
            HealthReport {
                live: true,
                ready: false,
            },
        );
        assert_eq!(
            health.status(),
            HealthStatus::Degraded("l7: not ready".to_owned())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn all_ready_is_healthy() {
        let health = HealthAggregator::new();
        health.register("dns", Duration::from_secs(20));
        health.register("l7", Duration::from_secs(20));
        health.report("dns", READY);
        health.report("l7", READY);
        assert!(health.status().is_healthy());
        assert_eq!(health.components().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_report_expires() {
        let health = HealthAggregator::new();
        health.register("dns", Duration::from_secs(20));
        health.report("dns", READY);
        assert!(health.summary().ready);

        tokio::time::advance(Duration::from_secs(21)).await;
        assert!(!health.summary().live);
        assert!(health.status().is_unhealthy());
    }

    #[tokio::test(start_paused = true)]
    async fn unregistered_report_is_ignored() {
        let health = HealthAggregator::new();
        health.report("ghost", READY);
        assert!(health.components().is_empty());
    }
}
