//! 리포터 -- 지터 플러시 루프, 싱크 팬아웃, 헬스 프로브
//!
//! [`Reporter`]는 이벤트 타입 `E`와 레코드 타입 `R`에 대해 제네릭이며,
//! 등록된 집계기들에 이벤트를 전달하고 주기적으로 drain하여 바인딩된 싱크로 보냅니다.
//!
//! # 상태 전이
//! ```text
//! Created --start()--> Running --stop()--> Stopped --start()--> Running
//! ```
//!
//! # 처리 루프
//! ```text
//! select! {
//!     cancel      => 마지막 플러시 후 종료
//!     flush timer => 집계기마다 drain -> 바인딩된 싱크마다 report (±10% 지터)
//!     health tick => 모든 싱크 start() -> ready 여부를 HealthAggregator에 보고
//! }
//! ```
//!
//! 한 싱크의 실패는 다른 싱크로의 전달을 막지 않으며 재시도하지 않습니다.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use sluice_core::metrics as m;
use sluice_core::pipeline::HealthStatus;

use crate::error::AggregatorError;
use crate::health::{HealthAggregator, HealthReport};
use crate::policy::Aggregator;
use crate::sink::{DynSink, Sink};

/// 이름 있는 싱크 맵
pub type SinkMap<R> = HashMap<String, Arc<dyn DynSink<R>>>;

/// 리포터 주기 설정
#[derive(Debug, Clone)]
pub struct ReporterSettings {
    /// 플러시 주기 (매 틱마다 ±10% 지터 적용)
    pub flush_interval: Duration,
    /// 싱크 준비 상태 확인 주기
    pub health_interval: Duration,
    /// 헬스 보고 대상
    pub health: Arc<HealthAggregator>,
}

impl Default for ReporterSettings {
    fn default() -> Self {
        Self {
            flush_interval: Duration::from_secs(300),
            health_interval: Duration::from_secs(10),
            health: Arc::new(HealthAggregator::new()),
        }
    }
}

/// `[0.9p, 1.1p]` 구간의 균등 분포에서 다음 플러시 대기 시간을 뽑습니다.
pub fn jittered(period: Duration) -> Duration {
    period.mul_f64(0.9 + 0.2 * rand::random::<f64>())
}

/// 집계기와 바인딩된 싱크
struct Binding<E, R> {
    aggregator: Arc<dyn Aggregator<E, R>>,
    sinks: Vec<(String, Arc<dyn DynSink<R>>)>,
}

/// 리포터 실행 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReporterState {
    Created,
    Running,
    Stopped,
}

struct Lifecycle {
    state: ReporterState,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

/// 집계기 팬아웃 리포터
///
/// `start`/`stop`/`ingest`는 `&self`로 호출되므로 `Arc<Reporter>`를
/// 수신기와 데몬이 함께 가질 수 있습니다. 집계기 등록은 시작 전에만 가능합니다.
///
/// # 사용 예시
/// ```ignore
/// let mut reporter = Reporter::builder("l7")
///     .sink("stdout", StdoutSink::new("l7"))
///     .flush_interval(Duration::from_secs(300))
///     .build();
/// reporter.add_aggregator(Arc::new(cache), &["stdout"])?;
/// reporter.start()?;
/// reporter.ingest(&update)?;
/// reporter.stop().await?;
/// ```
pub struct Reporter<E, R> {
    name: String,
    sinks: SinkMap<R>,
    bindings: Vec<Arc<Binding<E, R>>>,
    settings: ReporterSettings,
    lifecycle: Mutex<Lifecycle>,
}

impl<E, R> Reporter<E, R>
where
    E: 'static,
    R: Send + Sync + 'static,
{
    /// 새 리포터를 생성하고 헬스 집계기에 등록합니다.
    ///
    /// 헬스 타임아웃은 확인 주기의 두 배입니다.
    pub fn new(name: impl Into<String>, sinks: SinkMap<R>, settings: ReporterSettings) -> Self {
        let name = name.into();
        settings
            .health
            .register(&name, settings.health_interval * 2);

        Self {
            name,
            sinks,
            bindings: Vec::new(),
            settings,
            lifecycle: Mutex::new(Lifecycle {
                state: ReporterState::Created,
                cancel: CancellationToken::new(),
                task: None,
            }),
        }
    }

    /// 빌더를 생성합니다.
    pub fn builder(name: impl Into<String>) -> ReporterBuilder<E, R> {
        ReporterBuilder::new(name)
    }

    /// 리포터 이름 (헬스 컴포넌트 이름과 메트릭 레이블)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 등록된 집계기 수
    pub fn aggregator_count(&self) -> usize {
        self.bindings.len()
    }

    /// 처리 루프가 실행 중인지 여부
    pub fn is_running(&self) -> bool {
        self.lifecycle.lock().state == ReporterState::Running
    }

    /// 현재 상태 이름
    pub fn state_name(&self) -> &'static str {
        match self.lifecycle.lock().state {
            ReporterState::Created => "created",
            ReporterState::Running => "running",
            ReporterState::Stopped => "stopped",
        }
    }

    /// 집계기를 이름 있는 싱크들에 바인딩하여 등록합니다.
    ///
    /// 싱크 이름은 여기서 해석되며, 없는 이름이면 `UnknownSink`를 반환합니다.
    pub fn add_aggregator(
        &mut self,
        aggregator: Arc<dyn Aggregator<E, R>>,
        sink_names: &[&str],
    ) -> Result<(), AggregatorError> {
        if self.lifecycle.lock().state == ReporterState::Running {
            return Err(AggregatorError::AlreadyRunning);
        }

        let sinks = sink_names
            .iter()
            .map(|&sink| match self.sinks.get(sink) {
                Some(s) => Ok((sink.to_owned(), Arc::clone(s))),
                None => Err(AggregatorError::UnknownSink {
                    aggregator: aggregator.name().to_owned(),
                    sink: sink.to_owned(),
                }),
            })
            .collect::<Result<Vec<_>, _>>()?;

        info!(
            reporter = %self.name,
            aggregator = aggregator.name(),
            sinks = ?sink_names,
            "aggregator registered"
        );
        self.bindings.push(Arc::new(Binding { aggregator, sinks }));
        Ok(())
    }

    /// 이벤트를 등록 순서대로 모든 집계기에 전달합니다.
    ///
    /// 첫 에러에서 멈추며 이미 반영된 집계기는 되돌리지 않습니다.
    pub fn ingest(&self, event: &E) -> Result<(), AggregatorError> {
        for binding in &self.bindings {
            binding.aggregator.ingest(event)?;
        }
        Ok(())
    }

    /// 처리 루프를 tokio 런타임에 띄우고 바로 반환합니다.
    pub fn start(&self) -> Result<(), AggregatorError> {
        let mut lifecycle = self.lifecycle.lock();
        if lifecycle.state == ReporterState::Running {
            return Err(AggregatorError::AlreadyRunning);
        }

        let cancel = CancellationToken::new();
        let worker = Worker {
            name: self.name.clone(),
            bindings: self.bindings.clone(),
            sinks: self
                .sinks
                .iter()
                .map(|(n, s)| (n.clone(), Arc::clone(s)))
                .collect(),
            settings: self.settings.clone(),
        };
        lifecycle.task = Some(tokio::spawn(worker.run(cancel.clone())));
        lifecycle.cancel = cancel;
        lifecycle.state = ReporterState::Running;

        info!(
            reporter = %self.name,
            aggregators = self.bindings.len(),
            flush_interval_secs = self.settings.flush_interval.as_secs(),
            "reporter started"
        );
        Ok(())
    }

    /// 루프를 취소하고 마지막 플러시가 끝날 때까지 기다립니다.
    pub async fn stop(&self) -> Result<(), AggregatorError> {
        let task = {
            let mut lifecycle = self.lifecycle.lock();
            if lifecycle.state != ReporterState::Running {
                return Err(AggregatorError::NotRunning);
            }
            lifecycle.cancel.cancel();
            lifecycle.state = ReporterState::Stopped;
            lifecycle.task.take()
        };

        if let Some(task) = task {
            if let Err(e) = task.await {
                error!(reporter = %self.name, error = %e, "reporter task failed");
            }
        }
        info!(reporter = %self.name, "reporter stopped");
        Ok(())
    }

    /// 리포터의 건강 상태를 반환합니다.
    pub fn health_check(&self) -> HealthStatus {
        match self.lifecycle.lock().state {
            ReporterState::Running => {
                match self
                    .settings
                    .health
                    .components()
                    .into_iter()
                    .find(|c| c.name == self.name)
                {
                    Some(c) if c.live && c.ready => HealthStatus::Healthy,
                    Some(c) if c.live => {
                        HealthStatus::Degraded(format!("{}: sinks not ready", self.name))
                    }
                    _ => HealthStatus::Unhealthy(format!("{}: no recent health report", self.name)),
                }
            }
            ReporterState::Created => HealthStatus::Unhealthy("not started".to_owned()),
            ReporterState::Stopped => HealthStatus::Unhealthy("stopped".to_owned()),
        }
    }
}

impl<E, R> Drop for Reporter<E, R> {
    fn drop(&mut self) {
        self.lifecycle.get_mut().cancel.cancel();
    }
}

// ─── Worker ──────────────────────────────────────────────────────────

/// 스폰된 처리 루프가 소유하는 상태
struct Worker<E, R> {
    name: String,
    bindings: Vec<Arc<Binding<E, R>>>,
    sinks: Vec<(String, Arc<dyn DynSink<R>>)>,
    settings: ReporterSettings,
}

impl<E, R> Worker<E, R>
where
    E: 'static,
    R: Send + Sync + 'static,
{
    async fn run(self, cancel: CancellationToken) {
        let flush_timer = tokio::time::sleep(jittered(self.settings.flush_interval));
        tokio::pin!(flush_timer);

        let mut health_tick = tokio::time::interval(self.settings.health_interval);
        health_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    debug!(reporter = %self.name, "reporter cancelled, final flush");
                    self.flush().await;
                    break;
                }
                _ = &mut flush_timer => {
                    self.flush().await;
                    flush_timer
                        .as_mut()
                        .reset(Instant::now() + jittered(self.settings.flush_interval));
                }
                _ = health_tick.tick() => {
                    self.probe().await;
                }
            }
        }
    }

    /// 집계기마다 한 번씩 drain하고 바인딩된 싱크로 보냅니다.
    async fn flush(&self) {
        for binding in &self.bindings {
            let batch = binding.aggregator.drain();
            if batch.is_empty() {
                continue;
            }

            for (sink_name, sink) in &binding.sinks {
                if let Err(e) = sink.report(&batch).await {
                    error!(
                        reporter = %self.name,
                        aggregator = binding.aggregator.name(),
                        sink = %sink_name,
                        records = batch.len(),
                        error = %e,
                        "failed to dispatch batch"
                    );
                    metrics::counter!(
                        m::REPORTER_DISPATCH_ERRORS_TOTAL,
                        m::LABEL_SINK => sink_name.clone()
                    )
                    .increment(1);
                }
            }
        }
    }

    /// 모든 싱크의 준비 상태를 확인하고 헬스 집계기에 보고합니다.
    async fn probe(&self) {
        let mut ready = true;
        for (sink_name, sink) in &self.sinks {
            if let Err(e) = sink.start().await {
                warn!(reporter = %self.name, sink = %sink_name, error = %e, "sink failed to start");
                ready = false;
            }
        }

        self.settings
            .health
            .report(&self.name, HealthReport { live: true, ready });
        metrics::gauge!(m::REPORTER_READY, m::LABEL_AGGREGATOR => self.name.clone())
            .set(if ready { 1.0 } else { 0.0 });
    }
}

// ─── Builder ─────────────────────────────────────────────────────────

/// 리포터 빌더
pub struct ReporterBuilder<E, R> {
    name: String,
    sinks: SinkMap<R>,
    settings: ReporterSettings,
    _event: PhantomData<fn(&E)>,
}

impl<E: 'static, R: Send + Sync + 'static> ReporterBuilder<E, R> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sinks: HashMap::new(),
            settings: ReporterSettings::default(),
            _event: PhantomData,
        }
    }

    /// 이름 있는 싱크를 추가합니다.
    pub fn sink(self, name: impl Into<String>, sink: impl Sink<R>) -> Self {
        self.dyn_sink(name, Arc::new(sink))
    }

    /// 이미 공유 중인 싱크를 추가합니다.
    pub fn dyn_sink(mut self, name: impl Into<String>, sink: Arc<dyn DynSink<R>>) -> Self {
        self.sinks.insert(name.into(), sink);
        self
    }

    pub fn flush_interval(mut self, interval: Duration) -> Self {
        self.settings.flush_interval = interval;
        self
    }

    pub fn health_interval(mut self, interval: Duration) -> Self {
        self.settings.health_interval = interval;
        self
    }

    /// 공유 헬스 집계기를 지정합니다. 지정하지 않으면 리포터 전용 집계기를 사용합니다.
    pub fn health(mut self, health: Arc<HealthAggregator>) -> Self {
        self.settings.health = health;
        self
    }

    pub fn build(self) -> Reporter<E, R> {
        Reporter::new(self.name, self.sinks, self.settings)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::cache::tests::{CountPolicy, Ev, Rec, full};
    use crate::cache::{AggregationCache, Capacity};
    use crate::sink::mock::MockSink;

    const FLUSH: Duration = Duration::from_secs(60);

    fn cache() -> Arc<AggregationCache<CountPolicy>> {
        Arc::new(AggregationCache::new(CountPolicy, Capacity::Unbounded))
    }

    fn builder() -> ReporterBuilder<Ev, Rec> {
        Reporter::<Ev, Rec>::builder("test")
            .flush_interval(FLUSH)
            .health_interval(Duration::from_secs(10))
    }

    #[test]
    fn jitter_stays_within_ten_percent() {
        for _ in 0..1000 {
            let d = jittered(FLUSH);
            assert!(d >= FLUSH.mul_f64(0.9) && d <= FLUSH.mul_f64(1.1), "{d:?}");
        }
    }

    #[test]
    fn unknown_sink_is_rejected() {
        let mut reporter: Reporter<Ev, Rec> = builder().sink("a", MockSink::new()).build();
        let err = reporter
            .add_aggregator(cache(), &["a", "missing"])
            .unwrap_err();
        assert!(matches!(
            err,
            AggregatorError::UnknownSink { ref sink, .. } if sink == "missing"
        ));
        assert_eq!(reporter.aggregator_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn lifecycle_transitions() {
        let mut reporter: Reporter<Ev, Rec> = builder().build();
        reporter.add_aggregator(cache(), &[]).unwrap();
        assert_eq!(reporter.state_name(), "created");
        assert!(!reporter.is_running());
        assert!(matches!(
            reporter.stop().await,
            Err(AggregatorError::NotRunning)
        ));

        reporter.start().unwrap();
        assert_eq!(reporter.state_name(), "running");
        assert!(reporter.is_running());
        assert!(matches!(
            reporter.start(),
            Err(AggregatorError::AlreadyRunning)
        ));
        assert!(matches!(
            reporter.add_aggregator(cache(), &[]),
            Err(AggregatorError::AlreadyRunning)
        ));

        reporter.stop().await.unwrap();
        assert_eq!(reporter.state_name(), "stopped");
        assert!(!reporter.is_running());

        reporter.start().unwrap();
        reporter.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn flush_tick_dispatches_to_bound_sinks() {
        let sink = Arc::new(MockSink::<Rec>::new());
        let mut reporter: Reporter<Ev, Rec> = builder().dyn_sink("mock", sink.clone()).build();
        reporter.add_aggregator(cache(), &["mock"]).unwrap();
        reporter.start().unwrap();

        reporter.ingest(&full("a")).unwrap();
        reporter.ingest(&full("a")).unwrap();
        reporter.ingest(&full("b")).unwrap();

        tokio::time::sleep(FLUSH.mul_f64(1.2)).await;

        {
            let batches = sink.batches.lock();
            assert_eq!(batches.len(), 1);
            assert_eq!(batches[0].len(), 2);
        }

        // 빈 윈도우는 전달하지 않습니다.
        tokio::time::sleep(FLUSH.mul_f64(1.2)).await;
        assert_eq!(sink.batches.lock().len(), 1);

        reporter.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn failing_sink_does_not_block_others() {
        let bad = Arc::new(MockSink::<Rec>::new().failing_report());
        let good = Arc::new(MockSink::<Rec>::new());
        let mut reporter: Reporter<Ev, Rec> = builder()
            .dyn_sink("bad", bad.clone())
            .dyn_sink("good", good.clone())
            .build();
        reporter.add_aggregator(cache(), &["bad", "good"]).unwrap();
        reporter.start().unwrap();

        reporter.ingest(&full("a")).unwrap();
        tokio::time::sleep(FLUSH.mul_f64(1.2)).await;

        assert!(bad.batches.lock().is_empty());
        assert_eq!(good.batches.lock().len(), 1);
        reporter.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn stop_performs_final_flush() {
        let sink = Arc::new(MockSink::<Rec>::new());
        let mut reporter: Reporter<Ev, Rec> = builder().dyn_sink("mock", sink.clone()).build();
        reporter.add_aggregator(cache(), &["mock"]).unwrap();
        reporter.start().unwrap();

        reporter.ingest(&full("a")).unwrap();
        reporter.stop().await.unwrap();

        assert_eq!(sink.batches.lock().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn ingest_stops_at_first_error() {
        let first = cache();
        let second = cache();
        let mut reporter: Reporter<Ev, Rec> = builder().build();
        reporter.add_aggregator(first.clone(), &[]).unwrap();
        reporter.add_aggregator(second.clone(), &[]).unwrap();

        assert!(reporter.ingest(&full("")).is_err());
        reporter.ingest(&full("a")).unwrap();
        assert_eq!(first.stats().primary, 1);
        assert_eq!(second.stats().primary, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn health_probe_reports_readiness() {
        let health = Arc::new(HealthAggregator::new());
        let ok = Arc::new(MockSink::<Rec>::new());
        let mut reporter: Reporter<Ev, Rec> = builder()
            .health(health.clone())
            .dyn_sink("ok", ok.clone())
            .build();
        reporter.add_aggregator(cache(), &["ok"]).unwrap();

        assert!(health.status().is_unhealthy());
        reporter.start().unwrap();
        tokio::time::sleep(Duration::from_millis(1)).await;

        assert!(ok.start_calls.load(Ordering::SeqCst) >= 1);
        assert!(health.status().is_healthy());
        assert!(reporter.health_check().is_healthy());

        ok.fail_start.store(true, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(11)).await;

        assert_eq!(
            health.status(),
            HealthStatus::Degraded("test: not ready".to_owned())
        );
        assert!(matches!(reporter.health_check(), HealthStatus::Degraded(_)));

        reporter.stop().await.unwrap();
    }
}
