//! 파이프라인 trait -- 백그라운드 컴포넌트 생명주기와 건강 상태

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use serde::Serialize;

use crate::error::SluiceError;

/// dyn-compatible trait에서 사용하는 boxed future
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// 컴포넌트 건강 상태
///
/// 데몬은 모든 컴포넌트 중 가장 나쁜 상태를 전체 상태로 보고합니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum HealthStatus {
    /// 정상 (live + ready)
    Healthy,
    /// 살아있지만 데이터를 내보낼 준비가 되지 않음
    Degraded(String),
    /// 동작 불가
    Unhealthy(String),
}

impl HealthStatus {
    /// 정상 상태인지 확인합니다.
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }

    /// 동작 불가 상태인지 확인합니다.
    pub fn is_unhealthy(&self) -> bool {
        matches!(self, Self::Unhealthy(_))
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Degraded(reason) => write!(f, "degraded: {reason}"),
            Self::Unhealthy(reason) => write!(f, "unhealthy: {reason}"),
        }
    }
}

/// 시작/정지 가능한 백그라운드 컴포넌트
///
/// 데몬의 수신기처럼 자체 태스크를 소유하는 컴포넌트가 구현합니다.
pub trait Pipeline: Send + Sync {
    /// 컴포넌트를 시작합니다. 이미 실행 중이면 에러를 반환합니다.
    fn start(&mut self) -> impl Future<Output = Result<(), SluiceError>> + Send;

    /// 컴포넌트를 정지하고 소유한 태스크가 끝날 때까지 기다립니다.
    fn stop(&mut self) -> impl Future<Output = Result<(), SluiceError>> + Send;

    /// 현재 건강 상태를 반환합니다.
    fn health_check(&self) -> impl Future<Output = HealthStatus> + Send;
}
