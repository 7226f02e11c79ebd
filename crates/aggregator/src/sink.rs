//! 외부 싱크 계약
//!
//! [`Sink`]는 플러시된 레코드 배치를 받는 외부 목적지입니다.
//! RPITIT를 사용하므로 `dyn Sink`가 불가하여, 리포터는 [`DynSink`]로 싱크를 보관합니다.
//! `Sink`를 구현한 타입은 자동으로 `DynSink`도 구현됩니다.

use std::future::Future;

use sluice_core::pipeline::BoxFuture;

use crate::error::SinkError;

/// 레코드 배치를 받는 싱크
pub trait Sink<R>: Send + Sync + 'static {
    /// 싱크를 준비합니다.
    ///
    /// 헬스 프로브마다 호출되므로 멱등이어야 합니다.
    fn start(&self) -> impl Future<Output = Result<(), SinkError>> + Send;

    /// 한 플러시 윈도우의 레코드 배치를 전달합니다.
    ///
    /// 실패해도 리포터는 재시도하지 않습니다.
    fn report(&self, batch: &[R]) -> impl Future<Output = Result<(), SinkError>> + Send;
}

/// dyn-compatible 싱크 trait
pub trait DynSink<R>: Send + Sync {
    /// 싱크를 준비합니다.
    fn start(&self) -> BoxFuture<'_, Result<(), SinkError>>;

    /// 레코드 배치를 전달합니다.
    fn report<'a>(&'a self, batch: &'a [R]) -> BoxFuture<'a, Result<(), SinkError>>;
}

impl<R: 'static, T: Sink<R>> DynSink<R> for T {
    fn start(&self) -> BoxFuture<'_, Result<(), SinkError>> {
        Box::pin(Sink::start(self))
    }

    fn report<'a>(&'a self, batch: &'a [R]) -> BoxFuture<'a, Result<(), SinkError>> {
        Box::pin(Sink::report(self, batch))
    }
}
