//! 집계 엔진 에러 타입
//!
//! [`AggregatorError`]는 키 도출, 리포터 구성, 생명주기 전이에서 발생하는 에러를,
//! [`SinkError`]는 외부 싱크 I/O 에러를 표현합니다.
//! `From<AggregatorError> for SluiceError` 변환이 구현되어 있어
//! 데몬에서 `?` 연산자로 자연스럽게 전파할 수 있습니다.

use sluice_core::error::{ConfigError, PipelineError, SluiceError};

/// 집계 엔진 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum AggregatorError {
    /// 이벤트에서 집계 키를 도출할 수 없음 (예: 질문이 없는 DNS 메시지)
    #[error("malformed event: {reason}")]
    MalformedEvent {
        /// 실패 사유
        reason: String,
    },

    /// 등록되지 않은 싱크 이름으로 집계기를 바인딩하려 함
    #[error("aggregator '{aggregator}' references unknown sink '{sink}'")]
    UnknownSink {
        /// 집계기 이름
        aggregator: String,
        /// 찾을 수 없는 싱크 이름
        sink: String,
    },

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// 리포터가 이미 실행 중
    #[error("reporter already running")]
    AlreadyRunning,

    /// 리포터가 실행 중이 아님
    #[error("reporter not running")]
    NotRunning,

    /// 싱크 에러
    #[error("sink error: {0}")]
    Sink(#[from] SinkError),
}

/// 외부 싱크 에러
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// 싱크를 사용할 수 없음 (연결 실패, 미준비 등)
    #[error("sink '{sink}' unavailable: {reason}")]
    Unavailable {
        /// 싱크 이름
        sink: String,
        /// 사유
        reason: String,
    },

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// 레코드 직렬화 실패
    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),
}

impl From<AggregatorError> for SluiceError {
    fn from(err: AggregatorError) -> Self {
        match err {
            AggregatorError::Config { field, reason } => {
                SluiceError::Config(ConfigError::InvalidValue { field, reason })
            }
            AggregatorError::UnknownSink { aggregator, sink } => {
                SluiceError::Config(ConfigError::InvalidValue {
                    field: format!("{aggregator}.sinks"),
                    reason: format!("unknown sink '{sink}'"),
                })
            }
            AggregatorError::AlreadyRunning => SluiceError::Pipeline(PipelineError::AlreadyRunning),
            AggregatorError::NotRunning => SluiceError::Pipeline(PipelineError::NotRunning),
            other => SluiceError::Pipeline(PipelineError::InitFailed(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_sink_display_names_both_sides() {
        let err = AggregatorError::UnknownSink {
            aggregator: "dns".to_owned(),
            sink: "kafka".to_owned(),
        };
        let msg = err.to_string();
        assert!(msg.contains("dns"));
        assert!(msg.contains("kafka"));
    }

    #[test]
    fn unknown_sink_converts_to_config_error() {
        let err: SluiceError = AggregatorError::UnknownSink {
            aggregator: "l7".to_owned(),
            sink: "missing".to_owned(),
        }
        .into();
        match err {
            SluiceError::Config(ConfigError::InvalidValue { field, reason }) => {
                assert_eq!(field, "l7.sinks");
                assert!(reason.contains("missing"));
            }
            other => panic!("unexpected conversion: {other:?}"),
        }
    }

    #[test]
    fn lifecycle_errors_map_to_pipeline_errors() {
        let err: SluiceError = AggregatorError::AlreadyRunning.into();
        assert!(matches!(
            err,
            SluiceError::Pipeline(PipelineError::AlreadyRunning)
        ));

        let err: SluiceError = AggregatorError::NotRunning.into();
        assert!(matches!(err, SluiceError::Pipeline(PipelineError::NotRunning)));
    }

    #[test]
    fn malformed_event_converts_to_pipeline_error() {
        let err: SluiceError = AggregatorError::MalformedEvent {
            reason: "no questions".to_owned(),
        }
        .into();
        assert!(matches!(err, SluiceError::Pipeline(PipelineError::InitFailed(_))));
    }

    #[test]
    fn sink_error_wraps_io() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed");
        let err: AggregatorError = SinkError::from(io).into();
        assert!(err.to_string().contains("closed"));
    }
}
