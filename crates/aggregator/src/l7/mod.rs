//! L7/HTTP 트랜잭션 집계
//!
//! - [`url`]: URL 트리밍과 문자 수 제한
//! - [`service`]: 도메인에서 서비스 이름/네임스페이스 추론
//! - [`policy`]: 집계 키 정책과 출력 레코드

pub mod policy;
pub mod service;
pub mod url;

pub use policy::{
    L7AggregationKind, L7Endpoint, L7Key, L7Log, L7LogDetails, L7LogType, L7Policy, L7Stats,
    L7Update,
};
pub use service::{address_and_port, extract_k8s_service_name_and_namespace};
pub use url::{TrimUrl, UrlTrim, limit_url_chars};
