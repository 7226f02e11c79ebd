//! 도메인 타입 -- 엔드포인트 식별자와 레이블
//!
//! DNS/L7 정책 모두 클라이언트/서버(출발지/목적지)를 같은 메타데이터 형식으로
//! 표현합니다. 집계 키에 들어가므로 모두 `Eq + Hash + Ord`를 구현합니다.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// 엔드포인트 레이블 맵
///
/// 출력 순서가 안정적이도록 `BTreeMap`을 사용합니다.
pub type Labels = BTreeMap<String, String>;

/// 엔드포인트 유형
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointType {
    /// 워크로드 엔드포인트 (pod 등)
    Wep,
    /// 호스트 엔드포인트
    Hep,
    /// 네트워크 셋
    Ns,
    /// 알려지지 않은 외부 네트워크
    #[default]
    Net,
}

impl fmt::Display for EndpointType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Wep => "wep",
            Self::Hep => "hep",
            Self::Ns => "ns",
            Self::Net => "net",
        };
        f.write_str(s)
    }
}

/// 엔드포인트 메타데이터
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EndpointMetadata {
    /// 엔드포인트 유형
    #[serde(rename = "type", default)]
    pub endpoint_type: EndpointType,
    /// 네임스페이스
    #[serde(default)]
    pub namespace: String,
    /// 이름 (예: pod 이름)
    #[serde(default)]
    pub name: String,
    /// 집계된 이름 (예: `nginx-*`)
    #[serde(rename = "name_aggr", default)]
    pub aggregated_name: String,
}

/// IP 주소를 포함한 엔드포인트 메타데이터
///
/// DNS 서버 목록의 키로 사용됩니다. IP는 문자열로 보관하여
/// 집계 시 빈 값(`None`)으로 지울 수 있게 합니다.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EndpointMetadataWithIp {
    #[serde(flatten)]
    pub endpoint: EndpointMetadata,
    #[serde(default)]
    pub ip: Option<String>,
}
