//! DNS 메시지 모델과 레코드 셋 표현
//!
//! 클래스, 타입, 응답 코드는 알려진 값이면 니모닉(`IN`, `A`, `NXDomain`)으로,
//! 모르는 값이면 텍스트에서는 `#N`, JSON에서는 정수로 표현합니다.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::net::IpAddr;
use std::time::Duration;

use base64::Engine as _;
use serde::ser::SerializeSeq;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

// ─── 코드 newtype ───────────────────────────────────────────────────

/// 니모닉 테이블을 가진 16비트 DNS 코드 newtype을 정의합니다.
macro_rules! dns_code {
    ($(#[$meta:meta])* $name:ident { $($value:literal => $mnemonic:literal),* $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u16);

        impl $name {
            /// 알려진 값이면 니모닉을 반환합니다.
            pub fn mnemonic(self) -> Option<&'static str> {
                match self.0 {
                    $($value => Some($mnemonic),)*
                    _ => None,
                }
            }

            /// 니모닉 또는 `#N` 표기에서 값을 찾습니다.
            pub fn from_mnemonic(s: &str) -> Option<Self> {
                if let Some(n) = s.strip_prefix('#') {
                    return n.parse().ok().map(Self);
                }
                match s {
                    $($mnemonic => Some(Self($value)),)*
                    _ => None,
                }
            }
        }

        impl From<u16> for $name {
            fn from(v: u16) -> Self {
                Self(v)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match self.mnemonic() {
                    Some(m) => f.write_str(m),
                    None => write!(f, "#{}", self.0),
                }
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                match self.mnemonic() {
                    Some(m) => serializer.serialize_str(m),
                    None => serializer.serialize_u16(self.0),
                }
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                match CodeRepr::deserialize(deserializer)? {
                    CodeRepr::Number(n) => Ok(Self(n)),
                    CodeRepr::Text(s) => Self::from_mnemonic(&s).ok_or_else(|| {
                        serde::de::Error::custom(format!(
                            "unknown {} '{}'",
                            stringify!($name),
                            s
                        ))
                    }),
                }
            }
        }
    };
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CodeRepr {
    Number(u16),
    Text(String),
}

dns_code!(
    /// DNS 클래스
    DnsClass {
        1 => "IN",
        2 => "CS",
        3 => "CH",
        4 => "HS",
        255 => "Any",
    }
);

dns_code!(
    /// DNS 레코드 타입
    DnsType {
        1 => "A",
        2 => "NS",
        3 => "MD",
        4 => "MF",
        5 => "CNAME",
        6 => "SOA",
        7 => "MB",
        8 => "MG",
        9 => "MR",
        10 => "NULL",
        11 => "WKS",
        12 => "PTR",
        13 => "HINFO",
        14 => "MINFO",
        15 => "MX",
        16 => "TXT",
        28 => "AAAA",
        33 => "SRV",
        41 => "OPT",
        256 => "URI",
    }
);

dns_code!(
    /// DNS 응답 코드
    DnsResponseCode {
        0 => "NoError",
        1 => "FormErr",
        2 => "ServFail",
        3 => "NXDomain",
        4 => "NotImp",
        5 => "Refused",
        6 => "YXDomain",
        7 => "YXRRSet",
        8 => "NXRRSet",
        9 => "NotAuth",
        10 => "NotZone",
        16 => "BADVERS",
        17 => "BADKEY",
        18 => "BADTIME",
        19 => "BADMODE",
        20 => "BADNAME",
        21 => "BADALG",
        22 => "BADTRUNC",
        23 => "BADCOOKIE",
    }
);

impl DnsClass {
    pub const IN: Self = Self(1);
}

impl DnsType {
    pub const A: Self = Self(1);
    pub const NS: Self = Self(2);
    pub const CNAME: Self = Self(5);
    pub const SOA: Self = Self(6);
    pub const MX: Self = Self(15);
    pub const TXT: Self = Self(16);
    pub const AAAA: Self = Self(28);
    pub const SRV: Self = Self(33);
}

impl DnsResponseCode {
    pub const NO_ERROR: Self = Self(0);
    pub const NX_DOMAIN: Self = Self(3);
}

// ─── DnsName ─────────────────────────────────────────────────────────

/// 이름 + 클래스 + 타입
///
/// 정렬은 이름의 레이블을 오른쪽(루트)부터 비교한 뒤 클래스, 타입 순으로 합니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DnsName {
    pub name: String,
    pub class: DnsClass,
    #[serde(rename = "type")]
    pub rtype: DnsType,
}

impl DnsName {
    pub fn new(name: impl Into<String>, class: DnsClass, rtype: DnsType) -> Self {
        Self {
            name: name.into(),
            class,
            rtype,
        }
    }
}

impl Ord for DnsName {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name
            .rsplit('.')
            .cmp(other.name.rsplit('.'))
            .then_with(|| self.class.cmp(&other.class))
            .then_with(|| self.rtype.cmp(&other.rtype))
    }
}

impl PartialOrd for DnsName {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for DnsName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.name, self.class, self.rtype)
    }
}

/// 질의 이름을 정규화합니다.
///
/// 소문자로 바꾸고, `.`으로 나눈 뒤 빈 레이블을 버리고 다시 합칩니다.
pub fn canonicalize_name(name: &str) -> String {
    name.to_lowercase()
        .split('.')
        .filter(|label| !label.is_empty())
        .collect::<Vec<_>>()
        .join(".")
}

// ─── 리소스 레코드 ──────────────────────────────────────────────────

/// SOA 레코드 데이터
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Soa {
    pub mname: String,
    pub rname: String,
    #[serde(default)]
    pub serial: u32,
    #[serde(default)]
    pub refresh: u32,
    #[serde(default)]
    pub retry: u32,
    #[serde(default)]
    pub expire: u32,
    #[serde(default)]
    pub minimum: u32,
}

/// SRV 레코드 데이터
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Srv {
    #[serde(default)]
    pub priority: u16,
    #[serde(default)]
    pub weight: u16,
    #[serde(default)]
    pub port: u16,
    pub name: String,
}

/// MX 레코드 데이터
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mx {
    #[serde(default)]
    pub preference: u16,
    pub name: String,
}

/// 디코딩된 레코드 데이터
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum RData {
    /// A/AAAA
    Ip(IpAddr),
    /// NS/CNAME/PTR 등 이름 하나
    Name(String),
    /// TXT 조각들
    Txt(Vec<String>),
    Soa(Soa),
    Srv(Srv),
    Mx(Mx),
    /// 디코딩하지 않은 원본 바이트
    Raw(Vec<u8>),
}

impl fmt::Display for RData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ip(ip) => write!(f, "{ip}"),
            Self::Name(name) => f.write_str(name),
            Self::Txt(parts) => {
                for part in parts {
                    f.write_str(part)?;
                }
                Ok(())
            }
            Self::Soa(soa) => write!(
                f,
                "{} {} {} {} {} {} {}",
                soa.mname, soa.rname, soa.serial, soa.refresh, soa.retry, soa.expire, soa.minimum
            ),
            Self::Srv(srv) => write!(
                f,
                "{} {} {} {}",
                srv.priority, srv.weight, srv.port, srv.name
            ),
            Self::Mx(mx) => write!(f, "{} {}", mx.preference, mx.name),
            Self::Raw(bytes) => {
                f.write_str(&base64::engine::general_purpose::STANDARD.encode(bytes))
            }
        }
    }
}

/// 리소스 레코드
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRecord {
    pub name: String,
    #[serde(default = "default_class")]
    pub class: DnsClass,
    #[serde(rename = "type")]
    pub rtype: DnsType,
    pub rdata: RData,
}

fn default_class() -> DnsClass {
    DnsClass::IN
}

/// 질문 섹션 엔트리
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsQuestion {
    pub name: String,
    #[serde(default = "default_class")]
    pub class: DnsClass,
    #[serde(rename = "type")]
    pub rtype: DnsType,
}

/// 디코딩된 DNS 응답 메시지
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsMessage {
    #[serde(default)]
    pub rcode: DnsResponseCode,
    #[serde(default)]
    pub questions: Vec<DnsQuestion>,
    #[serde(default)]
    pub answers: Vec<ResourceRecord>,
    #[serde(default)]
    pub authorities: Vec<ResourceRecord>,
    #[serde(default)]
    pub additionals: Vec<ResourceRecord>,
}

// ─── DnsRrSets ───────────────────────────────────────────────────────

/// 이름별 레코드 데이터 셋
///
/// 레코드 데이터는 렌더링된 문자열로 보관하며 추가할 때 정렬 위치에 삽입합니다.
/// 중복은 유지합니다.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct DnsRrSets(BTreeMap<DnsName, Vec<String>>);

impl DnsRrSets {
    pub fn new() -> Self {
        Self::default()
    }

    /// 레코드 데이터를 정렬 순서를 유지하며 추가합니다.
    pub fn add(&mut self, name: DnsName, rdata: impl Into<String>) {
        let rdata = rdata.into();
        let set = self.0.entry(name).or_default();
        let at = set.partition_point(|existing| *existing <= rdata);
        set.insert(at, rdata);
    }

    /// 레코드 목록 전체를 추가합니다.
    pub fn extend_from_records(&mut self, records: &[ResourceRecord]) {
        for rr in records {
            self.add(
                DnsName::new(rr.name.clone(), rr.class, rr.rtype),
                rr.rdata.to_string(),
            );
        }
    }

    /// 다른 셋에서 아직 없는 레코드 데이터만 가져옵니다.
    pub fn union(&mut self, other: DnsRrSets) {
        for (name, rdatas) in other.0 {
            for rdata in rdatas {
                let present = self
                    .0
                    .get(&name)
                    .is_some_and(|set| set.binary_search(&rdata).is_ok());
                if !present {
                    self.add(name.clone(), rdata);
                }
            }
        }
    }

    /// 셋에 포함된 이름 수
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// 이름의 레코드 데이터
    pub fn get(&self, name: &DnsName) -> Option<&[String]> {
        self.0.get(name).map(Vec::as_slice)
    }
}

impl fmt::Display for DnsRrSets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (name, rdatas) in &self.0 {
            for rdata in rdatas {
                if !first {
                    f.write_str("\n")?;
                }
                first = false;
                write!(f, "{name} {rdata}")?;
            }
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct RrSetEntry<'a> {
    name: &'a str,
    class: DnsClass,
    #[serde(rename = "type")]
    rtype: DnsType,
    rdata: &'a [String],
}

impl Serialize for DnsRrSets {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.0.len()))?;
        for (name, rdata) in &self.0 {
            seq.serialize_element(&RrSetEntry {
                name: &name.name,
                class: name.class,
                rtype: name.rtype,
                rdata,
            })?;
        }
        seq.end()
    }
}

// ─── Duration 직렬화 ────────────────────────────────────────────────

/// `Duration`을 나노초 정수로 직렬화합니다.
pub(crate) mod duration_nanos {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_nanos)
    }
}

/// `Option<Duration>`을 나노초 정수로 직렬화합니다.
pub(crate) mod opt_duration_nanos {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match d {
            Some(d) => s.serialize_some(&u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Option::<u64>::deserialize(d).map(|v| v.map(Duration::from_nanos))
    }
}

/// 응답 지연 통계
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatencyStats {
    /// 지연이 측정된 응답 수
    pub count: u64,
    /// 평균 지연
    #[serde(with = "duration_nanos")]
    pub mean: Duration,
    /// 최대 지연
    #[serde(with = "duration_nanos")]
    pub max: Duration,
}

impl LatencyStats {
    /// 측정값 하나로 통계를 만듭니다.
    pub fn single(latency: Duration) -> Self {
        Self {
            count: 1,
            mean: latency,
            max: latency,
        }
    }

    /// 가중 평균으로 두 통계를 병합합니다.
    pub fn merge(&mut self, other: LatencyStats) {
        let total = self.count + other.count;
        if total == 0 {
            return;
        }
        let weighted = self.mean.as_nanos() * u128::from(self.count)
            + other.mean.as_nanos() * u128::from(other.count);
        let mean_nanos = weighted / u128::from(total);
        self.mean = Duration::from_nanos(u64::try_from(mean_nanos).unwrap_or(u64::MAX));
        self.max = self.max.max(other.max);
        self.count = total;
    }
}
