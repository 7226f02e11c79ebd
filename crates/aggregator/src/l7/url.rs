//! L7 URL 트리밍
//!
//! 도메인과 경로에 다음 순서로 적용됩니다.
//!
//! 1. 트리밍 모드 ([`TrimUrl`])
//! 2. 경로 조각 수 제한 (`num_url_path_parts`)
//! 3. 문자 수 제한 (`url_char_limit`)
//!
//! 문자 수는 바이트가 아닌 `char` 단위로 셉니다.

use std::fmt;
use std::str::FromStr;

use crate::error::AggregatorError;
use crate::policy::FIELD_NOT_INCLUDED;

/// URL 트리밍 모드
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TrimUrl {
    /// 쿼리 문자열까지 그대로
    FullUrl,
    /// `?` 이후 제거
    #[default]
    UrlWithoutQuery,
    /// 도메인만 유지, 경로는 `-`
    BaseUrl,
    /// 도메인과 경로 모두 `-`
    UrlNone,
}

impl FromStr for TrimUrl {
    type Err = AggregatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "full" => Ok(Self::FullUrl),
            "without_query" => Ok(Self::UrlWithoutQuery),
            "base" => Ok(Self::BaseUrl),
            "none" => Ok(Self::UrlNone),
            other => Err(AggregatorError::Config {
                field: "l7_log.trim_url".to_owned(),
                reason: format!("unknown trim mode '{other}'"),
            }),
        }
    }
}

impl fmt::Display for TrimUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::FullUrl => "full",
            Self::UrlWithoutQuery => "without_query",
            Self::BaseUrl => "base",
            Self::UrlNone => "none",
        };
        f.write_str(s)
    }
}

/// URL 트리밍 설정
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UrlTrim {
    pub mode: TrimUrl,
    /// 유지할 경로 조각 수 (`None`이면 제한 없음)
    pub num_url_path_parts: Option<usize>,
    /// 도메인 + 경로 최대 문자 수
    pub url_char_limit: usize,
}

impl Default for UrlTrim {
    fn default() -> Self {
        Self {
            mode: TrimUrl::default(),
            num_url_path_parts: Some(5),
            url_char_limit: 250,
        }
    }
}

impl UrlTrim {
    /// 도메인과 경로를 트리밍하여 `(domain, path)`를 반환합니다.
    pub fn apply(&self, domain: &str, path: &str) -> (String, String) {
        let (domain, path) = match self.mode {
            TrimUrl::UrlNone => {
                return (FIELD_NOT_INCLUDED.to_owned(), FIELD_NOT_INCLUDED.to_owned());
            }
            TrimUrl::BaseUrl => (domain.to_owned(), FIELD_NOT_INCLUDED.to_owned()),
            TrimUrl::UrlWithoutQuery => {
                let without_query = path.split_once('?').map_or(path, |(p, _)| p);
                (domain.to_owned(), self.cap_path_parts(without_query))
            }
            TrimUrl::FullUrl => (domain.to_owned(), self.cap_path_parts(path)),
        };
        limit_url_chars(domain, path, self.url_char_limit)
    }

    fn cap_path_parts(&self, path: &str) -> String {
        match self.num_url_path_parts {
            Some(n) => path.split('/').take(n + 1).collect::<Vec<_>>().join("/"),
            None => path.to_owned(),
        }
    }
}

/// 도메인 + 경로 길이를 `limit` 문자로 제한합니다.
///
/// - 합이 `limit` 이하이면 그대로 둡니다.
/// - `limit`이 도메인보다 짧으면 도메인을 자르고 경로를 `-`로 바꿉니다.
/// - 그 외에는 경로를 `limit - len(domain)` 문자로 자릅니다.
///
/// 경로가 이미 `-`이면 도메인만 검사합니다.
pub fn limit_url_chars(domain: String, path: String, limit: usize) -> (String, String) {
    let domain_len = domain.chars().count();
    let path_len = if path == FIELD_NOT_INCLUDED {
        0
    } else {
        path.chars().count()
    };

    if domain_len + path_len <= limit {
        return (domain, path);
    }
    if limit < domain_len {
        let truncated: String = domain.chars().take(limit).collect();
        return (truncated, FIELD_NOT_INCLUDED.to_owned());
    }
    let truncated: String = path.chars().take(limit - domain_len).collect();
    (domain, truncated)
}
