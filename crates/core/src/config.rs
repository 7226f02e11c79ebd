//! 설정 관리 -- sluice.toml 파싱 및 런타임 설정
//!
//! [`SluiceConfig`]는 모든 컴포넌트의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`SLUICE_L7_LOG_PER_NODE_LIMIT=500` 형식)
//! 3. 설정 파일 (`sluice.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), sluice_core::error::SluiceError> {
//! use sluice_core::config::SluiceConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = SluiceConfig::load("sluice.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = SluiceConfig::parse("[general]\nlog_level = \"debug\"")?;
//! # Ok(())
//! # }
//! ```

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, SluiceError};

/// DNS 집계 종류로 허용되는 값
pub const DNS_AGGREGATION_KINDS: [&str; 2] = ["default", "prefix_name_and_ip"];

/// L7 URL 트리밍 모드로 허용되는 값
pub const TRIM_URL_MODES: [&str; 4] = ["full", "without_query", "base", "none"];

/// 싱크 종류로 허용되는 값
pub const SINK_KINDS: [&str; 2] = ["file", "stdout"];

/// sluice 통합 설정
///
/// `sluice.toml` 파일의 최상위 구조를 나타냅니다.
/// 각 컴포넌트는 자기 섹션만 읽어 사용합니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SluiceConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 리포터 공통 설정
    #[serde(default)]
    pub reporter: ReporterConfig,
    /// DNS 로그 집계 설정
    #[serde(default)]
    pub dns_log: DnsLogConfig,
    /// L7 로그 집계 설정
    #[serde(default)]
    pub l7_log: L7LogConfig,
    /// 이벤트 수신기 설정
    #[serde(default)]
    pub receiver: ReceiverConfig,
    /// 이름 있는 싱크 목록
    #[serde(default = "default_sinks")]
    pub sinks: Vec<SinkConfig>,
    /// 메트릭 설정
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl Default for SluiceConfig {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            reporter: ReporterConfig::default(),
            dns_log: DnsLogConfig::default(),
            l7_log: L7LogConfig::default(),
            receiver: ReceiverConfig::default(),
            sinks: default_sinks(),
            metrics: MetricsConfig::default(),
        }
    }
}

/// `[[sinks]]`가 없을 때 사용하는 기본 싱크 (stdout 하나)
fn default_sinks() -> Vec<SinkConfig> {
    vec![SinkConfig {
        name: "stdout".to_owned(),
        kind: "stdout".to_owned(),
        path: String::new(),
    }]
}

impl SluiceConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, SluiceError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, SluiceError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SluiceError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                SluiceError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, SluiceError> {
        toml::from_str(toml_str).map_err(|e| {
            SluiceError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `SLUICE_{SECTION}_{FIELD}`
    /// 싱크 목록(`[[sinks]]`)은 파일로만 설정할 수 있습니다.
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "SLUICE_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "SLUICE_GENERAL_LOG_FORMAT");
        override_string(&mut self.general.pid_file, "SLUICE_GENERAL_PID_FILE");

        // Reporter
        override_u64(
            &mut self.reporter.health_interval_secs,
            "SLUICE_REPORTER_HEALTH_INTERVAL_SECS",
        );

        // DNS
        override_bool(&mut self.dns_log.enabled, "SLUICE_DNS_LOG_ENABLED");
        override_u64(
            &mut self.dns_log.flush_interval_secs,
            "SLUICE_DNS_LOG_FLUSH_INTERVAL_SECS",
        );
        override_usize(
            &mut self.dns_log.per_node_limit,
            "SLUICE_DNS_LOG_PER_NODE_LIMIT",
        );
        override_string(
            &mut self.dns_log.aggregation_kind,
            "SLUICE_DNS_LOG_AGGREGATION_KIND",
        );
        override_bool(
            &mut self.dns_log.include_labels,
            "SLUICE_DNS_LOG_INCLUDE_LABELS",
        );
        override_csv(&mut self.dns_log.sinks, "SLUICE_DNS_LOG_SINKS");

        // L7
        override_bool(&mut self.l7_log.enabled, "SLUICE_L7_LOG_ENABLED");
        override_u64(
            &mut self.l7_log.flush_interval_secs,
            "SLUICE_L7_LOG_FLUSH_INTERVAL_SECS",
        );
        override_usize(
            &mut self.l7_log.per_node_limit,
            "SLUICE_L7_LOG_PER_NODE_LIMIT",
        );
        override_bool(
            &mut self.l7_log.include_http_header_info,
            "SLUICE_L7_LOG_INCLUDE_HTTP_HEADER_INFO",
        );
        override_bool(
            &mut self.l7_log.include_http_method,
            "SLUICE_L7_LOG_INCLUDE_HTTP_METHOD",
        );
        override_bool(&mut self.l7_log.include_service, "SLUICE_L7_LOG_INCLUDE_SERVICE");
        override_bool(
            &mut self.l7_log.include_destination,
            "SLUICE_L7_LOG_INCLUDE_DESTINATION",
        );
        override_bool(&mut self.l7_log.include_source, "SLUICE_L7_LOG_INCLUDE_SOURCE");
        override_bool(
            &mut self.l7_log.include_response_code,
            "SLUICE_L7_LOG_INCLUDE_RESPONSE_CODE",
        );
        override_string(&mut self.l7_log.trim_url, "SLUICE_L7_LOG_TRIM_URL");
        override_i32(
            &mut self.l7_log.num_url_path_parts,
            "SLUICE_L7_LOG_NUM_URL_PATH_PARTS",
        );
        override_usize(
            &mut self.l7_log.url_char_limit,
            "SLUICE_L7_LOG_URL_CHAR_LIMIT",
        );
        override_csv(&mut self.l7_log.sinks, "SLUICE_L7_LOG_SINKS");

        // Receiver
        override_bool(&mut self.receiver.enabled, "SLUICE_RECEIVER_ENABLED");
        override_string(&mut self.receiver.bind_addr, "SLUICE_RECEIVER_BIND_ADDR");
        override_usize(
            &mut self.receiver.max_message_size,
            "SLUICE_RECEIVER_MAX_MESSAGE_SIZE",
        );

        // Metrics
        override_bool(&mut self.metrics.enabled, "SLUICE_METRICS_ENABLED");
        override_string(&mut self.metrics.listen_addr, "SLUICE_METRICS_LISTEN_ADDR");
        override_u16(&mut self.metrics.port, "SLUICE_METRICS_PORT");
    }

    /// 설정값의 유효성을 검증합니다.
    ///
    /// 리포터에 바인딩된 싱크 이름이 실제로 존재하는지는 여기서 검사하지 않습니다.
    /// 그 검사는 집계기 등록 시점에 수행되며 실패하면 데몬 시작이 중단됩니다.
    pub fn validate(&self) -> Result<(), SluiceError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        if self.reporter.health_interval_secs == 0 {
            return Err(invalid(
                "reporter.health_interval_secs",
                "must be greater than 0".to_owned(),
            ));
        }

        if self.dns_log.enabled {
            if self.dns_log.flush_interval_secs == 0 {
                return Err(invalid(
                    "dns_log.flush_interval_secs",
                    "must be greater than 0".to_owned(),
                ));
            }
            if !DNS_AGGREGATION_KINDS.contains(&self.dns_log.aggregation_kind.as_str()) {
                return Err(invalid(
                    "dns_log.aggregation_kind",
                    format!("must be one of: {}", DNS_AGGREGATION_KINDS.join(", ")),
                ));
            }
        }

        if self.l7_log.enabled {
            if self.l7_log.flush_interval_secs == 0 {
                return Err(invalid(
                    "l7_log.flush_interval_secs",
                    "must be greater than 0".to_owned(),
                ));
            }
            if !TRIM_URL_MODES.contains(&self.l7_log.trim_url.as_str()) {
                return Err(invalid(
                    "l7_log.trim_url",
                    format!("must be one of: {}", TRIM_URL_MODES.join(", ")),
                ));
            }
            if self.l7_log.num_url_path_parts < -1 {
                return Err(invalid(
                    "l7_log.num_url_path_parts",
                    "must be -1 (no limit) or a non-negative count".to_owned(),
                ));
            }
        }

        if self.receiver.enabled && self.receiver.max_message_size == 0 {
            return Err(invalid(
                "receiver.max_message_size",
                "must be greater than 0".to_owned(),
            ));
        }

        let mut seen = HashSet::new();
        for sink in &self.sinks {
            if sink.name.is_empty() {
                return Err(invalid("sinks.name", "must not be empty".to_owned()));
            }
            if !seen.insert(sink.name.as_str()) {
                return Err(invalid(
                    "sinks.name",
                    format!("duplicate sink name '{}'", sink.name),
                ));
            }
            if !SINK_KINDS.contains(&sink.kind.as_str()) {
                return Err(invalid(
                    "sinks.kind",
                    format!(
                        "sink '{}': must be one of: {}",
                        sink.name,
                        SINK_KINDS.join(", ")
                    ),
                ));
            }
            if sink.kind == "file" && sink.path.is_empty() {
                return Err(invalid(
                    "sinks.path",
                    format!("sink '{}': file sink requires a path", sink.name),
                ));
            }
        }

        Ok(())
    }
}

fn invalid(field: &str, reason: String) -> SluiceError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason,
    }
    .into()
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
    /// PID 파일 경로 (빈 문자열이면 작성하지 않음)
    pub pid_file: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
            pid_file: String::new(),
        }
    }
}

/// 리포터 공통 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReporterConfig {
    /// 싱크 준비 상태 확인 주기 (초)
    pub health_interval_secs: u64,
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            health_interval_secs: 10,
        }
    }
}

/// DNS 로그 집계 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DnsLogConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 플러시 주기 (초, ±10% 지터 적용)
    pub flush_interval_secs: u64,
    /// 플러시 윈도우당 최대 레코드 수 (0 = 무제한)
    pub per_node_limit: usize,
    /// 클라이언트 집계 종류 (default, prefix_name_and_ip)
    pub aggregation_kind: String,
    /// 출력 레코드에 레이블 포함 여부
    pub include_labels: bool,
    /// 바인딩할 싱크 이름
    pub sinks: Vec<String>,
}

impl Default for DnsLogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            flush_interval_secs: 300,
            per_node_limit: 0,
            aggregation_kind: "prefix_name_and_ip".to_owned(),
            include_labels: true,
            sinks: vec!["stdout".to_owned()],
        }
    }
}

/// L7 로그 집계 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct L7LogConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 플러시 주기 (초, ±10% 지터 적용)
    pub flush_interval_secs: u64,
    /// 플러시 윈도우당 최대 레코드 수 (0 = 무제한)
    pub per_node_limit: usize,
    /// user agent / 프로토콜 유형 포함 여부
    pub include_http_header_info: bool,
    /// HTTP 메서드 포함 여부
    pub include_http_method: bool,
    /// 서비스 정보 포함 여부
    pub include_service: bool,
    /// 목적지 정보 포함 여부
    pub include_destination: bool,
    /// 출발지 정보 포함 여부
    pub include_source: bool,
    /// 응답 코드 포함 여부
    pub include_response_code: bool,
    /// URL 트리밍 모드 (full, without_query, base, none)
    pub trim_url: String,
    /// 유지할 URL 경로 세그먼트 수 (-1 = 무제한)
    pub num_url_path_parts: i32,
    /// 도메인 + 경로 최대 문자 수
    pub url_char_limit: usize,
    /// 바인딩할 싱크 이름
    pub sinks: Vec<String>,
}

impl Default for L7LogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            flush_interval_secs: 300,
            per_node_limit: 1500,
            include_http_header_info: false,
            include_http_method: true,
            include_service: true,
            include_destination: true,
            include_source: true,
            include_response_code: true,
            trim_url: "without_query".to_owned(),
            num_url_path_parts: 5,
            url_char_limit: 250,
            sinks: vec!["stdout".to_owned()],
        }
    }
}

/// 이벤트 수신기 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiverConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// UDP 바인드 주소
    pub bind_addr: String,
    /// 최대 데이터그램 크기 (바이트)
    pub max_message_size: usize,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_addr: "127.0.0.1:5170".to_owned(),
            max_message_size: 65535,
        }
    }
}

/// 싱크 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
    /// 리포터가 참조하는 고유 이름
    pub name: String,
    /// 싱크 종류 (file, stdout)
    pub kind: String,
    /// file 싱크의 기본 경로. 레코드 종류별로 확장자가 붙습니다.
    pub path: String,
}

/// 메트릭 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 리슨 주소
    pub listen_addr: String,
    /// 리슨 포트
    pub port: u16,
    /// 스크레이프 경로
    pub endpoint: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9464,
            endpoint: "/metrics".to_owned(),
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_parsed<T: std::str::FromStr>(target: &mut T, env_key: &str, type_name: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<T>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                expected = type_name,
                "failed to parse env var, ignoring"
            ),
        }
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    override_parsed(target, env_key, "bool");
}

fn override_usize(target: &mut usize, env_key: &str) {
    override_parsed(target, env_key, "usize");
}

fn override_u64(target: &mut u64, env_key: &str) {
    override_parsed(target, env_key, "u64");
}

fn override_u16(target: &mut u16, env_key: &str) {
    override_parsed(target, env_key, "u16");
}

fn override_i32(target: &mut i32, env_key: &str) {
    override_parsed(target, env_key, "i32");
}

fn override_csv(target: &mut Vec<String>, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val
            .split(',')
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn default_config_has_sane_values() {
        let config = SluiceConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.general.log_format, "json");
        assert!(config.dns_log.enabled);
        assert_eq!(config.dns_log.per_node_limit, 0);
        assert_eq!(config.dns_log.aggregation_kind, "prefix_name_and_ip");
        assert_eq!(config.l7_log.per_node_limit, 1500);
        assert_eq!(config.l7_log.trim_url, "without_query");
        assert_eq!(config.reporter.health_interval_secs, 10);
        assert_eq!(config.sinks.len(), 1);
        assert_eq!(config.sinks[0].kind, "stdout");
        assert_eq!(config.dns_log.sinks, vec!["stdout"]);
    }

    #[test]
    fn default_config_passes_validation() {
        SluiceConfig::default().validate().unwrap();
    }

    #[test]
    fn parse_empty_toml_uses_defaults() {
        let config = SluiceConfig::parse("").unwrap();
        assert_eq!(config.l7_log.url_char_limit, 250);
        assert_eq!(config.receiver.bind_addr, "127.0.0.1:5170");
    }

    #[test]
    fn parse_partial_toml_merges_with_defaults() {
        let toml = r#"
[l7_log]
per_node_limit = 5
trim_url = "base"

[[sinks]]
name = "file"
kind = "file"
path = "/tmp/sluice"
"#;
        let config = SluiceConfig::parse(toml).unwrap();
        assert_eq!(config.l7_log.per_node_limit, 5);
        assert_eq!(config.l7_log.trim_url, "base");
        // 나머지는 기본값 유지
        assert!(config.l7_log.include_http_method);
        assert_eq!(config.sinks.len(), 1);
        assert_eq!(config.sinks[0].path, "/tmp/sluice");
        config.validate().unwrap();
    }

    #[test]
    fn parse_invalid_toml_returns_error() {
        let err = SluiceConfig::parse("invalid = [[[toml").unwrap_err();
        assert!(matches!(
            err,
            SluiceError::Config(ConfigError::ParseFailed { .. })
        ));
    }

    #[test]
    fn validate_rejects_invalid_log_level() {
        let mut config = SluiceConfig::default();
        config.general.log_level = "verbose".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("log_level"));
    }

    #[test]
    fn validate_rejects_unknown_aggregation_kind() {
        let mut config = SluiceConfig::default();
        config.dns_log.aggregation_kind = "by_subnet".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("aggregation_kind"));
    }

    #[test]
    fn validate_skips_disabled_sections() {
        let mut config = SluiceConfig::default();
        config.l7_log.enabled = false;
        config.l7_log.trim_url = "whatever".to_owned();
        config.validate().unwrap();
    }

    #[test]
    fn validate_rejects_zero_flush_interval() {
        let mut config = SluiceConfig::default();
        config.l7_log.flush_interval_secs = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("l7_log.flush_interval_secs"));
    }

    #[test]
    fn validate_rejects_negative_path_parts_below_sentinel() {
        let mut config = SluiceConfig::default();
        config.l7_log.num_url_path_parts = -2;
        assert!(config.validate().is_err());

        config.l7_log.num_url_path_parts = -1;
        config.validate().unwrap();
    }

    #[test]
    fn validate_rejects_duplicate_sink_names() {
        let mut config = SluiceConfig::default();
        let sink = SinkConfig {
            name: "out".to_owned(),
            kind: "stdout".to_owned(),
            path: String::new(),
        };
        config.sinks = vec![sink.clone(), sink];
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn validate_rejects_file_sink_without_path() {
        let mut config = SluiceConfig::default();
        config.sinks = vec![SinkConfig {
            name: "file".to_owned(),
            kind: "file".to_owned(),
            path: String::new(),
        }];
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("requires a path"));
    }

    #[test]
    fn validate_rejects_unknown_sink_kind() {
        let mut config = SluiceConfig::default();
        config.sinks = vec![SinkConfig {
            name: "es".to_owned(),
            kind: "elasticsearch".to_owned(),
            path: String::new(),
        }];
        assert!(config.validate().is_err());
    }

    #[test]
    #[serial]
    fn env_override_applies_typed_values() {
        let mut config = SluiceConfig::default();
        // SAFETY: #[serial]로 환경변수를 건드리는 테스트를 직렬화합니다.
        unsafe {
            std::env::set_var("SLUICE_L7_LOG_PER_NODE_LIMIT", "42");
            std::env::set_var("SLUICE_L7_LOG_NUM_URL_PATH_PARTS", "-1");
            std::env::set_var("SLUICE_DNS_LOG_SINKS", "file, stdout,");
        }
        config.apply_env_overrides();
        assert_eq!(config.l7_log.per_node_limit, 42);
        assert_eq!(config.l7_log.num_url_path_parts, -1);
        assert_eq!(config.dns_log.sinks, vec!["file", "stdout"]);
        unsafe {
            std::env::remove_var("SLUICE_L7_LOG_PER_NODE_LIMIT");
            std::env::remove_var("SLUICE_L7_LOG_NUM_URL_PATH_PARTS");
            std::env::remove_var("SLUICE_DNS_LOG_SINKS");
        }
    }

    #[test]
    #[serial]
    fn env_override_invalid_value_keeps_original() {
        let mut val = 7usize;
        // SAFETY: #[serial]로 환경변수를 건드리는 테스트를 직렬화합니다.
        unsafe { std::env::set_var("TEST_SLUICE_USIZE_BAD", "seven") };
        override_usize(&mut val, "TEST_SLUICE_USIZE_BAD");
        assert_eq!(val, 7);
        unsafe { std::env::remove_var("TEST_SLUICE_USIZE_BAD") };
    }

    #[test]
    fn env_override_missing_var_keeps_original() {
        let mut val = "original".to_owned();
        override_string(&mut val, "TEST_SLUICE_NONEXISTENT_12345");
        assert_eq!(val, "original");
    }

    #[test]
    fn config_serialize_roundtrip() {
        let config = SluiceConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed = SluiceConfig::parse(&toml_str).unwrap();
        assert_eq!(config.l7_log.trim_url, parsed.l7_log.trim_url);
        assert_eq!(config.dns_log.sinks, parsed.dns_log.sinks);
    }

    #[tokio::test]
    async fn from_file_not_found() {
        let err = SluiceConfig::from_file("/nonexistent/path/sluice.toml")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SluiceError::Config(ConfigError::FileNotFound { .. })
        ));
    }
}
