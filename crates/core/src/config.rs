//! 설정 관리 -- logsentinel.toml 파싱 및 런타임 설정
//!
//! [`LogSentinelConfig`]는 모든 구성 요소의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`LOGSENTINEL_MONITOR_LOG_DIR=/var/log/app` 형식)
//! 3. 설정 파일 (`logsentinel.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), logsentinel_core::error::LogSentinelError> {
//! use logsentinel_core::config::LogSentinelConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = LogSentinelConfig::load("logsentinel.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = LogSentinelConfig::parse("[monitor]\nmax_lines = 500")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, LogSentinelError};

/// 분석 엔진에 로그 앞에 붙여 보내는 기본 지시문
pub const DEFAULT_ANALYSIS_PROMPT: &str = "\
You are analyzing a log file for cybersecurity threats. Your analysis should include the following:
1. Any suspicious activities detected
2. Potential threats identified
3. Any recommendations for improving security
4. Any other observations

Quote the log lines that led you to your conclusions.
Be as detailed as possible so the security team can take appropriate action.
";

/// logsentinel 통합 설정
///
/// `logsentinel.toml` 파일의 최상위 구조를 나타냅니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogSentinelConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 로그 감시 설정
    #[serde(default)]
    pub monitor: MonitorSection,
    /// 분석 엔진 설정
    #[serde(default)]
    pub analysis: AnalysisConfig,
    /// 알림 채널 설정
    #[serde(default)]
    pub notify: NotifyConfig,
    /// 메트릭 설정
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl LogSentinelConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, LogSentinelError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, LogSentinelError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                LogSentinelError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                LogSentinelError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, LogSentinelError> {
        toml::from_str(toml_str).map_err(|e| {
            LogSentinelError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `LOGSENTINEL_{SECTION}_{FIELD}`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "LOGSENTINEL_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "LOGSENTINEL_GENERAL_LOG_FORMAT");

        // Monitor
        override_string(&mut self.monitor.log_dir, "LOGSENTINEL_MONITOR_LOG_DIR");
        override_string(&mut self.monitor.state_file, "LOGSENTINEL_MONITOR_STATE_FILE");
        override_u64(
            &mut self.monitor.poll_interval_secs,
            "LOGSENTINEL_MONITOR_POLL_INTERVAL_SECS",
        );
        override_usize(&mut self.monitor.max_lines, "LOGSENTINEL_MONITOR_MAX_LINES");
        override_string(
            &mut self.monitor.on_corrupt_state,
            "LOGSENTINEL_MONITOR_ON_CORRUPT_STATE",
        );
        override_bool(
            &mut self.monitor.retry_failed_analysis,
            "LOGSENTINEL_MONITOR_RETRY_FAILED_ANALYSIS",
        );
        override_bool(&mut self.monitor.run_on_start, "LOGSENTINEL_MONITOR_RUN_ON_START");

        // Analysis
        override_string(&mut self.analysis.program, "LOGSENTINEL_ANALYSIS_PROGRAM");
        override_csv(&mut self.analysis.args, "LOGSENTINEL_ANALYSIS_ARGS");
        override_string(&mut self.analysis.prompt, "LOGSENTINEL_ANALYSIS_PROMPT");
        override_u64(&mut self.analysis.timeout_secs, "LOGSENTINEL_ANALYSIS_TIMEOUT_SECS");
        override_csv(
            &mut self.analysis.trigger_terms,
            "LOGSENTINEL_ANALYSIS_TRIGGER_TERMS",
        );

        // Notify
        override_string(&mut self.notify.kind, "LOGSENTINEL_NOTIFY_KIND");
        override_string(&mut self.notify.recipient, "LOGSENTINEL_NOTIFY_RECIPIENT");
        override_string(&mut self.notify.api_base, "LOGSENTINEL_NOTIFY_API_BASE");
        override_string(&mut self.notify.token_file, "LOGSENTINEL_NOTIFY_TOKEN_FILE");
        override_u64(
            &mut self.notify.request_timeout_secs,
            "LOGSENTINEL_NOTIFY_REQUEST_TIMEOUT_SECS",
        );

        // Metrics
        override_bool(&mut self.metrics.enabled, "LOGSENTINEL_METRICS_ENABLED");
        override_string(&mut self.metrics.listen_addr, "LOGSENTINEL_METRICS_LISTEN_ADDR");
        override_u16(&mut self.metrics.port, "LOGSENTINEL_METRICS_PORT");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), LogSentinelError> {
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

        if self.monitor.log_dir.is_empty() {
            return Err(invalid("monitor.log_dir", "must not be empty".to_owned()));
        }

        if self.monitor.state_file.is_empty() {
            return Err(invalid("monitor.state_file", "must not be empty".to_owned()));
        }

        if self.monitor.poll_interval_secs == 0 {
            return Err(invalid(
                "monitor.poll_interval_secs",
                "must be greater than 0".to_owned(),
            ));
        }

        if self.monitor.max_lines == 0 {
            return Err(invalid("monitor.max_lines", "must be greater than 0".to_owned()));
        }

        let valid_policies = ["reset", "abort"];
        if !valid_policies.contains(&self.monitor.on_corrupt_state.as_str()) {
            return Err(invalid(
                "monitor.on_corrupt_state",
                format!("must be one of: {}", valid_policies.join(", ")),
            ));
        }

        if self.analysis.program.is_empty() {
            return Err(invalid("analysis.program", "must not be empty".to_owned()));
        }

        if self.analysis.timeout_secs == 0 {
            return Err(invalid(
                "analysis.timeout_secs",
                "must be greater than 0".to_owned(),
            ));
        }

        if self.analysis.trigger_terms.is_empty()
            || self.analysis.trigger_terms.iter().any(|t| t.trim().is_empty())
        {
            return Err(invalid(
                "analysis.trigger_terms",
                "at least one non-blank term is required".to_owned(),
            ));
        }

        let valid_kinds = ["gmail", "log"];
        if !valid_kinds.contains(&self.notify.kind.as_str()) {
            return Err(invalid(
                "notify.kind",
                format!("must be one of: {}", valid_kinds.join(", ")),
            ));
        }

        if self.notify.kind == "gmail" {
            if self.notify.recipient.is_empty() {
                return Err(invalid(
                    "notify.recipient",
                    "recipient is required when notify.kind is gmail".to_owned(),
                ));
            }
            if self.notify.token_file.is_empty() {
                return Err(invalid(
                    "notify.token_file",
                    "token file is required when notify.kind is gmail".to_owned(),
                ));
            }
        }

        if self.notify.request_timeout_secs == 0 {
            return Err(invalid(
                "notify.request_timeout_secs",
                "must be greater than 0".to_owned(),
            ));
        }

        if self.metrics.enabled && self.metrics.port == 0 {
            return Err(invalid("metrics.port", "must be greater than 0".to_owned()));
        }

        Ok(())
    }
}

fn invalid(field: &str, reason: String) -> LogSentinelError {
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
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
        }
    }
}

/// 로그 감시 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorSection {
    /// 감시할 루트 디렉토리 (재귀 탐색)
    pub log_dir: String,
    /// 파일별 오프셋을 저장하는 상태 파일 경로
    pub state_file: String,
    /// 패스 사이 대기 시간 (초)
    pub poll_interval_secs: u64,
    /// 파일당 분석에 넘길 최대 라인 수 (가장 최근 라인 기준)
    pub max_lines: usize,
    /// 상태 파일 손상 시 정책 (reset, abort)
    pub on_corrupt_state: String,
    /// 분석 실패 시 오프셋을 유지하여 다음 패스에서 재시도할지 여부
    pub retry_failed_analysis: bool,
    /// 시작 직후 첫 패스를 실행할지 여부
    pub run_on_start: bool,
}

impl Default for MonitorSection {
    fn default() -> Self {
        Self {
            log_dir: "/var/log".to_owned(),
            state_file: "/var/lib/logsentinel/last_positions.json".to_owned(),
            poll_interval_secs: 2 * 60 * 60,
            max_lines: 1000,
            on_corrupt_state: "reset".to_owned(),
            retry_failed_analysis: false,
            run_on_start: true,
        }
    }
}

/// 분석 엔진 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// 실행할 외부 프로그램
    pub program: String,
    /// 프로그램 인자
    pub args: Vec<String>,
    /// 로그 본문 앞에 붙는 지시문
    pub prompt: String,
    /// 분석 호출 타임아웃 (초)
    pub timeout_secs: u64,
    /// 알림을 발생시키는 판정문 키워드 (대소문자 무시)
    pub trigger_terms: Vec<String>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            program: "ollama".to_owned(),
            args: vec![
                "run".to_owned(),
                "ALIENTELLIGENCE/cybersecuritythreatanalysis:latest".to_owned(),
            ],
            prompt: DEFAULT_ANALYSIS_PROMPT.to_owned(),
            timeout_secs: 600,
            trigger_terms: vec!["suspicious".to_owned(), "threat".to_owned()],
        }
    }
}

/// 알림 채널 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    /// 알림 채널 종류 (gmail, log)
    pub kind: String,
    /// 수신자 주소
    pub recipient: String,
    /// Gmail API 기본 URL
    pub api_base: String,
    /// 발급된 액세스 토큰 파일 경로
    pub token_file: String,
    /// HTTP 요청 타임아웃 (초)
    pub request_timeout_secs: u64,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            kind: "log".to_owned(),
            recipient: String::new(),
            api_base: "https://gmail.googleapis.com".to_owned(),
            token_file: "token.json".to_owned(),
            request_timeout_secs: 30,
        }
    }
}

/// 메트릭 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Prometheus 엔드포인트 활성화 여부
    pub enabled: bool,
    /// 바인드 주소
    pub listen_addr: String,
    /// 포트
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9101,
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_usize(target: &mut usize, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<usize>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse usize from env var, ignoring"
            ),
        }
    }
}

fn override_u16(target: &mut u16, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u16>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u16 from env var, ignoring"
            ),
        }
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
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
        let config = LogSentinelConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.monitor.poll_interval_secs, 7200);
        assert_eq!(config.monitor.max_lines, 1000);
        assert_eq!(config.monitor.on_corrupt_state, "reset");
        assert!(!config.monitor.retry_failed_analysis);
        assert_eq!(config.analysis.program, "ollama");
        assert_eq!(config.analysis.trigger_terms, vec!["suspicious", "threat"]);
        assert_eq!(config.notify.kind, "log");
        assert!(!config.metrics.enabled);
    }

    #[test]
    fn default_config_passes_validation() {
        LogSentinelConfig::default().validate().unwrap();
    }

    #[test]
    fn parse_empty_toml_uses_defaults() {
        let config = LogSentinelConfig::parse("").unwrap();
        assert_eq!(config.monitor.log_dir, "/var/log");
        assert_eq!(config.analysis.timeout_secs, 600);
    }

    #[test]
    fn parse_partial_toml_merges_with_defaults() {
        let toml = r#"
[monitor]
log_dir = "/srv/app/logs"
max_lines = 250

[notify]
kind = "gmail"
recipient = "secops@example.com"
"#;
        let config = LogSentinelConfig::parse(toml).unwrap();
        assert_eq!(config.monitor.log_dir, "/srv/app/logs");
        assert_eq!(config.monitor.max_lines, 250);
        // 나머지 필드는 기본값 유지
        assert_eq!(config.monitor.poll_interval_secs, 7200);
        assert_eq!(config.notify.token_file, "token.json");
        config.validate().unwrap();
    }

    #[test]
    fn parse_invalid_toml_returns_error() {
        let err = LogSentinelConfig::parse("monitor = [[[").unwrap_err();
        assert!(matches!(
            err,
            LogSentinelError::Config(ConfigError::ParseFailed { .. })
        ));
    }

    #[test]
    fn validate_rejects_zero_max_lines() {
        let mut config = LogSentinelConfig::default();
        config.monitor.max_lines = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_lines"));
    }

    #[test]
    fn validate_rejects_zero_interval() {
        let mut config = LogSentinelConfig::default();
        config.monitor.poll_interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_unknown_corrupt_policy() {
        let mut config = LogSentinelConfig::default();
        config.monitor.on_corrupt_state = "ignore".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("on_corrupt_state"));
    }

    #[test]
    fn validate_rejects_blank_trigger_term() {
        let mut config = LogSentinelConfig::default();
        config.analysis.trigger_terms.push("  ".to_owned());
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("trigger_terms"));
    }

    #[test]
    fn validate_requires_recipient_for_gmail() {
        let mut config = LogSentinelConfig::default();
        config.notify.kind = "gmail".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("recipient"));
    }

    #[test]
    fn validate_rejects_unknown_log_format() {
        let mut config = LogSentinelConfig::default();
        config.general.log_format = "xml".to_owned();
        assert!(config.validate().is_err());
    }

    #[test]
    #[serial]
    fn env_override_monitor_fields() {
        let mut config = LogSentinelConfig::default();
        // SAFETY: serial 테스트로 실행되어 다른 테스트와 환경변수를 공유하지 않습니다.
        unsafe {
            std::env::set_var("LOGSENTINEL_MONITOR_LOG_DIR", "/data/logs");
            std::env::set_var("LOGSENTINEL_MONITOR_MAX_LINES", "42");
            std::env::set_var("LOGSENTINEL_NOTIFY_RECIPIENT", "ops@example.com");
        }
        config.apply_env_overrides();
        assert_eq!(config.monitor.log_dir, "/data/logs");
        assert_eq!(config.monitor.max_lines, 42);
        assert_eq!(config.notify.recipient, "ops@example.com");
        unsafe {
            std::env::remove_var("LOGSENTINEL_MONITOR_LOG_DIR");
            std::env::remove_var("LOGSENTINEL_MONITOR_MAX_LINES");
            std::env::remove_var("LOGSENTINEL_NOTIFY_RECIPIENT");
        }
    }

    #[test]
    #[serial]
    fn env_override_analysis_prompt() {
        let mut config = LogSentinelConfig::default();
        // SAFETY: serial 테스트로 실행되어 다른 테스트와 환경변수를 공유하지 않습니다.
        unsafe { std::env::set_var("LOGSENTINEL_ANALYSIS_PROMPT", "Flag intrusions only:") };
        config.apply_env_overrides();
        unsafe { std::env::remove_var("LOGSENTINEL_ANALYSIS_PROMPT") };
        assert_eq!(config.analysis.prompt, "Flag intrusions only:");
    }

    #[test]
    #[serial]
    fn env_override_invalid_number_keeps_original() {
        let mut val = 1000usize;
        // SAFETY: serial 테스트로 실행되어 다른 테스트와 환경변수를 공유하지 않습니다.
        unsafe { std::env::set_var("TEST_LOGSENTINEL_USIZE_BAD", "lots") };
        override_usize(&mut val, "TEST_LOGSENTINEL_USIZE_BAD");
        assert_eq!(val, 1000);
        unsafe { std::env::remove_var("TEST_LOGSENTINEL_USIZE_BAD") };
    }

    #[test]
    #[serial]
    fn env_override_csv_trims_and_drops_empty() {
        let mut val = vec!["a".to_owned()];
        // SAFETY: serial 테스트로 실행되어 다른 테스트와 환경변수를 공유하지 않습니다.
        unsafe { std::env::set_var("TEST_LOGSENTINEL_CSV", "threat, malware,,") };
        override_csv(&mut val, "TEST_LOGSENTINEL_CSV");
        assert_eq!(val, vec!["threat", "malware"]);
        unsafe { std::env::remove_var("TEST_LOGSENTINEL_CSV") };
    }

    #[test]
    fn config_serialize_roundtrip() {
        let config = LogSentinelConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed = LogSentinelConfig::parse(&toml_str).unwrap();
        assert_eq!(config.monitor.state_file, parsed.monitor.state_file);
        assert_eq!(config.analysis.prompt, parsed.analysis.prompt);
    }

    #[tokio::test]
    async fn from_file_not_found() {
        let err = LogSentinelConfig::from_file("/nonexistent/path/logsentinel.toml")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LogSentinelError::Config(ConfigError::FileNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn from_file_reads_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logsentinel.toml");
        tokio::fs::write(&path, "[monitor]\npoll_interval_secs = 60\n")
            .await
            .unwrap();
        let config = LogSentinelConfig::from_file(&path).await.unwrap();
        assert_eq!(config.monitor.poll_interval_secs, 60);
    }
}
