//! 감시 파이프라인 설정
//!
//! [`MonitorConfig`]는 core의 [`MonitorSection`](logsentinel_core::config::MonitorSection)과
//! [`AnalysisConfig`](logsentinel_core::config::AnalysisConfig)를 기반으로
//! 스케줄러가 사용하는 설정을 제공합니다.
//!
//! # 사용 예시
//! ```ignore
//! use logsentinel_core::config::LogSentinelConfig;
//! use logsentinel_monitor::config::MonitorConfig;
//!
//! let core_config = LogSentinelConfig::default();
//! let config = MonitorConfig::from_core(&core_config);
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::MonitorError;

/// 오프셋 상태 파일 손상 시 정책
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateCorruptPolicy {
    /// 손상 파일을 옆으로 옮기고 빈 상태로 시작 (기본값, 재처리 위험)
    #[default]
    Reset,
    /// 에러를 전파 (시작 시점이면 데몬 종료)
    Abort,
}

impl StateCorruptPolicy {
    /// 설정 문자열에서 정책을 해석합니다.
    pub fn parse(value: &str) -> Result<Self, MonitorError> {
        match value {
            "reset" => Ok(Self::Reset),
            "abort" => Ok(Self::Abort),
            other => Err(MonitorError::Config {
                field: "on_corrupt_state".to_owned(),
                reason: format!("unknown policy '{other}', expected 'reset' or 'abort'"),
            }),
        }
    }
}

/// 감시 파이프라인 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// 감시할 루트 디렉토리
    pub log_dir: PathBuf,
    /// 오프셋 상태 파일
    pub state_file: PathBuf,
    /// 패스 간 대기 시간 (초)
    pub poll_interval_secs: u64,
    /// 파일당 최대 라인 수
    pub max_lines: usize,
    /// 상태 파일 손상 정책
    pub corrupt_policy: StateCorruptPolicy,
    /// 분석 실패 시 오프셋을 전진시키지 않음
    pub retry_failed_analysis: bool,
    /// 시작 직후 첫 패스 실행 여부
    pub run_on_start: bool,
    /// 알림 트리거 키워드
    pub trigger_terms: Vec<String>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("/var/log"),
            state_file: PathBuf::from("/var/lib/logsentinel/last_positions.json"),
            poll_interval_secs: 2 * 60 * 60,
            max_lines: 1000,
            corrupt_policy: StateCorruptPolicy::Reset,
            retry_failed_analysis: false,
            run_on_start: true,
            trigger_terms: vec!["suspicious".to_owned(), "threat".to_owned()],
        }
    }
}

impl MonitorConfig {
    /// core 설정에서 감시 설정을 생성합니다.
    ///
    /// 알 수 없는 손상 정책 문자열은 core 검증에서 걸러지므로 여기서는 기본값으로 둡니다.
    pub fn from_core(core: &logsentinel_core::config::LogSentinelConfig) -> Self {
        Self {
            log_dir: PathBuf::from(&core.monitor.log_dir),
            state_file: PathBuf::from(&core.monitor.state_file),
            poll_interval_secs: core.monitor.poll_interval_secs,
            max_lines: core.monitor.max_lines,
            corrupt_policy: StateCorruptPolicy::parse(&core.monitor.on_corrupt_state)
                .unwrap_or_default(),
            retry_failed_analysis: core.monitor.retry_failed_analysis,
            run_on_start: core.monitor.run_on_start,
            trigger_terms: core.analysis.trigger_terms.clone(),
        }
    }

    /// 패스 간 대기 시간을 반환합니다.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), MonitorError> {
        if self.log_dir.as_os_str().is_empty() {
            return Err(MonitorError::Config {
                field: "log_dir".to_owned(),
                reason: "must not be empty".to_owned(),
            });
        }

        if self.state_file.as_os_str().is_empty() {
            return Err(MonitorError::Config {
                field: "state_file".to_owned(),
                reason: "must not be empty".to_owned(),
            });
        }

        if self.poll_interval_secs == 0 {
            return Err(MonitorError::Config {
                field: "poll_interval_secs".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        if self.max_lines == 0 {
            return Err(MonitorError::Config {
                field: "max_lines".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        if self.trigger_terms.iter().all(|t| t.trim().is_empty()) {
            return Err(MonitorError::Config {
                field: "trigger_terms".to_owned(),
                reason: "at least one non-blank term is required".to_owned(),
            });
        }

        Ok(())
    }
}

/// 감시 설정 빌더
#[derive(Default)]
pub struct MonitorConfigBuilder {
    config: MonitorConfig,
}

impl MonitorConfigBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 감시 루트 디렉토리를 설정합니다.
    pub fn log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.log_dir = dir.into();
        self
    }

    /// 오프셋 상태 파일을 설정합니다.
    pub fn state_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.state_file = path.into();
        self
    }

    /// 패스 간 대기 시간(초)을 설정합니다.
    pub fn poll_interval_secs(mut self, secs: u64) -> Self {
        self.config.poll_interval_secs = secs;
        self
    }

    /// 파일당 최대 라인 수를 설정합니다.
    pub fn max_lines(mut self, max_lines: usize) -> Self {
        self.config.max_lines = max_lines;
        self
    }

    /// 상태 파일 손상 정책을 설정합니다.
    pub fn corrupt_policy(mut self, policy: StateCorruptPolicy) -> Self {
        self.config.corrupt_policy = policy;
        self
    }

    /// 분석 실패 시 재시도 여부를 설정합니다.
    pub fn retry_failed_analysis(mut self, retry: bool) -> Self {
        self.config.retry_failed_analysis = retry;
        self
    }

    /// 시작 직후 첫 패스 실행 여부를 설정합니다.
    pub fn run_on_start(mut self, run: bool) -> Self {
        self.config.run_on_start = run;
        self
    }

    /// 트리거 키워드를 설정합니다.
    pub fn trigger_terms(mut self, terms: Vec<String>) -> Self {
        self.config.trigger_terms = terms;
        self
    }

    /// 설정을 검증하고 `MonitorConfig`를 생성합니다.
    pub fn build(self) -> Result<MonitorConfig, MonitorError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
