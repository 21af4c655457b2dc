//! 감시 파이프라인 에러 타입
//!
//! [`MonitorError`]는 파일 탐색, 증분 읽기, 오프셋 저장, 분석 위임, 알림 전송
//! 과정에서 발생하는 모든 에러를 표현합니다.
//! `From<MonitorError> for LogSentinelError` 변환이 구현되어 있어
//! 데몬에서 `?` 연산자로 자연스럽게 전파할 수 있습니다.
//!
//! # 전파 정책
//!
//! [`MonitorError::is_soft`]가 `true`인 에러는 로그만 남기고 패스를 계속합니다.
//! 패스나 프로세스를 중단시키지 않습니다.

use logsentinel_core::error::{LogSentinelError, MonitorFailure};

/// 감시 파이프라인 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    /// 디렉토리 또는 엔트리 접근 실패 (해당 항목만 건너뜀)
    #[error("discovery error: {path}: {reason}")]
    Discovery {
        /// 접근 실패한 경로
        path: String,
        /// 실패 사유
        reason: String,
    },

    /// 로그 파일 열기/읽기 실패 (이번 패스에서 해당 파일만 건너뜀)
    #[error("read error: {path}: {source}")]
    Read {
        /// 로그 파일 경로
        path: String,
        /// 원본 I/O 에러
        source: std::io::Error,
    },

    /// 오프셋 상태 파일이 존재하지만 해석할 수 없음
    #[error("offset state corrupt: {path}: {reason}")]
    StateCorrupt {
        /// 상태 파일 경로
        path: String,
        /// 파싱 실패 사유
        reason: String,
    },

    /// 오프셋 상태 파일 쓰기 실패
    #[error("offset state write failed: {path}: {source}")]
    StateWrite {
        /// 상태 파일 경로
        path: String,
        /// 원본 I/O 에러
        source: std::io::Error,
    },

    /// 분석 엔진 호출 실패 (실행 불가, 비정상 종료, 잘못된 출력)
    #[error("analysis failed: {0}")]
    Analysis(String),

    /// 분석 엔진 호출 타임아웃
    #[error("analysis timed out after {secs}s")]
    AnalysisTimeout {
        /// 적용된 타임아웃 (초)
        secs: u64,
    },

    /// 알림 전송 실패
    #[error("notification failed: {0}")]
    Notification(String),

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// 취소 신호로 패스가 중단됨
    #[error("pass cancelled")]
    Cancelled,

    /// 이미 정지된 스케줄러를 다시 실행하려 함
    #[error("scheduler already stopped")]
    AlreadyStopped,

    /// 기타 I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl MonitorError {
    /// 패스를 중단하지 않고 로그만 남기면 되는 에러인지 확인합니다.
    pub fn is_soft(&self) -> bool {
        matches!(
            self,
            Self::Discovery { .. }
                | Self::Read { .. }
                | Self::Analysis(_)
                | Self::AnalysisTimeout { .. }
                | Self::Notification(_)
        )
    }
}

impl From<MonitorError> for LogSentinelError {
    fn from(err: MonitorError) -> Self {
        match err {
            MonitorError::StateCorrupt { path, reason } => LogSentinelError::Monitor(
                MonitorFailure::StateCorrupt(format!("{path}: {reason}")),
            ),
            MonitorError::Config { field, reason } => LogSentinelError::Monitor(
                MonitorFailure::InitFailed(format!("config error: {field}: {reason}")),
            ),
            MonitorError::AlreadyStopped => {
                LogSentinelError::Monitor(MonitorFailure::AlreadyStopped)
            }
            MonitorError::Io(e) => LogSentinelError::Io(e),
            other => LogSentinelError::Monitor(MonitorFailure::Other(other.to_string())),
        }
    }
}
