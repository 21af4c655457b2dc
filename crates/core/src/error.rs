//! 에러 타입 -- 도메인별 에러 정의

/// logsentinel 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum LogSentinelError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 감시 파이프라인 에러
    #[error("monitor error: {0}")]
    Monitor(#[from] MonitorFailure),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 감시 파이프라인에서 상위로 전파되는 에러 요약
///
/// 세부 원인은 `logsentinel-monitor`의 `MonitorError`에 있고,
/// 여기에는 데몬이 종료 여부를 판단하는 데 필요한 분류만 남깁니다.
#[derive(Debug, thiserror::Error)]
pub enum MonitorFailure {
    /// 오프셋 상태 파일 손상
    #[error("offset state corrupt: {0}")]
    StateCorrupt(String),

    /// 외부 협력자(분석 엔진, 알림 채널) 초기화 실패
    #[error("collaborator init failed: {0}")]
    InitFailed(String),

    /// 스케줄러가 이미 정지됨
    #[error("scheduler already stopped")]
    AlreadyStopped,

    /// 그 외 실행 중 실패
    #[error("{0}")]
    Other(String),
}
