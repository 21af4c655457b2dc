//! logsentinel 공통 크레이트
//!
//! 감시 파이프라인과 데몬이 함께 쓰는 타입을 모아 둡니다.
//!
//! - [`config`]: `logsentinel.toml` 파싱, 환경변수 오버라이드, 검증
//! - [`error`]: 최상위 에러 타입
//! - [`event`]: 알림 이벤트
//! - [`metrics`]: Prometheus 메트릭 이름과 설명

pub mod config;
pub mod error;
pub mod event;
pub mod metrics;

// --- 주요 타입 re-export ---

// 에러
pub use error::{ConfigError, LogSentinelError, MonitorFailure};

// 설정
pub use config::LogSentinelConfig;

// 이벤트
pub use event::AlertEvent;
