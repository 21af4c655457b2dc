//! logsentinel 감시 파이프라인
//!
//! 디렉토리 트리의 로그 파일을 주기적으로 훑어 지난 패스 이후 추가된 내용만 추출하고,
//! 외부 분석 엔진에 넘긴 뒤 판정문에 트리거 키워드가 있으면 알림을 보냅니다.
//!
//! # 모듈 구조
//!
//! - [`error`]: 도메인 에러 (`MonitorError`)
//! - [`config`]: 감시 설정 (`MonitorConfig`, 빌더, 손상 정책)
//! - [`offset`]: 오프셋 저장소 (`OffsetStore`, `OffsetRecord`)
//! - [`discovery`]: 로그 파일 탐색
//! - [`reader`]: 증분 읽기 (`extract`, `Extraction`)
//! - [`analysis`]: 분석 엔진 경계 (`AnalysisEngine`, `ProcessAnalysisEngine`)
//! - [`decision`]: 알림 판정 (`AlertDecision`)
//! - [`notify`]: 알림 채널 경계 (`Notifier`, `GmailNotifier`, `LogNotifier`)
//! - [`scheduler`]: 주기 스케줄러 (`CycleScheduler`)
//!
//! # 아키텍처
//!
//! ```text
//! CycleScheduler
//!   ├─▶ discover(log_dir) ──▶ [*.log]
//!   ├─▶ OffsetStore::load_with_policy
//!   ├─▶ per file: extract ─▶ AnalysisEngine ─▶ AlertDecision ─▶ Notifier
//!   └─▶ OffsetStore::save ─▶ sleep(interval) ─▶ 반복
//! ```

pub mod analysis;
pub mod config;
pub mod decision;
pub mod discovery;
pub mod error;
pub mod notify;
pub mod offset;
pub mod reader;
pub mod scheduler;

// --- Public API Re-exports ---

// 스케줄러
pub use scheduler::{CycleScheduler, PassReport, SchedulerState};

// 설정
pub use config::{MonitorConfig, MonitorConfigBuilder, StateCorruptPolicy};

// 에러
pub use error::MonitorError;

// 오프셋
pub use offset::{OffsetRecord, OffsetStore};

// 탐색 / 읽기
pub use discovery::{Discovered, discover};
pub use reader::{Extraction, extract};

// 분석 / 판정
pub use analysis::{AnalysisEngine, ProcessAnalysisEngine, Verdict};
pub use decision::AlertDecision;

// 알림
pub use notify::{ConfiguredNotifier, GmailNotifier, LogNotifier, Notifier};
