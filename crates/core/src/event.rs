//! 알림 이벤트 -- 판정 결과에서 파생되는 일회성 알림 단위
//!
//! [`AlertEvent`]는 분석 판정문이 트리거 키워드를 포함할 때만 만들어지며,
//! 알림 채널로 전달된 뒤 버려집니다. 영속화되지 않습니다.

use std::fmt;
use std::path::Path;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// 알림 이벤트
///
/// 하나의 로그 파일, 하나의 패스에 대해 최대 한 번 생성됩니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertEvent {
    /// 로그 상관용 ID (UUID v4)
    pub id: String,
    /// 알림이 발생한 로그 파일 경로
    pub source_path: String,
    /// 알림 제목
    pub subject: String,
    /// 알림 본문 (판정문 포함)
    pub body: String,
    /// 알림을 발생시킨 트리거 키워드
    pub matched_term: String,
    /// 생성 시각
    pub created_at: SystemTime,
}

impl AlertEvent {
    /// 분석 판정문으로부터 알림을 생성합니다.
    ///
    /// 제목은 파일명만, 본문은 전체 경로와 판정문을 담습니다.
    pub fn from_verdict(
        source: &Path,
        verdict: &str,
        matched_term: impl Into<String>,
    ) -> Self {
        let file_name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| source.display().to_string());

        Self {
            id: uuid::Uuid::new_v4().to_string(),
            source_path: source.display().to_string(),
            subject: format!("Suspicious Activity Detected in {file_name}"),
            body: format!("Analysis for {}:\n{}\n\n", source.display(), verdict),
            matched_term: matched_term.into(),
            created_at: SystemTime::now(),
        }
    }
}

impl fmt::Display for AlertEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AlertEvent[{}] {} (source={}, term={})",
            self.id, self.subject, self.source_path, self.matched_term
        )
    }
}
