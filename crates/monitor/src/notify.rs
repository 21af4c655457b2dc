//! 알림 채널 경계 -- (수신자, 제목, 본문)을 전달하고 수신 확인 ID를 받습니다.
//!
//! [`Notifier`] trait은 채널 구현을 추상화합니다.
//!
//! # 구현체
//! - [`GmailNotifier`]: Gmail REST API로 평문 메일 전송. 액세스 토큰은 매 전송마다
//!   `token_file`에서 읽습니다. 토큰 발급과 갱신은 외부에서 처리합니다.
//! - [`LogNotifier`]: 알림을 로그로만 남기는 dry-run 채널
//! - [`ConfiguredNotifier`]: 설정의 `notify.kind`에 따라 위 둘 중 하나를 선택
//!
//! 전송 실패는 [`MonitorError::Notification`]이며, 같은 패스에서 재시도하지 않습니다.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use serde::Deserialize;
use tracing::{debug, info};

use logsentinel_core::config::NotifyConfig;

use crate::error::MonitorError;

/// Gmail 메시지 전송 엔드포인트 경로
const GMAIL_SEND_PATH: &str = "/gmail/v1/users/me/messages/send";

/// 알림 채널 추상화
pub trait Notifier: Send + Sync + 'static {
    /// 알림을 전송하고 채널이 부여한 수신 확인 ID를 반환합니다.
    fn notify(
        &self,
        recipient: &str,
        subject: &str,
        body: &str,
    ) -> impl Future<Output = Result<String, MonitorError>> + Send;
}

/// Gmail REST API 알림 채널
#[derive(Debug, Clone)]
pub struct GmailNotifier {
    client: reqwest::Client,
    api_base: String,
    token_file: PathBuf,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct TokenDocument {
    token: Option<String>,
    access_token: Option<String>,
}

impl GmailNotifier {
    /// API 기본 URL, 토큰 파일, 요청 타임아웃으로 채널을 생성합니다.
    pub fn new(
        api_base: impl Into<String>,
        token_file: impl Into<PathBuf>,
        request_timeout: Duration,
    ) -> Result<Self, MonitorError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| MonitorError::Notification(format!("failed to build http client: {e}")))?;

        Ok(Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_owned(),
            token_file: token_file.into(),
        })
    }

    /// core 설정에서 채널을 생성합니다.
    pub fn from_core(config: &NotifyConfig) -> Result<Self, MonitorError> {
        Self::new(
            config.api_base.clone(),
            config.token_file.clone(),
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    /// 토큰 파일에서 액세스 토큰을 읽습니다.
    async fn access_token(&self) -> Result<String, MonitorError> {
        let content = tokio::fs::read_to_string(&self.token_file)
            .await
            .map_err(|e| {
                MonitorError::Notification(format!(
                    "failed to read token file {}: {e}",
                    self.token_file.display()
                ))
            })?;
        parse_token(&content).ok_or_else(|| {
            MonitorError::Notification(format!(
                "no access token found in {}",
                self.token_file.display()
            ))
        })
    }

    /// 토큰 파일 경로
    pub fn token_file(&self) -> &Path {
        &self.token_file
    }
}

impl Notifier for GmailNotifier {
    async fn notify(
        &self,
        recipient: &str,
        subject: &str,
        body: &str,
    ) -> Result<String, MonitorError> {
        let token = self.access_token().await?;
        let raw = URL_SAFE.encode(build_message(recipient, subject, body));
        let url = format!("{}{}", self.api_base, GMAIL_SEND_PATH);

        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(&serde_json::json!({ "raw": raw }))
            .send()
            .await
            .map_err(|e| MonitorError::Notification(format!("request to {url} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(MonitorError::Notification(format!(
                "gmail api returned {status}: {}",
                text.trim()
            )));
        }

        let sent: SendResponse = response.json().await.map_err(|e| {
            MonitorError::Notification(format!("unexpected gmail api response: {e}"))
        })?;

        debug!(message_id = %sent.id, recipient, "gmail message sent");
        Ok(sent.id)
    }
}

/// 로그 전용 알림 채널
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    async fn notify(
        &self,
        recipient: &str,
        subject: &str,
        body: &str,
    ) -> Result<String, MonitorError> {
        let id = uuid::Uuid::new_v4().to_string();
        info!(
            message_id = %id,
            recipient,
            subject,
            body_len = body.len(),
            "alert (log channel)"
        );
        Ok(id)
    }
}

/// 설정으로 선택되는 알림 채널
#[derive(Debug, Clone)]
pub enum ConfiguredNotifier {
    /// Gmail API
    Gmail(GmailNotifier),
    /// 로그 전용
    Log(LogNotifier),
}

impl ConfiguredNotifier {
    /// `notify.kind`에 맞는 채널을 생성합니다.
    pub fn from_core(config: &NotifyConfig) -> Result<Self, MonitorError> {
        match config.kind.as_str() {
            "gmail" => Ok(Self::Gmail(GmailNotifier::from_core(config)?)),
            "log" => Ok(Self::Log(LogNotifier)),
            other => Err(MonitorError::Config {
                field: "notify.kind".to_owned(),
                reason: format!("unknown notifier kind '{other}'"),
            }),
        }
    }

    /// 채널 이름
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Gmail(_) => "gmail",
            Self::Log(_) => "log",
        }
    }
}

impl Notifier for ConfiguredNotifier {
    async fn notify(
        &self,
        recipient: &str,
        subject: &str,
        body: &str,
    ) -> Result<String, MonitorError> {
        match self {
            Self::Gmail(n) => n.notify(recipient, subject, body).await,
            Self::Log(n) => n.notify(recipient, subject, body).await,
        }
    }
}

/// 토큰 파일 내용에서 액세스 토큰을 추출합니다.
///
/// `{"token": ..}` 또는 `{"access_token": ..}` JSON, 혹은 토큰 문자열 자체를 허용합니다.
fn parse_token(content: &str) -> Option<String> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return None;
    }

    if trimmed.starts_with('{') {
        let doc: TokenDocument = serde_json::from_str(trimmed).ok()?;
        return doc
            .token
            .or(doc.access_token)
            .filter(|t| !t.trim().is_empty());
    }

    Some(trimmed.to_owned())
}

/// RFC 2822 평문 메시지를 만듭니다.
fn build_message(recipient: &str, subject: &str, body: &str) -> String {
    format!(
        "To: {}\r\nSubject: {}\r\nMIME-Version: 1.0\r\nContent-Type: text/plain; charset=\"utf-8\"\r\nContent-Transfer-Encoding: 8bit\r\n\r\n{}",
        single_line(recipient),
        encode_header(&single_line(subject)),
        body
    )
}

/// 헤더 값에서 줄바꿈을 제거합니다.
fn single_line(value: &str) -> String {
    value.replace(['\r', '\n'], " ")
}

/// 비 ASCII 헤더 값은 RFC 2047 encoded-word로 인코딩합니다.
fn encode_header(value: &str) -> String {
    if value.is_ascii() {
        value.to_owned()
    } else {
        format!("=?UTF-8?B?{}?=", STANDARD.encode(value))
    }
}

/// 테스트용 mock 알림 채널
#[cfg(test)]
#[derive(Default)]
pub struct MockNotifier {
    /// 전송된 (수신자, 제목, 본문)
    pub sent: std::sync::Mutex<Vec<(String, String, String)>>,
    /// 전송 실패를 시뮬레이션할지 여부
    pub fail: bool,
}

#[cfg(test)]
impl MockNotifier {
    /// 항상 성공하는 mock을 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 항상 실패하는 mock을 생성합니다.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    /// 전송 시도된 메시지 수
    pub fn sent_count(&self) -> usize {
        self.sent.lock().map(|s| s.len()).unwrap_or(0)
    }
}

#[cfg(test)]
impl Notifier for MockNotifier {
    async fn notify(
        &self,
        recipient: &str,
        subject: &str,
        body: &str,
    ) -> Result<String, MonitorError> {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push((recipient.to_owned(), subject.to_owned(), body.to_owned()));
        }
        if self.fail {
            return Err(MonitorError::Notification("mock failure".to_owned()));
        }
        Ok(format!("mock-{}", self.sent_count()))
    }
}
