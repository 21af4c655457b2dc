//! 분석 엔진 경계 -- 추출한 로그 텍스트를 외부 엔진에 넘기고 판정문을 받습니다.
//!
//! [`AnalysisEngine`] trait은 테스트에서 mock으로 대체할 수 있도록 분석 호출을 추상화합니다.
//! 운영 환경에서는 [`ProcessAnalysisEngine`]이 외부 프로그램(기본: `ollama run ...`)을
//! 실행하여 stdin으로 지시문과 로그를 한 번 전달하고, 종료 후 stdout 전체를 판정문으로 사용합니다.
//!
//! # 실패 처리
//! - 실행 불가, 0이 아닌 종료 코드, 빈 출력: [`MonitorError::Analysis`]
//! - 타임아웃 초과: [`MonitorError::AnalysisTimeout`]
//!
//! 호출 future가 drop되면(타임아웃, 취소) 자식 프로세스도 종료됩니다.

use std::fmt;
use std::future::Future;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

use logsentinel_core::config::AnalysisConfig;

use crate::error::MonitorError;

/// 분석 판정문
///
/// 구조가 없는 자유 텍스트이며, 트리거 키워드 검색에만 사용됩니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict(String);

impl Verdict {
    /// 판정문을 생성합니다.
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// 판정문 텍스트
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 판정문 텍스트를 소유권과 함께 반환합니다.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 분석 엔진 추상화
///
/// 구현체는 `Send + Sync + 'static`이어야 하며, 스케줄러가 소유합니다.
///
/// # 구현체
/// - [`ProcessAnalysisEngine`]: 외부 프로세스 실행
/// - `MockAnalysisEngine`: 테스트 전용
pub trait AnalysisEngine: Send + Sync + 'static {
    /// 로그 텍스트를 분석하여 판정문을 반환합니다.
    fn analyze(&self, text: &str) -> impl Future<Output = Result<Verdict, MonitorError>> + Send;
}

/// 외부 프로세스 기반 분석 엔진
#[derive(Debug, Clone)]
pub struct ProcessAnalysisEngine {
    program: String,
    args: Vec<String>,
    prompt: String,
    timeout: Duration,
}

impl ProcessAnalysisEngine {
    /// 실행할 프로그램과 인자로 엔진을 생성합니다.
    ///
    /// 지시문은 비어 있고 타임아웃은 600초입니다.
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            prompt: String::new(),
            timeout: Duration::from_secs(600),
        }
    }

    /// core 설정에서 엔진을 생성합니다.
    pub fn from_core(config: &AnalysisConfig) -> Self {
        Self::new(config.program.clone(), config.args.clone())
            .with_prompt(config.prompt.clone())
            .with_timeout(Duration::from_secs(config.timeout_secs))
    }

    /// 로그 앞에 붙일 지시문을 설정합니다.
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    /// 호출 타임아웃을 설정합니다.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// 적용된 타임아웃
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// stdin으로 보낼 입력 (지시문 + 로그)
    fn compose_input(&self, text: &str) -> String {
        if self.prompt.is_empty() {
            text.to_owned()
        } else {
            format!("{}\n{}", self.prompt.trim_end(), text)
        }
    }

    /// 프로세스를 한 번 실행합니다 (타임아웃 없음).
    async fn invoke(&self, text: &str) -> Result<Verdict, MonitorError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                MonitorError::Analysis(format!("failed to spawn '{}': {e}", self.program))
            })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| MonitorError::Analysis("child stdin was not captured".to_owned()))?;

        let input = self.compose_input(text);
        let write = async move {
            let result = stdin.write_all(input.as_bytes()).await;
            // stdin을 닫아 EOF 전달
            drop(stdin);
            result
        };

        let (write_result, output) = tokio::join!(write, child.wait_with_output());

        if let Err(e) = write_result {
            if e.kind() == std::io::ErrorKind::BrokenPipe {
                debug!(program = %self.program, "analysis process closed stdin early");
            } else {
                return Err(MonitorError::Analysis(format!(
                    "failed to write to '{}': {e}",
                    self.program
                )));
            }
        }

        let output = output.map_err(|e| {
            MonitorError::Analysis(format!("failed to wait for '{}': {e}", self.program))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(MonitorError::Analysis(format!(
                "'{}' exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let verdict = stdout.trim();
        if verdict.is_empty() {
            return Err(MonitorError::Analysis(format!(
                "'{}' produced no output",
                self.program
            )));
        }

        Ok(Verdict::new(verdict))
    }
}

impl AnalysisEngine for ProcessAnalysisEngine {
    async fn analyze(&self, text: &str) -> Result<Verdict, MonitorError> {
        match tokio::time::timeout(self.timeout, self.invoke(text)).await {
            Ok(result) => result,
            Err(_elapsed) => {
                warn!(
                    program = %self.program,
                    timeout_secs = self.timeout.as_secs(),
                    "analysis timed out, process killed"
                );
                Err(MonitorError::AnalysisTimeout {
                    secs: self.timeout.as_secs(),
                })
            }
        }
    }
}

/// 테스트용 mock 분석 엔진
///
/// 입력에 `fail_marker`가 포함되면 실패하고, 그렇지 않으면 고정 판정문을 반환합니다.
#[cfg(test)]
pub struct MockAnalysisEngine {
    /// 반환할 판정문
    pub verdict: String,
    /// 이 문자열을 포함한 입력은 실패 처리
    pub fail_marker: Option<String>,
    /// 호출 기록
    pub calls: std::sync::Mutex<Vec<String>>,
}

#[cfg(test)]
impl MockAnalysisEngine {
    /// 항상 같은 판정문을 반환하는 mock을 생성합니다.
    pub fn new(verdict: impl Into<String>) -> Self {
        Self {
            verdict: verdict.into(),
            fail_marker: None,
            calls: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// 특정 문자열을 포함한 입력에서 실패하도록 설정합니다.
    pub fn failing_on(mut self, marker: impl Into<String>) -> Self {
        self.fail_marker = Some(marker.into());
        self
    }

    /// 지금까지의 호출 횟수
    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }
}

#[cfg(test)]
impl AnalysisEngine for MockAnalysisEngine {
    async fn analyze(&self, text: &str) -> Result<Verdict, MonitorError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(text.to_owned());
        }
        match &self.fail_marker {
            Some(marker) if text.contains(marker.as_str()) => {
                Err(MonitorError::Analysis("mock failure".to_owned()))
            }
            _ => Ok(Verdict::new(self.verdict.clone())),
        }
    }
}
