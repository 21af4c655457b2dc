//! 주기 스케줄러 -- 탐색, 읽기, 분석, 판정, 알림, 오프셋 저장을 한 패스로 묶어 반복합니다.
//!
//! # 패스 흐름
//! ```text
//! discover ─▶ load offsets ─▶ for each file:
//!                               extract ─▶ analyze ─▶ decide ─▶ (notify)
//!                               offset 갱신 (메모리)
//!             ─▶ save offsets (패스당 한 번) ─▶ sleep(interval) ─▶ 반복
//! ```
//!
//! 파일은 순차 처리하며 두 패스가 겹치지 않습니다.
//! 패스 도중 취소되면 오프셋을 저장하지 않고 패스를 버립니다.
//! 다음 실행은 직전 패스에서 저장된 오프셋부터 다시 읽습니다 (at-least-once).

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use logsentinel_core::event::AlertEvent;
use logsentinel_core::metrics as m;

use crate::analysis::AnalysisEngine;
use crate::config::MonitorConfig;
use crate::decision::AlertDecision;
use crate::discovery::discover;
use crate::error::MonitorError;
use crate::notify::Notifier;
use crate::offset::{OffsetRecord, OffsetStore};
use crate::reader::extract;

/// 스케줄러 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SchedulerState {
    /// 생성됨, 아직 `run` 전
    Idle = 0,
    /// 실행 중 (패스 또는 대기)
    Running = 1,
    /// 정지됨 (종료 상태)
    Stopped = 2,
}

impl SchedulerState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Idle,
            1 => Self::Running,
            _ => Self::Stopped,
        }
    }
}

impl std::fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Running => write!(f, "running"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// 한 패스의 처리 요약
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
    /// 발견된 로그 파일 수
    pub files_discovered: usize,
    /// 새 내용이 있었던 파일 수
    pub files_read: usize,
    /// 분석에 성공한 파일 수
    pub files_analyzed: usize,
    /// 읽기 실패로 건너뛴 파일 수
    pub files_skipped: usize,
    /// 분석 실패 수
    pub analysis_failures: usize,
    /// 전송된 알림 수
    pub alerts_sent: usize,
    /// 알림 전송 실패 수
    pub notification_failures: usize,
    /// 감지된 truncation 수
    pub truncations: usize,
    /// 읽은 바이트 수
    pub bytes_read: u64,
    /// 파일이 사라져 지운 오프셋 수
    pub offsets_pruned: usize,
    /// 오프셋 저장 성공 여부
    pub offsets_saved: bool,
}

/// 주기 스케줄러
///
/// 분석 엔진과 알림 채널을 제네릭으로 받아 테스트에서 mock으로 대체할 수 있습니다.
/// `run`은 한 번만 호출할 수 있으며, 취소 후에는 [`MonitorError::AlreadyStopped`]를 반환합니다.
pub struct CycleScheduler<A, N> {
    config: MonitorConfig,
    recipient: String,
    engine: A,
    notifier: N,
    store: OffsetStore,
    decision: AlertDecision,
    cancel: CancellationToken,
    state: AtomicU8,
}

impl<A: AnalysisEngine, N: Notifier> CycleScheduler<A, N> {
    /// 스케줄러를 생성합니다.
    ///
    /// 설정을 검증하며, 잘못된 설정이면 [`MonitorError::Config`]를 반환합니다.
    pub fn new(
        config: MonitorConfig,
        recipient: impl Into<String>,
        engine: A,
        notifier: N,
    ) -> Result<Self, MonitorError> {
        config.validate()?;

        let store = OffsetStore::new(config.state_file.clone());
        let decision = AlertDecision::new(&config.trigger_terms);

        Ok(Self {
            config,
            recipient: recipient.into(),
            engine,
            notifier,
            store,
            decision,
            cancel: CancellationToken::new(),
            state: AtomicU8::new(SchedulerState::Idle as u8),
        })
    }

    /// 외부에서 만든 취소 토큰을 사용합니다.
    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// 취소 토큰의 복제본을 반환합니다. `cancel()` 호출 시 스케줄러가 정지합니다.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// 현재 상태
    pub fn state(&self) -> SchedulerState {
        SchedulerState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// 감시 설정
    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// 오프셋 저장소
    pub fn offset_store(&self) -> &OffsetStore {
        &self.store
    }

    fn set_state(&self, state: SchedulerState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// 취소될 때까지 패스와 대기를 반복합니다.
    ///
    /// 패스 에러는 로그만 남기고 다음 주기로 넘어갑니다.
    pub async fn run(&self) -> Result<(), MonitorError> {
        if self
            .state
            .compare_exchange(
                SchedulerState::Idle as u8,
                SchedulerState::Running as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            return Err(MonitorError::AlreadyStopped);
        }

        info!(
            log_dir = %self.config.log_dir.display(),
            interval_secs = self.config.poll_interval_secs,
            max_lines = self.config.max_lines,
            "scheduler started"
        );

        if !self.config.run_on_start && !self.sleep_or_cancel().await {
            self.stop();
            return Ok(());
        }

        loop {
            match self.run_pass().await {
                Ok(report) => info!(
                    files = report.files_discovered,
                    read = report.files_read,
                    analyzed = report.files_analyzed,
                    alerts = report.alerts_sent,
                    analysis_failures = report.analysis_failures,
                    offsets_saved = report.offsets_saved,
                    "monitoring pass completed"
                ),
                Err(MonitorError::Cancelled) => break,
                Err(e) => error!(error = %e, "monitoring pass failed"),
            }

            if !self.sleep_or_cancel().await {
                break;
            }
        }

        self.stop();
        Ok(())
    }

    fn stop(&self) {
        self.set_state(SchedulerState::Stopped);
        info!("scheduler stopped");
    }

    /// 주기만큼 대기합니다. 취소되면 `false`를 반환합니다.
    async fn sleep_or_cancel(&self) -> bool {
        debug!(secs = self.config.poll_interval_secs, "sleeping until next pass");
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(self.config.poll_interval()) => true,
        }
    }

    /// 한 패스를 실행합니다.
    ///
    /// 파일 단위 실패(읽기, 분석, 알림)는 패스를 중단시키지 않습니다.
    /// 오프셋 저장 실패는 에러 로그를 남기고 `offsets_saved = false`로 보고합니다.
    pub async fn run_pass(&self) -> Result<PassReport, MonitorError> {
        let started = Instant::now();
        let result = self.execute_pass().await;

        let outcome = match &result {
            Ok(_) => "success",
            Err(MonitorError::Cancelled) => "cancelled",
            Err(_) => "failure",
        };
        metrics::counter!(m::PASSES_TOTAL, m::LABEL_RESULT => outcome).increment(1);
        metrics::histogram!(m::PASS_DURATION_SECONDS).record(started.elapsed().as_secs_f64());

        result
    }

    async fn execute_pass(&self) -> Result<PassReport, MonitorError> {
        if self.cancel.is_cancelled() {
            return Err(MonitorError::Cancelled);
        }

        let root = self.config.log_dir.clone();
        let discovered = tokio::task::spawn_blocking(move || discover(&root))
            .await
            .map_err(|e| MonitorError::Discovery {
                path: self.config.log_dir.display().to_string(),
                reason: format!("spawn_blocking failed: {e}"),
            })?;

        if !discovered.root_exists {
            warn!(
                log_dir = %self.config.log_dir.display(),
                "log directory does not exist, nothing to scan"
            );
        }

        metrics::gauge!(m::FILES_DISCOVERED).set(discovered.files.len() as f64);

        let mut offsets = self
            .store
            .load_with_policy(self.config.corrupt_policy)
            .await?;

        let mut report = PassReport {
            files_discovered: discovered.files.len(),
            ..Default::default()
        };

        for path in &discovered.files {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    info!(path = %path.display(), "pass cancelled, offsets not saved");
                    return Err(MonitorError::Cancelled);
                }
                () = self.process_file(path, &mut offsets, &mut report) => {}
            }
        }

        if discovered.root_exists {
            report.offsets_pruned = prune_missing(&discovered.files, &mut offsets).await;
        }

        match self.store.save(&offsets).await {
            Ok(()) => report.offsets_saved = true,
            Err(e) => error!(
                error = %e,
                "failed to persist offsets, next pass resumes from last saved state"
            ),
        }

        Ok(report)
    }

    /// 파일 하나를 처리하고 메모리상의 오프셋을 갱신합니다.
    async fn process_file(
        &self,
        path: &Path,
        offsets: &mut OffsetRecord,
        report: &mut PassReport,
    ) {
        let last_offset = offsets.get(path);

        let extraction = match extract(path, last_offset, self.config.max_lines).await {
            Ok(e) => e,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read log file, skipping");
                metrics::counter!(m::READ_FAILURES_TOTAL).increment(1);
                report.files_skipped += 1;
                return;
            }
        };

        if extraction.truncated {
            metrics::counter!(m::TRUNCATIONS_TOTAL).increment(1);
            report.truncations += 1;
        }

        if extraction.is_empty() {
            if extraction.new_offset != last_offset {
                offsets.set(path, extraction.new_offset);
            }
            return;
        }

        let read_from = if extraction.truncated { 0 } else { last_offset };
        let bytes = extraction.new_offset - read_from;
        metrics::counter!(m::FILES_SCANNED_TOTAL).increment(1);
        metrics::counter!(m::BYTES_READ_TOTAL).increment(bytes);
        report.files_read += 1;
        report.bytes_read += bytes;

        debug!(
            path = %path.display(),
            lines = extraction.lines_total - extraction.lines_dropped,
            dropped = extraction.lines_dropped,
            "analyzing new content"
        );

        let analysis_started = Instant::now();
        let verdict = match self.engine.analyze(&extraction.text).await {
            Ok(v) => v,
            Err(e) => {
                let reason = match e {
                    MonitorError::AnalysisTimeout { .. } => "timeout",
                    _ => "error",
                };
                warn!(path = %path.display(), error = %e, "analysis failed");
                metrics::counter!(m::ANALYSIS_FAILURES_TOTAL, m::LABEL_REASON => reason)
                    .increment(1);
                report.analysis_failures += 1;

                if self.config.retry_failed_analysis {
                    debug!(path = %path.display(), offset = last_offset, "offset kept for retry");
                } else {
                    offsets.set(path, extraction.new_offset);
                }
                return;
            }
        };
        metrics::histogram!(m::ANALYSIS_DURATION_SECONDS)
            .record(analysis_started.elapsed().as_secs_f64());
        report.files_analyzed += 1;

        if let Some(term) = self.decision.matched_term(&verdict) {
            let alert = AlertEvent::from_verdict(path, verdict.as_str(), term);
            match self
                .notifier
                .notify(&self.recipient, &alert.subject, &alert.body)
                .await
            {
                Ok(ack) => {
                    info!(
                        alert_id = %alert.id,
                        ack = %ack,
                        path = %path.display(),
                        term = %alert.matched_term,
                        "alert sent"
                    );
                    metrics::counter!(m::ALERTS_SENT_TOTAL).increment(1);
                    report.alerts_sent += 1;
                }
                Err(e) => {
                    warn!(
                        alert_id = %alert.id,
                        path = %path.display(),
                        error = %e,
                        "failed to send alert"
                    );
                    metrics::counter!(m::NOTIFICATION_FAILURES_TOTAL).increment(1);
                    report.notification_failures += 1;
                }
            }
        } else {
            debug!(path = %path.display(), "no trigger terms in verdict");
        }

        offsets.set(path, extraction.new_offset);
    }
}

/// 이번 패스에서 발견되지 않았고 파일시스템에도 없는 경로의 오프셋을 지웁니다.
///
/// 존재 여부를 확인할 수 없는 경로는 유지합니다.
async fn prune_missing(discovered: &[PathBuf], offsets: &mut OffsetRecord) -> usize {
    let seen: HashSet<&Path> = discovered.iter().map(PathBuf::as_path).collect();
    let candidates: Vec<PathBuf> = offsets
        .iter()
        .map(|(key, _)| PathBuf::from(key))
        .filter(|path| !seen.contains(path.as_path()))
        .collect();

    let mut pruned = 0;
    for path in candidates {
        if matches!(tokio::fs::try_exists(&path).await, Ok(false)) {
            offsets.remove(&path);
            pruned += 1;
        }
    }

    if pruned > 0 {
        debug!(pruned, "dropped offsets of files that no longer exist");
    }
    pruned
}
