//! Service assembly -- configuration loading, collaborator wiring, and lifecycle.
//!
//! The [`Service`] is the central coordinator of `logsentinel-daemon`.
//! It resolves the effective configuration (file, environment, CLI),
//! builds the analysis engine and notifier, performs a preflight read of
//! the offset state, and drives the [`CycleScheduler`] until a shutdown
//! signal arrives.
//!
//! # Shutdown
//!
//! SIGTERM or SIGINT cancels the scheduler's token. An in-flight pass is
//! abandoned without saving offsets, so the next start resumes from the
//! last completed pass.

use std::sync::Arc;

use anyhow::Result;
use tokio_util::sync::CancellationToken;

use logsentinel_core::config::LogSentinelConfig;
use logsentinel_core::error::{ConfigError, LogSentinelError};
use logsentinel_core::metrics as m;
use logsentinel_monitor::{
    ConfiguredNotifier, CycleScheduler, MonitorConfig, MonitorError, OffsetStore, PassReport,
    ProcessAnalysisEngine, SchedulerState,
};

use crate::cli::DaemonCli;
use crate::metrics_server;

/// The scheduler type used by the daemon.
pub type DaemonScheduler = CycleScheduler<ProcessAnalysisEngine, ConfiguredNotifier>;

/// Resolve the effective configuration for a CLI invocation.
///
/// Loading order: defaults -> file -> environment -> CLI flags.
/// A missing file at the default location falls back to defaults plus
/// environment overrides; a missing explicit `--config` path is an error.
pub async fn load_config(cli: &DaemonCli) -> Result<LogSentinelConfig> {
    let mut config = match LogSentinelConfig::from_file(&cli.config).await {
        Ok(config) => config,
        Err(LogSentinelError::Config(ConfigError::FileNotFound { path }))
            if cli.uses_default_config_path() =>
        {
            tracing::debug!(path = %path, "default config file not found, using built-in defaults");
            LogSentinelConfig::default()
        }
        Err(e) => return Err(anyhow::anyhow!("failed to load config: {}", e)),
    };

    config.apply_env_overrides();
    apply_cli_overrides(&mut config, cli);

    config
        .validate()
        .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

    Ok(config)
}

/// Apply CLI flag overrides on top of an already-loaded configuration.
pub fn apply_cli_overrides(config: &mut LogSentinelConfig, cli: &DaemonCli) {
    if let Some(level) = &cli.log_level {
        config.general.log_level = level.clone();
    }
    if let Some(format) = &cli.log_format {
        config.general.log_format = format.clone();
    }
    if let Some(dir) = &cli.log_dir {
        config.monitor.log_dir = dir.clone();
    }
    if let Some(secs) = cli.interval_secs {
        config.monitor.poll_interval_secs = secs;
    }
    if let Some(max_lines) = cli.max_lines {
        config.monitor.max_lines = max_lines;
    }
}

/// The assembled daemon.
pub struct Service {
    config: LogSentinelConfig,
    scheduler: Arc<DaemonScheduler>,
}

impl Service {
    /// Build from an already-loaded configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration validation fails
    /// - The metrics endpoint cannot be installed
    /// - The notifier cannot be constructed
    /// - The offset state is corrupt and `on_corrupt_state = "abort"`
    pub async fn build_from_config(config: LogSentinelConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

        if config.metrics.enabled {
            metrics_server::install_metrics_recorder(&config.metrics)?;
        }
        metrics::gauge!(m::BUILD_INFO, m::LABEL_VERSION => env!("CARGO_PKG_VERSION")).set(1.0);

        let monitor_config = MonitorConfig::from_core(&config);
        let engine = ProcessAnalysisEngine::from_core(&config.analysis);
        let notifier = ConfiguredNotifier::from_core(&config.notify)
            .map_err(|e| anyhow::anyhow!("failed to build notifier: {}", e))?;

        tracing::info!(
            program = %config.analysis.program,
            timeout_secs = config.analysis.timeout_secs,
            notifier = notifier.kind(),
            "collaborators initialized"
        );

        // Under the abort policy a corrupt state stops startup here.
        let entries = OffsetStore::new(monitor_config.state_file.clone())
            .load_with_policy(monitor_config.corrupt_policy)
            .await
            .map(|record| record.len())
            .map_err(|e| anyhow::anyhow!("failed to load offset state: {}", e))?;
        tracing::info!(
            state_file = %monitor_config.state_file.display(),
            entries,
            "offset state loaded"
        );

        let scheduler = CycleScheduler::new(
            monitor_config,
            config.notify.recipient.clone(),
            engine,
            notifier,
        )
        .map_err(|e| anyhow::anyhow!("failed to build scheduler: {}", e))?;

        Ok(Self {
            config,
            scheduler: Arc::new(scheduler),
        })
    }

    /// The effective configuration.
    pub fn config(&self) -> &LogSentinelConfig {
        &self.config
    }

    /// Current scheduler state.
    pub fn state(&self) -> SchedulerState {
        self.scheduler.state()
    }

    /// Token that stops the service when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.scheduler.cancellation_token()
    }

    /// Run a single pass.
    ///
    /// A cancelled pass returns `Ok(None)`.
    pub async fn run_once(&self) -> Result<Option<PassReport>> {
        match self.scheduler.run_pass().await {
            Ok(report) => {
                tracing::info!(
                    files = report.files_discovered,
                    analyzed = report.files_analyzed,
                    alerts = report.alerts_sent,
                    offsets_saved = report.offsets_saved,
                    "single pass completed"
                );
                Ok(Some(report))
            }
            Err(MonitorError::Cancelled) => Ok(None),
            Err(e) => Err(anyhow::anyhow!("pass failed: {}", e)),
        }
    }

    /// Run until the cancellation token fires.
    pub async fn run(&self) -> Result<()> {
        self.scheduler
            .run()
            .await
            .map_err(|e| anyhow::anyhow!("scheduler failed: {}", e))
    }

    /// Run the service and cancel it on SIGTERM/SIGINT.
    ///
    /// With `once = true` a single pass is executed instead of the loop.
    pub async fn run_until_signal(&self, once: bool) -> Result<()> {
        let token = self.cancellation_token();
        let signal_task = tokio::spawn({
            let token = token.clone();
            async move {
                tokio::select! {
                    result = wait_for_shutdown_signal() => match result {
                        Ok(signal) => {
                            tracing::info!(signal = signal, "shutdown signal received");
                            token.cancel();
                        }
                        Err(e) => tracing::error!(error = %e, "signal handling unavailable"),
                    },
                    _ = token.cancelled() => {}
                }
            }
        });

        let result = if once {
            self.run_once().await.map(|_| ())
        } else {
            self.run().await
        };

        token.cancel();
        if let Err(e) = signal_task.await {
            tracing::warn!(error = %e, "signal task ended abnormally");
        }

        result
    }
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
///
/// Returns the name of the signal that triggered the shutdown.
///
/// # Errors
///
/// Returns an error if signal handlers cannot be installed.
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}
