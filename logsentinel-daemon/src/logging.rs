//! Logging initialization for logsentinel-daemon.
//!
//! The `[general]` log level applies to the logsentinel crates only.
//! Every other target (HTTP client, directory walker, runtime) stays at `warn`.
//! `RUST_LOG` replaces the whole filter when set.

use anyhow::Result;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use logsentinel_core::config::GeneralConfig;

/// Tracing targets that follow the configured log level.
const WORKSPACE_TARGETS: [&str; 3] = [
    "logsentinel_core",
    "logsentinel_monitor",
    "logsentinel_daemon",
];

/// Level applied to every other target.
const DEPENDENCY_LEVEL: &str = "warn";

/// Build the filter directives for a configured level.
///
/// `"debug"` yields `warn,logsentinel_core=debug,logsentinel_monitor=debug,logsentinel_daemon=debug`.
pub fn filter_directives(level: &str) -> String {
    WORKSPACE_TARGETS
        .iter()
        .fold(DEPENDENCY_LEVEL.to_owned(), |mut directives, target| {
            directives.push(',');
            directives.push_str(target);
            directives.push('=');
            directives.push_str(level);
            directives
        })
}

/// Resolve the filter: `RUST_LOG` if set, otherwise the configured level.
fn build_env_filter(config: &GeneralConfig) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }

    EnvFilter::try_new(filter_directives(&config.log_level))
        .map_err(|e| anyhow::anyhow!("invalid log level '{}': {}", config.log_level, e))
}

/// Initialize the global tracing subscriber.
///
/// Must be called exactly once, before any tracing macros are used.
///
/// # Formats
///
/// * `"json"` - one JSON object per line, event fields at the top level
/// * `"pretty"` - multi-line human-readable output
pub fn init_tracing(config: &GeneralConfig) -> Result<()> {
    let env_filter = build_env_filter(config)?;

    match config.log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .flatten_event(true)
                        .with_current_span(false),
                )
                .try_init()
                .map_err(|e| {
                    anyhow::anyhow!("failed to initialize JSON tracing subscriber: {}", e)
                })?;
        }
        "pretty" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .try_init()
                .map_err(|e| {
                    anyhow::anyhow!("failed to initialize pretty tracing subscriber: {}", e)
                })?;
        }
        _ => {
            return Err(anyhow::anyhow!(
                "unknown log format '{}', expected 'json' or 'pretty'",
                config.log_format
            ));
        }
    }

    Ok(())
}
