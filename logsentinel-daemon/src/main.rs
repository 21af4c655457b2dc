use anyhow::Result;
use clap::Parser;

use logsentinel_daemon::cli::DaemonCli;
use logsentinel_daemon::logging;
use logsentinel_daemon::service::{self, Service};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = DaemonCli::parse();

    let config = service::load_config(&cli).await?;

    if cli.validate {
        println!("configuration is valid: {}", cli.config.display());
        return Ok(());
    }

    logging::init_tracing(&config.general)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        log_dir = %config.monitor.log_dir,
        interval_secs = config.monitor.poll_interval_secs,
        "logsentinel-daemon starting"
    );

    let service = Service::build_from_config(config).await?;
    service.run_until_signal(cli.once).await?;

    tracing::info!("logsentinel-daemon shut down");
    Ok(())
}
