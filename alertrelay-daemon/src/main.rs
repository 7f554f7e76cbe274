use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;

use alertrelay_core::config::AlertrelayConfig;
use alertrelay_daemon::cli::DaemonCli;
use alertrelay_daemon::orchestrator::Orchestrator;
use alertrelay_daemon::{logging, metrics_server, restart};
use alertrelay_shipper::ExitStatus;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = DaemonCli::parse();

    let config = match load_config(&cli).await {
        Ok(config) => config,
        Err(e) => {
            eprintln!("alertrelay: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    if cli.validate {
        println!("configuration is valid: {}", cli.config.display());
        return ExitCode::SUCCESS;
    }

    if let Err(e) = logging::init_tracing(&config.general) {
        eprintln!("alertrelay: {e:#}");
        return ExitCode::FAILURE;
    }

    match run(cli, config).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "alertrelay failed");
            ExitCode::FAILURE
        }
    }
}

/// File -> environment -> CLI overrides -> validation.
async fn load_config(cli: &DaemonCli) -> Result<AlertrelayConfig> {
    let mut config = AlertrelayConfig::from_file(&cli.config).await?;
    config.apply_env_overrides();
    cli.apply_overrides(&mut config);
    config.validate()?;
    Ok(config)
}

async fn run(cli: DaemonCli, config: AlertrelayConfig) -> Result<ExitCode> {
    if config.metrics.enabled {
        metrics_server::install_metrics_recorder(&config.metrics)?;
    }

    let orchestrator = Orchestrator::new(config, &cli.config, cli.restarted)?;
    let exit = orchestrator.run().await?;

    match (exit.status, exit.restart) {
        (ExitStatus::Graceful, Some(changed)) => {
            tracing::info!(changed = %changed.display(), "file changed, restarting");
            Err(restart::reexec())
        }
        (ExitStatus::Graceful, None) => {
            tracing::info!("alertrelay shut down");
            Ok(ExitCode::SUCCESS)
        }
        (ExitStatus::Failed, _) => Ok(ExitCode::FAILURE),
    }
}
