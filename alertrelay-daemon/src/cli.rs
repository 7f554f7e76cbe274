//! CLI argument definitions for the alertrelay daemon.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.

use std::path::PathBuf;

use clap::Parser;

use alertrelay_core::config::AlertrelayConfig;

/// Flag appended to the argument list when the daemon re-executes itself.
pub const RESTARTED_FLAG: &str = "--restarted";

/// alertrelay security-alert shipper.
///
/// Tails exactly one sensor's alert log, filters and enriches each alert,
/// and forwards survivors to a webhook while checkpointing progress.
#[derive(Parser, Debug)]
#[command(name = "alertrelay")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to alertrelay.toml configuration file.
    #[arg(short, long, default_value = "alertrelay.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_format: Option<String>,

    /// Validate configuration file and exit without starting the daemon.
    #[arg(long)]
    pub validate: bool,

    /// Marks a process started by a restart-on-change re-exec.
    #[arg(long)]
    pub restarted: bool,
}

impl DaemonCli {
    /// Apply CLI overrides on top of file and environment configuration.
    pub fn apply_overrides(&self, config: &mut AlertrelayConfig) {
        if let Some(level) = &self.log_level {
            config.general.log_level = level.clone();
        }
        if let Some(format) = &self.log_format {
            config.general.log_format = format.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cli = DaemonCli::parse_from(["alertrelay"]);
        assert_eq!(cli.config, PathBuf::from("alertrelay.toml"));
        assert!(cli.log_level.is_none());
        assert!(!cli.validate);
        assert!(!cli.restarted);
    }

    #[test]
    fn parses_all_flags() {
        let cli = DaemonCli::parse_from([
            "alertrelay",
            "--config",
            "/etc/alertrelay/alertrelay.toml",
            "--log-level",
            "debug",
            "--log-format",
            "pretty",
            "--validate",
            RESTARTED_FLAG,
        ]);
        assert_eq!(cli.config, PathBuf::from("/etc/alertrelay/alertrelay.toml"));
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert_eq!(cli.log_format.as_deref(), Some("pretty"));
        assert!(cli.validate);
        assert!(cli.restarted);
    }

    #[test]
    fn overrides_take_precedence() {
        let cli = DaemonCli::parse_from(["alertrelay", "--log-level", "warn"]);
        let mut config = AlertrelayConfig::default();
        config.general.log_format = "pretty".to_owned();

        cli.apply_overrides(&mut config);

        assert_eq!(config.general.log_level, "warn");
        assert_eq!(config.general.log_format, "pretty");
    }
}
