//! Daemon orchestrator.
//!
//! Wires the shipper engine to its process-level collaborators:
//! the webhook notifier, the startup announcement, the change watcher
//! and the SIGINT/SIGTERM handlers.
//!
//! # Lifecycle
//!
//! ```text
//! announce_startup -> Engine::build -> spawn watcher -> spawn signal task
//!                  -> Engine::run (until cancelled or failed) -> EngineExit
//! ```
//!
//! Both the signal task and the watcher only ever cancel the shared
//! shutdown token; the engine owns the shutdown protocol.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use alertrelay_core::config::AlertrelayConfig;
use alertrelay_core::pipeline::DynNotifier;
use alertrelay_shipper::engine::error_chain;
use alertrelay_shipper::notify::startup_notice;
use alertrelay_shipper::{ChangeWatcher, Engine, EngineExit, WebhookNotifier};

/// Daemon orchestrator.
pub struct Orchestrator {
    config: AlertrelayConfig,
    config_path: PathBuf,
    restarted: bool,
    notifier: Option<Arc<dyn DynNotifier>>,
    shutdown: CancellationToken,
}

impl Orchestrator {
    /// Create an orchestrator from a validated configuration.
    ///
    /// Builds the webhook notifier when `[notify].enabled`.
    pub fn new(
        config: AlertrelayConfig,
        config_path: impl Into<PathBuf>,
        restarted: bool,
    ) -> Result<Self> {
        let notifier = if config.notify.enabled {
            let webhook = WebhookNotifier::new(&config.notify)
                .map_err(|e| anyhow::anyhow!("failed to create webhook notifier: {}", e))?;
            Some(Arc::new(webhook) as Arc<dyn DynNotifier>)
        } else {
            None
        };

        Ok(Self {
            config,
            config_path: config_path.into(),
            restarted,
            notifier,
            shutdown: CancellationToken::new(),
        })
    }

    /// Replace the notification channel.
    pub fn with_notifier(mut self, notifier: Arc<dyn DynNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Token that stops the engine when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Files polled for restart-on-change: the config file plus `general.watched_files`.
    pub fn watched_paths(&self) -> Vec<PathBuf> {
        let mut paths = vec![self.config_path.clone()];
        for file in &self.config.general.watched_files {
            let path = PathBuf::from(file);
            if !paths.contains(&path) {
                paths.push(path);
            }
        }
        paths
    }

    /// Send the startup notification if `notify.notify_on_startup` is set.
    pub async fn announce_startup(&self) {
        if self.restarted {
            tracing::info!("restarted successfully");
        }

        let Some(notifier) = &self.notifier else {
            return;
        };
        if !self.config.notify.notify_on_startup {
            return;
        }

        let (title, message) = startup_notice(self.restarted);
        notifier
            .send_notification(Value::String(message.to_owned()), title)
            .await;
    }

    /// Build the engine and run it until shutdown.
    ///
    /// # Errors
    ///
    /// Returns an error when engine construction fails (configuration,
    /// corrupt checkpoint file, unreachable source). Failures after startup
    /// are reported through [`EngineExit::status`] instead.
    pub async fn run(self) -> Result<EngineExit> {
        let general = &self.config.general;
        tracing::info!(
            reverse_dns = general.reverse_dns,
            notify = self.config.notify.enabled,
            notify_on_startup = self.config.notify.notify_on_startup,
            filter = self.config.filter.enabled,
            restart_on_change = general.restart_on_change,
            config = %self.config_path.display(),
            "alertrelay starting"
        );

        self.announce_startup().await;

        let mut engine = Engine::build(&self.config, self.notifier.clone())
            .await
            .map_err(|e| anyhow::anyhow!("startup failed: {}", error_chain(&e)))?;

        if general.restart_on_change {
            let paths = self.watched_paths();
            tracing::info!(files = ?paths, "restart on change enabled");
            let handle = ChangeWatcher::new(paths, Duration::from_secs(general.watch_interval_secs))
                .spawn(self.shutdown.clone());
            engine = engine.with_watcher(handle);
        }

        let signals = tokio::spawn(forward_shutdown_signal(self.shutdown.clone()));
        let exit = engine.run(&self.shutdown).await;
        signals.abort();

        Ok(exit)
    }
}

/// Cancel `shutdown` on SIGTERM or SIGINT.
///
/// Returns early once `shutdown` is cancelled by someone else.
async fn forward_shutdown_signal(shutdown: CancellationToken) {
    tokio::select! {
        result = wait_for_shutdown_signal() => match result {
            Ok(signal) => {
                tracing::info!(signal, "shutdown signal received");
                shutdown.cancel();
            }
            Err(e) => {
                tracing::error!(error = %e, "signal handling unavailable");
            }
        },
        () = shutdown.cancelled() => {}
    }
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
///
/// Returns the name of the signal that triggered the shutdown.
#[cfg(unix)]
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

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("failed to install Ctrl+C handler: {}", e))?;
    Ok("ctrl_c")
}
