//! Component orchestration -- assembly, sink binding, and lifecycle management.
//!
//! The [`Orchestrator`] is the central coordinator of `sluice-daemon`.
//! It validates configuration, builds the named sinks, binds the DNS and
//! L7 aggregation caches to their reporters, and manages startup/shutdown
//! ordering.
//!
//! # Startup Order
//!
//! 1. DNS reporter, L7 reporter (flush loops ready before data arrives)
//! 2. Event receiver (starts feeding the reporters)
//!
//! # Shutdown Order
//!
//! 1. Event receiver (stop accepting datagrams)
//! 2. Reporters (final flush of everything received so far)

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use tokio::sync::broadcast;

use sluice_aggregator::dns::DnsLog;
use sluice_aggregator::l7::L7Log;
use sluice_aggregator::{
    DnsAggregatorConfig, HealthAggregator, L7AggregatorConfig, Reporter, ReporterSettings,
};
use sluice_core::config::SluiceConfig;
use sluice_core::pipeline::{HealthStatus, Pipeline};

use crate::health::{DaemonHealth, ModuleHealth, aggregate_status, spawn_health_check_task};
use crate::metrics_server;
use crate::receiver::{DnsReporter, EventReceiver, L7Reporter};
use crate::sinks::build_sinks;

/// Uptime gauge refresh period.
const UPTIME_UPDATE_INTERVAL: Duration = Duration::from_secs(10);

/// The main daemon orchestrator.
pub struct Orchestrator {
    /// Loaded and validated configuration.
    config: SluiceConfig,
    /// Shared liveness/readiness table the reporters publish to.
    health: Arc<HealthAggregator>,
    dns: Option<Arc<DnsReporter>>,
    l7: Option<Arc<L7Reporter>>,
    receiver: Option<EventReceiver>,
    /// Shutdown broadcast sender (signals all background tasks).
    shutdown_tx: broadcast::Sender<()>,
    /// Daemon start time (for uptime reporting).
    start_time: Instant,
    background: Vec<tokio::task::JoinHandle<()>>,
}

impl Orchestrator {
    /// Load configuration and build the orchestrator.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be loaded or validated,
    /// or if any enabled component fails to build.
    pub async fn build(config_path: &Path) -> Result<Self> {
        let config = SluiceConfig::load(config_path)
            .await
            .map_err(|e| anyhow::anyhow!("failed to load config: {}", e))?;
        Self::build_from_config(config).await
    }

    /// Build from an already-loaded configuration.
    ///
    /// An aggregator bound to a sink name that is not declared under
    /// `[[sinks]]` fails the build.
    pub async fn build_from_config(config: SluiceConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

        if config.metrics.enabled {
            metrics_server::install_metrics_recorder(&config.metrics)?;
            record_build_info();
            tracing::info!(port = config.metrics.port, "metrics endpoint enabled");
        }

        let health = Arc::new(HealthAggregator::new());
        let health_interval = Duration::from_secs(config.reporter.health_interval_secs);

        let dns = if config.dns_log.enabled {
            tracing::info!("initializing dns reporter");
            let dns_config = DnsAggregatorConfig::from_core(&config.dns_log)
                .map_err(|e| anyhow::anyhow!("invalid dns_log config: {}", e))?;
            let settings = ReporterSettings {
                flush_interval: dns_config.flush_interval,
                health_interval,
                health: Arc::clone(&health),
            };
            let mut reporter: DnsReporter =
                Reporter::new("dns", build_sinks::<DnsLog>(&config.sinks, "dns"), settings);
            reporter
                .add_aggregator(Arc::new(dns_config.build_cache()), &as_strs(&dns_config.sinks))
                .map_err(|e| anyhow::anyhow!("failed to bind dns aggregator: {}", e))?;
            Some(Arc::new(reporter))
        } else {
            None
        };

        let l7 = if config.l7_log.enabled {
            tracing::info!("initializing l7 reporter");
            let l7_config = L7AggregatorConfig::from_core(&config.l7_log)
                .map_err(|e| anyhow::anyhow!("invalid l7_log config: {}", e))?;
            let settings = ReporterSettings {
                flush_interval: l7_config.flush_interval,
                health_interval,
                health: Arc::clone(&health),
            };
            let mut reporter: L7Reporter =
                Reporter::new("l7", build_sinks::<L7Log>(&config.sinks, "l7"), settings);
            reporter
                .add_aggregator(Arc::new(l7_config.build_cache()), &as_strs(&l7_config.sinks))
                .map_err(|e| anyhow::anyhow!("failed to bind l7 aggregator: {}", e))?;
            Some(Arc::new(reporter))
        } else {
            None
        };

        let receiver = if config.receiver.enabled {
            Some(EventReceiver::new(
                config.receiver.clone(),
                dns.clone(),
                l7.clone(),
            ))
        } else {
            tracing::warn!("event receiver disabled, reporters will only flush empty caches");
            None
        };

        let (shutdown_tx, _) = broadcast::channel(16);

        tracing::info!(
            dns = dns.is_some(),
            l7 = l7.is_some(),
            receiver = receiver.is_some(),
            "orchestrator initialized"
        );

        Ok(Self {
            config,
            health,
            dns,
            l7,
            receiver,
            shutdown_tx,
            start_time: Instant::now(),
            background: Vec::new(),
        })
    }

    /// Start all components and block until a shutdown signal arrives.
    ///
    /// # Shutdown Triggers
    ///
    /// - `SIGTERM` (from systemd, Docker, or `kill`)
    /// - `SIGINT` (Ctrl+C)
    pub async fn run(&mut self) -> Result<()> {
        if !self.config.general.pid_file.is_empty() {
            write_pid_file(Path::new(&self.config.general.pid_file))?;
        }

        if let Err(e) = self.start().await {
            tracing::error!(error = %e, "startup failed");
            self.cleanup_pid_file();
            return Err(e);
        }

        tracing::info!("entering main event loop");
        let signal = wait_for_shutdown_signal().await?;
        tracing::info!(signal = signal, "shutdown signal received");

        let result = self.shutdown().await;
        self.cleanup_pid_file();
        result
    }

    /// Start reporters, then the receiver, then background tasks.
    ///
    /// On failure every component already started is stopped again.
    pub async fn start(&mut self) -> Result<()> {
        if let Err(e) = self.start_components().await {
            tracing::warn!("startup failed, rolling back already-started components");
            self.stop_components().await;
            return Err(e);
        }

        self.background.push(spawn_health_check_task(
            Arc::clone(&self.health),
            Duration::from_secs(self.config.reporter.health_interval_secs),
            self.shutdown_tx.subscribe(),
        ));
        if self.config.metrics.enabled {
            self.background.push(spawn_uptime_updater(
                self.start_time,
                self.shutdown_tx.subscribe(),
            ));
        }
        Ok(())
    }

    async fn start_components(&mut self) -> Result<()> {
        if let Some(dns) = &self.dns {
            dns.start()
                .map_err(|e| anyhow::anyhow!("failed to start dns reporter: {}", e))?;
        }
        if let Some(l7) = &self.l7 {
            l7.start()
                .map_err(|e| anyhow::anyhow!("failed to start l7 reporter: {}", e))?;
        }
        if let Some(receiver) = &mut self.receiver {
            receiver
                .start()
                .await
                .map_err(|e| anyhow::anyhow!("failed to start event receiver: {}", e))?;
        }
        Ok(())
    }

    /// Stop background tasks, the receiver and the reporters, in that order.
    ///
    /// Stop errors are logged; a component that was never started is
    /// skipped.
    pub async fn shutdown(&mut self) -> Result<()> {
        tracing::info!("broadcasting shutdown signal to all tasks");
        let _ = self.shutdown_tx.send(());
        for task in self.background.drain(..) {
            let _ = task.await;
        }

        self.stop_components().await;
        tracing::info!("sluice-daemon shut down");
        Ok(())
    }

    async fn stop_components(&mut self) {
        if let Some(receiver) = &mut self.receiver {
            if receiver.is_running() {
                if let Err(e) = receiver.stop().await {
                    tracing::error!(error = %e, "failed to stop event receiver");
                }
            }
        }

        for (name, stopped) in [
            ("dns", stop_reporter(self.dns.as_deref()).await),
            ("l7", stop_reporter(self.l7.as_deref()).await),
        ] {
            if let Err(e) = stopped {
                tracing::error!(reporter = name, error = %e, "failed to stop reporter");
            }
        }
    }

    fn cleanup_pid_file(&self) {
        if !self.config.general.pid_file.is_empty() {
            remove_pid_file(Path::new(&self.config.general.pid_file));
        }
    }

    /// Get the current aggregated health status.
    pub async fn health(&self) -> DaemonHealth {
        let receiver_status = match &self.receiver {
            Some(receiver) => receiver.health_check().await,
            None => HealthStatus::Unhealthy("disabled".to_owned()),
        };

        let modules = vec![
            ModuleHealth {
                name: "receiver".to_owned(),
                enabled: self.receiver.is_some(),
                status: receiver_status,
            },
            reporter_health("dns", self.dns.as_deref()),
            reporter_health("l7", self.l7.as_deref()),
        ];

        DaemonHealth {
            status: aggregate_status(&modules),
            uptime_secs: self.start_time.elapsed().as_secs(),
            modules,
        }
    }

    /// Get a reference to the loaded configuration.
    pub fn config(&self) -> &SluiceConfig {
        &self.config
    }

    /// Address the receiver is bound to, once started.
    pub fn receiver_addr(&self) -> Option<std::net::SocketAddr> {
        self.receiver.as_ref().and_then(EventReceiver::local_addr)
    }

    /// Shared health table.
    pub fn health_aggregator(&self) -> &Arc<HealthAggregator> {
        &self.health
    }
}

fn as_strs(names: &[String]) -> Vec<&str> {
    names.iter().map(String::as_str).collect()
}

fn reporter_health<E, R>(name: &str, reporter: Option<&Reporter<E, R>>) -> ModuleHealth
where
    E: 'static,
    R: Send + Sync + 'static,
{
    ModuleHealth {
        name: name.to_owned(),
        enabled: reporter.is_some(),
        status: reporter.map_or(HealthStatus::Unhealthy("disabled".to_owned()), |r| {
            r.health_check()
        }),
    }
}

async fn stop_reporter<E, R>(
    reporter: Option<&Reporter<E, R>>,
) -> Result<(), sluice_aggregator::AggregatorError>
where
    E: 'static,
    R: Send + Sync + 'static,
{
    match reporter {
        Some(r) if r.is_running() => r.stop().await,
        _ => Ok(()),
    }
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
///
/// Returns the name of the signal that triggered the shutdown.
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

/// Write the current process PID to a file.
///
/// # Security
///
/// - Uses `create_new(true)` to atomically create the file
/// - Verifies the created file is a regular file
/// - Creates the parent directory with mode 0o700
pub fn write_pid_file(path: &Path) -> Result<()> {
    use std::fs::{self, OpenOptions};
    use std::io::{ErrorKind, Write};

    if let Some(parent) = path.parent() {
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            let mut builder = fs::DirBuilder::new();
            builder.mode(0o700).recursive(true);
            builder.create(parent)?;
        }
        #[cfg(not(unix))]
        {
            fs::create_dir_all(parent)?;
        }
    }

    let pid = std::process::id();

    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            let existing_pid = fs::read_to_string(path).unwrap_or_else(|_| "unknown".to_owned());
            return Err(anyhow::anyhow!(
                "PID file {} already exists with PID: {}. Is another instance running?",
                path.display(),
                existing_pid.trim()
            ));
        }
        Err(e) => return Err(e.into()),
    };

    if !file.metadata()?.is_file() {
        let _ = fs::remove_file(path);
        return Err(anyhow::anyhow!(
            "PID file {} is not a regular file",
            path.display()
        ));
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(fs::Permissions::from_mode(0o600))?;
    }

    writeln!(file, "{}", pid)?;

    tracing::info!(pid = pid, path = %path.display(), "PID file written");
    Ok(())
}

/// Remove the PID file on daemon shutdown.
///
/// Logs a warning but does not fail if the file cannot be removed.
pub fn remove_pid_file(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        tracing::warn!(path = %path.display(), error = %e, "failed to remove PID file");
    } else {
        tracing::info!(path = %path.display(), "PID file removed");
    }
}

fn record_build_info() {
    use sluice_core::metrics as m;

    metrics::gauge!(m::DAEMON_BUILD_INFO, "version" => env!("CARGO_PKG_VERSION")).set(1.0);
    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "daemon metrics recorded");
}

/// Spawn a background task that periodically updates the uptime metric.
fn spawn_uptime_updater(
    start_time: Instant,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
    use sluice_core::metrics as m;

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(UPTIME_UPDATE_INTERVAL);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    #[allow(clippy::cast_precision_loss)]
                    metrics::gauge!(m::DAEMON_UPTIME_SECONDS)
                        .set(start_time.elapsed().as_secs() as f64);
                }
                _ = shutdown_rx.recv() => {
                    tracing::debug!("uptime updater shutting down");
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn quiet_config() -> SluiceConfig {
        let mut config = SluiceConfig::default();
        config.receiver.bind_addr = "127.0.0.1:0".to_owned();
        config
    }

    #[test]
    fn test_write_pid_file_creates_parent_directory() {
        // Given: A path with non-existent parent directory
        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("subdir").join("test.pid");

        // When: Writing PID file
        write_pid_file(&pid_file).unwrap();

        // Then: The file holds the current PID
        let content = fs::read_to_string(&pid_file).unwrap();
        assert_eq!(content.trim(), std::process::id().to_string());
    }

    #[test]
    fn test_write_pid_file_fails_if_already_exists() {
        // Given: An existing PID file
        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("sluice.pid");
        fs::write(&pid_file, "12345").unwrap();

        // When: Writing it again
        let err = write_pid_file(&pid_file).unwrap_err().to_string();

        // Then: The error names the running PID
        assert!(err.contains("already exists"), "got: {err}");
        assert!(err.contains("12345"), "got: {err}");
    }

    #[test]
    fn test_remove_pid_file_handles_nonexistent_gracefully() {
        let dir = tempfile::tempdir().unwrap();
        remove_pid_file(&dir.path().join("missing.pid"));
    }

    #[tokio::test]
    async fn test_build_with_defaults() {
        // Given: Default configuration
        // When: Building the orchestrator
        let orchestrator = Orchestrator::build_from_config(quiet_config()).await.unwrap();

        // Then: Both reporters and the receiver exist but are not running
        let health = orchestrator.health().await;
        assert_eq!(health.modules.len(), 3);
        assert!(health.status.is_unhealthy());
        assert!(orchestrator.receiver_addr().is_none());
    }

    #[tokio::test]
    async fn test_unknown_sink_fails_build() {
        // Given: The l7 aggregator bound to an undeclared sink
        let mut config = quiet_config();
        config.l7_log.sinks = vec!["kafka".to_owned()];

        // When: Building the orchestrator
        let result = Orchestrator::build_from_config(config).await;

        // Then: The build fails and names the sink
        let err = result.err().unwrap().to_string();
        assert!(err.contains("kafka"), "got: {err}");
    }

    #[tokio::test]
    async fn test_start_and_shutdown() {
        // Given: A built orchestrator
        let mut orchestrator = Orchestrator::build_from_config(quiet_config()).await.unwrap();

        // When: Starting it
        orchestrator.start().await.unwrap();

        // Then: The receiver is bound and healthy
        assert!(orchestrator.receiver_addr().is_some());
        let health = orchestrator.health().await;
        assert!(
            health.modules.iter().any(|m| m.name == "receiver" && m.status.is_healthy())
        );

        // When: Shutting down
        orchestrator.shutdown().await.unwrap();

        // Then: Every component is stopped
        let health = orchestrator.health().await;
        assert!(health.status.is_unhealthy());
        assert!(!orchestrator.receiver.as_ref().unwrap().is_running());
        assert!(!orchestrator.dns.as_ref().unwrap().is_running());
        assert!(!orchestrator.l7.as_ref().unwrap().is_running());
    }

    #[tokio::test]
    async fn test_failed_receiver_start_rolls_back_reporters() {
        // Given: A running orchestrator holding a UDP port
        let mut first = Orchestrator::build_from_config(quiet_config()).await.unwrap();
        first.start().await.unwrap();
        let taken = first.receiver_addr().unwrap();

        let mut config = quiet_config();
        config.receiver.bind_addr = taken.to_string();
        let mut second = Orchestrator::build_from_config(config).await.unwrap();

        // When: The second one tries to bind the same port
        let result = second.start().await;

        // Then: Start fails and the reporters it already started are stopped again
        assert!(result.is_err());
        assert!(!second.receiver.as_ref().unwrap().is_running());
        assert!(!second.dns.as_ref().unwrap().is_running());
        assert!(!second.l7.as_ref().unwrap().is_running());

        first.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_disabled_components_are_not_built() {
        // Given: Everything disabled
        let mut config = quiet_config();
        config.dns_log.enabled = false;
        config.l7_log.enabled = false;
        config.receiver.enabled = false;

        // When: Building and starting
        let mut orchestrator = Orchestrator::build_from_config(config).await.unwrap();
        orchestrator.start().await.unwrap();

        // Then: Disabled modules do not affect the aggregate
        assert!(orchestrator.health().await.status.is_healthy());
        orchestrator.shutdown().await.unwrap();
    }
}
