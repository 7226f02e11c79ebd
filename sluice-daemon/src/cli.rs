//! CLI argument definitions for sluice-daemon.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.

use std::path::PathBuf;

use clap::Parser;

use sluice_core::config::SluiceConfig;

/// sluice telemetry aggregation daemon.
///
/// Receives DNS and L7 flow updates over UDP, aggregates them into
/// bounded caches and periodically flushes the records to named sinks.
#[derive(Parser, Debug)]
#[command(name = "sluice-daemon")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to sluice.toml configuration file.
    #[arg(short, long, default_value = "/etc/sluice/sluice.toml")]
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

    /// Override PID file path (takes precedence over config file).
    #[arg(long)]
    pub pid_file: Option<String>,
}

impl DaemonCli {
    /// Apply command-line overrides on top of the loaded configuration.
    pub fn apply_overrides(&self, config: &mut SluiceConfig) {
        if let Some(level) = &self.log_level {
            config.general.log_level.clone_from(level);
        }
        if let Some(format) = &self.log_format {
            config.general.log_format.clone_from(format);
        }
        if let Some(pid_file) = &self.pid_file {
            config.general.pid_file.clone_from(pid_file);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_etc() {
        let cli = DaemonCli::parse_from(["sluice-daemon"]);
        assert_eq!(cli.config, PathBuf::from("/etc/sluice/sluice.toml"));
        assert!(!cli.validate);
        assert!(cli.log_level.is_none());
    }

    #[test]
    fn overrides_take_precedence() {
        let cli = DaemonCli::parse_from([
            "sluice-daemon",
            "--config",
            "/tmp/sluice.toml",
            "--log-level",
            "debug",
            "--log-format",
            "pretty",
            "--pid-file",
            "/run/sluice.pid",
            "--validate",
        ]);
        let mut config = SluiceConfig::default();
        cli.apply_overrides(&mut config);

        assert!(cli.validate);
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.general.log_format, "pretty");
        assert_eq!(config.general.pid_file, "/run/sluice.pid");
    }
}
