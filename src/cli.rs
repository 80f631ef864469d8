//! Command-line arguments

use clap::Parser;
use rollup_client_config::AppConfig;
use std::path::PathBuf;

/// Rollup client CLI
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to a TOML, YAML or JSON config file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable the metrics endpoint
    #[arg(long = "metrics")]
    pub metrics_enabled: bool,

    /// Metrics listening address
    #[arg(long = "metrics.addr")]
    pub metrics_addr: Option<String>,

    /// Metrics listening port
    #[arg(long = "metrics.port")]
    pub metrics_port: Option<u16>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long = "log.level")]
    pub log_level: Option<String>,
}

impl Args {
    /// Apply flags on top of the loaded configuration.
    pub fn apply(&self, config: &mut AppConfig) {
        if self.metrics_enabled {
            config.metrics.enabled = true;
        }
        if let Some(addr) = &self.metrics_addr {
            config.metrics.host = addr.clone();
        }
        if let Some(port) = self.metrics_port {
            config.metrics.port = port;
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_flags_keeps_config() {
        let args = Args::try_parse_from(["rollup-client"]).unwrap();
        let mut config = AppConfig::default();
        args.apply(&mut config);
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_metrics_flags() {
        let args = Args::try_parse_from([
            "rollup-client",
            "--metrics",
            "--metrics.addr",
            "127.0.0.1",
            "--metrics.port",
            "9100",
        ])
        .unwrap();

        let mut config = AppConfig::default();
        args.apply(&mut config);
        assert!(config.metrics.enabled);
        assert_eq!(config.metrics.host, "127.0.0.1");
        assert_eq!(config.metrics.port, 9100);
    }

    #[test]
    fn test_port_out_of_range() {
        assert!(Args::try_parse_from(["rollup-client", "--metrics.port", "70000"]).is_err());
    }

    #[test]
    fn test_config_path() {
        let args =
            Args::try_parse_from(["rollup-client", "--config", "config/local.yaml"]).unwrap();
        assert_eq!(args.config, Some(PathBuf::from("config/local.yaml")));
    }
}
