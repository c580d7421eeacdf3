//! Command-line and environment configuration

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};

use storage_common::Error;
use storage_driver_starter::catalog::default_drivers;
use storage_driver_starter::config::load_driver_configs;
use storage_driver_starter::DriverConfig;

/// Cluster storage operator - starts the CSI driver operators for the cluster's platform
#[derive(Parser, Debug)]
#[command(name = "storage-operator", version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub options: Options,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Commands {
    /// Run the driver starter controller (default mode)
    #[default]
    Controller,
    /// Print the effective driver configs as YAML and exit
    Drivers,
}

#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

#[derive(Args, Debug, Clone)]
pub struct Options {
    /// Path to a kubeconfig; in-cluster config is used when unset
    #[arg(long, env = "KUBECONFIG", global = true)]
    pub kubeconfig: Option<PathBuf>,

    /// Seconds between periodic reconciliations
    #[arg(
        long,
        env = "STORAGE_OPERATOR_RESYNC_INTERVAL_SECS",
        default_value_t = 60,
        value_parser = clap::value_parser!(u64).range(1..),
        global = true
    )]
    pub resync_interval_secs: u64,

    /// Directory holding the drivers' static manifests
    #[arg(
        long,
        env = "STORAGE_OPERATOR_ASSET_DIR",
        default_value = "/manifests",
        global = true
    )]
    pub asset_dir: PathBuf,

    /// YAML list of driver configs replacing the built-in catalog
    #[arg(long, env = "STORAGE_OPERATOR_DRIVERS_FILE", global = true)]
    pub drivers_file: Option<PathBuf>,

    /// Seconds between related-object status publications
    #[arg(
        long,
        env = "STORAGE_OPERATOR_RELATED_OBJECTS_INTERVAL_SECS",
        default_value_t = 30,
        value_parser = clap::value_parser!(u64).range(1..),
        global = true
    )]
    pub related_objects_interval_secs: u64,

    /// Log output format
    #[arg(
        long,
        env = "STORAGE_OPERATOR_LOG_FORMAT",
        value_enum,
        default_value_t = LogFormat::Text,
        global = true
    )]
    pub log_format: LogFormat,
}

impl Options {
    pub fn resync_interval(&self) -> Duration {
        Duration::from_secs(self.resync_interval_secs)
    }

    pub fn related_objects_interval(&self) -> Duration {
        Duration::from_secs(self.related_objects_interval_secs)
    }

    /// Driver configs from `--drivers-file`, or the built-in catalog
    pub fn load_drivers(&self) -> Result<Vec<DriverConfig>, Error> {
        let Some(path) = &self.drivers_file else {
            return Ok(default_drivers());
        };
        let yaml = std::fs::read_to_string(path).map_err(|e| {
            Error::internal_with_context(
                "load_drivers",
                format!("failed to read {}: {}", path.display(), e),
            )
        })?;
        load_driver_configs(&yaml)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("storage-operator").chain(args.iter().copied()))
            .unwrap()
    }

    #[test]
    fn defaults() {
        let cli = parse(&[]);
        assert_eq!(cli.command, None);
        assert_eq!(cli.options.resync_interval(), Duration::from_secs(60));
        assert_eq!(cli.options.related_objects_interval(), Duration::from_secs(30));
        assert_eq!(cli.options.asset_dir, PathBuf::from("/manifests"));
        assert_eq!(cli.options.log_format, LogFormat::Text);
        assert!(cli.options.drivers_file.is_none());
    }

    #[test]
    fn options_after_subcommand() {
        let cli = parse(&["controller", "--resync-interval-secs", "5", "--log-format", "json"]);
        assert_eq!(cli.command, Some(Commands::Controller));
        assert_eq!(cli.options.resync_interval(), Duration::from_secs(5));
        assert_eq!(cli.options.log_format, LogFormat::Json);
    }

    #[test]
    fn zero_interval_rejected() {
        let result = Cli::try_parse_from(["storage-operator", "--resync-interval-secs", "0"]);
        assert!(result.is_err());
    }

    #[test]
    fn builtin_catalog_without_drivers_file() {
        let drivers = parse(&[]).options.load_drivers().unwrap();
        assert_eq!(drivers.len(), default_drivers().len());
    }

    #[test]
    fn drivers_file_replaces_catalog() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "- conditionPrefix: AWSEBS\n  platform: AWS\n  csiDriverName: ebs.csi.aws.com"
        )
        .unwrap();

        let path = file.path().to_str().unwrap();
        let drivers = parse(&["--drivers-file", path]).options.load_drivers().unwrap();
        assert_eq!(drivers.len(), 1);
        assert_eq!(drivers[0].condition_prefix, "AWSEBS");
    }

    #[test]
    fn missing_drivers_file_is_an_error() {
        let err = parse(&["--drivers-file", "/nonexistent/drivers.yaml"])
            .options
            .load_drivers()
            .unwrap_err();
        assert!(err.to_string().contains("load_drivers"));
    }
}
