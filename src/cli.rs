//! Command-line interface definitions for portsweep.
//!
//! Uses `clap` derive macros for declarative argument parsing. Flags that are
//! not given fall back to the settings file, then to built-in defaults.

use crate::banner::parse_trigger;
use crate::config::{AppSettings, ScanConfiguration, ScanParams};
use crate::error::{ConfigError, ConfigResult};
use crate::scanner::ProbeOptions;
use crate::types::enumerate_port_specs;
use clap::{Parser, ValueEnum};
use std::num::NonZeroU32;
use std::path::PathBuf;
use std::time::Duration;

/// A rate-limited TCP port and banner scanner.
#[derive(Parser, Debug)]
#[command(name = "portsweep")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Scan address ranges for open TCP ports and grab banners", long_about = None)]
pub struct Args {
    /// Ranges to scan in CIDR notation (a bare address scans one host)
    ///
    /// Examples:
    ///   192.168.1.0/24     256 addresses
    ///   10.0.0.5           single host
    ///   2001:db8::/120     256 IPv6 addresses
    #[arg(value_name = "TARGETS", required = true)]
    pub targets: Vec<String>,

    /// Ports to scan (e.g. "22", "22,80,443", "8000-8100"); repeatable
    #[arg(short, long = "port", value_name = "PORTS")]
    pub ports: Vec<String>,

    /// Ranges to skip, in CIDR notation; repeatable
    #[arg(short = 'x', long = "exclude", value_name = "CIDR")]
    pub exclude: Vec<String>,

    /// Maximum connection attempts per second
    #[arg(short, long, value_name = "N")]
    pub rate: Option<NonZeroU32>,

    /// Token bucket capacity (defaults to the rate)
    #[arg(long, value_name = "N")]
    pub burst: Option<NonZeroU32>,

    /// Number of concurrent workers (defaults to rate + 16)
    #[arg(short, long, value_name = "N")]
    pub workers: Option<usize>,

    /// Connect timeout (e.g. "500ms", "2s"; bare numbers are milliseconds)
    #[arg(short, long, value_name = "DURATION", value_parser = parse_duration)]
    pub timeout: Option<Duration>,

    /// Banner read timeout
    #[arg(long, value_name = "DURATION", value_parser = parse_duration)]
    pub banner_timeout: Option<Duration>,

    /// Treat every host:port pair as its own unit
    #[arg(long)]
    pub parallel: bool,

    /// Scan hosts in address order instead of shuffling
    #[arg(long)]
    pub no_randomize: bool,

    /// Seed for the host shuffle
    #[arg(long, value_name = "SEED")]
    pub seed: Option<u64>,

    /// Bytes to send after connecting (escapes: \r \n \t \0 \\ \xNN)
    #[arg(long, value_name = "BYTES")]
    pub trigger: Option<String>,

    /// Report failed connections
    #[arg(long)]
    pub show_errors: bool,

    /// Result output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Log)]
    pub output: OutputFormat,

    /// Path to a JSON settings file
    #[arg(long, value_name = "PATH", env = "PORTSWEEP_CONFIG")]
    pub config: Option<PathBuf>,

    /// Verbose diagnostics
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only warnings and results
    #[arg(short, long)]
    pub quiet: bool,
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Structured log events
    #[default]
    Log,
    /// One JSON object per line
    Json,
    /// Human-readable lines
    Plain,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Log => write!(f, "log"),
            Self::Json => write!(f, "json"),
            Self::Plain => write!(f, "plain"),
        }
    }
}

impl Args {
    /// Merge flags over `settings` into a validated scan configuration and
    /// executor options.
    pub fn to_configuration(
        &self,
        settings: &AppSettings,
    ) -> ConfigResult<(ScanConfiguration, ProbeOptions)> {
        let port_specs = if self.ports.is_empty() {
            &settings.default_ports
        } else {
            &self.ports
        };
        let ports = enumerate_port_specs(port_specs)?;

        let params = ScanParams::new(
            self.timeout
                .unwrap_or(Duration::from_millis(settings.timeout_ms)),
            self.banner_timeout
                .unwrap_or(Duration::from_millis(settings.banner_timeout_ms)),
        )?;

        let rate = match self.rate {
            Some(rate) => rate,
            None => NonZeroU32::new(settings.rate).ok_or(ConfigError::NonPositiveRate("rate"))?,
        };

        let mut config = ScanConfiguration::new(self.targets.clone(), ports)
            .with_excludes(self.exclude.clone())
            .with_parallel_per_host(self.parallel)
            .with_randomized_order(settings.randomize && !self.no_randomize)
            .with_params(params)
            .with_rate(rate);

        if let Some(burst) = self.burst.or_else(|| NonZeroU32::new(settings.burst)) {
            config = config.with_burst(burst);
        }
        if let Some(workers) = self.workers.or((settings.workers > 0).then_some(settings.workers)) {
            config = config.with_workers(workers);
        }
        if let Some(seed) = self.seed {
            config = config.with_seed(seed);
        }
        config.validate()?;

        let mut options = ProbeOptions::default();
        if let Some(trigger) = &self.trigger {
            let bytes = parse_trigger(trigger).map_err(ConfigError::InvalidTrigger)?;
            options = options.with_trigger(bytes);
        }
        if self.show_errors || settings.report_errors {
            options = options.with_errors();
        }

        Ok((config, options))
    }
}

/// Parse a duration such as `"250ms"`, `"2s"`, `"1.5s"` or `"1m"`.
///
/// A bare number is read as milliseconds. Precision is one millisecond.
pub fn parse_duration(s: &str) -> Result<Duration, ConfigError> {
    let s = s.trim();
    let invalid = || ConfigError::InvalidDuration(s.to_string());

    let split = s
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(s.len());
    let (number, unit) = s.split_at(split);
    let value: f64 = number.parse().map_err(|_| invalid())?;

    let millis = match unit.trim() {
        "" | "ms" => value,
        "s" => value * 1_000.0,
        "m" => value * 60_000.0,
        _ => return Err(invalid()),
    };
    if !millis.is_finite() || millis > u64::MAX as f64 {
        return Err(invalid());
    }

    Ok(Duration::from_millis(millis.round() as u64))
}
