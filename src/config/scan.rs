//! Scan configuration assembled once at startup.

use crate::error::{ConfigError, ConfigResult};
use crate::types::{address_count, parse_blocks, Port};
use nonzero_ext::nonzero;
use std::num::NonZeroU32;
use std::time::Duration;

/// Extra workers on top of the attempt rate so the pool is never the bottleneck.
pub const WORKER_SLACK: usize = 16;

/// Upper bound on the number of concurrent workers.
pub const MAX_WORKERS: usize = 5_000;

/// Default ceiling on how many addresses the include ranges may cover.
pub const DEFAULT_MAX_HOSTS: u128 = 1 << 24;

/// Default attempt rate (connection attempts per second).
pub const DEFAULT_RATE: NonZeroU32 = nonzero!(100u32);

/// Timeouts carried by every scan unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanParams {
    dial_timeout: Duration,
    banner_timeout: Duration,
}

impl ScanParams {
    /// Create scan parameters; both timeouts must be non-zero.
    pub fn new(dial_timeout: Duration, banner_timeout: Duration) -> ConfigResult<Self> {
        if dial_timeout.is_zero() {
            return Err(ConfigError::NonPositiveTimeout("dial timeout"));
        }
        if banner_timeout.is_zero() {
            return Err(ConfigError::NonPositiveTimeout("banner timeout"));
        }
        Ok(Self {
            dial_timeout,
            banner_timeout,
        })
    }

    #[inline]
    pub fn dial_timeout(&self) -> Duration {
        self.dial_timeout
    }

    #[inline]
    pub fn banner_timeout(&self) -> Duration {
        self.banner_timeout
    }
}

impl Default for ScanParams {
    fn default() -> Self {
        Self {
            dial_timeout: Duration::from_secs(2),
            banner_timeout: Duration::from_secs(2),
        }
    }
}

/// Everything the pipeline needs to run one scan. Read-only once built.
#[derive(Debug, Clone)]
pub struct ScanConfiguration {
    /// CIDR blocks to scan.
    pub include_ranges: Vec<String>,
    /// CIDR blocks removed from the include expansion.
    pub exclude_ranges: Vec<String>,
    /// Ports in scan order, duplicates kept.
    pub ports: Vec<Port>,
    /// Emit one unit per host-port pair instead of one per host.
    pub parallel_per_host: bool,
    /// Shuffle host order before emission.
    pub randomize_host_order: bool,
    /// Seed for the host shuffle; random when unset.
    pub seed: Option<u64>,
    /// Timeouts applied to every attempt.
    pub params: ScanParams,
    /// Maximum connection attempts per second.
    pub rate: NonZeroU32,
    /// Token bucket capacity; defaults to `rate`.
    pub burst: Option<NonZeroU32>,
    /// Worker count; defaults to `rate + WORKER_SLACK`.
    pub workers: Option<usize>,
    /// Ceiling on the include address count.
    pub max_hosts: u128,
}

impl ScanConfiguration {
    /// Create a configuration with default pacing and timeouts.
    pub fn new(include_ranges: Vec<String>, ports: Vec<Port>) -> Self {
        Self {
            include_ranges,
            exclude_ranges: Vec::new(),
            ports,
            parallel_per_host: false,
            randomize_host_order: true,
            seed: None,
            params: ScanParams::default(),
            rate: DEFAULT_RATE,
            burst: None,
            workers: None,
            max_hosts: DEFAULT_MAX_HOSTS,
        }
    }

    /// Set the exclude ranges.
    pub fn with_excludes(mut self, exclude_ranges: Vec<String>) -> Self {
        self.exclude_ranges = exclude_ranges;
        self
    }

    /// Scan each host-port pair as its own unit.
    pub fn with_parallel_per_host(mut self, parallel: bool) -> Self {
        self.parallel_per_host = parallel;
        self
    }

    /// Enable or disable host order randomization.
    pub fn with_randomized_order(mut self, randomize: bool) -> Self {
        self.randomize_host_order = randomize;
        self
    }

    /// Fix the shuffle seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Set the timeouts.
    pub fn with_params(mut self, params: ScanParams) -> Self {
        self.params = params;
        self
    }

    /// Set the attempt rate.
    pub fn with_rate(mut self, rate: NonZeroU32) -> Self {
        self.rate = rate;
        self
    }

    /// Set the token bucket capacity.
    pub fn with_burst(mut self, burst: NonZeroU32) -> Self {
        self.burst = Some(burst);
        self
    }

    /// Override the worker count.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    /// Set the include address ceiling.
    pub fn with_max_hosts(mut self, max_hosts: u128) -> Self {
        self.max_hosts = max_hosts;
        self
    }

    /// Effective token bucket capacity.
    pub fn burst(&self) -> NonZeroU32 {
        self.burst.unwrap_or(self.rate)
    }

    /// Worker count before clamping to `1..=MAX_WORKERS`.
    pub fn requested_workers(&self) -> usize {
        self.workers
            .unwrap_or_else(|| self.rate.get() as usize + WORKER_SLACK)
    }

    /// Effective worker count.
    pub fn worker_count(&self) -> usize {
        self.requested_workers().clamp(1, MAX_WORKERS)
    }

    /// Check everything that would make the scan unusable.
    ///
    /// Exclude blocks are parsed too, so that a typo there fails before any
    /// traffic is sent rather than inside the generator.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.ports.is_empty() {
            return Err(ConfigError::EmptyPorts);
        }
        if self.include_ranges.is_empty() {
            return Err(ConfigError::EmptyTargets);
        }

        let include = parse_blocks(&self.include_ranges)?;
        parse_blocks(&self.exclude_ranges)?;

        let count = include
            .iter()
            .fold(0u128, |acc, net| acc.saturating_add(address_count(net)));
        if count > self.max_hosts {
            return Err(ConfigError::TooManyHosts {
                count,
                max: self.max_hosts,
            });
        }

        Ok(())
    }
}
