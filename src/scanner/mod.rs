//! Scanner module - the scanning pipeline.
//!
//! ```text
//! RequestGenerator -> rate limiter stage -> WorkerPool -> ResultSink
//! ```
//!
//! Stages are independent tokio tasks joined by bounded channels and share a
//! single `CancellationToken`. Cancellation is cooperative: it is checked
//! before the limiter forwards a unit, before a worker takes a unit, and
//! before each port within a unit. A probe already dialing or reading is
//! never interrupted, so shutdown may lag by up to
//! `dial_timeout + banner_timeout`.

pub mod generator;
pub mod pool;
pub mod rate_limiter;
pub mod request;
pub mod tcp;
pub mod traits;

use crate::config::{ScanConfiguration, MAX_WORKERS};
use crate::error::{ConfigError, ConfigResult};
use crate::output::ResultSink;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub use generator::{RequestGenerator, GENERATOR_QUEUE};
pub use pool::{PoolStats, WorkerPool};
pub use rate_limiter::{spawn_rate_limit_stage, RateLimiter, LIMITER_QUEUE};
pub use request::{MultiPortScanRequest, ResultState, ScanRequest, ScanResult};
pub use tcp::{ProbeOptions, TcpConnectScanner};
pub use traits::Prober;

/// Totals for a finished (or cancelled) scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanSummary {
    /// Hosts left after exclusions.
    pub hosts: usize,
    /// Units the generator would emit for a full run.
    pub planned_units: usize,
    /// Units forwarded by the rate limiter.
    pub forwarded_units: u64,
    /// Probes started.
    pub attempts: u64,
    /// Open ports found.
    pub open: u64,
    /// Reported connect errors.
    pub errors: u64,
    /// Whether cancellation cut the scan short. A token that fires after
    /// the last attempt does not count.
    pub cancelled: bool,
    /// Wall-clock time of the run.
    pub elapsed: Duration,
}

/// Run a complete scan.
///
/// The configuration is validated and the host ranges expanded before any
/// task starts; a `ConfigError` means nothing was sent on the network.
/// Otherwise this resolves once the generator, limiter and every worker
/// have stopped.
pub async fn run_scan<P, S>(
    config: &ScanConfiguration,
    prober: Arc<P>,
    sink: Arc<S>,
    cancel: CancellationToken,
) -> ConfigResult<ScanSummary>
where
    P: Prober + ?Sized + 'static,
    S: ResultSink + ?Sized + 'static,
{
    config.validate()?;
    let generator = expand(config).await?;
    let hosts = generator.hosts().len();
    let planned_units = generator.unit_count();
    let planned_attempts = (hosts as u64).saturating_mul(config.ports.len() as u64);

    let limiter = RateLimiter::with_burst(config.rate, config.burst());
    let pool = WorkerPool::new(config.worker_count());
    let requested_workers = config.requested_workers();
    if requested_workers > MAX_WORKERS {
        warn!(
            requested = requested_workers,
            max = MAX_WORKERS,
            "worker count clamped; the pool may hold the attempt rate below the limit"
        );
    }

    info!(
        hosts,
        ports = config.ports.len(),
        units = planned_units,
        rate = config.rate.get(),
        burst = config.burst().get(),
        workers = pool.workers(),
        "starting scan"
    );

    let start = Instant::now();
    let (units, generator_task) = generator.spawn(GENERATOR_QUEUE);
    let (limited, limiter_task) =
        spawn_rate_limit_stage(units, limiter, cancel.clone(), LIMITER_QUEUE);

    let stats = pool.run(limited, prober, sink, cancel.clone()).await;

    let forwarded_units = match limiter_task.await {
        Ok(forwarded) => forwarded,
        Err(e) => {
            error!(error = %e, "rate limiter task failed");
            0
        }
    };
    match generator_task.await {
        Ok(sent) => debug!(sent, "generator joined"),
        Err(e) => error!(error = %e, "generator task failed"),
    }

    Ok(ScanSummary {
        hosts,
        planned_units,
        forwarded_units,
        attempts: stats.attempts,
        open: stats.open,
        errors: stats.errors,
        cancelled: cancel.is_cancelled() && stats.attempts < planned_attempts,
        elapsed: start.elapsed(),
    })
}

/// Expand and shuffle the host list on the blocking pool.
async fn expand(config: &ScanConfiguration) -> ConfigResult<RequestGenerator> {
    let config = config.clone();
    match tokio::task::spawn_blocking(move || RequestGenerator::new(&config)).await {
        Ok(generator) => generator,
        Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
        Err(e) => Err(ConfigError::Expansion(e.to_string())),
    }
}
