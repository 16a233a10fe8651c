//! Worker pool.
//!
//! A fixed number of tasks share one receiver. Each pulls a unit, expands it
//! into per-port requests, probes them in order and forwards every result to
//! the sink. Ports within a unit are never probed concurrently.

use crate::output::ResultSink;
use crate::scanner::request::MultiPortScanRequest;
use crate::scanner::traits::Prober;
use futures::future::join_all;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

/// Counters gathered while the pool runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Units pulled from the queue.
    pub units: u64,
    /// Probes started.
    pub attempts: u64,
    /// Results with an open port.
    pub open: u64,
    /// Closed results that carried an error.
    pub errors: u64,
}

#[derive(Debug, Default)]
struct Counters {
    units: AtomicU64,
    attempts: AtomicU64,
    open: AtomicU64,
    errors: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> PoolStats {
        PoolStats {
            units: self.units.load(Ordering::Relaxed),
            attempts: self.attempts.load(Ordering::Relaxed),
            open: self.open.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// A fixed-size pool of scan workers.
#[derive(Debug, Clone, Copy)]
pub struct WorkerPool {
    workers: usize,
}

impl WorkerPool {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run workers until `input` is exhausted or `cancel` fires.
    ///
    /// Cancellation is checked before each unit and before each port; an
    /// in-flight probe always runs to its own timeout. Returns once every
    /// worker has exited.
    pub async fn run<P, S>(
        &self,
        input: mpsc::Receiver<MultiPortScanRequest>,
        prober: Arc<P>,
        sink: Arc<S>,
        cancel: CancellationToken,
    ) -> PoolStats
    where
        P: Prober + ?Sized + 'static,
        S: ResultSink + ?Sized + 'static,
    {
        let input = Arc::new(Mutex::new(input));
        let counters = Arc::new(Counters::default());

        let handles: Vec<_> = (0..self.workers)
            .map(|id| {
                tokio::spawn(worker(
                    id,
                    Arc::clone(&input),
                    Arc::clone(&prober),
                    Arc::clone(&sink),
                    cancel.clone(),
                    Arc::clone(&counters),
                ))
            })
            .collect();

        for joined in join_all(handles).await {
            if let Err(e) = joined {
                error!(error = %e, "scan worker failed");
            }
        }

        counters.snapshot()
    }
}

async fn next_unit(
    input: &Mutex<mpsc::Receiver<MultiPortScanRequest>>,
    cancel: &CancellationToken,
) -> Option<MultiPortScanRequest> {
    let mut rx = input.lock().await;
    tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        unit = rx.recv() => unit,
    }
}

async fn worker<P, S>(
    id: usize,
    input: Arc<Mutex<mpsc::Receiver<MultiPortScanRequest>>>,
    prober: Arc<P>,
    sink: Arc<S>,
    cancel: CancellationToken,
    counters: Arc<Counters>,
) where
    P: Prober + ?Sized,
    S: ResultSink + ?Sized,
{
    'units: while !cancel.is_cancelled() {
        let Some(unit) = next_unit(&input, &cancel).await else {
            break;
        };
        counters.units.fetch_add(1, Ordering::Relaxed);

        for request in unit.expand() {
            if cancel.is_cancelled() {
                debug!(worker = id, host = %unit.host, "abandoning unit");
                break 'units;
            }

            counters.attempts.fetch_add(1, Ordering::Relaxed);
            let result = prober.probe(&request).await;
            if result.open {
                counters.open.fetch_add(1, Ordering::Relaxed);
            } else if result.error.is_some() {
                counters.errors.fetch_add(1, Ordering::Relaxed);
            }
            sink.record(result);
        }
    }
}
