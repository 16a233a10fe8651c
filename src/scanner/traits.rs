//! Executor abstraction.
//!
//! Workers only know how to hand a `ScanRequest` to a `Prober` and forward
//! what comes back, so tests can swap in an instrumented fake.

use crate::scanner::request::{ScanRequest, ScanResult};
use async_trait::async_trait;

/// Performs one host:port attempt.
///
/// Implementations must return exactly one result per request and must not
/// outlive `dial_timeout + banner_timeout` by more than scheduling jitter.
///
/// # Example
///
/// ```ignore
/// use portsweep::scanner::{Prober, ScanRequest, ScanResult};
///
/// async fn probe_all<P: Prober>(prober: &P, requests: &[ScanRequest]) -> Vec<ScanResult> {
///     let mut results = Vec::new();
///     for request in requests {
///         results.push(prober.probe(request).await);
///     }
///     results
/// }
/// ```
#[async_trait]
pub trait Prober: Send + Sync {
    /// Scan a single host:port.
    async fn probe(&self, request: &ScanRequest) -> ScanResult;
}
