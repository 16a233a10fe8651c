//! TCP connect executor.
//!
//! Performs a full TCP handshake within the dial timeout and, on success,
//! grabs a banner within the banner timeout. Worst-case latency is the sum
//! of the two.

use crate::banner::read_banner;
use crate::error::ConnectError;
use crate::scanner::request::{ScanRequest, ScanResult};
use crate::scanner::traits::Prober;
use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, trace};

/// Executor behaviour that is not part of the per-unit timeouts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeOptions {
    /// Bytes written right after connecting, to provoke a banner.
    pub trigger: Option<Vec<u8>>,
    /// Keep the connect error on closed results instead of dropping it.
    pub report_errors: bool,
}

impl ProbeOptions {
    /// Set the trigger sequence.
    pub fn with_trigger(mut self, trigger: Vec<u8>) -> Self {
        self.trigger = (!trigger.is_empty()).then_some(trigger);
        self
    }

    /// Keep connect errors on results.
    pub fn with_errors(mut self) -> Self {
        self.report_errors = true;
        self
    }
}

/// TCP connect scanner.
///
/// Uses standard socket `connect()` calls and needs no elevated privileges.
#[derive(Debug, Clone, Default)]
pub struct TcpConnectScanner {
    options: ProbeOptions,
}

impl TcpConnectScanner {
    pub fn new(options: ProbeOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ProbeOptions {
        &self.options
    }

    async fn attempt_connect(&self, request: &ScanRequest) -> Result<TcpStream, ConnectError> {
        let addr = request.socket_addr();
        match timeout(request.params.dial_timeout(), TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(e)) => Err(ConnectError::from(e)),
            Err(_) => Err(ConnectError::TimedOut),
        }
    }
}

#[async_trait]
impl Prober for TcpConnectScanner {
    async fn probe(&self, request: &ScanRequest) -> ScanResult {
        trace!(target_addr = %request.socket_addr(), "scanning");

        match self.attempt_connect(request).await {
            Ok(mut stream) => {
                let banner = read_banner(
                    &mut stream,
                    self.options.trigger.as_deref(),
                    request.params.banner_timeout(),
                )
                .await;
                // Dropping the stream closes the socket on every path.
                drop(stream);
                ScanResult::open(request, banner)
            }
            Err(e) => {
                debug!(target_addr = %request.socket_addr(), error = %e, "connect failed");
                let error = self.options.report_errors.then_some(e);
                ScanResult::closed(request, error)
            }
        }
    }
}
