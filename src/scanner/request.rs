//! Work units and results flowing through the pipeline.

use crate::config::ScanParams;
use crate::error::ConnectError;
use crate::types::Port;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

/// One unit passed through the rate limiter: a host and the ports to try on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultiPortScanRequest {
    pub host: IpAddr,
    pub ports: Vec<Port>,
    pub params: ScanParams,
}

impl MultiPortScanRequest {
    pub fn new(host: IpAddr, ports: Vec<Port>, params: ScanParams) -> Self {
        Self {
            host,
            ports,
            params,
        }
    }

    /// Split into one request per port, preserving port order.
    pub fn expand(&self) -> impl Iterator<Item = ScanRequest> + '_ {
        self.ports
            .iter()
            .map(move |&port| ScanRequest::new(self.host, port, self.params))
    }
}

/// A single host:port attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanRequest {
    pub host: IpAddr,
    pub port: Port,
    pub params: ScanParams,
}

impl ScanRequest {
    pub fn new(host: IpAddr, port: Port, params: ScanParams) -> Self {
        Self { host, port, params }
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port.as_u16())
    }
}

/// How a result should be reported, if at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultState {
    Open,
    Error,
}

impl fmt::Display for ResultState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Outcome of one `ScanRequest`.
///
/// An open result never carries an error. A closed result carries one only
/// when error reporting is enabled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanResult {
    pub host: IpAddr,
    pub port: Port,
    pub open: bool,
    pub error: Option<ConnectError>,
    pub banner: Vec<u8>,
}

impl ScanResult {
    /// A successful connection, with whatever banner bytes were read.
    pub fn open(request: &ScanRequest, banner: Vec<u8>) -> Self {
        Self {
            host: request.host,
            port: request.port,
            open: true,
            error: None,
            banner,
        }
    }

    /// A failed connection.
    pub fn closed(request: &ScanRequest, error: Option<ConnectError>) -> Self {
        Self {
            host: request.host,
            port: request.port,
            open: false,
            error,
            banner: Vec::new(),
        }
    }

    /// `None` for a closed port with no error, which is not reported.
    pub fn state(&self) -> Option<ResultState> {
        if self.open {
            Some(ResultState::Open)
        } else if self.error.is_some() {
            Some(ResultState::Error)
        } else {
            None
        }
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port.as_u16())
    }
}
