//! # portsweep - a rate-limited TCP port and banner scanner
//!
//! Given CIDR ranges and a port list, portsweep finds which host:port pairs
//! accept TCP connections and reads whatever banner the service sends.
//!
//! ## Features
//!
//! - **Range expansion**: IPv4 and IPv6 CIDR blocks with exclusions
//! - **Token bucket pacing**: a hard cap on connection attempts per second
//! - **Bounded concurrency**: a fixed worker pool fed through bounded queues
//! - **Cooperative cancellation**: clean partial shutdown via a shared token
//! - **Pluggable output**: structured logs, JSON lines or plain text
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use portsweep::config::ScanConfiguration;
//! use portsweep::output::LogSink;
//! use portsweep::scanner::{run_scan, ProbeOptions, TcpConnectScanner};
//! use portsweep::types::enumerate_ports;
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), portsweep::ConfigError> {
//!     let config = ScanConfiguration::new(
//!         vec!["192.168.1.0/24".to_string()],
//!         enumerate_ports("22,80,443")?,
//!     );
//!     let prober = Arc::new(TcpConnectScanner::new(ProbeOptions::default()));
//!     let summary = run_scan(&config, prober, Arc::new(LogSink), CancellationToken::new()).await?;
//!     println!("{} open ports", summary.open);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`types`] - Port grammar and CIDR enumeration
//! - [`config`] - Scan configuration and the settings file
//! - [`scanner`] - Generator, rate limiter stage, worker pool and TCP executor
//! - [`output`] - Result sinks
//! - [`banner`] - Banner reading and rendering
//! - [`cli`] - Command-line arguments
//! - [`error`] - Error types

pub mod banner;
pub mod cli;
pub mod config;
pub mod error;
pub mod output;
pub mod scanner;
pub mod types;

// Re-export commonly used types
pub use config::{ScanConfiguration, ScanParams};
pub use error::{ConfigError, ConnectError};
pub use output::ResultSink;
pub use scanner::{run_scan, MultiPortScanRequest, Prober, ScanRequest, ScanResult, ScanSummary};
pub use types::Port;
