//! Error types for portsweep.
//!
//! Uses `thiserror` for ergonomic error definitions.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Fatal configuration problems, reported once before scanning starts.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid range '{block}': {reason}")]
    InvalidRange { block: String, reason: String },

    #[error("invalid port specification: {0}")]
    InvalidPortSpec(String),

    #[error("no ports to scan")]
    EmptyPorts,

    #[error("no targets to scan")]
    EmptyTargets,

    #[error("invalid duration: {0}")]
    InvalidDuration(String),

    #[error("{0} must be greater than zero")]
    NonPositiveTimeout(&'static str),

    #[error("invalid trigger: {0}")]
    InvalidTrigger(String),

    #[error("{0} must be greater than zero")]
    NonPositiveRate(&'static str),

    #[error("include ranges cover {count} addresses (max: {max})")]
    TooManyHosts { count: u128, max: u128 },

    #[error("host expansion did not complete: {0}")]
    Expansion(String),

    #[error("failed to load settings from {}: {reason}", path.display())]
    Settings { path: PathBuf, reason: String },
}

/// Why a TCP connect attempt did not produce an open port.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectError {
    #[error("connection refused")]
    Refused,

    #[error("connection timed out")]
    TimedOut,

    #[error("unreachable: {0}")]
    Unreachable(String),

    #[error("connect failed: {0}")]
    Other(String),
}

impl From<io::Error> for ConnectError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::ConnectionRefused => Self::Refused,
            io::ErrorKind::TimedOut => Self::TimedOut,
            io::ErrorKind::HostUnreachable | io::ErrorKind::NetworkUnreachable => {
                Self::Unreachable(e.to_string())
            }
            _ => {
                // Older platforms report unreachability only through the message.
                let message = e.to_string();
                if message.to_lowercase().contains("unreachable") {
                    Self::Unreachable(message)
                } else {
                    Self::Other(message)
                }
            }
        }
    }
}

/// Result type alias for configuration handling.
pub type ConfigResult<T> = Result<T, ConfigError>;
