//! Result sinks and terminal messages.
//!
//! Workers hand every `ScanResult` to a `ResultSink`. Sinks serialize their
//! own writes and skip closed results that carry no error.

use crate::banner::escape_banner;
use crate::cli::OutputFormat;
use crate::scanner::{ResultState, ScanResult};
use console::style;
use serde::Serialize;
use std::io::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// Append-only consumer of scan results. Must be safe to call concurrently.
pub trait ResultSink: Send + Sync {
    fn record(&self, result: ScanResult);
}

/// Build the sink for a command-line output format, writing to stdout.
pub fn sink_for(format: OutputFormat) -> Arc<dyn ResultSink> {
    match format {
        OutputFormat::Log => Arc::new(LogSink),
        OutputFormat::Json => Arc::new(JsonSink::new(io::stdout())),
        OutputFormat::Plain => Arc::new(PlainSink::new(io::stdout())),
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // A panicked writer leaves the data usable; keep recording.
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Emits one structured `tracing` event per reportable result.
///
/// Open ports are logged at `info`, connect errors at `debug`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl ResultSink for LogSink {
    fn record(&self, result: ScanResult) {
        let host = result.host.to_string();
        let port = result.port.as_u16();
        match result.state() {
            Some(ResultState::Open) => {
                let banner = escape_banner(&result.banner);
                info!(state = "open", host = %host, port, banner = %banner, "scan result");
            }
            Some(ResultState::Error) => {
                let error = result.error.map(|e| e.to_string()).unwrap_or_default();
                debug!(state = "error", host = %host, port, error = %error, "scan result");
            }
            None => {}
        }
    }
}

#[derive(Serialize)]
struct JsonRecord {
    state: String,
    host: String,
    port: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    banner: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl JsonRecord {
    fn from_result(result: &ScanResult, state: ResultState) -> Self {
        Self {
            state: state.to_string(),
            host: result.host.to_string(),
            port: result.port.as_u16(),
            banner: result.open.then(|| escape_banner(&result.banner)),
            error: result.error.as_ref().map(ToString::to_string),
        }
    }
}

/// Writes one JSON object per line.
#[derive(Debug)]
pub struct JsonSink<W> {
    out: Mutex<W>,
}

impl<W: Write + Send> JsonSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        self.out
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<W: Write + Send> ResultSink for JsonSink<W> {
    fn record(&self, result: ScanResult) {
        let Some(state) = result.state() else {
            return;
        };
        let record = JsonRecord::from_result(&result, state);

        let mut out = lock(&self.out);
        let written = serde_json::to_writer(&mut *out, &record)
            .map_err(io::Error::from)
            .and_then(|_| writeln!(out));
        if let Err(e) = written {
            warn!(error = %e, "failed to write result");
        }
    }
}

/// Writes aligned, styled lines for humans.
#[derive(Debug)]
pub struct PlainSink<W> {
    out: Mutex<W>,
}

impl<W: Write + Send> PlainSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        self.out
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<W: Write + Send> ResultSink for PlainSink<W> {
    fn record(&self, result: ScanResult) {
        let line = match result.state() {
            Some(ResultState::Open) => format!(
                "{:<6} {:<40} {}",
                style("open").green().bold(),
                result.socket_addr(),
                style(escape_banner(&result.banner)).dim()
            ),
            Some(ResultState::Error) => format!(
                "{:<6} {:<40} {}",
                style("error").red(),
                result.socket_addr(),
                result.error.as_ref().map(ToString::to_string).unwrap_or_default()
            ),
            None => return,
        };

        let mut out = lock(&self.out);
        if let Err(e) = writeln!(out, "{}", line.trim_end()) {
            warn!(error = %e, "failed to write result");
        }
    }
}

/// Keeps every result in memory, reportable or not.
#[derive(Debug, Default)]
pub struct CollectSink {
    results: Mutex<Vec<ScanResult>>,
}

impl CollectSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the results recorded so far.
    pub fn results(&self) -> Vec<ScanResult> {
        lock(&self.results).clone()
    }

    pub fn len(&self) -> usize {
        lock(&self.results).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ResultSink for CollectSink {
    fn record(&self, result: ScanResult) {
        lock(&self.results).push(result);
    }
}

/// Print an error message.
pub fn print_error(msg: &str) {
    eprintln!("{} {}", style("Error:").red().bold(), msg);
}

/// Print a warning message.
pub fn print_warning(msg: &str) {
    eprintln!("{} {}", style("Warning:").yellow().bold(), msg);
}
