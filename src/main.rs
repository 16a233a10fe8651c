use anyhow::Context;
use clap::Parser;
use portsweep::cli::Args;
use portsweep::config::AppSettings;
use portsweep::output::{print_error, print_warning, sink_for};
use portsweep::scanner::{run_scan, TcpConnectScanner};
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Exit code for unusable configuration.
const EXIT_CONFIG: u8 = 2;
/// Exit code after an interrupted scan.
const EXIT_CANCELLED: u8 = 130;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(&args);

    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            print_error(&format!("{:#}", e));
            ExitCode::from(EXIT_CONFIG)
        }
    }
}

fn init_tracing(args: &Args) {
    let default = default_filter(args.verbose, args.quiet, args.show_errors);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Filter used when `RUST_LOG` is unset.
///
/// Results logged by the default sink stay visible under `--quiet`, and
/// `--show-errors` lets connect errors through at `debug`.
fn default_filter(verbose: bool, quiet: bool, show_errors: bool) -> String {
    if verbose {
        return "debug".to_string();
    }
    let base = if quiet { "warn" } else { "info" };
    if show_errors {
        format!("{},portsweep::output=debug", base)
    } else if quiet {
        format!("{},portsweep::output=info", base)
    } else {
        base.to_string()
    }
}

async fn run(args: Args) -> anyhow::Result<ExitCode> {
    let settings = AppSettings::load(args.config.as_deref()).context("loading settings")?;
    let (config, options) = args
        .to_configuration(&settings)
        .context("invalid configuration")?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let prober = Arc::new(TcpConnectScanner::new(options));
    let sink = sink_for(args.output);
    let summary = run_scan(&config, prober, sink, cancel).await?;

    info!(
        hosts = summary.hosts,
        units = summary.forwarded_units,
        attempts = summary.attempts,
        open = summary.open,
        errors = summary.errors,
        elapsed_ms = summary.elapsed.as_millis() as u64,
        "scan finished"
    );

    if summary.cancelled {
        print_warning(&format!(
            "scan interrupted after {} of {} units",
            summary.forwarded_units, summary.planned_units
        ));
        return Ok(ExitCode::from(EXIT_CANCELLED));
    }
    Ok(ExitCode::SUCCESS)
}
