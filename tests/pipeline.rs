use async_trait::async_trait;
use nonzero_ext::nonzero;
use portsweep::config::ScanConfiguration;
use portsweep::output::{CollectSink, ResultSink};
use portsweep::scanner::{run_scan, Prober, ScanRequest, ScanResult};
use portsweep::types::enumerate_ports;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Records when each probe starts; optionally sleeps, cancels, or counts
/// probes that began after a token fired.
#[derive(Default)]
struct RecordingProber {
    starts: Mutex<Vec<(Instant, ScanRequest)>>,
    delay: Duration,
    cancel_on_first: Option<CancellationToken>,
    watched: Option<CancellationToken>,
    started_after_cancel: AtomicUsize,
}

impl RecordingProber {
    fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    fn watching(cancel: CancellationToken, delay: Duration) -> Self {
        Self {
            delay,
            watched: Some(cancel),
            ..Self::default()
        }
    }

    fn cancelling(cancel: CancellationToken) -> Self {
        Self {
            cancel_on_first: Some(cancel),
            ..Self::default()
        }
    }

    fn starts(&self) -> Vec<(Instant, ScanRequest)> {
        self.starts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Prober for RecordingProber {
    async fn probe(&self, request: &ScanRequest) -> ScanResult {
        self.starts.lock().unwrap().push((Instant::now(), *request));
        if self.watched.as_ref().is_some_and(|c| c.is_cancelled()) {
            self.started_after_cancel.fetch_add(1, Ordering::SeqCst);
        }
        if let Some(cancel) = &self.cancel_on_first {
            cancel.cancel();
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        ScanResult::open(request, b"hello".to_vec())
    }
}

fn config(include: &str, ports: &str) -> ScanConfiguration {
    ScanConfiguration::new(vec![include.to_string()], enumerate_ports(ports).unwrap())
        .with_randomized_order(false)
        .with_rate(nonzero!(10_000u32))
}

#[tokio::test]
async fn test_every_pair_scanned_once() {
    let cfg = config("10.0.0.0/29", "22,80,443").with_excludes(vec!["10.0.0.7/32".to_string()]);
    let prober = Arc::new(RecordingProber::default());
    let sink = Arc::new(CollectSink::new());

    let summary = run_scan(&cfg, Arc::clone(&prober), Arc::clone(&sink), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.hosts, 7);
    assert_eq!(summary.planned_units, 7);
    assert_eq!(summary.forwarded_units, 7);
    assert_eq!(summary.attempts, 21);
    assert_eq!(summary.open, 21);
    assert!(!summary.cancelled);

    let mut pairs: Vec<String> = sink
        .results()
        .iter()
        .map(|r| r.socket_addr().to_string())
        .collect();
    pairs.sort();
    pairs.dedup();
    assert_eq!(pairs.len(), 21);
    assert!(!pairs.iter().any(|p| p.starts_with("10.0.0.7:")));
}

#[tokio::test]
async fn test_parallel_per_host_units() {
    let cfg = config("10.0.0.0/30", "22,80,443").with_parallel_per_host(true);
    let prober = Arc::new(RecordingProber::default());
    let sink = Arc::new(CollectSink::new());

    let summary = run_scan(&cfg, prober, Arc::clone(&sink), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.planned_units, 12);
    assert_eq!(summary.forwarded_units, 12);
    assert_eq!(sink.len(), 12);
}

#[tokio::test]
async fn test_ports_scanned_in_order_within_unit() {
    let cfg = config("10.0.0.1/32", "8080,22,443").with_workers(4);
    let prober = Arc::new(RecordingProber::default());
    let sink = Arc::new(CollectSink::new());

    run_scan(&cfg, Arc::clone(&prober), sink, CancellationToken::new())
        .await
        .unwrap();

    let ports: Vec<u16> = prober
        .starts()
        .iter()
        .map(|(_, r)| r.port.as_u16())
        .collect();
    assert_eq!(ports, vec![8080, 22, 443]);
}

#[tokio::test]
async fn test_invalid_configuration_sends_nothing() {
    let cfg = config("10.0.0.0/33", "22");
    let prober = Arc::new(RecordingProber::default());
    let sink = Arc::new(CollectSink::new());

    let result = run_scan(&cfg, Arc::clone(&prober), Arc::clone(&sink), CancellationToken::new()).await;

    assert!(result.is_err());
    assert!(prober.starts().is_empty());
    assert!(sink.is_empty());
}

#[tokio::test]
async fn test_partial_unit_abandoned_on_cancel() {
    let cancel = CancellationToken::new();
    let cfg = config("10.0.0.1/32", "22,80,443");
    let prober = Arc::new(RecordingProber::cancelling(cancel.clone()));
    let sink = Arc::new(CollectSink::new());

    let summary = run_scan(&cfg, Arc::clone(&prober), Arc::clone(&sink), cancel)
        .await
        .unwrap();

    assert!(summary.cancelled);
    assert_eq!(summary.attempts, 1);
    let results = sink.results();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].port.as_u16(), 22);
}

#[tokio::test]
async fn test_cancellation_stops_new_work() {
    const WORKERS: usize = 8;

    let cancel = CancellationToken::new();
    let cfg = config("10.0.0.0/20", "22,80")
        .with_rate(nonzero!(200u32))
        .with_workers(WORKERS);
    let prober = Arc::new(RecordingProber::watching(
        cancel.clone(),
        Duration::from_millis(20),
    ));
    let sink = Arc::new(CollectSink::new());

    let scan = tokio::spawn({
        let prober = Arc::clone(&prober);
        let sink = Arc::clone(&sink);
        let cancel = cancel.clone();
        async move { run_scan(&cfg, prober, sink, cancel).await }
    });

    tokio::time::sleep(Duration::from_millis(200)).await;
    cancel.cancel();

    let summary = tokio::time::timeout(Duration::from_secs(5), scan)
        .await
        .expect("pipeline did not join after cancellation")
        .unwrap()
        .unwrap();

    assert!(summary.cancelled);
    assert!(summary.forwarded_units < summary.planned_units as u64);

    // A worker checks the token right before each probe, so at most one
    // probe per worker can slip in after cancellation.
    let late = prober.started_after_cancel.load(Ordering::SeqCst);
    assert!(late <= WORKERS, "{} probes started after cancellation", late);
    assert_eq!(sink.len() as u64, summary.attempts);
}

/// Cancels `cancel` once `after` results have been recorded.
struct CancelAfter {
    inner: CollectSink,
    after: usize,
    cancel: CancellationToken,
}

impl ResultSink for CancelAfter {
    fn record(&self, result: ScanResult) {
        self.inner.record(result);
        if self.inner.len() >= self.after {
            self.cancel.cancel();
        }
    }
}

#[tokio::test]
async fn test_cancel_after_last_result_is_not_interruption() {
    let cancel = CancellationToken::new();
    let cfg = config("10.0.0.0/30", "22,80");
    let sink = Arc::new(CancelAfter {
        inner: CollectSink::new(),
        after: 8,
        cancel: cancel.clone(),
    });

    let prober = Arc::new(RecordingProber::default());
    let summary = run_scan(&cfg, prober, Arc::clone(&sink), cancel.clone())
        .await
        .unwrap();

    assert!(cancel.is_cancelled());
    assert_eq!(summary.attempts, 8);
    assert!(!summary.cancelled);
}

#[tokio::test]
async fn test_rate_limit_charges_every_port() {
    // Eight three-port units: 24 attempts against 5 tokens up front and
    // 20 more per second.
    let cfg = config("10.0.0.0/29", "22,80,443")
        .with_rate(nonzero!(20u32))
        .with_burst(nonzero!(5u32))
        .with_workers(16);
    let prober = Arc::new(RecordingProber::default());
    let sink = Arc::new(CollectSink::new());

    let start = Instant::now();
    let summary = run_scan(&cfg, prober, sink, CancellationToken::new())
        .await
        .unwrap();
    let elapsed = start.elapsed();

    assert_eq!(summary.attempts, 24);
    // Pacing per unit instead would finish in about 150ms.
    assert!(elapsed >= Duration::from_millis(900), "finished in {:?}", elapsed);
}

#[tokio::test]
async fn test_large_range_expansion() {
    // Pre-cancelled: only the expansion runs.
    let cancel = CancellationToken::new();
    cancel.cancel();
    let cfg = config("10.0.0.0/14", "22");

    let prober = Arc::new(RecordingProber::default());
    let sink = Arc::new(CollectSink::new());
    let summary = run_scan(&cfg, prober, sink, cancel).await.unwrap();

    assert_eq!(summary.hosts, 1 << 18);
    assert_eq!(summary.attempts, 0);
    assert!(summary.cancelled);
}
