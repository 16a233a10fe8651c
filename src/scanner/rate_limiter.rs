//! Rate limiting for network scans.
//!
//! Provides token bucket rate limiting and the pipeline stage that paces
//! scan units through it.

use crate::scanner::request::MultiPortScanRequest;
use governor::clock::{Clock, DefaultClock, ReasonablyRealtime};
use governor::middleware::NoOpMiddleware;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter as GovLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Capacity of the limiter's output queue.
///
/// Kept at one so the limiter never runs more than a unit ahead of the
/// workers.
pub const LIMITER_QUEUE: usize = 1;

type Bucket<C> = GovLimiter<NotKeyed, InMemoryState, C, NoOpMiddleware<<C as Clock>::Instant>>;

/// A rate limiter for controlling scan speed.
///
/// Uses a token bucket: `burst` tokens are available up front and refill at
/// `rate` per second. One token pays for one connection attempt. Clones share
/// one bucket.
pub struct RateLimiter<C: Clock = DefaultClock> {
    limiter: Arc<Bucket<C>>,
    burst: NonZeroU32,
}

impl RateLimiter {
    /// Create a rate limiter whose burst equals its rate.
    pub fn new(rate: NonZeroU32) -> Self {
        Self::with_burst(rate, rate)
    }

    /// Create a rate limiter with an explicit burst capacity.
    pub fn with_burst(rate: NonZeroU32, burst: NonZeroU32) -> Self {
        Self::with_clock(rate, burst, DefaultClock::default())
    }
}

impl<C: Clock> RateLimiter<C> {
    /// Create a rate limiter driven by `clock`.
    pub fn with_clock(rate: NonZeroU32, burst: NonZeroU32, clock: C) -> Self {
        let quota = Quota::per_second(rate).allow_burst(burst);
        Self {
            limiter: Arc::new(GovLimiter::direct_with_clock(quota, clock)),
            burst,
        }
    }

    pub fn burst(&self) -> NonZeroU32 {
        self.burst
    }

    /// Try to acquire a token without waiting.
    pub fn try_acquire(&self) -> bool {
        self.limiter.check().is_ok()
    }

    /// Take `cost` tokens at once if the bucket holds them right now.
    ///
    /// Nothing is taken on failure. A cost above the burst never fits.
    pub fn try_acquire_n(&self, cost: u32) -> bool {
        match NonZeroU32::new(cost) {
            Some(n) => matches!(self.limiter.check_n(n), Ok(Ok(()))),
            None => true,
        }
    }
}

impl<C: ReasonablyRealtime> RateLimiter<C> {
    /// Wait until `cost` tokens have been taken.
    ///
    /// Costs above the burst are paid in burst-sized installments.
    pub async fn wait_for(&self, cost: usize) {
        for tokens in installments(cost, self.burst) {
            if let Err(e) = self.limiter.until_n_ready(tokens).await {
                // Installments never exceed the burst.
                debug!(error = %e, "token request exceeds bucket capacity");
                return;
            }
        }
    }
}

impl<C: Clock> Clone for RateLimiter<C> {
    fn clone(&self) -> Self {
        Self {
            limiter: Arc::clone(&self.limiter),
            burst: self.burst,
        }
    }
}

impl<C: Clock> std::fmt::Debug for RateLimiter<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("burst", &self.burst)
            .finish_non_exhaustive()
    }
}

/// Split a cost of `cost` tokens into chunks no larger than `burst`.
///
/// Every unit costs at least one token.
fn installments(cost: usize, burst: NonZeroU32) -> impl Iterator<Item = NonZeroU32> {
    let burst = burst.get() as usize;
    let mut remaining = cost.max(1);
    std::iter::from_fn(move || {
        if remaining == 0 {
            return None;
        }
        let take = remaining.min(burst);
        remaining -= take;
        NonZeroU32::new(take as u32)
    })
}

/// Forward units from `input` at most as fast as `limiter` allows.
///
/// A unit is charged one token per port, so the bucket bounds connection
/// attempts rather than units.
///
/// Cancellation is observed while waiting for input, while waiting for a
/// token, and before forwarding; a unit held at that point is dropped. The
/// input receiver is dropped on exit so upstream stops producing. Resolves to
/// the number of units forwarded.
pub fn spawn_rate_limit_stage(
    mut input: mpsc::Receiver<MultiPortScanRequest>,
    limiter: RateLimiter,
    cancel: CancellationToken,
    capacity: usize,
) -> (mpsc::Receiver<MultiPortScanRequest>, JoinHandle<u64>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));

    let handle = tokio::spawn(async move {
        let mut forwarded = 0u64;

        loop {
            let unit = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                unit = input.recv() => match unit {
                    Some(unit) => unit,
                    None => break,
                },
            };

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = limiter.wait_for(unit.ports.len()) => {}
            }

            let sent = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                sent = tx.send(unit) => sent,
            };
            if sent.is_err() {
                break;
            }
            forwarded += 1;
        }

        debug!(forwarded, cancelled = cancel.is_cancelled(), "rate limiter stopped");
        forwarded
    });

    (rx, handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScanParams;
    use crate::types::{enumerate_ports, Port};
    use governor::clock::FakeRelativeClock;
    use nonzero_ext::nonzero;
    use std::time::{Duration, Instant};

    fn unit(last_octet: u8) -> MultiPortScanRequest {
        MultiPortScanRequest::new(
            format!("10.0.0.{}", last_octet).parse().unwrap(),
            vec![Port::new(22).unwrap()],
            ScanParams::default(),
        )
    }

    #[tokio::test]
    async fn test_rate_limiter_creation() {
        let limiter = RateLimiter::new(nonzero!(100u32));
        assert!(limiter.try_acquire());
    }

    #[test]
    fn test_burst_exhausts() {
        let clock = FakeRelativeClock::default();
        let limiter = RateLimiter::with_clock(nonzero!(1u32), nonzero!(3u32), clock.clone());
        assert!(limiter.try_acquire());
        assert!(limiter.try_acquire());
        assert!(limiter.try_acquire());
        assert!(!limiter.try_acquire());

        clock.advance(Duration::from_millis(1_100));
        assert!(limiter.try_acquire());
        assert!(!limiter.try_acquire());
    }

    #[test]
    fn test_installments() {
        let split = |cost, burst| -> Vec<u32> {
            installments(cost, burst).map(NonZeroU32::get).collect()
        };
        assert_eq!(split(3, nonzero!(5u32)), vec![3]);
        assert_eq!(split(12, nonzero!(5u32)), vec![5, 5, 2]);
        assert_eq!(split(5, nonzero!(5u32)), vec![5]);
        assert_eq!(split(0, nonzero!(5u32)), vec![1]);
    }

    #[test]
    fn test_multi_token_charge() {
        // 20/s refills one token every 50ms.
        let clock = FakeRelativeClock::default();
        let limiter = RateLimiter::with_clock(nonzero!(20u32), nonzero!(5u32), clock.clone());

        assert!(limiter.try_acquire_n(3));
        // Two tokens left; a failed charge takes nothing.
        assert!(!limiter.try_acquire_n(3));
        assert!(!limiter.try_acquire_n(3));

        clock.advance(Duration::from_millis(60));
        assert!(limiter.try_acquire_n(3));
        assert!(!limiter.try_acquire());

        assert!(!limiter.try_acquire_n(6));
    }

    #[test]
    fn test_attempts_per_window_bounded() {
        const RATE: usize = 20;
        const BURST: usize = 5;
        let ports_per_unit = 3;

        let clock = FakeRelativeClock::default();
        let limiter = RateLimiter::with_clock(nonzero!(20u32), nonzero!(5u32), clock.clone());

        // Drive the bucket for three seconds in 1ms steps, forwarding a
        // three-port unit whenever it can be paid for.
        let mut attempts_at: Vec<u64> = Vec::new();
        for ms in 0..3_000u64 {
            while limiter.try_acquire_n(ports_per_unit as u32) {
                attempts_at.extend(std::iter::repeat(ms).take(ports_per_unit));
            }
            clock.advance(Duration::from_millis(1));
        }

        assert!(attempts_at.len() >= 60, "only {} attempts", attempts_at.len());
        for (i, &from) in attempts_at.iter().enumerate() {
            let window = attempts_at[i..]
                .iter()
                .take_while(|&&t| t < from + 1_000)
                .count();
            assert!(window <= BURST + RATE, "{} attempts within one second", window);
        }
    }

    #[test]
    fn test_clones_share_bucket() {
        let limiter1 = RateLimiter::with_burst(nonzero!(1u32), nonzero!(1u32));
        let limiter2 = limiter1.clone();

        assert!(limiter1.try_acquire());
        assert!(!limiter2.try_acquire());
    }

    #[tokio::test]
    async fn test_stage_forwards_everything() {
        let (tx, rx) = mpsc::channel(16);
        for i in 0..10 {
            tx.send(unit(i)).await.unwrap();
        }
        drop(tx);

        let limiter = RateLimiter::new(nonzero!(1000u32));
        let (mut out, handle) =
            spawn_rate_limit_stage(rx, limiter, CancellationToken::new(), LIMITER_QUEUE);

        let mut hosts = Vec::new();
        while let Some(unit) = out.recv().await {
            hosts.push(unit.host.to_string());
        }
        assert_eq!(hosts.len(), 10);
        assert_eq!(hosts[0], "10.0.0.0");
        assert_eq!(handle.await.unwrap(), 10);
    }

    #[tokio::test]
    async fn test_stage_paces_units() {
        let (tx, rx) = mpsc::channel(16);
        for i in 0..6 {
            tx.send(unit(i)).await.unwrap();
        }
        drop(tx);

        // One token up front, then one every 100ms.
        let limiter = RateLimiter::with_burst(nonzero!(10u32), nonzero!(1u32));
        let start = Instant::now();
        let (mut out, handle) =
            spawn_rate_limit_stage(rx, limiter, CancellationToken::new(), LIMITER_QUEUE);
        while out.recv().await.is_some() {}
        handle.await.unwrap();

        assert!(start.elapsed() >= Duration::from_millis(450));
    }

    #[tokio::test]
    async fn test_stage_charges_per_port() {
        let (tx, rx) = mpsc::channel(16);
        for i in 0..4 {
            let unit = MultiPortScanRequest::new(
                format!("10.0.0.{}", i).parse().unwrap(),
                enumerate_ports("22,80,443").unwrap(),
                ScanParams::default(),
            );
            tx.send(unit).await.unwrap();
        }
        drop(tx);

        // Twelve tokens: three up front, nine more at one per 50ms.
        let limiter = RateLimiter::with_burst(nonzero!(20u32), nonzero!(3u32));
        let start = Instant::now();
        let (mut out, handle) =
            spawn_rate_limit_stage(rx, limiter, CancellationToken::new(), LIMITER_QUEUE);
        while out.recv().await.is_some() {}
        assert_eq!(handle.await.unwrap(), 4);

        assert!(start.elapsed() >= Duration::from_millis(400));
    }

    #[tokio::test]
    async fn test_stage_cancelled_while_waiting_for_token() {
        let (tx, rx) = mpsc::channel(16);
        for i in 0..5 {
            tx.send(unit(i)).await.unwrap();
        }

        // After the first token the next one is a second away.
        let limiter = RateLimiter::with_burst(nonzero!(1u32), nonzero!(1u32));
        let cancel = CancellationToken::new();
        let (mut out, handle) = spawn_rate_limit_stage(rx, limiter, cancel.clone(), 4);

        assert!(out.recv().await.is_some());
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();

        let forwarded = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("stage did not stop")
            .unwrap();
        assert_eq!(forwarded, 1);
        assert!(out.recv().await.is_none());
        // Upstream sees the closed queue.
        assert!(tx.send(unit(9)).await.is_err());
    }
}
