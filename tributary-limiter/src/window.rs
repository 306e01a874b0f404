//! Sliding-window rate limiter.

use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{info, warn};

use tributary_core::constants::{DEFAULT_MAX_REQUESTS, DEFAULT_RATE_WINDOW};

/// Rate limiter configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Requests admitted per window
    pub max_requests: usize,
    /// Window length in seconds
    pub window_seconds: u64,
}

impl RateLimitConfig {
    /// Window length as a `Duration`.
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_seconds)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: DEFAULT_MAX_REQUESTS,
            window_seconds: DEFAULT_RATE_WINDOW.as_secs(),
        }
    }
}

/// Counts requests in the most recent `window` and admits at most
/// `max_requests` of them.
///
/// Timestamps are kept oldest first. A timestamp leaves the window once it is
/// `window` old, and pruning always happens under the same lock as the
/// admission decision, so two callers can never both take the last slot.
#[derive(Debug)]
pub struct RateLimiter {
    max_requests: usize,
    window: Duration,
    timestamps: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    /// Creates a limiter admitting `max_requests` per `window`.
    ///
    /// A `max_requests` of zero is treated as one.
    pub fn new(max_requests: usize, window: Duration) -> Self {
        let max_requests = max_requests.max(1);
        Self {
            max_requests,
            window,
            timestamps: Mutex::new(VecDeque::with_capacity(max_requests)),
        }
    }

    /// Creates a limiter from configuration.
    pub fn with_config(config: &RateLimitConfig) -> Self {
        Self::new(config.max_requests, config.window())
    }

    /// Maximum requests per window.
    pub fn max_requests(&self) -> usize {
        self.max_requests
    }

    /// Window length.
    pub fn window(&self) -> Duration {
        self.window
    }

    fn prune(timestamps: &mut VecDeque<Instant>, now: Instant, window: Duration) {
        while let Some(&oldest) = timestamps.front() {
            if now.saturating_duration_since(oldest) > window {
                timestamps.pop_front();
            } else {
                break;
            }
        }
    }

    /// Admits the request and records it if the window has room.
    pub fn is_allowed(&self) -> bool {
        let in_window = {
            let mut timestamps = self.timestamps.lock();
            // read the clock under the lock so timestamps stay sorted
            let now = Instant::now();
            Self::prune(&mut timestamps, now, self.window);

            if timestamps.len() < self.max_requests {
                timestamps.push_back(now);
                return true;
            }
            timestamps.len()
        };

        warn!(
            requests = in_window,
            window_secs = self.window.as_secs_f64(),
            "Rate limit reached"
        );
        false
    }

    /// Waits until the window has room, then records the request.
    ///
    /// Returns how long the caller was delayed (zero if admitted at once).
    /// The lock is released while sleeping. Waking up consumes the oldest slot
    /// if it has aged out by then; the window is then re-checked, so a slot
    /// taken by another caller in the meantime just means another wait.
    pub async fn wait_if_needed(&self) -> Duration {
        let mut waited = Duration::ZERO;
        loop {
            let wait = {
                let mut timestamps = self.timestamps.lock();
                let now = Instant::now();
                Self::prune(&mut timestamps, now, self.window);

                if timestamps.len() < self.max_requests {
                    timestamps.push_back(now);
                    return waited;
                }

                // Full window, so the front exists.
                match timestamps.front() {
                    Some(&oldest) => (oldest + self.window).saturating_duration_since(now),
                    None => Duration::ZERO,
                }
            };

            if !wait.is_zero() {
                info!(wait_secs = wait.as_secs_f64(), "Rate limit: waiting before next request");
                tokio::time::sleep(wait).await;
                waited += wait;
            }

            // the slot we waited for sits exactly on the window edge, which
            // pruning keeps; take it explicitly
            let mut timestamps = self.timestamps.lock();
            let now = Instant::now();
            if let Some(&oldest) = timestamps.front() {
                if now.saturating_duration_since(oldest) >= self.window {
                    timestamps.pop_front();
                }
            }
        }
    }

    /// Number of requests currently inside the window.
    pub fn len(&self) -> usize {
        let mut timestamps = self.timestamps.lock();
        Self::prune(&mut timestamps, Instant::now(), self.window);
        timestamps.len()
    }

    /// Returns true if no request is inside the window.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Slots left in the current window.
    pub fn remaining(&self) -> usize {
        self.max_requests.saturating_sub(self.len())
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::with_config(&RateLimitConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use tracing_subscriber::layer::{Context, SubscriberExt};
    use tracing_subscriber::Layer;

    #[tokio::test(start_paused = true)]
    async fn test_window_admits_then_rejects_then_recovers() {
        let limiter = RateLimiter::new(2, Duration::from_secs(1));

        let first: Vec<bool> = (0..3).map(|_| limiter.is_allowed()).collect();
        assert_eq!(first, vec![true, true, false]);

        tokio::time::sleep(Duration::from_millis(1050)).await;
        assert!(limiter.is_allowed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_slides_one_slot_at_a_time() {
        let limiter = RateLimiter::new(2, Duration::from_secs(10));
        assert!(limiter.is_allowed());
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(limiter.is_allowed());
        assert!(!limiter.is_allowed());

        // first timestamp leaves the window, second is still inside
        tokio::time::sleep(Duration::from_millis(5_001)).await;
        assert!(limiter.is_allowed());
        assert!(!limiter.is_allowed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_calls_are_not_recorded() {
        let limiter = RateLimiter::new(1, Duration::from_secs(1));
        assert!(limiter.is_allowed());
        for _ in 0..5 {
            assert!(!limiter.is_allowed());
        }
        assert_eq!(limiter.len(), 1);

        tokio::time::sleep(Duration::from_millis(1_001)).await;
        assert!(limiter.is_allowed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timestamp_on_window_edge_still_counts() {
        let limiter = RateLimiter::new(1, Duration::from_secs(1));
        assert!(limiter.is_allowed());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(!limiter.is_allowed());
        assert_eq!(limiter.len(), 1);

        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(limiter.is_allowed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_on_window_edge_takes_the_slot() {
        let limiter = RateLimiter::new(1, Duration::from_secs(1));
        assert!(limiter.is_allowed());
        tokio::time::advance(Duration::from_secs(1)).await;

        // no time left to wait, yet the edge timestamp must not spin the loop
        assert_eq!(limiter.wait_if_needed().await, Duration::ZERO);
        assert_eq!(limiter.len(), 1);
        assert!(!limiter.is_allowed());
    }

    /// Counts events emitted while the limiter's lock is taken.
    struct LockHeldOnEvent {
        limiter: Arc<RateLimiter>,
        events: Arc<AtomicUsize>,
        under_lock: Arc<AtomicUsize>,
    }

    impl<S: tracing::Subscriber> Layer<S> for LockHeldOnEvent {
        fn on_event(&self, _event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
            self.events.fetch_add(1, Ordering::SeqCst);
            if self.limiter.timestamps.try_lock().is_none() {
                self.under_lock.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    #[test]
    fn test_logging_happens_outside_the_lock() {
        let limiter = Arc::new(RateLimiter::new(1, Duration::from_secs(1)));
        let events = Arc::new(AtomicUsize::new(0));
        let under_lock = Arc::new(AtomicUsize::new(0));
        let subscriber = tracing_subscriber::registry().with(LockHeldOnEvent {
            limiter: Arc::clone(&limiter),
            events: Arc::clone(&events),
            under_lock: Arc::clone(&under_lock),
        });

        tracing::subscriber::with_default(subscriber, || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .start_paused(true)
                .build()
                .unwrap();
            runtime.block_on(async {
                assert!(limiter.is_allowed());
                // rejection warns, the wait logs before sleeping
                assert!(!limiter.is_allowed());
                limiter.wait_if_needed().await;
            });
        });

        assert!(events.load(Ordering::SeqCst) >= 2);
        assert_eq!(under_lock.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_remaining() {
        let limiter = RateLimiter::new(3, Duration::from_secs(60));
        assert_eq!(limiter.remaining(), 3);
        limiter.is_allowed();
        assert_eq!(limiter.remaining(), 2);
        assert_eq!(limiter.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_if_needed_under_limit_is_immediate() {
        let limiter = RateLimiter::new(2, Duration::from_secs(1));
        assert_eq!(limiter.wait_if_needed().await, Duration::ZERO);
        assert_eq!(limiter.wait_if_needed().await, Duration::ZERO);
        assert_eq!(limiter.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_if_needed_waits_for_oldest_slot() {
        let limiter = RateLimiter::new(2, Duration::from_secs(1));
        limiter.wait_if_needed().await;
        tokio::time::sleep(Duration::from_millis(400)).await;
        limiter.wait_if_needed().await;

        let start = Instant::now();
        let waited = limiter.wait_if_needed().await;
        assert_eq!(waited, Duration::from_millis(600));
        assert_eq!(start.elapsed(), Duration::from_millis(600));

        // the oldest slot was consumed, the window still holds two requests
        assert_eq!(limiter.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_waiting_callers_never_overfill_window() {
        let limiter = Arc::new(RateLimiter::new(2, Duration::from_secs(1)));
        let handles: Vec<_> = (0..6)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                tokio::spawn(async move { limiter.wait_if_needed().await })
            })
            .collect();

        let waits = futures::future::join_all(handles).await;
        let mut waits: Vec<Duration> = waits.into_iter().map(|w| w.unwrap()).collect();
        waits.sort();

        assert_eq!(waits[0], Duration::ZERO);
        assert_eq!(waits[1], Duration::ZERO);
        assert!(waits[2] >= Duration::from_secs(1));
        assert!(waits[4] >= Duration::from_secs(2));
        assert!(limiter.len() <= 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_admission_is_exact() {
        let limiter = Arc::new(RateLimiter::new(10, Duration::from_secs(60)));
        let admitted = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..100)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                let admitted = Arc::clone(&admitted);
                tokio::spawn(async move {
                    if limiter.is_allowed() {
                        admitted.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(admitted.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn test_zero_max_requests_is_clamped() {
        let limiter = RateLimiter::new(0, Duration::from_secs(1));
        assert_eq!(limiter.max_requests(), 1);
    }
}
