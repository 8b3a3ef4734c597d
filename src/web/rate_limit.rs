//! Per-IP rate limiting. One token bucket per remote IP with the documented
//! defaults (100 requests/second, burst 500); limiters idle for more than a
//! minute are evicted by a background cleanup task.

use governor::clock::DefaultClock;
use governor::middleware::NoOpMiddleware;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::net::IpAddr;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;

pub const DEFAULT_RATE_PER_SECOND: u32 = 100;
pub const DEFAULT_BURST: u32 = 500;

const IDLE_EVICTION: Duration = Duration::from_secs(60);

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock, NoOpMiddleware>;

struct IpEntry {
    limiter: Arc<DirectLimiter>,
    last_seen: Instant,
}

pub struct IpRateLimiter {
    limiters: RwLock<HashMap<IpAddr, IpEntry>>,
    quota: Quota,
}

impl IpRateLimiter {
    pub fn new(per_second: u32, burst: u32) -> Self {
        let rate = NonZeroU32::new(per_second).unwrap_or(NonZeroU32::MIN);
        let burst = NonZeroU32::new(burst).unwrap_or(NonZeroU32::MIN);
        Self {
            limiters: RwLock::new(HashMap::new()),
            quota: Quota::per_second(rate).allow_burst(burst),
        }
    }

    /// Non-blocking check: take a token for this IP if one is available.
    pub fn allow(&self, ip: IpAddr) -> bool {
        let mut limiters = self.limiters.write();
        let quota = self.quota;
        let entry = limiters.entry(ip).or_insert_with(|| IpEntry {
            limiter: Arc::new(RateLimiter::direct(quota)),
            last_seen: Instant::now(),
        });
        entry.last_seen = Instant::now();
        entry.limiter.check().is_ok()
    }

    /// Drop limiters belonging to IPs not seen for over a minute.
    pub fn cleanup(&self) {
        self.limiters
            .write()
            .retain(|_, entry| entry.last_seen.elapsed() <= IDLE_EVICTION);
    }

    pub fn tracked_ips(&self) -> usize {
        self.limiters.read().len()
    }
}

impl Default for IpRateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_RATE_PER_SECOND, DEFAULT_BURST)
    }
}

/// Periodic eviction of idle limiters, stopped by the shutdown signal.
pub fn spawn_cleanup(
    limiter: Arc<IpRateLimiter>,
    mut shutdown: watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = tokio::time::sleep(IDLE_EVICTION) => limiter.cleanup(),
                _ = shutdown.changed() => break,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(last: u8) -> IpAddr {
        IpAddr::from([127, 0, 0, last])
    }

    #[test]
    fn test_allows_within_burst() {
        let limiter = IpRateLimiter::new(1, 5);
        for _ in 0..5 {
            assert!(limiter.allow(ip(1)));
        }
        assert!(!limiter.allow(ip(1)));
    }

    #[test]
    fn test_ips_are_independent() {
        let limiter = IpRateLimiter::new(1, 1);
        assert!(limiter.allow(ip(1)));
        assert!(!limiter.allow(ip(1)));
        assert!(limiter.allow(ip(2)));
    }

    #[test]
    fn test_cleanup_keeps_recent_ips() {
        let limiter = IpRateLimiter::new(1, 1);
        limiter.allow(ip(1));
        assert_eq!(limiter.tracked_ips(), 1);
        limiter.cleanup();
        // seen moments ago; must survive
        assert_eq!(limiter.tracked_ips(), 1);
    }
}
