//! Application state and rate limiting.

use std::collections::HashMap;
use std::net::IpAddr;
use std::time::Instant;

use tokio::sync::Mutex;

use super::RATE_LIMIT_WINDOW_SECS;
use crate::backend::SharedCoordinator;

/// Per-IP request tracker: (request count, window start time).
type IpTracker = HashMap<IpAddr, (u64, Instant)>;

/// In-memory fixed-window rate limiter keyed by client IP.
pub(crate) struct RateLimiter {
    tracker: Mutex<IpTracker>,
    /// Maximum requests per window. Zero disables limiting.
    max_requests: u64,
}

impl RateLimiter {
    pub(crate) fn new(max_requests: u64) -> Self {
        Self {
            tracker: Mutex::new(HashMap::new()),
            max_requests,
        }
    }

    /// Ok(()) if allowed, Err(retry_after_secs) if limited.
    pub(crate) async fn check(&self, ip: IpAddr) -> Result<(), u64> {
        if self.max_requests == 0 {
            return Ok(());
        }
        let mut tracker = self.tracker.lock().await;
        let now = Instant::now();

        let (count, window_start) = tracker.entry(ip).or_insert((0, now));
        let elapsed = now.duration_since(*window_start).as_secs();
        if elapsed >= RATE_LIMIT_WINDOW_SECS {
            *count = 0;
            *window_start = now;
        }

        *count += 1;
        if *count > self.max_requests {
            Err(RATE_LIMIT_WINDOW_SECS.saturating_sub(elapsed).max(1))
        } else {
            Ok(())
        }
    }
}

/// Application state shared across request handlers.
pub(crate) struct AppState {
    pub(crate) coordinator: SharedCoordinator,
    pub(crate) rate_limiter: RateLimiter,
    /// None = no auth required.
    pub(crate) api_key: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[tokio::test]
    async fn limits_per_ip_within_window() {
        let limiter = RateLimiter::new(2);
        let a = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));
        let b = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2));
        assert!(limiter.check(a).await.is_ok());
        assert!(limiter.check(a).await.is_ok());
        let retry = limiter.check(a).await.unwrap_err();
        assert!((1..=RATE_LIMIT_WINDOW_SECS).contains(&retry));
        assert!(limiter.check(b).await.is_ok());
    }

    #[tokio::test]
    async fn zero_disables_limiting() {
        let limiter = RateLimiter::new(0);
        let ip = IpAddr::V4(Ipv4Addr::LOCALHOST);
        for _ in 0..100 {
            assert!(limiter.check(ip).await.is_ok());
        }
    }
}
