//! Enforces the minimum 100ms gap between adapter calls (spec §4.3, §5).

use std::num::NonZeroU32;

use governor::{Quota, RateLimiter as GovernorLimiter};
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};

type Limiter = GovernorLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Thin wrapper so call sites don't depend on `governor` types directly.
pub struct RateLimiter {
    inner: Limiter,
}

impl RateLimiter {
    /// `min_gap_ms` of 100 matches the spec's default call pacing.
    pub fn new(min_gap_ms: u64) -> Self {
        let per_second = (1000 / min_gap_ms.max(1)).max(1);
        let quota = Quota::per_second(NonZeroU32::new(per_second as u32).unwrap());
        Self {
            inner: GovernorLimiter::direct(quota),
        }
    }

    /// Blocks until a call slot is available.
    pub async fn acquire(&self) {
        self.inner.until_ready().await;
    }
}
