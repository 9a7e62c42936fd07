//! Client-side request budgets for the SeniorGo backend.
//!
//! List and status-refresh calls draw from the read budget; transitions,
//! cancels and accepts draw from the write budget. A large refresh fan-out
//! therefore never delays a user's status change.

use governor::{Quota, RateLimiter as GovLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;

type DirectLimiter = GovLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

const DEFAULT_READS_PER_SEC: u32 = 20;
const DEFAULT_WRITES_PER_SEC: u32 = 5;

fn per_second(limit: u32) -> Quota {
    Quota::per_second(NonZeroU32::new(limit).unwrap_or(NonZeroU32::MIN))
}

#[derive(Debug, Clone)]
pub struct RateLimiter {
    reads: Arc<DirectLimiter>,
    writes: Arc<DirectLimiter>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_READS_PER_SEC, DEFAULT_WRITES_PER_SEC)
    }

    /// Budgets from `[limits]` config. A zero limit becomes one request per second.
    pub fn with_limits(reads_per_sec: u32, writes_per_sec: u32) -> Self {
        Self {
            reads: Arc::new(GovLimiter::direct(per_second(reads_per_sec))),
            writes: Arc::new(GovLimiter::direct(per_second(writes_per_sec))),
        }
    }

    /// Wait for a list or status-refresh slot.
    pub async fn wait_read(&self) {
        self.reads.until_ready().await;
    }

    /// Wait for a transition, cancel or accept slot.
    pub async fn wait_write(&self) {
        self.writes.until_ready().await;
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
