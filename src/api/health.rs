//! Shared health state for the /health endpoint.
//! Updated by the ListingRefresher, read by the API.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Shared health metrics. Updated by the refresher, read by API.
#[derive(Default)]
pub struct HealthState {
    /// True when the last indexer fetch succeeded.
    pub indexer_ok: AtomicBool,
    /// Consecutive failed refreshes (reset on success).
    pub refresh_failures: AtomicU64,
    /// Total refreshes attempted since startup.
    pub refresh_count: AtomicU64,
}

impl HealthState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_refresh_ok(&self) {
        self.indexer_ok.store(true, Ordering::Relaxed);
        self.refresh_failures.store(0, Ordering::Relaxed);
        self.refresh_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_refresh_failed(&self) {
        self.indexer_ok.store(false, Ordering::Relaxed);
        self.refresh_failures.fetch_add(1, Ordering::Relaxed);
        self.refresh_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn indexer_ok(&self) -> bool {
        self.indexer_ok.load(Ordering::Relaxed)
    }

    pub fn refresh_failures(&self) -> u64 {
        self.refresh_failures.load(Ordering::Relaxed)
    }

    pub fn refresh_count(&self) -> u64 {
        self.refresh_count.load(Ordering::Relaxed)
    }
}
