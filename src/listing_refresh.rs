use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::time::interval;
use tracing::{error, info};

use crate::api::health::HealthState;
use crate::error::Result;
use crate::fetcher::ListingSource;
use crate::state::{ListingStore, ReplaceSummary};

/// Background task that re-fetches listings on a fixed interval and swaps
/// them into the store.
pub struct ListingRefresher<S> {
    source: Arc<S>,
    store: Arc<ListingStore>,
    health: Arc<HealthState>,
    every: Duration,
}

impl<S: ListingSource> ListingRefresher<S> {
    pub fn new(
        source: Arc<S>,
        store: Arc<ListingStore>,
        health: Arc<HealthState>,
        every: Duration,
    ) -> Self {
        Self { source, store, health, every }
    }

    pub async fn run(self) {
        let mut ticker = interval(self.every);
        ticker.tick().await; // first tick is immediate; bootstrap already ran

        loop {
            ticker.tick().await;
            if let Err(e) = self.refresh().await {
                error!("Listing refresh failed: {e}");
            }
        }
    }

    /// One fetch-and-replace cycle. Failures leave the previous listings in
    /// place.
    pub async fn refresh(&self) -> Result<ReplaceSummary> {
        let (heroes, _stats) = match self.source.fetch_listings().await {
            Ok(fetched) => fetched,
            Err(e) => {
                self.health.record_refresh_failed();
                return Err(e);
            }
        };
        let summary = self.store.replace_all(heroes, now_ns());
        self.health.record_refresh_ok();

        info!(
            added = summary.added,
            removed = summary.removed,
            updated = summary.updated,
            total = self.store.len(),
            "Listing refresh complete: +{} added, -{} removed, {} updated, {} unchanged",
            summary.added,
            summary.removed,
            summary.updated,
            summary.unchanged,
        );
        Ok(summary)
    }
}

pub fn now_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64
}
