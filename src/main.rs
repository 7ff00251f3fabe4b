use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use hero_market::api::health::HealthState;
use hero_market::api::{router, ApiState};
use hero_market::config::Config;
use hero_market::error::Result;
use hero_market::fetcher::{IndexerClient, ListingSource};
use hero_market::listing_refresh::{now_ns, ListingRefresher};
use hero_market::state::ListingStore;

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    let source = Arc::new(IndexerClient::new(&cfg)?);
    let store = ListingStore::new();
    let health = Arc::new(HealthState::new());

    // --- Bootstrap: first listing fetch ---
    match source.fetch_listings().await {
        Ok((heroes, stats)) => {
            let summary = store.replace_all(heroes, now_ns());
            health.record_refresh_ok();
            info!(
                "Bootstrap complete: {} listings from {} indexer results (indexer={})",
                summary.added, stats.api_total, cfg.indexer_url,
            );
        }
        Err(e) => {
            // Serve an empty store; the refresher keeps retrying.
            health.record_refresh_failed();
            warn!("Bootstrap fetch failed, starting empty: {e}");
        }
    }
    match &cfg.viewer_address {
        Some(viewer) => info!("Hiding listings owned by {viewer}"),
        None => info!("VIEWER_ADDRESS not set, showing every listing"),
    }

    // Listing refresher (background, every REFRESH_INTERVAL_SECS)
    let refresher = ListingRefresher::new(
        Arc::clone(&source),
        Arc::clone(&store),
        Arc::clone(&health),
        Duration::from_secs(cfg.refresh_interval_secs),
    );
    tokio::spawn(async move { refresher.run().await });

    // HTTP API server
    let app = router(ApiState {
        store: Arc::clone(&store),
        source,
        health,
        page_size: cfg.page_size,
    });
    let bind_addr = format!("0.0.0.0:{}", cfg.api_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("HTTP API listening on {bind_addr}");

    axum::serve(listener, app).await?;

    Ok(())
}
