use crate::error::{AppError, Result};

pub const INDEXER_URL: &str = "https://testnet.api.defikingdoms.com/graphql";

/// Heroes per page in the browse views.
pub const PAGE_SIZE: usize = 8;

/// Upper bound on `limit` accepted by the listings endpoint.
pub const MAX_PAGE_SIZE: usize = 100;

/// Listing refresh interval (seconds): how often to re-fetch from the indexer.
pub const REFRESH_INTERVAL_SECS: u64 = 60;

/// Records requested per indexer round trip.
pub const INDEXER_PAGE_SIZE: usize = 500;

/// Stop paging the indexer after this many listings.
pub const MAX_LISTINGS: usize = 5_000;

/// HTTP timeout for indexer requests (seconds).
pub const HTTP_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct Config {
    pub indexer_url: String,
    pub log_level: String,
    pub api_port: u16,
    /// Default page size for listing queries (PAGE_SIZE)
    pub page_size: usize,
    /// Seconds between listing refreshes (REFRESH_INTERVAL_SECS)
    pub refresh_interval_secs: u64,
    /// Records per indexer request (INDEXER_PAGE_SIZE)
    pub indexer_page_size: usize,
    /// Cap on listings fetched per refresh (MAX_LISTINGS)
    pub max_listings: usize,
    /// Address whose own heroes are hidden from the buy view (VIEWER_ADDRESS).
    pub viewer_address: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build from any variable lookup; `from_env` passes the process environment.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        Ok(Self {
            indexer_url: var("INDEXER_URL").unwrap_or_else(|| INDEXER_URL.to_string()),
            log_level: var("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            api_port: parse_var(&var, "API_PORT", 3000)?,
            page_size: parse_var(&var, "PAGE_SIZE", PAGE_SIZE)?,
            refresh_interval_secs: parse_var(&var, "REFRESH_INTERVAL_SECS", REFRESH_INTERVAL_SECS)?,
            indexer_page_size: parse_var(&var, "INDEXER_PAGE_SIZE", INDEXER_PAGE_SIZE)?,
            max_listings: parse_var(&var, "MAX_LISTINGS", MAX_LISTINGS)?,
            viewer_address: var("VIEWER_ADDRESS")
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
        })
        .and_then(Self::checked)
    }

    fn checked(self) -> Result<Self> {
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(AppError::Config(format!(
                "PAGE_SIZE must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }
        if self.indexer_page_size == 0 {
            return Err(AppError::Config("INDEXER_PAGE_SIZE must be at least 1".to_string()));
        }
        if self.refresh_interval_secs == 0 {
            return Err(AppError::Config("REFRESH_INTERVAL_SECS must be at least 1".to_string()));
        }
        Ok(self)
    }
}

fn parse_var<T: std::str::FromStr>(
    var: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T> {
    match var(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| AppError::Config(format!("{key} must be a valid number, got '{raw}'"))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_vars(|k| vars.get(k).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        let cfg = config_from(&[]).unwrap();
        assert_eq!(cfg.indexer_url, INDEXER_URL);
        assert_eq!(cfg.api_port, 3000);
        assert_eq!(cfg.page_size, PAGE_SIZE);
        assert_eq!(cfg.log_level, "info");
        assert!(cfg.viewer_address.is_none());
    }

    #[test]
    fn reads_overrides() {
        let cfg = config_from(&[
            ("API_PORT", "8080"),
            ("PAGE_SIZE", "12"),
            ("VIEWER_ADDRESS", " 0xabc "),
            ("INDEXER_URL", "http://localhost:9000/graphql"),
        ])
        .unwrap();
        assert_eq!(cfg.api_port, 8080);
        assert_eq!(cfg.page_size, 12);
        assert_eq!(cfg.viewer_address.as_deref(), Some("0xabc"));
        assert_eq!(cfg.indexer_url, "http://localhost:9000/graphql");
    }

    #[test]
    fn rejects_bad_numbers() {
        assert!(matches!(config_from(&[("API_PORT", "http")]), Err(AppError::Config(_))));
        assert!(matches!(config_from(&[("PAGE_SIZE", "0")]), Err(AppError::Config(_))));
        assert!(matches!(config_from(&[("PAGE_SIZE", "1000")]), Err(AppError::Config(_))));
    }
}
