use serde::Deserialize;

use hero_market::feed::{FeedPhase, ListingFeed};
use hero_market::query::{Identified, Page, QueryStatus, SortSpec};
use hero_market::types::{Rarity, TraitKey, Traits};

// ---------------------------------------------------------------------------
// API response types (mirror routes.rs shapes)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct HeroRow {
    pub id: String,
    pub traits: Traits,
    #[serde(default)]
    pub is_for_sale: bool,
    #[serde(default)]
    pub is_on_quest: bool,
    pub price_display: String,
    #[serde(default)]
    pub xp_to_next_level: u64,
    #[serde(default)]
    pub stamina: u32,
    #[serde(default)]
    pub current_stamina: u32,
}

impl Identified for HeroRow {
    fn id(&self) -> &str {
        &self.id
    }
}

impl HeroRow {
    pub fn rarity(&self) -> Option<Rarity> {
        self.traits.rarity()
    }

    pub fn text(&self, key: TraitKey) -> String {
        self.traits.text(key).into_owned()
    }

    pub fn int(&self, key: TraitKey) -> i64 {
        self.traits.int(key)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListingsResponse {
    pub status: QueryStatus,
    pub fetched: usize,
    pub matched: usize,
    pub heroes: Vec<HeroRow>,
    pub has_more: bool,
    pub next_offset: usize,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct HealthResponse {
    pub listings: Option<usize>,
    pub indexer_ok: Option<bool>,
    pub refresh_failures: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
struct ErrorResponse {
    error: String,
}

// ---------------------------------------------------------------------------
// App state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionStatus {
    Connected,
    Error(String),
    Connecting,
}

/// Which hero set the browser shows.
#[derive(Debug, Clone, PartialEq)]
pub enum View {
    Market,
    Owned(String),
}

#[derive(Debug)]
pub struct AppState {
    pub status: ConnectionStatus,
    pub feed: ListingFeed<HeroRow>,
    pub view: View,
    pub sort_index: usize,
    pub hide_questing: bool,
    pub hide_listed: bool,
    /// Result of the most recent query (for the empty-state message).
    pub query_status: Option<QueryStatus>,
    pub fetched: usize,
    pub matched: usize,
    pub health: HealthResponse,
    pub viewer: Option<String>,
    pub base_url: String,
}

impl AppState {
    pub fn new(base_url: String, page_size: usize, viewer: Option<String>) -> Self {
        Self {
            status: ConnectionStatus::Connecting,
            feed: ListingFeed::new(page_size),
            view: View::Market,
            sort_index: 0,
            hide_questing: false,
            hide_listed: false,
            query_status: None,
            fetched: 0,
            matched: 0,
            health: HealthResponse::default(),
            viewer,
            base_url,
        }
    }

    pub fn sort(&self) -> SortSpec {
        SortSpec::ALL[self.sort_index % SortSpec::ALL.len()]
    }

    pub fn cycle_sort(&mut self) {
        self.sort_index = (self.sort_index + 1) % SortSpec::ALL.len();
        self.reload();
    }

    pub fn toggle_hide_questing(&mut self) {
        self.hide_questing = !self.hide_questing;
        self.reload();
    }

    pub fn toggle_hide_listed(&mut self) {
        self.hide_listed = !self.hide_listed;
        self.reload();
    }

    /// Switch between the market and the viewer's own heroes.
    pub fn toggle_view(&mut self) {
        self.view = match (&self.view, &self.viewer) {
            (View::Market, Some(viewer)) => View::Owned(viewer.clone()),
            _ => View::Market,
        };
        self.reload();
    }

    /// Start the feed over from the first page.
    pub fn reload(&mut self) {
        self.feed.reset();
        self.query_status = None;
    }

    /// Request path for the next page starting at `offset`.
    pub fn page_url(&self, offset: usize) -> String {
        let path = match &self.view {
            View::Market => "/listings".to_string(),
            View::Owned(owner) => format!("/owners/{owner}/heroes"),
        };
        format!(
            "{}{}?sort={}&offset={}&limit={}&hide_questing={}&hide_listed={}",
            self.base_url,
            path,
            self.sort(),
            offset,
            self.feed.page_size(),
            self.hide_questing,
            self.hide_listed,
        )
    }

    /// Fetch the next page, if the feed wants one.
    pub async fn load_more(&mut self, client: &reqwest::Client) {
        let Some(ticket) = self.feed.begin_load() else { return };
        let url = self.page_url(ticket.offset);

        match fetch_page(client, &url).await {
            Ok(resp) => {
                let page = Page {
                    items: resp.heroes,
                    has_more: resp.has_more,
                    next_offset: resp.next_offset,
                };
                if self.feed.complete(ticket, page) {
                    self.query_status = Some(resp.status);
                    self.fetched = resp.fetched;
                    self.matched = resp.matched;
                }
                self.status = ConnectionStatus::Connected;
            }
            Err(e) => {
                self.feed.fail(ticket);
                self.status = ConnectionStatus::Error(e);
            }
        }
    }

    /// Load another page when the selection reaches the last loaded row.
    pub fn wants_more(&self, selected: Option<usize>) -> bool {
        let len = self.feed.items().len();
        self.feed.phase() == FeedPhase::Idle && (len == 0 || selected.is_some_and(|i| i + 1 >= len))
    }

    pub async fn refresh_health(&mut self, client: &reqwest::Client) {
        let url = format!("{}/health", self.base_url);
        if let Ok(resp) = client.get(&url).send().await {
            if let Ok(health) = resp.json::<HealthResponse>().await {
                self.health = health;
            }
        }
    }

    pub fn empty_message(&self) -> &'static str {
        match self.query_status {
            Some(QueryStatus::NoRecords) => "No heroes available",
            Some(QueryStatus::NoMatches) => "No heroes match the current filters",
            _ if self.feed.phase() == FeedPhase::Loading => "Loading…",
            _ => "",
        }
    }
}

async fn fetch_page(client: &reqwest::Client, url: &str) -> Result<ListingsResponse, String> {
    let resp = client.get(url).send().await.map_err(|e| e.to_string())?;
    if !resp.status().is_success() {
        let status = resp.status();
        return Err(match resp.json::<ErrorResponse>().await {
            Ok(body) => body.error,
            Err(_) => format!("HTTP {status}"),
        });
    }
    resp.json::<ListingsResponse>()
        .await
        .map_err(|e| format!("parse error: {e}"))
}

// ---------------------------------------------------------------------------
// Formatting helpers
// ---------------------------------------------------------------------------

pub fn format_rarity(rarity: Option<Rarity>) -> &'static str {
    rarity.map_or("—", Rarity::name)
}

pub fn format_xp(to_next: u64) -> String {
    if to_next == 0 {
        "ready".to_string()
    } else {
        format!("{to_next} xp")
    }
}

pub fn format_stamina(current: u32, max: u32) -> String {
    if max == 0 {
        "—".to_string()
    } else {
        format!("{current}/{max}")
    }
}

pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{kept}…")
    }
}
