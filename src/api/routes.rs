use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::health::HealthState;
use crate::config::MAX_PAGE_SIZE;
use crate::error::AppError;
use crate::fetcher::ListingSource;
use crate::price::{format_price, TokenAmount};
use crate::query::{paginate, run_query, FilterSpec, QueryStatus, SortSpec};
use crate::state::ListingStore;
use crate::listing_refresh::now_ns;
use crate::trade::{
    quote_cancel, quote_listing, quote_price_update, quote_purchase, CancelQuote, ListingQuote, PurchaseQuote,
    TradeError,
};
use crate::types::Hero;

pub struct ApiState<S> {
    pub store: Arc<ListingStore>,
    pub source: Arc<S>,
    pub health: Arc<HealthState>,
    /// Default page size when a request carries no `limit`.
    pub page_size: usize,
}

impl<S> Clone for ApiState<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            source: Arc::clone(&self.source),
            health: Arc::clone(&self.health),
            page_size: self.page_size,
        }
    }
}

pub fn router<S: ListingSource>(state: ApiState<S>) -> Router {
    Router::new()
        .route("/listings", get(get_listings::<S>))
        .route("/listings/:id", get(get_listing::<S>))
        .route("/listings/:id/quote", post(post_quote::<S>))
        .route("/owners/:address/heroes", get(get_owned_heroes::<S>))
        .route("/owners/:address/heroes/:id/list-quote", post(post_list_quote::<S>))
        .route("/owners/:address/heroes/:id/price-quote", post(post_price_quote::<S>))
        .route("/owners/:address/heroes/:id/cancel-quote", post(post_cancel_quote::<S>))
        .route("/health", get(get_health::<S>))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Query param structs
// ---------------------------------------------------------------------------

/// Filter, sort and page parameters. Set-valued filters are comma separated.
#[derive(Debug, Default, Deserialize)]
pub struct ListingsQuery {
    pub class: Option<String>,
    pub subclass: Option<String>,
    pub profession: Option<String>,
    pub crafting1: Option<String>,
    pub crafting2: Option<String>,
    pub rarity_min: Option<u8>,
    pub rarity_max: Option<u8>,
    pub generation_min: Option<i64>,
    pub generation_max: Option<i64>,
    pub level_min: Option<i64>,
    pub level_max: Option<i64>,
    pub hide_questing: Option<bool>,
    pub hide_listed: Option<bool>,
    pub sort: Option<String>,
    /// Records already consumed from the sorted sequence.
    pub offset: Option<usize>,
    pub limit: Option<usize>,
    /// Ids the client already shows.
    pub exclude: Option<String>,
}

impl ListingsQuery {
    pub fn filter_spec(&self) -> Result<FilterSpec, AppError> {
        let defaults = FilterSpec::default();
        let spec = FilterSpec {
            class: split_set(self.class.as_deref()),
            subclass: split_set(self.subclass.as_deref()),
            profession: split_set(self.profession.as_deref()),
            crafting1: split_set(self.crafting1.as_deref()),
            crafting2: split_set(self.crafting2.as_deref()),
            rarity_min: self.rarity_min.unwrap_or(defaults.rarity_min),
            rarity_max: self.rarity_max.unwrap_or(defaults.rarity_max),
            generation_min: self.generation_min.unwrap_or(defaults.generation_min),
            generation_max: self.generation_max.unwrap_or(defaults.generation_max),
            level_min: self.level_min.unwrap_or(defaults.level_min),
            level_max: self.level_max.unwrap_or(defaults.level_max),
            hide_questing: self.hide_questing.unwrap_or(false),
            hide_listed: self.hide_listed.unwrap_or(false),
        };
        spec.validate()?;
        Ok(spec)
    }

    pub fn sort_spec(&self) -> Result<SortSpec, AppError> {
        match self.sort.as_deref() {
            Some(s) if !s.trim().is_empty() => Ok(s.parse()?),
            _ => Ok(SortSpec::default()),
        }
    }

    fn exclude_ids(&self) -> HashSet<String> {
        split_set(self.exclude.as_deref()).into_iter().collect()
    }
}

fn split_set(raw: Option<&str>) -> BTreeSet<String> {
    raw.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

#[derive(Debug, Deserialize)]
pub struct QuoteRequest {
    pub buyer: String,
    pub balance: TokenAmount,
    #[serde(default)]
    pub allowance: TokenAmount,
    pub estimated_gas: Option<u64>,
}

/// Listing price is a whole-token decimal such as `"12.5"`.
#[derive(Debug, Deserialize)]
pub struct ListQuoteRequest {
    pub price: String,
    /// Equipped item slots as reported by the hero contract.
    #[serde(default)]
    pub equipped_slots: u32,
    /// Proceed despite warnings.
    #[serde(default)]
    pub force: bool,
    pub estimated_gas: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct PriceQuoteRequest {
    pub price: String,
    pub estimated_gas: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CancelQuoteRequest {
    pub estimated_gas: Option<u64>,
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct HeroResponse {
    #[serde(flatten)]
    pub hero: Hero,
    pub price_display: String,
    pub xp_to_next_level: u64,
    pub current_stamina: u32,
}

impl HeroResponse {
    pub fn at(hero: Hero, now_secs: u64) -> Self {
        Self {
            price_display: format_price(&hero.price),
            xp_to_next_level: hero.xp_to_next_level(),
            current_stamina: hero.current_stamina(now_secs),
            hero,
        }
    }
}

impl From<Hero> for HeroResponse {
    fn from(hero: Hero) -> Self {
        Self::at(hero, now_ns() / 1_000_000_000)
    }
}

#[derive(Debug, Serialize)]
pub struct ListingsResponse {
    pub status: QueryStatus,
    /// Records before filtering.
    pub fetched: usize,
    /// Records after filtering.
    pub matched: usize,
    pub heroes: Vec<HeroResponse>,
    pub has_more: bool,
    pub next_offset: usize,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub listings: usize,
    pub indexer_ok: bool,
    pub refresh_failures: u64,
    pub refresh_count: u64,
    pub refreshed_at_ns: u64,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn get_listings<S: ListingSource>(
    State(state): State<ApiState<S>>,
    Query(params): Query<ListingsQuery>,
) -> Result<Json<ListingsResponse>, AppError> {
    let records = state.store.snapshot();
    Ok(Json(query_page(records, &params, false, state.page_size)?))
}

async fn get_listing<S: ListingSource>(
    State(state): State<ApiState<S>>,
    Path(hero_id): Path<String>,
) -> Result<Json<HeroResponse>, AppError> {
    state
        .store
        .get(&hero_id)
        .map(|hero| Json(hero.into()))
        .ok_or_else(|| AppError::NotFound(format!("hero {hero_id} is not listed")))
}

/// An owner's heroes are fetched fresh per request; listed ones come first.
async fn get_owned_heroes<S: ListingSource>(
    State(state): State<ApiState<S>>,
    Path(address): Path<String>,
    Query(params): Query<ListingsQuery>,
) -> Result<Json<ListingsResponse>, AppError> {
    let filter = params.filter_spec()?;
    let records = state.source.fetch_owned(&address).await?;
    debug!(owner = %address, total = records.len(), "owned heroes fetched");
    Ok(Json(page_of(records, &params, &filter, true, state.page_size)?))
}

async fn post_quote<S: ListingSource>(
    State(state): State<ApiState<S>>,
    Path(hero_id): Path<String>,
    Json(req): Json<QuoteRequest>,
) -> Result<Json<PurchaseQuote>, AppError> {
    let hero = state
        .store
        .get(&hero_id)
        .ok_or_else(|| AppError::NotFound(format!("hero {hero_id} is not listed")))?;
    let quote = quote_purchase(&hero, &req.buyer, &req.balance, &req.allowance, req.estimated_gas)?;
    Ok(Json(quote))
}

async fn post_list_quote<S: ListingSource>(
    State(state): State<ApiState<S>>,
    Path((address, hero_id)): Path<(String, String)>,
    Json(req): Json<ListQuoteRequest>,
) -> Result<Json<ListingQuote>, AppError> {
    let hero = owned_hero(&state, &address, &hero_id).await?;
    let quote = quote_listing(&hero, &address, &req.price, req.equipped_slots, req.force, req.estimated_gas)?;
    Ok(Json(quote))
}

async fn post_price_quote<S: ListingSource>(
    State(state): State<ApiState<S>>,
    Path((address, hero_id)): Path<(String, String)>,
    Json(req): Json<PriceQuoteRequest>,
) -> Result<Json<ListingQuote>, AppError> {
    let hero = owned_hero(&state, &address, &hero_id).await?;
    Ok(Json(quote_price_update(&hero, &address, &req.price, req.estimated_gas)?))
}

async fn post_cancel_quote<S: ListingSource>(
    State(state): State<ApiState<S>>,
    Path((address, hero_id)): Path<(String, String)>,
    Json(req): Json<CancelQuoteRequest>,
) -> Result<Json<CancelQuote>, AppError> {
    let hero = owned_hero(&state, &address, &hero_id).await?;
    Ok(Json(quote_cancel(&hero, &address, req.estimated_gas)?))
}

async fn get_health<S: ListingSource>(State(state): State<ApiState<S>>) -> Json<HealthResponse> {
    let indexer_ok = state.health.indexer_ok();
    Json(HealthResponse {
        status: if indexer_ok { "ok" } else { "degraded" },
        listings: state.store.len(),
        indexer_ok,
        refresh_failures: state.health.refresh_failures(),
        refresh_count: state.health.refresh_count(),
        refreshed_at_ns: state.store.refreshed_at_ns(),
    })
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// The seller's hero, fetched fresh. A hero outside the inventory is
/// reported as not owned.
async fn owned_hero<S: ListingSource>(
    state: &ApiState<S>,
    address: &str,
    hero_id: &str,
) -> Result<Hero, AppError> {
    let owned = state.source.fetch_owned(address).await?;
    owned
        .into_iter()
        .find(|h| h.id == hero_id)
        .ok_or_else(|| TradeError::NotOwner(hero_id.to_string()).into())
}

fn query_page(
    records: Vec<Hero>,
    params: &ListingsQuery,
    prioritize_listed: bool,
    default_page_size: usize,
) -> Result<ListingsResponse, AppError> {
    let filter = params.filter_spec()?;
    page_of(records, params, &filter, prioritize_listed, default_page_size)
}

fn page_of(
    records: Vec<Hero>,
    params: &ListingsQuery,
    filter: &FilterSpec,
    prioritize_listed: bool,
    default_page_size: usize,
) -> Result<ListingsResponse, AppError> {
    let sort = params.sort_spec()?;
    let limit = params.limit.unwrap_or(default_page_size).clamp(1, MAX_PAGE_SIZE);
    let offset = params.offset.unwrap_or(0);

    let result = run_query(records, filter, sort, prioritize_listed);
    let page = paginate(&result.records, limit, offset, &params.exclude_ids());

    Ok(ListingsResponse {
        status: result.status,
        fetched: result.fetched,
        matched: result.records.len(),
        heroes: page.items.into_iter().map(HeroResponse::from).collect(),
        has_more: page.has_more,
        next_offset: page.next_offset,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::error::Result;
    use crate::fetcher::FetchStats;
    use crate::types::{RawAttribute, TraitKey};

    struct StaticSource {
        owned: Vec<Hero>,
    }

    impl ListingSource for StaticSource {
        async fn fetch_listings(&self) -> Result<(Vec<Hero>, FetchStats)> {
            Ok((Vec::new(), FetchStats::default()))
        }

        async fn fetch_owned(&self, _owner: &str) -> Result<Vec<Hero>> {
            Ok(self.owned.clone())
        }
    }

    fn hero(id: &str, class: &str, level: i64, price: &str, for_sale: bool) -> Hero {
        let mut h = Hero::new(
            id,
            &[
                RawAttribute::new(TraitKey::Class, class),
                RawAttribute::new(TraitKey::Rarity, "Common"),
                RawAttribute::new(TraitKey::Level, level),
                RawAttribute::new(TraitKey::Generation, 1),
            ],
        );
        h.price = TokenAmount::parse_or_zero(price);
        h.is_for_sale = for_sale;
        h.owner = "0xseller".to_string();
        h
    }

    fn app(listings: Vec<Hero>, owned: Vec<Hero>) -> Router {
        let store = ListingStore::new();
        store.replace_all(listings, 42);
        router(ApiState {
            store,
            source: Arc::new(StaticSource { owned }),
            health: Arc::new(HealthState::new()),
            page_size: 2,
        })
    }

    async fn send(app: Router, req: Request<Body>) -> (StatusCode, Value) {
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
        send(app, Request::builder().uri(uri).body(Body::empty()).unwrap()).await
    }

    fn ids(body: &Value) -> Vec<String> {
        body["heroes"]
            .as_array()
            .unwrap()
            .iter()
            .map(|h| h["id"].as_str().unwrap().to_string())
            .collect()
    }

    fn listings() -> Vec<Hero> {
        vec![
            hero("1", "Knight", 10, "500", true),
            hero("2", "Wizard", 20, "100", true),
            hero("3", "Knight", 30, "300", true),
        ]
    }

    #[tokio::test]
    async fn listings_are_filtered_sorted_and_paged() {
        let (status, body) = get_json(app(listings(), vec![]), "/listings?class=Knight,Wizard").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(ids(&body), ["2", "3"]);
        assert_eq!(body["status"], "matched");
        assert_eq!(body["fetched"], 3);
        assert_eq!(body["matched"], 3);
        assert_eq!(body["has_more"], true);
        assert_eq!(body["next_offset"], 2);
        assert_eq!(body["heroes"][0]["price_display"], "0.00 HONK");

        let (_, rest) = get_json(app(listings(), vec![]), "/listings?offset=2").await;
        assert_eq!(ids(&rest), ["1"]);
        assert_eq!(rest["has_more"], false);
    }

    #[tokio::test]
    async fn sort_and_exclude_params_apply() {
        let (_, body) =
            get_json(app(listings(), vec![]), "/listings?sort=level-desc&limit=5&exclude=3").await;
        assert_eq!(ids(&body), ["2", "1"]);
    }

    #[tokio::test]
    async fn no_matches_is_reported_separately() {
        let (_, body) = get_json(app(listings(), vec![]), "/listings?class=Priest").await;
        assert_eq!(body["status"], "no_matches");
        assert_eq!(body["fetched"], 3);

        let (_, empty) = get_json(app(vec![], vec![]), "/listings").await;
        assert_eq!(empty["status"], "no_records");
    }

    #[tokio::test]
    async fn invalid_ranges_are_rejected() {
        let (status, body) = get_json(app(listings(), vec![]), "/listings?level_min=50&level_max=10").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("level"));

        let (status, _) = get_json(app(listings(), vec![]), "/listings?sort=cheapest").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn single_listing_lookup() {
        let (status, body) = get_json(app(listings(), vec![]), "/listings/3").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], "3");

        let (status, _) = get_json(app(listings(), vec![]), "/listings/99").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn owned_heroes_put_listed_first() {
        let owned = vec![
            hero("7", "Knight", 5, "0", false),
            hero("8", "Knight", 9, "900", true),
        ];
        let (status, body) =
            get_json(app(vec![], owned), "/owners/0xSeller/heroes?sort=level-asc&limit=10").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(ids(&body), ["8", "7"]);
    }

    #[tokio::test]
    async fn quote_checks_buyer() {
        let request = |buyer: &str| {
            Request::builder()
                .method("POST")
                .uri("/listings/2/quote")
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({ "buyer": buyer, "balance": "1000", "allowance": "0" }).to_string(),
                ))
                .unwrap()
        };

        let (status, body) = send(app(listings(), vec![]), request("0xbuyer")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["hero_id"], "2");
        assert_eq!(body["needs_approval"], true);

        let (status, _) = send(app(listings(), vec![]), request("0xSELLER")).await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn inventory() -> Vec<Hero> {
        let mut questing = hero("9", "Monk", 3, "0", false);
        questing.is_on_quest = true;
        vec![hero("7", "Knight", 5, "0", false), hero("8", "Knight", 9, "900", true), questing]
    }

    #[tokio::test]
    async fn list_quote_checks_quest_price_and_equipment() {
        let uri = "/owners/0xSeller/heroes/7/list-quote";
        let (status, body) = send(app(vec![], inventory()), post_json(uri, json!({ "price": "2.5" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["price"], "2500000000000000000");
        assert_eq!(body["price_display"], "2.50 HONK");
        assert_eq!(body["ready"], true);
        assert_eq!(body["gas_limit"], 750_000);

        let (status, body) =
            send(app(vec![], inventory()), post_json(uri, json!({ "price": "2.5", "equipped_slots": 1 }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ready"], false);
        assert_eq!(body["warnings"].as_array().unwrap().len(), 1);

        let (status, _) = send(app(vec![], inventory()), post_json(uri, json!({ "price": "abc" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(
            app(vec![], inventory()),
            post_json("/owners/0xSeller/heroes/9/list-quote", json!({ "price": "1" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(body["error"].as_str().unwrap().contains("quest"));

        let (status, _) = send(
            app(vec![], inventory()),
            post_json("/owners/0xSeller/heroes/99/list-quote", json!({ "price": "1" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn price_and_cancel_quotes_need_an_active_listing() {
        let (status, body) = send(
            app(vec![], inventory()),
            post_json("/owners/0xSeller/heroes/8/price-quote", json!({ "price": "4" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["price"], "4000000000000000000");

        let (status, body) = send(
            app(vec![], inventory()),
            post_json("/owners/0xSeller/heroes/8/cancel-quote", json!({ "estimated_gas": 20000 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["gas_limit"], 30_000);

        let (status, _) = send(
            app(vec![], inventory()),
            post_json("/owners/0xSeller/heroes/7/cancel-quote", json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[test]
    fn hero_response_reports_current_stamina() {
        let mut h = hero("1", "Knight", 1, "0", false);
        h.stamina = 25;
        h.stamina_full_at = 1_000 + 3 * 1_200;
        let body = serde_json::to_value(HeroResponse::at(h, 1_000)).unwrap();
        assert_eq!(body["stamina"], 25);
        assert_eq!(body["current_stamina"], 22);
        assert_eq!(body["xp_to_next_level"], 2_000);
    }

    #[tokio::test]
    async fn health_reports_store_size() {
        let (status, body) = get_json(app(listings(), vec![]), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["listings"], 3);
        assert_eq!(body["refreshed_at_ns"], 42);
        assert_eq!(body["status"], "degraded");
    }
}
