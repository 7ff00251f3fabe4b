use std::future::Future;
use std::time::Duration;

use serde_json::{json, Value};
use tracing::{debug, info};

use crate::config::{Config, HTTP_TIMEOUT_SECS};
use crate::error::{AppError, Result};
use crate::price::TokenAmount;
use crate::types::{class_name, crafting_name, Hero, Rarity, TraitKey, TraitValue, Traits};

pub const ZERO_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

const HEROES_QUERY: &str = r#"
query Heroes($first: Int!, $skip: Int!, $where: HeroFilter) {
  heroes(first: $first, skip: $skip, where: $where, orderBy: id) {
    id
    owner { id }
    mainClass
    subClassStr
    professionStr
    rarity
    generation
    level
    xp
    stamina
    staminaFullAt
    statsUnknown1
    statsUnknown2
    salePrice
    currentQuest
  }
}
"#;

// ---------------------------------------------------------------------------
// ListingSource
// ---------------------------------------------------------------------------

/// Supplies hero records to the query engine. The engine never talks to the
/// network itself; whoever consumes it holds one of these.
pub trait ListingSource: Send + Sync + 'static {
    /// Heroes currently listed for sale, screened for the buy view.
    fn fetch_listings(&self) -> impl Future<Output = Result<(Vec<Hero>, FetchStats)>> + Send;

    /// Every hero owned by `owner`, listed or not.
    fn fetch_owned(&self, owner: &str) -> impl Future<Output = Result<Vec<Hero>>> + Send;
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FetchStats {
    pub api_total: usize,
    pub rejected_zero_id: usize,
    pub rejected_malformed: usize,
    pub rejected_own: usize,
    pub rejected_not_for_sale: usize,
    pub qualified: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    ZeroId,
    Malformed,
    OwnHero,
    NotForSale,
}

impl FetchStats {
    fn record(&mut self, rejection: Rejection) {
        match rejection {
            Rejection::ZeroId => self.rejected_zero_id += 1,
            Rejection::Malformed => self.rejected_malformed += 1,
            Rejection::OwnHero => self.rejected_own += 1,
            Rejection::NotForSale => self.rejected_not_for_sale += 1,
        }
    }
}

// ---------------------------------------------------------------------------
// IndexerClient
// ---------------------------------------------------------------------------

/// GraphQL client for the hero metadata / indexing service.
#[derive(Debug, Clone)]
pub struct IndexerClient {
    http: reqwest::Client,
    url: String,
    page_size: usize,
    max_listings: usize,
    viewer: Option<String>,
}

impl IndexerClient {
    pub fn new(cfg: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            http,
            url: cfg.indexer_url.clone(),
            page_size: cfg.indexer_page_size.max(1),
            max_listings: cfg.max_listings,
            viewer: cfg.viewer_address.clone(),
        })
    }

    /// One `heroes(...)` round trip.
    async fn query_heroes(&self, filter: &Value, first: usize, skip: usize) -> Result<Vec<Value>> {
        let body = json!({
            "query": HEROES_QUERY,
            "variables": { "first": first, "skip": skip, "where": filter },
        });
        let resp: Value = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if let Some(errors) = resp.get("errors").and_then(|e| e.as_array()) {
            if let Some(first_err) = errors.first() {
                let msg = first_err
                    .get("message")
                    .and_then(|m| m.as_str())
                    .unwrap_or("unknown GraphQL error");
                return Err(AppError::Indexer(msg.to_string()));
            }
        }

        match resp.pointer("/data/heroes").and_then(|h| h.as_array()) {
            Some(items) => Ok(items.clone()),
            None => Err(AppError::Indexer("response missing data.heroes".to_string())),
        }
    }

    /// Page through `heroes(where: filter)` until a short page or the cap.
    async fn query_all(&self, filter: Value) -> Result<Vec<Value>> {
        let mut all = Vec::new();
        let mut skip = 0usize;

        loop {
            let first = self.page_size.min(self.max_listings.saturating_sub(all.len()));
            if first == 0 {
                break;
            }
            let items = self.query_heroes(&filter, first, skip).await?;
            let n = items.len();
            debug!(skip, returned = n, "indexer page");
            all.extend(items);
            if n < first {
                break;
            }
            skip += n;
        }
        Ok(all)
    }
}

impl ListingSource for IndexerClient {
    async fn fetch_listings(&self) -> Result<(Vec<Hero>, FetchStats)> {
        let items = self.query_all(json!({ "salePrice_not": null })).await?;
        let (heroes, stats) = screen_listings(&items, self.viewer.as_deref());
        info!(
            api_total = stats.api_total,
            qualified = stats.qualified,
            "[FETCH] listings: {} qualified of {} (zero_id={} malformed={} own={} not_for_sale={})",
            stats.qualified,
            stats.api_total,
            stats.rejected_zero_id,
            stats.rejected_malformed,
            stats.rejected_own,
            stats.rejected_not_for_sale,
        );
        Ok((heroes, stats))
    }

    async fn fetch_owned(&self, owner: &str) -> Result<Vec<Hero>> {
        let items = self
            .query_all(json!({ "owner": owner.to_ascii_lowercase() }))
            .await?;
        let total = items.len();
        let heroes: Vec<Hero> = items.iter().filter_map(|v| parse_indexer_hero(v).ok()).collect();
        debug!(owner, total, parsed = heroes.len(), "fetched owned heroes");
        Ok(heroes)
    }
}

// ---------------------------------------------------------------------------
// Parsing and screening
// ---------------------------------------------------------------------------

/// Parse indexer items and keep only heroes a viewer could buy.
pub fn screen_listings(items: &[Value], viewer: Option<&str>) -> (Vec<Hero>, FetchStats) {
    let mut stats = FetchStats { api_total: items.len(), ..Default::default() };
    let mut heroes = Vec::with_capacity(items.len());

    for item in items {
        match parse_indexer_hero(item).and_then(|hero| screen_listing(hero, viewer)) {
            Ok(hero) => heroes.push(hero),
            Err(rejection) => stats.record(rejection),
        }
    }

    stats.qualified = heroes.len();
    (heroes, stats)
}

fn screen_listing(hero: Hero, viewer: Option<&str>) -> std::result::Result<Hero, Rejection> {
    if !hero.is_for_sale {
        return Err(Rejection::NotForSale);
    }
    if viewer.is_some_and(|v| hero.is_owned_by(v)) {
        return Err(Rejection::OwnHero);
    }
    Ok(hero)
}

/// Convert one indexer `hero` object into a record. Numeric codes are mapped
/// to display names here, once. Missing fields become absent traits; only a
/// missing or zero id rejects the record.
pub fn parse_indexer_hero(v: &Value) -> std::result::Result<Hero, Rejection> {
    let id = match v.get("id") {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => return Err(Rejection::Malformed),
    };
    if id.is_empty() {
        return Err(Rejection::Malformed);
    }
    if TokenAmount::parse(&id).is_some_and(|n| n.is_zero()) {
        return Err(Rejection::ZeroId);
    }

    let mut traits = Traits::default();
    traits.set(TraitKey::Class, coded_text(v.get("mainClass"), class_name));
    traits.set(TraitKey::SubClass, coded_text(v.get("subClassStr").or_else(|| v.get("subClass")), class_name));
    traits.set(TraitKey::Profession, coded_text(v.get("professionStr"), |_| None));
    traits.set(TraitKey::Crafting1, coded_text(v.get("statsUnknown1"), crafting_name));
    traits.set(TraitKey::Crafting2, coded_text(v.get("statsUnknown2"), crafting_name));
    traits.set(
        TraitKey::Rarity,
        coded_text(v.get("rarity"), |n| Rarity::from_ordinal(n).map(Rarity::name)),
    );
    traits.set(TraitKey::Generation, v.get("generation").map(TraitValue::from_json).unwrap_or_default());
    traits.set(TraitKey::Level, v.get("level").map(TraitValue::from_json).unwrap_or_default());

    let owner = v
        .get("owner")
        .and_then(|o| o.get("id").or(Some(o)))
        .and_then(|o| o.as_str())
        .unwrap_or("")
        .to_string();

    let sale_price = v.get("salePrice").filter(|p| !p.is_null());
    let price = match sale_price {
        Some(Value::String(s)) => TokenAmount::parse_or_zero(s),
        Some(Value::Number(n)) => TokenAmount::parse_or_zero(&n.to_string()),
        _ => TokenAmount::zero(),
    };

    let is_on_quest = v
        .get("currentQuest")
        .and_then(|q| q.as_str())
        .is_some_and(|q| !q.is_empty() && !q.eq_ignore_ascii_case(ZERO_ADDRESS));

    let xp = unsigned(v.get("xp"));
    let stamina = u32::try_from(unsigned(v.get("stamina"))).unwrap_or(u32::MAX);
    let stamina_full_at = unsigned(v.get("staminaFullAt"));

    Ok(Hero {
        id,
        traits,
        price,
        is_for_sale: sale_price.is_some(),
        is_on_quest,
        owner,
        xp,
        stamina,
        stamina_full_at,
    })
}

/// Non-negative integer sent either as a JSON number or a digit string
/// (the indexer serialises BigInt fields as strings). Anything else is 0.
fn unsigned(v: Option<&Value>) -> u64 {
    v.and_then(|x| x.as_u64().or_else(|| x.as_str().and_then(|s| s.trim().parse().ok())))
        .unwrap_or(0)
}

/// Text trait from either a display string or a numeric code; numeric codes
/// (including digit strings) go through `lookup`, unknown codes are absent.
fn coded_text(v: Option<&Value>, lookup: impl Fn(i64) -> Option<&'static str>) -> TraitValue {
    let code = match v {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => match s.trim().parse::<i64>() {
            Ok(n) => Some(n),
            Err(_) if s.is_empty() => return TraitValue::Absent,
            Err(_) => return TraitValue::Text(s.clone()),
        },
        _ => return TraitValue::Absent,
    };
    code.and_then(lookup)
        .map(|name| TraitValue::Text(name.to_string()))
        .unwrap_or(TraitValue::Absent)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(id: &str, sale_price: Value, owner: &str) -> Value {
        json!({
            "id": id,
            "owner": { "id": owner },
            "mainClass": 1,
            "subClassStr": "wizard",
            "professionStr": "mining",
            "rarity": 2,
            "generation": 3,
            "level": 14,
            "xp": "1200",
            "stamina": 25,
            "staminaFullAt": "1700000000",
            "statsUnknown1": 12,
            "statsUnknown2": "99",
            "salePrice": sale_price,
            "currentQuest": ZERO_ADDRESS,
        })
    }

    #[test]
    fn maps_indexer_codes_to_traits() {
        let hero = parse_indexer_hero(&raw("1000001", json!("2500000000000000000"), "0xAA")).unwrap();
        assert_eq!(hero.traits.text(TraitKey::Class), "Knight");
        assert_eq!(hero.traits.text(TraitKey::SubClass), "wizard");
        assert_eq!(hero.traits.text(TraitKey::Profession), "mining");
        assert_eq!(hero.traits.text(TraitKey::Crafting1), "Enchanting");
        assert!(hero.traits.get(TraitKey::Crafting2).is_absent());
        assert_eq!(hero.rarity(), Some(Rarity::Rare));
        assert_eq!(hero.generation(), 3);
        assert_eq!(hero.level(), 14);
        assert_eq!(hero.xp, 1200);
        assert_eq!(hero.stamina, 25);
        assert_eq!(hero.stamina_full_at, 1_700_000_000);
        assert_eq!(hero.owner, "0xAA");
        assert!(hero.is_for_sale);
        assert!(!hero.is_on_quest);
        assert_eq!(hero.price, TokenAmount::parse("2500000000000000000").unwrap());
    }

    #[test]
    fn questing_when_quest_address_is_set() {
        let mut v = raw("5", Value::Null, "0xaa");
        v["currentQuest"] = json!("0x1234000000000000000000000000000000000000");
        let hero = parse_indexer_hero(&v).unwrap();
        assert!(hero.is_on_quest);
        assert!(!hero.is_for_sale);
        assert!(hero.price.is_zero());
    }

    #[test]
    fn screening_counts_rejections() {
        let items = vec![
            raw("1", json!("10"), "0xseller"),
            raw("0", json!("10"), "0xseller"),
            raw("2", Value::Null, "0xseller"),
            raw("3", json!("10"), "0xViewer"),
            json!({ "owner": { "id": "0xseller" } }),
        ];
        let (heroes, stats) = screen_listings(&items, Some("0xviewer"));
        assert_eq!(heroes.len(), 1);
        assert_eq!(heroes[0].id, "1");
        assert_eq!(
            stats,
            FetchStats {
                api_total: 5,
                rejected_zero_id: 1,
                rejected_malformed: 1,
                rejected_own: 1,
                rejected_not_for_sale: 1,
                qualified: 1,
            }
        );
    }

    #[test]
    fn missing_fields_degrade_to_absent() {
        let hero = parse_indexer_hero(&json!({ "id": 77 })).unwrap();
        assert_eq!(hero.id, "77");
        assert!(hero.rarity().is_none());
        assert_eq!(hero.level(), 0);
        assert_eq!(hero.owner, "");
        assert_eq!(hero.stamina, 0);
        assert_eq!(hero.stamina_full_at, 0);
    }
}
