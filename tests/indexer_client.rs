use std::collections::HashMap;

use hero_market::config::Config;
use hero_market::error::AppError;
use hero_market::fetcher::{IndexerClient, ListingSource};
use serde_json::{json, Value};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Helpers ─────────────────────────────────────────────────────

fn client_for(server: &MockServer, extra: &[(&str, &str)]) -> IndexerClient {
    let mut vars: HashMap<String, String> = HashMap::new();
    vars.insert("INDEXER_URL".into(), format!("{}/graphql", server.uri()));
    vars.insert("INDEXER_PAGE_SIZE".into(), "2".into());
    for (k, v) in extra {
        vars.insert(k.to_string(), v.to_string());
    }
    let cfg = Config::from_vars(|k| vars.get(k).cloned()).unwrap();
    IndexerClient::new(&cfg).unwrap()
}

fn hero(id: &str, owner: &str, sale_price: Value) -> Value {
    json!({
        "id": id,
        "owner": { "id": owner },
        "mainClass": 0,
        "subClassStr": "Archer",
        "professionStr": "mining",
        "rarity": 1,
        "generation": 2,
        "level": 7,
        "xp": 300,
        "salePrice": sale_price,
        "currentQuest": null,
    })
}

fn heroes_page(items: Vec<Value>) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "data": { "heroes": items } }))
}

async fn mount_page(server: &MockServer, skip: usize, items: Vec<Value>) {
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_partial_json(json!({ "variables": { "skip": skip } })))
        .respond_with(heroes_page(items))
        .expect(1)
        .mount(server)
        .await;
}

// ── Listings ────────────────────────────────────────────────────

#[tokio::test]
async fn pages_until_short_page() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        0,
        vec![hero("1", "0xa", json!("100")), hero("2", "0xb", json!("200"))],
    )
    .await;
    mount_page(&server, 2, vec![hero("3", "0xc", json!("300"))]).await;

    let client = client_for(&server, &[]);
    let (heroes, stats) = client.fetch_listings().await.unwrap();

    let ids: Vec<&str> = heroes.iter().map(|h| h.id.as_str()).collect();
    assert_eq!(ids, ["1", "2", "3"]);
    assert_eq!(stats.api_total, 3);
    assert_eq!(stats.qualified, 3);
    assert_eq!(heroes[0].traits.text(hero_market::types::TraitKey::Class), "Warrior");
}

#[tokio::test]
async fn screens_out_viewer_and_unlisted_heroes() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        0,
        vec![hero("1", "0xViewer", json!("100")), hero("2", "0xb", Value::Null)],
    )
    .await;
    mount_page(&server, 2, vec![hero("0", "0xb", json!("5"))]).await;

    let client = client_for(&server, &[("VIEWER_ADDRESS", "0xviewer")]);
    let (heroes, stats) = client.fetch_listings().await.unwrap();

    assert!(heroes.is_empty());
    assert_eq!(stats.rejected_own, 1);
    assert_eq!(stats.rejected_not_for_sale, 1);
    assert_eq!(stats.rejected_zero_id, 1);
}

#[tokio::test]
async fn stops_at_listing_cap() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        0,
        vec![hero("1", "0xa", json!("1")), hero("2", "0xa", json!("1"))],
    )
    .await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_partial_json(json!({ "variables": { "skip": 2, "first": 1 } })))
        .respond_with(heroes_page(vec![hero("3", "0xa", json!("1"))]))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, &[("MAX_LISTINGS", "3")]);
    let (heroes, _) = client.fetch_listings().await.unwrap();
    assert_eq!(heroes.len(), 3);
}

// ── Failures ────────────────────────────────────────────────────

#[tokio::test]
async fn graphql_errors_surface_as_indexer_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "errors": [{ "message": "query too complex" }]
        })))
        .mount(&server)
        .await;

    let client = client_for(&server, &[]);
    match client.fetch_listings().await {
        Err(AppError::Indexer(msg)) => assert_eq!(msg, "query too complex"),
        other => panic!("expected indexer error, got {other:?}"),
    }
}

#[tokio::test]
async fn http_failure_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let client = client_for(&server, &[]);
    assert!(matches!(client.fetch_listings().await, Err(AppError::Http(_))));
}

// ── Owned heroes ────────────────────────────────────────────────

#[tokio::test]
async fn owned_query_uses_lowercase_owner() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_partial_json(json!({ "variables": { "where": { "owner": "0xabcdef" } } })))
        .respond_with(heroes_page(vec![
            hero("10", "0xabcdef", Value::Null),
            hero("11", "0xabcdef", json!("900")),
        ]))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, &[("INDEXER_PAGE_SIZE", "3")]);
    let owned = client.fetch_owned("0xABCDEF").await.unwrap();
    assert_eq!(owned.len(), 2);
    assert!(!owned[0].is_for_sale);
    assert!(owned[1].is_for_sale);
}
