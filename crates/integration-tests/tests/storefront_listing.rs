//! Collection pagination, counting, and search.

use reqwest::StatusCode;
use serde_json::Value;
use vdubs_integration_tests::{CATALOG_SIZE, TestApp, product};

fn ids(page: &Value) -> Vec<String> {
    page["products"]
        .as_array()
        .map(Vec::as_slice)
        .unwrap_or_default()
        .iter()
        .filter_map(|p| p["id"].as_str().map(str::to_string))
        .collect()
}

fn afters(app: &TestApp, operation: &str) -> Vec<Option<String>> {
    app.shopify
        .calls_for(operation)
        .into_iter()
        .map(|call| call.variables["after"].as_str().map(str::to_string))
        .collect()
}

#[tokio::test]
async fn test_first_page_of_collection() {
    let app = TestApp::spawn().await;

    let (status, page) = app.get_json("/api/collections/all/products").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&page).len(), 24);
    assert_eq!(ids(&page).first(), Some(&product(1)));
    assert_eq!(page["pageInfo"]["hasNextPage"], true);
    assert_eq!(page["pageInfo"]["endCursor"], "cursor-24");

    let call = app.shopify.calls_for("GetCollectionProducts").remove(0);
    assert_eq!(call.variables["sortKey"], "CREATED");
    assert_eq!(call.variables["reverse"], true);
    assert_eq!(call.variables["first"], 24);
}

#[tokio::test]
async fn test_page_jump_walks_once_then_uses_cached_cursors() {
    let app = TestApp::spawn().await;

    let (status, page) = app.get_json("/api/collections/all/products?page=3").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&page).len(), CATALOG_SIZE - 48);
    assert_eq!(ids(&page).first(), Some(&product(49)));
    assert_eq!(page["pageInfo"]["hasNextPage"], false);
    assert_eq!(
        afters(&app, "GetCollectionProducts"),
        [None, Some("cursor-24".to_string()), Some("cursor-48".to_string())]
    );

    app.shopify.clear_calls();
    let (status, page) = app.get_json("/api/collections/all/products?page=2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&page).first(), Some(&product(25)));
    assert_eq!(
        afters(&app, "GetCollectionProducts"),
        [Some("cursor-24".to_string())]
    );
}

#[tokio::test]
async fn test_cursors_are_scoped_to_sort_order() {
    let app = TestApp::spawn().await;

    app.get_json("/api/collections/all/products?page=2").await;
    app.shopify.clear_calls();

    let (status, _) = app
        .get_json("/api/collections/all/products?page=2&sortKey=PRICE&reverse=false")
        .await;
    assert_eq!(status, StatusCode::OK);

    let calls = app.shopify.calls_for("GetCollectionProducts");
    assert_eq!(calls.len(), 2);
    assert!(calls.iter().all(|c| c.variables["sortKey"] == "PRICE"));
    assert!(calls.iter().all(|c| c.variables["reverse"] == false));
}

#[tokio::test]
async fn test_explicit_cursor_is_passed_through() {
    let app = TestApp::spawn().await;

    let (status, page) = app
        .get_json("/api/collections/all/products?after=cursor-10&page=7")
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&page).first(), Some(&product(11)));
    assert_eq!(
        afters(&app, "GetCollectionProducts"),
        [Some("cursor-10".to_string())]
    );
}

#[tokio::test]
async fn test_page_past_the_end_returns_last_page() {
    let app = TestApp::spawn().await;

    let (status, page) = app.get_json("/api/collections/all/products?page=9").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&page).len(), CATALOG_SIZE - 48);
    assert_eq!(ids(&page).first(), Some(&product(49)));
    assert_eq!(page["pageInfo"]["hasNextPage"], false);
    assert_eq!(
        afters(&app, "GetCollectionProducts"),
        [None, Some("cursor-24".to_string()), Some("cursor-48".to_string())]
    );
}

#[tokio::test]
async fn test_unknown_collection_is_not_found() {
    let app = TestApp::spawn().await;

    let (status, body) = app.get_json("/api/collections/nope/products").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_collection_count_is_cached() {
    let app = TestApp::spawn().await;

    let (status, body) = app.get_json("/api/collections/all/count").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], CATALOG_SIZE);
    let first_calls = app.shopify.calls_for("CountCollectionProducts").len();
    assert!(first_calls >= 1);

    let (_, body) = app.get_json("/api/collections/all/count").await;
    assert_eq!(body["count"], CATALOG_SIZE);
    assert_eq!(app.shopify.calls_for("CountCollectionProducts").len(), first_calls);

    let (status, body) = app.get_json("/api/collections/nope/count").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 0);
}

#[tokio::test]
async fn test_search_requires_query() {
    let app = TestApp::spawn().await;

    let (status, body) = app.get_json("/api/search/products?q=%20").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Query parameter q is required");
    assert!(app.shopify.calls().is_empty());
}

#[tokio::test]
async fn test_search_pages_and_filters() {
    let app = TestApp::spawn().await;

    let (status, page) = app.get_json("/api/search/products?q=card").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["totalCount"], CATALOG_SIZE);
    assert_eq!(ids(&page).len(), 24);
    assert_eq!(page["productFilters"][0]["label"], "Availability");

    let call = app.shopify.calls_for("SearchProducts").remove(0);
    assert_eq!(call.variables["query"], "card");
    assert_eq!(call.variables["sortKey"], "RELEVANCE");
    assert_eq!(call.variables["reverse"], false);

    let (status, page) = app.get_json("/api/search/products?q=card%201&page=1").await;
    assert_eq!(status, StatusCode::OK);
    // "Card 1" and "Card 10" through "Card 19"
    assert_eq!(page["totalCount"], 11);
}

#[tokio::test]
async fn test_wishlist_products() {
    let app = TestApp::spawn().await;

    let query = format!(
        "/api/wishlist-products?ids={},{},gid%3A%2F%2Fshopify%2FProduct%2F999",
        product(3).replace('/', "%2F").replace(':', "%3A"),
        product(7).replace('/', "%2F").replace(':', "%3A"),
    );
    let (status, body) = app.get_json(&query).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&body), [product(3), product(7)]);

    let (status, body) = app.get_json("/api/wishlist-products").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["products"], serde_json::json!([]));
    assert_eq!(app.shopify.calls_for("GetProductsByIds").len(), 1);
}
