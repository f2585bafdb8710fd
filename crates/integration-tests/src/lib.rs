//! Integration tests for the VDubs Cards storefront API.
//!
//! Each test spawns the real router on an ephemeral port, wired to in-process
//! mocks of Shopify (Storefront GraphQL), Sanity (GROQ over HTTP) and Brevo.
//! No network access or credentials are needed.
//!
//! ```bash
//! cargo test -p vdubs-integration-tests
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use secrecy::SecretString;
use serde_json::{Value, json};
use vdubs_storefront::config::{
    NewsletterConfig, SanityConfig, ShopifyStorefrontConfig, StorefrontConfig, TuningConfig,
};
use vdubs_storefront::content::SanityClient;
use vdubs_storefront::services::newsletter::NewsletterClient;
use vdubs_storefront::state::AppState;

/// Products in the mock `all` collection.
pub const CATALOG_SIZE: usize = 60;

/// API key the mock Brevo server accepts.
pub const BREVO_KEY: &str = "xkeysib-integration-test";

/// Brevo list the storefront subscribes to.
pub const BREVO_LIST: i64 = 7;

/// Bind `router` to an ephemeral local port and return its base URL.
async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let addr = listener.local_addr().expect("Listener has no address");

    tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });

    format!("http://{addr}")
}

fn lock<T>(mutex: &Arc<Mutex<T>>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

// =============================================================================
// Shopify
// =============================================================================

/// One GraphQL request received by the mock Shopify server.
#[derive(Debug, Clone)]
pub struct ShopifyCall {
    pub operation: String,
    pub variables: Value,
    pub with_token: bool,
}

#[derive(Debug, Clone)]
struct MockLine {
    id: String,
    variant_id: String,
    quantity: i64,
}

#[derive(Debug, Default)]
struct ShopifyState {
    carts: HashMap<String, Vec<MockLine>>,
    menus: HashMap<String, Value>,
    next_id: u64,
    calls: Vec<ShopifyCall>,
    conflicts_remaining: u32,
}

/// In-memory Shopify Storefront API.
///
/// Serves a 60-product `all` collection, carts, and whatever menus a test
/// installs. Cursors are `cursor-<n>` where `n` is the index after the last
/// product on the page.
#[derive(Clone, Default)]
pub struct MockShopify {
    state: Arc<Mutex<ShopifyState>>,
}

impl MockShopify {
    fn router(&self) -> Router {
        Router::new()
            .route("/graphql", post(shopify_graphql))
            .with_state(self.clone())
    }

    /// Every request received so far.
    #[must_use]
    pub fn calls(&self) -> Vec<ShopifyCall> {
        lock(&self.state).calls.clone()
    }

    /// Requests received so far for one operation.
    #[must_use]
    pub fn calls_for(&self, operation: &str) -> Vec<ShopifyCall> {
        self.calls()
            .into_iter()
            .filter(|call| call.operation == operation)
            .collect()
    }

    /// Forget recorded requests.
    pub fn clear_calls(&self) {
        lock(&self.state).calls.clear();
    }

    /// Reject the next `count` line mutations with a `CONFLICT` user error.
    pub fn fail_next_mutations_with_conflict(&self, count: u32) {
        lock(&self.state).conflicts_remaining = count;
    }

    /// Install a menu under `handle`. `items` uses the Storefront API shape.
    pub fn set_menu(&self, handle: &str, items: Value) {
        lock(&self.state).menus.insert(
            handle.to_string(),
            json!({ "handle": handle, "title": "Main menu", "items": items }),
        );
    }

    /// Current `(variant, quantity)` pairs of a cart.
    #[must_use]
    pub fn cart_lines(&self, cart_id: &str) -> Option<Vec<(String, i64)>> {
        lock(&self.state).carts.get(cart_id).map(|lines| {
            lines
                .iter()
                .map(|line| (line.variant_id.clone(), line.quantity))
                .collect()
        })
    }
}

/// Product number encoded in a product or variant GID.
fn product_number(gid: &str) -> Option<usize> {
    let n = gid
        .strip_prefix("gid://shopify/Product/")
        .or_else(|| gid.strip_prefix("gid://shopify/ProductVariant/"))?
        .parse::<usize>()
        .ok()?;
    (1..=CATALOG_SIZE).contains(&n).then_some(n)
}

fn money(amount: &str) -> Value {
    json!({ "amount": amount, "currencyCode": "EUR" })
}

fn product_card(n: usize) -> Value {
    json!({
        "__typename": "Product",
        "id": format!("gid://shopify/Product/{n}"),
        "handle": format!("card-{n}"),
        "title": format!("Card {n}"),
        "vendor": "VDubs",
        "availableForSale": n % 10 != 0,
        "featuredImage": null,
        "priceRange": {
            "minVariantPrice": money("4.95"),
            "maxVariantPrice": money("4.95"),
        },
        "compareAtPriceRange": null,
        "variants": { "edges": [{ "node": { "id": format!("gid://shopify/ProductVariant/{n}") } }] },
    })
}

/// Slice `numbers` into one page starting after `after`.
fn page_of(numbers: &[usize], after: Option<&str>, first: usize) -> (Vec<usize>, Value) {
    let start = after
        .and_then(|c| c.strip_prefix("cursor-"))
        .and_then(|n| n.parse::<usize>().ok())
        .unwrap_or(0)
        .min(numbers.len());
    let end = (start + first).min(numbers.len());
    let items = numbers.get(start..end).unwrap_or_default().to_vec();

    let page_info = json!({
        "hasNextPage": end < numbers.len(),
        "hasPreviousPage": start > 0,
        "startCursor": (start < end).then(|| format!("cursor-{}", start + 1)),
        "endCursor": (start < end).then(|| format!("cursor-{end}")),
    });

    (items, page_info)
}

fn str_var<'a>(variables: &'a Value, key: &str) -> Option<&'a str> {
    variables.get(key).and_then(Value::as_str)
}

fn first_var(variables: &Value) -> usize {
    variables
        .get("first")
        .and_then(Value::as_u64)
        .and_then(|n| usize::try_from(n).ok())
        .unwrap_or(250)
}

async fn shopify_graphql(
    State(mock): State<MockShopify>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    let operation = str_var(&body, "operationName").unwrap_or_default().to_string();
    let variables = body.get("variables").cloned().unwrap_or(Value::Null);

    let mut state = lock(&mock.state);
    state.calls.push(ShopifyCall {
        operation: operation.clone(),
        variables: variables.clone(),
        with_token: headers.contains_key("x-shopify-storefront-access-token"),
    });

    let data = match operation.as_str() {
        "GetCollectionProducts" => collection_products(&variables),
        "CountCollectionProducts" => count_products(&variables),
        "SearchProducts" => search_products(&variables),
        "GetProductsByIds" => products_by_ids(&variables),
        "GetMenu" => {
            let menu = str_var(&variables, "handle").and_then(|h| state.menus.get(h).cloned());
            json!({ "menu": menu })
        }
        "GetCart" => {
            let cart = str_var(&variables, "cartId").and_then(|id| cart_json(&state, id));
            json!({ "cart": cart })
        }
        "CreateCart" => {
            let lines = variables
                .pointer("/input/lines")
                .cloned()
                .unwrap_or_default();
            json!({ "cartCreate": state.create_cart(&lines) })
        }
        "AddCartLines" | "UpdateCartLines" | "RemoveCartLines" => {
            let field = match operation.as_str() {
                "AddCartLines" => "cartLinesAdd",
                "UpdateCartLines" => "cartLinesUpdate",
                _ => "cartLinesRemove",
            };
            let mut payload = serde_json::Map::new();
            payload.insert(field.to_string(), state.mutate_cart(&operation, &variables));
            Value::Object(payload)
        }
        _ => {
            return Json(json!({ "errors": [{ "message": format!("Unknown operation {operation}") }] }));
        }
    };

    Json(json!({ "data": data }))
}

fn collection_products(variables: &Value) -> Value {
    if str_var(variables, "handle") != Some("all") {
        return json!({ "collection": null });
    }

    let numbers: Vec<usize> = (1..=CATALOG_SIZE).collect();
    let (items, page_info) = page_of(&numbers, str_var(variables, "after"), first_var(variables));
    let edges: Vec<Value> = items.into_iter().map(|n| json!({ "node": product_card(n) })).collect();

    json!({
        "collection": {
            "id": "gid://shopify/Collection/1",
            "products": { "edges": edges, "pageInfo": page_info },
        }
    })
}

fn count_products(variables: &Value) -> Value {
    if str_var(variables, "handle") != Some("all") {
        return json!({ "collection": null });
    }

    let numbers: Vec<usize> = (1..=CATALOG_SIZE).collect();
    let (items, page_info) = page_of(&numbers, str_var(variables, "after"), first_var(variables));
    let edges: Vec<Value> = items
        .into_iter()
        .map(|n| json!({ "node": { "id": format!("gid://shopify/Product/{n}") } }))
        .collect();

    json!({ "collection": { "products": { "edges": edges, "pageInfo": page_info } } })
}

fn search_products(variables: &Value) -> Value {
    let query = str_var(variables, "query").unwrap_or_default().to_lowercase();
    let numbers: Vec<usize> = (1..=CATALOG_SIZE)
        .filter(|n| format!("card {n}").contains(&query))
        .collect();
    let (items, page_info) = page_of(&numbers, str_var(variables, "after"), first_var(variables));
    let edges: Vec<Value> = items.into_iter().map(|n| json!({ "node": product_card(n) })).collect();

    json!({
        "search": {
            "totalCount": numbers.len(),
            "productFilters": [{
                "id": "filter.v.availability",
                "label": "Availability",
                "type": "LIST",
                "values": [{
                    "id": "filter.v.availability.1",
                    "label": "In stock",
                    "count": numbers.len(),
                    "input": "{\"available\":true}",
                }],
            }],
            "edges": edges,
            "pageInfo": page_info,
        }
    })
}

fn products_by_ids(variables: &Value) -> Value {
    let nodes: Vec<Value> = variables
        .get("ids")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
        .iter()
        .filter_map(Value::as_str)
        .map(|id| match product_number(id) {
            Some(n) if id.contains("/Product/") => product_card(n),
            Some(_) => json!({ "__typename": "ProductVariant", "id": id }),
            None => Value::Null,
        })
        .collect();

    json!({ "nodes": nodes })
}

fn cart_json(state: &ShopifyState, cart_id: &str) -> Option<Value> {
    let lines = state.carts.get(cart_id)?;
    let total: i64 = lines.iter().map(|line| line.quantity).sum();

    let edges: Vec<Value> = lines
        .iter()
        .map(|line| {
            let n = product_number(&line.variant_id).unwrap_or_default();
            json!({
                "node": {
                    "id": line.id,
                    "quantity": line.quantity,
                    "merchandise": {
                        "id": line.variant_id,
                        "title": "Default Title",
                        "image": null,
                        "price": money("4.95"),
                        "product": { "title": format!("Card {n}"), "handle": format!("card-{n}") },
                    },
                }
            })
        })
        .collect();

    Some(json!({
        "id": cart_id,
        "checkoutUrl": checkout_url(cart_id),
        "totalQuantity": total,
        "cost": { "subtotalAmount": money("0.00"), "totalAmount": money("0.00") },
        "lines": { "edges": edges },
    }))
}

fn checkout_url(cart_id: &str) -> String {
    let token = cart_id.rsplit('/').next().unwrap_or_default();
    format!("https://shop.vdubscards.test/cart/c/{token}")
}

fn user_error(message: &str, code: &str) -> Value {
    json!({ "cart": null, "userErrors": [{ "field": null, "message": message, "code": code }] })
}

impl ShopifyState {
    fn next_id(&mut self, kind: &str) -> String {
        self.next_id += 1;
        format!("gid://shopify/{kind}/{}", self.next_id)
    }

    fn new_lines(&mut self, inputs: &Value) -> Vec<MockLine> {
        inputs
            .as_array()
            .map(Vec::as_slice)
            .unwrap_or_default()
            .iter()
            .map(|input| MockLine {
                id: self.next_id("CartLine"),
                variant_id: str_var(input, "merchandiseId").unwrap_or_default().to_string(),
                quantity: input.get("quantity").and_then(Value::as_i64).unwrap_or(1),
            })
            .collect()
    }

    fn create_cart(&mut self, inputs: &Value) -> Value {
        let lines = self.new_lines(inputs);
        if let Some(line) = lines.iter().find(|l| product_number(&l.variant_id).is_none()) {
            return user_error(
                &format!("The merchandise with id {} does not exist.", line.variant_id),
                "INVALID_MERCHANDISE_LINE",
            );
        }

        let id = self.next_id("Cart");
        self.carts.insert(id.clone(), lines);
        json!({ "cart": { "id": id, "checkoutUrl": checkout_url(&id) }, "userErrors": [] })
    }

    fn mutate_cart(&mut self, operation: &str, variables: &Value) -> Value {
        if self.conflicts_remaining > 0 {
            self.conflicts_remaining -= 1;
            return user_error("The cart was modified by another request", "CONFLICT");
        }

        let Some(cart_id) = str_var(variables, "cartId").map(str::to_string) else {
            return user_error("Cart id is required", "INVALID");
        };
        if !self.carts.contains_key(&cart_id) {
            return user_error("The specified cart does not exist.", "INVALID");
        }

        let added = match operation {
            "AddCartLines" => self.new_lines(variables.get("lines").unwrap_or(&Value::Null)),
            _ => Vec::new(),
        };

        let Some(lines) = self.carts.get_mut(&cart_id) else {
            return user_error("The specified cart does not exist.", "INVALID");
        };

        match operation {
            "AddCartLines" => lines.extend(added),
            "UpdateCartLines" => {
                for update in variables
                    .get("lines")
                    .and_then(Value::as_array)
                    .map(Vec::as_slice)
                    .unwrap_or_default()
                {
                    let quantity = update.get("quantity").and_then(Value::as_i64).unwrap_or(0);
                    let id = str_var(update, "id");
                    if let Some(line) = lines.iter_mut().find(|l| Some(l.id.as_str()) == id) {
                        line.quantity = quantity;
                    }
                }
                lines.retain(|line| line.quantity > 0);
            }
            _ => {
                let removed: HashSet<&str> = variables
                    .get("lineIds")
                    .and_then(Value::as_array)
                    .map(Vec::as_slice)
                    .unwrap_or_default()
                    .iter()
                    .filter_map(Value::as_str)
                    .collect();
                lines.retain(|line| !removed.contains(line.id.as_str()));
            }
        }

        json!({ "cart": { "id": cart_id, "checkoutUrl": checkout_url(&cart_id) }, "userErrors": [] })
    }
}

// =============================================================================
// Sanity
// =============================================================================

#[derive(Debug, Default)]
struct SanityState {
    events: Value,
    home: Value,
    queries: usize,
}

/// In-memory Sanity query API.
#[derive(Clone, Default)]
pub struct MockSanity {
    state: Arc<Mutex<SanityState>>,
}

impl MockSanity {
    fn router(&self) -> Router {
        Router::new()
            .route("/v1/data/query/{dataset}", get(sanity_query))
            .with_state(self.clone())
    }

    /// Documents returned for the events query.
    pub fn set_events(&self, events: Value) {
        lock(&self.state).events = events;
    }

    /// Document returned for the homepage query.
    pub fn set_home(&self, home: Value) {
        lock(&self.state).home = home;
    }

    /// Number of queries served.
    #[must_use]
    pub fn query_count(&self) -> usize {
        lock(&self.state).queries
    }
}

async fn sanity_query(
    State(mock): State<MockSanity>,
    Path(dataset): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if dataset != "production" {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": { "description": "Dataset not found" } })),
        )
            .into_response();
    }

    let groq = params.get("query").map(String::as_str).unwrap_or_default();
    let mut state = lock(&mock.state);
    state.queries += 1;

    let result = if groq.contains(r#"_type == "event""#) {
        state.events.clone()
    } else if groq.contains(r#"_type == "countdown""#) {
        state.home.clone()
    } else {
        Value::Null
    };

    Json(json!({ "ms": 1, "query": groq, "result": result })).into_response()
}

// =============================================================================
// Brevo
// =============================================================================

#[derive(Debug, Default)]
struct BrevoState {
    contacts: HashSet<String>,
    blocked: HashSet<String>,
    requests: Vec<String>,
}

/// In-memory Brevo contacts API.
#[derive(Clone, Default)]
pub struct MockBrevo {
    state: Arc<Mutex<BrevoState>>,
}

impl MockBrevo {
    fn router(&self) -> Router {
        Router::new()
            .route("/contacts", post(brevo_create_contact))
            .route("/contacts/lists/{list}/contacts/add", post(brevo_add_to_list))
            .with_state(self.clone())
    }

    /// Register an existing contact.
    pub fn add_contact(&self, email: &str) {
        lock(&self.state).contacts.insert(email.to_string());
    }

    /// Make every request for `email` fail.
    pub fn block(&self, email: &str) {
        lock(&self.state).blocked.insert(email.to_string());
    }

    /// Paths requested so far.
    #[must_use]
    pub fn requests(&self) -> Vec<String> {
        lock(&self.state).requests.clone()
    }

    /// Whether `email` is a known contact.
    #[must_use]
    pub fn has_contact(&self, email: &str) -> bool {
        lock(&self.state).contacts.contains(email)
    }
}

fn brevo_authorized(headers: &HeaderMap) -> bool {
    headers.get("api-key").and_then(|v| v.to_str().ok()) == Some(BREVO_KEY)
}

fn brevo_error(status: StatusCode, code: &str, message: &str) -> Response {
    (status, Json(json!({ "code": code, "message": message }))).into_response()
}

async fn brevo_create_contact(
    State(mock): State<MockBrevo>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let mut state = lock(&mock.state);
    state.requests.push("/contacts".to_string());

    if !brevo_authorized(&headers) {
        return brevo_error(StatusCode::UNAUTHORIZED, "unauthorized", "Key not found");
    }

    let email = str_var(&body, "email").unwrap_or_default().to_string();
    if state.blocked.contains(&email) {
        return brevo_error(StatusCode::BAD_REQUEST, "invalid_parameter", "Contact is blacklisted");
    }
    if !state.contacts.insert(email) {
        return brevo_error(StatusCode::BAD_REQUEST, "duplicate_parameter", "Contact already exist");
    }

    (StatusCode::CREATED, Json(json!({ "id": state.contacts.len() }))).into_response()
}

async fn brevo_add_to_list(
    State(mock): State<MockBrevo>,
    Path(list): Path<i64>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let mut state = lock(&mock.state);
    state.requests.push(format!("/contacts/lists/{list}/contacts/add"));

    if !brevo_authorized(&headers) {
        return brevo_error(StatusCode::UNAUTHORIZED, "unauthorized", "Key not found");
    }

    let emails: Vec<String> = body
        .get("emails")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
        .iter()
        .filter_map(Value::as_str)
        .map(str::to_string)
        .collect();

    if emails.iter().any(|email| state.blocked.contains(email)) {
        return brevo_error(StatusCode::BAD_REQUEST, "invalid_parameter", "Contact is blacklisted");
    }

    (StatusCode::CREATED, Json(json!({ "contacts": { "success": emails, "failure": [] } })))
        .into_response()
}

// =============================================================================
// Test application
// =============================================================================

/// Which optional integrations a test app is wired to.
#[derive(Debug, Clone, Copy)]
pub struct Integrations {
    pub sanity: bool,
    pub newsletter: bool,
}

impl Default for Integrations {
    fn default() -> Self {
        Self {
            sanity: true,
            newsletter: true,
        }
    }
}

/// A running storefront API with its upstream mocks.
pub struct TestApp {
    pub base_url: String,
    pub client: reqwest::Client,
    pub shopify: MockShopify,
    pub sanity: MockSanity,
    pub brevo: MockBrevo,
}

impl TestApp {
    /// Spawn the storefront with every integration configured.
    pub async fn spawn() -> Self {
        Self::spawn_with(Integrations::default()).await
    }

    /// Spawn the storefront with only Shopify configured.
    pub async fn spawn_shopify_only() -> Self {
        Self::spawn_with(Integrations {
            sanity: false,
            newsletter: false,
        })
        .await
    }

    /// Spawn the storefront with the chosen integrations.
    pub async fn spawn_with(integrations: Integrations) -> Self {
        let shopify = MockShopify::default();
        let sanity = MockSanity::default();
        let brevo = MockBrevo::default();

        let shopify_url = serve(shopify.router()).await;
        let sanity_url = serve(sanity.router()).await;
        let brevo_url = serve(brevo.router()).await;

        let sanity_config = SanityConfig {
            project_id: "vdubs-test".to_string(),
            dataset: "production".to_string(),
            api_version: "1".to_string(),
            use_cdn: false,
        };
        let newsletter_config = NewsletterConfig {
            api_key: SecretString::from(BREVO_KEY),
            list_id: BREVO_LIST,
        };

        let config = StorefrontConfig {
            host: [127, 0, 0, 1].into(),
            port: 0,
            shopify: ShopifyStorefrontConfig {
                endpoint: format!("{shopify_url}/graphql"),
                access_token: None,
            },
            sanity: integrations.sanity.then(|| sanity_config.clone()),
            newsletter: integrations.newsletter.then(|| newsletter_config.clone()),
            tuning: TuningConfig {
                cursor_cache_ttl: Duration::from_secs(300),
                listing_fetch_timeout: Duration::from_secs(5),
                cart_retry_attempts: 3,
                cart_retry_base_delay: Duration::from_millis(5),
            },
            sentry_dsn: None,
            sentry_environment: None,
            log_json: false,
        };

        let sanity_client = integrations
            .sanity
            .then(|| SanityClient::new(&sanity_config).with_base_url(format!("{sanity_url}/v1")));
        let newsletter_client = integrations.newsletter.then(|| {
            NewsletterClient::new(&newsletter_config)
                .expect("Failed to build newsletter client")
                .with_base_url(brevo_url)
        });

        let state = AppState::with_clients(config, sanity_client, newsletter_client);
        let base_url = serve(vdubs_storefront::app(state)).await;

        Self {
            base_url,
            client: reqwest::Client::new(),
            shopify,
            sanity,
            brevo,
        }
    }

    /// Absolute URL for `path`.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// GET `path` and return status and JSON body.
    pub async fn get_json(&self, path: &str) -> (reqwest::StatusCode, Value) {
        let response = self
            .client
            .get(self.url(path))
            .send()
            .await
            .expect("Request failed");
        let status = response.status();
        (status, response.json().await.unwrap_or(Value::Null))
    }

    /// POST `body` as JSON to `path` and return status and JSON body.
    pub async fn post_json(&self, path: &str, body: &Value) -> (reqwest::StatusCode, Value) {
        let response = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .expect("Request failed");
        let status = response.status();
        (status, response.json().await.unwrap_or(Value::Null))
    }
}

/// Variant GID for catalog product `n`.
#[must_use]
pub fn variant(n: usize) -> String {
    format!("gid://shopify/ProductVariant/{n}")
}

/// Product GID for catalog product `n`.
#[must_use]
pub fn product(n: usize) -> String {
    format!("gid://shopify/Product/{n}")
}
