//! HTTP route handlers for the storefront API.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                                 - Liveness check
//! GET  /health/ready                           - Readiness check
//!
//! # Cart
//! GET  /api/cart?cartId=                       - Fetch a cart
//! POST /api/cart                               - Reconcile a local cart with Shopify
//!
//! # Catalog
//! GET  /api/collections/{handle}/products      - Paginated collection products
//! GET  /api/collections/{handle}/count         - Collection product count
//! GET  /api/search/products?q=                 - Paginated product search
//! GET  /api/wishlist-products?ids=             - Products by ID
//!
//! # Content
//! GET  /api/menu[?debug=1]                     - Main navigation
//! GET  /api/events                             - All events
//! GET  /api/events/upcoming[?limit=]           - Next upcoming events
//! GET  /api/events/split                       - Upcoming and past events
//! GET  /api/home                               - Home page settings
//!
//! # Newsletter
//! POST /api/newsletter                         - Subscribe an email
//! ```

pub mod cart;
pub mod collections;
pub mod content;
pub mod listing;
pub mod menu;
pub mod newsletter;
pub mod search;
pub mod wishlist;

use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

/// Read-only catalog and content routes.
pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/api/cart", get(cart::show))
        .route(
            "/api/collections/{handle}/products",
            get(collections::products),
        )
        .route("/api/collections/{handle}/count", get(collections::count))
        .route("/api/search/products", get(search::products))
        .route("/api/wishlist-products", get(wishlist::products))
        .route("/api/menu", get(menu::show))
        .route("/api/events", get(content::list_events))
        .route("/api/events/upcoming", get(content::upcoming_events))
        .route("/api/events/split", get(content::split_events))
        .route("/api/home", get(content::home_settings))
}

/// Routes that write to Shopify or the newsletter provider.
pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/api/cart", post(cart::sync))
        .route("/api/newsletter", post(newsletter::subscribe))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new().merge(read_routes()).merge(write_routes())
}
