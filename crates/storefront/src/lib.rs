//! VDubs Cards storefront API.
//!
//! JSON endpoints backing the headless storefront: cart reconciliation
//! against the Shopify Storefront API, cursor-cached collection and search
//! pagination, navigation, Sanity-managed events and home content, and
//! newsletter sign-up.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod content;
pub mod error;
pub mod menu;
pub mod middleware;
pub mod pagination;
pub mod routes;
pub mod services;
pub mod shopify;
pub mod state;

use axum::{
    Json, Router,
    extract::State,
    http::{Method, header},
    routing::get,
};
use serde::Serialize;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;

/// Build the application router.
///
/// Rate limiting is left to the caller so tests can drive the router
/// without proxy headers.
pub fn app(state: AppState) -> Router {
    build(state, routes::read_routes(), routes::write_routes())
}

/// Build the application router with per-client rate limits on every API
/// route.
///
/// Returns `None` if a limiter configuration is rejected.
pub fn rate_limited_app(state: AppState) -> Option<Router> {
    let read = routes::read_routes().layer(middleware::api_rate_limiter()?);
    let write = routes::write_routes().layer(middleware::write_rate_limiter()?);
    Some(build(state, read, write))
}

fn build(state: AppState, read: Router<AppState>, write: Router<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .merge(read)
        .merge(write)
        .layer(axum::middleware::from_fn(
            middleware::security_headers_middleware,
        ))
        .layer(cors)
        .layer(axum::middleware::from_fn(middleware::request_id_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &axum::http::Request<axum::body::Body>| {
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = tracing::field::Empty,
                )
            },
        ))
        .with_state(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}

/// Liveness health check endpoint.
async fn health() -> &'static str {
    "ok"
}

#[derive(Debug, Serialize)]
struct Readiness {
    status: &'static str,
    sanity: bool,
    newsletter: bool,
}

/// Readiness check reporting which optional integrations are configured.
async fn readiness(State(state): State<AppState>) -> Json<Readiness> {
    Json(Readiness {
        status: "ok",
        sanity: state.sanity().is_some(),
        newsletter: state.newsletter().is_some(),
    })
}
