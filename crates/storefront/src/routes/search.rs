//! Product search endpoint.

use axum::{
    Json,
    extract::{Query, State},
};
use serde::Deserialize;
use tracing::instrument;

use super::listing::{ListingParams, fetch_page};
use crate::error::{AppError, Result};
use crate::pagination::CursorKey;
use crate::shopify::SearchPage;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
    #[serde(flatten)]
    pub listing: ListingParams,
}

/// `GET /api/search/products?q=`
#[instrument(skip(state, query))]
pub async fn products(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<SearchPage>> {
    let q = query.q.as_deref().map(str::trim).unwrap_or_default();
    if q.is_empty() {
        return Err(AppError::BadRequest(
            "Query parameter q is required".to_string(),
        ));
    }

    let listing = query.listing.search_listing();
    let key = CursorKey::search(q, &listing);
    let client = state.storefront();

    let page = fetch_page(
        state.cursors(),
        &key,
        &query.listing,
        state.config().tuning.listing_fetch_timeout,
        |after| client.search_products(q, &listing, after),
    )
    .await?;

    Ok(Json(page))
}
