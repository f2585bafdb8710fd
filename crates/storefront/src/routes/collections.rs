//! Collection listing endpoints.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Serialize;
use tracing::instrument;

use super::listing::{ListingParams, fetch_page};
use crate::error::Result;
use crate::pagination::CursorKey;
use crate::shopify::ProductPage;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct CountResponse {
    pub count: usize,
}

/// `GET /api/collections/{handle}/products`
///
/// `page=N` (without `after`) jumps to page N through the cursor cache;
/// `after` fetches the page following that cursor.
#[instrument(skip(state, params), fields(handle = %handle))]
pub async fn products(
    State(state): State<AppState>,
    Path(handle): Path<String>,
    Query(params): Query<ListingParams>,
) -> Result<Json<ProductPage>> {
    let listing = params.collection_listing();
    let key = CursorKey::new(&handle, &listing);
    let client = state.storefront();

    let page = fetch_page(
        state.cursors(),
        &key,
        &params,
        state.config().tuning.listing_fetch_timeout,
        |after| client.get_collection_products(&handle, &listing, after),
    )
    .await?;

    Ok(Json(page))
}

/// `GET /api/collections/{handle}/count`
///
/// Best effort: failures report zero.
#[instrument(skip(state, params), fields(handle = %handle))]
pub async fn count(
    State(state): State<AppState>,
    Path(handle): Path<String>,
    Query(params): Query<ListingParams>,
) -> Json<CountResponse> {
    let listing = params.collection_listing();
    let key = CursorKey::new(&handle, &listing);

    let count = state
        .counts()
        .get_or_count(
            &key,
            state.storefront().count_collection_products(&handle, &listing),
        )
        .await;

    Json(CountResponse { count })
}
