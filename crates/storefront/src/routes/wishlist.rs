//! Wishlist product lookup.

use axum::{
    Json,
    extract::{RawQuery, State},
};
use serde::Serialize;
use tracing::{instrument, warn};
use vdubs_core::ProductId;

use crate::shopify::ProductSummary;
use crate::state::AppState;

#[derive(Debug, Default, Serialize)]
pub struct WishlistResponse {
    pub products: Vec<ProductSummary>,
}

/// `GET /api/wishlist-products?ids=`
///
/// Accepts repeated `ids` parameters or one comma-separated value. Best
/// effort: failures and timeouts return an empty list.
#[instrument(skip(state, query))]
pub async fn products(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
) -> Json<WishlistResponse> {
    let ids = parse_ids(query.as_deref().unwrap_or_default());
    if ids.is_empty() {
        return Json(WishlistResponse::default());
    }

    let timeout = state.config().tuning.listing_fetch_timeout;
    let lookup = state.storefront().get_products_by_ids(&ids);

    let products = match tokio::time::timeout(timeout, lookup).await {
        Ok(Ok(products)) => products,
        Ok(Err(e)) => {
            warn!(error = %e, count = ids.len(), "Failed to fetch wishlist products");
            Vec::new()
        }
        Err(_) => {
            warn!(count = ids.len(), "Wishlist product fetch timed out");
            Vec::new()
        }
    };

    Json(WishlistResponse { products })
}

fn parse_ids(query: &str) -> Vec<ProductId> {
    let values: Vec<String> = url::form_urlencoded::parse(query.as_bytes())
        .filter(|(key, _)| key == "ids")
        .map(|(_, value)| value.into_owned())
        .collect();

    let raw: Vec<&str> = match values.as_slice() {
        [single] => single.split(',').collect(),
        many => many.iter().map(String::as_str).collect(),
    };

    raw.into_iter()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(ProductId::from)
        .collect()
}
