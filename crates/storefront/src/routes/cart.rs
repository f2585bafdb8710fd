//! Cart endpoints.
//!
//! The browser holds the desired line list and posts all of it on every
//! change; the server converges the Shopify cart to match.

use axum::{
    Json,
    body::Bytes,
    extract::{Query, State},
};
use serde::Deserialize;
use tracing::instrument;
use vdubs_core::{CartId, LineItem};

use crate::error::{AppError, Result, add_breadcrumb};
use crate::services::cart::Reconciled;
use crate::shopify::Cart;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartQuery {
    pub cart_id: Option<String>,
}

/// Body of `POST /api/cart`: the complete desired cart contents.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncCartRequest {
    #[serde(default)]
    pub cart_id: Option<String>,
    #[serde(default)]
    pub lines: Vec<LineItem>,
}

impl SyncCartRequest {
    fn cart_id(&self) -> Option<CartId> {
        self.cart_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(CartId::from)
    }
}

/// `GET /api/cart?cartId=`
///
/// Returns the cart, or `null` when Shopify no longer knows it.
#[instrument(skip(state, query))]
pub async fn show(
    State(state): State<AppState>,
    Query(query): Query<CartQuery>,
) -> Result<Json<Option<Cart>>> {
    let cart_id = query
        .cart_id
        .filter(|id| !id.trim().is_empty())
        .map(CartId::from)
        .ok_or_else(|| AppError::BadRequest("cartId is required".to_string()))?;

    let cart = state.storefront().get_cart(&cart_id).await?;
    Ok(Json(cart))
}

/// `POST /api/cart`
///
/// Creates a cart when no `cartId` is given, otherwise reconciles the
/// existing cart to `lines`.
#[instrument(skip(state, body))]
pub async fn sync(State(state): State<AppState>, body: Bytes) -> Result<Json<Reconciled>> {
    let request: SyncCartRequest = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("Invalid JSON: {e}")))?;

    let cart_id = request.cart_id();
    let line_count = request.lines.len().to_string();
    add_breadcrumb(
        "cart",
        if cart_id.is_some() { "Sync cart" } else { "Create cart" },
        Some(&[("line_count", line_count.as_str())]),
    );

    let reconciled = state
        .reconciler()
        .reconcile(cart_id.as_ref(), request.lines)
        .await?;

    Ok(Json(reconciled))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults() {
        let request: SyncCartRequest = serde_json::from_str("{}").unwrap();
        assert!(request.cart_id().is_none());
        assert!(request.lines.is_empty());
    }

    #[test]
    fn test_blank_cart_id_is_none() {
        let request: SyncCartRequest =
            serde_json::from_str(r#"{"cartId": "  ", "lines": []}"#).unwrap();
        assert!(request.cart_id().is_none());
    }

    #[test]
    fn test_parses_lines() {
        let request: SyncCartRequest = serde_json::from_str(
            r#"{"cartId":"gid://shopify/Cart/1","lines":[{"variantId":"gid://shopify/ProductVariant/9","quantity":2}]}"#,
        )
        .unwrap();
        assert_eq!(
            request.cart_id(),
            Some(CartId::new("gid://shopify/Cart/1"))
        );
        assert_eq!(
            request.lines,
            vec![LineItem::new("gid://shopify/ProductVariant/9", 2)]
        );
    }
}
