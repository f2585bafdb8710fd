//! Navigation menu endpoint.

use axum::{
    Json,
    extract::{Query, State},
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::menu::{NavLink, main_menu};
use crate::shopify::Menu;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct MenuQuery {
    pub debug: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuResponse {
    pub menu_items: Vec<NavLink>,
    #[serde(flatten)]
    pub debug: Option<MenuDebug>,
}

/// Extra fields returned with `debug=1`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuDebug {
    pub raw_shopify_menu: Option<Menu>,
    pub total_item_count: usize,
}

/// `GET /api/menu[?debug=1]`
///
/// Never fails: without a usable Shopify menu the default navigation is
/// returned.
#[instrument(skip(state, query))]
pub async fn show(
    State(state): State<AppState>,
    Query(query): Query<MenuQuery>,
) -> Json<MenuResponse> {
    let menu = main_menu(state.storefront()).await;

    let debug = (query.debug.as_deref() == Some("1")).then(|| MenuDebug {
        total_item_count: menu.total_item_count(),
        raw_shopify_menu: menu.raw.clone(),
    });

    Json(MenuResponse {
        menu_items: menu.links,
        debug,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_fields_flatten_into_response() {
        let response = MenuResponse {
            menu_items: Vec::new(),
            debug: Some(MenuDebug {
                raw_shopify_menu: None,
                total_item_count: 0,
            }),
        };
        let json = serde_json::to_value(&response).unwrap();
        assert!(json.get("rawShopifyMenu").unwrap().is_null());
        assert_eq!(json["totalItemCount"], 0);

        let plain = MenuResponse {
            menu_items: Vec::new(),
            debug: None,
        };
        let json = serde_json::to_value(&plain).unwrap();
        assert_eq!(json, serde_json::json!({ "menuItems": [] }));
    }
}
