//! Domain types for Shopify Storefront API.
//!
//! These types provide a clean, ergonomic API separate from the raw
//! GraphQL response shapes in `storefront::queries`. They serialize in
//! camelCase because they are handed straight to the browser.

use serde::{Deserialize, Serialize};
use vdubs_core::{CartId, CartLineId, ProductId, VariantId};

// =============================================================================
// Money & Image Types
// =============================================================================

/// Monetary amount with currency code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Money {
    /// Decimal amount as string (preserves precision).
    pub amount: String,
    /// ISO 4217 currency code.
    pub currency_code: String,
}

/// Price range for a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceRange {
    /// Minimum price among all variants.
    pub min_variant_price: Money,
    /// Maximum price among all variants.
    pub max_variant_price: Money,
}

/// Product or variant image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    /// Image URL.
    pub url: String,
    /// Alt text for accessibility.
    pub alt_text: Option<String>,
    /// Image width in pixels.
    pub width: Option<i64>,
    /// Image height in pixels.
    pub height: Option<i64>,
}

// =============================================================================
// Product Listing Types
// =============================================================================

/// A product as shown on listing, search and wishlist grids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSummary {
    pub id: ProductId,
    pub handle: String,
    pub title: String,
    pub vendor: Option<String>,
    pub available_for_sale: bool,
    pub featured_image: Option<Image>,
    pub price_range: PriceRange,
    /// Highest compare-at price, present only when the product is discounted.
    pub compare_at_price: Option<Money>,
    /// First variant, used by quick add-to-cart buttons.
    pub first_variant_id: Option<VariantId>,
}

/// Relay-style pagination info.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub has_next_page: bool,
    pub has_previous_page: bool,
    pub start_cursor: Option<String>,
    pub end_cursor: Option<String>,
}

/// One page of products.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductPage {
    pub products: Vec<ProductSummary>,
    pub page_info: PageInfo,
}

/// A selectable facet value offered by search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterValue {
    pub id: String,
    pub label: String,
    pub count: i64,
    /// JSON-encoded `ProductFilter` to send back when this value is selected.
    pub input: String,
}

/// A search facet (availability, price, vendor, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductFilter {
    pub id: String,
    pub label: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub values: Vec<FilterValue>,
}

/// One page of search results.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchPage {
    pub products: Vec<ProductSummary>,
    pub page_info: PageInfo,
    pub product_filters: Vec<ProductFilter>,
    pub total_count: i64,
}

impl From<SearchPage> for ProductPage {
    fn from(page: SearchPage) -> Self {
        Self {
            products: page.products,
            page_info: page.page_info,
        }
    }
}

// =============================================================================
// Listing Parameters
// =============================================================================

/// Sort order and filters shared by every page of a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingQuery {
    /// Shopify sort key enum value (e.g. `CREATED`, `PRICE`).
    pub sort_key: String,
    pub reverse: bool,
    /// Parsed `ProductFilter` input objects, passed through untouched.
    pub filters: Vec<serde_json::Value>,
}

impl Default for ListingQuery {
    fn default() -> Self {
        Self {
            sort_key: "CREATED".to_string(),
            reverse: true,
            filters: Vec::new(),
        }
    }
}

// =============================================================================
// Cart Types
// =============================================================================

/// A cart as fetched from Shopify.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    pub id: CartId,
    pub checkout_url: Option<String>,
    pub total_quantity: i64,
    pub subtotal: Option<Money>,
    pub total: Option<Money>,
    pub lines: Vec<CartLine>,
}

/// A single remote cart line. At most one line exists per variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub id: CartLineId,
    pub quantity: i64,
    pub merchandise: CartMerchandise,
}

/// Variant display data attached to a cart line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartMerchandise {
    pub variant_id: VariantId,
    pub title: String,
    pub image: Option<Image>,
    pub price: Option<Money>,
    pub product_title: String,
    pub product_handle: String,
}

/// Identity of a cart returned by a mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartHandle {
    pub id: CartId,
    pub checkout_url: Option<String>,
}

/// Outcome of any cart mutation (create, add, update, remove).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CartMutation {
    /// The mutated cart, absent when Shopify rejected the write.
    pub cart: Option<CartHandle>,
    pub user_errors: Vec<CartUserError>,
}

/// A user-facing error reported by a cart mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartUserError {
    pub message: String,
    pub field: Option<Vec<String>>,
    /// Shopify `CartErrorCode`, when provided.
    pub code: Option<String>,
}

/// Quantity change for an existing remote line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartLineUpdate {
    pub line_id: CartLineId,
    pub quantity: i64,
}

// =============================================================================
// Menu Types
// =============================================================================

/// A navigation menu.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Menu {
    pub handle: String,
    pub title: String,
    pub items: Vec<MenuItem>,
}

/// A menu entry; nested up to three levels deep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuItem {
    pub id: String,
    pub title: String,
    pub url: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub items: Vec<MenuItem>,
}

impl Menu {
    /// Number of items including all nested children.
    #[must_use]
    pub fn total_item_count(&self) -> usize {
        fn count(items: &[MenuItem]) -> usize {
            items.iter().map(|item| 1 + count(&item.items)).sum()
        }
        count(&self.items)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn item(title: &str, items: Vec<MenuItem>) -> MenuItem {
        MenuItem {
            id: title.to_string(),
            title: title.to_string(),
            url: None,
            kind: "HTTP".to_string(),
            items,
        }
    }

    #[test]
    fn test_menu_total_item_count_is_recursive() {
        let menu = Menu {
            handle: "main-menu".to_string(),
            title: "Main".to_string(),
            items: vec![
                item("Shop", vec![item("Singles", vec![item("Pokemon", vec![])])]),
                item("Events", vec![]),
            ],
        };
        assert_eq!(menu.total_item_count(), 4);
    }

    #[test]
    fn test_listing_query_defaults() {
        let query = ListingQuery::default();
        assert_eq!(query.sort_key, "CREATED");
        assert!(query.reverse);
        assert!(query.filters.is_empty());
    }

    #[test]
    fn test_product_filter_serializes_type_field() {
        let filter = ProductFilter {
            id: "filter.v.availability".to_string(),
            label: "Availability".to_string(),
            kind: "LIST".to_string(),
            values: vec![],
        };
        let json = serde_json::to_value(&filter).unwrap();
        assert_eq!(json["type"], "LIST");
    }
}
