//! Product listing conversion functions.

use vdubs_core::{ProductId, VariantId};

use crate::shopify::types::{
    FilterValue, PageInfo, PriceRange, ProductFilter, ProductPage, ProductSummary, SearchPage,
};

use super::super::queries::fields::{PageInfoFields, ProductCard, ProductConnection};
use super::super::queries::search_products;
use super::{convert_image, convert_money};

/// Convert a product card selection.
pub fn convert_product_card(card: ProductCard) -> ProductSummary {
    let min_price = convert_money(card.price_range.min_variant_price);
    let compare_at_price = card
        .compare_at_price_range
        .map(|range| convert_money(range.max_variant_price))
        // Shopify reports 0.0 when no variant has a compare-at price
        .filter(|money| is_positive_amount(&money.amount) && money.amount != min_price.amount);

    ProductSummary {
        id: ProductId::new(card.id),
        handle: card.handle,
        title: card.title,
        vendor: card.vendor.filter(|v| !v.is_empty()),
        available_for_sale: card.available_for_sale,
        featured_image: card.featured_image.map(convert_image),
        price_range: PriceRange {
            min_variant_price: min_price,
            max_variant_price: convert_money(card.price_range.max_variant_price),
        },
        compare_at_price,
        first_variant_id: card
            .variants
            .edges
            .into_iter()
            .next()
            .map(|edge| VariantId::new(edge.node.id)),
    }
}

/// Convert a product connection to a page.
pub fn convert_product_connection(connection: ProductConnection) -> ProductPage {
    ProductPage {
        products: connection
            .edges
            .into_iter()
            .map(|edge| convert_product_card(edge.node))
            .collect(),
        page_info: convert_page_info(connection.page_info),
    }
}

/// Convert a search result.
pub fn convert_search(search: search_products::Search) -> SearchPage {
    SearchPage {
        products: search
            .edges
            .into_iter()
            .map(|edge| convert_product_card(edge.node))
            .collect(),
        page_info: convert_page_info(search.page_info),
        product_filters: search
            .product_filters
            .into_iter()
            .map(|filter| ProductFilter {
                id: filter.id,
                label: filter.label,
                kind: filter.kind,
                values: filter
                    .values
                    .into_iter()
                    .map(|value| FilterValue {
                        id: value.id,
                        label: value.label,
                        count: value.count,
                        input: match value.input {
                            serde_json::Value::String(s) => s,
                            other => other.to_string(),
                        },
                    })
                    .collect(),
            })
            .collect(),
        total_count: search.total_count,
    }
}

pub fn convert_page_info(info: PageInfoFields) -> PageInfo {
    PageInfo {
        has_next_page: info.has_next_page,
        has_previous_page: info.has_previous_page,
        start_cursor: info.start_cursor,
        end_cursor: info.end_cursor,
    }
}

fn is_positive_amount(amount: &str) -> bool {
    amount.parse::<f64>().is_ok_and(|value| value > 0.0)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn card(compare_at: &str) -> ProductCard {
        serde_json::from_value(serde_json::json!({
            "id": "gid://shopify/Product/1",
            "handle": "booster-box",
            "title": "Booster Box",
            "vendor": "",
            "availableForSale": true,
            "featuredImage": { "url": "https://cdn.shopify.com/b.jpg", "altText": null, "width": 800, "height": 800 },
            "priceRange": {
                "minVariantPrice": { "amount": "120.0", "currencyCode": "EUR" },
                "maxVariantPrice": { "amount": "120.0", "currencyCode": "EUR" }
            },
            "compareAtPriceRange": {
                "maxVariantPrice": { "amount": compare_at, "currencyCode": "EUR" }
            },
            "variants": { "edges": [{ "node": { "id": "gid://shopify/ProductVariant/9" } }] }
        }))
        .unwrap()
    }

    #[test]
    fn test_compare_at_price_only_when_discounted() {
        assert!(convert_product_card(card("0.0")).compare_at_price.is_none());
        assert!(convert_product_card(card("120.0")).compare_at_price.is_none());

        let discounted = convert_product_card(card("150.0"));
        assert_eq!(discounted.compare_at_price.unwrap().amount, "150.0");
    }

    #[test]
    fn test_first_variant_and_empty_vendor() {
        let summary = convert_product_card(card("0.0"));
        assert_eq!(
            summary.first_variant_id.unwrap().as_str(),
            "gid://shopify/ProductVariant/9"
        );
        assert!(summary.vendor.is_none());
    }

    #[test]
    fn test_filter_input_kept_as_json_text() {
        let search: search_products::Search = serde_json::from_value(serde_json::json!({
            "totalCount": 1,
            "productFilters": [{
                "id": "filter.v.availability",
                "label": "Availability",
                "type": "LIST",
                "values": [{
                    "id": "filter.v.availability.1",
                    "label": "In stock",
                    "count": 1,
                    "input": "{\"available\":true}"
                }]
            }],
            "edges": [],
            "pageInfo": { "hasNextPage": false, "startCursor": null, "endCursor": null }
        }))
        .unwrap();

        let page = convert_search(search);
        assert_eq!(page.total_count, 1);
        assert_eq!(page.product_filters[0].values[0].input, r#"{"available":true}"#);
        assert!(!page.page_info.has_previous_page);
    }
}
