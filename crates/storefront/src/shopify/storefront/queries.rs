//! GraphQL operation definitions for Shopify Storefront API.
//!
//! Each operation is a unit struct implementing [`GraphQLQuery`] with a
//! sibling module holding its `Variables`, `ResponseData` and query text.
//! Shared selection sets live in [`fields`] and are spliced into the query
//! documents as fragments.

use graphql_client::{GraphQLQuery, QueryBody};

macro_rules! storefront_operation {
    ($(#[$meta:meta])* $name:ident => $module:ident) => {
        $(#[$meta])*
        pub struct $name;

        impl GraphQLQuery for $name {
            type Variables = $module::Variables;
            type ResponseData = $module::ResponseData;

            fn build_query(variables: Self::Variables) -> QueryBody<Self::Variables> {
                QueryBody {
                    variables,
                    query: $module::QUERY,
                    operation_name: $module::OPERATION_NAME,
                }
            }
        }
    };
}

macro_rules! product_card_fragment {
    () => {
        r"
fragment ProductCard on Product {
  id
  handle
  title
  vendor
  availableForSale
  featuredImage { url altText width height }
  priceRange {
    minVariantPrice { amount currencyCode }
    maxVariantPrice { amount currencyCode }
  }
  compareAtPriceRange {
    maxVariantPrice { amount currencyCode }
  }
  variants(first: 1) { edges { node { id } } }
}
"
    };
}

macro_rules! cart_user_error_fragment {
    () => {
        r"
fragment CartUserErrorFields on CartUserError {
  field
  message
  code
}
"
    };
}

macro_rules! menu_item_fragment {
    () => {
        r"
fragment MenuItemFields on MenuItem {
  id
  title
  url
  type
}
"
    };
}

// =============================================================================
// Shared selection sets
// =============================================================================

/// Raw shapes of selection sets reused across operations.
pub mod fields {
    use serde::Deserialize;

    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct MoneyFields {
        pub amount: String,
        pub currency_code: String,
    }

    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ImageFields {
        pub url: String,
        pub alt_text: Option<String>,
        pub width: Option<i64>,
        pub height: Option<i64>,
    }

    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct PageInfoFields {
        pub has_next_page: bool,
        #[serde(default)]
        pub has_previous_page: bool,
        pub start_cursor: Option<String>,
        pub end_cursor: Option<String>,
    }

    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct PriceRangeFields {
        pub min_variant_price: MoneyFields,
        pub max_variant_price: MoneyFields,
    }

    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct CompareAtPriceRangeFields {
        pub max_variant_price: MoneyFields,
    }

    #[derive(Debug, Clone, Deserialize)]
    pub struct IdNode {
        pub id: String,
    }

    #[derive(Debug, Clone, Deserialize)]
    pub struct Edge<T> {
        pub node: T,
    }

    #[derive(Debug, Clone, Deserialize)]
    pub struct Edges<T> {
        pub edges: Vec<Edge<T>>,
    }

    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ProductCard {
        pub id: String,
        pub handle: String,
        pub title: String,
        pub vendor: Option<String>,
        pub available_for_sale: bool,
        pub featured_image: Option<ImageFields>,
        pub price_range: PriceRangeFields,
        pub compare_at_price_range: Option<CompareAtPriceRangeFields>,
        pub variants: Edges<IdNode>,
    }

    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ProductConnection {
        pub edges: Vec<Edge<ProductCard>>,
        pub page_info: PageInfoFields,
    }

    #[derive(Debug, Clone, Deserialize)]
    pub struct CartUserErrorFields {
        pub field: Option<Vec<String>>,
        pub message: String,
        pub code: Option<String>,
    }

    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct MutatedCart {
        pub id: String,
        pub checkout_url: Option<String>,
    }

    /// Payload shared by `cartCreate` and the `cartLines*` mutations.
    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct CartMutationPayload {
        pub cart: Option<MutatedCart>,
        #[serde(default)]
        pub user_errors: Vec<CartUserErrorFields>,
    }

    #[derive(Debug, Clone, Deserialize)]
    pub struct MenuItemFields {
        pub id: String,
        pub title: String,
        pub url: Option<String>,
        #[serde(rename = "type")]
        pub kind: String,
        #[serde(default)]
        pub items: Vec<MenuItemFields>,
    }
}

// =============================================================================
// Cart operations
// =============================================================================

storefront_operation!(
    /// Fetch a cart with its lines and merchandise display data.
    GetCart => get_cart
);

pub mod get_cart {
    use serde::{Deserialize, Serialize};

    use super::fields::{Edges, ImageFields, MoneyFields};

    pub const OPERATION_NAME: &str = "GetCart";
    pub const QUERY: &str = r"
query GetCart($cartId: ID!) {
  cart(id: $cartId) {
    id
    checkoutUrl
    totalQuantity
    cost {
      subtotalAmount { amount currencyCode }
      totalAmount { amount currencyCode }
    }
    lines(first: 100) {
      edges {
        node {
          id
          quantity
          merchandise {
            ... on ProductVariant {
              id
              title
              image { url altText width height }
              price { amount currencyCode }
              product { title handle }
            }
          }
        }
      }
    }
  }
}
";

    #[derive(Debug, Clone, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Variables {
        pub cart_id: String,
    }

    #[derive(Debug, Clone, Deserialize)]
    pub struct ResponseData {
        pub cart: Option<CartFields>,
    }

    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct CartFields {
        pub id: String,
        pub checkout_url: Option<String>,
        pub total_quantity: i64,
        pub cost: Option<CartCost>,
        pub lines: Edges<CartLineFields>,
    }

    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct CartCost {
        pub subtotal_amount: Option<MoneyFields>,
        pub total_amount: Option<MoneyFields>,
    }

    #[derive(Debug, Clone, Deserialize)]
    pub struct CartLineFields {
        pub id: String,
        pub quantity: i64,
        pub merchandise: VariantFields,
    }

    #[derive(Debug, Clone, Deserialize)]
    pub struct VariantFields {
        pub id: String,
        pub title: String,
        pub image: Option<ImageFields>,
        pub price: Option<MoneyFields>,
        pub product: VariantProduct,
    }

    #[derive(Debug, Clone, Deserialize)]
    pub struct VariantProduct {
        pub title: String,
        pub handle: String,
    }
}

/// Line input for `cartCreate` and `cartLinesAdd`.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLineInput {
    pub merchandise_id: String,
    pub quantity: i64,
}

/// Line input for `cartLinesUpdate`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CartLineUpdateInput {
    pub id: String,
    pub quantity: i64,
}

storefront_operation!(
    /// Create a cart pre-populated with lines.
    CreateCart => create_cart
);

pub mod create_cart {
    use serde::{Deserialize, Serialize};

    use super::CartLineInput;
    use super::fields::CartMutationPayload;

    pub const OPERATION_NAME: &str = "CreateCart";
    pub const QUERY: &str = concat!(
        r"
mutation CreateCart($input: CartInput!) {
  cartCreate(input: $input) {
    cart { id checkoutUrl }
    userErrors { ...CartUserErrorFields }
  }
}
",
        cart_user_error_fragment!()
    );

    #[derive(Debug, Clone, Serialize)]
    pub struct Variables {
        pub input: CartInput,
    }

    #[derive(Debug, Clone, Serialize)]
    pub struct CartInput {
        pub lines: Vec<CartLineInput>,
    }

    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ResponseData {
        pub cart_create: Option<CartMutationPayload>,
    }
}

storefront_operation!(
    /// Add new lines to an existing cart.
    AddCartLines => add_cart_lines
);

pub mod add_cart_lines {
    use serde::{Deserialize, Serialize};

    use super::CartLineInput;
    use super::fields::CartMutationPayload;

    pub const OPERATION_NAME: &str = "AddCartLines";
    pub const QUERY: &str = concat!(
        r"
mutation AddCartLines($cartId: ID!, $lines: [CartLineInput!]!) {
  cartLinesAdd(cartId: $cartId, lines: $lines) {
    cart { id checkoutUrl }
    userErrors { ...CartUserErrorFields }
  }
}
",
        cart_user_error_fragment!()
    );

    #[derive(Debug, Clone, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Variables {
        pub cart_id: String,
        pub lines: Vec<CartLineInput>,
    }

    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ResponseData {
        pub cart_lines_add: Option<CartMutationPayload>,
    }
}

storefront_operation!(
    /// Change quantities of existing cart lines.
    UpdateCartLines => update_cart_lines
);

pub mod update_cart_lines {
    use serde::{Deserialize, Serialize};

    use super::CartLineUpdateInput;
    use super::fields::CartMutationPayload;

    pub const OPERATION_NAME: &str = "UpdateCartLines";
    pub const QUERY: &str = concat!(
        r"
mutation UpdateCartLines($cartId: ID!, $lines: [CartLineUpdateInput!]!) {
  cartLinesUpdate(cartId: $cartId, lines: $lines) {
    cart { id checkoutUrl }
    userErrors { ...CartUserErrorFields }
  }
}
",
        cart_user_error_fragment!()
    );

    #[derive(Debug, Clone, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Variables {
        pub cart_id: String,
        pub lines: Vec<CartLineUpdateInput>,
    }

    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ResponseData {
        pub cart_lines_update: Option<CartMutationPayload>,
    }
}

storefront_operation!(
    /// Remove cart lines by line ID.
    RemoveCartLines => remove_cart_lines
);

pub mod remove_cart_lines {
    use serde::{Deserialize, Serialize};

    use super::fields::CartMutationPayload;

    pub const OPERATION_NAME: &str = "RemoveCartLines";
    pub const QUERY: &str = concat!(
        r"
mutation RemoveCartLines($cartId: ID!, $lineIds: [ID!]!) {
  cartLinesRemove(cartId: $cartId, lineIds: $lineIds) {
    cart { id checkoutUrl }
    userErrors { ...CartUserErrorFields }
  }
}
",
        cart_user_error_fragment!()
    );

    #[derive(Debug, Clone, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Variables {
        pub cart_id: String,
        pub line_ids: Vec<String>,
    }

    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ResponseData {
        pub cart_lines_remove: Option<CartMutationPayload>,
    }
}

// =============================================================================
// Listing operations
// =============================================================================

storefront_operation!(
    /// One page of a collection's products.
    GetCollectionProducts => get_collection_products
);

pub mod get_collection_products {
    use serde::{Deserialize, Serialize};

    use super::fields::ProductConnection;

    pub const OPERATION_NAME: &str = "GetCollectionProducts";
    pub const QUERY: &str = concat!(
        r"
query GetCollectionProducts(
  $handle: String!
  $first: Int!
  $after: String
  $sortKey: ProductCollectionSortKeys
  $reverse: Boolean
  $filters: [ProductFilter!]
) {
  collection(handle: $handle) {
    id
    products(first: $first, after: $after, sortKey: $sortKey, reverse: $reverse, filters: $filters) {
      edges { node { ...ProductCard } }
      pageInfo { hasNextPage hasPreviousPage startCursor endCursor }
    }
  }
}
",
        product_card_fragment!()
    );

    #[derive(Debug, Clone, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Variables {
        pub handle: String,
        pub first: i64,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub after: Option<String>,
        pub sort_key: String,
        pub reverse: bool,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        pub filters: Vec<serde_json::Value>,
    }

    #[derive(Debug, Clone, Deserialize)]
    pub struct ResponseData {
        pub collection: Option<Collection>,
    }

    #[derive(Debug, Clone, Deserialize)]
    pub struct Collection {
        pub id: String,
        pub products: ProductConnection,
    }
}

storefront_operation!(
    /// Product IDs only, for counting a collection.
    CountCollectionProducts => count_collection_products
);

pub mod count_collection_products {
    use serde::{Deserialize, Serialize};

    use super::fields::{Edge, IdNode, PageInfoFields};

    pub const OPERATION_NAME: &str = "CountCollectionProducts";
    pub const QUERY: &str = r"
query CountCollectionProducts(
  $handle: String!
  $after: String
  $sortKey: ProductCollectionSortKeys
  $reverse: Boolean
  $filters: [ProductFilter!]
) {
  collection(handle: $handle) {
    products(first: 250, after: $after, sortKey: $sortKey, reverse: $reverse, filters: $filters) {
      edges { node { id } }
      pageInfo { hasNextPage endCursor }
    }
  }
}
";

    #[derive(Debug, Clone, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Variables {
        pub handle: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub after: Option<String>,
        pub sort_key: String,
        pub reverse: bool,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        pub filters: Vec<serde_json::Value>,
    }

    #[derive(Debug, Clone, Deserialize)]
    pub struct ResponseData {
        pub collection: Option<Collection>,
    }

    #[derive(Debug, Clone, Deserialize)]
    pub struct Collection {
        pub products: Products,
    }

    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Products {
        pub edges: Vec<Edge<IdNode>>,
        pub page_info: PageInfoFields,
    }
}

storefront_operation!(
    /// Full-text product search with facets.
    SearchProducts => search_products
);

pub mod search_products {
    use serde::{Deserialize, Serialize};

    use super::fields::{Edge, PageInfoFields, ProductCard};

    pub const OPERATION_NAME: &str = "SearchProducts";
    pub const QUERY: &str = concat!(
        r"
query SearchProducts(
  $query: String!
  $first: Int!
  $after: String
  $sortKey: SearchSortKeys
  $reverse: Boolean
  $productFilters: [ProductFilter!]
) {
  search(
    query: $query
    first: $first
    after: $after
    sortKey: $sortKey
    reverse: $reverse
    types: [PRODUCT]
    productFilters: $productFilters
  ) {
    totalCount
    productFilters {
      id
      label
      type
      values { id label count input }
    }
    edges { node { ...ProductCard } }
    pageInfo { hasNextPage hasPreviousPage startCursor endCursor }
  }
}
",
        product_card_fragment!()
    );

    #[derive(Debug, Clone, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Variables {
        pub query: String,
        pub first: i64,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub after: Option<String>,
        pub sort_key: String,
        pub reverse: bool,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        pub product_filters: Vec<serde_json::Value>,
    }

    #[derive(Debug, Clone, Deserialize)]
    pub struct ResponseData {
        pub search: Option<Search>,
    }

    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Search {
        #[serde(default)]
        pub total_count: i64,
        #[serde(default)]
        pub product_filters: Vec<FilterFields>,
        pub edges: Vec<Edge<ProductCard>>,
        pub page_info: PageInfoFields,
    }

    #[derive(Debug, Clone, Deserialize)]
    pub struct FilterFields {
        pub id: String,
        pub label: String,
        #[serde(rename = "type")]
        pub kind: String,
        #[serde(default)]
        pub values: Vec<FilterValueFields>,
    }

    #[derive(Debug, Clone, Deserialize)]
    pub struct FilterValueFields {
        pub id: String,
        pub label: String,
        pub count: i64,
        pub input: serde_json::Value,
    }
}

storefront_operation!(
    /// Look up products by global ID (wishlist).
    GetProductsByIds => get_products_by_ids
);

pub mod get_products_by_ids {
    use serde::{Deserialize, Serialize};

    use super::fields::ProductCard;

    pub const OPERATION_NAME: &str = "GetProductsByIds";
    pub const QUERY: &str = concat!(
        r"
query GetProductsByIds($ids: [ID!]!) {
  nodes(ids: $ids) {
    __typename
    ...ProductCard
  }
}
",
        product_card_fragment!()
    );

    #[derive(Debug, Clone, Serialize)]
    pub struct Variables {
        pub ids: Vec<String>,
    }

    #[derive(Debug, Clone, Deserialize)]
    pub struct ResponseData {
        pub nodes: Vec<Option<Node>>,
    }

    #[derive(Debug, Clone, Deserialize)]
    #[serde(tag = "__typename")]
    pub enum Node {
        Product(ProductCard),
        #[serde(other)]
        Other,
    }
}

// =============================================================================
// Navigation
// =============================================================================

storefront_operation!(
    /// A navigation menu, three levels deep.
    GetMenu => get_menu
);

pub mod get_menu {
    use serde::{Deserialize, Serialize};

    use super::fields::MenuItemFields;

    pub const OPERATION_NAME: &str = "GetMenu";
    pub const QUERY: &str = concat!(
        r"
query GetMenu($handle: String!) {
  menu(handle: $handle) {
    id
    handle
    title
    items {
      ...MenuItemFields
      items {
        ...MenuItemFields
        items { ...MenuItemFields }
      }
    }
  }
}
",
        menu_item_fragment!()
    );

    #[derive(Debug, Clone, Serialize)]
    pub struct Variables {
        pub handle: String,
    }

    #[derive(Debug, Clone, Deserialize)]
    pub struct ResponseData {
        pub menu: Option<MenuFields>,
    }

    #[derive(Debug, Clone, Deserialize)]
    pub struct MenuFields {
        pub handle: String,
        pub title: String,
        #[serde(default)]
        pub items: Vec<MenuItemFields>,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_build_query_carries_operation_name() {
        let body = GetCart::build_query(get_cart::Variables {
            cart_id: "gid://shopify/Cart/1".to_string(),
        });
        assert_eq!(body.operation_name, "GetCart");
        assert!(body.query.contains("query GetCart($cartId: ID!)"));

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["variables"]["cartId"], "gid://shopify/Cart/1");
        assert_eq!(json["operationName"], "GetCart");
    }

    #[test]
    fn test_fragments_are_spliced_into_documents() {
        assert!(create_cart::QUERY.contains("fragment CartUserErrorFields"));
        assert!(search_products::QUERY.contains("fragment ProductCard on Product"));
        assert!(get_menu::QUERY.contains("fragment MenuItemFields on MenuItem"));
    }

    #[test]
    fn test_listing_variables_omit_empty_optionals() {
        let vars = get_collection_products::Variables {
            handle: "singles".to_string(),
            first: 24,
            after: None,
            sort_key: "CREATED".to_string(),
            reverse: true,
            filters: vec![],
        };
        let json = serde_json::to_value(&vars).unwrap();
        assert!(json.get("after").is_none());
        assert!(json.get("filters").is_none());
        assert_eq!(json["sortKey"], "CREATED");
    }

    #[test]
    fn test_nodes_skip_non_products() {
        let data: get_products_by_ids::ResponseData = serde_json::from_value(serde_json::json!({
            "nodes": [
                null,
                { "__typename": "Collection" },
                {
                    "__typename": "Product",
                    "id": "gid://shopify/Product/1",
                    "handle": "charizard",
                    "title": "Charizard",
                    "vendor": null,
                    "availableForSale": true,
                    "featuredImage": null,
                    "priceRange": {
                        "minVariantPrice": { "amount": "10.0", "currencyCode": "EUR" },
                        "maxVariantPrice": { "amount": "10.0", "currencyCode": "EUR" }
                    },
                    "compareAtPriceRange": null,
                    "variants": { "edges": [] }
                }
            ]
        }))
        .unwrap();

        let products: Vec<_> = data
            .nodes
            .into_iter()
            .flatten()
            .filter_map(|n| match n {
                get_products_by_ids::Node::Product(p) => Some(p),
                get_products_by_ids::Node::Other => None,
            })
            .collect();
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].handle, "charizard");
    }
}
