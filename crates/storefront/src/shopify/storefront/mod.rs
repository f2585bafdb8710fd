//! Shopify Storefront API client implementation.
//!
//! Uses `graphql_client` operation types with `reqwest` 0.13 for HTTP.

mod conversions;
pub mod queries;

use std::sync::Arc;

use graphql_client::{GraphQLQuery, QueryBody, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tracing::{debug, instrument, warn};
use vdubs_core::{CartId, CartLineId, LineItem, ProductId};

use crate::config::ShopifyStorefrontConfig;
use crate::shopify::types::{
    Cart, CartLineUpdate, CartMutation, ListingQuery, Menu, ProductPage, ProductSummary,
    SearchPage,
};
use crate::shopify::{GraphQLError, GraphQLErrorLocation, ShopifyError};

use conversions::{
    convert_cart, convert_menu, convert_mutation, convert_product_card,
    convert_product_connection, convert_search,
};
use queries::{
    AddCartLines, CartLineInput, CartLineUpdateInput, CountCollectionProducts, CreateCart,
    GetCart, GetCollectionProducts, GetMenu, GetProductsByIds, RemoveCartLines, SearchProducts,
    UpdateCartLines, add_cart_lines, count_collection_products, create_cart, get_cart,
    get_collection_products, get_menu, get_products_by_ids, remove_cart_lines, search_products,
    update_cart_lines,
};

/// Products per listing or search page.
pub const PAGE_SIZE: i64 = 24;

const ACCESS_TOKEN_HEADER: &str = "X-Shopify-Storefront-Access-Token";

/// Whether a request may carry the configured access token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Send the token when configured; retry tokenless on 401.
    Default,
    /// Never send the token.
    Tokenless,
}

// =============================================================================
// StorefrontClient
// =============================================================================

/// Client for the Shopify Storefront API.
///
/// Cheap to clone; all clones share one connection pool.
#[derive(Clone)]
pub struct StorefrontClient {
    inner: Arc<StorefrontClientInner>,
}

struct StorefrontClientInner {
    client: reqwest::Client,
    endpoint: String,
    access_token: Option<SecretString>,
}

impl StorefrontClient {
    /// Create a new Storefront API client.
    #[must_use]
    pub fn new(config: &ShopifyStorefrontConfig) -> Self {
        Self {
            inner: Arc::new(StorefrontClientInner {
                client: reqwest::Client::new(),
                endpoint: config.endpoint.clone(),
                access_token: config.access_token.clone(),
            }),
        }
    }

    /// Whether an access token is configured.
    #[must_use]
    pub fn has_access_token(&self) -> bool {
        self.inner.access_token.is_some()
    }

    async fn send<V: Serialize + Sync>(
        &self,
        body: &QueryBody<V>,
        token: Option<&SecretString>,
    ) -> Result<reqwest::Response, ShopifyError> {
        let mut request = self
            .inner
            .client
            .post(&self.inner.endpoint)
            .header("Content-Type", "application/json")
            .json(body);

        if let Some(token) = token {
            request = request.header(ACCESS_TOKEN_HEADER, token.expose_secret());
        }

        Ok(request.send().await?)
    }

    /// Execute a GraphQL operation.
    async fn execute<Q: GraphQLQuery>(
        &self,
        variables: Q::Variables,
        access: Access,
    ) -> Result<Q::ResponseData, ShopifyError>
    where
        Q::Variables: Serialize + Sync,
    {
        let request_body = Q::build_query(variables);

        let token = match access {
            Access::Default => self.inner.access_token.as_ref(),
            Access::Tokenless => None,
        };

        let mut response = self.send(&request_body, token).await?;

        // A rejected token must not take the storefront down with it
        if response.status() == reqwest::StatusCode::UNAUTHORIZED && token.is_some() {
            warn!(
                operation = request_body.operation_name,
                "Storefront token rejected, retrying without it"
            );
            response = self.send(&request_body, None).await?;
        }

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(ShopifyError::RateLimited(retry_after));
        }

        // Get response body as text first for better error diagnostics
        let response_text = response.text().await?;

        if !status.is_success() {
            tracing::error!(
                status = %status,
                body = %response_text.chars().take(500).collect::<String>(),
                "Shopify API returned non-success status"
            );
            return Err(ShopifyError::GraphQL(vec![GraphQLError::message(format!(
                "HTTP {status}: {}",
                response_text.chars().take(200).collect::<String>()
            ))]));
        }

        let response: Response<Q::ResponseData> = match serde_json::from_str(&response_text) {
            Ok(r) => r,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    body = %response_text.chars().take(500).collect::<String>(),
                    "Failed to parse Shopify GraphQL response"
                );
                return Err(ShopifyError::Parse(e));
            }
        };

        if let Some(errors) = response.errors
            && !errors.is_empty()
        {
            debug!(errors = ?errors, "GraphQL errors in response");
            return Err(ShopifyError::GraphQL(
                errors.into_iter().map(convert_graphql_error).collect(),
            ));
        }

        response.data.ok_or_else(|| {
            tracing::error!(
                body = %response_text.chars().take(500).collect::<String>(),
                "Shopify GraphQL response has no data and no errors"
            );
            ShopifyError::GraphQL(vec![GraphQLError::message("No data in response")])
        })
    }

    // =========================================================================
    // Cart Methods
    // =========================================================================

    /// Get a cart. Returns `None` when Shopify no longer knows the ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self), fields(cart_id = %cart_id))]
    pub async fn get_cart(&self, cart_id: &CartId) -> Result<Option<Cart>, ShopifyError> {
        let variables = get_cart::Variables {
            cart_id: cart_id.to_string(),
        };

        let data = self.execute::<GetCart>(variables, Access::Default).await?;
        Ok(data.cart.map(convert_cart))
    }

    /// Create a cart holding `lines`.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails. User errors are returned in
    /// the [`CartMutation`] rather than as an error.
    #[instrument(skip(self, lines), fields(line_count = lines.len()))]
    pub async fn create_cart(&self, lines: &[LineItem]) -> Result<CartMutation, ShopifyError> {
        let variables = create_cart::Variables {
            input: create_cart::CartInput {
                lines: line_inputs(lines),
            },
        };

        let data = self.execute::<CreateCart>(variables, Access::Default).await?;
        Ok(convert_mutation(data.cart_create))
    }

    /// Add lines for variants not yet in the cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, lines), fields(cart_id = %cart_id, line_count = lines.len()))]
    pub async fn add_cart_lines(
        &self,
        cart_id: &CartId,
        lines: &[LineItem],
    ) -> Result<CartMutation, ShopifyError> {
        let variables = add_cart_lines::Variables {
            cart_id: cart_id.to_string(),
            lines: line_inputs(lines),
        };

        let data = self.execute::<AddCartLines>(variables, Access::Default).await?;
        Ok(convert_mutation(data.cart_lines_add))
    }

    /// Set quantities of existing lines.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, lines), fields(cart_id = %cart_id, line_count = lines.len()))]
    pub async fn update_cart_lines(
        &self,
        cart_id: &CartId,
        lines: &[CartLineUpdate],
    ) -> Result<CartMutation, ShopifyError> {
        let variables = update_cart_lines::Variables {
            cart_id: cart_id.to_string(),
            lines: lines
                .iter()
                .map(|line| CartLineUpdateInput {
                    id: line.line_id.to_string(),
                    quantity: line.quantity,
                })
                .collect(),
        };

        let data = self
            .execute::<UpdateCartLines>(variables, Access::Default)
            .await?;
        Ok(convert_mutation(data.cart_lines_update))
    }

    /// Remove lines by line ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, line_ids), fields(cart_id = %cart_id, line_count = line_ids.len()))]
    pub async fn remove_cart_lines(
        &self,
        cart_id: &CartId,
        line_ids: &[CartLineId],
    ) -> Result<CartMutation, ShopifyError> {
        let variables = remove_cart_lines::Variables {
            cart_id: cart_id.to_string(),
            line_ids: line_ids.iter().map(ToString::to_string).collect(),
        };

        let data = self
            .execute::<RemoveCartLines>(variables, Access::Default)
            .await?;
        Ok(convert_mutation(data.cart_lines_remove))
    }

    // =========================================================================
    // Listing Methods
    // =========================================================================

    /// Get one page of a collection's products.
    ///
    /// # Errors
    ///
    /// Returns `ShopifyError::NotFound` if the collection does not exist, or
    /// an error if the API request fails.
    #[instrument(skip(self, listing), fields(handle = %handle, after = ?after))]
    pub async fn get_collection_products(
        &self,
        handle: &str,
        listing: &ListingQuery,
        after: Option<String>,
    ) -> Result<ProductPage, ShopifyError> {
        let variables = get_collection_products::Variables {
            handle: handle.to_string(),
            first: PAGE_SIZE,
            after,
            sort_key: listing.sort_key.clone(),
            reverse: listing.reverse,
            filters: listing.filters.clone(),
        };

        let data = self
            .execute::<GetCollectionProducts>(variables, Access::Default)
            .await?;

        data.collection
            .map(|collection| convert_product_connection(collection.products))
            .ok_or_else(|| ShopifyError::NotFound(format!("Collection not found: {handle}")))
    }

    /// Count all products in a collection, walking 250-item pages.
    ///
    /// # Errors
    ///
    /// Returns `ShopifyError::NotFound` if the collection does not exist, or
    /// an error if any page request fails.
    #[instrument(skip(self, listing), fields(handle = %handle))]
    pub async fn count_collection_products(
        &self,
        handle: &str,
        listing: &ListingQuery,
    ) -> Result<usize, ShopifyError> {
        let mut count = 0;
        let mut after = None;

        loop {
            let variables = count_collection_products::Variables {
                handle: handle.to_string(),
                after: after.take(),
                sort_key: listing.sort_key.clone(),
                reverse: listing.reverse,
                filters: listing.filters.clone(),
            };

            let data = self
                .execute::<CountCollectionProducts>(variables, Access::Default)
                .await?;
            let products = data
                .collection
                .ok_or_else(|| ShopifyError::NotFound(format!("Collection not found: {handle}")))?
                .products;

            count += products.edges.len();

            match products.page_info.end_cursor {
                Some(cursor) if products.page_info.has_next_page => after = Some(cursor),
                _ => break,
            }
        }

        debug!(count, "Counted collection products");
        Ok(count)
    }

    /// Search products.
    ///
    /// A response without a `search` object yields an empty page.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, listing), fields(query = %query, after = ?after))]
    pub async fn search_products(
        &self,
        query: &str,
        listing: &ListingQuery,
        after: Option<String>,
    ) -> Result<SearchPage, ShopifyError> {
        let variables = search_products::Variables {
            query: query.to_string(),
            first: PAGE_SIZE,
            after,
            sort_key: listing.sort_key.clone(),
            reverse: listing.reverse,
            product_filters: listing.filters.clone(),
        };

        let data = self
            .execute::<SearchProducts>(variables, Access::Default)
            .await?;
        Ok(data.search.map(convert_search).unwrap_or_default())
    }

    /// Look up products by ID, skipping IDs that resolve to nothing or to a
    /// non-product node.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, ids), fields(id_count = ids.len()))]
    pub async fn get_products_by_ids(
        &self,
        ids: &[ProductId],
    ) -> Result<Vec<ProductSummary>, ShopifyError> {
        let variables = get_products_by_ids::Variables {
            ids: ids.iter().map(ToString::to_string).collect(),
        };

        let data = self
            .execute::<GetProductsByIds>(variables, Access::Default)
            .await?;

        Ok(data
            .nodes
            .into_iter()
            .flatten()
            .filter_map(|node| match node {
                get_products_by_ids::Node::Product(card) => Some(convert_product_card(card)),
                get_products_by_ids::Node::Other => None,
            })
            .collect())
    }

    // =========================================================================
    // Navigation Methods
    // =========================================================================

    /// Get a menu by handle.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self), fields(handle = %handle))]
    pub async fn get_menu(&self, handle: &str, access: Access) -> Result<Option<Menu>, ShopifyError> {
        let variables = get_menu::Variables {
            handle: handle.to_string(),
        };

        let data = self.execute::<GetMenu>(variables, access).await?;
        Ok(data.menu.map(convert_menu))
    }
}

fn line_inputs(lines: &[LineItem]) -> Vec<CartLineInput> {
    lines
        .iter()
        .map(|line| CartLineInput {
            merchandise_id: line.variant_id.to_string(),
            quantity: line.quantity,
        })
        .collect()
}

fn convert_graphql_error(e: graphql_client::Error) -> GraphQLError {
    GraphQLError {
        code: e
            .extensions
            .as_ref()
            .and_then(|ext| ext.get("code"))
            .and_then(serde_json::Value::as_str)
            .map(str::to_owned),
        message: e.message,
        locations: e.locations.map_or_else(Vec::new, |locs| {
            locs.into_iter()
                .map(|l| GraphQLErrorLocation {
                    line: i64::from(l.line),
                    column: i64::from(l.column),
                })
                .collect()
        }),
        path: e.path.map_or_else(Vec::new, |p| {
            p.into_iter()
                .map(|fragment| match fragment {
                    graphql_client::PathFragment::Key(s) => serde_json::Value::String(s),
                    graphql_client::PathFragment::Index(i) => serde_json::Value::Number(i.into()),
                })
                .collect()
        }),
    }
}
