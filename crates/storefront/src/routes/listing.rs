//! Query parameters shared by the paginated product listings.

use std::future::Future;
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::pagination::{CursorCache, CursorKey, Paged};
use crate::shopify::{ListingQuery, ShopifyError};

/// Sort keys accepted for collection listings.
pub const COLLECTION_SORT_KEYS: &[&str] = &[
    "BEST_SELLING",
    "COLLECTION_DEFAULT",
    "CREATED",
    "ID",
    "MANUAL",
    "PRICE",
    "RELEVANCE",
    "TITLE",
];

/// Sort keys accepted for search.
pub const SEARCH_SORT_KEYS: &[&str] = &["RELEVANCE", "PRICE"];

/// Raw listing query string. Everything is optional and leniently parsed.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingParams {
    pub after: Option<String>,
    pub page: Option<String>,
    pub sort_key: Option<String>,
    pub reverse: Option<String>,
    pub filters: Option<String>,
}

impl ListingParams {
    /// Listing for a collection: unknown sort keys fall back to `CREATED`,
    /// and results are reversed unless `reverse=false`.
    #[must_use]
    pub fn collection_listing(&self) -> ListingQuery {
        ListingQuery {
            sort_key: whitelisted(self.sort_key.as_deref(), COLLECTION_SORT_KEYS, "CREATED"),
            reverse: self.reverse.as_deref() != Some("false"),
            filters: parse_filters(self.filters.as_deref()),
        }
    }

    /// Listing for search: unknown sort keys fall back to `RELEVANCE`, and
    /// results are only reversed with `reverse=true`.
    #[must_use]
    pub fn search_listing(&self) -> ListingQuery {
        ListingQuery {
            sort_key: whitelisted(self.sort_key.as_deref(), SEARCH_SORT_KEYS, "RELEVANCE"),
            reverse: self.reverse.as_deref() == Some("true"),
            filters: parse_filters(self.filters.as_deref()),
        }
    }

    /// Non-empty `after` cursor.
    #[must_use]
    pub fn after(&self) -> Option<String> {
        self.after.clone().filter(|a| !a.is_empty())
    }

    /// Requested page when it needs the cursor cache: `page` above 1 and no
    /// explicit `after` cursor.
    #[must_use]
    pub fn jump_to_page(&self) -> Option<u32> {
        if self.after().is_some() {
            return None;
        }
        self.page
            .as_deref()
            .map(parse_page)
            .filter(|&page| page > 1)
    }
}

fn whitelisted(value: Option<&str>, allowed: &[&str], default: &str) -> String {
    value
        .filter(|v| allowed.contains(v))
        .unwrap_or(default)
        .to_string()
}

/// Parse the `filters` JSON array. Anything else is ignored.
fn parse_filters(raw: Option<&str>) -> Vec<serde_json::Value> {
    raw.and_then(|r| serde_json::from_str::<Vec<serde_json::Value>>(r).ok())
        .unwrap_or_default()
}

/// Leading digits of `raw`, at least 1.
fn parse_page(raw: &str) -> u32 {
    let digits: String = raw
        .trim()
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse::<u32>().unwrap_or(1).max(1)
}

/// Fetch one page of a listing, either through the cursor cache or directly.
///
/// A fetch that outlives `timeout` yields an empty page.
///
/// # Errors
///
/// Returns the error from `fetch`. A page past the end of the listing
/// answers with the last page instead.
pub async fn fetch_page<T, F, Fut>(
    cursors: &CursorCache,
    key: &CursorKey,
    params: &ListingParams,
    timeout: Duration,
    fetch: F,
) -> Result<T, ShopifyError>
where
    T: Paged + Default,
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<T, ShopifyError>>,
{
    let lookup = async {
        match params.jump_to_page() {
            Some(page) => cursors.resolve_and_fetch(key, page, fetch).await,
            None => cursors.fetch_direct(key, params.after(), fetch).await,
        }
    };

    match tokio::time::timeout(timeout, lookup).await {
        Ok(result) => result,
        Err(_) => {
            warn!(key = %key.as_str(), timeout_ms = timeout.as_millis(), "Listing fetch timed out");
            Ok(T::default())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::shopify::ProductPage;

    fn params(query: &str) -> ListingParams {
        serde_json::from_value(
            url::form_urlencoded::parse(query.as_bytes())
                .map(|(k, v)| (k.into_owned(), serde_json::Value::String(v.into_owned())))
                .collect::<serde_json::Map<_, _>>()
                .into(),
        )
        .unwrap()
    }

    #[test]
    fn test_collection_defaults() {
        let listing = params("").collection_listing();
        assert_eq!(listing, ListingQuery::default());
    }

    #[test]
    fn test_collection_sort_key_whitelist() {
        assert_eq!(params("sortKey=PRICE").collection_listing().sort_key, "PRICE");
        assert_eq!(params("sortKey=price").collection_listing().sort_key, "CREATED");
        assert_eq!(params("sortKey=DROP").collection_listing().sort_key, "CREATED");
    }

    #[test]
    fn test_reverse_defaults_differ() {
        assert!(params("reverse=maybe").collection_listing().reverse);
        assert!(!params("reverse=false").collection_listing().reverse);
        assert!(!params("reverse=maybe").search_listing().reverse);
        assert!(params("reverse=true").search_listing().reverse);
    }

    #[test]
    fn test_search_sort_key_whitelist() {
        assert_eq!(params("sortKey=TITLE").search_listing().sort_key, "RELEVANCE");
        assert_eq!(params("sortKey=PRICE").search_listing().sort_key, "PRICE");
    }

    #[test]
    fn test_invalid_filters_ignored() {
        assert!(params("filters=not-json").collection_listing().filters.is_empty());
        assert!(params("filters=%7B%22a%22%3A1%7D").collection_listing().filters.is_empty());
        let listing = params("filters=%5B%7B%22available%22%3Atrue%7D%5D").collection_listing();
        assert_eq!(listing.filters, vec![serde_json::json!({ "available": true })]);
    }

    #[test]
    fn test_jump_to_page() {
        assert_eq!(params("page=3").jump_to_page(), Some(3));
        assert_eq!(params("page=3abc").jump_to_page(), Some(3));
        assert_eq!(params("page=1").jump_to_page(), None);
        assert_eq!(params("page=-2").jump_to_page(), None);
        assert_eq!(params("page=3&after=abc").jump_to_page(), None);
        assert_eq!(params("page=3&after=").jump_to_page(), Some(3));
    }

    #[tokio::test]
    async fn test_fetch_page_times_out_to_empty() {
        let cursors = CursorCache::new(Duration::from_secs(60));
        let key = CursorKey::new("singles", &ListingQuery::default());
        let page: ProductPage = fetch_page(
            &cursors,
            &key,
            &ListingParams::default(),
            Duration::from_millis(10),
            |_| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Err(ShopifyError::RateLimited(1))
            },
        )
        .await
        .unwrap();
        assert_eq!(page, ProductPage::default());
    }
}
