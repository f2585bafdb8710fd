//! Cursor caching for jump-to-page listings.
//!
//! Shopify paginates with opaque cursors, so page N can only be fetched with
//! the `endCursor` of page N-1. `CursorCache` remembers, per listing, which
//! cursor opens which page. A request for page 7 resumes from the closest
//! earlier page whose cursor is known instead of walking from page 1.
//!
//! Entries live for a fixed TTL from creation. Recording more pages never
//! extends an entry's life; once expired the whole entry is dropped and
//! rebuilt lazily.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use moka::future::Cache;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::shopify::{ListingQuery, PageInfo, ProductPage, SearchPage, ShopifyError};

/// Upper bound on distinct listings tracked at once.
const MAX_LISTINGS: u64 = 10_000;

/// How long a collection product count is reused.
pub const COUNT_CACHE_TTL: Duration = Duration::from_secs(120);

// =============================================================================
// Keys
// =============================================================================

/// Identity of a listing: resource, sort order and filters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CursorKey(String);

impl CursorKey {
    /// Key for a collection (or any resource handle).
    #[must_use]
    pub fn new(resource: &str, listing: &ListingQuery) -> Self {
        let filters = Value::Array(listing.filters.iter().map(canonicalize).collect());
        Self(format!(
            "{resource}:{}:{}:{filters}",
            listing.sort_key, listing.reverse
        ))
    }

    /// Key for a search query.
    #[must_use]
    pub fn search(query: &str, listing: &ListingQuery) -> Self {
        Self::new(&format!("search:{query}"), listing)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Rebuild a JSON value with object keys in sorted order, so filter sets
/// that differ only in key order share a key.
fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k.clone(), canonicalize(v)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

// =============================================================================
// Cursor cache
// =============================================================================

/// Result of a cursor lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CursorLookup {
    /// The cursor for this page has been recorded. `None` is the first page
    /// or the end of the listing.
    Known(Option<String>),
    Unknown,
}

#[derive(Debug, Default)]
struct CursorEntry {
    pages: Mutex<HashMap<u32, Option<String>>>,
}

impl CursorEntry {
    fn get(&self, page: u32) -> CursorLookup {
        let pages = self.pages.lock().unwrap_or_else(PoisonError::into_inner);
        pages
            .get(&page)
            .map_or(CursorLookup::Unknown, |cursor| CursorLookup::Known(cursor.clone()))
    }

    fn set(&self, page: u32, cursor: Option<String>) {
        self.pages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(page, cursor);
    }

    /// Highest page below `target` with a usable starting cursor.
    fn closest_before(&self, target: u32) -> Option<(u32, Option<String>)> {
        let pages = self.pages.lock().unwrap_or_else(PoisonError::into_inner);
        pages
            .iter()
            .filter(|(page, cursor)| **page < target && (**page == 1 || cursor.is_some()))
            .max_by_key(|(page, _)| **page)
            .map(|(page, cursor)| (*page, cursor.clone()))
    }
}

/// A page of results that can drive a cursor walk.
pub trait Paged {
    fn page_info(&self) -> &PageInfo;
    fn is_empty(&self) -> bool;
}

impl Paged for ProductPage {
    fn page_info(&self) -> &PageInfo {
        &self.page_info
    }

    fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}

impl Paged for SearchPage {
    fn page_info(&self) -> &PageInfo {
        &self.page_info
    }

    fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}

/// Process-wide map from listing and page number to the cursor that opens it.
#[derive(Clone)]
pub struct CursorCache {
    entries: Cache<CursorKey, Arc<CursorEntry>>,
}

impl CursorCache {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Cache::builder()
                .max_capacity(MAX_LISTINGS)
                .time_to_live(ttl)
                .build(),
        }
    }

    /// Look up the cursor that opens `page`.
    pub async fn get_cursor(&self, key: &CursorKey, page: u32) -> CursorLookup {
        match self.entries.get(key).await {
            Some(entry) => entry.get(page),
            None => CursorLookup::Unknown,
        }
    }

    /// Record the cursor that opens `page`, creating the entry if needed.
    pub async fn set_cursor(&self, key: &CursorKey, page: u32, cursor: Option<String>) {
        let entry = self
            .entries
            .get_with_by_ref(key, async { Arc::new(CursorEntry::default()) })
            .await;
        entry.set(page, cursor);
    }

    /// Record what a fetched page reveals: the cursor for the next page.
    async fn record<T: Paged>(&self, key: &CursorKey, page: u32, result: &T) {
        self.set_cursor(key, page + 1, result.page_info().end_cursor.clone())
            .await;
    }

    /// Usable cursor for `page`: page 1 always starts from `None`; other
    /// pages need a recorded cursor.
    async fn exact(&self, key: &CursorKey, page: u32) -> Option<Option<String>> {
        if page == 1 {
            return Some(None);
        }
        match self.get_cursor(key, page).await {
            CursorLookup::Known(Some(cursor)) => Some(Some(cursor)),
            CursorLookup::Known(None) | CursorLookup::Unknown => None,
        }
    }

    /// Fetch page `target` (1-based) of a listing.
    ///
    /// Uses the recorded cursor when known; otherwise walks forward from the
    /// closest earlier known page (or page 1), recording cursors as it goes.
    /// If the listing ends before `target`, the last page reached is returned.
    ///
    /// # Errors
    ///
    /// Returns the first error returned by `fetch`.
    #[instrument(skip(self, key, fetch), fields(key = %key.as_str()))]
    pub async fn resolve_and_fetch<T, F, Fut>(
        &self,
        key: &CursorKey,
        target: u32,
        mut fetch: F,
    ) -> Result<T, ShopifyError>
    where
        T: Paged,
        F: FnMut(Option<String>) -> Fut,
        Fut: Future<Output = Result<T, ShopifyError>>,
    {
        let target = target.max(1);

        if let Some(cursor) = self.exact(key, target).await {
            debug!(page = target, "Cursor cache hit");
            let result = fetch(cursor).await?;
            self.record(key, target, &result).await;
            return Ok(result);
        }

        let (mut page, mut cursor) = match self.entries.get(key).await {
            Some(entry) => entry.closest_before(target).unwrap_or((1, None)),
            None => (1, None),
        };
        debug!(from = page, to = target, "Walking to page");

        loop {
            let result = fetch(cursor).await?;
            self.record(key, page, &result).await;

            if page == target || result.is_empty() {
                return Ok(result);
            }

            let info = result.page_info();
            match &info.end_cursor {
                Some(next) if info.has_next_page => {
                    cursor = Some(next.clone());
                    page += 1;
                }
                _ => {
                    debug!(last = page, target, "Listing ended before target page");
                    return Ok(result);
                }
            }
        }
    }

    /// Fetch a single page directly (no `page` parameter). A first-page
    /// fetch records the cursor for page 2.
    ///
    /// # Errors
    ///
    /// Returns the error from `fetch`.
    pub async fn fetch_direct<T, Fut>(
        &self,
        key: &CursorKey,
        after: Option<String>,
        fetch: impl FnOnce(Option<String>) -> Fut,
    ) -> Result<T, ShopifyError>
    where
        T: Paged,
        Fut: Future<Output = Result<T, ShopifyError>>,
    {
        let first_page = after.is_none();
        let result = fetch(after).await?;
        if first_page {
            self.record(key, 1, &result).await;
        }
        Ok(result)
    }
}

// =============================================================================
// Collection counts
// =============================================================================

/// Short-lived cache of collection product counts.
#[derive(Clone)]
pub struct ProductCountCache {
    counts: Cache<CursorKey, usize>,
}

impl ProductCountCache {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            counts: Cache::builder()
                .max_capacity(MAX_LISTINGS)
                .time_to_live(ttl)
                .build(),
        }
    }

    /// Cached count for `key`, computing it with `count` on a miss.
    ///
    /// Failures are logged and reported as zero without being cached.
    pub async fn get_or_count<Fut>(&self, key: &CursorKey, count: Fut) -> usize
    where
        Fut: Future<Output = Result<usize, ShopifyError>>,
    {
        if let Some(cached) = self.counts.get(key).await {
            return cached;
        }

        match count.await {
            Ok(total) => {
                self.counts.insert(key.clone(), total).await;
                total
            }
            Err(e) => {
                warn!(key = %key.as_str(), error = %e, "Failed to count collection products");
                0
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use super::*;

    /// A fake listing of `pages` pages whose cursors are `c1`, `c2`, ...
    /// Records which cursors were requested.
    struct FakeListing {
        pages: u32,
        requested: Mutex<Vec<Option<String>>>,
    }

    impl FakeListing {
        fn new(pages: u32) -> Self {
            Self {
                pages,
                requested: Mutex::new(Vec::new()),
            }
        }

        async fn fetch(&self, after: Option<String>) -> Result<ProductPage, ShopifyError> {
            self.requested.lock().unwrap().push(after.clone());
            let page: u32 = after
                .as_deref()
                .map_or(1, |c| c.trim_start_matches('c').parse::<u32>().unwrap() + 1);
            if page > self.pages {
                return Ok(ProductPage::default());
            }
            Ok(ProductPage {
                products: vec![],
                page_info: PageInfo {
                    has_next_page: page < self.pages,
                    has_previous_page: page > 1,
                    start_cursor: None,
                    end_cursor: Some(format!("c{page}")),
                },
            })
        }

        fn requests(&self) -> Vec<Option<String>> {
            self.requested.lock().unwrap().clone()
        }
    }

    // Fake pages carry no products; wrap them so they do not count as empty
    impl FakeListing {
        async fn fetch_nonempty(&self, after: Option<String>) -> Result<NonEmpty, ShopifyError> {
            self.fetch(after).await.map(NonEmpty)
        }
    }

    struct NonEmpty(ProductPage);

    impl Paged for NonEmpty {
        fn page_info(&self) -> &PageInfo {
            &self.0.page_info
        }

        fn is_empty(&self) -> bool {
            false
        }
    }

    fn key() -> CursorKey {
        CursorKey::new("singles", &ListingQuery::default())
    }

    #[test]
    fn test_key_is_canonical_over_filter_key_order() {
        let a = ListingQuery {
            filters: vec![json!({"price": {"min": 1, "max": 5}, "available": true})],
            ..ListingQuery::default()
        };
        let b = ListingQuery {
            filters: vec![json!({"available": true, "price": {"max": 5, "min": 1}})],
            ..ListingQuery::default()
        };
        assert_eq!(CursorKey::new("singles", &a), CursorKey::new("singles", &b));
        assert_eq!(
            CursorKey::new("singles", &ListingQuery::default()).as_str(),
            "singles:CREATED:true:[]"
        );
    }

    #[test]
    fn test_search_key_prefix() {
        let key = CursorKey::search("pikachu", &ListingQuery::default());
        assert!(key.as_str().starts_with("search:pikachu:"));
    }

    #[tokio::test]
    async fn test_cursor_round_trip() {
        let cache = CursorCache::new(Duration::from_secs(300));
        assert_eq!(cache.get_cursor(&key(), 3).await, CursorLookup::Unknown);

        cache.set_cursor(&key(), 3, Some("abc".to_string())).await;
        assert_eq!(
            cache.get_cursor(&key(), 3).await,
            CursorLookup::Known(Some("abc".to_string()))
        );
        assert_eq!(cache.get_cursor(&key(), 4).await, CursorLookup::Unknown);
    }

    #[tokio::test]
    async fn test_entry_expires_after_ttl() {
        let cache = CursorCache::new(Duration::from_millis(100));
        cache.set_cursor(&key(), 2, Some("c1".to_string())).await;

        tokio::time::sleep(Duration::from_millis(60)).await;
        // Writes do not extend the entry's life
        cache.set_cursor(&key(), 3, Some("c2".to_string())).await;
        tokio::time::sleep(Duration::from_millis(60)).await;

        assert_eq!(cache.get_cursor(&key(), 2).await, CursorLookup::Unknown);
        assert_eq!(cache.get_cursor(&key(), 3).await, CursorLookup::Unknown);
    }

    #[tokio::test]
    async fn test_walk_from_closest_known_page() {
        let cache = CursorCache::new(Duration::from_secs(300));
        let listing = FakeListing::new(10);
        // Page 1 was fetched before, so page 2's cursor is known
        cache.set_cursor(&key(), 2, Some("c1".to_string())).await;

        let page = cache
            .resolve_and_fetch(&key(), 4, |after| listing.fetch_nonempty(after))
            .await
            .unwrap();

        assert_eq!(page.0.page_info.end_cursor.as_deref(), Some("c4"));
        assert_eq!(
            listing.requests(),
            vec![
                Some("c1".to_string()),
                Some("c2".to_string()),
                Some("c3".to_string())
            ]
        );
        for (page, cursor) in [(2, "c1"), (3, "c2"), (4, "c3"), (5, "c4")] {
            assert_eq!(
                cache.get_cursor(&key(), page).await,
                CursorLookup::Known(Some(cursor.to_string()))
            );
        }
    }

    #[tokio::test]
    async fn test_exact_hit_is_single_fetch() {
        let cache = CursorCache::new(Duration::from_secs(300));
        let listing = FakeListing::new(10);
        cache.set_cursor(&key(), 6, Some("c5".to_string())).await;

        cache
            .resolve_and_fetch(&key(), 6, |after| listing.fetch_nonempty(after))
            .await
            .unwrap();

        assert_eq!(listing.requests(), vec![Some("c5".to_string())]);
        assert_eq!(
            cache.get_cursor(&key(), 7).await,
            CursorLookup::Known(Some("c6".to_string()))
        );
    }

    #[tokio::test]
    async fn test_walk_from_page_one_when_nothing_known() {
        let cache = CursorCache::new(Duration::from_secs(300));
        let listing = FakeListing::new(10);

        cache
            .resolve_and_fetch(&key(), 3, |after| listing.fetch_nonempty(after))
            .await
            .unwrap();

        assert_eq!(
            listing.requests(),
            vec![None, Some("c1".to_string()), Some("c2".to_string())]
        );
    }

    #[tokio::test]
    async fn test_target_past_end_returns_last_page() {
        let cache = CursorCache::new(Duration::from_secs(300));
        let listing = FakeListing::new(2);

        let page = cache
            .resolve_and_fetch(&key(), 5, |after| listing.fetch_nonempty(after))
            .await
            .unwrap();

        assert_eq!(page.0.page_info.end_cursor.as_deref(), Some("c2"));
        assert!(!page.0.page_info.has_next_page);
        assert_eq!(listing.requests(), vec![None, Some("c1".to_string())]);
    }

    #[tokio::test]
    async fn test_empty_page_ends_walk() {
        let cache = CursorCache::new(Duration::from_secs(300));
        let calls = AtomicUsize::new(0);

        let page = cache
            .resolve_and_fetch(&key(), 4, |_after| {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    Ok(ProductPage {
                        products: vec![],
                        page_info: PageInfo {
                            has_next_page: true,
                            end_cursor: Some("x".to_string()),
                            ..PageInfo::default()
                        },
                    })
                }
            })
            .await
            .unwrap();

        assert!(page.products.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_direct_first_page_records_page_two() {
        let cache = CursorCache::new(Duration::from_secs(300));
        let listing = FakeListing::new(3);

        cache
            .fetch_direct(&key(), None, |after| listing.fetch_nonempty(after))
            .await
            .unwrap();
        assert_eq!(
            cache.get_cursor(&key(), 2).await,
            CursorLookup::Known(Some("c1".to_string()))
        );

        cache
            .fetch_direct(&key(), Some("c1".to_string()), |after| listing.fetch_nonempty(after))
            .await
            .unwrap();
        // An explicit `after` does not say which page it is
        assert_eq!(cache.get_cursor(&key(), 3).await, CursorLookup::Unknown);
    }

    #[tokio::test]
    async fn test_count_cache_degrades_to_zero_and_does_not_cache_failures() {
        let counts = ProductCountCache::new(COUNT_CACHE_TTL);

        let failed = counts
            .get_or_count(&key(), async { Err(ShopifyError::RateLimited(1)) })
            .await;
        assert_eq!(failed, 0);

        assert_eq!(counts.get_or_count(&key(), async { Ok(42) }).await, 42);
        // Served from cache
        assert_eq!(counts.get_or_count(&key(), async { Ok(7) }).await, 42);
    }
}
