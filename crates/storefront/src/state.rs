//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::StorefrontConfig;
use crate::content::SanityClient;
use crate::pagination::{COUNT_CACHE_TTL, CursorCache, ProductCountCache};
use crate::services::cart::{CartReconciler, RetryPolicy};
use crate::services::newsletter::{NewsletterClient, NewsletterError};
use crate::shopify::StorefrontClient;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to the
/// upstream clients, the pagination caches, and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    storefront: StorefrontClient,
    reconciler: CartReconciler<StorefrontClient>,
    cursors: CursorCache,
    counts: ProductCountCache,
    sanity: Option<SanityClient>,
    newsletter: Option<NewsletterClient>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// Content and newsletter clients are only built when configured.
    ///
    /// # Errors
    ///
    /// Returns an error if the newsletter client cannot be built.
    pub fn new(config: StorefrontConfig) -> Result<Self, NewsletterError> {
        let sanity = config.sanity.as_ref().map(SanityClient::new);
        let newsletter = config
            .newsletter
            .as_ref()
            .map(NewsletterClient::new)
            .transpose()?;

        Ok(Self::with_clients(config, sanity, newsletter))
    }

    /// Create state with explicitly constructed content and newsletter clients.
    #[must_use]
    pub fn with_clients(
        config: StorefrontConfig,
        sanity: Option<SanityClient>,
        newsletter: Option<NewsletterClient>,
    ) -> Self {
        let storefront = StorefrontClient::new(&config.shopify);
        let reconciler =
            CartReconciler::new(storefront.clone(), RetryPolicy::from(&config.tuning));
        let cursors = CursorCache::new(config.tuning.cursor_cache_ttl);
        let counts = ProductCountCache::new(COUNT_CACHE_TTL);

        Self {
            inner: Arc::new(AppStateInner {
                config,
                storefront,
                reconciler,
                cursors,
                counts,
                sanity,
                newsletter,
            }),
        }
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the Shopify Storefront API client.
    #[must_use]
    pub fn storefront(&self) -> &StorefrontClient {
        &self.inner.storefront
    }

    /// Get a reference to the cart reconciler.
    #[must_use]
    pub fn reconciler(&self) -> &CartReconciler<StorefrontClient> {
        &self.inner.reconciler
    }

    /// Get a reference to the pagination cursor cache.
    #[must_use]
    pub fn cursors(&self) -> &CursorCache {
        &self.inner.cursors
    }

    /// Get a reference to the product count cache.
    #[must_use]
    pub fn counts(&self) -> &ProductCountCache {
        &self.inner.counts
    }

    /// Get the Sanity client, if content is configured.
    #[must_use]
    pub fn sanity(&self) -> Option<&SanityClient> {
        self.inner.sanity.as_ref()
    }

    /// Get the newsletter client, if configured.
    #[must_use]
    pub fn newsletter(&self) -> Option<&NewsletterClient> {
        self.inner.newsletter.as_ref()
    }
}
