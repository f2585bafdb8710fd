//! Local cart state with explicit synchronization.
//!
//! A `CartStore` owns the shopper's intended cart contents and pushes them
//! to Shopify through the [`CartReconciler`]. Its sync status is an explicit
//! state machine:
//!
//! ```text
//!   local edit          sync()            success, no edits meanwhile
//! Clean ─────▶ Dirty ─────────▶ Syncing ─────────────────────────────▶ Clean
//!                ▲                 │
//!                └─────────────────┘ failure, or edited while syncing
//! ```
//!
//! Every transition is published on a `tokio::sync::watch` channel so
//! observers (badges, checkout buttons) always see the latest snapshot.

use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, instrument, warn};
use vdubs_core::{CartId, LineItem, VariantId};

use super::cart::{CartBackend, CartError, CartReconciler, Reconciled};
use crate::shopify::Cart;

/// Whether local lines match the remote cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncState {
    /// Remote cart matches local lines.
    Clean,
    /// A sync is in flight.
    Syncing,
    /// Local lines changed since the last successful sync.
    Dirty,
}

/// What observers see after every transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartSnapshot {
    pub state: SyncState,
    pub cart_id: Option<CartId>,
    pub checkout_url: Option<String>,
    pub item_count: i64,
}

struct StoreInner {
    lines: Vec<LineItem>,
    cart_id: Option<CartId>,
    checkout_url: Option<String>,
    state: SyncState,
    /// Bumped on every local edit; lets a finishing sync detect edits made
    /// while it was in flight.
    revision: u64,
    /// Bumped by `clear`; a sync that started before it must not restore
    /// the forgotten cart.
    generation: u64,
}

impl StoreInner {
    fn snapshot(&self) -> CartSnapshot {
        CartSnapshot {
            state: self.state,
            cart_id: self.cart_id.clone(),
            checkout_url: self.checkout_url.clone(),
            item_count: self.lines.iter().map(|line| line.quantity).sum(),
        }
    }

    fn touch(&mut self) {
        self.revision += 1;
        self.state = SyncState::Dirty;
    }
}

/// A shopper's cart, kept in sync with Shopify on demand.
pub struct CartStore<B> {
    reconciler: CartReconciler<B>,
    inner: Mutex<StoreInner>,
    /// Serializes syncs so at most one reconciliation is in flight.
    sync_lock: tokio::sync::Mutex<()>,
    updates: watch::Sender<CartSnapshot>,
}

impl<B: CartBackend> CartStore<B> {
    /// An empty, clean cart.
    #[must_use]
    pub fn new(reconciler: CartReconciler<B>) -> Self {
        let inner = StoreInner {
            lines: Vec::new(),
            cart_id: None,
            checkout_url: None,
            state: SyncState::Clean,
            revision: 0,
            generation: 0,
        };
        let (updates, _) = watch::channel(inner.snapshot());

        Self {
            reconciler,
            inner: Mutex::new(inner),
            sync_lock: tokio::sync::Mutex::new(()),
            updates,
        }
    }

    /// Subscribe to snapshots. The receiver starts at the current one.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CartSnapshot> {
        self.updates.subscribe()
    }

    #[must_use]
    pub fn snapshot(&self) -> CartSnapshot {
        self.lock().snapshot()
    }

    /// Current local lines.
    #[must_use]
    pub fn lines(&self) -> Vec<LineItem> {
        self.lock().lines.clone()
    }

    /// Add `quantity` of a variant, merging into an existing line.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Validation` if `quantity` is not positive.
    pub fn add_line(&self, variant_id: VariantId, quantity: i64) -> Result<(), CartError> {
        if quantity <= 0 {
            return Err(CartError::Validation(
                "Quantity to add must be positive".to_string(),
            ));
        }

        self.edit(|inner| {
            if let Some(line) = inner.lines.iter_mut().find(|l| l.variant_id == variant_id) {
                line.quantity += quantity;
            } else {
                inner.lines.push(LineItem::new(variant_id, quantity));
            }
        });
        Ok(())
    }

    /// Set a variant's quantity. Zero or less removes the line.
    pub fn update_quantity(&self, variant_id: &VariantId, quantity: i64) {
        self.edit(|inner| {
            if quantity <= 0 {
                inner.lines.retain(|l| &l.variant_id != variant_id);
            } else if let Some(line) = inner.lines.iter_mut().find(|l| &l.variant_id == variant_id)
            {
                line.quantity = quantity;
            } else {
                inner.lines.push(LineItem::new(variant_id.clone(), quantity));
            }
        });
    }

    pub fn remove_line(&self, variant_id: &VariantId) {
        self.update_quantity(variant_id, 0);
    }

    /// Empty the cart and forget the remote cart and its checkout URL.
    pub fn clear(&self) {
        self.edit(|inner| {
            inner.lines.clear();
            inner.cart_id = None;
            inner.checkout_url = None;
            inner.generation += 1;
        });
    }

    /// Replace local state with a fetched cart.
    pub fn hydrate(&self, cart: &Cart) {
        let mut inner = self.lock();
        inner.lines = cart
            .lines
            .iter()
            .map(|line| LineItem::new(line.merchandise.variant_id.clone(), line.quantity))
            .collect();
        inner.cart_id = Some(cart.id.clone());
        inner.checkout_url.clone_from(&cart.checkout_url);
        inner.revision += 1;
        inner.state = SyncState::Clean;
        self.publish(&inner);
    }

    /// Push local lines to Shopify.
    ///
    /// A stale cart ID is dropped and the sync restarts once with a fresh
    /// cart.
    ///
    /// # Errors
    ///
    /// Returns the reconciliation error; the store is left `Dirty`.
    #[instrument(skip(self))]
    pub async fn sync(&self) -> Result<CartSnapshot, CartError> {
        let _guard = self.sync_lock.lock().await;

        let (lines, cart_id, revision, generation) = {
            let mut inner = self.lock();
            if inner.state == SyncState::Clean {
                return Ok(inner.snapshot());
            }
            if inner.lines.is_empty() && inner.cart_id.is_none() {
                inner.state = SyncState::Clean;
                self.publish(&inner);
                return Ok(inner.snapshot());
            }
            inner.state = SyncState::Syncing;
            self.publish(&inner);
            (
                inner.lines.clone(),
                inner.cart_id.clone(),
                inner.revision,
                inner.generation,
            )
        };

        let mut stale = false;
        // `None` means the stale cart was dropped and there was nothing to recreate
        let outcome = match self.reconciler.reconcile(cart_id.as_ref(), lines.clone()).await {
            Err(CartError::NotFound(_)) if cart_id.is_some() => {
                warn!("Cart no longer exists remotely, starting a new one");
                stale = true;
                if lines.is_empty() {
                    Ok(None)
                } else {
                    self.reconciler.reconcile(None, lines).await.map(Some)
                }
            }
            other => other.map(Some),
        };

        let mut inner = self.lock();
        let cleared = inner.generation != generation;
        if stale && inner.cart_id == cart_id {
            inner.cart_id = None;
            inner.checkout_url = None;
        }

        match outcome {
            Ok(reconciled) => {
                if let Some(Reconciled {
                    cart_id,
                    checkout_url,
                }) = reconciled
                    && !cleared
                {
                    inner.cart_id = Some(cart_id);
                    inner.checkout_url = checkout_url;
                }
                inner.state = if inner.revision == revision {
                    SyncState::Clean
                } else {
                    debug!("Cart edited during sync");
                    SyncState::Dirty
                };
                self.publish(&inner);
                Ok(inner.snapshot())
            }
            Err(err) => {
                inner.state = SyncState::Dirty;
                self.publish(&inner);
                Err(err)
            }
        }
    }

    fn edit(&self, apply: impl FnOnce(&mut StoreInner)) {
        let mut inner = self.lock();
        apply(&mut inner);
        inner.touch();
        self.publish(&inner);
    }

    fn publish(&self, inner: &StoreInner) {
        self.updates.send_replace(inner.snapshot());
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
