//! Cart reconciliation.
//!
//! Converges a remote Shopify cart to a caller-supplied list of desired
//! lines. The desired list is always the complete target contents; the
//! reconciler works out which lines to remove, update and add, and applies
//! them in that order.
//!
//! Conflict-classified failures retry the whole reconciliation with linear
//! backoff. Everything else propagates on the first attempt.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, instrument, warn};
use vdubs_core::{CartId, CartLineId, LineItem, LineItemError, validate_desired_lines};

use crate::config::TuningConfig;
use crate::shopify::{
    Cart, CartLineUpdate, CartMutation, CartUserError, ShopifyError, StorefrontClient,
    is_conflict_code, is_conflict_message,
};

// =============================================================================
// Backend seam
// =============================================================================

/// Remote cart operations the reconciler depends on.
#[async_trait]
pub trait CartBackend: Send + Sync {
    /// Fetch a cart; `None` when the ID is unknown or expired.
    async fn fetch_cart(&self, cart_id: &CartId) -> Result<Option<Cart>, ShopifyError>;

    async fn create_cart(&self, lines: &[LineItem]) -> Result<CartMutation, ShopifyError>;

    async fn add_lines(
        &self,
        cart_id: &CartId,
        lines: &[LineItem],
    ) -> Result<CartMutation, ShopifyError>;

    async fn update_lines(
        &self,
        cart_id: &CartId,
        lines: &[CartLineUpdate],
    ) -> Result<CartMutation, ShopifyError>;

    async fn remove_lines(
        &self,
        cart_id: &CartId,
        line_ids: &[CartLineId],
    ) -> Result<CartMutation, ShopifyError>;
}

#[async_trait]
impl CartBackend for StorefrontClient {
    async fn fetch_cart(&self, cart_id: &CartId) -> Result<Option<Cart>, ShopifyError> {
        self.get_cart(cart_id).await
    }

    async fn create_cart(&self, lines: &[LineItem]) -> Result<CartMutation, ShopifyError> {
        Self::create_cart(self, lines).await
    }

    async fn add_lines(
        &self,
        cart_id: &CartId,
        lines: &[LineItem],
    ) -> Result<CartMutation, ShopifyError> {
        self.add_cart_lines(cart_id, lines).await
    }

    async fn update_lines(
        &self,
        cart_id: &CartId,
        lines: &[CartLineUpdate],
    ) -> Result<CartMutation, ShopifyError> {
        self.update_cart_lines(cart_id, lines).await
    }

    async fn remove_lines(
        &self,
        cart_id: &CartId,
        line_ids: &[CartLineId],
    ) -> Result<CartMutation, ShopifyError> {
        self.remove_cart_lines(cart_id, line_ids).await
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Errors that can occur while reconciling a cart.
#[derive(Debug, Error)]
pub enum CartError {
    /// The desired lines were rejected before any remote call.
    #[error("{0}")]
    Validation(String),

    /// The cart ID is unknown or expired.
    #[error("{0}")]
    NotFound(String),

    /// Creating the cart failed.
    #[error("{0}")]
    Creation(String),

    /// A mutation reported user errors.
    #[error("{0}")]
    Mutation(String),

    /// The backend reported a concurrent modification.
    #[error("Cart was modified concurrently: {0}")]
    Conflict(String),

    /// The backend failed for a reason unrelated to the request.
    #[error(transparent)]
    Upstream(ShopifyError),
}

impl CartError {
    /// Whether retrying the reconciliation may succeed.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

impl From<ShopifyError> for CartError {
    fn from(err: ShopifyError) -> Self {
        if err.is_conflict() {
            return Self::Conflict(err.public_message());
        }
        match err {
            ShopifyError::NotFound(message) => Self::NotFound(message),
            other => Self::Upstream(other),
        }
    }
}

impl From<LineItemError> for CartError {
    fn from(err: LineItemError) -> Self {
        Self::Validation(err.to_string())
    }
}

/// Classify user errors from a mutation step.
///
/// Codes decide when present; message text is the fallback.
fn user_errors_to_cart_error(
    errors: &[CartUserError],
    otherwise: fn(String) -> CartError,
) -> CartError {
    let joined = errors
        .iter()
        .map(|e| e.message.as_str())
        .collect::<Vec<_>>()
        .join(", ");

    let conflict = if errors.iter().any(|e| e.code.is_some()) {
        errors
            .iter()
            .any(|e| e.code.as_deref().is_some_and(is_conflict_code))
    } else {
        errors.iter().any(|e| is_conflict_message(&e.message))
    };

    if conflict {
        CartError::Conflict(joined)
    } else {
        otherwise(joined)
    }
}

// =============================================================================
// Reconciler
// =============================================================================

/// Result of a successful reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reconciled {
    pub cart_id: CartId,
    pub checkout_url: Option<String>,
}

/// Bounded retry with linear backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Delay before the attempt following `attempt` (1-based).
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(250),
        }
    }
}

impl From<&TuningConfig> for RetryPolicy {
    fn from(tuning: &TuningConfig) -> Self {
        Self {
            max_attempts: tuning.cart_retry_attempts.max(1),
            base_delay: tuning.cart_retry_base_delay,
        }
    }
}

/// The three mutation sets, disjoint by variant.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct LinePlan {
    pub to_remove: Vec<CartLineId>,
    pub to_update: Vec<CartLineUpdate>,
    pub to_add: Vec<LineItem>,
}

impl LinePlan {
    /// Diff a remote cart against normalized desired lines.
    #[must_use]
    pub fn diff(remote: &Cart, desired: &[LineItem]) -> Self {
        let remote_by_variant: HashMap<_, _> = remote
            .lines
            .iter()
            .map(|line| (&line.merchandise.variant_id, line))
            .collect();
        let desired_by_variant: HashMap<_, _> = desired
            .iter()
            .map(|line| (&line.variant_id, line.quantity))
            .collect();

        let mut plan = Self::default();

        for line in desired {
            match remote_by_variant.get(&line.variant_id) {
                Some(remote_line) if remote_line.quantity != line.quantity => {
                    plan.to_update.push(CartLineUpdate {
                        line_id: remote_line.id.clone(),
                        quantity: line.quantity,
                    });
                }
                Some(_) => {}
                None => plan.to_add.push(line.clone()),
            }
        }

        plan.to_remove = remote
            .lines
            .iter()
            .filter(|line| !desired_by_variant.contains_key(&line.merchandise.variant_id))
            .map(|line| line.id.clone())
            .collect();

        plan
    }

    /// Whether the remote cart already matches.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.to_remove.is_empty() && self.to_update.is_empty() && self.to_add.is_empty()
    }
}

/// Converges remote carts to desired line lists.
#[derive(Clone)]
pub struct CartReconciler<B> {
    backend: B,
    policy: RetryPolicy,
}

impl<B: CartBackend> CartReconciler<B> {
    #[must_use]
    pub const fn new(backend: B, policy: RetryPolicy) -> Self {
        Self { backend, policy }
    }

    /// The underlying backend.
    #[must_use]
    pub const fn backend(&self) -> &B {
        &self.backend
    }

    /// Make the cart identified by `cart_id` (or a new cart) hold exactly
    /// `desired`.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Validation` for malformed lines or an empty list
    /// without a cart, `CartError::NotFound` for a stale cart ID, and the last
    /// `CartError::Conflict` once retries are exhausted. Other failures are
    /// returned from the first attempt.
    #[instrument(skip(self, desired), fields(cart_id = ?cart_id, desired_lines = desired.len()))]
    pub async fn reconcile(
        &self,
        cart_id: Option<&CartId>,
        desired: Vec<LineItem>,
    ) -> Result<Reconciled, CartError> {
        let desired = validate_desired_lines(desired)?;

        if cart_id.is_none() && desired.is_empty() {
            return Err(CartError::Validation(
                "Cart lines are required to create a cart".to_string(),
            ));
        }

        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match self.attempt(cart_id, &desired).await {
                Ok(reconciled) => return Ok(reconciled),
                Err(err) if err.is_conflict() && attempt < max_attempts => {
                    let delay = self.policy.delay_after(attempt);
                    warn!(
                        attempt,
                        max_attempts,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %err,
                        "Cart update conflicted, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    if err.is_conflict() {
                        warn!(attempt, max_attempts, error = %err, "Cart conflict retries exhausted");
                    }
                    return Err(err);
                }
            }
        }
    }

    async fn attempt(
        &self,
        cart_id: Option<&CartId>,
        desired: &[LineItem],
    ) -> Result<Reconciled, CartError> {
        let Some(cart_id) = cart_id else {
            return self.create(desired).await;
        };

        let remote = self
            .backend
            .fetch_cart(cart_id)
            .await?
            .ok_or_else(|| CartError::NotFound("Cart not found".to_string()))?;

        let plan = LinePlan::diff(&remote, desired);
        let mut checkout_url = remote.checkout_url.clone();

        if plan.is_empty() {
            return Ok(Reconciled {
                cart_id: remote.id,
                checkout_url,
            });
        }

        info!(
            remove = plan.to_remove.len(),
            update = plan.to_update.len(),
            add = plan.to_add.len(),
            "Reconciling cart"
        );

        if !plan.to_remove.is_empty() {
            let mutation = self.backend.remove_lines(cart_id, &plan.to_remove).await?;
            apply_step(mutation, &mut checkout_url)?;
        }

        if !plan.to_update.is_empty() {
            let mutation = self.backend.update_lines(cart_id, &plan.to_update).await?;
            apply_step(mutation, &mut checkout_url)?;
        }

        if !plan.to_add.is_empty() {
            let mutation = self.backend.add_lines(cart_id, &plan.to_add).await?;
            apply_step(mutation, &mut checkout_url)?;
        }

        Ok(Reconciled {
            cart_id: remote.id,
            checkout_url,
        })
    }

    async fn create(&self, desired: &[LineItem]) -> Result<Reconciled, CartError> {
        let mutation = self.backend.create_cart(desired).await?;

        if !mutation.user_errors.is_empty() {
            return Err(user_errors_to_cart_error(
                &mutation.user_errors,
                CartError::Creation,
            ));
        }

        let cart = mutation
            .cart
            .ok_or_else(|| CartError::Creation("Failed to create cart".to_string()))?;

        Ok(Reconciled {
            cart_id: cart.id,
            checkout_url: cart.checkout_url,
        })
    }
}

/// Check a mutation step and carry its checkout URL forward.
fn apply_step(mutation: CartMutation, checkout_url: &mut Option<String>) -> Result<(), CartError> {
    if !mutation.user_errors.is_empty() {
        return Err(user_errors_to_cart_error(
            &mutation.user_errors,
            CartError::Mutation,
        ));
    }

    if let Some(url) = mutation.cart.and_then(|cart| cart.checkout_url) {
        *checkout_url = Some(url);
    }

    Ok(())
}
