//! Cart line items as requested by the browser.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::types::id::VariantId;

/// A requested cart line: a product variant and how many of it.
///
/// A list of line items always describes the complete desired contents of a
/// cart, never a delta.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    /// Product variant (merchandise) ID.
    pub variant_id: VariantId,
    /// Requested quantity. Zero means "remove".
    pub quantity: i64,
}

impl LineItem {
    /// Create a new line item.
    #[must_use]
    pub fn new(variant_id: impl Into<VariantId>, quantity: i64) -> Self {
        Self {
            variant_id: variant_id.into(),
            quantity,
        }
    }
}

/// Errors for a desired line list that cannot be reconciled.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum LineItemError {
    /// A line carried a negative quantity.
    #[error("quantity for {0} must not be negative")]
    NegativeQuantity(VariantId),
    /// The same variant appeared on more than one line.
    #[error("variant {0} appears on more than one line")]
    DuplicateVariant(VariantId),
    /// A line had an empty variant ID.
    #[error("variantId cannot be empty")]
    EmptyVariantId,
}

/// Normalize a desired line list before reconciliation.
///
/// Lines with quantity zero are dropped (absence means removal). Duplicate
/// variants are rejected rather than merged: merging belongs to the layer
/// that accumulates additions.
///
/// # Errors
///
/// Returns a [`LineItemError`] for negative quantities, empty variant IDs, or
/// duplicate variants.
pub fn validate_desired_lines(lines: Vec<LineItem>) -> Result<Vec<LineItem>, LineItemError> {
    let mut seen = HashSet::with_capacity(lines.len());
    let mut out = Vec::with_capacity(lines.len());

    for line in lines {
        if line.variant_id.as_str().trim().is_empty() {
            return Err(LineItemError::EmptyVariantId);
        }
        if line.quantity < 0 {
            return Err(LineItemError::NegativeQuantity(line.variant_id));
        }
        if !seen.insert(line.variant_id.clone()) {
            return Err(LineItemError::DuplicateVariant(line.variant_id));
        }
        if line.quantity > 0 {
            out.push(line);
        }
    }

    Ok(out)
}
