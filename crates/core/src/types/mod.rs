//! Core types for the storefront.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod line;

pub use email::{Email, EmailError};
pub use id::*;
pub use line::{LineItem, LineItemError, validate_desired_lines};
