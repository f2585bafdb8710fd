//! VDubs Core - Shared domain types.
//!
//! This crate provides the types shared by the storefront service and its
//! integration tests:
//! - `storefront` - JSON API in front of the commerce and content backends
//! - `integration-tests` - End-to-end tests against a mock commerce backend
//!
//! # Architecture
//!
//! The core crate contains only types and validation - no I/O, no HTTP
//! clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for Shopify IDs, emails, and cart line items

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
