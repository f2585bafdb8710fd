//! Business logic services for storefront.
//!
//! # Services
//!
//! - `cart` - Converges a remote Shopify cart to a desired line list
//! - `cart_store` - Local cart state machine (`clean`/`syncing`/`dirty`)
//! - `newsletter` - Brevo newsletter sign-ups

pub mod cart;
pub mod cart_store;
pub mod newsletter;
