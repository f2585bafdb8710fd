//! Shopify Storefront API client.
//!
//! # Architecture
//!
//! - Typed operations implement `graphql_client::GraphQLQuery`
//! - Shopify is source of truth: carts live remotely, listings are fetched live
//! - Requests carry the storefront token when configured and fall back to
//!   tokenless access when Shopify rejects it with 401
//!
//! # Example
//!
//! ```rust,ignore
//! use vdubs_storefront::shopify::StorefrontClient;
//!
//! let client = StorefrontClient::new(&config.shopify);
//!
//! let page = client
//!     .get_collection_products("singles", &ListingQuery::default(), None)
//!     .await?;
//! let menu = client.get_menu("main-menu", Access::Tokenless).await?;
//! ```

mod storefront;
pub mod types;

pub use storefront::{Access, PAGE_SIZE, StorefrontClient};
pub use types::*;

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

/// Structured error codes treated as a concurrent-write conflict.
pub const CONFLICT_CODES: &[&str] = &["CONFLICT", "CART_CONFLICT", "CONCURRENT_MODIFICATION"];

/// Fallback for backends that only report conflicts in prose.
static CONFLICT_MESSAGE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(conflict|concurrent(ly)?|was modified|has been modified|version mismatch)\b")
        .ok()
});

/// Errors that can occur when interacting with Shopify APIs.
#[derive(Debug, Error)]
pub enum ShopifyError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// GraphQL query returned errors.
    #[error("GraphQL errors: {}", format_graphql_errors(.0))]
    GraphQL(Vec<GraphQLError>),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rate limited by Shopify.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// User error from mutation (e.g., invalid input).
    #[error("User error: {0}")]
    UserError(String),
}

impl ShopifyError {
    /// Whether this failure reports a concurrent modification of the target.
    ///
    /// Structured `extensions.code` values are checked first; message text is
    /// only consulted when no error carries a code.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        match self {
            Self::GraphQL(errors) => {
                if errors.iter().any(|e| e.code.is_some()) {
                    errors
                        .iter()
                        .any(|e| e.code.as_deref().is_some_and(is_conflict_code))
                } else {
                    errors.iter().any(|e| is_conflict_message(&e.message))
                }
            }
            Self::UserError(message) => is_conflict_message(message),
            Self::Http(_) | Self::Parse(_) | Self::NotFound(_) | Self::RateLimited(_) => false,
        }
    }

    /// Human-readable message suitable for an API response body.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::GraphQL(errors) => errors
                .iter()
                .map(|e| e.message.as_str())
                .filter(|m| !m.is_empty())
                .collect::<Vec<_>>()
                .join(", "),
            Self::NotFound(message) | Self::UserError(message) => message.clone(),
            Self::Http(_) => "Commerce backend unreachable".to_string(),
            Self::Parse(_) => "Malformed response from commerce backend".to_string(),
            Self::RateLimited(_) => "Commerce backend is rate limiting requests".to_string(),
        }
    }
}

/// Whether a structured error code denotes a conflict.
#[must_use]
pub fn is_conflict_code(code: &str) -> bool {
    CONFLICT_CODES
        .iter()
        .any(|known| known.eq_ignore_ascii_case(code))
}

/// Whether free-form error text reads like a conflict.
#[must_use]
pub fn is_conflict_message(message: &str) -> bool {
    CONFLICT_MESSAGE
        .as_ref()
        .is_some_and(|re| re.is_match(message))
}

/// A GraphQL error returned by the Shopify API.
#[derive(Debug, Clone, Default)]
pub struct GraphQLError {
    /// Error message.
    pub message: String,
    /// Source locations in the query.
    pub locations: Vec<GraphQLErrorLocation>,
    /// Path to the error in the response.
    pub path: Vec<serde_json::Value>,
    /// `extensions.code`, when Shopify provides one.
    pub code: Option<String>,
}

impl GraphQLError {
    /// Error carrying only a message.
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }
}

/// Location in a GraphQL query where an error occurred.
#[derive(Debug, Clone)]
pub struct GraphQLErrorLocation {
    /// Line number (1-indexed).
    pub line: i64,
    /// Column number (1-indexed).
    pub column: i64,
}

fn format_graphql_errors(errors: &[GraphQLError]) -> String {
    if errors.is_empty() {
        return "(no error details provided)".to_string();
    }

    errors
        .iter()
        .enumerate()
        .map(|(i, e)| {
            let mut parts = Vec::new();

            if !e.message.is_empty() {
                parts.push(e.message.clone());
            }

            if !e.path.is_empty() {
                let path_str = e
                    .path
                    .iter()
                    .map(|p| match p {
                        serde_json::Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect::<Vec<_>>()
                    .join(".");
                parts.push(format!("path: {path_str}"));
            }

            if let Some(loc) = e.locations.first() {
                parts.push(format!("at line {}:{}", loc.line, loc.column));
            }

            if parts.is_empty() {
                format!("[error {}]: (no details)", i + 1)
            } else {
                parts.join(" ")
            }
        })
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shopify_error_display() {
        let err = ShopifyError::NotFound("collection singles".to_string());
        assert_eq!(err.to_string(), "Not found: collection singles");
    }

    #[test]
    fn test_graphql_error_formatting() {
        let errors = vec![
            GraphQLError::message("Field not found"),
            GraphQLError::message("Invalid ID"),
        ];
        let err = ShopifyError::GraphQL(errors);
        assert_eq!(
            err.to_string(),
            "GraphQL errors: Field not found; Invalid ID"
        );
    }

    #[test]
    fn test_graphql_error_path_and_location() {
        let errors = vec![GraphQLError {
            message: String::new(),
            locations: vec![GraphQLErrorLocation { line: 5, column: 10 }],
            path: vec![
                serde_json::Value::String("cart".to_string()),
                serde_json::Value::Number(0.into()),
            ],
            code: None,
        }];
        let err = ShopifyError::GraphQL(errors);
        assert_eq!(err.to_string(), "GraphQL errors: path: cart.0 at line 5:10");
    }

    #[test]
    fn test_graphql_error_empty_vec() {
        let err = ShopifyError::GraphQL(vec![]);
        assert_eq!(
            err.to_string(),
            "GraphQL errors: (no error details provided)"
        );
    }

    #[test]
    fn test_conflict_detected_by_code() {
        let err = ShopifyError::GraphQL(vec![GraphQLError {
            code: Some("conflict".to_string()),
            ..GraphQLError::message("Please retry")
        }]);
        assert!(err.is_conflict());
    }

    #[test]
    fn test_code_takes_precedence_over_message() {
        // A coded error is authoritative even if the prose mentions a conflict
        let err = ShopifyError::GraphQL(vec![GraphQLError {
            code: Some("THROTTLED".to_string()),
            ..GraphQLError::message("Conflict while throttled")
        }]);
        assert!(!err.is_conflict());
    }

    #[test]
    fn test_conflict_detected_by_message_fallback() {
        let err = ShopifyError::GraphQL(vec![GraphQLError::message(
            "The cart was modified by another request",
        )]);
        assert!(err.is_conflict());

        let err = ShopifyError::UserError("Concurrent update rejected".to_string());
        assert!(err.is_conflict());
    }

    #[test]
    fn test_non_conflict_errors() {
        assert!(!ShopifyError::RateLimited(2).is_conflict());
        assert!(!ShopifyError::NotFound("cart".to_string()).is_conflict());
        assert!(
            !ShopifyError::GraphQL(vec![GraphQLError::message("Invalid merchandise id")])
                .is_conflict()
        );
    }

    #[test]
    fn test_public_message_joins_graphql_messages() {
        let err = ShopifyError::GraphQL(vec![
            GraphQLError::message("first"),
            GraphQLError::message(""),
            GraphQLError::message("second"),
        ]);
        assert_eq!(err.public_message(), "first, second");
    }

    #[test]
    fn test_rate_limited_error() {
        let err = ShopifyError::RateLimited(60);
        assert_eq!(err.to_string(), "Rate limited, retry after 60 seconds");
    }
}
