//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.
//! Responses carry a JSON body of the form `{"error": "..."}`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::services::cart::CartError;
use crate::services::newsletter::NewsletterError;
use crate::shopify::ShopifyError;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Cart reconciliation failed.
    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    /// Shopify API operation failed.
    #[error("Shopify error: {0}")]
    Shopify(#[from] ShopifyError),

    /// Newsletter provider rejected the sign-up.
    #[error("Newsletter error: {0}")]
    Newsletter(#[from] NewsletterError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// A required integration is not configured.
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Cart(err) => match err {
                CartError::Validation(_) => StatusCode::BAD_REQUEST,
                CartError::NotFound(_) => StatusCode::NOT_FOUND,
                CartError::Conflict(_) => StatusCode::CONFLICT,
                CartError::Creation(_) | CartError::Mutation(_) | CartError::Upstream(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Shopify(ShopifyError::NotFound(_)) | Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Shopify(_) | Self::Newsletter(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message returned to the client.
    ///
    /// Upstream messages are passed through; internal details are not.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::Cart(CartError::Upstream(err)) | Self::Shopify(err) => err.public_message(),
            Self::Cart(err) => err.to_string(),
            Self::Newsletter(err) => err.public_message(),
            Self::NotFound(message)
            | Self::BadRequest(message)
            | Self::ServiceUnavailable(message) => message.clone(),
            Self::Internal(_) => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() && status != StatusCode::SERVICE_UNAVAILABLE {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else if status == StatusCode::CONFLICT {
            tracing::warn!(error = %self, "Cart conflict after retries");
        }

        let body = serde_json::json!({ "error": self.public_message() });
        (status, Json(body)).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Reconciled cart", Some(&[("line_count", "3")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shopify::GraphQLError;

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("collection singles".to_string());
        assert_eq!(err.to_string(), "Not found: collection singles");

        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            get_status(AppError::NotFound("test".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::BadRequest("test".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::ServiceUnavailable("test".to_string())),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            get_status(AppError::Internal("test".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_cart_error_status_codes() {
        let cases = [
            (CartError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (CartError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (CartError::Creation("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (CartError::Mutation("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (CartError::Conflict("x".into()), StatusCode::CONFLICT),
            (
                CartError::Upstream(ShopifyError::RateLimited(1)),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(AppError::from(err).status(), expected);
        }
    }

    #[test]
    fn test_shopify_not_found_is_404() {
        let err = AppError::from(ShopifyError::NotFound("Page 9 not found".to_string()));
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.public_message(), "Page 9 not found");
    }

    #[test]
    fn test_upstream_messages_are_exposed() {
        let err = AppError::from(ShopifyError::GraphQL(vec![GraphQLError::message(
            "Throttled",
        )]));
        assert_eq!(err.public_message(), "Throttled");

        let err = AppError::from(CartError::Mutation("Variant sold out".to_string()));
        assert_eq!(err.public_message(), "Variant sold out");
    }

    #[test]
    fn test_internal_details_hidden() {
        let err = AppError::Internal("connection pool exhausted".to_string());
        assert_eq!(err.public_message(), "Internal server error");
    }
}
