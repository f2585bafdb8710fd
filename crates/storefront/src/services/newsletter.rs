//! Brevo API client for newsletter sign-ups.
//!
//! A sign-up creates (or updates) the contact with the list attached. Brevo
//! answers 400 when the contact already exists in a way it won't merge, in
//! which case the email is added to the list directly.

use reqwest::StatusCode;
use reqwest::header::{HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::Deserialize;
use thiserror::Error;
use tracing::{instrument, warn};
use vdubs_core::Email;

use crate::config::NewsletterConfig;

/// Brevo API base URL.
const BASE_URL: &str = "https://api.brevo.com/v3";

/// Errors that can occur when interacting with the Brevo API.
#[derive(Debug, Error)]
pub enum NewsletterError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// The API key cannot be sent as a header.
    #[error("Invalid API key format: {0}")]
    InvalidKey(String),
}

impl NewsletterError {
    /// Message safe to show the subscriber.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::Api { message, .. } if !message.is_empty() => message.clone(),
            _ => "Subscription failed".to_string(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// Brevo API client.
#[derive(Clone)]
pub struct NewsletterClient {
    client: reqwest::Client,
    base_url: String,
    list_id: i64,
}

impl NewsletterClient {
    /// Create a new Brevo client.
    ///
    /// # Errors
    ///
    /// Returns error if the API key is not a valid header value or the HTTP
    /// client fails to build.
    pub fn new(config: &NewsletterConfig) -> Result<Self, NewsletterError> {
        let mut headers = HeaderMap::new();
        let mut api_key = HeaderValue::from_str(config.api_key.expose_secret())
            .map_err(|e| NewsletterError::InvalidKey(e.to_string()))?;
        api_key.set_sensitive(true);
        headers.insert("api-key", api_key);
        headers.insert("Accept", HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url: BASE_URL.to_string(),
            list_id: config.list_id,
        })
    }

    /// Point the client at a different API root (e.g. a local mock).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Subscribe an email to the configured list.
    ///
    /// # Errors
    ///
    /// Returns error if both the create and the add-to-list requests fail.
    #[instrument(skip(self), fields(domain = %email.domain()))]
    pub async fn subscribe(&self, email: &Email) -> Result<(), NewsletterError> {
        let url = format!("{}/contacts", self.base_url);
        let body = serde_json::json!({
            "email": email.as_str(),
            "listIds": [self.list_id],
            "updateEnabled": true,
        });

        let response = self.client.post(&url).json(&body).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let create_error = error_message(response).await;
        if status != StatusCode::BAD_REQUEST {
            warn!(status = status.as_u16(), message = ?create_error, "Brevo contact create failed");
            return Err(NewsletterError::Api {
                status: status.as_u16(),
                message: create_error.unwrap_or_default(),
            });
        }

        self.add_to_list(email, create_error).await
    }

    async fn add_to_list(
        &self,
        email: &Email,
        create_error: Option<String>,
    ) -> Result<(), NewsletterError> {
        let url = format!(
            "{}/contacts/lists/{}/contacts/add",
            self.base_url, self.list_id
        );
        let body = serde_json::json!({ "emails": [email.as_str()] });

        let response = self.client.post(&url).json(&body).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let add_error = error_message(response).await;
        warn!(status = status.as_u16(), message = ?add_error, "Brevo add-to-list failed");
        Err(NewsletterError::Api {
            status: status.as_u16(),
            message: add_error.or(create_error).unwrap_or_default(),
        })
    }
}

async fn error_message(response: reqwest::Response) -> Option<String> {
    response
        .json::<ErrorBody>()
        .await
        .ok()
        .and_then(|body| body.message)
        .filter(|m| !m.is_empty())
}
