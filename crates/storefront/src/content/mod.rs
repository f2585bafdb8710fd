//! Editorial content from the Sanity headless CMS.
//!
//! Content is read through Sanity's HTTP query API with GROQ queries. The
//! storefront treats content as optional: without a configured project, or
//! when Sanity is unreachable, callers get empty defaults instead of errors.
//!
//! # Example
//!
//! ```rust,ignore
//! let client = SanityClient::new(&sanity_config);
//! let events = events::load_events(Some(&client)).await;
//! ```

pub mod events;
pub mod home;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::instrument;

use crate::config::SanityConfig;

pub use events::EventItem;
pub use home::HomeSettings;

/// Errors that can occur when querying Sanity.
#[derive(Debug, Error)]
pub enum ContentError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Sanity answered with a non-success status.
    #[error("Sanity API error: {status} - {message}")]
    Api { status: u16, message: String },
}

#[derive(Debug, Deserialize)]
struct QueryResponse<T> {
    result: T,
}

/// Read-only Sanity query client.
#[derive(Clone)]
pub struct SanityClient {
    client: reqwest::Client,
    base_url: String,
    project_id: String,
    dataset: String,
}

impl SanityClient {
    /// Create a client for the configured project and dataset.
    #[must_use]
    pub fn new(config: &SanityConfig) -> Self {
        let host = if config.use_cdn { "apicdn" } else { "api" };
        Self {
            client: reqwest::Client::new(),
            base_url: format!(
                "https://{}.{host}.sanity.io/v{}",
                config.project_id, config.api_version
            ),
            project_id: config.project_id.clone(),
            dataset: config.dataset.clone(),
        }
    }

    /// Point the client at a different API root (e.g. a local mock).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Run a GROQ query and deserialize its `result`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails, Sanity returns a non-success
    /// status, or the result does not match `T`.
    #[instrument(skip(self, groq))]
    pub async fn query<T: DeserializeOwned>(&self, groq: &str) -> Result<T, ContentError> {
        let url = format!("{}/data/query/{}", self.base_url, self.dataset);
        let response = self
            .client
            .get(&url)
            .query(&[("query", groq)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ContentError::Api {
                status: status.as_u16(),
                message: message.chars().take(200).collect(),
            });
        }

        let body: QueryResponse<T> = response.json().await?;
        Ok(body.result)
    }

    /// CDN URL for an image asset reference.
    ///
    /// Sanity references look like `image-<id>-<width>x<height>-<ext>`.
    #[must_use]
    pub fn image_url(&self, asset_ref: &str) -> Option<String> {
        image_url(&self.project_id, &self.dataset, asset_ref)
    }
}

/// Build a CDN URL from an `image-<id>-<w>x<h>-<ext>` asset reference.
#[must_use]
pub fn image_url(project_id: &str, dataset: &str, asset_ref: &str) -> Option<String> {
    let rest = asset_ref.strip_prefix("image-")?;
    let (id_and_size, ext) = rest.rsplit_once('-')?;
    let (id, size) = id_and_size.rsplit_once('-')?;

    let (width, height) = size.split_once('x')?;
    if id.is_empty()
        || ext.is_empty()
        || width.parse::<u32>().is_err()
        || height.parse::<u32>().is_err()
    {
        return None;
    }

    Some(format!(
        "https://cdn.sanity.io/images/{project_id}/{dataset}/{id}-{size}.{ext}"
    ))
}

/// A Sanity image field: `{ asset: { _ref }, alt }`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImageField {
    pub asset: Option<AssetRef>,
    /// Some documents store the reference inline.
    #[serde(rename = "_ref")]
    pub inline_ref: Option<String>,
    pub alt: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssetRef {
    #[serde(rename = "_ref")]
    pub reference: String,
}

impl ImageField {
    fn reference(&self) -> Option<&str> {
        self.asset
            .as_ref()
            .map(|a| a.reference.as_str())
            .or(self.inline_ref.as_deref())
    }
}
