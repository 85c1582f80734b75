//! Marketplace REST API client.
//!
//! # Authentication
//!
//! - Catalog endpoints (products, categories, ratings, view tracking) use
//!   HTTP Basic credentials from configuration.
//! - Cart endpoints use the buyer's bearer token, set after sign-in via
//!   [`ApiClient::set_token`].
//!
//! # Example
//!
//! ```rust,ignore
//! use bazaar_storefront::api::{ApiClient, ProductsListParams};
//!
//! let client = ApiClient::new(&config.api)?;
//! let page = client.get_products(&ProductsListParams::active().page(1)).await?;
//! ```

mod cart;
mod categories;
mod products;
pub mod types;

pub use categories::CategoriesListParams;
pub use products::ProductsListParams;
pub use types::*;

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::{Method, RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::sync::RwLock;
use url::Url;

use crate::config::ApiConfig;

/// Errors that can occur when talking to the marketplace API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP request failed before a response arrived.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with a non-success status or an error envelope.
    #[error("API error: {status} - {message}")]
    Status { status: u16, message: String },

    /// Rate limited by the API.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Endpoint URL could not be built.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// A cart endpoint was called without a signed-in buyer.
    #[error("No access token set")]
    MissingToken,
}

impl ApiError {
    /// HTTP status carried by the error, if any.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::RateLimited(_) => Some(StatusCode::TOO_MANY_REQUESTS.as_u16()),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            Self::MissingToken => Some(StatusCode::UNAUTHORIZED.as_u16()),
            Self::Parse(_) | Self::Url(_) => None,
        }
    }

    /// Whether the error means the requested entity does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(StatusCode::NOT_FOUND.as_u16())
    }
}

/// Map an API error to text fit for showing a buyer.
///
/// Every surface that reports a backend failure goes through this function so
/// the wording stays consistent.
#[must_use]
pub fn user_message(err: &ApiError) -> String {
    match err {
        ApiError::Http(e) if e.is_timeout() => {
            "The request timed out. Please try again.".to_string()
        }
        ApiError::Http(_) => "Unable to reach the server. Check your connection.".to_string(),
        ApiError::RateLimited(secs) => {
            format!("Too many requests. Please wait {secs} seconds and try again.")
        }
        ApiError::MissingToken => "Please sign in to continue.".to_string(),
        ApiError::Parse(_) | ApiError::Url(_) => {
            "Received an unexpected response from the server.".to_string()
        }
        ApiError::Status { status, message } => match *status {
            401 | 403 => "Your session has expired. Please sign in again.".to_string(),
            404 if message.trim().is_empty() => {
                "The requested item could not be found.".to_string()
            }
            500..=599 => "Something went wrong on our end. Please try again later.".to_string(),
            _ if !message.trim().is_empty() => message.clone(),
            _ => format!("Request failed with status {status}."),
        },
    }
}

/// Client for the marketplace REST API.
///
/// Cheap to clone; all clones share the HTTP connection pool and token.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    client: reqwest::Client,
    base_url: Url,
    basic_auth: SecretString,
    /// Buyer bearer token for cart endpoints
    token: RwLock<Option<SecretString>>,
}

impl ApiClient {
    /// Create a new API client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;

        let credentials = format!(
            "{}:{}",
            config.username,
            config.password.expose_secret()
        );
        let basic_auth = SecretString::from(format!("Basic {}", BASE64.encode(credentials)));

        Ok(Self {
            inner: Arc::new(ApiClientInner {
                client,
                base_url: normalize_base(config.base_url.clone()),
                basic_auth,
                token: RwLock::new(None),
            }),
        })
    }

    // =========================================================================
    // Authentication
    // =========================================================================

    /// Set the buyer's bearer token (after sign-in or when restoring a session).
    pub async fn set_token(&self, token: SecretString) {
        *self.inner.token.write().await = Some(token);
    }

    /// Clear the bearer token (on sign-out).
    pub async fn clear_token(&self) {
        *self.inner.token.write().await = None;
    }

    /// Whether a bearer token is set.
    pub async fn has_token(&self) -> bool {
        self.inner.token.read().await.is_some()
    }

    // =========================================================================
    // Request plumbing
    // =========================================================================

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        Ok(self.inner.base_url.join(path.trim_start_matches('/'))?)
    }

    /// Build a request authenticated with the catalog Basic credentials.
    fn basic(&self, method: Method, path: &str) -> Result<RequestBuilder, ApiError> {
        let url = self.endpoint(path)?;
        Ok(self
            .inner
            .client
            .request(method, url)
            .header(
                reqwest::header::AUTHORIZATION,
                self.inner.basic_auth.expose_secret(),
            )
            .header(reqwest::header::ACCEPT, "application/json"))
    }

    /// Build a request authenticated with the buyer's bearer token.
    async fn bearer(&self, method: Method, path: &str) -> Result<RequestBuilder, ApiError> {
        let url = self.endpoint(path)?;
        let token = self.inner.token.read().await;
        let token = token.as_ref().ok_or(ApiError::MissingToken)?;
        Ok(self
            .inner
            .client
            .request(method, url)
            .bearer_auth(token.expose_secret())
            .header(reqwest::header::ACCEPT, "application/json"))
    }

    /// Send a request and decode the JSON body.
    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(ApiError::RateLimited(retry_after));
        }

        // Get response body as text first for better error diagnostics
        let body = response.text().await?;

        if !status.is_success() {
            tracing::debug!(
                status = %status,
                body = %body.chars().take(500).collect::<String>(),
                "API returned non-success status"
            );
            return Err(ApiError::Status {
                status: status.as_u16(),
                message: extract_message(&body),
            });
        }

        serde_json::from_str(&body).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %body.chars().take(500).collect::<String>(),
                "Failed to parse API response"
            );
            ApiError::Parse(e)
        })
    }
}

/// Ensure the base URL ends with `/` so relative joins keep its path.
fn normalize_base(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

/// Pull the `message` field out of an error body, falling back to the raw text.
fn extract_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(String::from))
        .unwrap_or_else(|| body.chars().take(200).collect())
}

/// Turn an `error: true` envelope into an [`ApiError`].
fn check_envelope(status: u16, error: bool, message: &str) -> Result<(), ApiError> {
    if error {
        return Err(ApiError::Status {
            status: if status == 0 { 400 } else { status },
            message: message.to_string(),
        });
    }
    Ok(())
}
