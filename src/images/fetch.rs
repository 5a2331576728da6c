//! Downloading cat pictures from the status-code image provider

use crate::config::FETCH_TIMEOUT_SECS;
use bytes::Bytes;
use reqwest::Client as HttpClient;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Errors raised while downloading a picture from the provider
///
/// The enum is `Clone` because a download shared by concurrent queries
/// hands the same failure to every waiter.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// Connectivity problems, timeouts, or an interrupted body
    #[error("image request failed: {0}")]
    Network(String),
    /// The provider answered with a non-success status
    #[error("image provider returned {status} for {url}")]
    UpstreamStatus {
        /// Status the provider answered with
        status: u16,
        /// URL of the failed request
        url: String,
    },
}

/// Downloads `{code}.jpg` pictures from a configurable provider base URL
#[derive(Debug, Clone)]
pub struct CatFetcher {
    client: HttpClient,
    base_url: String,
}

impl CatFetcher {
    /// Creates a fetcher for the given provider base URL, e.g. `https://http.cat`
    #[must_use]
    pub fn new(base_url: &str) -> Self {
        let client = HttpClient::builder()
            .timeout(Duration::from_secs(FETCH_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|_| HttpClient::new());

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Returns the provider URL of the picture for `code`
    #[must_use]
    pub fn image_url(&self, code: u16) -> String {
        format!("{}/{code}.jpg", self.base_url)
    }

    /// Downloads the picture for `code`
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Network` on connectivity issues and
    /// `FetchError::UpstreamStatus` when the provider answers with a
    /// non-success status, for instance a code it has no picture for.
    pub async fn fetch(&self, code: u16) -> Result<Bytes, FetchError> {
        let url = self.image_url(code);
        debug!("Downloading {url}");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(FetchError::UpstreamStatus {
                status: response.status().as_u16(),
                url,
            });
        }

        response
            .bytes()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))
    }
}
