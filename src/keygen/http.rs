//! Key source backed by a remote key authority over HTTP.
//!
//! # Wire format
//!
//! ```text
//! POST {base_url}/keys
//! {"count": 50}
//!
//! 200 OK
//! {"keys": ["a1B2c3", "..."]}
//! ```
//!
//! Any transport failure, non-2xx status or undecodable body is reported as
//! [`Error::SourceUnavailable`]. The request timeout is the only deadline the
//! source imposes.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::KeyBatchSource;
use crate::entity::Key;
use crate::{Error, Result};

/// Request body for `POST /keys`.
#[derive(Debug, Serialize, Deserialize)]
pub struct FetchKeysRequest {
    /// Number of keys wanted.
    pub count: usize,
}

/// Response body for `POST /keys`.
#[derive(Debug, Serialize, Deserialize)]
pub struct FetchKeysResponse {
    /// Freshly issued keys.
    pub keys: Vec<Key>,
}

/// HTTP client for a remote key authority.
pub struct HttpKeySource {
    endpoint: String,
    http: Client,
}

impl HttpKeySource {
    /// Create a client for the authority at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] if the URL is not http(s) or
    /// the HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let parsed = url::Url::parse(base_url)
            .map_err(|e| Error::InvalidConfiguration(format!("invalid key source url {base_url}: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::InvalidConfiguration(format!(
                "key source url must be http(s), got {base_url}"
            )));
        }

        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::InvalidConfiguration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            endpoint: format!("{}/keys", base_url.trim_end_matches('/')),
            http,
        })
    }

    /// Full URL of the batch endpoint.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait::async_trait]
impl KeyBatchSource for HttpKeySource {
    async fn fetch_batch(&self, count: usize) -> Result<Vec<Key>> {
        debug!(endpoint = %self.endpoint, count, "Fetching key batch");

        let response = self
            .http
            .post(&self.endpoint)
            .json(&FetchKeysRequest { count })
            .send()
            .await
            .map_err(|e| Error::SourceUnavailable(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::SourceUnavailable(format!(
                "key authority returned {status}: {body}"
            )));
        }

        let body: FetchKeysResponse = response
            .json()
            .await
            .map_err(|e| Error::SourceUnavailable(format!("invalid response body: {e}")))?;

        Ok(body.keys)
    }
}
