use crate::error::{FetchError, Result};
use reqwest::Client;
use std::time::Duration;

/// Issues one GET against the timeline API and hands back the raw body.
#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch `url` and return the response body.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] on any transport-level failure.
    async fn fetch(&self, url: &str) -> Result<String>;
}

/// [`Fetcher`] backed by a pooled `reqwest` client.
///
/// Non-2xx responses are not errors: the upstream does not promise strict
/// status semantics, so the body is passed on and the decoder decides.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Build a fetcher. `timeout` of `None` leaves requests unbounded.
    pub fn new(timeout: Option<Duration>) -> Result<Self> {
        let mut builder = Client::builder().use_rustls_tls();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;

        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        let network = |source: reqwest::Error| FetchError::Network {
            url: url.to_string(),
            source,
        };

        let response = self.client.get(url).send().await.map_err(network)?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), url, "Timeline API returned non-success status");
        }

        response.text().await.map_err(network)
    }
}
