use crate::error::{Result, TransportError};
use async_trait::async_trait;
use log::{debug, warn};
use reqwest::Client;
use std::time::Duration;
use url::Url;

/// Plain HTTPS GET, used for certificate retrieval and the subscription
/// handshakes. Implementations must not retry.
#[async_trait]
pub trait HttpFetcher: Send + Sync {
    async fn get(&self, url: &Url, timeout: Duration) -> Result<Vec<u8>>;
}

pub struct ReqwestFetcher {
    client: Client,
}

impl ReqwestFetcher {
    pub fn new(user_agent: &str) -> Self {
        let client = Client::builder()
            .user_agent(user_agent.to_string())
            .build()
            .unwrap_or_else(|e| {
                warn!("Failed to build HTTP client with user agent {user_agent:?}: {e}; using defaults");
                Client::new()
            });

        Self { client }
    }
}

impl Default for ReqwestFetcher {
    fn default() -> Self {
        Self::new(concat!("ses-inbound/", env!("CARGO_PKG_VERSION")))
    }
}

#[async_trait]
impl HttpFetcher for ReqwestFetcher {
    async fn get(&self, url: &Url, timeout: Duration) -> Result<Vec<u8>> {
        debug!("GET {}", url);

        let response = self
            .client
            .get(url.clone())
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| classify(e, timeout))?
            .error_for_status()
            .map_err(|e| classify(e, timeout))?;

        let body = response.bytes().await.map_err(|e| classify(e, timeout))?;
        debug!("GET {} returned {} bytes", url, body.len());
        Ok(body.to_vec())
    }
}

fn classify(e: reqwest::Error, timeout: Duration) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout(timeout)
    } else {
        TransportError::Http(e)
    }
}
