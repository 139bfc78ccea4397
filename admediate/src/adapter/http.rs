//! HTTP client abstraction for adapter transports.
//!
//! Adapters that reach a network over HTTP go through [`AsyncHttpClient`]
//! so tests can inject a mock instead of a live `reqwest` client.

use super::types::AdapterError;
use std::future::Future;
use tracing::{trace, warn};

/// Default User-Agent for outbound adapter requests.
const DEFAULT_USER_AGENT: &str = concat!("admediate/", env!("CARGO_PKG_VERSION"));

/// Trait for asynchronous HTTP operations used by adapters.
pub trait AsyncHttpClient: Send + Sync {
    /// Performs an async HTTP POST with a JSON body.
    ///
    /// # Arguments
    ///
    /// * `url` - The URL to request
    /// * `json_body` - JSON body as a string
    ///
    /// # Returns
    ///
    /// The response body as bytes or an error.
    fn post_json(
        &self,
        url: &str,
        json_body: &str,
    ) -> impl Future<Output = Result<Vec<u8>, AdapterError>> + Send;
}

/// Real HTTP client implementation using reqwest.
#[derive(Clone)]
pub struct AsyncReqwestClient {
    client: reqwest::Client,
}

impl AsyncReqwestClient {
    /// Creates a client with the default 30s timeout.
    pub fn new() -> Result<Self, AdapterError> {
        Self::with_timeout(30)
    }

    /// Creates a client with a custom timeout in seconds.
    pub fn with_timeout(timeout_secs: u64) -> Result<Self, AdapterError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .user_agent(DEFAULT_USER_AGENT)
            .tcp_keepalive(std::time::Duration::from_secs(30))
            .tcp_nodelay(true)
            .build()
            .map_err(|e| AdapterError::Http(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

impl AsyncHttpClient for AsyncReqwestClient {
    async fn post_json(&self, url: &str, json_body: &str) -> Result<Vec<u8>, AdapterError> {
        trace!(url = url, "HTTP POST starting");

        let response = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .body(json_body.to_string())
            .send()
            .await
            .map_err(|e| {
                warn!(url = url, error = %e, "HTTP POST failed");
                AdapterError::Http(format!("request failed: {}", e))
            })?;

        if !response.status().is_success() {
            warn!(
                url = url,
                status = response.status().as_u16(),
                "HTTP error status"
            );
            return Err(AdapterError::Http(format!(
                "HTTP {} from POST {}",
                response.status(),
                url
            )));
        }

        response
            .bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| AdapterError::Http(format!("failed to read response: {}", e)))
    }
}
