//! Telemetry batch transport.
//!
//! Batches leave the process as gzip-compressed JSON arrays POSTed to the
//! collector endpoint. The transport sits behind a trait so the daemon can
//! be exercised against an in-memory mock.

use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;

/// Errors from a telemetry send attempt.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The collector could not be reached or rejected the batch.
    #[error("telemetry send failed: {0}")]
    SendFailed(String),
}

/// Outbound transport for compressed telemetry batches.
#[async_trait]
pub trait TelemetryTransport: Send + Sync {
    /// Sends one gzip-compressed batch body.
    async fn send(&self, body: &[u8]) -> Result<(), TransportError>;
}

/// HTTP transport posting batches to `/v1/telemetry`.
pub struct HttpTelemetryTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTelemetryTransport {
    /// Creates a transport for the given collector endpoint.
    pub fn new(endpoint: impl Into<String>) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .build()
            .map_err(|e| TransportError::SendFailed(format!("client build failed: {}", e)))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl TelemetryTransport for HttpTelemetryTransport {
    async fn send(&self, body: &[u8]) -> Result<(), TransportError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .header("Content-Encoding", "gzip")
            .body(body.to_vec())
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "telemetry POST failed");
                TransportError::SendFailed(format!("request failed: {}", e))
            })?;

        if !response.status().is_success() {
            warn!(status = response.status().as_u16(), "telemetry rejected");
            return Err(TransportError::SendFailed(format!(
                "HTTP {} from {}",
                response.status(),
                self.endpoint
            )));
        }

        Ok(())
    }
}
