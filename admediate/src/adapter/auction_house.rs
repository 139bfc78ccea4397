//! Server-side auction adapter.
//!
//! Speaks the auction wire contract against a remote auction endpoint:
//! one JSON POST per load, response carries at most one fill with an
//! optional cache TTL. This is the engine's built-in network; vendor SDK
//! bindings live out of tree and implement the same [`Adapter`] trait.

use super::http::AsyncHttpClient;
use super::types::{Adapter, AdapterError, AdType, Creative, Fill};
use crate::auction::AdRequest;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::debug;

/// Wire request sent to the auction endpoint.
#[derive(Debug, Serialize)]
struct WireRequest<'a> {
    request: WirePlacement<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    consent: Option<&'a serde_json::Map<String, serde_json::Value>>,
    meta: WireMeta<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WirePlacement<'a> {
    placement: &'a str,
    ad_type: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    height: Option<u32>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    test_mode: bool,
    #[serde(skip_serializing_if = "serde_json::Map::is_empty")]
    extras: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireMeta<'a> {
    sdk: WireSdk<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    publisher_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    app_id: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct WireSdk<'a> {
    name: &'a str,
    version: &'a str,
}

/// Wire response from the auction endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireResponse {
    #[allow(dead_code)]
    request_id: String,
    fill: bool,
    price: Option<f64>,
    currency: Option<String>,
    creative: Option<WireCreative>,
    ttl_seconds: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireCreative {
    id: String,
    html: Option<String>,
    vast_tag_url: Option<String>,
    #[serde(default)]
    tracking: Vec<String>,
}

/// Adapter that fills requests from a server-side auction.
pub struct AuctionHouseAdapter<C: AsyncHttpClient> {
    http_client: C,
    name: String,
    endpoint: String,
    publisher_id: Option<String>,
    app_id: Option<String>,
    initialized: AtomicBool,
}

impl<C: AsyncHttpClient> AuctionHouseAdapter<C> {
    /// Creates an adapter posting to the given auction endpoint.
    pub fn new(http_client: C, name: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            http_client,
            name: name.into(),
            endpoint: endpoint.into(),
            publisher_id: None,
            app_id: None,
            initialized: AtomicBool::new(false),
        }
    }

    /// Sets the publisher account id sent in request metadata.
    pub fn with_publisher_id(mut self, publisher_id: impl Into<String>) -> Self {
        self.publisher_id = Some(publisher_id.into());
        self
    }

    /// Sets the application id sent in request metadata.
    pub fn with_app_id(mut self, app_id: impl Into<String>) -> Self {
        self.app_id = Some(app_id.into());
        self
    }

    fn parse_response(&self, body: &[u8]) -> Result<Fill, AdapterError> {
        let response: WireResponse = serde_json::from_slice(body)
            .map_err(|e| AdapterError::InvalidResponse(format!("bad auction response: {}", e)))?;

        if !response.fill {
            return Err(AdapterError::NoFill);
        }

        let creative = response
            .creative
            .ok_or_else(|| AdapterError::InvalidResponse("fill without creative".to_string()))?;

        let ecpm = response.price.unwrap_or(0.0);
        if !ecpm.is_finite() || ecpm < 0.0 {
            return Err(AdapterError::InvalidResponse(format!(
                "negative price: {}",
                ecpm
            )));
        }

        Ok(Fill {
            adapter: self.name.clone(),
            ecpm,
            currency: response.currency.unwrap_or_else(|| "USD".to_string()),
            creative: Creative {
                id: creative.id,
                html: creative.html,
                vast_tag_url: creative.vast_tag_url,
                tracking: creative.tracking,
            },
            received_at: Instant::now(),
            ttl: response.ttl_seconds.map(Duration::from_secs),
        })
    }
}

#[async_trait]
impl<C: AsyncHttpClient> Adapter for AuctionHouseAdapter<C> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn initialize(&self, config: &serde_json::Value) -> Result<(), AdapterError> {
        if self.endpoint.trim().is_empty() {
            return Err(AdapterError::InitFailed("empty auction endpoint".to_string()));
        }

        // Per-network config may carry account overrides; unknown keys are
        // forwarded untouched by the config layer, so only log here.
        if let Some(obj) = config.as_object() {
            debug!(adapter = %self.name, keys = obj.len(), "auction adapter configured");
        }

        self.initialized.store(true, Ordering::Release);
        Ok(())
    }

    async fn load_ad(
        &self,
        request: &AdRequest,
        consent: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<Fill, AdapterError> {
        if !self.initialized.load(Ordering::Acquire) {
            return Err(AdapterError::NotInitialized);
        }

        let wire = WireRequest {
            request: WirePlacement {
                placement: &request.placement_id,
                ad_type: request.ad_type.as_str(),
                width: request.width,
                height: request.height,
                test_mode: request.test_mode,
                extras: request.extras.clone(),
            },
            consent: if consent.is_empty() { None } else { Some(consent) },
            meta: WireMeta {
                sdk: WireSdk {
                    name: "admediate",
                    version: crate::VERSION,
                },
                publisher_id: self.publisher_id.as_deref(),
                app_id: self.app_id.as_deref(),
            },
        };

        let body = serde_json::to_string(&wire)
            .map_err(|e| AdapterError::InvalidResponse(format!("encode failed: {}", e)))?;

        let response = self.http_client.post_json(&self.endpoint, &body).await?;
        self.parse_response(&response)
    }

    fn supports_ad_type(&self, _ad_type: AdType) -> bool {
        // The auction server mediates every format; filtering happens
        // placement-side.
        true
    }

    async fn destroy(&self) {
        self.initialized.store(false, Ordering::Release);
    }
}
