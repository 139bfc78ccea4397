//! Adapter factory for centralized adapter creation.
//!
//! Network bindings are described by [`AdapterConfig`] tagged variants and
//! instantiated through the [`AdapterFactory`], so call sites never name
//! concrete adapter types. New networks are added as new variants.

use super::auction_house::AuctionHouseAdapter;
use super::http::AsyncReqwestClient;
use super::test_network::TestNetworkAdapter;
use super::types::{Adapter, AdapterDescriptor, AdType};
use std::sync::Arc;

/// Configuration for creating a network adapter.
#[derive(Debug, Clone)]
pub enum AdapterConfig {
    /// Server-side auction network.
    AuctionHouse {
        /// Registry name for this network.
        name: String,
        /// Auction endpoint URL.
        endpoint: String,
        /// Publisher account id, if the endpoint requires one.
        publisher_id: Option<String>,
        /// Application id, if the endpoint requires one.
        app_id: Option<String>,
    },

    /// Deterministic sandbox network (always fills at a fixed price).
    TestNetwork {
        /// Registry name for this network.
        name: String,
        /// Fixed eCPM of every fill.
        ecpm: f64,
    },
}

impl AdapterConfig {
    /// Creates an auction-house configuration for the given endpoint.
    pub fn auction_house(name: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self::AuctionHouse {
            name: name.into(),
            endpoint: endpoint.into(),
            publisher_id: None,
            app_id: None,
        }
    }

    /// Creates a sandbox test-network configuration.
    pub fn test_network(name: impl Into<String>, ecpm: f64) -> Self {
        Self::TestNetwork {
            name: name.into(),
            ecpm,
        }
    }

    /// Returns the registry name for this configuration.
    pub fn name(&self) -> &str {
        match self {
            Self::AuctionHouse { name, .. } => name,
            Self::TestNetwork { name, .. } => name,
        }
    }
}

/// Factory for creating adapter instances and their descriptors.
pub struct AdapterFactory {
    http_client: AsyncReqwestClient,
}

impl AdapterFactory {
    /// Creates a factory sharing the given HTTP client across adapters.
    pub fn new(http_client: AsyncReqwestClient) -> Self {
        Self { http_client }
    }

    /// Creates an adapter instance from the given configuration.
    ///
    /// Returns the instance together with the descriptor to register it
    /// under.
    pub fn create(&self, config: &AdapterConfig) -> (Arc<dyn Adapter>, AdapterDescriptor) {
        match config {
            AdapterConfig::AuctionHouse {
                name,
                endpoint,
                publisher_id,
                app_id,
            } => {
                let mut adapter = AuctionHouseAdapter::new(
                    self.http_client.clone(),
                    name.clone(),
                    endpoint.clone(),
                );
                if let Some(publisher_id) = publisher_id {
                    adapter = adapter.with_publisher_id(publisher_id.clone());
                }
                if let Some(app_id) = app_id {
                    adapter = adapter.with_app_id(app_id.clone());
                }

                let descriptor = AdapterDescriptor::new(
                    name.clone(),
                    crate::VERSION,
                    crate::VERSION,
                    AdType::ALL.to_vec(),
                );
                (Arc::new(adapter), descriptor)
            }
            AdapterConfig::TestNetwork { name, ecpm } => {
                let adapter = TestNetworkAdapter::new(name.clone(), *ecpm);
                let descriptor = AdapterDescriptor::new(
                    name.clone(),
                    crate::VERSION,
                    crate::VERSION,
                    AdType::ALL.to_vec(),
                );
                (Arc::new(adapter), descriptor)
            }
        }
    }
}
