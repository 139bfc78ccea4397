//! Admediate - ad mediation orchestration engine
//!
//! This library coordinates multiple independent, unreliable ad-network
//! adapters under a latency budget: it runs the waterfall or a bounded
//! concurrent auction, enforces consent constraints, caches winning fills
//! with monotonic-clock expiry, and reports telemetry about the whole
//! process without ever blocking the ad-serving path.
//!
//! # High-Level API
//!
//! Most integrations go through the [`engine`] facade:
//!
//! ```ignore
//! use admediate::engine::MediationEngine;
//! use admediate::adapter::{AdapterConfig, AdapterFactory, AsyncReqwestClient};
//! use admediate::telemetry::HttpTelemetryTransport;
//! use std::sync::Arc;
//!
//! let transport = HttpTelemetryTransport::new("https://collect.example.com/v1/telemetry")?;
//! let engine = MediationEngine::builder()
//!     .with_transport(Arc::new(transport))
//!     .with_config(config)
//!     .build();
//!
//! let factory = AdapterFactory::new(AsyncReqwestClient::new()?);
//! let (adapter, descriptor) = factory.create(&AdapterConfig::auction_house(
//!     "auction_house",
//!     "https://auction.example.com/v1/auction",
//! ));
//! engine.register_adapter(descriptor, adapter)?;
//!
//! engine.start();
//! engine.initialize_all().await;
//! let outcome = engine.load_ad("home_banner").await?;
//! ```

pub mod adapter;
pub mod auction;
pub mod cache;
pub mod config;
pub mod consent;
pub mod engine;
pub mod error;
pub mod logging;
pub mod presentation;
pub mod telemetry;
pub mod time;

/// Version of the admediate library.
///
/// Defined in `Cargo.toml` and injected at compile time; reported to the
/// auction server in request metadata.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
