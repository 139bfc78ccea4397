//! Ad network adapter abstraction.
//!
//! This module provides the capability interface every network binding
//! implements, the registry that owns adapter lifecycles, and the built-in
//! adapters (the server-side auction network and the deterministic test
//! network).
//!
//! # Factory Pattern
//!
//! For centralized adapter creation, use the [`AdapterFactory`]:
//!
//! ```ignore
//! use admediate::adapter::{AdapterFactory, AdapterConfig, AsyncReqwestClient};
//!
//! let http_client = AsyncReqwestClient::new()?;
//! let factory = AdapterFactory::new(http_client);
//! let (adapter, descriptor) = factory.create(&AdapterConfig::auction_house(
//!     "auction_house",
//!     "https://auction.example.com/v1/auction",
//! ));
//! ```

mod auction_house;
mod factory;
mod http;
mod registry;
mod test_network;
mod types;

pub use auction_house::AuctionHouseAdapter;
pub use factory::{AdapterConfig, AdapterFactory};
pub use http::{AsyncHttpClient, AsyncReqwestClient};
pub use registry::{AdapterRegistry, AdapterReport};
pub use test_network::{TestBehavior, TestNetworkAdapter};
pub use types::{
    Adapter, AdapterDescriptor, AdapterError, AdType, Creative, Fill, RegistrationStatus,
};

#[cfg(test)]
pub use http::tests::MockHttpClient;
