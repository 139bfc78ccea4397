//! Adapter types and the network capability interface.

use crate::auction::AdRequest;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Ad formats the engine can mediate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdType {
    Banner,
    Interstitial,
    Rewarded,
    RewardedInterstitial,
    Native,
    AppOpen,
}

impl AdType {
    /// Every supported ad format.
    pub const ALL: [AdType; 6] = [
        AdType::Banner,
        AdType::Interstitial,
        AdType::Rewarded,
        AdType::RewardedInterstitial,
        AdType::Native,
        AdType::AppOpen,
    ];

    /// Wire/telemetry identifier for this ad type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Banner => "banner",
            Self::Interstitial => "interstitial",
            Self::Rewarded => "rewarded",
            Self::RewardedInterstitial => "rewarded_interstitial",
            Self::Native => "native",
            Self::AppOpen => "app_open",
        }
    }

    /// Default global time budget for a load of this ad type.
    ///
    /// Fullscreen formats tolerate longer waits than inline ones.
    pub fn default_timeout(&self) -> Duration {
        match self {
            Self::Banner => Duration::from_secs(5),
            Self::Interstitial => Duration::from_secs(10),
            Self::Rewarded => Duration::from_secs(12),
            Self::RewardedInterstitial => Duration::from_secs(11),
            Self::Native => Duration::from_secs(7),
            Self::AppOpen => Duration::from_secs(8),
        }
    }
}

impl std::fmt::Display for AdType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors produced by network adapters.
///
/// These stay inside the adapter layer; the orchestrator converts them to
/// the engine taxonomy before they reach callers.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AdapterError {
    /// Transport-level failure (connection refused, 5xx, DNS, ...).
    #[error("HTTP error: {0}")]
    Http(String),

    /// The network responded but declined to fill.
    #[error("no fill")]
    NoFill,

    /// The adapter did not answer within its time budget.
    #[error("adapter timed out")]
    Timeout,

    /// The network returned a response the adapter could not use.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Vendor initialization failed.
    #[error("initialization failed: {0}")]
    InitFailed(String),

    /// The adapter was asked to load before `initialize` succeeded.
    #[error("adapter not initialized")]
    NotInitialized,
}

impl AdapterError {
    /// Whether a retry within the same request could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Http(_) | Self::Timeout)
    }

    /// Normalized no-bid reason for telemetry.
    pub fn no_bid_reason(&self) -> &'static str {
        match self {
            Self::Http(_) => "network_error",
            Self::NoFill => "no_fill",
            Self::Timeout => "timeout",
            Self::InvalidResponse(_) => "error",
            Self::InitFailed(_) => "error",
            Self::NotInitialized => "error",
        }
    }
}

impl From<AdapterError> for crate::error::MediationError {
    fn from(err: AdapterError) -> Self {
        use crate::error::MediationError;
        match err {
            AdapterError::Http(msg) => MediationError::NetworkUnreachable(msg),
            AdapterError::NoFill => MediationError::NoFill,
            AdapterError::Timeout => MediationError::Timeout(Duration::ZERO),
            AdapterError::InvalidResponse(msg) => MediationError::LoadFailed(msg),
            AdapterError::InitFailed(msg) => MediationError::LoadFailed(msg),
            AdapterError::NotInitialized => MediationError::NotInitialized,
        }
    }
}

/// Static description of a pluggable network binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterDescriptor {
    /// Unique adapter name within the registry.
    pub name: String,
    /// Adapter binding version.
    pub adapter_version: String,
    /// Minimum engine version the binding supports.
    pub min_sdk_version: String,
    /// Ad formats this network can serve.
    pub capabilities: Vec<AdType>,
}

impl AdapterDescriptor {
    pub fn new(
        name: impl Into<String>,
        adapter_version: impl Into<String>,
        min_sdk_version: impl Into<String>,
        capabilities: Vec<AdType>,
    ) -> Self {
        Self {
            name: name.into(),
            adapter_version: adapter_version.into(),
            min_sdk_version: min_sdk_version.into(),
            capabilities,
        }
    }
}

/// Lifecycle state of a registered adapter.
///
/// Transitions move forward only, except `Failed -> Initializing` when a
/// retry is attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationStatus {
    /// Registered, never initialized.
    Discovered,
    /// Vendor initialization in flight.
    Initializing,
    /// Ready to serve loads.
    Initialized,
    /// Last initialization attempt failed; retryable.
    Failed,
}

impl RegistrationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Discovered => "discovered",
            Self::Initializing => "initializing",
            Self::Initialized => "initialized",
            Self::Failed => "failed",
        }
    }
}

/// The creative payload of a fill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Creative {
    /// Network-assigned creative id.
    pub id: String,
    /// Inline HTML markup, if the creative is markup-based.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    /// VAST tag URL for video creatives.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vast_tag_url: Option<String>,
    /// Impression/click tracking URLs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tracking: Vec<String>,
}

/// A network's successful response to a load request.
#[derive(Debug, Clone)]
pub struct Fill {
    /// Name of the adapter that produced this fill.
    pub adapter: String,
    /// Effective cost per mille. Never negative.
    pub ecpm: f64,
    /// Price currency code.
    pub currency: String,
    /// The creative to present.
    pub creative: Creative,
    /// Monotonic receipt time.
    pub received_at: Instant,
    /// Cache lifetime granted by the network, if any.
    pub ttl: Option<Duration>,
}

/// Capability interface implemented by every network binding.
///
/// Instances are owned by the [`AdapterRegistry`](super::AdapterRegistry)
/// and selected through its name-to-instance mapping. All methods that reach
/// a network are suspension points; implementations must be cancel-safe.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Adapter name; must match the registered descriptor.
    fn name(&self) -> &str;

    /// Performs vendor initialization.
    ///
    /// The registry serializes calls per adapter, so implementations may
    /// assume at most one `initialize` runs at a time.
    async fn initialize(&self, config: &serde_json::Value) -> Result<(), AdapterError>;

    /// Requests a fill for the given request.
    ///
    /// `consent` is the normalized outbound signal map built by the consent
    /// coordinator; adapters forward it verbatim.
    async fn load_ad(
        &self,
        request: &AdRequest,
        consent: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<Fill, AdapterError>;

    /// Whether this network can serve the given format.
    fn supports_ad_type(&self, ad_type: AdType) -> bool;

    /// Releases vendor resources. Called once at engine teardown.
    async fn destroy(&self);
}
