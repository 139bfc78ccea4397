//! Mediation config document model.
//!
//! Typed model of the config document served by the remote config
//! endpoint. Fetching, signature verification, and validation belong to
//! the config service; the engine only consumes the parsed document for
//! per-placement settings and feature flags.

use crate::adapter::AdType;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Per-placement mediation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlacementConfig {
    /// Ad format served by this placement.
    pub ad_type: AdType,
    /// Networks allowed for this placement, in descending priority.
    /// Empty means all registered networks in registration order.
    pub enabled_networks: Vec<String>,
    /// Per-adapter attempt budget in milliseconds.
    pub timeout_ms: u64,
    /// Global auction budget in milliseconds. Zero falls back to the ad
    /// type's graduated default.
    pub max_wait_ms: u64,
    /// Minimum acceptable eCPM.
    pub floor_price: f64,
    /// Banner refresh interval in seconds; zero disables refresh.
    pub refresh_interval: u64,
    /// Free-form targeting hints forwarded to networks.
    pub targeting: Option<serde_json::Map<String, serde_json::Value>>,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            ad_type: AdType::Banner,
            enabled_networks: Vec::new(),
            timeout_ms: 5_000,
            max_wait_ms: 0,
            floor_price: 0.0,
            refresh_interval: 0,
            targeting: None,
        }
    }
}

impl PlacementConfig {
    /// Per-adapter budget as a duration.
    pub fn adapter_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Global budget as a duration, falling back to the ad type default.
    pub fn global_timeout(&self) -> Duration {
        if self.max_wait_ms == 0 {
            self.ad_type.default_timeout()
        } else {
            Duration::from_millis(self.max_wait_ms)
        }
    }

    /// Refresh interval, if enabled.
    pub fn refresh(&self) -> Option<Duration> {
        (self.refresh_interval > 0).then(|| Duration::from_secs(self.refresh_interval))
    }
}

/// Feature switches delivered with the config document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FeatureFlags {
    pub telemetry_enabled: bool,
    pub crash_reporting_enabled: bool,
    pub debug_logging_enabled: bool,
    pub experimental_features_enabled: bool,
    /// Emergency stop: every load completes as no-fill without
    /// dispatching.
    pub kill_switch: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            telemetry_enabled: true,
            crash_reporting_enabled: true,
            debug_logging_enabled: false,
            experimental_features_enabled: false,
            kill_switch: false,
        }
    }
}

/// The config document as served by the config endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MediationConfig {
    pub config_id: String,
    pub version: u64,
    pub placements: HashMap<String, PlacementConfig>,
    /// Per-network adapter configuration, forwarded opaquely to each
    /// adapter's `initialize`.
    pub adapters: HashMap<String, serde_json::Value>,
    pub features: FeatureFlags,
    pub signature: String,
    pub timestamp: i64,
}

impl MediationConfig {
    /// Settings for a placement, if configured.
    pub fn placement(&self, placement_id: &str) -> Option<&PlacementConfig> {
        self.placements.get(placement_id)
    }

    /// Adapter config for a network, defaulting to an empty object.
    pub fn adapter_config(&self, name: &str) -> serde_json::Value {
        self.adapters
            .get(name)
            .cloned()
            .unwrap_or_else(|| serde_json::json!({}))
    }
}
