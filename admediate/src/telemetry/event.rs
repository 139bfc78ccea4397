//! Telemetry event model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stable event-type identifiers.
///
/// Kept as string constants rather than an enum so platform bindings can
/// record their own event types through the same pipeline.
pub mod event_types {
    pub const ADAPTER_REGISTERED: &str = "adapter_registered";
    pub const ADAPTER_INITIALIZED: &str = "adapter_initialized";
    pub const LOAD_REQUESTED: &str = "load_requested";
    pub const ADAPTER_ATTEMPT: &str = "adapter_attempt";
    pub const AUCTION_COMPLETED: &str = "auction_completed";
    pub const AD_CACHED: &str = "ad_cached";
    pub const AD_SHOWN: &str = "ad_shown";
    pub const PRESENTER_BUSY: &str = "presenter_busy";
    pub const CONSENT_UPDATED: &str = "consent_updated";
}

/// One recorded occurrence.
///
/// Events are redacted before they enter the pipeline buffer; by the time
/// a `TelemetryEvent` exists in memory its payload carries no raw PII.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryEvent {
    /// Engine-assigned event id.
    pub id: String,
    /// Event type, one of [`event_types`] or a binding-defined string.
    pub event_type: String,
    /// Placement this event concerns, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placement_id: Option<String>,
    /// Adapter this event concerns, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adapter: Option<String>,
    /// Wall-clock timestamp for reporting. Never used for expiry.
    pub timestamp: DateTime<Utc>,
    /// Redacted free-form payload.
    #[serde(skip_serializing_if = "serde_json::Map::is_empty", default)]
    pub payload: serde_json::Map<String, serde_json::Value>,
}

impl TelemetryEvent {
    /// Creates an event of the given type, stamped now.
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            event_type: event_type.into(),
            placement_id: None,
            adapter: None,
            timestamp: Utc::now(),
            payload: serde_json::Map::new(),
        }
    }

    /// Sets the placement id.
    pub fn with_placement(mut self, placement_id: impl Into<String>) -> Self {
        self.placement_id = Some(placement_id.into());
        self
    }

    /// Sets the adapter name.
    pub fn with_adapter(mut self, adapter: impl Into<String>) -> Self {
        self.adapter = Some(adapter.into());
        self
    }

    /// Adds a payload field.
    pub fn with_field(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.payload.insert(key.into(), value);
        self
    }
}
