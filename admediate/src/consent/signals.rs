//! Normalized privacy-signal map construction.

use serde::{Deserialize, Serialize};
use std::sync::RwLock;

/// Raw consent inputs as collected from the host platform.
///
/// `None` and empty strings are equivalent: both mean "signal absent" and
/// are omitted from any outbound map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConsentState {
    /// Whether GDPR applies to this user, if known.
    pub gdpr_applies: Option<bool>,
    /// IAB TCF consent string, passed through verbatim.
    pub tcf_string: Option<String>,
    /// US privacy (CCPA) string, passed through verbatim.
    pub us_privacy: Option<String>,
    /// Child-directed treatment flag.
    pub coppa: Option<bool>,
}

impl ConsentState {
    fn present(value: &Option<String>) -> Option<&str> {
        value.as_deref().filter(|s| !s.is_empty())
    }
}

/// Builds the outbound signal map from raw consent state.
///
/// Encoding rules:
/// - `gdpr` is 1/0 (not a boolean) for wire compatibility
/// - `gdpr_consent` and `us_privacy` pass through verbatim
/// - `coppa` stays a boolean
/// - absent or empty inputs produce no key at all, never a null
pub fn build_signals(state: &ConsentState) -> serde_json::Map<String, serde_json::Value> {
    let mut signals = serde_json::Map::new();

    if let Some(gdpr_applies) = state.gdpr_applies {
        signals.insert(
            "gdpr".to_string(),
            serde_json::json!(if gdpr_applies { 1 } else { 0 }),
        );
    }
    if let Some(tcf) = ConsentState::present(&state.tcf_string) {
        signals.insert("gdpr_consent".to_string(), serde_json::json!(tcf));
    }
    if let Some(us_privacy) = ConsentState::present(&state.us_privacy) {
        signals.insert("us_privacy".to_string(), serde_json::json!(us_privacy));
    }
    if let Some(coppa) = state.coppa {
        signals.insert("coppa".to_string(), serde_json::json!(coppa));
    }

    signals
}

/// Holds the current consent state and hands out normalized signal maps.
///
/// The coordinator is the single place consent is written; every component
/// that forwards signals to a network reads through it.
#[derive(Debug, Default)]
pub struct ConsentCoordinator {
    state: RwLock<ConsentState>,
}

impl ConsentCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the current consent state.
    pub fn set(&self, state: ConsentState) {
        *self.state.write().unwrap() = state;
    }

    /// Returns a copy of the current raw state.
    pub fn state(&self) -> ConsentState {
        self.state.read().unwrap().clone()
    }

    /// Builds the outbound signal map from the current state.
    pub fn signals(&self) -> serde_json::Map<String, serde_json::Value> {
        build_signals(&self.state.read().unwrap())
    }
}
