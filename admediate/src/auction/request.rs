//! Load request model.

use crate::adapter::AdType;
use crate::error::MediationError;
use std::time::Duration;

/// Default per-adapter time budget when the placement config does not
/// specify one.
pub const DEFAULT_ADAPTER_TIMEOUT: Duration = Duration::from_secs(5);

/// One ad load attempt.
///
/// A request carries its own time budgets: `adapter_timeout` bounds each
/// individual network attempt and `global_timeout` bounds the whole auction.
#[derive(Debug, Clone)]
pub struct AdRequest {
    /// Placement being filled. Must be non-empty.
    pub placement_id: String,
    /// Requested ad format.
    pub ad_type: AdType,
    /// Minimum acceptable eCPM for a fill.
    pub floor_price: f64,
    /// Time budget per adapter attempt.
    pub adapter_timeout: Duration,
    /// Time budget for the whole request.
    pub global_timeout: Duration,
    /// Requested creative width, for sized formats.
    pub width: Option<u32>,
    /// Requested creative height, for sized formats.
    pub height: Option<u32>,
    /// Sandbox/test traffic marker, forwarded to networks.
    pub test_mode: bool,
    /// Free-form key-values forwarded to the auction server.
    pub extras: serde_json::Map<String, serde_json::Value>,
}

impl AdRequest {
    /// Creates a request with graduated default timeouts for the ad type
    /// and no floor.
    pub fn new(placement_id: impl Into<String>, ad_type: AdType) -> Self {
        Self {
            placement_id: placement_id.into(),
            ad_type,
            floor_price: 0.0,
            adapter_timeout: DEFAULT_ADAPTER_TIMEOUT,
            global_timeout: ad_type.default_timeout(),
            width: None,
            height: None,
            test_mode: false,
            extras: serde_json::Map::new(),
        }
    }

    /// Sets the floor price.
    pub fn with_floor(mut self, floor_price: f64) -> Self {
        self.floor_price = floor_price;
        self
    }

    /// Sets both time budgets.
    pub fn with_timeouts(mut self, adapter_timeout: Duration, global_timeout: Duration) -> Self {
        self.adapter_timeout = adapter_timeout;
        self.global_timeout = global_timeout;
        self
    }

    /// Sets the requested creative size.
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    /// Marks the request as sandbox/test traffic.
    pub fn with_test_mode(mut self, test_mode: bool) -> Self {
        self.test_mode = test_mode;
        self
    }

    /// Validates request invariants.
    pub fn validate(&self) -> Result<(), MediationError> {
        if self.placement_id.trim().is_empty() {
            return Err(MediationError::InvalidPlacement(self.placement_id.clone()));
        }
        if !self.floor_price.is_finite() || self.floor_price < 0.0 {
            return Err(MediationError::InvalidPlacement(format!(
                "{}: negative floor price",
                self.placement_id
            )));
        }
        if self.global_timeout.is_zero() {
            return Err(MediationError::InvalidPlacement(format!(
                "{}: zero global timeout",
                self.placement_id
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults() {
        let request = AdRequest::new("home_banner", AdType::Banner);
        assert_eq!(request.floor_price, 0.0);
        assert_eq!(request.global_timeout, Duration::from_secs(5));
        assert_eq!(request.adapter_timeout, DEFAULT_ADAPTER_TIMEOUT);
        assert!(!request.test_mode);
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_empty_placement_rejected() {
        let request = AdRequest::new("", AdType::Banner);
        assert!(matches!(
            request.validate(),
            Err(MediationError::InvalidPlacement(_))
        ));

        let request = AdRequest::new("   ", AdType::Banner);
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_negative_floor_rejected() {
        let request = AdRequest::new("home", AdType::Interstitial).with_floor(-0.5);
        assert!(request.validate().is_err());

        let request = AdRequest::new("home", AdType::Interstitial).with_floor(f64::NAN);
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_builder_style_setters() {
        let request = AdRequest::new("home", AdType::Interstitial)
            .with_floor(1.25)
            .with_timeouts(Duration::from_millis(800), Duration::from_secs(4))
            .with_size(320, 50)
            .with_test_mode(true);

        assert_eq!(request.floor_price, 1.25);
        assert_eq!(request.adapter_timeout, Duration::from_millis(800));
        assert_eq!(request.global_timeout, Duration::from_secs(4));
        assert_eq!(request.width, Some(320));
        assert!(request.test_mode);
    }
}
