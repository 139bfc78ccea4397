//! Error taxonomy for the mediation engine.
//!
//! Every failure that crosses a component boundary is converted into a
//! [`MediationError`] kind before it reaches calling code. Adapter-level
//! failures (raw transport errors, vendor quirks) never surface directly;
//! the auction orchestrator maps them here first.

use std::time::Duration;
use thiserror::Error;

/// Errors surfaced to callers of the mediation engine.
///
/// These are the only failure kinds calling code ever observes. Raw adapter
/// or transport errors are converted at the orchestrator boundary.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MediationError {
    /// The engine or a required adapter has not been initialized.
    #[error("not initialized")]
    NotInitialized,

    /// The placement id is empty or unknown.
    #[error("invalid placement: {0:?}")]
    InvalidPlacement(String),

    /// No registered adapter supports the requested ad type.
    #[error("unsupported ad type: {0}")]
    UnsupportedAdType(String),

    /// The network could not be reached at all.
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    /// No network returned a usable ad.
    #[error("no fill")]
    NoFill,

    /// The request exceeded its time budget.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// An ad load failed for a non-transport reason.
    #[error("load failed: {0}")]
    LoadFailed(String),

    /// An adapter with the same name is already registered.
    #[error("duplicate adapter: {0}")]
    DuplicateAdapter(String),

    /// A presentation is already in flight for this placement.
    #[error("presenter busy for placement {0}")]
    PresenterBusy(String),

    /// No adapter is registered under the given name.
    #[error("adapter not found: {0}")]
    AdapterNotFound(String),
}

impl MediationError {
    /// Short stable identifier for telemetry and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotInitialized => "not_initialized",
            Self::InvalidPlacement(_) => "invalid_placement",
            Self::UnsupportedAdType(_) => "unsupported_ad_type",
            Self::NetworkUnreachable(_) => "network_unreachable",
            Self::NoFill => "no_fill",
            Self::Timeout(_) => "timeout",
            Self::LoadFailed(_) => "load_failed",
            Self::DuplicateAdapter(_) => "duplicate_adapter",
            Self::PresenterBusy(_) => "presenter_busy",
            Self::AdapterNotFound(_) => "adapter_not_found",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MediationError::Timeout(Duration::from_secs(10));
        assert_eq!(format!("{}", err), "timed out after 10s");

        let err = MediationError::PresenterBusy("home_banner".to_string());
        assert_eq!(format!("{}", err), "presenter busy for placement home_banner");
    }

    #[test]
    fn test_error_kind_is_stable() {
        assert_eq!(MediationError::NoFill.kind(), "no_fill");
        assert_eq!(
            MediationError::DuplicateAdapter("admob".into()).kind(),
            "duplicate_adapter"
        );
        assert_eq!(
            MediationError::Timeout(Duration::from_millis(1)).kind(),
            "timeout"
        );
    }
}
