//! Telemetry emission layer.
//!
//! The [`TelemetryClient`] is the write-only sink every component holds.
//! It is cheap to clone (a channel sender) and fire-and-forget: recording
//! never blocks and silently drops if the daemon has shut down, so
//! telemetry can never stall the ad-serving path. PII redaction happens
//! here, before an event enters the channel.

use super::event::{event_types, TelemetryEvent};
use super::redact::redact_value;
use tokio::sync::mpsc;

/// Fire-and-forget client for recording telemetry events.
#[derive(Clone)]
pub struct TelemetryClient {
    tx: mpsc::UnboundedSender<TelemetryEvent>,
}

impl TelemetryClient {
    /// Creates a client with the given channel sender.
    pub fn new(tx: mpsc::UnboundedSender<TelemetryEvent>) -> Self {
        Self { tx }
    }

    /// Creates a client whose events go nowhere. For tests and disabled
    /// telemetry.
    pub fn disabled() -> Self {
        let (tx, _rx) = mpsc::unbounded_channel();
        Self { tx }
    }

    /// Records an event, redacting its payload first.
    pub fn record(&self, mut event: TelemetryEvent) {
        for (_, value) in event.payload.iter_mut() {
            redact_value(value);
        }
        // Ignore send errors - daemon may have shut down.
        let _ = self.tx.send(event);
    }

    // =========================================================================
    // Registry events
    // =========================================================================

    /// Records an adapter registration.
    pub fn adapter_registered(&self, adapter: &str) {
        self.record(TelemetryEvent::new(event_types::ADAPTER_REGISTERED).with_adapter(adapter));
    }

    /// Records the outcome of an adapter initialization attempt.
    pub fn adapter_initialized(&self, adapter: &str, success: bool) {
        self.record(
            TelemetryEvent::new(event_types::ADAPTER_INITIALIZED)
                .with_adapter(adapter)
                .with_field("success", serde_json::json!(success)),
        );
    }

    // =========================================================================
    // Auction events
    // =========================================================================

    /// Records a load request entering the orchestrator.
    pub fn load_requested(&self, placement_id: &str, ad_type: &str) {
        self.record(
            TelemetryEvent::new(event_types::LOAD_REQUESTED)
                .with_placement(placement_id)
                .with_field("ad_type", serde_json::json!(ad_type)),
        );
    }

    /// Records the outcome of one adapter attempt within an auction.
    ///
    /// `reason` follows the no-bid taxonomy (`filled`, `no_fill`, `timeout`,
    /// `network_error`, `circuit_open`, `below_floor`, `error`).
    pub fn adapter_attempt(
        &self,
        placement_id: &str,
        adapter: &str,
        reason: &str,
        latency_ms: u64,
        ecpm: Option<f64>,
    ) {
        let mut event = TelemetryEvent::new(event_types::ADAPTER_ATTEMPT)
            .with_placement(placement_id)
            .with_adapter(adapter)
            .with_field("reason", serde_json::json!(reason))
            .with_field("latency_ms", serde_json::json!(latency_ms));
        if let Some(ecpm) = ecpm {
            event = event.with_field("ecpm", serde_json::json!(ecpm));
        }
        self.record(event);
    }

    /// Records the overall outcome of an auction.
    pub fn auction_completed(
        &self,
        placement_id: &str,
        outcome: &str,
        duration_ms: u64,
        winner: Option<&str>,
    ) {
        let mut event = TelemetryEvent::new(event_types::AUCTION_COMPLETED)
            .with_placement(placement_id)
            .with_field("outcome", serde_json::json!(outcome))
            .with_field("duration_ms", serde_json::json!(duration_ms));
        if let Some(winner) = winner {
            event = event.with_adapter(winner);
        }
        self.record(event);
    }

    // =========================================================================
    // Cache and presentation events
    // =========================================================================

    /// Records a winning ad entering the cache.
    pub fn ad_cached(&self, placement_id: &str, network: &str) {
        self.record(
            TelemetryEvent::new(event_types::AD_CACHED)
                .with_placement(placement_id)
                .with_adapter(network),
        );
    }

    /// Records an ad being shown.
    pub fn ad_shown(&self, placement_id: &str, network: &str) {
        self.record(
            TelemetryEvent::new(event_types::AD_SHOWN)
                .with_placement(placement_id)
                .with_adapter(network),
        );
    }

    /// Records a rejected duplicate show attempt.
    pub fn presenter_busy(&self, placement_id: &str) {
        self.record(TelemetryEvent::new(event_types::PRESENTER_BUSY).with_placement(placement_id));
    }

    // =========================================================================
    // Consent events
    // =========================================================================

    /// Records a consent-state update. Only the signal count is recorded;
    /// signal values never enter telemetry.
    pub fn consent_updated(&self, signals_present: usize) {
        self.record(
            TelemetryEvent::new(event_types::CONSENT_UPDATED)
                .with_field("signals_present", serde_json::json!(signals_present)),
        );
    }
}

impl std::fmt::Debug for TelemetryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryClient")
            .field("channel_closed", &self.tx.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::redact::EMAIL_TOKEN;

    fn create_client() -> (TelemetryClient, mpsc::UnboundedReceiver<TelemetryEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (TelemetryClient::new(tx), rx)
    }

    #[tokio::test]
    async fn test_typed_events() {
        let (client, mut rx) = create_client();

        client.load_requested("home", "banner");
        client.adapter_attempt("home", "testnet", "no_fill", 12, None);
        client.auction_completed("home", "filled", 80, Some("other"));

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type, event_types::LOAD_REQUESTED);
        assert_eq!(event.placement_id.as_deref(), Some("home"));

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type, event_types::ADAPTER_ATTEMPT);
        assert_eq!(event.payload["reason"], "no_fill");
        assert_eq!(event.payload["latency_ms"], 12);

        let event = rx.recv().await.unwrap();
        assert_eq!(event.adapter.as_deref(), Some("other"));
        assert_eq!(event.payload["outcome"], "filled");
    }

    #[tokio::test]
    async fn test_record_redacts_payload_before_buffering() {
        let (client, mut rx) = create_client();

        client.record(
            TelemetryEvent::new("custom").with_field(
                "note",
                serde_json::json!("user someone@example.com complained"),
            ),
        );

        let event = rx.recv().await.unwrap();
        assert_eq!(
            event.payload["note"],
            format!("user {} complained", EMAIL_TOKEN)
        );
    }

    #[test]
    fn test_record_after_daemon_shutdown_does_not_panic() {
        let (tx, rx) = mpsc::unbounded_channel();
        let client = TelemetryClient::new(tx);
        drop(rx);

        client.load_requested("home", "banner");
        client.presenter_busy("home");
    }

    #[test]
    fn test_client_clone() {
        let (client, _rx) = create_client();
        let cloned = client.clone();
        client.ad_cached("home", "testnet");
        cloned.ad_shown("home", "testnet");
    }
}
