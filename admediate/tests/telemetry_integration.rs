//! Telemetry pipeline tests through the engine facade.

use admediate::adapter::{Adapter, AdapterDescriptor, AdType, TestNetworkAdapter};
use admediate::config::{MediationConfig, PlacementConfig};
use admediate::engine::MediationEngine;
use admediate::telemetry::{event_types, TelemetryConfig, TelemetryEvent, TelemetryTransport, TransportError};
use async_trait::async_trait;
use flate2::read::GzDecoder;
use std::io::Read;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Transport capturing every delivered batch body.
struct CapturingTransport {
    bodies: Mutex<Vec<Vec<u8>>>,
}

impl CapturingTransport {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            bodies: Mutex::new(Vec::new()),
        })
    }

    fn batches(&self) -> Vec<Vec<TelemetryEvent>> {
        self.bodies
            .lock()
            .unwrap()
            .iter()
            .map(|body| {
                let mut decoder = GzDecoder::new(body.as_slice());
                let mut json = Vec::new();
                decoder.read_to_end(&mut json).unwrap();
                serde_json::from_slice(&json).unwrap()
            })
            .collect()
    }
}

#[async_trait]
impl TelemetryTransport for CapturingTransport {
    async fn send(&self, body: &[u8]) -> Result<(), TransportError> {
        self.bodies.lock().unwrap().push(body.to_vec());
        Ok(())
    }
}

fn engine_with_transport(transport: Arc<CapturingTransport>) -> MediationEngine {
    let mut config = MediationConfig {
        config_id: "cfg-telemetry".to_string(),
        version: 1,
        ..Default::default()
    };
    config.placements.insert(
        "home".to_string(),
        PlacementConfig {
            ad_type: AdType::Banner,
            ..Default::default()
        },
    );

    MediationEngine::builder()
        .with_config(config)
        .with_transport(transport)
        .with_telemetry_config(TelemetryConfig {
            flush_interval: Duration::from_secs(3600),
            ..Default::default()
        })
        .build()
}

fn register_test_adapter(engine: &MediationEngine) {
    engine
        .register_adapter(
            AdapterDescriptor::new("testnet", "1.0.0", "0.1.0", AdType::ALL.to_vec()),
            Arc::new(TestNetworkAdapter::new("testnet", 1.0)) as Arc<dyn Adapter>,
        )
        .unwrap();
}

#[tokio::test]
async fn batch_threshold_produces_one_gzip_batch() {
    let transport = CapturingTransport::new();
    let engine = engine_with_transport(Arc::clone(&transport));
    engine.start();

    for i in 0..10 {
        engine
            .telemetry()
            .record(TelemetryEvent::new(format!("event_{}", i)));
    }
    tokio::time::sleep(Duration::from_millis(150)).await;

    {
        let bodies = transport.bodies.lock().unwrap();
        assert_eq!(bodies.len(), 1, "exactly one flush at the threshold");
        assert_eq!(&bodies[0][..2], &[0x1f, 0x8b], "body is gzip-encoded");
    }
    let batches = transport.batches();
    assert_eq!(batches[0].len(), 10);

    engine.shutdown().await;
}

#[tokio::test]
async fn below_threshold_nothing_is_sent() {
    let transport = CapturingTransport::new();
    let engine = engine_with_transport(Arc::clone(&transport));
    engine.start();

    for i in 0..9 {
        engine
            .telemetry()
            .record(TelemetryEvent::new(format!("event_{}", i)));
    }
    tokio::time::sleep(Duration::from_millis(150)).await;

    assert_eq!(transport.bodies.lock().unwrap().len(), 0);

    engine.shutdown().await;
}

#[tokio::test]
async fn auction_flow_emits_the_expected_events() {
    let transport = CapturingTransport::new();
    let engine = engine_with_transport(Arc::clone(&transport));
    register_test_adapter(&engine);
    engine.start();
    engine.initialize_all().await;

    engine.load_ad("home").await.unwrap();

    // Shutdown flushes whatever the flow produced.
    engine.shutdown().await;

    let events: Vec<TelemetryEvent> = transport.batches().into_iter().flatten().collect();
    let types: Vec<&str> = events.iter().map(|e| e.event_type.as_str()).collect();

    assert!(types.contains(&event_types::ADAPTER_REGISTERED));
    assert!(types.contains(&event_types::ADAPTER_INITIALIZED));
    assert!(types.contains(&event_types::LOAD_REQUESTED));
    assert!(types.contains(&event_types::ADAPTER_ATTEMPT));
    assert!(types.contains(&event_types::AD_CACHED));
    assert!(types.contains(&event_types::AUCTION_COMPLETED));

    let completed = events
        .iter()
        .find(|e| e.event_type == event_types::AUCTION_COMPLETED)
        .unwrap();
    assert_eq!(completed.payload["outcome"], "filled");
    assert_eq!(completed.adapter.as_deref(), Some("testnet"));
}

#[tokio::test]
async fn pii_never_reaches_the_wire() {
    let transport = CapturingTransport::new();
    let engine = engine_with_transport(Arc::clone(&transport));
    engine.start();

    engine.telemetry().record(
        TelemetryEvent::new("support_note").with_field(
            "detail",
            serde_json::json!("user someone@example.com device 3fa85f6457174562b3fc2c963f66afa6"),
        ),
    );
    engine.shutdown().await;

    let batches = transport.batches();
    let detail = batches[0][0].payload["detail"].as_str().unwrap();
    assert!(!detail.contains("someone@example.com"));
    assert!(!detail.contains("3fa85f6457174562b3fc2c963f66afa6"));
    assert!(detail.contains("[redacted:email]"));
    assert!(detail.contains("[redacted:id]"));
}

#[tokio::test]
async fn telemetry_failure_never_blocks_ad_flow() {
    /// Transport that always fails.
    struct FailingTransport;

    #[async_trait]
    impl TelemetryTransport for FailingTransport {
        async fn send(&self, _body: &[u8]) -> Result<(), TransportError> {
            Err(TransportError::SendFailed("collector down".to_string()))
        }
    }

    let mut config = MediationConfig::default();
    config.placements.insert(
        "home".to_string(),
        PlacementConfig {
            ad_type: AdType::Banner,
            ..Default::default()
        },
    );

    let engine = MediationEngine::builder()
        .with_config(config)
        .with_transport(Arc::new(FailingTransport))
        .with_telemetry_config(TelemetryConfig {
            flush_interval: Duration::from_millis(20),
            max_send_attempts: 2,
            ..Default::default()
        })
        .build();
    engine
        .register_adapter(
            AdapterDescriptor::new("testnet", "1.0.0", "0.1.0", AdType::ALL.to_vec()),
            Arc::new(TestNetworkAdapter::new("testnet", 1.0)) as Arc<dyn Adapter>,
        )
        .unwrap();
    engine.start();
    engine.initialize_all().await;

    // Ads keep serving while the collector is down.
    for _ in 0..5 {
        assert!(engine.load_ad("home").await.is_ok());
    }

    tokio::time::sleep(Duration::from_millis(200)).await;
    let stats = engine.telemetry_stats().unwrap();
    assert!(stats.batches_dropped >= 1, "failed batches are dropped, not retried forever");

    engine.shutdown().await;
}
