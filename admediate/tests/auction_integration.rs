//! End-to-end auction tests through the engine facade.

use admediate::adapter::{
    Adapter, AdapterDescriptor, AdapterError, AdType, AsyncHttpClient, AuctionHouseAdapter,
    TestBehavior, TestNetworkAdapter,
};
use admediate::auction::{AdRequest, AuctionOutcome};
use admediate::config::{MediationConfig, PlacementConfig};
use admediate::consent::ConsentState;
use admediate::engine::MediationEngine;
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn config_with_placement(placement_id: &str, placement: PlacementConfig) -> MediationConfig {
    let mut config = MediationConfig {
        config_id: "cfg-integration".to_string(),
        version: 1,
        ..Default::default()
    };
    config.placements.insert(placement_id.to_string(), placement);
    config
}

fn register(engine: &MediationEngine, adapter: TestNetworkAdapter) -> Arc<TestNetworkAdapter> {
    let name = adapter.name().to_string();
    let adapter = Arc::new(adapter);
    engine
        .register_adapter(
            AdapterDescriptor::new(&name, "1.0.0", "0.1.0", AdType::ALL.to_vec()),
            adapter.clone() as Arc<dyn Adapter>,
        )
        .unwrap();
    adapter
}

#[tokio::test]
async fn waterfall_falls_through_to_third_adapter() {
    let engine = MediationEngine::builder()
        .with_config(config_with_placement(
            "level_end",
            PlacementConfig {
                ad_type: AdType::Interstitial,
                floor_price: 0.5,
                timeout_ms: 300,
                max_wait_ms: 2_000,
                ..Default::default()
            },
        ))
        .build();

    let first = register(
        &engine,
        TestNetworkAdapter::with_default_behavior("first", TestBehavior::no_fill()),
    );
    let second = register(
        &engine,
        TestNetworkAdapter::with_default_behavior("second", TestBehavior::Hang),
    );
    register(&engine, TestNetworkAdapter::new("third", 1.0));
    engine.initialize_all().await;

    let outcome = engine.load_ad("level_end").await.unwrap();
    match outcome {
        AuctionOutcome::Filled { adapter, ecpm, ad } => {
            assert_eq!(adapter, "third");
            assert_eq!(ecpm, 1.0);
            assert_eq!(ad.placement_id, "level_end");
        }
        other => panic!("expected third adapter fill, got {:?}", other),
    }
    assert_eq!(first.load_calls(), 1);
    assert_eq!(second.load_calls(), 1);

    // The win is immediately cached for presentation.
    let (ad, _guard) = engine.show("level_end").unwrap();
    assert_eq!(ad.network, "third");
}

#[tokio::test]
async fn placement_network_priority_is_honored() {
    let engine = MediationEngine::builder()
        .with_config(config_with_placement(
            "home",
            PlacementConfig {
                ad_type: AdType::Banner,
                enabled_networks: vec!["preferred".to_string(), "fallback".to_string()],
                ..Default::default()
            },
        ))
        .build();

    register(&engine, TestNetworkAdapter::new("fallback", 9.0));
    register(&engine, TestNetworkAdapter::new("preferred", 1.0));
    let excluded = register(&engine, TestNetworkAdapter::new("excluded", 99.0));
    engine.initialize_all().await;

    let outcome = engine.load_ad("home").await.unwrap();
    match outcome {
        AuctionOutcome::Filled { adapter, .. } => assert_eq!(adapter, "preferred"),
        other => panic!("expected preferred fill, got {:?}", other),
    }
    assert_eq!(excluded.load_calls(), 0, "networks outside the list never load");
}

#[tokio::test]
async fn global_deadline_terminates_every_request() {
    let engine = MediationEngine::builder()
        .with_config(config_with_placement(
            "home",
            PlacementConfig {
                ad_type: AdType::Banner,
                timeout_ms: 5_000,
                max_wait_ms: 100,
                ..Default::default()
            },
        ))
        .build();

    register(
        &engine,
        TestNetworkAdapter::with_default_behavior("hang_a", TestBehavior::Hang),
    );
    register(
        &engine,
        TestNetworkAdapter::with_default_behavior("hang_b", TestBehavior::Hang),
    );
    engine.initialize_all().await;

    let started = std::time::Instant::now();
    let outcome = engine.load_ad("home").await.unwrap();
    assert!(matches!(outcome, AuctionOutcome::TimedOut));
    assert!(
        started.elapsed() < Duration::from_secs(1),
        "request must not hang past its deadline"
    );
    assert!(engine.cache().get("home").is_none());
}

/// HTTP client handing out a canned auction response while recording
/// request bodies.
struct RecordingHttpClient {
    response: Vec<u8>,
    bodies: Mutex<Vec<String>>,
}

impl AsyncHttpClient for RecordingHttpClient {
    async fn post_json(&self, _url: &str, json_body: &str) -> Result<Vec<u8>, AdapterError> {
        self.bodies.lock().unwrap().push(json_body.to_string());
        Ok(self.response.clone())
    }
}

#[tokio::test]
async fn consent_signals_reach_the_auction_wire() {
    let response = serde_json::json!({
        "requestId": "r-1",
        "fill": true,
        "price": 1.5,
        "creative": { "id": "c-1", "html": "<div/>" },
        "ttlSeconds": 600
    })
    .to_string()
    .into_bytes();

    let http = Arc::new(RecordingHttpClient {
        response,
        bodies: Mutex::new(Vec::new()),
    });

    let targeting = serde_json::json!({ "keyword": "news" });
    let engine = MediationEngine::builder()
        .with_config(config_with_placement(
            "home",
            PlacementConfig {
                ad_type: AdType::Banner,
                targeting: targeting.as_object().cloned(),
                ..Default::default()
            },
        ))
        .build();

    struct SharedClient(Arc<RecordingHttpClient>);
    impl AsyncHttpClient for SharedClient {
        async fn post_json(&self, url: &str, json_body: &str) -> Result<Vec<u8>, AdapterError> {
            self.0.post_json(url, json_body).await
        }
    }

    let adapter = AuctionHouseAdapter::new(
        SharedClient(Arc::clone(&http)),
        "auction_house",
        "https://auction.example.com/v1/auction",
    );
    engine
        .register_adapter(
            AdapterDescriptor::new("auction_house", "1.0.0", "0.1.0", AdType::ALL.to_vec()),
            Arc::new(adapter) as Arc<dyn Adapter>,
        )
        .unwrap();
    engine.initialize_all().await;

    engine.set_consent(ConsentState {
        gdpr_applies: Some(true),
        tcf_string: Some("CPc8aAAPc8aAAAGABCENC.YAAAAAAAAAA".to_string()),
        us_privacy: None,
        coppa: Some(false),
    });

    let outcome = engine.load_ad("home").await.unwrap();
    assert!(matches!(outcome, AuctionOutcome::Filled { .. }));

    let bodies = http.bodies.lock().unwrap();
    let sent: serde_json::Value = serde_json::from_str(&bodies[0]).unwrap();
    assert_eq!(sent["consent"]["gdpr"], 1);
    assert_eq!(sent["consent"]["gdpr_consent"], "CPc8aAAPc8aAAAGABCENC.YAAAAAAAAAA");
    assert_eq!(sent["consent"]["coppa"], false);
    assert!(
        sent["consent"].get("us_privacy").is_none(),
        "absent signals never serialize"
    );
    assert_eq!(
        sent["request"]["extras"]["keyword"], "news",
        "placement targeting reaches the wire"
    );
}

#[tokio::test]
async fn explicit_request_flow_without_config() {
    let engine = MediationEngine::builder().build();
    register(&engine, TestNetworkAdapter::new("testnet", 3.0));
    engine.initialize_all().await;

    let request = AdRequest::new("anywhere", AdType::Rewarded).with_floor(1.0);
    let outcome = engine.load(&request).await.unwrap();
    match outcome {
        AuctionOutcome::Filled { ecpm, .. } => assert_eq!(ecpm, 3.0),
        other => panic!("expected fill, got {:?}", other),
    }
}
