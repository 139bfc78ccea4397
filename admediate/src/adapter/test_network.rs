//! Deterministic test network.
//!
//! Serves scripted outcomes with configurable latency. Used as the sandbox
//! network when an app runs in test mode, and as the test double for
//! orchestrator and registry tests. Counts vendor `initialize` invocations
//! so single-flight initialization is observable.

use super::types::{Adapter, AdapterError, AdType, Creative, Fill};
use crate::auction::AdRequest;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// One scripted response from the test network.
#[derive(Debug, Clone)]
pub enum TestBehavior {
    /// Respond with a fill at the given price after `latency`.
    Fill {
        ecpm: f64,
        latency: Duration,
        ttl: Option<Duration>,
    },
    /// Decline after `latency`.
    NoFill { latency: Duration },
    /// Fail with a transport error after `latency`.
    Error { latency: Duration },
    /// Never respond; only a caller-side timeout ends the attempt.
    Hang,
}

impl TestBehavior {
    /// An immediate fill at the given price.
    pub fn fill(ecpm: f64) -> Self {
        Self::Fill {
            ecpm,
            latency: Duration::ZERO,
            ttl: None,
        }
    }

    /// An immediate no-fill.
    pub fn no_fill() -> Self {
        Self::NoFill {
            latency: Duration::ZERO,
        }
    }

    /// An immediate transport error.
    pub fn error() -> Self {
        Self::Error {
            latency: Duration::ZERO,
        }
    }
}

/// A network adapter with fully scripted behavior.
pub struct TestNetworkAdapter {
    name: String,
    capabilities: Vec<AdType>,
    script: Mutex<VecDeque<TestBehavior>>,
    default_behavior: TestBehavior,
    init_delay: Duration,
    failing_inits: AtomicU32,
    init_calls: AtomicU32,
    load_calls: AtomicU32,
    initialized: AtomicBool,
}

impl TestNetworkAdapter {
    /// Creates a test network that always fills at the given eCPM.
    pub fn new(name: impl Into<String>, ecpm: f64) -> Self {
        Self::with_default_behavior(name, TestBehavior::fill(ecpm))
    }

    /// Creates a test network with the given fallback behavior.
    pub fn with_default_behavior(name: impl Into<String>, default_behavior: TestBehavior) -> Self {
        Self {
            name: name.into(),
            capabilities: AdType::ALL.to_vec(),
            script: Mutex::new(VecDeque::new()),
            default_behavior,
            init_delay: Duration::ZERO,
            failing_inits: AtomicU32::new(0),
            init_calls: AtomicU32::new(0),
            load_calls: AtomicU32::new(0),
            initialized: AtomicBool::new(false),
        }
    }

    /// Restricts the formats this network claims to support.
    pub fn with_capabilities(mut self, capabilities: Vec<AdType>) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Adds latency to every `initialize` call.
    pub fn with_init_delay(mut self, init_delay: Duration) -> Self {
        self.init_delay = init_delay;
        self
    }

    /// Makes the next `count` initialization attempts fail.
    pub fn fail_next_inits(&self, count: u32) {
        self.failing_inits.store(count, Ordering::SeqCst);
    }

    /// Queues scripted behaviors, consumed one per `load_ad` call before
    /// the default behavior applies.
    pub fn script(&self, behaviors: impl IntoIterator<Item = TestBehavior>) {
        let mut script = self.script.lock().unwrap();
        script.extend(behaviors);
    }

    /// Number of vendor initializations actually performed.
    pub fn init_calls(&self) -> u32 {
        self.init_calls.load(Ordering::SeqCst)
    }

    /// Number of load attempts received.
    pub fn load_calls(&self) -> u32 {
        self.load_calls.load(Ordering::SeqCst)
    }

    fn next_behavior(&self) -> TestBehavior {
        let mut script = self.script.lock().unwrap();
        script
            .pop_front()
            .unwrap_or_else(|| self.default_behavior.clone())
    }
}

#[async_trait]
impl Adapter for TestNetworkAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn initialize(&self, _config: &serde_json::Value) -> Result<(), AdapterError> {
        self.init_calls.fetch_add(1, Ordering::SeqCst);

        if !self.init_delay.is_zero() {
            tokio::time::sleep(self.init_delay).await;
        }

        let failing = self.failing_inits.load(Ordering::SeqCst);
        if failing > 0 {
            self.failing_inits.store(failing - 1, Ordering::SeqCst);
            return Err(AdapterError::InitFailed("scripted failure".to_string()));
        }

        self.initialized.store(true, Ordering::Release);
        Ok(())
    }

    async fn load_ad(
        &self,
        request: &AdRequest,
        _consent: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<Fill, AdapterError> {
        if !self.initialized.load(Ordering::Acquire) {
            return Err(AdapterError::NotInitialized);
        }

        let call = self.load_calls.fetch_add(1, Ordering::SeqCst);

        match self.next_behavior() {
            TestBehavior::Fill { ecpm, latency, ttl } => {
                if !latency.is_zero() {
                    tokio::time::sleep(latency).await;
                }
                Ok(Fill {
                    adapter: self.name.clone(),
                    ecpm,
                    currency: "USD".to_string(),
                    creative: Creative {
                        id: format!("{}-creative-{}", self.name, call),
                        html: Some(format!("<div>{} test ad</div>", request.placement_id)),
                        vast_tag_url: None,
                        tracking: Vec::new(),
                    },
                    received_at: Instant::now(),
                    ttl,
                })
            }
            TestBehavior::NoFill { latency } => {
                if !latency.is_zero() {
                    tokio::time::sleep(latency).await;
                }
                Err(AdapterError::NoFill)
            }
            TestBehavior::Error { latency } => {
                if !latency.is_zero() {
                    tokio::time::sleep(latency).await;
                }
                Err(AdapterError::Http("scripted network error".to_string()))
            }
            TestBehavior::Hang => {
                futures::future::pending::<()>().await;
                unreachable!("pending future resolved")
            }
        }
    }

    fn supports_ad_type(&self, ad_type: AdType) -> bool {
        self.capabilities.contains(&ad_type)
    }

    async fn destroy(&self) {
        self.initialized.store(false, Ordering::Release);
    }
}
