//! Mediation engine facade.
//!
//! The engine is an explicitly constructed orchestration context: it owns
//! the adapter registry, the ad cache, the consent coordinator, the
//! telemetry pipeline, and the presentation controller. There is no global
//! instance; lifecycle is explicit `start` / `shutdown`.

use crate::adapter::{Adapter, AdapterDescriptor, AdapterRegistry};
use crate::auction::{AdRequest, AuctionConfig, AuctionOrchestrator, AuctionOutcome};
use crate::cache::{AdCache, CachedAd};
use crate::config::MediationConfig;
use crate::consent::{ConsentCoordinator, ConsentState};
use crate::error::MediationError;
use crate::presentation::{AdContainer, PresentationController, PresentationMode, ShowGuard};
use crate::telemetry::{
    SharedTelemetryStats, TelemetryClient, TelemetryConfig, TelemetryDaemon, TelemetryStats,
    TelemetryTransport,
};
use crate::time::{Clock, SystemClock};
use std::sync::{Arc, Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

enum DaemonState {
    Idle(TelemetryDaemon),
    Running(tokio::task::JoinHandle<()>),
    Stopped,
}

/// Builder for [`MediationEngine`].
pub struct MediationEngineBuilder {
    auction_config: AuctionConfig,
    telemetry_config: TelemetryConfig,
    transport: Option<Arc<dyn TelemetryTransport>>,
    clock: Arc<dyn Clock>,
    mode: PresentationMode,
    config: Option<MediationConfig>,
}

impl MediationEngineBuilder {
    pub fn new() -> Self {
        Self {
            auction_config: AuctionConfig::default(),
            telemetry_config: TelemetryConfig::default(),
            transport: None,
            clock: Arc::new(SystemClock),
            mode: PresentationMode::Production,
            config: None,
        }
    }

    /// Sets auction strategy and breaker tuning.
    pub fn with_auction_config(mut self, auction_config: AuctionConfig) -> Self {
        self.auction_config = auction_config;
        self
    }

    /// Sets telemetry batching tuning.
    pub fn with_telemetry_config(mut self, telemetry_config: TelemetryConfig) -> Self {
        self.telemetry_config = telemetry_config;
        self
    }

    /// Sets the telemetry transport. Without one (and with telemetry
    /// enabled) events are recorded but never leave the process.
    pub fn with_transport(mut self, transport: Arc<dyn TelemetryTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Sets the monotonic clock source. Tests inject a manual clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Sets the presentation mode.
    pub fn with_mode(mut self, mode: PresentationMode) -> Self {
        self.mode = mode;
        self
    }

    /// Sets the initial config document.
    pub fn with_config(mut self, config: MediationConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Builds the engine. Call [`MediationEngine::start`] afterwards to
    /// spawn the telemetry daemon.
    pub fn build(self) -> MediationEngine {
        let telemetry_enabled = self
            .config
            .as_ref()
            .map(|c| c.features.telemetry_enabled)
            .unwrap_or(true);

        let (telemetry, daemon, stats) = match (&self.transport, telemetry_enabled) {
            (Some(transport), true) => {
                let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
                let daemon =
                    TelemetryDaemon::new(rx, Arc::clone(transport), self.telemetry_config);
                let stats = daemon.stats_handle();
                (TelemetryClient::new(tx), Some(daemon), Some(stats))
            }
            _ => (TelemetryClient::disabled(), None, None),
        };

        let registry = Arc::new(AdapterRegistry::new());
        let cache = Arc::new(AdCache::with_clock(Arc::clone(&self.clock)));
        let consent = Arc::new(ConsentCoordinator::new());

        let orchestrator = AuctionOrchestrator::new(
            Arc::clone(&registry),
            Arc::clone(&consent),
            Arc::clone(&cache),
            telemetry.clone(),
            self.auction_config,
        );
        let presentation =
            PresentationController::new(Arc::clone(&cache), telemetry.clone(), self.mode);

        MediationEngine {
            registry,
            cache,
            consent,
            telemetry,
            orchestrator,
            presentation,
            mode: self.mode,
            config: RwLock::new(self.config),
            shutdown: CancellationToken::new(),
            daemon: Mutex::new(daemon.map(DaemonState::Idle)),
            stats,
        }
    }
}

impl Default for MediationEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The orchestration context for one mediation instance.
pub struct MediationEngine {
    registry: Arc<AdapterRegistry>,
    cache: Arc<AdCache>,
    consent: Arc<ConsentCoordinator>,
    telemetry: TelemetryClient,
    orchestrator: AuctionOrchestrator,
    presentation: PresentationController,
    mode: PresentationMode,
    config: RwLock<Option<MediationConfig>>,
    shutdown: CancellationToken,
    daemon: Mutex<Option<DaemonState>>,
    stats: Option<SharedTelemetryStats>,
}

impl MediationEngine {
    /// Starts a builder.
    pub fn builder() -> MediationEngineBuilder {
        MediationEngineBuilder::new()
    }

    /// Spawns the telemetry daemon. Idempotent.
    pub fn start(&self) {
        let mut slot = self.daemon.lock().unwrap();
        if let Some(DaemonState::Idle(_)) = slot.as_ref() {
            if let Some(DaemonState::Idle(daemon)) = slot.take() {
                let handle = tokio::spawn(daemon.run(self.shutdown.clone()));
                *slot = Some(DaemonState::Running(handle));
                info!("mediation engine started");
            }
        }
    }

    /// Cancels background work, flushes residual telemetry, and destroys
    /// all adapters.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();

        let handle = {
            let mut slot = self.daemon.lock().unwrap();
            match slot.take() {
                Some(DaemonState::Running(handle)) => {
                    *slot = Some(DaemonState::Stopped);
                    Some(handle)
                }
                other => {
                    *slot = other.map(|_| DaemonState::Stopped);
                    None
                }
            }
        };
        if let Some(handle) = handle {
            if let Err(err) = handle.await {
                warn!(error = %err, "telemetry daemon join failed");
            }
        }

        self.registry.clear().await;
        info!("mediation engine shut down");
    }

    // =========================================================================
    // Adapters
    // =========================================================================

    /// Registers a network adapter.
    pub fn register_adapter(
        &self,
        descriptor: AdapterDescriptor,
        adapter: Arc<dyn Adapter>,
    ) -> Result<(), MediationError> {
        let name = descriptor.name.clone();
        self.registry.register(descriptor, adapter)?;
        self.telemetry.adapter_registered(&name);
        Ok(())
    }

    /// Initializes one adapter with its per-network config.
    pub async fn initialize_adapter(&self, name: &str) -> Result<(), MediationError> {
        let adapter_config = {
            let config = self.config.read().unwrap();
            config
                .as_ref()
                .map(|c| c.adapter_config(name))
                .unwrap_or_else(|| serde_json::json!({}))
        };

        let result = self.registry.initialize(name, &adapter_config).await;
        self.telemetry.adapter_initialized(name, result.is_ok());
        result
    }

    /// Initializes every registered adapter.
    ///
    /// Per-adapter failures are recorded and retryable; they never abort
    /// sibling initializations. The returned report covers all adapters.
    pub async fn initialize_all(&self) -> Vec<crate::adapter::AdapterReport> {
        for name in self.registry.list_available() {
            if let Err(err) = self.initialize_adapter(&name).await {
                warn!(adapter = %name, error = %err, "adapter initialization failed");
            }
        }
        self.registry.initialization_report()
    }

    // =========================================================================
    // Consent
    // =========================================================================

    /// Updates the consent state used for all subsequent loads.
    pub fn set_consent(&self, state: ConsentState) {
        self.consent.set(state);
        self.telemetry.consent_updated(self.consent.signals().len());
    }

    // =========================================================================
    // Loading
    // =========================================================================

    /// Loads an ad for a configured placement.
    ///
    /// Placement settings (format, floor, budgets, network priority) come
    /// from the config document; unknown placements are rejected.
    pub async fn load_ad(&self, placement_id: &str) -> Result<AuctionOutcome, MediationError> {
        let (request, priority) = {
            let config = self.config.read().unwrap();
            let config = config
                .as_ref()
                .ok_or(MediationError::NotInitialized)?;

            if config.features.kill_switch {
                return Ok(AuctionOutcome::NoFill);
            }

            let placement = config
                .placement(placement_id)
                .ok_or_else(|| MediationError::InvalidPlacement(placement_id.to_string()))?;

            let mut request = AdRequest::new(placement_id, placement.ad_type)
                .with_floor(placement.floor_price)
                .with_timeouts(placement.adapter_timeout(), placement.global_timeout())
                .with_test_mode(self.mode == PresentationMode::Sandbox);
            if let Some(targeting) = &placement.targeting {
                request.extras = targeting.clone();
            }
            let priority = (!placement.enabled_networks.is_empty())
                .then(|| placement.enabled_networks.clone());
            (request, priority)
        };

        self.orchestrator
            .load_with_priority(&request, priority.as_deref())
            .await
    }

    /// Loads an ad from an explicit request, bypassing placement config
    /// except for the kill switch and network priority.
    pub async fn load(&self, request: &AdRequest) -> Result<AuctionOutcome, MediationError> {
        let priority = {
            let config = self.config.read().unwrap();
            match config.as_ref() {
                Some(config) if config.features.kill_switch => {
                    return Ok(AuctionOutcome::NoFill);
                }
                Some(config) => config
                    .placement(&request.placement_id)
                    .filter(|p| !p.enabled_networks.is_empty())
                    .map(|p| p.enabled_networks.clone()),
                None => None,
            }
        };

        self.orchestrator
            .load_with_priority(request, priority.as_deref())
            .await
    }

    // =========================================================================
    // Presentation
    // =========================================================================

    /// Renders the cached ad for a placement into a container, arming the
    /// placement's configured refresh interval.
    pub fn attach(
        &self,
        container: Arc<dyn AdContainer>,
        placement_id: &str,
    ) -> Result<(), MediationError> {
        let refresh = {
            let config = self.config.read().unwrap();
            config
                .as_ref()
                .and_then(|c| c.placement(placement_id))
                .and_then(|p| p.refresh())
        };
        self.presentation.attach(container, placement_id, refresh)
    }

    /// Clears a container and cancels its refresh timer.
    pub fn detach(&self, container: &Arc<dyn AdContainer>) {
        self.presentation.detach(container);
    }

    /// Consumes and presents the cached ad for a placement, exclusively.
    pub fn show(&self, placement_id: &str) -> Result<(CachedAd, ShowGuard), MediationError> {
        self.presentation.show(placement_id)
    }

    // =========================================================================
    // Config and diagnostics
    // =========================================================================

    /// Replaces the active config document.
    pub fn apply_config(&self, config: MediationConfig) {
        info!(config_id = %config.config_id, version = config.version, "config applied");
        *self.config.write().unwrap() = Some(config);
    }

    /// Per-adapter initialization report.
    pub fn initialization_report(&self) -> Vec<crate::adapter::AdapterReport> {
        self.registry.initialization_report()
    }

    /// Telemetry pipeline counters, if telemetry is running.
    pub fn telemetry_stats(&self) -> Option<TelemetryStats> {
        self.stats.as_ref().map(|stats| *stats.read().unwrap())
    }

    /// The adapter registry.
    pub fn registry(&self) -> &Arc<AdapterRegistry> {
        &self.registry
    }

    /// The ad cache.
    pub fn cache(&self) -> &Arc<AdCache> {
        &self.cache
    }

    /// The write-only telemetry sink.
    pub fn telemetry(&self) -> &TelemetryClient {
        &self.telemetry
    }
}

impl std::fmt::Debug for MediationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediationEngine")
            .field("mode", &self.mode)
            .field("registry", &self.registry)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{AdType, TestNetworkAdapter};
    use crate::config::{FeatureFlags, PlacementConfig};

    fn config_with_placement(placement_id: &str, ad_type: AdType) -> MediationConfig {
        let mut config = MediationConfig {
            config_id: "cfg-test".to_string(),
            version: 1,
            ..Default::default()
        };
        config.placements.insert(
            placement_id.to_string(),
            PlacementConfig {
                ad_type,
                ..Default::default()
            },
        );
        config
    }

    fn engine_with_adapter(config: MediationConfig) -> (MediationEngine, Arc<TestNetworkAdapter>) {
        let engine = MediationEngine::builder().with_config(config).build();
        let adapter = Arc::new(TestNetworkAdapter::new("testnet", 2.0));
        engine
            .register_adapter(
                AdapterDescriptor::new("testnet", "1.0.0", "0.1.0", AdType::ALL.to_vec()),
                adapter.clone() as Arc<dyn Adapter>,
            )
            .unwrap();
        (engine, adapter)
    }

    #[tokio::test]
    async fn test_load_ad_uses_placement_config() {
        let (engine, _adapter) =
            engine_with_adapter(config_with_placement("home", AdType::Banner));
        engine.initialize_all().await;

        let outcome = engine.load_ad("home").await.unwrap();
        assert!(matches!(outcome, AuctionOutcome::Filled { .. }));
        assert!(engine.cache().get("home").is_some());
    }

    #[tokio::test]
    async fn test_load_ad_unknown_placement() {
        let (engine, _adapter) =
            engine_with_adapter(config_with_placement("home", AdType::Banner));
        engine.initialize_all().await;

        let result = engine.load_ad("ghost").await;
        assert!(matches!(result, Err(MediationError::InvalidPlacement(_))));
    }

    #[tokio::test]
    async fn test_load_ad_without_config_not_initialized() {
        let engine = MediationEngine::builder().build();
        let result = engine.load_ad("home").await;
        assert!(matches!(result, Err(MediationError::NotInitialized)));
    }

    #[tokio::test]
    async fn test_kill_switch_short_circuits_to_no_fill() {
        let mut config = config_with_placement("home", AdType::Banner);
        config.features = FeatureFlags {
            kill_switch: true,
            ..Default::default()
        };
        let (engine, adapter) = engine_with_adapter(config);
        engine.initialize_all().await;

        let outcome = engine.load_ad("home").await.unwrap();
        assert!(matches!(outcome, AuctionOutcome::NoFill));
        assert_eq!(adapter.load_calls(), 0, "kill switch skips dispatch");
    }

    #[tokio::test]
    async fn test_explicit_load_respects_kill_switch() {
        let mut config = config_with_placement("home", AdType::Banner);
        config.features.kill_switch = true;
        let (engine, _adapter) = engine_with_adapter(config);
        engine.initialize_all().await;

        let request = AdRequest::new("home", AdType::Banner);
        let outcome = engine.load(&request).await.unwrap();
        assert!(matches!(outcome, AuctionOutcome::NoFill));
    }

    #[tokio::test]
    async fn test_initialize_all_reports_all_adapters() {
        let (engine, _adapter) =
            engine_with_adapter(config_with_placement("home", AdType::Banner));
        let broken = Arc::new(TestNetworkAdapter::new("broken", 1.0));
        broken.fail_next_inits(1);
        engine
            .register_adapter(
                AdapterDescriptor::new("broken", "1.0.0", "0.1.0", AdType::ALL.to_vec()),
                broken as Arc<dyn Adapter>,
            )
            .unwrap();

        let report = engine.initialize_all().await;
        assert_eq!(report.len(), 2);
        assert!(report.iter().any(|r| r.name == "testnet" && r.initialized));
        assert!(report.iter().any(|r| r.name == "broken" && !r.initialized));
    }

    #[tokio::test]
    async fn test_set_consent_flows_to_signals() {
        let (engine, _adapter) =
            engine_with_adapter(config_with_placement("home", AdType::Banner));

        engine.set_consent(ConsentState {
            gdpr_applies: Some(true),
            us_privacy: Some("1YNN".to_string()),
            ..Default::default()
        });
        assert_eq!(engine.consent.signals().len(), 2);
    }

    #[tokio::test]
    async fn test_show_after_load() {
        let (engine, _adapter) =
            engine_with_adapter(config_with_placement("home", AdType::Interstitial));
        engine.initialize_all().await;
        engine.load_ad("home").await.unwrap();

        let (ad, _guard) = engine.show("home").unwrap();
        assert_eq!(ad.network, "testnet");
    }

    #[tokio::test]
    async fn test_apply_config_replaces_placements() {
        let (engine, _adapter) =
            engine_with_adapter(config_with_placement("home", AdType::Banner));
        engine.initialize_all().await;

        engine.apply_config(config_with_placement("other", AdType::Banner));
        assert!(engine.load_ad("home").await.is_err());
        assert!(engine.load_ad("other").await.is_ok());
    }

    #[tokio::test]
    async fn test_shutdown_clears_registry() {
        let (engine, _adapter) =
            engine_with_adapter(config_with_placement("home", AdType::Banner));
        engine.start();
        engine.shutdown().await;

        assert!(engine.registry().list_available().is_empty());
    }
}
