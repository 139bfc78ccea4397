//! Auction orchestration across network adapters.
//!
//! A load request moves through `Pending -> Dispatching` and terminates as
//! `Filled`, `NoFill`, `TimedOut`, or `Error`. Candidates are the
//! registered, initialized adapters that support the requested format and
//! are not excluded by this session's circuit breaker. They are tried
//! sequentially in priority order (classic waterfall) or concurrently up
//! to a limit, always bounded by the per-adapter budget and the global
//! deadline. The first fill at or above the floor price wins and is
//! written to the ad cache before the outcome is returned.
//!
//! Adapter failures never escape as raw errors: each maps to a typed
//! outcome and a normalized no-bid reason before leaving this module.

use super::breaker::{AdapterBreaker, BreakerConfig};
use super::request::AdRequest;
use crate::adapter::{Adapter, AdapterError, AdapterRegistry, Fill};
use crate::cache::{AdCache, CachedAd};
use crate::consent::ConsentCoordinator;
use crate::error::MediationError;
use crate::telemetry::TelemetryClient;
use futures::stream::{FuturesUnordered, StreamExt};
use rand::Rng;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// How candidates are dispatched within one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuctionStrategy {
    /// Sequential trial in priority order until one fills.
    Waterfall,
    /// Concurrent attempts up to a limit; first qualifying fill wins and
    /// cancels the rest.
    Parallel { max_concurrency: usize },
}

/// Orchestrator tuning.
#[derive(Debug, Clone)]
pub struct AuctionConfig {
    pub strategy: AuctionStrategy,
    /// Retry an attempt once on transient failure, inside its budget.
    pub retry_transient: bool,
    pub breaker: BreakerConfig,
}

impl Default for AuctionConfig {
    fn default() -> Self {
        Self {
            strategy: AuctionStrategy::Waterfall,
            retry_transient: true,
            breaker: BreakerConfig::default(),
        }
    }
}

/// Request state machine phases, for logs and telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuctionPhase {
    Pending,
    Dispatching,
    Filled,
    NoFill,
    TimedOut,
    Error,
}

impl AuctionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Dispatching => "dispatching",
            Self::Filled => "filled",
            Self::NoFill => "no_fill",
            Self::TimedOut => "timed_out",
            Self::Error => "error",
        }
    }
}

/// Terminal result of an auction.
#[derive(Debug, Clone)]
pub enum AuctionOutcome {
    /// A network filled at or above the floor; the ad is already cached.
    Filled {
        adapter: String,
        ecpm: f64,
        ad: CachedAd,
    },
    /// Every candidate was exhausted without a qualifying fill.
    NoFill,
    /// The global deadline elapsed first.
    TimedOut,
}

impl AuctionOutcome {
    fn phase(&self) -> AuctionPhase {
        match self {
            Self::Filled { .. } => AuctionPhase::Filled,
            Self::NoFill => AuctionPhase::NoFill,
            Self::TimedOut => AuctionPhase::TimedOut,
        }
    }
}

enum DispatchResult {
    Filled(Fill),
    NoFill,
    TimedOut,
}

/// Runs auctions across the adapter registry within a time budget.
pub struct AuctionOrchestrator {
    registry: Arc<AdapterRegistry>,
    consent: Arc<ConsentCoordinator>,
    cache: Arc<AdCache>,
    telemetry: TelemetryClient,
    breaker: AdapterBreaker,
    config: AuctionConfig,
}

impl AuctionOrchestrator {
    pub fn new(
        registry: Arc<AdapterRegistry>,
        consent: Arc<ConsentCoordinator>,
        cache: Arc<AdCache>,
        telemetry: TelemetryClient,
        config: AuctionConfig,
    ) -> Self {
        let breaker = AdapterBreaker::new(config.breaker.clone());
        Self {
            registry,
            consent,
            cache,
            telemetry,
            breaker,
            config,
        }
    }

    /// Session failure tracker, shared with diagnostics.
    pub fn breaker(&self) -> &AdapterBreaker {
        &self.breaker
    }

    /// Runs an auction with candidates in registration order.
    pub async fn load(&self, request: &AdRequest) -> Result<AuctionOutcome, MediationError> {
        self.load_with_priority(request, None).await
    }

    /// Runs an auction with an explicit network priority order.
    ///
    /// `priority` names networks in descending priority; networks not in
    /// the list are excluded. `None` falls back to registration order.
    pub async fn load_with_priority(
        &self,
        request: &AdRequest,
        priority: Option<&[String]>,
    ) -> Result<AuctionOutcome, MediationError> {
        let started = Instant::now();
        let phase = AuctionPhase::Pending;

        if let Err(err) = request.validate() {
            self.complete_error(request, started, &err);
            return Err(err);
        }

        self.telemetry
            .load_requested(&request.placement_id, request.ad_type.as_str());
        debug!(
            placement = %request.placement_id,
            ad_type = %request.ad_type,
            phase = phase.as_str(),
            "load request accepted"
        );

        let candidates = match self.candidates(request, priority) {
            Ok(candidates) => candidates,
            Err(err) => {
                self.complete_error(request, started, &err);
                return Err(err);
            }
        };

        let phase = AuctionPhase::Dispatching;
        debug!(
            placement = %request.placement_id,
            candidates = candidates.len(),
            phase = phase.as_str(),
            "dispatching to candidates"
        );

        let consent = self.consent.signals();
        let result = if candidates.is_empty() {
            // Every supporting adapter is currently excluded.
            DispatchResult::NoFill
        } else {
            match self.config.strategy {
                AuctionStrategy::Waterfall => {
                    self.run_waterfall(request, &candidates, &consent, started)
                        .await
                }
                AuctionStrategy::Parallel { max_concurrency } => {
                    self.run_parallel(request, &candidates, &consent, started, max_concurrency)
                        .await
                }
            }
        };

        let outcome = match result {
            DispatchResult::Filled(fill) => {
                let ad = self
                    .cache
                    .put(&request.placement_id, request.ad_type, &fill);
                self.telemetry.ad_cached(&request.placement_id, &fill.adapter);
                AuctionOutcome::Filled {
                    adapter: fill.adapter.clone(),
                    ecpm: fill.ecpm,
                    ad,
                }
            }
            DispatchResult::NoFill => AuctionOutcome::NoFill,
            DispatchResult::TimedOut => AuctionOutcome::TimedOut,
        };

        let phase = outcome.phase();
        let winner = match &outcome {
            AuctionOutcome::Filled { adapter, .. } => Some(adapter.as_str()),
            _ => None,
        };
        self.telemetry.auction_completed(
            &request.placement_id,
            phase.as_str(),
            started.elapsed().as_millis() as u64,
            winner,
        );
        info!(
            placement = %request.placement_id,
            outcome = phase.as_str(),
            winner = winner.unwrap_or("-"),
            duration_ms = started.elapsed().as_millis() as u64,
            "auction completed"
        );

        Ok(outcome)
    }

    /// Builds the ordered candidate list for a request.
    ///
    /// Fails with `UnsupportedAdType` when no initialized adapter supports
    /// the format at all; circuit-breaker exclusions only narrow the list.
    fn candidates(
        &self,
        request: &AdRequest,
        priority: Option<&[String]>,
    ) -> Result<Vec<(String, Arc<dyn Adapter>)>, MediationError> {
        let supporting = self.registry.initialized_for(request.ad_type);
        if supporting.is_empty() {
            return Err(MediationError::UnsupportedAdType(
                request.ad_type.to_string(),
            ));
        }

        let ordered: Vec<(String, Arc<dyn Adapter>)> = match priority {
            Some(names) => names
                .iter()
                .filter_map(|wanted| {
                    supporting
                        .iter()
                        .find(|(name, _)| name == wanted)
                        .cloned()
                })
                .collect(),
            None => supporting,
        };

        let mut eligible = Vec::with_capacity(ordered.len());
        for (name, adapter) in ordered {
            if self.breaker.allow(&name) {
                eligible.push((name, adapter));
            } else {
                debug!(placement = %request.placement_id, adapter = %name, "candidate excluded, circuit open");
                self.telemetry
                    .adapter_attempt(&request.placement_id, &name, "circuit_open", 0, None);
            }
        }
        Ok(eligible)
    }

    async fn run_waterfall(
        &self,
        request: &AdRequest,
        candidates: &[(String, Arc<dyn Adapter>)],
        consent: &serde_json::Map<String, serde_json::Value>,
        started: Instant,
    ) -> DispatchResult {
        for (name, adapter) in candidates {
            let elapsed = started.elapsed();
            if elapsed >= request.global_timeout {
                warn!(placement = %request.placement_id, "global deadline reached mid-waterfall");
                return DispatchResult::TimedOut;
            }
            let budget = request.adapter_timeout.min(request.global_timeout - elapsed);

            let attempt_started = Instant::now();
            let result = self.attempt(adapter.as_ref(), request, consent, budget).await;
            let latency_ms = attempt_started.elapsed().as_millis() as u64;

            match result {
                Ok(fill) => {
                    self.breaker.record_success(name);
                    if fill.ecpm >= request.floor_price {
                        self.telemetry.adapter_attempt(
                            &request.placement_id,
                            name,
                            "filled",
                            latency_ms,
                            Some(fill.ecpm),
                        );
                        return DispatchResult::Filled(fill);
                    }
                    debug!(
                        placement = %request.placement_id,
                        adapter = %name,
                        ecpm = fill.ecpm,
                        floor = request.floor_price,
                        "fill below floor"
                    );
                    self.telemetry.adapter_attempt(
                        &request.placement_id,
                        name,
                        "below_floor",
                        latency_ms,
                        Some(fill.ecpm),
                    );
                }
                Err(err) => {
                    self.record_attempt_failure(request, name, &err, latency_ms);
                }
            }
        }

        if started.elapsed() >= request.global_timeout {
            DispatchResult::TimedOut
        } else {
            DispatchResult::NoFill
        }
    }

    async fn run_parallel(
        &self,
        request: &AdRequest,
        candidates: &[(String, Arc<dyn Adapter>)],
        consent: &serde_json::Map<String, serde_json::Value>,
        started: Instant,
        max_concurrency: usize,
    ) -> DispatchResult {
        let remaining = request
            .global_timeout
            .saturating_sub(started.elapsed());
        if remaining.is_zero() {
            return DispatchResult::TimedOut;
        }

        let budget = request.adapter_timeout.min(remaining);
        let global_deadline = tokio::time::sleep(remaining);
        tokio::pin!(global_deadline);

        let mut queue = candidates.iter();
        let mut in_flight = FuturesUnordered::new();
        let spawn = |name: &String, adapter: &Arc<dyn Adapter>| {
            let name = name.clone();
            let adapter = Arc::clone(adapter);
            async move {
                let attempt_started = Instant::now();
                let result = self.attempt(adapter.as_ref(), request, consent, budget).await;
                (name, result, attempt_started.elapsed().as_millis() as u64)
            }
        };

        for (name, adapter) in queue.by_ref().take(max_concurrency.max(1)) {
            in_flight.push(spawn(name, adapter));
        }

        loop {
            tokio::select! {
                _ = &mut global_deadline => {
                    // Dropping in_flight cancels the pending attempts;
                    // nothing partial reaches the cache.
                    warn!(placement = %request.placement_id, "global deadline reached, cancelling attempts");
                    return DispatchResult::TimedOut;
                }

                Some((name, result, latency_ms)) = in_flight.next() => {
                    match result {
                        Ok(fill) => {
                            self.breaker.record_success(&name);
                            if fill.ecpm >= request.floor_price {
                                self.telemetry.adapter_attempt(
                                    &request.placement_id,
                                    &name,
                                    "filled",
                                    latency_ms,
                                    Some(fill.ecpm),
                                );
                                return DispatchResult::Filled(fill);
                            }
                            self.telemetry.adapter_attempt(
                                &request.placement_id,
                                &name,
                                "below_floor",
                                latency_ms,
                                Some(fill.ecpm),
                            );
                        }
                        Err(err) => {
                            self.record_attempt_failure(request, &name, &err, latency_ms);
                        }
                    }

                    if let Some((name, adapter)) = queue.next() {
                        in_flight.push(spawn(name, adapter));
                    } else if in_flight.is_empty() {
                        return DispatchResult::NoFill;
                    }
                }
            }
        }
    }

    /// One adapter attempt inside a time budget, with a single retry for
    /// transient failures when configured and the budget allows it.
    async fn attempt(
        &self,
        adapter: &dyn Adapter,
        request: &AdRequest,
        consent: &serde_json::Map<String, serde_json::Value>,
        budget: Duration,
    ) -> Result<Fill, AdapterError> {
        let attempt_started = Instant::now();
        let first = self.attempt_once(adapter, request, consent, budget).await;

        let err = match first {
            Ok(fill) => return Ok(fill),
            Err(err) => err,
        };
        if !self.config.retry_transient || !err.is_transient() {
            return Err(err);
        }

        let elapsed = attempt_started.elapsed();
        let jitter = Duration::from_millis(rand::thread_rng().gen_range(10..=100));
        let Some(remaining) = budget.checked_sub(elapsed + jitter) else {
            return Err(err);
        };
        if remaining.is_zero() {
            return Err(err);
        }

        debug!(adapter = adapter.name(), "retrying transient failure");
        tokio::time::sleep(jitter).await;
        self.attempt_once(adapter, request, consent, remaining).await
    }

    async fn attempt_once(
        &self,
        adapter: &dyn Adapter,
        request: &AdRequest,
        consent: &serde_json::Map<String, serde_json::Value>,
        budget: Duration,
    ) -> Result<Fill, AdapterError> {
        match tokio::time::timeout(budget, adapter.load_ad(request, consent)).await {
            Ok(result) => result,
            Err(_) => Err(AdapterError::Timeout),
        }
    }

    fn record_attempt_failure(
        &self,
        request: &AdRequest,
        name: &str,
        err: &AdapterError,
        latency_ms: u64,
    ) {
        let reason = err.no_bid_reason();
        debug!(
            placement = %request.placement_id,
            adapter = name,
            reason,
            "adapter attempt failed"
        );
        self.telemetry
            .adapter_attempt(&request.placement_id, name, reason, latency_ms, None);

        // A no-fill is a healthy response; only real failures feed the
        // breaker.
        if matches!(err, AdapterError::NoFill) {
            self.breaker.record_success(name);
        } else {
            self.breaker.record_failure(name);
        }
    }

    fn complete_error(&self, request: &AdRequest, started: Instant, err: &MediationError) {
        warn!(
            placement = %request.placement_id,
            error = %err,
            phase = AuctionPhase::Error.as_str(),
            "auction failed"
        );
        self.telemetry.auction_completed(
            &request.placement_id,
            AuctionPhase::Error.as_str(),
            started.elapsed().as_millis() as u64,
            None,
        );
    }
}

impl std::fmt::Debug for AuctionOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuctionOrchestrator")
            .field("strategy", &self.config.strategy)
            .finish()
    }
}
