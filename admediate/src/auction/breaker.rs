//! Per-adapter circuit breaker.
//!
//! Tracks consecutive failures per adapter within the session. An adapter
//! that keeps failing is excluded from auction candidate lists until a
//! reset timeout elapses, at which point one probe attempt is allowed
//! (half-open). A success closes the circuit again.
//!
//! # State Machine
//!
//! ```text
//! Closed --[max_failures consecutive failures]--> Open
//! Open --[reset_timeout elapsed]--> HalfOpen (one probe allowed)
//! HalfOpen --[success]--> Closed
//! HalfOpen --[failure]--> Open (timer restarts)
//! ```

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Breaker tuning.
#[derive(Debug, Clone)]
pub struct BreakerConfig {
    /// Consecutive failures that open the circuit.
    pub max_failures: u32,
    /// How long an open circuit blocks before allowing a probe.
    pub reset_timeout: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            max_failures: 3,
            reset_timeout: Duration::from_secs(60),
        }
    }
}

/// Circuit state for one adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    /// Normal operation.
    Closed,
    /// Failures exceeded; adapter excluded from candidates.
    Open,
    /// Reset timeout elapsed; one probe attempt allowed.
    HalfOpen,
}

#[derive(Debug, Default)]
struct BreakerEntry {
    consecutive_failures: u32,
    last_failure: Option<Instant>,
    open: bool,
}

/// Tracks per-adapter failure streaks for candidate exclusion.
#[derive(Debug)]
pub struct AdapterBreaker {
    config: BreakerConfig,
    entries: Mutex<HashMap<String, BreakerEntry>>,
}

impl AdapterBreaker {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Current circuit state for an adapter.
    pub fn state(&self, adapter: &str) -> BreakerState {
        let entries = self.entries.lock().unwrap();
        match entries.get(adapter) {
            Some(entry) if entry.open => {
                let elapsed = entry
                    .last_failure
                    .map(|at| at.elapsed())
                    .unwrap_or(Duration::ZERO);
                if elapsed >= self.config.reset_timeout {
                    BreakerState::HalfOpen
                } else {
                    BreakerState::Open
                }
            }
            _ => BreakerState::Closed,
        }
    }

    /// Whether the adapter may be tried right now.
    ///
    /// Closed and half-open circuits allow an attempt; only a fully open
    /// circuit excludes the adapter.
    pub fn allow(&self, adapter: &str) -> bool {
        self.state(adapter) != BreakerState::Open
    }

    /// Records a successful attempt, closing the circuit.
    pub fn record_success(&self, adapter: &str) {
        let mut entries = self.entries.lock().unwrap();
        if let Some(entry) = entries.get_mut(adapter) {
            if entry.open {
                debug!(adapter = adapter, "circuit closed after successful probe");
            }
            entry.consecutive_failures = 0;
            entry.open = false;
            entry.last_failure = None;
        }
    }

    /// Records a failed attempt, opening the circuit at the threshold.
    pub fn record_failure(&self, adapter: &str) {
        let mut entries = self.entries.lock().unwrap();
        let entry = entries.entry(adapter.to_string()).or_default();
        entry.consecutive_failures += 1;
        entry.last_failure = Some(Instant::now());

        if entry.consecutive_failures >= self.config.max_failures && !entry.open {
            entry.open = true;
            warn!(
                adapter = adapter,
                failures = entry.consecutive_failures,
                "circuit opened"
            );
        } else if entry.open {
            // A failed half-open probe restarts the open timer.
            debug!(adapter = adapter, "probe failed, circuit stays open");
        }
    }

    /// Resets the circuit for an adapter.
    pub fn reset(&self, adapter: &str) {
        let mut entries = self.entries.lock().unwrap();
        entries.remove(adapter);
    }
}

impl Default for AdapterBreaker {
    fn default() -> Self {
        Self::new(BreakerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(max_failures: u32, reset_ms: u64) -> AdapterBreaker {
        AdapterBreaker::new(BreakerConfig {
            max_failures,
            reset_timeout: Duration::from_millis(reset_ms),
        })
    }

    #[test]
    fn test_closed_by_default() {
        let breaker = breaker(3, 1000);
        assert_eq!(breaker.state("admob"), BreakerState::Closed);
        assert!(breaker.allow("admob"));
    }

    #[test]
    fn test_opens_after_threshold() {
        let breaker = breaker(3, 1000);

        breaker.record_failure("admob");
        breaker.record_failure("admob");
        assert!(breaker.allow("admob"));

        breaker.record_failure("admob");
        assert_eq!(breaker.state("admob"), BreakerState::Open);
        assert!(!breaker.allow("admob"));
    }

    #[test]
    fn test_success_resets_streak() {
        let breaker = breaker(3, 1000);

        breaker.record_failure("admob");
        breaker.record_failure("admob");
        breaker.record_success("admob");
        breaker.record_failure("admob");
        breaker.record_failure("admob");

        assert_eq!(breaker.state("admob"), BreakerState::Closed);
    }

    #[test]
    fn test_half_open_after_reset_timeout() {
        let breaker = breaker(1, 20);

        breaker.record_failure("admob");
        assert_eq!(breaker.state("admob"), BreakerState::Open);

        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(breaker.state("admob"), BreakerState::HalfOpen);
        assert!(breaker.allow("admob"), "half-open allows one probe");
    }

    #[test]
    fn test_successful_probe_closes() {
        let breaker = breaker(1, 10);

        breaker.record_failure("admob");
        std::thread::sleep(Duration::from_millis(15));
        assert_eq!(breaker.state("admob"), BreakerState::HalfOpen);

        breaker.record_success("admob");
        assert_eq!(breaker.state("admob"), BreakerState::Closed);
    }

    #[test]
    fn test_failed_probe_reopens() {
        let breaker = breaker(1, 30);

        breaker.record_failure("admob");
        std::thread::sleep(Duration::from_millis(35));
        assert_eq!(breaker.state("admob"), BreakerState::HalfOpen);

        breaker.record_failure("admob");
        assert_eq!(breaker.state("admob"), BreakerState::Open);
    }

    #[test]
    fn test_adapters_tracked_independently() {
        let breaker = breaker(1, 1000);

        breaker.record_failure("broken");
        assert!(!breaker.allow("broken"));
        assert!(breaker.allow("healthy"));
    }

    #[test]
    fn test_reset() {
        let breaker = breaker(1, 1000);
        breaker.record_failure("admob");
        assert!(!breaker.allow("admob"));

        breaker.reset("admob");
        assert_eq!(breaker.state("admob"), BreakerState::Closed);
    }
}
