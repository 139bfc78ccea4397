//! Ad cache with monotonic-clock expiry.
//!
//! At most one ad is cached per placement; a new win overwrites the old
//! entry. Expired entries are treated as absent and evicted lazily on read.
//! All expiry math reads the injected [`Clock`], never the wall clock, so
//! NTP corrections and user clock changes cannot resurrect or kill an ad.

use super::types::{CachedAd, CacheStats};
use crate::adapter::{AdType, Fill};
use crate::time::{Clock, SystemClock};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Stores won ads keyed by placement until they are shown or expire.
pub struct AdCache {
    entries: Mutex<HashMap<String, CachedAd>>,
    stats: Mutex<CacheStats>,
    clock: Arc<dyn Clock>,
}

impl AdCache {
    /// Creates a cache on the process monotonic clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Creates a cache on an injected clock (tests use [`ManualClock`]).
    ///
    /// [`ManualClock`]: crate::time::ManualClock
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            stats: Mutex::new(CacheStats::default()),
            clock,
        }
    }

    /// Stores a winning fill for a placement, overwriting any prior entry.
    ///
    /// Returns the cached entry.
    pub fn put(&self, placement_id: &str, ad_type: AdType, fill: &Fill) -> CachedAd {
        let ad = CachedAd::from_fill(placement_id, ad_type, fill, self.clock.now());

        let mut entries = self.entries.lock().unwrap();
        let replaced = entries.insert(placement_id.to_string(), ad.clone()).is_some();
        debug!(
            placement = placement_id,
            network = %ad.network,
            replaced,
            "ad cached"
        );

        let mut stats = self.stats.lock().unwrap();
        stats.entry_count = entries.len();

        ad
    }

    /// Returns the cached ad for a placement if present and not expired.
    ///
    /// An expired entry is evicted and reported as absent.
    pub fn get(&self, placement_id: &str) -> Option<CachedAd> {
        self.lookup(placement_id, false)
    }

    /// Removes and returns the cached ad for a placement if present and
    /// not expired. Used by show paths that consume the ad.
    pub fn take(&self, placement_id: &str) -> Option<CachedAd> {
        self.lookup(placement_id, true)
    }

    /// Whether the given ad has expired on this cache's clock.
    ///
    /// Ads without an expiry never expire through this mechanism.
    pub fn is_expired(&self, ad: &CachedAd) -> bool {
        match ad.expires_at {
            Some(expires_at) => self.clock.now() > expires_at,
            None => false,
        }
    }

    /// Removes all entries.
    pub fn clear(&self) {
        let mut entries = self.entries.lock().unwrap();
        entries.clear();
        self.stats.lock().unwrap().entry_count = 0;
    }

    /// Current counters.
    pub fn stats(&self) -> CacheStats {
        *self.stats.lock().unwrap()
    }

    fn lookup(&self, placement_id: &str, remove: bool) -> Option<CachedAd> {
        let mut entries = self.entries.lock().unwrap();
        let mut stats = self.stats.lock().unwrap();

        let expired = match entries.get(placement_id) {
            Some(ad) => self.is_expired(ad),
            None => {
                stats.misses += 1;
                return None;
            }
        };

        if expired {
            entries.remove(placement_id);
            stats.expired_evictions += 1;
            stats.misses += 1;
            stats.entry_count = entries.len();
            debug!(placement = placement_id, "expired ad evicted on read");
            return None;
        }

        stats.hits += 1;
        let ad = if remove {
            let ad = entries.remove(placement_id);
            stats.entry_count = entries.len();
            ad
        } else {
            entries.get(placement_id).cloned()
        };
        ad
    }
}

impl Default for AdCache {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for AdCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdCache")
            .field("entries", &self.entries.lock().unwrap().len())
            .finish()
    }
}
