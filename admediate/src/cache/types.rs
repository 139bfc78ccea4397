//! Cache entry types and statistics.

use crate::adapter::{AdType, Creative, Fill};
use std::time::Instant;

/// A won fill cached for later presentation.
///
/// `expires_at` is computed from the monotonic clock at receipt time plus
/// the network-granted TTL. Wall-clock time plays no part in it. Ads
/// without a TTL never expire through the cache.
#[derive(Debug, Clone)]
pub struct CachedAd {
    /// Engine-assigned ad id.
    pub id: String,
    /// Placement this ad was won for.
    pub placement_id: String,
    /// Adapter that produced the fill.
    pub network: String,
    /// Format of the creative.
    pub ad_type: AdType,
    /// The creative to present.
    pub creative: Creative,
    /// Monotonic expiry instant, if a TTL was granted.
    pub expires_at: Option<Instant>,
}

impl CachedAd {
    /// Builds a cache entry from a winning fill.
    ///
    /// `received_at` must come from the cache's monotonic clock so that
    /// expiry math stays on a single time source.
    pub fn from_fill(
        placement_id: impl Into<String>,
        ad_type: AdType,
        fill: &Fill,
        received_at: Instant,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            placement_id: placement_id.into(),
            network: fill.adapter.clone(),
            ad_type,
            creative: fill.creative.clone(),
            expires_at: fill.ttl.map(|ttl| received_at + ttl),
        }
    }
}

/// Hit/miss counters for the ad cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Entries evicted lazily because they had expired.
    pub expired_evictions: u64,
    pub entry_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn fill(ttl: Option<Duration>) -> Fill {
        Fill {
            adapter: "testnet".to_string(),
            ecpm: 1.0,
            currency: "USD".to_string(),
            creative: Creative {
                id: "c1".to_string(),
                html: Some("<div/>".to_string()),
                vast_tag_url: None,
                tracking: Vec::new(),
            },
            received_at: Instant::now(),
            ttl,
        }
    }

    #[test]
    fn test_from_fill_with_ttl() {
        let received = Instant::now();
        let ad = CachedAd::from_fill("home", AdType::Banner, &fill(Some(Duration::from_secs(60))), received);

        assert_eq!(ad.network, "testnet");
        assert_eq!(ad.expires_at, Some(received + Duration::from_secs(60)));
        assert!(!ad.id.is_empty());
    }

    #[test]
    fn test_from_fill_without_ttl_never_expires() {
        let ad = CachedAd::from_fill("home", AdType::Banner, &fill(None), Instant::now());
        assert!(ad.expires_at.is_none());
    }
}
