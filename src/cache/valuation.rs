/// Valuation cache keyed by `"{trade_pair}-{trader_id}"`
///
/// Freshness wins: any nonzero valuation overwrites the entry, a zero one
/// never does. There is no timer expiry; callers that need a fresher view
/// pass `max_staleness` (zero bypasses the cache but still writes back).
use crate::arguments::is_debug_valuation_enabled;
use crate::logger::{self, LogTag};
use crate::venue::{Valuation, ValuationFeed, ValuationQuery};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct CachedValuation {
    valuation: Valuation,
    stored_at: Instant,
}

/// Hit/miss counters for the status log
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CacheMetrics {
    pub hits: u64,
    pub misses: u64,
    pub rejected_writes: u64,
}

impl CacheMetrics {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

pub struct ValuationCache {
    feed: Arc<dyn ValuationFeed>,
    entries: RwLock<HashMap<String, CachedValuation>>,
    metrics: RwLock<CacheMetrics>,
}

impl ValuationCache {
    pub fn new(feed: Arc<dyn ValuationFeed>) -> Self {
        Self {
            feed,
            entries: RwLock::new(HashMap::new()),
            metrics: RwLock::new(CacheMetrics::default()),
        }
    }

    pub fn key(trade_pair: &str, trader_id: i64) -> String {
        format!("{}-{}", trade_pair, trader_id)
    }

    /// Cached valuation, or a feed read on miss / when the entry is too old
    pub async fn get_or_compute(
        &self,
        query: &ValuationQuery,
        max_staleness: Option<Duration>,
    ) -> Valuation {
        let key = query.cache_key();
        if let Some(hit) = self.lookup(&key, max_staleness) {
            self.metrics.write().hits += 1;
            return hit;
        }
        self.metrics.write().misses += 1;
        self.refresh(query).await
    }

    /// Always read the feed; write the result back when it carries a price
    pub async fn refresh(&self, query: &ValuationQuery) -> Valuation {
        let valuation = self.feed.valuate(query).await;
        self.store(&query.cache_key(), valuation.clone());
        valuation
    }

    fn lookup(&self, key: &str, max_staleness: Option<Duration>) -> Option<Valuation> {
        let entries = self.entries.read();
        let cached = entries.get(key)?;
        match max_staleness {
            Some(max) if cached.stored_at.elapsed() >= max => None,
            _ => Some(cached.valuation.clone()),
        }
    }

    /// Overwrite `key` unless `valuation` has no price
    pub fn store(&self, key: &str, valuation: Valuation) -> bool {
        if !valuation.has_price() {
            self.metrics.write().rejected_writes += 1;
            if is_debug_valuation_enabled() {
                logger::debug(
                    LogTag::Valuation,
                    &format!("ignoring zero-price valuation for {}", key),
                );
            }
            return false;
        }
        self.entries.write().insert(
            key.to_string(),
            CachedValuation {
                valuation,
                stored_at: Instant::now(),
            },
        );
        true
    }

    pub fn get(&self, key: &str) -> Option<Valuation> {
        self.entries.read().get(key).map(|c| c.valuation.clone())
    }

    pub fn evict(&self, key: &str) -> bool {
        self.entries.write().remove(key).is_some()
    }

    pub fn keys(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn metrics(&self) -> CacheMetrics {
        *self.metrics.read()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::positions::types::Venue;
    use crate::testing::ScriptedFeed;

    fn query() -> ValuationQuery {
        ValuationQuery {
            trader_id: 3,
            trade_pair: "BTCUSD".to_string(),
            position_uuid: None,
            venue: Venue::Main,
        }
    }

    fn priced(mark_price: f64) -> Valuation {
        Valuation {
            mark_price,
            profit_loss: 1.5,
            ..Valuation::empty()
        }
    }

    #[tokio::test]
    async fn test_hit_does_not_touch_feed() {
        let feed = Arc::new(ScriptedFeed::returning(priced(100.0)));
        let cache = ValuationCache::new(feed.clone());

        assert_eq!(cache.get_or_compute(&query(), None).await.mark_price, 100.0);
        feed.set(priced(200.0));
        assert_eq!(cache.get_or_compute(&query(), None).await.mark_price, 100.0);
        assert_eq!(feed.calls(), 1);
        assert_eq!(cache.metrics().hits, 1);
        assert_eq!(cache.get("BTCUSD-3").map(|v| v.mark_price), Some(100.0));
    }

    #[tokio::test]
    async fn test_zero_price_never_overwrites() {
        let feed = Arc::new(ScriptedFeed::returning(priced(100.0)));
        let cache = ValuationCache::new(feed.clone());
        cache.get_or_compute(&query(), None).await;

        feed.set(Valuation::empty());
        let fresh = cache.get_or_compute(&query(), Some(Duration::ZERO)).await;
        assert_eq!(fresh.mark_price, 0.0);
        assert_eq!(cache.get("BTCUSD-3").map(|v| v.mark_price), Some(100.0));
        assert_eq!(cache.metrics().rejected_writes, 1);
    }

    #[tokio::test]
    async fn test_zero_result_is_not_cached_on_miss() {
        let feed = Arc::new(ScriptedFeed::returning(Valuation::empty()));
        let cache = ValuationCache::new(feed.clone());
        cache.get_or_compute(&query(), None).await;
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_max_staleness_forces_refresh() {
        let feed = Arc::new(ScriptedFeed::returning(priced(100.0)));
        let cache = ValuationCache::new(feed.clone());
        cache.get_or_compute(&query(), None).await;

        feed.set(priced(105.0));
        let within = cache
            .get_or_compute(&query(), Some(Duration::from_secs(10)))
            .await;
        assert_eq!(within.mark_price, 100.0);

        tokio::time::advance(Duration::from_secs(10)).await;
        let refreshed = cache
            .get_or_compute(&query(), Some(Duration::from_secs(10)))
            .await;
        assert_eq!(refreshed.mark_price, 105.0);
        assert_eq!(feed.calls(), 2);
    }

    #[tokio::test]
    async fn test_evict() {
        let feed = Arc::new(ScriptedFeed::returning(priced(100.0)));
        let cache = ValuationCache::new(feed);
        cache.get_or_compute(&query(), None).await;
        assert!(cache.evict("BTCUSD-3"));
        assert!(!cache.evict("BTCUSD-3"));
        assert_eq!(cache.len(), 0);
    }
}
