/// Periodic valuation sync
///
/// Reads the venue-wide document once per venue and refreshes the cache
/// entry of every known trader and pair. Entries whose venue position was
/// closed longer ago than the retention window are evicted.
use super::valuation::ValuationCache;
use crate::logger::{self, LogTag};
use crate::positions::types::Venue;
use crate::venue::{AccountDirectory, SnapshotSource, VenuePosition};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncReport {
    pub accounts: usize,
    pub refreshed: usize,
    pub evicted: usize,
    pub failed_venues: Vec<Venue>,
}

pub struct ValuationSync {
    cache: Arc<ValuationCache>,
    source: Arc<dyn SnapshotSource>,
    accounts: Arc<AccountDirectory>,
    closed_retention: ChronoDuration,
}

impl ValuationSync {
    pub fn new(
        cache: Arc<ValuationCache>,
        source: Arc<dyn SnapshotSource>,
        accounts: Arc<AccountDirectory>,
        closed_retention: ChronoDuration,
    ) -> Self {
        Self {
            cache,
            source,
            accounts,
            closed_retention,
        }
    }

    pub async fn tick(&self, now: DateTime<Utc>) -> SyncReport {
        let mut report = SyncReport::default();

        for venue in [Venue::Main, Venue::Test] {
            let accounts = self.accounts.accounts_on(venue).await;
            if accounts.is_empty() {
                continue;
            }
            report.accounts += accounts.len();

            let snapshot = match self.source.snapshot(venue).await {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    logger::warning(
                        LogTag::Sync,
                        &format!("{} snapshot unavailable: {}", venue, e),
                    );
                    report.failed_venues.push(venue);
                    continue;
                }
            };

            logger::verbose(
                LogTag::Sync,
                &format!("{} snapshot: {} accounts", venue, snapshot.len()),
            );
            for account in accounts {
                let Some(venue_account) = snapshot.get(&account.hot_key) else {
                    continue;
                };
                for (pair, position) in latest_per_pair(&venue_account.positions) {
                    let key = ValuationCache::key(pair, account.trader_id);
                    if self.is_expired(position, now) {
                        if self.cache.evict(&key) {
                            report.evicted += 1;
                        }
                    } else if self.cache.store(&key, position.valuation()) {
                        report.refreshed += 1;
                    }
                }
            }
        }

        logger::debug(LogTag::Sync, &format!("{:?}", report));
        report
    }

    fn is_expired(&self, position: &VenuePosition, now: DateTime<Utc>) -> bool {
        if !position.is_closed_position {
            return false;
        }
        match position.closed_at() {
            Some(closed_at) => now - closed_at > self.closed_retention,
            None => false,
        }
    }
}

/// One venue position per pair, a non-closed one when there is any
fn latest_per_pair(positions: &[VenuePosition]) -> BTreeMap<&str, &VenuePosition> {
    let mut chosen: BTreeMap<&str, &VenuePosition> = BTreeMap::new();
    for position in positions {
        let Some(pair) = position.pair() else {
            continue;
        };
        match chosen.get(pair) {
            Some(existing) if !existing.is_closed_position => {}
            Some(_) if position.is_closed_position => {}
            _ => {
                chosen.insert(pair, position);
            }
        }
    }
    chosen
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::positions::db::{PositionStore, SqliteStore};
    use crate::positions::types::TraderAccount;
    use crate::testing::{ScriptedFeed, StaticSnapshots};
    use crate::venue::feed::parse_snapshot;
    use crate::venue::Valuation;
    use chrono::TimeZone;
    use std::time::Duration;

    fn now() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).single().unwrap()
    }

    async fn fixture(document: serde_json::Value) -> (ValuationSync, Arc<ValuationCache>) {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        store
            .upsert_trader_account(&TraderAccount {
                trader_id: 9,
                hot_key: "hk-9".to_string(),
                venue: Venue::Main,
                email: None,
            })
            .await
            .unwrap();
        let accounts = Arc::new(AccountDirectory::new(store, Duration::from_secs(60)));
        let snapshots = Arc::new(StaticSnapshots::new());
        snapshots.set(Venue::Main, parse_snapshot(Venue::Main, document).unwrap());
        let cache = Arc::new(ValuationCache::new(Arc::new(ScriptedFeed::returning(
            Valuation::empty(),
        ))));
        let sync = ValuationSync::new(
            cache.clone(),
            snapshots,
            accounts,
            ChronoDuration::seconds(3600),
        );
        (sync, cache)
    }

    #[tokio::test]
    async fn test_open_position_wins_over_closed() {
        let (sync, cache) = fixture(serde_json::json!({
            "hk-9": {"positions": [
                {"position_uuid": "a", "trade_pair": ["ETHUSD"], "orders": [{"price": 1.0}],
                 "is_closed_position": true, "close_ms": 1_699_999_000_000i64},
                {"position_uuid": "b", "trade_pair": ["ETHUSD"], "orders": [{"price": 2.0}],
                 "is_closed_position": false}
            ]}
        }))
        .await;

        let report = sync.tick(now()).await;
        assert_eq!(report.refreshed, 1);
        assert_eq!(cache.get("ETHUSD-9").map(|v| v.venue_uuid), Some("b".to_string()));
    }

    #[tokio::test]
    async fn test_long_closed_position_is_evicted() {
        let (sync, cache) = fixture(serde_json::json!({
            "hk-9": {"positions": [
                {"position_uuid": "a", "trade_pair": ["ETHUSD"], "orders": [{"price": 1.0}],
                 "is_closed_position": true, "close_ms": 1_690_000_000_000i64}
            ]}
        }))
        .await;
        cache.store(
            "ETHUSD-9",
            Valuation {
                mark_price: 5.0,
                ..Valuation::empty()
            },
        );

        let report = sync.tick(now()).await;
        assert_eq!(report.evicted, 1);
        assert!(cache.get("ETHUSD-9").is_none());
    }
}
