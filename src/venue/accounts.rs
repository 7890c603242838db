//! Trader -> venue account directory
//!
//! Loaded from the store and served from memory. Contents are never older
//! than `max_age`: a lookup after that reloads first. `refresh` forces a
//! reload (e.g. after onboarding a trader).

use crate::errors::StoreError;
use crate::logger::{self, LogTag};
use crate::positions::db::PositionStore;
use crate::positions::types::{TraderAccount, Venue};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

pub struct AccountDirectory {
    store: Arc<dyn PositionStore>,
    max_age: Duration,
    state: RwLock<DirectoryState>,
}

#[derive(Default)]
struct DirectoryState {
    by_trader: HashMap<i64, TraderAccount>,
    refreshed_at: Option<Instant>,
}

impl AccountDirectory {
    pub fn new(store: Arc<dyn PositionStore>, max_age: Duration) -> Self {
        Self {
            store,
            max_age,
            state: RwLock::new(DirectoryState::default()),
        }
    }

    /// Reload every account from the store
    pub async fn refresh(&self) -> Result<usize, StoreError> {
        let accounts = self.store.list_trader_accounts().await?;
        let count = accounts.len();
        let mut state = self.state.write().await;
        state.by_trader = accounts.into_iter().map(|a| (a.trader_id, a)).collect();
        state.refreshed_at = Some(Instant::now());
        Ok(count)
    }

    pub async fn is_stale(&self) -> bool {
        match self.state.read().await.refreshed_at {
            Some(at) => at.elapsed() >= self.max_age,
            None => true,
        }
    }

    async fn ensure_fresh(&self) {
        if !self.is_stale().await {
            return;
        }
        if let Err(e) = self.refresh().await {
            // serve what we have; the next lookup retries
            logger::warning(
                LogTag::Valuation,
                &format!("account directory refresh failed: {}", e),
            );
        }
    }

    pub async fn account(&self, trader_id: i64) -> Option<TraderAccount> {
        self.ensure_fresh().await;
        self.state.read().await.by_trader.get(&trader_id).cloned()
    }

    pub async fn hot_key(&self, trader_id: i64) -> Option<String> {
        self.account(trader_id).await.map(|a| a.hot_key)
    }

    /// All accounts on one venue, ordered by trader id
    pub async fn accounts_on(&self, venue: Venue) -> Vec<TraderAccount> {
        self.ensure_fresh().await;
        let state = self.state.read().await;
        let mut accounts: Vec<TraderAccount> = state
            .by_trader
            .values()
            .filter(|a| a.venue == venue)
            .cloned()
            .collect();
        accounts.sort_by_key(|a| a.trader_id);
        accounts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::positions::db::SqliteStore;

    fn account(trader_id: i64, hot_key: &str, venue: Venue) -> TraderAccount {
        TraderAccount {
            trader_id,
            hot_key: hot_key.to_string(),
            venue,
            email: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_reload_after_max_age() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        store.upsert_trader_account(&account(1, "hk-a", Venue::Main)).await.unwrap();
        let directory = AccountDirectory::new(store.clone(), Duration::from_secs(300));

        assert_eq!(directory.hot_key(1).await.as_deref(), Some("hk-a"));

        store.upsert_trader_account(&account(1, "hk-b", Venue::Main)).await.unwrap();
        // still within max age: cached value
        assert_eq!(directory.hot_key(1).await.as_deref(), Some("hk-a"));

        tokio::time::advance(Duration::from_secs(300)).await;
        assert_eq!(directory.hot_key(1).await.as_deref(), Some("hk-b"));
    }

    #[tokio::test]
    async fn test_explicit_refresh_and_venue_filter() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let directory = AccountDirectory::new(store.clone(), Duration::from_secs(300));
        assert_eq!(directory.hot_key(2).await, None);

        store.upsert_trader_account(&account(2, "hk-main", Venue::Main)).await.unwrap();
        store.upsert_trader_account(&account(3, "hk-test", Venue::Test)).await.unwrap();
        assert_eq!(directory.refresh().await.unwrap(), 2);

        let test_accounts = directory.accounts_on(Venue::Test).await;
        assert_eq!(test_accounts.len(), 1);
        assert_eq!(test_accounts[0].trader_id, 3);
    }
}
