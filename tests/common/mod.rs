#![allow(dead_code)]

use challengebot::cache::ValuationCache;
use challengebot::positions::{
    Deadlines, Position, PositionOperations, PositionStatus, PositionStore, ProcessingResolver,
    ReconciliationEngine, SqliteStore, WriteBatchQueue,
};
use challengebot::testing::{FixedPrices, RecordingNotifier, ScriptedFeed, ScriptedTransport};
use challengebot::venue::{RateLimitSettings, SignalGateway, Valuation};
use std::sync::Arc;
use std::time::Duration;

/// In-memory store plus scripted collaborators, wired like `run::build_components`
pub struct Harness {
    pub store: Arc<SqliteStore>,
    pub feed: Arc<ScriptedFeed>,
    pub transport: Arc<ScriptedTransport>,
    pub prices: Arc<FixedPrices>,
    pub notifier: Arc<RecordingNotifier>,
    pub cache: Arc<ValuationCache>,
    pub gateway: Arc<SignalGateway>,
    pub queue: Arc<WriteBatchQueue>,
}

impl Harness {
    pub fn new() -> Self {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let feed = Arc::new(ScriptedFeed::empty());
        let transport = Arc::new(ScriptedTransport::accepting());
        let cache = Arc::new(ValuationCache::new(feed.clone()));
        let gateway = Arc::new(SignalGateway::new(
            transport.clone(),
            RateLimitSettings::default(),
        ));
        Self {
            store,
            feed,
            transport,
            prices: Arc::new(FixedPrices::new()),
            notifier: Arc::new(RecordingNotifier::new()),
            cache,
            gateway,
            // long enough that only an explicit flush writes
            queue: Arc::new(WriteBatchQueue::new(Duration::from_secs(3600))),
        }
    }

    pub fn engine(&self) -> ReconciliationEngine {
        ReconciliationEngine::new(
            self.store.clone(),
            self.cache.clone(),
            self.prices.clone(),
            self.gateway.clone(),
            self.queue.clone(),
            self.notifier.clone(),
            4,
        )
    }

    pub fn resolver(&self) -> ProcessingResolver {
        ProcessingResolver::new(
            self.store.clone(),
            self.cache.clone(),
            self.gateway.clone(),
            self.notifier.clone(),
            Deadlines::default(),
            4,
        )
    }

    pub fn operations(&self) -> PositionOperations {
        PositionOperations::new(
            self.store.clone(),
            self.prices.clone(),
            self.gateway.clone(),
            self.cache.clone(),
            self.queue.clone(),
        )
    }

    pub async fn insert(&self, position: Position) -> i64 {
        self.store.insert_position(&position).await.unwrap()
    }

    pub async fn load(&self, order_id: i64) -> Position {
        self.store.get_position(order_id).await.unwrap().unwrap()
    }

    pub async fn status_of(&self, order_id: i64) -> PositionStatus {
        self.load(order_id).await.status
    }
}

pub fn priced(mark_price: f64, profit_loss: f64) -> Valuation {
    Valuation {
        mark_price,
        profit_loss,
        fill_count: 1,
        venue_uuid: "uuid-1".to_string(),
        venue_hot_key: "hk-1".to_string(),
        ..Valuation::empty()
    }
}

pub fn open_long(trader_id: i64, pair: &str) -> Position {
    Position {
        trader_id,
        trade_pair: pair.to_string(),
        position_id: 1,
        status: PositionStatus::Open,
        old_status: Some(PositionStatus::Processing),
        entry_price: 100.0,
        initial_price: 100.0,
        leverage: 0.1,
        cumulative_leverage: 0.1,
        order_level: 1,
        ..Default::default()
    }
}

pub fn pending_long(trader_id: i64, pair: &str, entry_price: f64, upward: i32) -> Position {
    Position {
        trader_id,
        trade_pair: pair.to_string(),
        position_id: 1,
        status: PositionStatus::Pending,
        old_status: Some(PositionStatus::Pending),
        entry_price,
        initial_price: entry_price,
        min_price: entry_price,
        max_price: entry_price,
        upward,
        leverage: 0.1,
        cumulative_leverage: 0.1,
        ..Default::default()
    }
}
