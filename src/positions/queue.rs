use super::db::PositionStore;
use super::update::PositionUpdate;
use crate::arguments::is_debug_batch_enabled;
use crate::errors::StoreError;
use crate::logger::{self, LogTag};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Deferred write batch queue
///
/// Holds at most one pending update per order, merged on re-enqueue, and
/// writes them in order-id order as one bulk update once the flush interval
/// has elapsed. Memory only: a crash loses whatever was not flushed.
pub struct WriteBatchQueue {
    interval: Duration,
    state: Mutex<BatchState>,
}

struct BatchState {
    pending: BTreeMap<i64, PositionUpdate>,
    last_flush: Instant,
}

impl WriteBatchQueue {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            state: Mutex::new(BatchState {
                pending: BTreeMap::new(),
                last_flush: Instant::now(),
            }),
        }
    }

    pub async fn enqueue(&self, order_id: i64, update: PositionUpdate) {
        let mut state = self.state.lock().await;
        match state.pending.get_mut(&order_id) {
            Some(existing) => existing.merge(update),
            None => {
                state.pending.insert(order_id, update);
            }
        }
        if is_debug_batch_enabled() {
            logger::debug(
                LogTag::Batch,
                &format!("queued update for order {} ({} pending)", order_id, state.pending.len()),
            );
        }
    }

    /// Whether an update for this order is waiting to be written
    pub async fn contains(&self, order_id: i64) -> bool {
        self.state.lock().await.pending.contains_key(&order_id)
    }

    /// Take back the waiting update of an order without writing it
    pub async fn remove(&self, order_id: i64) -> Option<PositionUpdate> {
        self.state.lock().await.pending.remove(&order_id)
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.pending.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Flush when the interval has elapsed since the last flush
    ///
    /// Returns the number of rows written, `0` when nothing was due.
    pub async fn flush_if_due(&self, store: &dyn PositionStore) -> Result<usize, StoreError> {
        let mut state = self.state.lock().await;
        if state.pending.is_empty() || state.last_flush.elapsed() < self.interval {
            return Ok(0);
        }
        Self::write(&mut state, store).await
    }

    /// Flush regardless of the interval (shutdown)
    pub async fn flush_now(&self, store: &dyn PositionStore) -> Result<usize, StoreError> {
        let mut state = self.state.lock().await;
        if state.pending.is_empty() {
            return Ok(0);
        }
        Self::write(&mut state, store).await
    }

    async fn write(state: &mut BatchState, store: &dyn PositionStore) -> Result<usize, StoreError> {
        let batch: Vec<(i64, PositionUpdate)> = state
            .pending
            .iter()
            .map(|(order_id, update)| (*order_id, update.clone()))
            .collect();

        // on failure the buffer is kept for the next attempt
        let written = store.bulk_update(&batch).await?;
        state.pending.clear();
        state.last_flush = Instant::now();

        logger::info(
            LogTag::Batch,
            &format!("flushed {} deferred position updates", written),
        );
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::positions::db::SqliteStore;
    use crate::positions::types::{Position, PositionStatus};

    async fn store_with_orders(count: usize) -> (SqliteStore, Vec<i64>) {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut ids = Vec::new();
        for i in 0..count {
            let position = Position {
                trader_id: 1,
                position_id: i as i64 + 1,
                trade_pair: format!("PAIR{}", i),
                ..Default::default()
            };
            ids.push(store.insert_position(&position).await.unwrap());
        }
        (store, ids)
    }

    fn to_processing() -> PositionUpdate {
        PositionUpdate {
            status: Some(PositionStatus::Processing),
            old_status: Some(PositionStatus::Pending),
            ..Default::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_write_before_interval() {
        let (store, ids) = store_with_orders(1).await;
        let queue = WriteBatchQueue::new(Duration::from_secs(20));

        queue.enqueue(ids[0], to_processing()).await;
        tokio::time::advance(Duration::from_secs(19)).await;

        assert_eq!(queue.flush_if_due(&store).await.unwrap(), 0);
        assert!(queue.contains(ids[0]).await);
        let row = store.get_position(ids[0]).await.unwrap().unwrap();
        assert_eq!(row.status, PositionStatus::Pending);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_bulk_write_after_interval() {
        let (store, ids) = store_with_orders(3).await;
        let queue = WriteBatchQueue::new(Duration::from_secs(20));

        for id in ids.iter().rev() {
            queue.enqueue(*id, to_processing()).await;
        }
        tokio::time::advance(Duration::from_secs(20)).await;

        assert_eq!(queue.flush_if_due(&store).await.unwrap(), 3);
        assert!(queue.is_empty().await);
        for id in ids {
            let row = store.get_position(id).await.unwrap().unwrap();
            assert_eq!(row.status, PositionStatus::Processing);
        }
        assert_eq!(store.bulk_write_count(), 1);
    }

    #[tokio::test]
    async fn test_enqueue_twice_merges() {
        let queue = WriteBatchQueue::new(Duration::from_secs(20));
        queue.enqueue(5, to_processing()).await;
        queue
            .enqueue(
                5,
                PositionUpdate {
                    entry_price: Some(42.0),
                    ..Default::default()
                },
            )
            .await;

        assert_eq!(queue.len().await, 1);
        let state = queue.state.lock().await;
        let merged = &state.pending[&5];
        assert_eq!(merged.status, Some(PositionStatus::Processing));
        assert_eq!(merged.entry_price, Some(42.0));
    }

    #[tokio::test]
    async fn test_removed_update_is_never_written() {
        let (store, ids) = store_with_orders(1).await;
        let queue = WriteBatchQueue::new(Duration::ZERO);
        queue.enqueue(ids[0], to_processing()).await;

        assert_eq!(queue.remove(ids[0]).await, Some(to_processing()));
        assert_eq!(queue.remove(ids[0]).await, None);
        assert_eq!(queue.flush_now(&store).await.unwrap(), 0);
        let row = store.get_position(ids[0]).await.unwrap().unwrap();
        assert_eq!(row.status, PositionStatus::Pending);
    }

    #[tokio::test]
    async fn test_flush_now_ignores_interval() {
        let (store, ids) = store_with_orders(1).await;
        let queue = WriteBatchQueue::new(Duration::from_secs(3600));
        queue.enqueue(ids[0], to_processing()).await;

        assert_eq!(queue.flush_now(&store).await.unwrap(), 1);
        assert!(queue.is_empty().await);
    }

    #[tokio::test]
    async fn test_failed_flush_keeps_buffer() {
        let (store, _) = store_with_orders(0).await;
        let queue = WriteBatchQueue::new(Duration::ZERO);
        // no such row: the bulk transaction is rolled back
        queue.enqueue(999, to_processing()).await;

        assert!(queue.flush_if_due(&store).await.is_err());
        assert!(queue.contains(999).await);
    }
}
