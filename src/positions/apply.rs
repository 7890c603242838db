use super::db::PositionStore;
use super::queue::WriteBatchQueue;
use super::transitions::{plan, PositionTransition};
use super::types::Position;
use super::update::PositionUpdate;
use crate::arguments::is_debug_store_enabled;
use crate::errors::EngineError;
use crate::logger::{self, LogTag};

#[derive(Debug, Default)]
pub struct ApplyEffects {
    pub db_updated: bool,
    pub deferred: bool,
    pub position_closed: bool,
    pub update: PositionUpdate,
}

/// Plan `transition` and write it in its own transaction
///
/// Empty plans (nothing changed) skip the store.
pub async fn apply_transition(
    store: &dyn PositionStore,
    position: &Position,
    transition: &PositionTransition,
) -> Result<ApplyEffects, EngineError> {
    let update = plan(position, transition)?;
    if update.is_empty() {
        return Ok(ApplyEffects::default());
    }

    store.update_position(position.order_id, &update).await?;

    if is_debug_store_enabled() {
        logger::debug(
            LogTag::Store,
            &format!("{} {}: {}", position.label(), transition.name(), summarize(&update)),
        );
    }

    Ok(ApplyEffects {
        db_updated: true,
        deferred: false,
        position_closed: update.closes_order(),
        update,
    })
}

/// Plan `transition` and hand the mutations to the batch queue
pub async fn defer_transition(
    queue: &WriteBatchQueue,
    position: &Position,
    transition: &PositionTransition,
) -> Result<ApplyEffects, EngineError> {
    let update = plan(position, transition)?;
    if update.is_empty() {
        return Ok(ApplyEffects::default());
    }
    queue.enqueue(position.order_id, update.clone()).await;

    Ok(ApplyEffects {
        db_updated: false,
        deferred: true,
        position_closed: update.closes_order(),
        update,
    })
}

fn summarize(update: &PositionUpdate) -> String {
    match (update.old_status, update.status) {
        (Some(from), Some(to)) => format!("{} -> {}", from, to),
        _ => "fields only".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::positions::db::SqliteStore;
    use crate::positions::types::PositionStatus;
    use crate::venue::Valuation;
    use std::time::Duration;

    fn open_position() -> Position {
        Position {
            trader_id: 1,
            trade_pair: "BTCUSD".to_string(),
            status: PositionStatus::Open,
            max_profit_loss: 2.0,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_lower_valuation_skips_store() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut position = open_position();
        position.order_id = store.insert_position(&position).await.unwrap();

        let effects = apply_transition(
            &store,
            &position,
            &PositionTransition::ValuationObserved {
                valuation: Valuation {
                    mark_price: 10.0,
                    profit_loss: 1.0,
                    ..Valuation::empty()
                },
            },
        )
        .await
        .unwrap();
        assert!(!effects.db_updated);

        let effects = apply_transition(
            &store,
            &position,
            &PositionTransition::ValuationObserved {
                valuation: Valuation {
                    mark_price: 10.0,
                    profit_loss: 3.0,
                    ..Valuation::empty()
                },
            },
        )
        .await
        .unwrap();
        assert!(effects.db_updated);
        let stored = store.get_position(position.order_id).await.unwrap().unwrap();
        assert_eq!(stored.max_profit_loss, 3.0);
    }

    #[tokio::test]
    async fn test_deferred_close_submission() {
        let queue = WriteBatchQueue::new(Duration::from_secs(20));
        let mut position = open_position();
        position.order_id = 8;

        let effects = defer_transition(
            &queue,
            &position,
            &PositionTransition::CloseSubmitted { at: chrono::Utc::now() },
        )
        .await
        .unwrap();
        assert!(effects.deferred);
        assert!(!effects.position_closed);
        assert!(queue.contains(8).await);
    }
}
