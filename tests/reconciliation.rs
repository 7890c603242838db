mod common;

use challengebot::positions::{
    OperationType, OrderType, Position, PositionStatus, PositionStore, PositionUpdate,
};
use challengebot::positions::types::UPWARD_UP;
use challengebot::venue::{Valuation, ValuationQuery};
use chrono::{Duration, Utc};
use common::{open_long, pending_long, priced, Harness};

#[tokio::test]
async fn test_pending_order_activates_once_price_crosses_entry() {
    let h = Harness::new();
    let engine = h.engine();
    let order_id = h.insert(pending_long(7, "BTCUSD", 100.0, UPWARD_UP)).await;

    h.prices.set("BTCUSD", 99.0);
    let report = engine.tick().await.unwrap();
    assert_eq!(report.count("waiting"), 1);
    assert!(h.transport.sent().is_empty());

    h.prices.set("BTCUSD", 101.0);
    let report = engine.tick().await.unwrap();
    assert_eq!(report.count("activated"), 1);
    let sent = h.transport.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].order_type, OrderType::Long);
    assert_eq!(sent[0].leverage, 0.1);

    // the mutation waits in the batch queue
    assert_eq!(h.status_of(order_id).await, PositionStatus::Pending);
    let report = engine.tick().await.unwrap();
    assert_eq!(report.count("skipped_queued"), 1);
    assert_eq!(h.transport.sent().len(), 1);

    assert_eq!(engine.shutdown_flush().await.unwrap(), 1);
    let position = h.load(order_id).await;
    assert_eq!(position.status, PositionStatus::Processing);
    assert_eq!(position.old_status, Some(PositionStatus::Pending));
}

#[tokio::test]
async fn test_trailing_limit_widens_range_before_activating() {
    let h = Harness::new();
    let engine = h.engine();
    let order_id = h
        .insert(Position {
            limit_order: 2.0,
            ..pending_long(7, "ETHUSD", 100.0, -1)
        })
        .await;

    h.prices.set("ETHUSD", 95.0);
    let report = engine.tick().await.unwrap();
    assert_eq!(report.count("waiting"), 1);
    // range is written straight away, not deferred
    assert_eq!(h.load(order_id).await.min_price, 95.0);

    // 95 + 2% of 100
    h.prices.set("ETHUSD", 97.0);
    let report = engine.tick().await.unwrap();
    assert_eq!(report.count("activated"), 1);

    engine.shutdown_flush().await.unwrap();
    let position = h.load(order_id).await;
    assert_eq!(position.status, PositionStatus::Processing);
    assert_eq!(position.entry_price, 97.0);
}

#[tokio::test]
async fn test_stop_loss_sends_flat_and_defers_close() {
    let h = Harness::new();
    let engine = h.engine();
    let order_id = h
        .insert(Position {
            cumulative_stop_loss: 2.0,
            ..open_long(3, "BTCUSD")
        })
        .await;
    h.feed.set(priced(97.5, -2.5));

    let report = engine.tick().await.unwrap();
    assert_eq!(report.count("exit_submitted"), 1);
    let sent = h.transport.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].order_type, OrderType::Flat);
    assert_eq!(sent[0].leverage, 1.0);
    assert_eq!(h.status_of(order_id).await, PositionStatus::Open);

    engine.shutdown_flush().await.unwrap();
    let position = h.load(order_id).await;
    assert_eq!(position.status, PositionStatus::CloseProcessing);
    assert_eq!(position.operation_type, OperationType::Close);
    assert!(position.close_time.is_some());
}

#[tokio::test]
async fn test_deferred_close_does_not_reopen_order_closed_meanwhile() {
    let h = Harness::new();
    let engine = h.engine();
    let order_id = h
        .insert(Position {
            cumulative_stop_loss: 2.0,
            ..open_long(3, "BTCUSD")
        })
        .await;
    h.feed.set(priced(97.0, -3.0));

    let report = engine.tick().await.unwrap();
    assert_eq!(report.count("exit_submitted"), 1);
    assert!(h.queue.contains(order_id).await);

    // another writer closes the order before the batch is flushed
    h.store
        .update_position(
            order_id,
            &PositionUpdate {
                status: Some(PositionStatus::Closed),
                old_status: Some(PositionStatus::Open),
                operation_type: Some(OperationType::TournamentClosed),
                modified_by: Some("system".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(engine.shutdown_flush().await.unwrap(), 0);
    assert!(h.queue.is_empty().await);

    let position = h.load(order_id).await;
    assert_eq!(position.status, PositionStatus::Closed);
    assert_eq!(position.old_status, Some(PositionStatus::Open));
    assert_eq!(position.operation_type, OperationType::TournamentClosed);
    assert_eq!(position.close_time, None);
    assert!(h.store.list_monitored_positions().await.unwrap().is_empty());
    assert!(h.store.find_non_closed(3, "BTCUSD").await.unwrap().is_none());
}

#[tokio::test]
async fn test_new_high_is_written_without_exit() {
    let h = Harness::new();
    let engine = h.engine();
    let order_id = h
        .insert(Position {
            cumulative_take_profit: 5.0,
            ..open_long(3, "BTCUSD")
        })
        .await;
    h.feed.set(priced(103.0, 3.0));

    let report = engine.tick().await.unwrap();
    assert_eq!(report.count("held"), 1);
    assert!(h.transport.sent().is_empty());

    let position = h.load(order_id).await;
    assert_eq!(position.max_profit_loss, 3.0);
    assert_eq!(position.profit_loss, 3.0);
    assert_eq!(position.uuid, "uuid-1");
}

#[tokio::test]
async fn test_open_order_without_targets_is_not_valued() {
    let h = Harness::new();
    let engine = h.engine();
    h.insert(open_long(3, "BTCUSD")).await;
    h.feed.set(priced(80.0, -20.0));

    let report = engine.tick().await.unwrap();
    assert_eq!(report.count("skipped_no_targets"), 1);
    assert_eq!(h.feed.calls(), 0);
    assert!(h.transport.sent().is_empty());
}

#[tokio::test]
async fn test_open_order_without_venue_price_is_left_alone() {
    let h = Harness::new();
    let engine = h.engine();
    let order_id = h
        .insert(Position {
            cumulative_stop_loss: 2.0,
            max_profit_loss: 1.0,
            ..open_long(3, "BTCUSD")
        })
        .await;

    let report = engine.tick().await.unwrap();
    assert_eq!(report.count("no_price"), 1);
    assert_eq!(h.feed.calls(), 1);
    assert!(report.failures.is_empty());
    assert!(h.transport.sent().is_empty());
    assert!(h.queue.is_empty().await);

    let position = h.load(order_id).await;
    assert_eq!(position.status, PositionStatus::Open);
    assert_eq!(position.max_profit_loss, 1.0);
}

#[tokio::test]
async fn test_rejected_close_signal_notifies_operator_and_keeps_order_open() {
    let h = Harness::new();
    h.transport.respond_with(503);
    let engine = h.engine();
    let order_id = h
        .insert(Position {
            cumulative_stop_loss: 2.0,
            ..open_long(3, "BTCUSD")
        })
        .await;
    h.feed.set(priced(97.0, -3.0));

    let report = engine.tick().await.unwrap();
    assert_eq!(report.count("signal_rejected"), 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(h.notifier.operator_count(), 1);
    assert!(h.queue.is_empty().await);
    assert_eq!(h.status_of(order_id).await, PositionStatus::Open);
}

#[tokio::test]
async fn test_processing_order_past_deadline_is_force_closed() {
    let h = Harness::new();
    let resolver = h.resolver();
    let order_id = h
        .insert(Position {
            status: PositionStatus::Processing,
            open_time: Utc::now() - Duration::minutes(6),
            ..pending_long(5, "SOLUSD", 0.0, -1)
        })
        .await;

    let report = resolver.tick(Utc::now()).await.unwrap();
    assert_eq!(report.count("forced_close"), 1);

    let position = h.load(order_id).await;
    assert_eq!(position.status, PositionStatus::Closed);
    assert_eq!(position.close_price, Some(0.0));
    assert_eq!(position.modified_by, "system");
    assert_eq!(h.notifier.operator_count(), 1);
    assert_eq!(h.notifier.user_count(), 1);

    let sent = h.transport.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].order_type, OrderType::Flat);
    assert!(h.store.list_monitored_positions().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_processing_order_within_deadline_waits() {
    let h = Harness::new();
    let resolver = h.resolver();
    let order_id = h
        .insert(Position {
            status: PositionStatus::Processing,
            open_time: Utc::now() - Duration::minutes(1),
            ..pending_long(5, "SOLUSD", 0.0, -1)
        })
        .await;

    let report = resolver.tick(Utc::now()).await.unwrap();
    assert_eq!(report.count("waiting"), 1);
    assert_eq!(h.status_of(order_id).await, PositionStatus::Processing);
    assert!(h.notifier.notifications().is_empty());
    assert!(h.transport.sent().is_empty());
}

#[tokio::test]
async fn test_venue_price_confirms_processing_order() {
    let h = Harness::new();
    let resolver = h.resolver();
    let order_id = h
        .insert(Position {
            status: PositionStatus::Processing,
            open_time: Utc::now() - Duration::minutes(1),
            ..pending_long(5, "SOLUSD", 0.0, -1)
        })
        .await;
    h.feed.set(priced(101.0, 0.5));

    let report = resolver.tick(Utc::now()).await.unwrap();
    assert_eq!(report.count("confirmed"), 1);

    let position = h.load(order_id).await;
    assert_eq!(position.status, PositionStatus::Open);
    assert_eq!(position.operation_type, OperationType::Open);
    assert_eq!(position.entry_price, 101.0);
    assert_eq!(position.order_level, 1);
}

#[tokio::test]
async fn test_venue_close_confirms_close_processing_order() {
    let h = Harness::new();
    let resolver = h.resolver();
    let requested_at = Utc::now() - Duration::seconds(30);
    let order_id = h
        .insert(Position {
            status: PositionStatus::CloseProcessing,
            close_time: Some(requested_at),
            ..open_long(3, "BTCUSD")
        })
        .await;

    // still open at the venue: nothing to do yet
    h.feed.set(priced(99.0, -1.0));
    let report = resolver.tick(Utc::now()).await.unwrap();
    assert_eq!(report.count("waiting"), 1);

    h.feed.set(Valuation {
        closed_at_venue: true,
        ..priced(99.0, -1.0)
    });
    let report = resolver.tick(Utc::now()).await.unwrap();
    assert_eq!(report.count("confirmed"), 1);

    let position = h.load(order_id).await;
    assert_eq!(position.status, PositionStatus::Closed);
    assert_eq!(position.close_price, Some(99.0));
    assert_eq!(position.close_time, Some(requested_at));
}

#[tokio::test]
async fn test_empty_fresh_reading_does_not_poison_cache() {
    let h = Harness::new();
    let resolver = h.resolver();
    let position = Position {
        order_id: 0,
        status: PositionStatus::Processing,
        open_time: Utc::now(),
        ..pending_long(5, "SOLUSD", 0.0, -1)
    };
    h.insert(position.clone()).await;

    h.feed.set(priced(100.0, 0.0));
    h.cache
        .get_or_compute(&ValuationQuery::for_position(&position), None)
        .await;

    h.feed.set(Valuation::empty());
    let report = resolver.tick(Utc::now()).await.unwrap();
    assert_eq!(report.count("waiting"), 1);
    assert_eq!(
        h.cache.get(&position.cache_key()).map(|v| v.mark_price),
        Some(100.0)
    );
    assert_eq!(h.cache.metrics().rejected_writes, 1);
}

#[tokio::test]
async fn test_adjust_processing_past_deadline_is_force_closed() {
    let h = Harness::new();
    let resolver = h.resolver();
    let order_id = h
        .insert(Position {
            status: PositionStatus::AdjustProcessing,
            open_time: Utc::now() - Duration::hours(3),
            adjust_time: Some(Utc::now() - Duration::minutes(21)),
            trade_order: 2,
            ..open_long(4, "ETHUSD")
        })
        .await;

    let report = resolver.tick(Utc::now()).await.unwrap();
    assert_eq!(report.count("forced_close"), 1);

    let position = h.load(order_id).await;
    assert_eq!(position.status, PositionStatus::Closed);
    assert_eq!(position.old_status, Some(PositionStatus::AdjustProcessing));
    assert_eq!(position.close_price, Some(0.0));
    assert_eq!(h.notifier.operator_count(), 1);
    assert_eq!(h.notifier.user_count(), 1);

    let sent = h.transport.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].order_type, OrderType::Flat);
}

#[tokio::test]
async fn test_adjust_processing_within_deadline_waits() {
    let h = Harness::new();
    let resolver = h.resolver();
    // 19 minutes since the adjustment, though the order is hours old
    let order_id = h
        .insert(Position {
            status: PositionStatus::AdjustProcessing,
            open_time: Utc::now() - Duration::hours(3),
            adjust_time: Some(Utc::now() - Duration::minutes(19)),
            ..open_long(4, "ETHUSD")
        })
        .await;

    let report = resolver.tick(Utc::now()).await.unwrap();
    assert_eq!(report.count("waiting"), 1);
    assert_eq!(h.status_of(order_id).await, PositionStatus::AdjustProcessing);
}

#[tokio::test]
async fn test_close_processing_past_deadline_is_force_closed_and_evicted() {
    let h = Harness::new();
    let resolver = h.resolver();
    let requested_at = Utc::now() - Duration::minutes(6);
    let position = Position {
        status: PositionStatus::CloseProcessing,
        close_time: Some(requested_at),
        ..open_long(3, "BTCUSD")
    };
    let order_id = h.insert(position.clone()).await;

    // the venue still reports the position open
    h.feed.set(priced(99.0, -1.0));
    h.cache
        .get_or_compute(&ValuationQuery::for_position(&position), None)
        .await;
    assert!(h.cache.get(&position.cache_key()).is_some());

    let report = resolver.tick(Utc::now()).await.unwrap();
    assert_eq!(report.count("forced_close"), 1);

    let stored = h.load(order_id).await;
    assert_eq!(stored.status, PositionStatus::Closed);
    assert_eq!(stored.close_price, Some(99.0));
    assert_eq!(stored.close_time, Some(requested_at));
    assert!(h.cache.get(&position.cache_key()).is_none());

    // the trader asked for the close: only the operator hears about it
    assert_eq!(h.notifier.operator_count(), 1);
    assert_eq!(h.notifier.user_count(), 0);
    assert_eq!(h.transport.sent().len(), 1);
}

#[tokio::test]
async fn test_new_fill_confirms_adjustment() {
    let h = Harness::new();
    let resolver = h.resolver();
    let adjusting = |trader_id: i64, pair: &str, max_profit_loss: f64| Position {
        status: PositionStatus::AdjustProcessing,
        adjust_time: Some(Utc::now() - Duration::minutes(1)),
        max_profit_loss,
        trade_order: 2,
        ..open_long(trader_id, pair)
    };
    let above = h.insert(adjusting(3, "BTCUSD", 5.0)).await;
    let below = h.insert(adjusting(4, "ETHUSD", 1.0)).await;

    // same fill count as recorded: not yet confirmed
    h.feed.set(priced(102.0, 2.0));
    let report = resolver.tick(Utc::now()).await.unwrap();
    assert_eq!(report.count("waiting"), 2);

    h.feed.set(Valuation {
        fill_count: 2,
        ..priced(102.0, 2.0)
    });
    let report = resolver.tick(Utc::now()).await.unwrap();
    assert_eq!(report.count("confirmed"), 2);

    let kept_high = h.load(above).await;
    assert_eq!(kept_high.status, PositionStatus::Open);
    assert_eq!(kept_high.old_status, Some(PositionStatus::AdjustProcessing));
    assert_eq!(kept_high.operation_type, OperationType::Adjust);
    assert_eq!(kept_high.order_level, 2);
    assert_eq!(kept_high.profit_loss, 2.0);
    assert_eq!(kept_high.max_profit_loss, 5.0);

    let raised = h.load(below).await;
    assert_eq!(raised.status, PositionStatus::Open);
    assert_eq!(raised.max_profit_loss, 2.0);

    assert!(h.transport.sent().is_empty());
    assert!(h.notifier.notifications().is_empty());
}
