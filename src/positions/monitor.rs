//! Reconciliation engine (monitor loop)
//!
//! One tick:
//! 1. flush the deferred write queue if its interval elapsed
//! 2. load OPEN and PENDING orders
//! 3. evaluate each on the bounded worker pool
//!
//! OPEN orders record their valuation (synchronously, only on a new high)
//! and are checked against the exit rules; a triggered exit sends FLAT and
//! defers the CLOSE-PROCESSING mutation. PENDING orders read the live price
//! and, once the activation rule holds, send the open signal and defer the
//! PROCESSING mutation. A deferred order is skipped until it is flushed.

use super::apply::{apply_transition, defer_transition};
use super::db::PositionStore;
use super::exit_rules::{evaluate_exit, should_activate};
use super::queue::WriteBatchQueue;
use super::report::{PositionOutcome, TickReport};
use super::transitions::PositionTransition;
use super::types::{OrderType, Position, PositionStatus};
use super::worker::run_bounded;
use crate::arguments::is_debug_monitor_enabled;
use crate::cache::ValuationCache;
use crate::errors::EngineError;
use crate::logger::{self, LogTag};
use crate::notifications::{Notification, Notifier};
use crate::venue::{LivePriceSource, SignalGateway, ValuationQuery};
use chrono::Utc;
use std::sync::Arc;

/// FLAT signals always carry leverage 1
const FLAT_LEVERAGE: f64 = 1.0;

#[derive(Clone)]
pub struct ReconciliationEngine {
    store: Arc<dyn PositionStore>,
    cache: Arc<ValuationCache>,
    prices: Arc<dyn LivePriceSource>,
    gateway: Arc<SignalGateway>,
    queue: Arc<WriteBatchQueue>,
    notifier: Arc<dyn Notifier>,
    concurrency: usize,
}

impl ReconciliationEngine {
    pub fn new(
        store: Arc<dyn PositionStore>,
        cache: Arc<ValuationCache>,
        prices: Arc<dyn LivePriceSource>,
        gateway: Arc<SignalGateway>,
        queue: Arc<WriteBatchQueue>,
        notifier: Arc<dyn Notifier>,
        concurrency: usize,
    ) -> Self {
        Self {
            store,
            cache,
            prices,
            gateway,
            queue,
            notifier,
            concurrency,
        }
    }

    pub fn queue(&self) -> &Arc<WriteBatchQueue> {
        &self.queue
    }

    pub async fn tick(&self) -> Result<TickReport, EngineError> {
        let mut report = TickReport::default();

        match self.queue.flush_if_due(self.store.as_ref()).await {
            Ok(flushed) => report.flushed = flushed,
            Err(e) => logger::warning(
                LogTag::Batch,
                &format!("deferred flush failed, keeping buffer: {}", e),
            ),
        }

        let positions = self
            .store
            .list_by_status(&[PositionStatus::Open, PositionStatus::Pending])
            .await?;

        let engine = self.clone();
        run_bounded(positions, self.concurrency, &mut report, move |position| {
            let engine = engine.clone();
            async move { engine.evaluate(position).await }
        })
        .await;

        Ok(report)
    }

    /// Flush deferred writes regardless of the interval (graceful shutdown)
    pub async fn shutdown_flush(&self) -> Result<usize, EngineError> {
        Ok(self.queue.flush_now(self.store.as_ref()).await?)
    }

    pub async fn evaluate(&self, position: Position) -> Result<PositionOutcome, EngineError> {
        if position.status == PositionStatus::Open && !position.has_exit_targets() {
            return Ok(PositionOutcome::SkippedNoTargets);
        }
        if self.queue.contains(position.order_id).await {
            return Ok(PositionOutcome::SkippedQueued);
        }

        match position.status {
            PositionStatus::Open => self.evaluate_open(position).await,
            PositionStatus::Pending => self.evaluate_pending(position).await,
            _ => Ok(PositionOutcome::Held),
        }
    }

    async fn evaluate_open(&self, mut position: Position) -> Result<PositionOutcome, EngineError> {
        let query = ValuationQuery::for_position(&position);
        let valuation = self.cache.get_or_compute(&query, None).await;
        if !valuation.has_price() {
            logger::warning(
                LogTag::Monitor,
                &format!("{}: OPEN but the venue reports no price, exits not evaluated", position.label()),
            );
            return Ok(PositionOutcome::NoPrice);
        }

        let profit = valuation.profit_loss;
        let effects = apply_transition(
            self.store.as_ref(),
            &position,
            &PositionTransition::ValuationObserved { valuation },
        )
        .await?;
        effects.update.apply_to(&mut position);

        let Some(reason) = evaluate_exit(&position, profit) else {
            return Ok(PositionOutcome::Held);
        };

        logger::info(
            LogTag::Monitor,
            &format!(
                "{}: {} at profit {:.2}% (max {:.2}%)",
                position.label(),
                reason,
                profit,
                position.max_profit_loss
            ),
        );

        if !self
            .gateway
            .submit(position.trader_id, &position.trade_pair, OrderType::Flat, FLAT_LEVERAGE)
            .await
        {
            return Err(self.signal_rejected(&position, "close"));
        }

        defer_transition(
            &self.queue,
            &position,
            &PositionTransition::CloseSubmitted { at: Utc::now() },
        )
        .await?;
        Ok(PositionOutcome::ExitSubmitted(reason))
    }

    async fn evaluate_pending(&self, mut position: Position) -> Result<PositionOutcome, EngineError> {
        let price = self.prices.live_price(&position.trade_pair).await;
        if price == 0.0 {
            return Ok(PositionOutcome::NoPrice);
        }

        if position.is_trailing_limit() {
            let effects = apply_transition(
                self.store.as_ref(),
                &position,
                &PositionTransition::PriceRangeObserved { price },
            )
            .await?;
            effects.update.apply_to(&mut position);
        }

        if !should_activate(&position, price) {
            if is_debug_monitor_enabled() {
                logger::debug(
                    LogTag::Monitor,
                    &format!(
                        "{}: live {} has not reached entry {} (range {}..{})",
                        position.label(),
                        price,
                        position.entry_price,
                        position.min_price,
                        position.max_price
                    ),
                );
            }
            return Ok(PositionOutcome::Waiting);
        }

        if !self
            .gateway
            .submit(
                position.trader_id,
                &position.trade_pair,
                position.order_type,
                position.leverage,
            )
            .await
        {
            return Err(self.signal_rejected(&position, "open"));
        }

        let activation_price = position.is_trailing_limit().then_some(price);
        defer_transition(
            &self.queue,
            &position,
            &PositionTransition::ActivationSubmitted {
                activation_price,
                at: Utc::now(),
            },
        )
        .await?;

        logger::info(
            LogTag::Monitor,
            &format!("{}: activated at {}", position.label(), price),
        );
        Ok(PositionOutcome::Activated)
    }

    fn signal_rejected(&self, position: &Position, intent: &str) -> EngineError {
        self.notifier.notify(Notification::operator(
            "monitor",
            format!("{} signal rejected for {}", intent, position.label()),
        ));
        EngineError::SignalRejected {
            order_id: position.order_id,
        }
    }
}
