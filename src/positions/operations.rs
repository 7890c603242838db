use super::db::PositionStore;
use super::queue::WriteBatchQueue;
use super::transitions::{plan, plan_adjust, AdjustRequest, PositionTransition};
use super::types::{
    AssetType, OperationType, OrderType, Position, PositionStatus, Venue, MODIFIED_BY_SYSTEM,
    UPWARD_DOWN, UPWARD_NONE, UPWARD_UP,
};
use crate::cache::ValuationCache;
use crate::errors::OperationError;
use crate::logger::{self, LogTag};
use crate::venue::{LivePriceSource, SignalGateway};
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// A trader's request to open a position
#[derive(Debug, Clone, PartialEq)]
pub struct InitiateRequest {
    pub trader_id: i64,
    pub trade_pair: String,
    pub asset_type: AssetType,
    pub order_type: OrderType,
    pub leverage: f64,
    /// 0 = market order
    pub entry_price: f64,
    /// Trailing-limit threshold percent, 0 = none
    pub limit_order: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub trailing: bool,
    pub source: Venue,
}

/// One-shot order operations: initiate, adjust, close, terminate
///
/// Each runs under a per (trader, pair) lock so two requests for the same
/// pair cannot both pass the "no open position" check. Orders with a
/// monitor update still in the batch queue are refused by `adjust` and
/// `close`; `terminate_trader` discards that update.
pub struct PositionOperations {
    store: Arc<dyn PositionStore>,
    prices: Arc<dyn LivePriceSource>,
    gateway: Arc<SignalGateway>,
    cache: Arc<ValuationCache>,
    queue: Arc<WriteBatchQueue>,
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl PositionOperations {
    pub fn new(
        store: Arc<dyn PositionStore>,
        prices: Arc<dyn LivePriceSource>,
        gateway: Arc<SignalGateway>,
        cache: Arc<ValuationCache>,
        queue: Arc<WriteBatchQueue>,
    ) -> Self {
        Self {
            store,
            prices,
            gateway,
            cache,
            queue,
            locks: Mutex::new(HashMap::new()),
        }
    }

    async fn acquire_pair_lock(&self, trader_id: i64, trade_pair: &str) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .lock()
            .entry(format!("{}-{}", trade_pair, trader_id))
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone();
        lock.lock_owned().await
    }

    pub async fn initiate(&self, request: InitiateRequest) -> Result<Position, OperationError> {
        validate_leverage(request.asset_type, request.leverage)?;
        let _lock = self
            .acquire_pair_lock(request.trader_id, &request.trade_pair)
            .await;

        if self
            .store
            .find_non_closed(request.trader_id, &request.trade_pair)
            .await?
            .is_some()
        {
            return Err(OperationError::AlreadyOpen {
                trader_id: request.trader_id,
                trade_pair: request.trade_pair,
            });
        }

        let is_market = request.entry_price == 0.0 && request.limit_order == 0.0;
        let (status, entry_price, initial_price, upward) = if is_market {
            self.submit_or_reject(
                request.trader_id,
                &request.trade_pair,
                request.order_type,
                request.leverage,
            )
            .await?;
            (PositionStatus::Processing, 0.0, 0.0, UPWARD_NONE)
        } else {
            let live = self.prices.live_price(&request.trade_pair).await;
            if live == 0.0 {
                return Err(OperationError::NoLivePrice(request.trade_pair));
            }
            if request.entry_price == 0.0 {
                (PositionStatus::Pending, live, live, UPWARD_NONE)
            } else {
                let upward = if request.entry_price >= live {
                    UPWARD_UP
                } else {
                    UPWARD_DOWN
                };
                (PositionStatus::Pending, request.entry_price, live, upward)
            }
        };

        let position_id = self.store.next_position_id(request.trader_id).await?;
        let mut position = Position {
            order_id: 0,
            position_id,
            trade_order: 1,
            trader_id: request.trader_id,
            trade_pair: request.trade_pair.clone(),
            asset_type: request.asset_type,
            order_type: request.order_type,
            source: request.source,
            entry_price,
            initial_price,
            min_price: initial_price,
            max_price: initial_price,
            limit_order: request.limit_order,
            upward,
            leverage: request.leverage,
            cumulative_leverage: request.leverage,
            cumulative_order_type: request.order_type,
            stop_loss: request.stop_loss,
            take_profit: request.take_profit,
            cumulative_stop_loss: request.stop_loss,
            cumulative_take_profit: request.take_profit,
            trailing: request.trailing,
            status,
            old_status: Some(status),
            operation_type: OperationType::Initiate,
            open_time: Utc::now(),
            modified_by: request.trader_id.to_string(),
            ..Default::default()
        };
        position.order_id = self.store.insert_position(&position).await?;

        logger::info(
            LogTag::Operations,
            &format!("initiated {} at entry {}", position.label(), entry_price),
        );
        Ok(position)
    }

    /// Change leverage and/or exit targets of the OPEN order on a pair
    pub async fn adjust(
        &self,
        trader_id: i64,
        trade_pair: &str,
        request: AdjustRequest,
    ) -> Result<Position, OperationError> {
        let _lock = self.acquire_pair_lock(trader_id, trade_pair).await;
        let current = self
            .store
            .find_non_closed(trader_id, trade_pair)
            .await?
            .filter(|p| p.status == PositionStatus::Open)
            .ok_or_else(|| OperationError::NoPosition {
                trader_id,
                trade_pair: trade_pair.to_string(),
                expected: "open",
            })?;
        self.refuse_if_queued(current.order_id).await?;
        validate_leverage(current.asset_type, request.leverage.abs())?;

        let adjust = plan_adjust(&current, &request, Utc::now())?;
        if let Some((direction, size)) = adjust.signal {
            self.submit_or_reject(trader_id, trade_pair, direction, size)
                .await?;
        }

        let mut successor = adjust.successor;
        successor.order_id = self
            .store
            .supersede(current.order_id, &adjust.retire, &successor)
            .await?;

        logger::info(
            LogTag::Operations,
            &format!(
                "adjusted order {} -> {} (leverage {} -> {})",
                current.order_id,
                successor.label(),
                current.cumulative_leverage,
                successor.cumulative_leverage
            ),
        );
        Ok(successor)
    }

    /// Close the latest OPEN or PENDING order on a pair
    ///
    /// PENDING orders never reached the venue and close at once; OPEN ones
    /// send FLAT and wait in CLOSE-PROCESSING for the resolver.
    pub async fn close(&self, trader_id: i64, trade_pair: &str) -> Result<Position, OperationError> {
        let _lock = self.acquire_pair_lock(trader_id, trade_pair).await;
        let mut position = self
            .store
            .find_non_closed(trader_id, trade_pair)
            .await?
            .filter(|p| matches!(p.status, PositionStatus::Open | PositionStatus::Pending))
            .ok_or_else(|| OperationError::NoPosition {
                trader_id,
                trade_pair: trade_pair.to_string(),
                expected: "open or pending",
            })?;
        self.refuse_if_queued(position.order_id).await?;
        let now = Utc::now();

        let mut update = if position.status == PositionStatus::Pending {
            let mut update = plan(
                &position,
                &PositionTransition::Terminated {
                    operation: OperationType::Close,
                    modified_by: trader_id.to_string(),
                    at: now,
                },
            )?;
            update.close_price = Some(position.entry_price);
            update
        } else {
            self.submit_or_reject(trader_id, trade_pair, OrderType::Flat, 1.0)
                .await?;
            plan(&position, &PositionTransition::CloseSubmitted { at: now })?
        };
        update.modified_by = Some(trader_id.to_string());

        self.store.update_position(position.order_id, &update).await?;
        update.apply_to(&mut position);
        if update.closes_order() {
            self.cache.evict(&position.cache_key());
        }

        logger::info(LogTag::Operations, &format!("close requested for {}", position.label()));
        Ok(position)
    }

    /// Administrative close of every non-closed order of a trader
    ///
    /// Orders that reached the venue also get a best-effort FLAT, unless a
    /// queued monitor close already sent one.
    pub async fn terminate_trader(&self, trader_id: i64) -> Result<usize, OperationError> {
        let positions = self.store.list_non_closed_for_trader(trader_id).await?;
        let now = Utc::now();
        let mut closed = 0;

        for position in positions {
            let _lock = self
                .acquire_pair_lock(trader_id, &position.trade_pair)
                .await;
            let update = plan(
                &position,
                &PositionTransition::Terminated {
                    operation: OperationType::TournamentClosed,
                    modified_by: MODIFIED_BY_SYSTEM.to_string(),
                    at: now,
                },
            )?;
            // a queued close means the monitor already sent FLAT
            let exit_sent = match self.queue.remove(position.order_id).await {
                Some(queued) => {
                    logger::info(
                        LogTag::Operations,
                        &format!("{}: discarded queued update on termination", position.label()),
                    );
                    queued.status == Some(PositionStatus::CloseProcessing)
                }
                None => false,
            };
            self.store.update_position(position.order_id, &update).await?;
            self.cache.evict(&position.cache_key());
            closed += 1;

            if position.status != PositionStatus::Pending
                && !exit_sent
                && !self
                    .gateway
                    .submit(trader_id, &position.trade_pair, OrderType::Flat, 1.0)
                    .await
            {
                logger::warning(
                    LogTag::Operations,
                    &format!("{}: FLAT on termination was not accepted", position.label()),
                );
            }
        }

        logger::info(
            LogTag::Operations,
            &format!("terminated {} orders of trader {}", closed, trader_id),
        );
        Ok(closed)
    }

    async fn refuse_if_queued(&self, order_id: i64) -> Result<(), OperationError> {
        if self.queue.contains(order_id).await {
            return Err(OperationError::UpdateQueued(order_id));
        }
        Ok(())
    }

    async fn submit_or_reject(
        &self,
        trader_id: i64,
        trade_pair: &str,
        order_type: OrderType,
        leverage: f64,
    ) -> Result<(), OperationError> {
        if self
            .gateway
            .submit(trader_id, trade_pair, order_type, leverage)
            .await
        {
            Ok(())
        } else {
            Err(OperationError::SignalRejected {
                trader_id,
                trade_pair: trade_pair.to_string(),
            })
        }
    }
}

fn validate_leverage(asset_type: AssetType, leverage: f64) -> Result<(), OperationError> {
    let (min, max) = asset_type.leverage_bounds();
    if leverage < min || leverage > max {
        return Err(OperationError::LeverageOutOfRange { leverage, min, max });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leverage_bounds() {
        assert!(validate_leverage(AssetType::Crypto, 0.5).is_ok());
        assert!(validate_leverage(AssetType::Crypto, 0.6).is_err());
        assert!(validate_leverage(AssetType::Forex, 5.0).is_ok());
        assert!(matches!(
            validate_leverage(AssetType::Stocks, 0.05),
            Err(OperationError::LeverageOutOfRange { .. })
        ));
    }
}
