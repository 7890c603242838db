//! Processing timeout resolver
//!
//! Confirms or abandons orders sitting in a `*-PROCESSING` state. Every
//! order gets one fresh (cache-bypassing) valuation per tick:
//!
//! - PROCESSING: a venue price opens it
//! - ADJUST-PROCESSING: a higher fill count with a price reopens it
//! - CLOSE-PROCESSING: a venue close with a price closes it
//!
//! Past its deadline an order is force-closed at the last seen price (0 when
//! the venue never reported one). The row is written first, then the venue
//! gets a best-effort FLAT and the operator exactly one notification.

use super::apply::apply_transition;
use super::db::PositionStore;
use super::report::{PositionOutcome, TickReport};
use super::transitions::PositionTransition;
use super::types::{OrderType, Position, PositionStatus};
use super::worker::run_bounded;
use crate::arguments::is_debug_resolver_enabled;
use crate::cache::ValuationCache;
use crate::errors::EngineError;
use crate::logger::{self, LogTag};
use crate::notifications::{Notification, Notifier};
use crate::venue::{SignalGateway, Valuation, ValuationQuery};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

/// How long each processing state may wait for the venue
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Deadlines {
    pub open: Duration,
    pub adjust: Duration,
    pub close: Duration,
}

impl Default for Deadlines {
    fn default() -> Self {
        Self {
            open: Duration::seconds(300),
            adjust: Duration::seconds(1200),
            close: Duration::seconds(300),
        }
    }
}

impl Deadlines {
    /// Deadline and the timestamp it runs from
    fn for_position(&self, position: &Position) -> Option<(Duration, DateTime<Utc>)> {
        match position.status {
            PositionStatus::Processing => Some((self.open, position.open_time)),
            PositionStatus::AdjustProcessing => Some((
                self.adjust,
                position.adjust_time.unwrap_or(position.open_time),
            )),
            PositionStatus::CloseProcessing => Some((
                self.close,
                position.close_time.unwrap_or(position.open_time),
            )),
            _ => None,
        }
    }
}

#[derive(Clone)]
pub struct ProcessingResolver {
    store: Arc<dyn PositionStore>,
    cache: Arc<ValuationCache>,
    gateway: Arc<SignalGateway>,
    notifier: Arc<dyn Notifier>,
    deadlines: Deadlines,
    concurrency: usize,
}

impl ProcessingResolver {
    pub fn new(
        store: Arc<dyn PositionStore>,
        cache: Arc<ValuationCache>,
        gateway: Arc<SignalGateway>,
        notifier: Arc<dyn Notifier>,
        deadlines: Deadlines,
        concurrency: usize,
    ) -> Self {
        Self {
            store,
            cache,
            gateway,
            notifier,
            deadlines,
            concurrency,
        }
    }

    pub async fn tick(&self, now: DateTime<Utc>) -> Result<TickReport, EngineError> {
        let mut report = TickReport::default();
        let positions = self
            .store
            .list_by_status(&PositionStatus::PROCESSING_STATES)
            .await?;

        let resolver = self.clone();
        run_bounded(positions, self.concurrency, &mut report, move |position| {
            let resolver = resolver.clone();
            async move { resolver.resolve(position, now).await }
        })
        .await;

        Ok(report)
    }

    pub async fn resolve(
        &self,
        position: Position,
        now: DateTime<Utc>,
    ) -> Result<PositionOutcome, EngineError> {
        let query = ValuationQuery::for_position(&position);
        let valuation = self
            .cache
            .get_or_compute(&query, Some(std::time::Duration::ZERO))
            .await;

        if let Some(confirmation) = confirmation_for(&position, &valuation, now) {
            let effects = apply_transition(self.store.as_ref(), &position, &confirmation).await?;
            if effects.position_closed {
                self.cache.evict(&position.cache_key());
            }
            logger::info(
                LogTag::Resolver,
                &format!("{}: {} confirmed by venue", position.label(), position.status),
            );
            return Ok(PositionOutcome::Confirmed);
        }

        let Some((deadline, since)) = self.deadlines.for_position(&position) else {
            return Ok(PositionOutcome::Held);
        };
        if now - since < deadline {
            if is_debug_resolver_enabled() {
                logger::debug(
                    LogTag::Resolver,
                    &format!(
                        "{}: waiting for venue ({}s of {}s)",
                        position.label(),
                        (now - since).num_seconds(),
                        deadline.num_seconds()
                    ),
                );
            }
            return Ok(PositionOutcome::Waiting);
        }

        self.force_close(&position, valuation, now).await?;
        Ok(PositionOutcome::ForcedClose)
    }

    async fn force_close(
        &self,
        position: &Position,
        valuation: Valuation,
        now: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        let close_price = valuation.mark_price;
        apply_transition(
            self.store.as_ref(),
            position,
            &PositionTransition::DeadlineExpired { valuation, at: now },
        )
        .await?;
        self.cache.evict(&position.cache_key());

        let flattened = self
            .gateway
            .submit(position.trader_id, &position.trade_pair, OrderType::Flat, 1.0)
            .await;
        if !flattened {
            logger::warning(
                LogTag::Resolver,
                &format!("{}: best-effort FLAT was not accepted", position.label()),
            );
        }

        let message = format!(
            "{} stuck in {} past its deadline, closed at {}",
            position.label(),
            position.status,
            close_price
        );
        logger::warning(LogTag::Resolver, &message);
        self.notifier.notify(Notification::operator("resolver", message));

        if matches!(
            position.status,
            PositionStatus::Processing | PositionStatus::AdjustProcessing
        ) {
            self.notifier.notify(Notification::user(
                position.trader_id,
                "Order closed",
                format!(
                    "Your {} order on {} could not be confirmed by the venue and was closed.",
                    position.order_type, position.trade_pair
                ),
            ));
        }
        Ok(())
    }
}

/// The confirming transition the venue reading allows, if any
fn confirmation_for(
    position: &Position,
    valuation: &Valuation,
    now: DateTime<Utc>,
) -> Option<PositionTransition> {
    if !valuation.has_price() {
        return None;
    }
    match position.status {
        PositionStatus::Processing => Some(PositionTransition::OpenConfirmed {
            valuation: valuation.clone(),
        }),
        PositionStatus::AdjustProcessing if valuation.fill_count > position.order_level => {
            Some(PositionTransition::AdjustConfirmed {
                valuation: valuation.clone(),
            })
        }
        PositionStatus::CloseProcessing if valuation.closed_at_venue => {
            Some(PositionTransition::CloseConfirmed {
                valuation: valuation.clone(),
                at: now,
            })
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn priced(fill_count: i64, closed_at_venue: bool) -> Valuation {
        Valuation {
            mark_price: 50.0,
            fill_count,
            closed_at_venue,
            ..Valuation::empty()
        }
    }

    fn with_status(status: PositionStatus, order_level: i64) -> Position {
        Position {
            status,
            order_level,
            ..Default::default()
        }
    }

    #[test]
    fn test_confirmation_rules() {
        let now = Utc::now();
        assert!(confirmation_for(&with_status(PositionStatus::Processing, 0), &priced(1, false), now).is_some());
        assert!(confirmation_for(&with_status(PositionStatus::Processing, 0), &Valuation::empty(), now).is_none());

        // adjust needs a fill beyond the recorded level
        assert!(confirmation_for(&with_status(PositionStatus::AdjustProcessing, 2), &priced(2, false), now).is_none());
        assert!(confirmation_for(&with_status(PositionStatus::AdjustProcessing, 2), &priced(3, false), now).is_some());

        assert!(confirmation_for(&with_status(PositionStatus::CloseProcessing, 1), &priced(1, false), now).is_none());
        assert!(confirmation_for(&with_status(PositionStatus::CloseProcessing, 1), &priced(1, true), now).is_some());
    }

    #[test]
    fn test_deadline_reference_times() {
        let deadlines = Deadlines::default();
        let opened = Utc::now() - Duration::hours(2);
        let adjusted = opened + Duration::minutes(30);
        let position = Position {
            status: PositionStatus::AdjustProcessing,
            open_time: opened,
            adjust_time: Some(adjusted),
            ..Default::default()
        };
        assert_eq!(
            deadlines.for_position(&position),
            Some((Duration::seconds(1200), adjusted))
        );
        assert_eq!(
            deadlines.for_position(&with_status(PositionStatus::Open, 0)),
            None
        );
    }
}
