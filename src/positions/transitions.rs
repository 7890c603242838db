use super::types::{
    OperationType, OrderType, Position, PositionStatus, MODIFIED_BY_SYSTEM,
};
use super::update::PositionUpdate;
use crate::errors::TransitionError;
use crate::venue::Valuation;
use chrono::{DateTime, Utc};

/// Everything that may happen to an order row
///
/// `plan` turns a transition into the field mutations it implies, or refuses
/// it. Nothing else in the crate writes `status`.
#[derive(Debug, Clone)]
pub enum PositionTransition {
    /// OPEN: fresh venue valuation seen by the monitor
    ValuationObserved { valuation: Valuation },
    /// PENDING trailing-limit: live price widens the running range
    PriceRangeObserved { price: f64 },
    /// PENDING -> PROCESSING after an accepted open signal
    ActivationSubmitted {
        /// Trailing-limit activations pin the entry to the activating price
        activation_price: Option<f64>,
        at: DateTime<Utc>,
    },
    /// PROCESSING -> OPEN once the venue shows a price
    OpenConfirmed { valuation: Valuation },
    /// OPEN -> CLOSE-PROCESSING after an accepted FLAT signal
    CloseSubmitted { at: DateTime<Utc> },
    /// ADJUST-PROCESSING -> OPEN once the fill count grows
    AdjustConfirmed { valuation: Valuation },
    /// CLOSE-PROCESSING -> CLOSED once the venue reports the position closed
    CloseConfirmed {
        valuation: Valuation,
        at: DateTime<Utc>,
    },
    /// *-PROCESSING -> CLOSED when the confirmation deadline passes
    DeadlineExpired {
        valuation: Valuation,
        at: DateTime<Utc>,
    },
    /// any non-CLOSED -> CLOSED by administrative action
    Terminated {
        operation: OperationType,
        modified_by: String,
        at: DateTime<Utc>,
    },
}

impl PositionTransition {
    pub fn name(&self) -> &'static str {
        match self {
            Self::ValuationObserved { .. } => "ValuationObserved",
            Self::PriceRangeObserved { .. } => "PriceRangeObserved",
            Self::ActivationSubmitted { .. } => "ActivationSubmitted",
            Self::OpenConfirmed { .. } => "OpenConfirmed",
            Self::CloseSubmitted { .. } => "CloseSubmitted",
            Self::AdjustConfirmed { .. } => "AdjustConfirmed",
            Self::CloseConfirmed { .. } => "CloseConfirmed",
            Self::DeadlineExpired { .. } => "DeadlineExpired",
            Self::Terminated { .. } => "Terminated",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::CloseConfirmed { .. } | Self::DeadlineExpired { .. } | Self::Terminated { .. }
        )
    }

    /// Statuses this transition may start from
    fn allowed_from(&self, status: PositionStatus) -> bool {
        use PositionStatus::*;
        match self {
            Self::ValuationObserved { .. } | Self::CloseSubmitted { .. } => status == Open,
            Self::PriceRangeObserved { .. } | Self::ActivationSubmitted { .. } => status == Pending,
            Self::OpenConfirmed { .. } => status == Processing,
            Self::AdjustConfirmed { .. } => status == AdjustProcessing,
            Self::CloseConfirmed { .. } => status == CloseProcessing,
            Self::DeadlineExpired { .. } => status.is_processing(),
            Self::Terminated { .. } => !status.is_terminal(),
        }
    }
}

/// Plan the mutations for `transition` applied to `position`
///
/// An empty update means the transition is legal but changes nothing
/// (e.g. a valuation below the current high-water mark).
pub fn plan(
    position: &Position,
    transition: &PositionTransition,
) -> Result<PositionUpdate, TransitionError> {
    if position.status.is_terminal() {
        return Err(TransitionError::Terminal {
            order_id: position.order_id,
        });
    }
    if !transition.allowed_from(position.status) {
        return Err(TransitionError::Illegal {
            order_id: position.order_id,
            from: position.status,
            transition: transition.name(),
        });
    }

    let update = match transition {
        PositionTransition::ValuationObserved { valuation } => {
            require_price(position, transition, valuation)?;
            // only a new high is worth a write
            if valuation.profit_loss <= position.max_profit_loss {
                PositionUpdate::default()
            } else {
                PositionUpdate {
                    max_profit_loss: Some(valuation.profit_loss),
                    ..valuation_fields(valuation)
                }
            }
        }

        PositionTransition::PriceRangeObserved { price } => {
            let mut update = PositionUpdate::default();
            if *price <= 0.0 {
                return Ok(update);
            }
            if position.min_price == 0.0 || *price < position.min_price {
                update.min_price = Some(*price);
            }
            if *price > position.max_price {
                update.max_price = Some(*price);
            }
            update
        }

        PositionTransition::ActivationSubmitted {
            activation_price,
            at,
        } => PositionUpdate {
            entry_price: *activation_price,
            open_time: Some(*at),
            modified_by: Some(MODIFIED_BY_SYSTEM.to_string()),
            ..status_change(position, PositionStatus::Processing)
        },

        PositionTransition::OpenConfirmed { valuation } => {
            require_price(position, transition, valuation)?;
            PositionUpdate {
                operation_type: Some(OperationType::Open),
                entry_price: Some(valuation.mark_price),
                initial_price: Some(valuation.mark_price),
                max_profit_loss: Some(valuation.profit_loss),
                order_level: raised_order_level(position, valuation),
                ..merge(status_change(position, PositionStatus::Open), valuation_fields(valuation))
            }
        }

        PositionTransition::CloseSubmitted { at } => PositionUpdate {
            operation_type: Some(OperationType::Close),
            close_time: Some(*at),
            modified_by: Some(MODIFIED_BY_SYSTEM.to_string()),
            ..status_change(position, PositionStatus::CloseProcessing)
        },

        PositionTransition::AdjustConfirmed { valuation } => {
            require_price(position, transition, valuation)?;
            if valuation.fill_count <= position.order_level {
                return Err(TransitionError::Illegal {
                    order_id: position.order_id,
                    from: position.status,
                    transition: transition.name(),
                });
            }
            PositionUpdate {
                operation_type: Some(OperationType::Adjust),
                max_profit_loss: raised_max_profit(position, valuation),
                order_level: Some(valuation.fill_count),
                ..merge(status_change(position, PositionStatus::Open), valuation_fields(valuation))
            }
        }

        PositionTransition::CloseConfirmed { valuation, at } => {
            require_price(position, transition, valuation)?;
            PositionUpdate {
                operation_type: Some(OperationType::Close),
                close_price: Some(valuation.mark_price),
                close_time: Some(position.close_time.unwrap_or(*at)),
                max_profit_loss: raised_max_profit(position, valuation),
                order_level: raised_order_level(position, valuation),
                ..merge(status_change(position, PositionStatus::Closed), valuation_fields(valuation))
            }
        }

        PositionTransition::DeadlineExpired { valuation, at } => {
            let close_time = match position.status {
                PositionStatus::CloseProcessing => position.close_time.unwrap_or(*at),
                _ => *at,
            };
            let base = PositionUpdate {
                operation_type: Some(OperationType::Close),
                close_price: Some(valuation.mark_price),
                close_time: Some(close_time),
                modified_by: Some(MODIFIED_BY_SYSTEM.to_string()),
                ..status_change(position, PositionStatus::Closed)
            };
            if valuation.has_price() {
                PositionUpdate {
                    max_profit_loss: raised_max_profit(position, valuation),
                    order_level: raised_order_level(position, valuation),
                    ..merge(base, valuation_fields(valuation))
                }
            } else {
                base
            }
        }

        PositionTransition::Terminated {
            operation,
            modified_by,
            at,
        } => PositionUpdate {
            operation_type: Some(*operation),
            close_time: Some(*at),
            modified_by: Some(modified_by.clone()),
            ..status_change(position, PositionStatus::Closed)
        },
    };

    Ok(update)
}

/// Parameters of a user adjustment of an OPEN order
#[derive(Debug, Clone, PartialEq)]
pub struct AdjustRequest {
    pub leverage: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub modified_by: String,
}

/// Outcome of planning an adjustment: the retired order, its successor and
/// the delta signal to send first (if leverage changed)
#[derive(Debug, Clone)]
pub struct AdjustPlan {
    pub signal: Option<(OrderType, f64)>,
    pub retire: PositionUpdate,
    pub successor: Position,
}

/// Plan an adjustment: the OPEN order is closed as `adjust` and a successor
/// row in the same group carries the new cumulative parameters.
pub fn plan_adjust(
    position: &Position,
    request: &AdjustRequest,
    at: DateTime<Utc>,
) -> Result<AdjustPlan, TransitionError> {
    if position.status.is_terminal() {
        return Err(TransitionError::Terminal {
            order_id: position.order_id,
        });
    }
    if position.status != PositionStatus::Open {
        return Err(TransitionError::Illegal {
            order_id: position.order_id,
            from: position.status,
            transition: "Adjust",
        });
    }

    let leverage_changed = request.leverage != position.cumulative_leverage;
    let signal = if leverage_changed {
        let delta = request.leverage - position.cumulative_leverage;
        let direction = if delta < 0.0 {
            position.order_type.opposite()
        } else {
            position.order_type
        };
        Some((direction, delta.abs()))
    } else {
        None
    };

    let retire = PositionUpdate {
        operation_type: Some(OperationType::Adjust),
        close_price: Some(position.entry_price),
        close_time: Some(at),
        modified_by: Some(request.modified_by.clone()),
        ..status_change(position, PositionStatus::Closed)
    };

    let successor = Position {
        order_id: 0,
        trade_order: position.trade_order + 1,
        leverage: signal.map(|(_, size)| size).unwrap_or(position.leverage),
        cumulative_leverage: request.leverage.abs(),
        stop_loss: request.stop_loss,
        take_profit: request.take_profit,
        cumulative_stop_loss: request.stop_loss,
        cumulative_take_profit: request.take_profit,
        status: if leverage_changed {
            PositionStatus::AdjustProcessing
        } else {
            PositionStatus::Open
        },
        old_status: Some(position.status),
        operation_type: OperationType::Adjust,
        adjust_time: Some(at),
        close_time: None,
        close_price: None,
        modified_by: request.modified_by.clone(),
        ..position.clone()
    };

    Ok(AdjustPlan {
        signal,
        retire,
        successor,
    })
}

fn status_change(position: &Position, to: PositionStatus) -> PositionUpdate {
    PositionUpdate {
        status: Some(to),
        old_status: Some(position.status),
        ..Default::default()
    }
}

fn valuation_fields(valuation: &Valuation) -> PositionUpdate {
    PositionUpdate {
        profit_loss: Some(valuation.profit_loss),
        profit_loss_without_fee: Some(valuation.profit_loss_without_fee),
        venue_profit_loss: Some(valuation.venue_profit_loss),
        venue_profit_loss_without_fee: Some(valuation.venue_profit_loss_without_fee),
        average_entry_price: Some(valuation.average_entry_price),
        uuid: non_empty(&valuation.venue_uuid),
        hot_key: non_empty(&valuation.venue_hot_key),
        ..Default::default()
    }
}

fn merge(mut base: PositionUpdate, extra: PositionUpdate) -> PositionUpdate {
    base.merge(extra);
    base
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

/// Stale venue readings never lower the fill count
fn raised_order_level(position: &Position, valuation: &Valuation) -> Option<i64> {
    (valuation.fill_count > position.order_level).then_some(valuation.fill_count)
}

fn raised_max_profit(position: &Position, valuation: &Valuation) -> Option<f64> {
    (valuation.profit_loss > position.max_profit_loss).then_some(valuation.profit_loss)
}

fn require_price(
    position: &Position,
    transition: &PositionTransition,
    valuation: &Valuation,
) -> Result<(), TransitionError> {
    if valuation.has_price() {
        Ok(())
    } else {
        Err(TransitionError::MissingPrice {
            order_id: position.order_id,
            transition: transition.name(),
        })
    }
}
