/// Exit and activation rules
///
/// Pure functions over the stored risk parameters; every boundary is
/// inclusive. OPEN orders are judged on their cumulative stop-loss and
/// take-profit.
use super::types::{OrderType, Position, UPWARD_DOWN, UPWARD_UP};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExitReason {
    TrailingStop,
    StopLoss,
    TakeProfit,
}

impl ExitReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExitReason::TrailingStop => "trailing_stop",
            ExitReason::StopLoss => "stop_loss",
            ExitReason::TakeProfit => "take_profit",
        }
    }
}

impl std::fmt::Display for ExitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Drop from the high-water mark reached the stop distance
pub fn check_trailing_stop(trailing: bool, stop_loss: f64, max_profit_loss: f64, profit: f64) -> bool {
    trailing && stop_loss != 0.0 && max_profit_loss - profit >= stop_loss
}

pub fn check_stop_loss(trailing: bool, stop_loss: f64, profit: f64) -> bool {
    !trailing && profit <= 0.0 && stop_loss != 0.0 && profit <= -stop_loss
}

pub fn check_take_profit(trailing: bool, take_profit: f64, profit: f64) -> bool {
    !trailing && profit >= 0.0 && take_profit != 0.0 && profit >= take_profit
}

/// First satisfied exit in the order trailing -> stop -> take-profit
pub fn evaluate_exit(position: &Position, profit: f64) -> Option<ExitReason> {
    let stop_loss = position.cumulative_stop_loss;
    let take_profit = position.cumulative_take_profit;

    if check_trailing_stop(position.trailing, stop_loss, position.max_profit_loss, profit) {
        Some(ExitReason::TrailingStop)
    } else if check_stop_loss(position.trailing, stop_loss, profit) {
        Some(ExitReason::StopLoss)
    } else if check_take_profit(position.trailing, take_profit, profit) {
        Some(ExitReason::TakeProfit)
    } else {
        None
    }
}

/// Whether a PENDING order should be sent to the venue at `mark`
///
/// Trailing-limit orders read the running `min_price`/`max_price`, so the
/// range must already include `mark`.
pub fn should_activate(position: &Position, mark: f64) -> bool {
    if position.is_trailing_limit() {
        let offset = position.limit_order * position.initial_price / 100.0;
        match position.order_type {
            OrderType::Long => mark >= position.min_price + offset,
            OrderType::Short => mark <= position.max_price - offset,
            OrderType::Flat => false,
        }
    } else {
        (position.upward == UPWARD_DOWN && mark <= position.entry_price)
            || (position.upward == UPWARD_UP && mark >= position.entry_price)
    }
}
