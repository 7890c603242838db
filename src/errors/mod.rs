/// Error types for the reconciliation core
///
/// Library code returns these typed errors; the binary and service start-up
/// wrap them with `anyhow` context.
use crate::positions::types::PositionStatus;
use std::time::Duration;
use thiserror::Error;

// =============================================================================
// STORE
// =============================================================================

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("order {0} not found")]
    NotFound(i64),

    #[error("order {order_id} is {found}, update was planned from another status")]
    Stale { order_id: i64, found: PositionStatus },

    #[error("invalid value in column {column}: {value}")]
    InvalidColumn { column: &'static str, value: String },

    #[error("store task failed: {0}")]
    Background(String),
}

// =============================================================================
// VENUE / SIGNALS
// =============================================================================

#[derive(Debug, Error)]
pub enum VenueError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status {status} from {endpoint}")]
    Status { endpoint: String, status: u16 },

    #[error("failed to decode response from {endpoint}: {message}")]
    Decode { endpoint: String, message: String },

    #[error(transparent)]
    RateLimit(#[from] RateLimitError),
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum RateLimitError {
    #[error("no signal slot within {0:?}")]
    Timeout(Duration),

    #[error("rate limiter closed")]
    Closed,
}

// =============================================================================
// STATE MACHINE
// =============================================================================

#[derive(Debug, Clone, Error, PartialEq)]
pub enum TransitionError {
    #[error("order {order_id} is CLOSED and accepts no further transitions")]
    Terminal { order_id: i64 },

    #[error("order {order_id}: {transition} is not allowed from {from}")]
    Illegal {
        order_id: i64,
        from: PositionStatus,
        transition: &'static str,
    },

    #[error("order {order_id}: {transition} needs a nonzero venue price")]
    MissingPrice {
        order_id: i64,
        transition: &'static str,
    },
}

// =============================================================================
// ENGINE
// =============================================================================

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("signal for order {order_id} rejected")]
    SignalRejected { order_id: i64 },

    #[error("position task failed: {0}")]
    Task(String),
}

// =============================================================================
// OPERATIONS
// =============================================================================

#[derive(Debug, Error)]
pub enum OperationError {
    #[error("trader {trader_id} already has a non-closed position on {trade_pair}")]
    AlreadyOpen { trader_id: i64, trade_pair: String },

    #[error("trader {trader_id} has no {expected} position on {trade_pair}")]
    NoPosition {
        trader_id: i64,
        trade_pair: String,
        expected: &'static str,
    },

    #[error("no live price for {0}")]
    NoLivePrice(String),

    #[error("leverage {leverage} outside [{min}, {max}]")]
    LeverageOutOfRange { leverage: f64, min: f64, max: f64 },

    #[error("signal rejected for trader {trader_id} on {trade_pair}")]
    SignalRejected { trader_id: i64, trade_pair: String },

    #[error("order {0} has a deferred update waiting to be written")]
    UpdateQueued(i64),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Transition(#[from] TransitionError),
}
