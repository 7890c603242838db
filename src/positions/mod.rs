// Position lifecycle: model, state machine, persistence and the periodic
// engines that drive orders through it
pub mod apply;
pub mod db;
pub mod exit_rules;
pub mod monitor;
pub mod operations;
pub mod queue;
pub mod report;
pub mod resolver;
pub mod transitions;
pub mod types;
pub mod update;
pub mod worker;

pub use db::{PositionStore, SqliteStore};
pub use exit_rules::{evaluate_exit, should_activate, ExitReason};
pub use monitor::ReconciliationEngine;
pub use operations::{InitiateRequest, PositionOperations};
pub use queue::WriteBatchQueue;
pub use report::{PositionOutcome, TickReport};
pub use resolver::{Deadlines, ProcessingResolver};
pub use transitions::{plan, plan_adjust, AdjustRequest, PositionTransition};
pub use types::{
    AssetType, MonitoredPosition, OperationType, OrderType, Position, PositionStatus,
    TraderAccount, Venue,
};
pub use update::PositionUpdate;
