/// Per-position outcomes and the per-tick report
use super::exit_rules::ExitReason;
use crate::errors::EngineError;
use std::collections::BTreeMap;
use std::fmt;

/// What one evaluation step did with one order
#[derive(Debug, Clone, PartialEq)]
pub enum PositionOutcome {
    /// OPEN with neither stop-loss nor take-profit
    SkippedNoTargets,
    /// A deferred write for the order has not been flushed yet
    SkippedQueued,
    /// Feed or live price returned 0; retried next tick
    NoPrice,
    /// Nothing to do this tick
    Held,
    /// PENDING price has not reached the trigger
    Waiting,
    ExitSubmitted(ExitReason),
    Activated,
    /// *-PROCESSING confirmed by the venue
    Confirmed,
    /// *-PROCESSING closed by its deadline
    ForcedClose,
}

impl PositionOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::SkippedNoTargets => "skipped_no_targets",
            Self::SkippedQueued => "skipped_queued",
            Self::NoPrice => "no_price",
            Self::Held => "held",
            Self::Waiting => "waiting",
            Self::ExitSubmitted(_) => "exit_submitted",
            Self::Activated => "activated",
            Self::Confirmed => "confirmed",
            Self::ForcedClose => "forced_close",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TickFailure {
    pub order_id: i64,
    pub error: String,
}

/// Aggregated outcome of one monitor or resolver tick
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    pub counts: BTreeMap<&'static str, usize>,
    pub failures: Vec<TickFailure>,
    pub flushed: usize,
}

impl TickReport {
    pub fn record(&mut self, order_id: i64, result: Result<PositionOutcome, EngineError>) {
        let label = match &result {
            Ok(outcome) => outcome.label(),
            Err(EngineError::SignalRejected { .. }) => "signal_rejected",
            Err(_) => "failed",
        };
        *self.counts.entry(label).or_insert(0) += 1;
        if let Err(e) = result {
            self.failures.push(TickFailure {
                order_id,
                error: e.to_string(),
            });
        }
    }

    pub fn count(&self, label: &str) -> usize {
        self.counts.get(label).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    /// Nothing happened worth an info line
    pub fn is_quiet(&self) -> bool {
        self.failures.is_empty()
            && self.flushed == 0
            && self.counts.keys().all(|label| {
                matches!(
                    *label,
                    "skipped_no_targets" | "skipped_queued" | "no_price" | "held" | "waiting"
                )
            })
    }
}

impl fmt::Display for TickReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} positions", self.total())?;
        for (label, count) in &self.counts {
            write!(f, ", {} {}", count, label)?;
        }
        if self.flushed > 0 {
            write!(f, ", flushed {}", self.flushed)?;
        }
        Ok(())
    }
}
