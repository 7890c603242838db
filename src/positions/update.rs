use super::types::{OperationType, Position, PositionStatus};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// A set of field mutations for one order row
///
/// Produced only by transition planning (transitions.rs) and applied either
/// synchronously through the store or later through the write batch queue.
/// `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PositionUpdate {
    pub status: Option<PositionStatus>,
    pub old_status: Option<PositionStatus>,
    pub operation_type: Option<OperationType>,

    pub entry_price: Option<f64>,
    pub initial_price: Option<f64>,
    pub close_price: Option<f64>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub average_entry_price: Option<f64>,

    pub profit_loss: Option<f64>,
    pub profit_loss_without_fee: Option<f64>,
    pub max_profit_loss: Option<f64>,
    pub venue_profit_loss: Option<f64>,
    pub venue_profit_loss_without_fee: Option<f64>,

    pub open_time: Option<DateTime<Utc>>,
    pub adjust_time: Option<DateTime<Utc>>,
    pub close_time: Option<DateTime<Utc>>,
    pub modified_by: Option<String>,

    pub uuid: Option<String>,
    pub hot_key: Option<String>,
    pub order_level: Option<i64>,
}

/// Copies every `Some` field of `$from` over `$into`
macro_rules! overlay_fields {
    ($into:expr, $from:expr, $($field:ident),+ $(,)?) => {
        $(
            if let Some(value) = $from.$field {
                $into.$field = Some(value);
            }
        )+
    };
}

/// Writes every `Some` field into a plain (non-optional) Position field
macro_rules! apply_plain {
    ($update:expr, $position:expr, $($field:ident),+ $(,)?) => {
        $(
            if let Some(value) = &$update.$field {
                $position.$field = value.clone();
            }
        )+
    };
}

impl PositionUpdate {
    pub fn is_empty(&self) -> bool {
        *self == PositionUpdate::default()
    }

    pub fn closes_order(&self) -> bool {
        self.status == Some(PositionStatus::Closed)
    }

    /// Fold a later update into this one; fields set by `later` win
    ///
    /// `old_status` is the exception: the row has not been written yet, so
    /// the earliest from-status is the one the merged write must match.
    pub fn merge(&mut self, later: PositionUpdate) {
        let planned_from = self.old_status;
        overlay_fields!(
            self,
            later,
            status,
            old_status,
            operation_type,
            entry_price,
            initial_price,
            close_price,
            min_price,
            max_price,
            average_entry_price,
            profit_loss,
            profit_loss_without_fee,
            max_profit_loss,
            venue_profit_loss,
            venue_profit_loss_without_fee,
            open_time,
            adjust_time,
            close_time,
            modified_by,
            uuid,
            hot_key,
            order_level,
        );
        if planned_from.is_some() {
            self.old_status = planned_from;
        }
    }

    /// Mirror the update onto an in-memory row
    pub fn apply_to(&self, position: &mut Position) {
        apply_plain!(
            self,
            position,
            status,
            operation_type,
            entry_price,
            initial_price,
            min_price,
            max_price,
            average_entry_price,
            profit_loss,
            profit_loss_without_fee,
            max_profit_loss,
            venue_profit_loss,
            venue_profit_loss_without_fee,
            open_time,
            modified_by,
            uuid,
            hot_key,
            order_level,
        );
        if self.old_status.is_some() {
            position.old_status = self.old_status;
        }
        if self.close_price.is_some() {
            position.close_price = self.close_price;
        }
        if self.adjust_time.is_some() {
            position.adjust_time = self.adjust_time;
        }
        if self.close_time.is_some() {
            position.close_time = self.close_time;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_later_fields_win() {
        let mut first = PositionUpdate {
            status: Some(PositionStatus::Processing),
            entry_price: Some(100.0),
            ..Default::default()
        };
        first.merge(PositionUpdate {
            entry_price: Some(101.0),
            modified_by: Some("system".to_string()),
            ..Default::default()
        });

        assert_eq!(first.status, Some(PositionStatus::Processing));
        assert_eq!(first.entry_price, Some(101.0));
        assert_eq!(first.modified_by.as_deref(), Some("system"));
    }

    #[test]
    fn test_merge_keeps_first_from_status() {
        let mut first = PositionUpdate {
            status: Some(PositionStatus::Processing),
            old_status: Some(PositionStatus::Pending),
            ..Default::default()
        };
        first.merge(PositionUpdate {
            status: Some(PositionStatus::Open),
            old_status: Some(PositionStatus::Processing),
            ..Default::default()
        });

        assert_eq!(first.status, Some(PositionStatus::Open));
        assert_eq!(first.old_status, Some(PositionStatus::Pending));
    }

    #[test]
    fn test_apply_to_leaves_unset_fields() {
        let mut position = Position {
            entry_price: 50.0,
            close_price: None,
            ..Default::default()
        };
        PositionUpdate {
            status: Some(PositionStatus::Closed),
            close_price: Some(0.0),
            ..Default::default()
        }
        .apply_to(&mut position);

        assert_eq!(position.status, PositionStatus::Closed);
        assert_eq!(position.close_price, Some(0.0));
        assert_eq!(position.entry_price, 50.0);
    }

    #[test]
    fn test_empty_update() {
        assert!(PositionUpdate::default().is_empty());
        assert!(!PositionUpdate {
            order_level: Some(1),
            ..Default::default()
        }
        .is_empty());
    }
}
