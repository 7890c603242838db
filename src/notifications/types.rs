//! Notification types
//!
//! Operator messages report failures of the reconciliation core (rejected
//! signals, forced closes). User messages tell a trader what happened to one
//! of their orders.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub enum NotificationType {
    /// Message for the operator channel
    Operator { source: String, message: String },

    /// Message addressed to one trader
    User {
        trader_id: i64,
        subject: String,
        content: String,
    },
}

/// A notification with timestamp
#[derive(Clone, Debug, PartialEq)]
pub struct Notification {
    pub notification_type: NotificationType,
    pub timestamp: DateTime<Utc>,
}

impl Notification {
    pub fn new(notification_type: NotificationType) -> Self {
        Self {
            notification_type,
            timestamp: Utc::now(),
        }
    }

    pub fn operator(source: &str, message: impl Into<String>) -> Self {
        Self::new(NotificationType::Operator {
            source: source.to_string(),
            message: message.into(),
        })
    }

    pub fn user(trader_id: i64, subject: &str, content: impl Into<String>) -> Self {
        Self::new(NotificationType::User {
            trader_id,
            subject: subject.to_string(),
            content: content.into(),
        })
    }

    pub fn is_operator(&self) -> bool {
        matches!(self.notification_type, NotificationType::Operator { .. })
    }

    /// One line as posted to the channel; identical lines are deduplicated
    pub fn render(&self) -> String {
        match &self.notification_type {
            NotificationType::Operator { source, message } => {
                format!("[{}] {}", source, message)
            }
            NotificationType::User {
                trader_id,
                subject,
                content,
            } => format!("[trader {}] {}: {}", trader_id, subject, content),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render() {
        assert_eq!(
            Notification::operator("resolver", "order 4 closed").render(),
            "[resolver] order 4 closed"
        );
        let user = Notification::user(12, "Order closed", "BTCUSD was closed");
        assert!(!user.is_operator());
        assert_eq!(user.render(), "[trader 12] Order closed: BTCUSD was closed");
    }
}
