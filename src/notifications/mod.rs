//! Operator and user notifications
//!
//! Producers call `Notifier::notify`, which never blocks or fails. The
//! `NotificationDispatcher` drains the queue on an interval, deduplicates
//! and posts one batch to the webhook.

pub mod dispatcher;
pub mod types;

pub use dispatcher::{LogSink, NotificationDispatcher, NotificationSink, WebhookSink};
pub use types::{Notification, NotificationType};

use tokio::sync::mpsc;

/// Fire-and-forget notification channel
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Sending half of the dispatcher queue
#[derive(Clone)]
pub struct NotificationHub {
    sender: mpsc::UnboundedSender<Notification>,
}

impl Notifier for NotificationHub {
    fn notify(&self, notification: Notification) {
        // a closed dispatcher only happens during shutdown
        if let Err(e) = self.sender.send(notification) {
            crate::logger::warning(
                crate::logger::LogTag::Notify,
                &format!("notification dropped: {}", e.0.render()),
            );
        }
    }
}

/// Hub and the receiver the dispatcher drains
pub fn channel() -> (NotificationHub, mpsc::UnboundedReceiver<Notification>) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (NotificationHub { sender }, receiver)
}
