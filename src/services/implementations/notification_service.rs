use crate::notifications::NotificationDispatcher;
use crate::services::Service;
use anyhow::anyhow;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

/// Owns the dispatcher; starts first and stops last so late notifications
/// from the other services are still delivered
pub struct NotificationService {
    dispatcher: Option<NotificationDispatcher>,
}

impl NotificationService {
    pub fn new(dispatcher: NotificationDispatcher) -> Self {
        Self {
            dispatcher: Some(dispatcher),
        }
    }
}

#[async_trait]
impl Service for NotificationService {
    fn name(&self) -> &'static str {
        "notifications"
    }

    fn priority(&self) -> i32 {
        10
    }

    async fn start(&mut self, shutdown: Arc<Notify>) -> anyhow::Result<Vec<JoinHandle<()>>> {
        let dispatcher = self
            .dispatcher
            .take()
            .ok_or_else(|| anyhow!("notification dispatcher already started"))?;
        Ok(vec![tokio::spawn(dispatcher.run(shutdown))])
    }
}
