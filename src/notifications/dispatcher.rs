//! Batched notification dispatcher
//!
//! Every `dispatch_interval` the queue is drained, identical lines are
//! collapsed and the rest is posted as one or more webhook messages of at
//! most `MAX_MESSAGE_LEN` characters. Shutdown drains once more.

use super::types::Notification;
use crate::errors::VenueError;
use crate::logger::{self, LogTag};
use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Notify};

/// Webhook content limit
pub const MAX_MESSAGE_LEN: usize = 2000;

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn post(&self, content: &str) -> Result<(), VenueError>;
}

#[derive(Serialize)]
struct WebhookBody<'a> {
    content: &'a str,
    username: &'a str,
}

pub struct WebhookSink {
    client: reqwest::Client,
    url: String,
    username: String,
}

impl WebhookSink {
    pub fn new(url: &str, username: &str) -> Result<Self, VenueError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            url: url.to_string(),
            username: username.to_string(),
        })
    }
}

#[async_trait]
impl NotificationSink for WebhookSink {
    async fn post(&self, content: &str) -> Result<(), VenueError> {
        let response = self
            .client
            .post(&self.url)
            .json(&WebhookBody {
                content,
                username: &self.username,
            })
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(VenueError::Status {
                endpoint: self.url.clone(),
                status: response.status().as_u16(),
            });
        }
        Ok(())
    }
}

/// Sink used when no webhook is configured
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    async fn post(&self, content: &str) -> Result<(), VenueError> {
        logger::info(LogTag::Notify, content);
        Ok(())
    }
}

pub struct NotificationDispatcher {
    receiver: mpsc::UnboundedReceiver<Notification>,
    sink: Arc<dyn NotificationSink>,
    interval: Duration,
}

impl NotificationDispatcher {
    pub fn new(
        receiver: mpsc::UnboundedReceiver<Notification>,
        sink: Arc<dyn NotificationSink>,
        interval: Duration,
    ) -> Self {
        Self {
            receiver,
            sink,
            interval,
        }
    }

    /// Everything queued right now, deduplicated, in arrival order
    fn drain(&mut self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut lines = Vec::new();
        while let Ok(notification) = self.receiver.try_recv() {
            let line = notification.render();
            if !notification.is_operator() {
                logger::info(LogTag::Notify, &line);
            }
            if seen.insert(line.clone()) {
                lines.push(line);
            }
        }
        lines
    }

    /// Post whatever is queued; returns the number of distinct lines sent
    pub async fn dispatch_once(&mut self) -> usize {
        let lines = self.drain();
        if lines.is_empty() {
            return 0;
        }
        for batch in chunk_lines(&lines, MAX_MESSAGE_LEN) {
            if let Err(e) = self.sink.post(&batch).await {
                logger::warning(
                    LogTag::Notify,
                    &format!("failed to post {} notification bytes: {}", batch.len(), e),
                );
            }
        }
        lines.len()
    }

    pub async fn run(mut self, shutdown: Arc<Notify>) {
        let stop = shutdown.notified();
        tokio::pin!(stop);
        stop.as_mut().enable();

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = &mut stop => break,
                _ = ticker.tick() => {
                    self.dispatch_once().await;
                }
            }
        }

        let sent = self.dispatch_once().await;
        if sent > 0 {
            logger::info(
                LogTag::Notify,
                &format!("sent {} pending notifications on shutdown", sent),
            );
        }
    }
}

/// Join lines with newlines into messages no longer than `max_len`
///
/// A single overlong line is truncated rather than split.
fn chunk_lines(lines: &[String], max_len: usize) -> Vec<String> {
    let mut batches = Vec::new();
    let mut current = String::new();
    for line in lines {
        let line: String = line.chars().take(max_len).collect();
        let needed = if current.is_empty() {
            line.len()
        } else {
            current.len() + 1 + line.len()
        };
        if needed > max_len && !current.is_empty() {
            batches.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push('\n');
        }
        current.push_str(&line);
    }
    if !current.is_empty() {
        batches.push(current);
    }
    batches
}
