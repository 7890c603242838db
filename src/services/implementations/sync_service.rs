use crate::cache::ValuationSync;
use crate::logger::{self, LogTag};
use crate::services::{run_periodic, Service};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

pub struct ValuationSyncService {
    sync: Arc<ValuationSync>,
    interval: Duration,
    enabled: bool,
}

impl ValuationSyncService {
    pub fn new(sync: Arc<ValuationSync>, interval: Duration, enabled: bool) -> Self {
        Self {
            sync,
            interval,
            enabled,
        }
    }
}

#[async_trait]
impl Service for ValuationSyncService {
    fn name(&self) -> &'static str {
        "valuation_sync"
    }

    fn priority(&self) -> i32 {
        15
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    async fn start(&mut self, shutdown: Arc<Notify>) -> anyhow::Result<Vec<JoinHandle<()>>> {
        let sync = self.sync.clone();
        let interval = self.interval;
        let handle = tokio::spawn(async move {
            run_periodic(interval, shutdown, move || {
                let sync = sync.clone();
                async move {
                    let report = sync.tick(Utc::now()).await;
                    if !report.failed_venues.is_empty() {
                        logger::warning(
                            LogTag::Sync,
                            &format!("sync incomplete, failed venues: {:?}", report.failed_venues),
                        );
                    }
                }
            })
            .await;
            logger::info(LogTag::Sync, "stopped");
        });
        Ok(vec![handle])
    }
}
