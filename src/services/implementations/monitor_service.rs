use crate::logger::{self, LogTag};
use crate::positions::ReconciliationEngine;
use crate::services::{run_periodic_from, Service};
use anyhow::Context;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Runs the reconciliation engine and flushes its queue on shutdown
pub struct MonitorService {
    engine: ReconciliationEngine,
    interval: Duration,
}

impl MonitorService {
    pub fn new(engine: ReconciliationEngine, interval: Duration) -> Self {
        Self { engine, interval }
    }
}

#[async_trait]
impl Service for MonitorService {
    fn name(&self) -> &'static str {
        "monitor"
    }

    fn priority(&self) -> i32 {
        20
    }

    async fn start(&mut self, shutdown: Arc<Notify>) -> anyhow::Result<Vec<JoinHandle<()>>> {
        // surface a broken store at start-up rather than on the first tick
        let report = self
            .engine
            .tick()
            .await
            .context("initial monitor tick failed")?;
        logger::info(LogTag::Monitor, &format!("first tick: {}", report));

        let engine = self.engine.clone();
        let interval = self.interval;
        // the start-up tick above stands in for the loop's first one
        let first = Instant::now() + interval;
        let handle = tokio::spawn(async move {
            let ticking = engine.clone();
            run_periodic_from(first, interval, shutdown, move || {
                let engine = ticking.clone();
                async move {
                    match engine.tick().await {
                        Ok(report) if report.is_quiet() => {
                            logger::debug(LogTag::Monitor, &report.to_string());
                        }
                        Ok(report) => {
                            logger::info(LogTag::Monitor, &report.to_string());
                            for failure in &report.failures {
                                logger::warning(
                                    LogTag::Monitor,
                                    &format!("order {}: {}", failure.order_id, failure.error),
                                );
                            }
                        }
                        Err(e) => logger::error(LogTag::Monitor, &format!("tick failed: {}", e)),
                    }
                }
            })
            .await;

            match engine.shutdown_flush().await {
                Ok(flushed) => logger::info(
                    LogTag::Monitor,
                    &format!("stopped, flushed {} deferred updates", flushed),
                ),
                Err(e) => logger::error(
                    LogTag::Monitor,
                    &format!("final flush failed, deferred updates lost: {}", e),
                ),
            }
        });
        Ok(vec![handle])
    }
}
