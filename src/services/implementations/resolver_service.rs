use crate::logger::{self, LogTag};
use crate::positions::ProcessingResolver;
use crate::services::{run_periodic, Service};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

pub struct ResolverService {
    resolver: ProcessingResolver,
    interval: Duration,
}

impl ResolverService {
    pub fn new(resolver: ProcessingResolver, interval: Duration) -> Self {
        Self { resolver, interval }
    }
}

#[async_trait]
impl Service for ResolverService {
    fn name(&self) -> &'static str {
        "resolver"
    }

    fn priority(&self) -> i32 {
        30
    }

    async fn start(&mut self, shutdown: Arc<Notify>) -> anyhow::Result<Vec<JoinHandle<()>>> {
        let resolver = self.resolver.clone();
        let interval = self.interval;
        let handle = tokio::spawn(async move {
            run_periodic(interval, shutdown, move || {
                let resolver = resolver.clone();
                async move {
                    match resolver.tick(Utc::now()).await {
                        Ok(report) if report.is_quiet() => {
                            if crate::arguments::is_debug_resolver_enabled() {
                                logger::debug(LogTag::Resolver, &report.to_string());
                            }
                        }
                        Ok(report) => {
                            logger::info(LogTag::Resolver, &report.to_string());
                            for failure in &report.failures {
                                logger::warning(
                                    LogTag::Resolver,
                                    &format!("order {}: {}", failure.order_id, failure.error),
                                );
                            }
                        }
                        Err(e) => logger::error(LogTag::Resolver, &format!("tick failed: {}", e)),
                    }
                }
            })
            .await;
            logger::info(LogTag::Resolver, "stopped");
        });
        Ok(vec![handle])
    }
}
