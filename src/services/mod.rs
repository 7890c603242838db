pub mod implementations;

use crate::logger::{self, LogTag};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// How long `stop_all` waits for one task to finish its current tick
const STOP_TIMEOUT: Duration = Duration::from_secs(30);

/// A periodic background task set
#[async_trait]
pub trait Service: Send + Sync {
    /// Unique service identifier
    fn name(&self) -> &'static str;

    /// Lower starts earlier and stops later
    fn priority(&self) -> i32 {
        100
    }

    fn is_enabled(&self) -> bool {
        true
    }

    /// Spawn the service's tasks; they exit once `shutdown` is notified
    async fn start(&mut self, shutdown: Arc<Notify>) -> anyhow::Result<Vec<JoinHandle<()>>>;
}

pub struct ServiceManager {
    services: Vec<Box<dyn Service>>,
    handles: Vec<(&'static str, Vec<JoinHandle<()>>)>,
    shutdown: Arc<Notify>,
}

impl ServiceManager {
    pub fn new() -> Self {
        Self {
            services: Vec::new(),
            handles: Vec::new(),
            shutdown: Arc::new(Notify::new()),
        }
    }

    pub fn register(&mut self, service: Box<dyn Service>) {
        self.services.push(service);
    }

    /// Start every enabled service in priority order
    pub async fn start_all(&mut self) -> anyhow::Result<()> {
        self.services.sort_by_key(|s| s.priority());

        for service in self.services.iter_mut() {
            let name = service.name();
            if !service.is_enabled() {
                logger::info(LogTag::System, &format!("service {} disabled", name));
                continue;
            }
            let handles = service.start(self.shutdown.clone()).await?;
            self.handles.push((name, handles));
            logger::info(LogTag::System, &format!("service started: {}", name));
        }
        Ok(())
    }

    /// Signal shutdown and join services in reverse start order
    pub async fn stop_all(&mut self) {
        self.shutdown.notify_waiters();

        while let Some((name, handles)) = self.handles.pop() {
            for handle in handles {
                match tokio::time::timeout(STOP_TIMEOUT, handle).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => logger::error(
                        LogTag::System,
                        &format!("service {} task failed: {}", name, e),
                    ),
                    Err(_) => logger::warning(
                        LogTag::System,
                        &format!("service {} did not stop within {:?}", name, STOP_TIMEOUT),
                    ),
                }
            }
            logger::info(LogTag::System, &format!("service stopped: {}", name));
        }
    }

    pub fn running(&self) -> Vec<&'static str> {
        self.handles.iter().map(|(name, _)| *name).collect()
    }
}

impl Default for ServiceManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Tick `work` every `period` until `shutdown` is notified
///
/// The first tick is immediate. A notification during a tick lets the tick
/// finish first.
pub async fn run_periodic<F, Fut>(period: Duration, shutdown: Arc<Notify>, work: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = ()>,
{
    run_periodic_from(Instant::now(), period, shutdown, work).await
}

/// Like `run_periodic`, with the first tick at `start`
pub async fn run_periodic_from<F, Fut>(
    start: Instant,
    period: Duration,
    shutdown: Arc<Notify>,
    mut work: F,
) where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = ()>,
{
    let stop = shutdown.notified();
    tokio::pin!(stop);
    stop.as_mut().enable();

    let mut ticker = tokio::time::interval_at(start, period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = &mut stop => break,
            _ = ticker.tick() => work().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        name: &'static str,
        priority: i32,
        ticks: Arc<AtomicUsize>,
        started: Arc<parking_lot::Mutex<Vec<&'static str>>>,
    }

    #[async_trait]
    impl Service for Counting {
        fn name(&self) -> &'static str {
            self.name
        }

        fn priority(&self) -> i32 {
            self.priority
        }

        async fn start(&mut self, shutdown: Arc<Notify>) -> anyhow::Result<Vec<JoinHandle<()>>> {
            self.started.lock().push(self.name);
            let ticks = self.ticks.clone();
            Ok(vec![tokio::spawn(run_periodic(
                Duration::from_millis(10),
                shutdown,
                move || {
                    let ticks = ticks.clone();
                    async move {
                        ticks.fetch_add(1, Ordering::SeqCst);
                    }
                },
            ))])
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_by_priority_and_stop() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let started = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let mut manager = ServiceManager::new();
        for (name, priority) in [("late", 20), ("early", 10)] {
            manager.register(Box::new(Counting {
                name,
                priority,
                ticks: ticks.clone(),
                started: started.clone(),
            }));
        }

        manager.start_all().await.unwrap();
        assert_eq!(started.lock().clone(), vec!["early", "late"]);

        tokio::time::sleep(Duration::from_millis(35)).await;
        manager.stop_all().await;
        assert!(manager.running().is_empty());

        let after_stop = ticks.load(Ordering::SeqCst);
        assert!(after_stop >= 2);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), after_stop);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delayed_start_skips_immediate_tick() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let shutdown = Arc::new(Notify::new());
        let counter = ticks.clone();
        let handle = tokio::spawn(run_periodic_from(
            Instant::now() + Duration::from_millis(100),
            Duration::from_millis(100),
            shutdown.clone(),
            move || {
                let ticks = counter.clone();
                async move {
                    ticks.fetch_add(1, Ordering::SeqCst);
                }
            },
        ));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 0);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 1);

        shutdown.notify_waiters();
        handle.await.unwrap();
    }
}
