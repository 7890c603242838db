// Process wiring: config -> components -> services

use crate::arguments;
use crate::cache::{ValuationCache, ValuationSync};
use crate::config::{self, Config};
use crate::logger::{self, LogTag};
use crate::notifications::{self, LogSink, NotificationDispatcher, NotificationSink, WebhookSink};
use crate::paths;
use crate::positions::{
    Deadlines, PositionStore, ProcessingResolver, ReconciliationEngine, SqliteStore,
    WriteBatchQueue,
};
use crate::services::implementations::{
    MonitorService, NotificationService, ResolverService, ValuationSyncService,
};
use crate::services::ServiceManager;
use crate::venue::{
    AccountDirectory, HttpLivePriceSource, HttpSignalTransport, HttpValuationFeed,
    RateLimitSettings, SignalGateway, VenueClient,
};
use anyhow::{anyhow, Context};
use chrono::Utc;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Everything the services run on, built once from the config
pub struct Components {
    pub store: Arc<dyn PositionStore>,
    pub engine: ReconciliationEngine,
    pub resolver: ProcessingResolver,
    pub sync: Arc<ValuationSync>,
    pub dispatcher: NotificationDispatcher,
}

pub fn database_path(config: &Config) -> PathBuf {
    if let Some(path) = arguments::get_database_path() {
        return PathBuf::from(path);
    }
    if config.database.path.is_empty() {
        paths::get_positions_db_path()
    } else {
        PathBuf::from(&config.database.path)
    }
}

pub fn build_components(config: &Config, store: Arc<dyn PositionStore>) -> anyhow::Result<Components> {
    let venue_timeout = Duration::from_secs(config.venue.request_timeout_secs);

    let accounts = Arc::new(AccountDirectory::new(
        store.clone(),
        Duration::from_secs(config.venue.account_max_age_secs),
    ));
    let venue = Arc::new(
        VenueClient::new(
            &config.venue.positions_url,
            &config.venue.positions_token,
            &config.venue.testnet_checkpoint_url,
            venue_timeout,
        )
        .context("failed to build venue client")?,
    );
    let feed = Arc::new(HttpValuationFeed::new(venue.clone(), accounts.clone()));
    let cache = Arc::new(ValuationCache::new(feed));

    let transport = Arc::new(
        HttpSignalTransport::new(
            &config.signals.base_url,
            &config.signals.api_key,
            Duration::from_secs(config.signals.request_timeout_secs),
        )
        .context("failed to build signal transport")?,
    );
    let gateway = Arc::new(SignalGateway::new(
        transport,
        RateLimitSettings {
            max_requests: config.signals.max_requests,
            period: Duration::from_millis(config.signals.period_ms),
            max_in_flight: config.signals.max_in_flight,
            acquire_timeout: Duration::from_secs(config.signals.acquire_timeout_secs),
        },
    ));

    let prices = Arc::new(
        HttpLivePriceSource::new(
            &config.prices.live_price_url,
            Duration::from_secs(config.prices.request_timeout_secs),
        )
        .context("failed to build live price source")?,
    );

    let (hub, receiver) = notifications::channel();
    let notifier = Arc::new(hub);
    let sink: Arc<dyn NotificationSink> = if config.notifications.webhook_url.is_empty() {
        Arc::new(LogSink)
    } else {
        Arc::new(
            WebhookSink::new(
                &config.notifications.webhook_url,
                &config.notifications.username,
            )
            .context("failed to build notification webhook")?,
        )
    };
    let dispatcher = NotificationDispatcher::new(
        receiver,
        sink,
        Duration::from_secs(config.notifications.dispatch_interval_secs),
    );

    let queue = Arc::new(WriteBatchQueue::new(config.monitor.flush_interval()));
    let engine = ReconciliationEngine::new(
        store.clone(),
        cache.clone(),
        prices,
        gateway.clone(),
        queue,
        notifier.clone(),
        config.monitor.concurrency,
    );
    let resolver = ProcessingResolver::new(
        store.clone(),
        cache.clone(),
        gateway,
        notifier,
        Deadlines {
            open: chrono::Duration::seconds(config.resolver.open_deadline_secs),
            adjust: chrono::Duration::seconds(config.resolver.adjust_deadline_secs),
            close: chrono::Duration::seconds(config.resolver.close_deadline_secs),
        },
        config.resolver.concurrency,
    );
    let sync = Arc::new(ValuationSync::new(
        cache,
        venue,
        accounts,
        chrono::Duration::seconds(config.sync.closed_retention_secs),
    ));

    Ok(Components {
        store,
        engine,
        resolver,
        sync,
        dispatcher,
    })
}

/// Load config, open the store and run until Ctrl-C (or one pass with `--once`)
pub async fn run_bot() -> anyhow::Result<()> {
    paths::ensure_all_directories().map_err(|e| anyhow!(e))?;

    match arguments::get_config_path() {
        Some(path) => config::load_config_from_path(&path),
        None => config::load_config(),
    }
    .map_err(|e| anyhow!(e))
    .context("failed to load configuration")?;
    let config = config::get_config_clone();

    let db_path = database_path(&config);
    let store: Arc<dyn PositionStore> = Arc::new(
        SqliteStore::open(&db_path)
            .with_context(|| format!("failed to open database {}", db_path.display()))?,
    );

    let components = build_components(&config, store)?;

    if arguments::is_single_pass_enabled() {
        return run_single_pass(components).await;
    }

    let mut manager = ServiceManager::new();
    manager.register(Box::new(NotificationService::new(components.dispatcher)));
    manager.register(Box::new(ValuationSyncService::new(
        components.sync,
        Duration::from_secs(config.sync.interval_secs),
        config.sync.enabled && !arguments::is_sync_disabled(),
    )));
    manager.register(Box::new(MonitorService::new(
        components.engine,
        config.monitor.interval(),
    )));
    manager.register(Box::new(ResolverService::new(
        components.resolver,
        config.resolver.interval(),
    )));

    let mut stop = install_shutdown_handler()?;
    manager.start_all().await?;
    logger::info(
        LogTag::System,
        &format!("running services: {:?}", manager.running()),
    );

    stop.recv().await;
    logger::warning(
        LogTag::System,
        "shutdown requested, finishing current ticks (Ctrl+C again to force)",
    );
    manager.stop_all().await;
    logger::info(LogTag::System, "shutdown complete");
    logger::flush();
    Ok(())
}

/// One monitor tick, one resolver tick, flush everything, exit
async fn run_single_pass(mut components: Components) -> anyhow::Result<()> {
    let monitor = components.engine.tick().await?;
    logger::info(LogTag::Monitor, &monitor.to_string());
    let resolver = components.resolver.tick(Utc::now()).await?;
    logger::info(LogTag::Resolver, &resolver.to_string());

    let flushed = components.engine.shutdown_flush().await?;
    components.dispatcher.dispatch_once().await;
    logger::info(
        LogTag::System,
        &format!("single pass done, flushed {} deferred updates", flushed),
    );
    logger::flush();
    Ok(())
}

/// First Ctrl-C requests a graceful stop, the second exits at once
fn install_shutdown_handler() -> anyhow::Result<mpsc::UnboundedReceiver<()>> {
    let (sender, receiver) = mpsc::unbounded_channel();
    let presses = AtomicUsize::new(0);
    ctrlc::set_handler(move || {
        if presses.fetch_add(1, Ordering::SeqCst) > 0 {
            eprintln!("second Ctrl+C, exiting immediately");
            std::process::exit(130);
        }
        let _ = sender.send(());
    })
    .context("failed to install Ctrl+C handler")?;
    Ok(receiver)
}
