/// Configuration schemas - every section defined once with its defaults
use crate::config_struct;
use std::time::Duration;

// ============================================================================
// MONITOR
// ============================================================================

config_struct! {
    /// Reconciliation loop over OPEN and PENDING orders
    pub struct MonitorConfig {
        /// Pause between ticks
        interval_secs: u64 = 5 => min 1,
        /// Minimum spacing of deferred-write flushes
        flush_interval_secs: u64 = 20,
        /// Positions evaluated concurrently within one tick
        concurrency: usize = 8 => min 1,
    }
}

impl MonitorConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval_secs)
    }
}

// ============================================================================
// RESOLVER
// ============================================================================

config_struct! {
    /// Confirmation and timeout handling for *-PROCESSING orders
    pub struct ResolverConfig {
        interval_secs: u64 = 3 => min 1,
        open_deadline_secs: i64 = 300 => min 1,
        adjust_deadline_secs: i64 = 1200 => min 1,
        close_deadline_secs: i64 = 300 => min 1,
        concurrency: usize = 8 => min 1,
    }
}

impl ResolverConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

// ============================================================================
// SIGNALS
// ============================================================================

config_struct! {
    /// Trade signal endpoint and its global rate limit
    pub struct SignalsConfig {
        /// `{id}` is replaced with the trader id
        base_url: String = "https://signals.example.com/trade/{id}".to_string(),
        api_key: String = String::new(),
        max_requests: usize = 10 => min 1,
        /// 0 disables the admission rate, leaving only the in-flight bound
        period_ms: u64 = 1000,
        max_in_flight: usize = 10 => min 1,
        acquire_timeout_secs: u64 = 10 => min 1,
        request_timeout_secs: u64 = 10 => min 1,
    }
}

// ============================================================================
// VENUE
// ============================================================================

config_struct! {
    /// Venue position feeds and the trader account directory
    pub struct VenueConfig {
        positions_url: String = "https://request.taoshi.io/api/v1/positions".to_string(),
        positions_token: String = String::new(),
        testnet_checkpoint_url: String = "https://test.taoshi.io/validator-checkpoint".to_string(),
        request_timeout_secs: u64 = 10 => min 1,
        /// Oldest account directory contents served before a reload
        account_max_age_secs: u64 = 300,
    }
}

// ============================================================================
// PRICES
// ============================================================================

config_struct! {
    /// Live quote source used for PENDING orders
    pub struct PricesConfig {
        /// `{pair}` is replaced with the trade pair
        live_price_url: String = "https://prices.example.com/last/{pair}".to_string(),
        request_timeout_secs: u64 = 5 => min 1,
    }
}

// ============================================================================
// NOTIFICATIONS
// ============================================================================

config_struct! {
    /// Operator webhook
    pub struct NotificationsConfig {
        /// Empty disables the webhook; messages are still logged
        webhook_url: String = String::new(),
        username: String = "challengebot".to_string(),
        dispatch_interval_secs: u64 = 60 => min 1,
    }
}

// ============================================================================
// SYNC
// ============================================================================

config_struct! {
    /// Background valuation cache refresh
    pub struct SyncConfig {
        enabled: bool = true,
        interval_secs: u64 = 2 => min 1,
        /// Positions closed at the venue longer ago than this are evicted
        closed_retention_secs: i64 = 3600 => min 0,
    }
}

// ============================================================================
// DATABASE
// ============================================================================

config_struct! {
    pub struct DatabaseConfig {
        /// Empty means `challengebot.db` in the data directory
        path: String = String::new(),
    }
}

// ============================================================================
// ROOT
// ============================================================================

config_struct! {
    /// Root configuration
    pub struct Config {
        monitor: MonitorConfig = MonitorConfig::default(),
        resolver: ResolverConfig = ResolverConfig::default(),
        signals: SignalsConfig = SignalsConfig::default(),
        venue: VenueConfig = VenueConfig::default(),
        prices: PricesConfig = PricesConfig::default(),
        notifications: NotificationsConfig = NotificationsConfig::default(),
        sync: SyncConfig = SyncConfig::default(),
        database: DatabaseConfig = DatabaseConfig::default(),
    }
}

impl Config {
    /// Reject values the services cannot run with (zero intervals, zero
    /// concurrency, non-positive deadlines)
    pub fn validate(&self) -> Result<(), String> {
        self.monitor.check_bounds()?;
        self.resolver.check_bounds()?;
        self.signals.check_bounds()?;
        self.venue.check_bounds()?;
        self.prices.check_bounds()?;
        self.notifications.check_bounds()?;
        self.sync.check_bounds()?;
        Ok(())
    }
}
