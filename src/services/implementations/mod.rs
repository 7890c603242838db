mod monitor_service;
mod notification_service;
mod resolver_service;
mod sync_service;

pub use monitor_service::MonitorService;
pub use notification_service::NotificationService;
pub use resolver_service::ResolverService;
pub use sync_service::ValuationSyncService;
