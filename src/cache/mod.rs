//! Valuation cache and the background sync that keeps it warm
pub mod sync;
pub mod valuation;

pub use sync::{SyncReport, ValuationSync};
pub use valuation::{CacheMetrics, ValuationCache};
