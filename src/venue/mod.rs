//! Everything that talks to the external trading venue
//!
//! - `feed`: venue read model -> per-position `Valuation`
//! - `accounts`: trader -> hot key directory
//! - `signals`: rate-limited signal submission
//! - `prices`: live quotes for PENDING orders
pub mod accounts;
pub mod feed;
pub mod models;
pub mod prices;
pub mod rate_limiter;
pub mod signals;

pub use accounts::AccountDirectory;
pub use feed::{HttpValuationFeed, SnapshotSource, ValuationFeed, ValuationQuery, VenueClient};
pub use models::{Valuation, VenuePosition, VenueSnapshot};
pub use prices::{HttpLivePriceSource, LivePriceSource};
pub use rate_limiter::{RateLimitSettings, SignalRateLimiter};
pub use signals::{HttpSignalTransport, Signal, SignalGateway, SignalTransport};
