//! Venue valuation feed
//!
//! `VenueClient` fetches the venue-wide position document; `HttpValuationFeed`
//! narrows it to one (trader, pair, uuid) valuation. The feed fails soft:
//! every error becomes `Valuation::empty()`.

use super::accounts::AccountDirectory;
use super::models::{select_position, TestnetCheckpoint, Valuation, VenueSnapshot};
use crate::arguments::is_debug_valuation_enabled;
use crate::errors::VenueError;
use crate::logger::{self, LogTag};
use crate::positions::types::{Position, Venue};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

const CONSUMER_KEY_HEADER: &str = "x-taoshi-consumer-request-key";

/// What to valuate
#[derive(Debug, Clone, PartialEq)]
pub struct ValuationQuery {
    pub trader_id: i64,
    pub trade_pair: String,
    pub position_uuid: Option<String>,
    pub venue: Venue,
}

impl ValuationQuery {
    pub fn for_position(position: &Position) -> Self {
        Self {
            trader_id: position.trader_id,
            trade_pair: position.trade_pair.clone(),
            position_uuid: (!position.uuid.is_empty()).then(|| position.uuid.clone()),
            venue: position.source,
        }
    }

    pub fn cache_key(&self) -> String {
        format!("{}-{}", self.trade_pair, self.trader_id)
    }
}

#[async_trait]
pub trait ValuationFeed: Send + Sync {
    async fn valuate(&self, query: &ValuationQuery) -> Valuation;
}

/// Source of the venue-wide position document
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn snapshot(&self, venue: Venue) -> Result<VenueSnapshot, VenueError>;
}

pub struct VenueClient {
    client: reqwest::Client,
    positions_url: String,
    positions_token: String,
    testnet_checkpoint_url: String,
}

impl VenueClient {
    pub fn new(
        positions_url: &str,
        positions_token: &str,
        testnet_checkpoint_url: &str,
        timeout: Duration,
    ) -> Result<Self, VenueError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            positions_url: positions_url.to_string(),
            positions_token: positions_token.to_string(),
            testnet_checkpoint_url: testnet_checkpoint_url.to_string(),
        })
    }

    async fn get_json(&self, url: &str, token: Option<&str>) -> Result<serde_json::Value, VenueError> {
        let mut request = self.client.get(url);
        if let Some(token) = token {
            request = request.header(CONSUMER_KEY_HEADER, token);
        }
        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(VenueError::Status {
                endpoint: url.to_string(),
                status: response.status().as_u16(),
            });
        }
        Ok(response.json().await?)
    }
}

/// Parse either venue document into the hot key -> account map
pub fn parse_snapshot(venue: Venue, document: serde_json::Value) -> Result<VenueSnapshot, String> {
    match venue {
        Venue::Main => serde_json::from_value::<VenueSnapshot>(document).map_err(|e| e.to_string()),
        Venue::Test => serde_json::from_value::<TestnetCheckpoint>(document)
            .map(|checkpoint| checkpoint.positions)
            .map_err(|e| e.to_string()),
    }
}

#[async_trait]
impl SnapshotSource for VenueClient {
    async fn snapshot(&self, venue: Venue) -> Result<VenueSnapshot, VenueError> {
        let (url, token) = match venue {
            Venue::Main => (self.positions_url.as_str(), Some(self.positions_token.as_str())),
            Venue::Test => (self.testnet_checkpoint_url.as_str(), None),
        };
        let document = self.get_json(url, token).await?;
        parse_snapshot(venue, document).map_err(|message| VenueError::Decode {
            endpoint: url.to_string(),
            message,
        })
    }
}

/// Feed backed by the venue document and the account directory
pub struct HttpValuationFeed {
    source: Arc<dyn SnapshotSource>,
    accounts: Arc<AccountDirectory>,
}

impl HttpValuationFeed {
    pub fn new(source: Arc<dyn SnapshotSource>, accounts: Arc<AccountDirectory>) -> Self {
        Self { source, accounts }
    }
}

#[async_trait]
impl ValuationFeed for HttpValuationFeed {
    async fn valuate(&self, query: &ValuationQuery) -> Valuation {
        let Some(hot_key) = self.accounts.hot_key(query.trader_id).await else {
            if is_debug_valuation_enabled() {
                logger::debug(
                    LogTag::Valuation,
                    &format!("no venue account for trader {}", query.trader_id),
                );
            }
            return Valuation::empty();
        };

        let snapshot = match self.source.snapshot(query.venue).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                logger::warning(
                    LogTag::Valuation,
                    &format!("{} venue unavailable: {}", query.venue, e),
                );
                return Valuation::empty();
            }
        };

        snapshot
            .get(&hot_key)
            .and_then(|account| {
                select_position(
                    &account.positions,
                    &query.trade_pair,
                    query.position_uuid.as_deref(),
                )
            })
            .map(|position| position.valuation())
            .unwrap_or_default()
    }
}
