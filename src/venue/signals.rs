//! Signal gateway: rate-limited submission of trade intents
//!
//! `submit` answers only "accepted or not". Whether the venue actually
//! executed the signal is learned later from the valuation feed.

use super::rate_limiter::{RateLimitSettings, SignalRateLimiter};
use crate::arguments::is_debug_signals_enabled;
use crate::errors::VenueError;
use crate::logger::{self, LogTag};
use crate::positions::types::OrderType;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// One trade intent as sent to the venue
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    pub trader_id: i64,
    pub trade_pair: String,
    pub order_type: OrderType,
    pub leverage: f64,
}

/// Wire transport for signals; returns the HTTP status code
#[async_trait]
pub trait SignalTransport: Send + Sync {
    async fn send(&self, signal: &Signal) -> Result<u16, VenueError>;
}

#[derive(Serialize)]
struct SignalBody<'a> {
    api_key: &'a str,
    trade_pair: &'a str,
    order_type: &'a str,
    leverage: f64,
}

/// POSTs signals to a per-trader URL (`{id}` is replaced with the trader id)
pub struct HttpSignalTransport {
    client: reqwest::Client,
    url_template: String,
    api_key: String,
}

impl HttpSignalTransport {
    pub fn new(url_template: &str, api_key: &str, timeout: Duration) -> Result<Self, VenueError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url_template: url_template.to_string(),
            api_key: api_key.to_string(),
        })
    }

    pub fn url_for(&self, trader_id: i64) -> String {
        self.url_template.replace("{id}", &trader_id.to_string())
    }
}

#[async_trait]
impl SignalTransport for HttpSignalTransport {
    async fn send(&self, signal: &Signal) -> Result<u16, VenueError> {
        let body = SignalBody {
            api_key: &self.api_key,
            trade_pair: &signal.trade_pair,
            order_type: signal.order_type.as_str(),
            leverage: signal.leverage,
        };
        let response = self
            .client
            .post(self.url_for(signal.trader_id))
            .json(&body)
            .send()
            .await?;
        Ok(response.status().as_u16())
    }
}

/// Rate-limited front door for every signal the system sends
pub struct SignalGateway {
    transport: Arc<dyn SignalTransport>,
    limiter: SignalRateLimiter,
}

impl SignalGateway {
    pub fn new(transport: Arc<dyn SignalTransport>, settings: RateLimitSettings) -> Self {
        Self {
            transport,
            limiter: SignalRateLimiter::new(settings),
        }
    }

    /// `true` only when the venue answered 2xx
    pub async fn submit(
        &self,
        trader_id: i64,
        trade_pair: &str,
        order_type: OrderType,
        leverage: f64,
    ) -> bool {
        let signal = Signal {
            trader_id,
            trade_pair: trade_pair.to_string(),
            order_type,
            leverage,
        };

        let permit = match self.limiter.acquire().await {
            Ok(permit) => permit,
            Err(e) => {
                logger::warning(
                    LogTag::Signals,
                    &format!(
                        "{} {} for trader {} not sent: {}",
                        order_type, trade_pair, trader_id, e
                    ),
                );
                return false;
            }
        };

        let result = self.transport.send(&signal).await;
        drop(permit);

        match result {
            Ok(status) if (200..300).contains(&status) => {
                logger::info(
                    LogTag::Signals,
                    &format!(
                        "{} {} x{} accepted for trader {}",
                        order_type, trade_pair, leverage, trader_id
                    ),
                );
                true
            }
            Ok(status) => {
                logger::warning(
                    LogTag::Signals,
                    &format!(
                        "{} {} for trader {} rejected with status {}",
                        order_type, trade_pair, trader_id, status
                    ),
                );
                false
            }
            Err(e) => {
                logger::warning(
                    LogTag::Signals,
                    &format!(
                        "{} {} for trader {} failed: {}",
                        order_type, trade_pair, trader_id, e
                    ),
                );
                if is_debug_signals_enabled() {
                    logger::debug(LogTag::Signals, &format!("signal: {:?}", signal));
                }
                false
            }
        }
    }
}
