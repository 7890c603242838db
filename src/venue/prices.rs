//! Live price source for PENDING orders
//!
//! Always asks the upstream; `0.0` means no quote.

use crate::arguments::is_debug_valuation_enabled;
use crate::errors::VenueError;
use crate::logger::{self, LogTag};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

#[async_trait]
pub trait LivePriceSource: Send + Sync {
    async fn live_price(&self, trade_pair: &str) -> f64;
}

/// Last-trade quote document: `{"c": <price>, ...}`
#[derive(Debug, Deserialize)]
struct Quote {
    #[serde(default)]
    c: Option<f64>,
}

pub struct HttpLivePriceSource {
    client: reqwest::Client,
    url_template: String,
}

impl HttpLivePriceSource {
    pub fn new(url_template: &str, timeout: Duration) -> Result<Self, VenueError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url_template: url_template.to_string(),
        })
    }

    async fn fetch(&self, trade_pair: &str) -> Result<f64, VenueError> {
        let url = self.url_template.replace("{pair}", trade_pair);
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(VenueError::Status {
                endpoint: url,
                status: response.status().as_u16(),
            });
        }
        let quote: Quote = response.json().await?;
        Ok(quote.c.unwrap_or(0.0))
    }
}

#[async_trait]
impl LivePriceSource for HttpLivePriceSource {
    async fn live_price(&self, trade_pair: &str) -> f64 {
        match self.fetch(trade_pair).await {
            Ok(price) => price,
            Err(e) => {
                if is_debug_valuation_enabled() {
                    logger::debug(
                        LogTag::Valuation,
                        &format!("no live price for {}: {}", trade_pair, e),
                    );
                }
                0.0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_parsing() {
        let quote: Quote = serde_json::from_str(r#"{"c": 101.25, "v": 10}"#).unwrap();
        assert_eq!(quote.c, Some(101.25));
        let empty: Quote = serde_json::from_str("{}").unwrap();
        assert_eq!(empty.c, None);
    }
}
