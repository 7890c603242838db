/// Venue read-model documents and the valuation derived from them
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Mark price and P/L for one position as the venue reports it
///
/// `mark_price == 0` means "no data yet": unknown account, no matching
/// position, or the venue was unreachable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Valuation {
    pub mark_price: f64,
    pub profit_loss: f64,
    pub profit_loss_without_fee: f64,
    /// The venue's own `return_at_close` ratio, unconverted
    pub venue_profit_loss: f64,
    /// The venue's own `current_return` ratio, unconverted
    pub venue_profit_loss_without_fee: f64,
    pub venue_uuid: String,
    pub venue_hot_key: String,
    pub fill_count: i64,
    pub average_entry_price: f64,
    pub closed_at_venue: bool,
    pub closed_at: Option<DateTime<Utc>>,
}

impl Valuation {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn has_price(&self) -> bool {
        self.mark_price != 0.0
    }
}

/// Full venue document: hot key -> account
pub type VenueSnapshot = HashMap<String, VenueAccount>;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VenueAccount {
    #[serde(default)]
    pub positions: Vec<VenuePosition>,
}

/// Testnet checkpoint: the same map nested under `positions`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TestnetCheckpoint {
    #[serde(default)]
    pub positions: VenueSnapshot,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VenueOrder {
    #[serde(default)]
    pub price: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VenuePosition {
    #[serde(default)]
    pub position_uuid: String,
    /// `[pair, display name, fees...]`; only the first element matters
    #[serde(default)]
    pub trade_pair: Vec<serde_json::Value>,
    #[serde(default)]
    pub orders: Vec<VenueOrder>,
    #[serde(default)]
    pub return_at_close: f64,
    #[serde(default)]
    pub current_return: f64,
    #[serde(default)]
    pub average_entry_price: f64,
    #[serde(default)]
    pub is_closed_position: bool,
    #[serde(default)]
    pub close_ms: Option<i64>,
    #[serde(default)]
    pub miner_hotkey: String,
}

impl VenuePosition {
    pub fn pair(&self) -> Option<&str> {
        self.trade_pair.first().and_then(|v| v.as_str())
    }

    pub fn closed_at(&self) -> Option<DateTime<Utc>> {
        self.close_ms
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
    }

    pub fn valuation(&self) -> Valuation {
        let profit_loss = self.return_at_close * 100.0 - 100.0;
        let profit_loss_without_fee = self.current_return * 100.0 - 100.0;
        Valuation {
            mark_price: self.orders.last().map(|o| o.price).unwrap_or(0.0),
            profit_loss,
            profit_loss_without_fee,
            venue_profit_loss: self.return_at_close,
            venue_profit_loss_without_fee: self.current_return,
            venue_uuid: self.position_uuid.clone(),
            venue_hot_key: self.miner_hotkey.clone(),
            fill_count: self.orders.len() as i64,
            average_entry_price: self.average_entry_price,
            closed_at_venue: self.is_closed_position,
            closed_at: self.closed_at(),
        }
    }
}

/// Pick the venue position backing a local order
///
/// The first position whose uuid matches wins; otherwise the first
/// non-closed position on the same pair.
pub fn select_position<'a>(
    positions: &'a [VenuePosition],
    trade_pair: &str,
    position_uuid: Option<&str>,
) -> Option<&'a VenuePosition> {
    if let Some(uuid) = position_uuid.filter(|u| !u.is_empty()) {
        if let Some(found) = positions.iter().find(|p| p.position_uuid == uuid) {
            return Some(found);
        }
    }
    positions
        .iter()
        .find(|p| !p.is_closed_position && p.pair() == Some(trade_pair))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_account() -> VenueAccount {
        serde_json::from_value(serde_json::json!({
            "positions": [
                {
                    "position_uuid": "old",
                    "trade_pair": ["BTCUSD", "BTC/USD", 0.003, 0.001, 0.5],
                    "orders": [{"price": 60000.0}],
                    "return_at_close": 0.99,
                    "current_return": 1.0,
                    "is_closed_position": true,
                    "close_ms": 1700000000000u64,
                    "miner_hotkey": "hk"
                },
                {
                    "position_uuid": "live",
                    "trade_pair": ["BTCUSD", "BTC/USD"],
                    "orders": [{"price": 61000.0}, {"price": 62000.0}],
                    "return_at_close": 1.025,
                    "current_return": 1.03,
                    "average_entry_price": 61500.0,
                    "is_closed_position": false,
                    "miner_hotkey": "hk"
                }
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_select_prefers_uuid_then_open_pair() {
        let account = sample_account();
        let by_uuid = select_position(&account.positions, "BTCUSD", Some("old")).unwrap();
        assert_eq!(by_uuid.position_uuid, "old");

        let by_pair = select_position(&account.positions, "BTCUSD", None).unwrap();
        assert_eq!(by_pair.position_uuid, "live");

        let unknown_uuid = select_position(&account.positions, "BTCUSD", Some("gone")).unwrap();
        assert_eq!(unknown_uuid.position_uuid, "live");

        assert!(select_position(&account.positions, "ETHUSD", None).is_none());
    }

    #[test]
    fn test_valuation_from_venue_position() {
        let account = sample_account();
        let valuation = account.positions[1].valuation();

        assert_eq!(valuation.mark_price, 62000.0);
        assert!((valuation.profit_loss - 2.5).abs() < 1e-9);
        assert!((valuation.profit_loss_without_fee - 3.0).abs() < 1e-9);
        assert_eq!(valuation.venue_profit_loss, 1.025);
        assert_eq!(valuation.venue_profit_loss_without_fee, 1.03);
        assert_eq!(valuation.fill_count, 2);
        assert_eq!(valuation.venue_uuid, "live");
        assert!(!valuation.closed_at_venue);

        let closed = account.positions[0].valuation();
        assert!(closed.closed_at_venue);
        assert!(closed.closed_at.is_some());
    }

    #[test]
    fn test_position_without_orders_has_no_price() {
        let position = VenuePosition::default();
        assert!(!position.valuation().has_price());
    }
}
