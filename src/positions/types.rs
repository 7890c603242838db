use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// =============================================================================
// ENUMS
// =============================================================================

/// Lifecycle status of one order row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PositionStatus {
    #[serde(rename = "PENDING")]
    Pending,
    #[serde(rename = "PROCESSING")]
    Processing,
    #[serde(rename = "OPEN")]
    Open,
    #[serde(rename = "ADJUST-PROCESSING")]
    AdjustProcessing,
    #[serde(rename = "CLOSE-PROCESSING")]
    CloseProcessing,
    #[serde(rename = "CLOSED")]
    Closed,
}

impl PositionStatus {
    pub const PROCESSING_STATES: [PositionStatus; 3] = [
        PositionStatus::Processing,
        PositionStatus::AdjustProcessing,
        PositionStatus::CloseProcessing,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PositionStatus::Pending => "PENDING",
            PositionStatus::Processing => "PROCESSING",
            PositionStatus::Open => "OPEN",
            PositionStatus::AdjustProcessing => "ADJUST-PROCESSING",
            PositionStatus::CloseProcessing => "CLOSE-PROCESSING",
            PositionStatus::Closed => "CLOSED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PositionStatus::Closed)
    }

    /// Waiting for the venue to confirm a submitted signal
    pub fn is_processing(&self) -> bool {
        Self::PROCESSING_STATES.contains(self)
    }
}

impl fmt::Display for PositionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PositionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(PositionStatus::Pending),
            "PROCESSING" => Ok(PositionStatus::Processing),
            "OPEN" => Ok(PositionStatus::Open),
            "ADJUST-PROCESSING" => Ok(PositionStatus::AdjustProcessing),
            "CLOSE-PROCESSING" => Ok(PositionStatus::CloseProcessing),
            "CLOSED" => Ok(PositionStatus::Closed),
            other => Err(format!("unknown position status: {}", other)),
        }
    }
}

/// What produced the current order row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    Initiate,
    Open,
    Adjust,
    Close,
    TournamentClosed,
}

impl OperationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationType::Initiate => "initiate",
            OperationType::Open => "open",
            OperationType::Adjust => "adjust",
            OperationType::Close => "close",
            OperationType::TournamentClosed => "tournament_closed",
        }
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "initiate" => Ok(OperationType::Initiate),
            "open" => Ok(OperationType::Open),
            "adjust" => Ok(OperationType::Adjust),
            "close" => Ok(OperationType::Close),
            "tournament_closed" => Ok(OperationType::TournamentClosed),
            other => Err(format!("unknown operation type: {}", other)),
        }
    }
}

/// Signal direction; FLAT closes whatever is open at the venue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderType {
    Long,
    Short,
    Flat,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::Long => "LONG",
            OrderType::Short => "SHORT",
            OrderType::Flat => "FLAT",
        }
    }

    /// LONG <-> SHORT; FLAT stays FLAT
    pub fn opposite(&self) -> OrderType {
        match self {
            OrderType::Long => OrderType::Short,
            OrderType::Short => OrderType::Long,
            OrderType::Flat => OrderType::Flat,
        }
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "LONG" => Ok(OrderType::Long),
            "SHORT" => Ok(OrderType::Short),
            "FLAT" => Ok(OrderType::Flat),
            other => Err(format!("unknown order type: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetType {
    Crypto,
    Forex,
    Indices,
    Stocks,
}

impl AssetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetType::Crypto => "crypto",
            AssetType::Forex => "forex",
            AssetType::Indices => "indices",
            AssetType::Stocks => "stocks",
        }
    }

    /// Venue leverage bounds per asset class
    pub fn leverage_bounds(&self) -> (f64, f64) {
        match self {
            AssetType::Crypto => (0.01, 0.5),
            AssetType::Forex => (0.1, 5.0),
            AssetType::Indices => (0.1, 5.0),
            AssetType::Stocks => (0.1, 5.0),
        }
    }
}

impl fmt::Display for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssetType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "crypto" => Ok(AssetType::Crypto),
            "forex" => Ok(AssetType::Forex),
            "indices" => Ok(AssetType::Indices),
            "stocks" => Ok(AssetType::Stocks),
            other => Err(format!("unknown asset type: {}", other)),
        }
    }
}

/// Which venue deployment an order lives on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Venue {
    Main,
    Test,
}

impl Venue {
    pub fn as_str(&self) -> &'static str {
        match self {
            Venue::Main => "main",
            Venue::Test => "test",
        }
    }
}

impl fmt::Display for Venue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Venue {
    type Err = String;

    /// Anything other than "main" is the test deployment
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("main") {
            Ok(Venue::Main)
        } else {
            Ok(Venue::Test)
        }
    }
}

// =============================================================================
// POSITION
// =============================================================================

/// Pending order direction relative to the live price at creation
pub const UPWARD_NONE: i32 = -1;
pub const UPWARD_DOWN: i32 = 0;
pub const UPWARD_UP: i32 = 1;

pub const MODIFIED_BY_SYSTEM: &str = "system";

/// One order row. A position group is every row sharing `position_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    // Identity
    pub order_id: i64,
    pub position_id: i64,
    pub trade_order: i64,

    // Classification
    pub trader_id: i64,
    pub trade_pair: String,
    pub asset_type: AssetType,
    pub order_type: OrderType,
    pub source: Venue,

    // Pricing
    pub entry_price: f64,
    pub initial_price: f64,
    pub close_price: Option<f64>,
    pub min_price: f64,
    pub max_price: f64,
    /// 0 = market; otherwise trailing-limit threshold in percent
    pub limit_order: f64,
    pub average_entry_price: f64,
    pub upward: i32,

    // Risk
    pub leverage: f64,
    pub cumulative_leverage: f64,
    pub cumulative_order_type: OrderType,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub cumulative_stop_loss: f64,
    pub cumulative_take_profit: f64,
    pub trailing: bool,

    // Valuation
    pub profit_loss: f64,
    pub profit_loss_without_fee: f64,
    pub max_profit_loss: f64,
    pub venue_profit_loss: f64,
    pub venue_profit_loss_without_fee: f64,

    // Lifecycle
    pub status: PositionStatus,
    pub old_status: Option<PositionStatus>,
    pub operation_type: OperationType,
    pub open_time: DateTime<Utc>,
    pub adjust_time: Option<DateTime<Utc>>,
    pub close_time: Option<DateTime<Utc>>,
    pub modified_by: String,

    // Venue correlation
    pub uuid: String,
    pub hot_key: String,
    pub order_level: i64,
}

impl Default for Position {
    fn default() -> Self {
        Self {
            order_id: 0,
            position_id: 0,
            trade_order: 1,
            trader_id: 0,
            trade_pair: String::new(),
            asset_type: AssetType::Crypto,
            order_type: OrderType::Long,
            source: Venue::Main,
            entry_price: 0.0,
            initial_price: 0.0,
            close_price: None,
            min_price: 0.0,
            max_price: 0.0,
            limit_order: 0.0,
            average_entry_price: 0.0,
            upward: UPWARD_NONE,
            leverage: 0.0,
            cumulative_leverage: 0.0,
            cumulative_order_type: OrderType::Long,
            stop_loss: 0.0,
            take_profit: 0.0,
            cumulative_stop_loss: 0.0,
            cumulative_take_profit: 0.0,
            trailing: false,
            profit_loss: 0.0,
            profit_loss_without_fee: 0.0,
            max_profit_loss: 0.0,
            venue_profit_loss: 0.0,
            venue_profit_loss_without_fee: 0.0,
            status: PositionStatus::Pending,
            old_status: None,
            operation_type: OperationType::Initiate,
            open_time: Utc::now(),
            adjust_time: None,
            close_time: None,
            modified_by: MODIFIED_BY_SYSTEM.to_string(),
            uuid: String::new(),
            hot_key: String::new(),
            order_level: 0,
        }
    }
}

impl Position {
    /// Valuation cache key for this trader/pair
    pub fn cache_key(&self) -> String {
        format!("{}-{}", self.trade_pair, self.trader_id)
    }

    /// Short identifier for log lines
    pub fn label(&self) -> String {
        format!(
            "order {} ({} trader {} {})",
            self.order_id, self.trade_pair, self.trader_id, self.status
        )
    }

    pub fn is_trailing_limit(&self) -> bool {
        self.limit_order != 0.0
    }

    /// OPEN orders without any exit target need no evaluation
    pub fn has_exit_targets(&self) -> bool {
        self.cumulative_stop_loss != 0.0 || self.cumulative_take_profit != 0.0
    }

    pub fn monitored(&self) -> MonitoredPosition {
        MonitoredPosition {
            position_id: self.position_id,
            order_id: self.order_id,
            trader_id: self.trader_id,
            trade_pair: self.trade_pair.clone(),
            asset_type: self.asset_type,
            entry_price: self.entry_price,
            cumulative_leverage: self.cumulative_leverage,
            cumulative_order_type: self.cumulative_order_type,
            cumulative_stop_loss: self.cumulative_stop_loss,
            cumulative_take_profit: self.cumulative_take_profit,
        }
    }
}

/// Denormalized latest-order projection of a non-closed group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitoredPosition {
    pub position_id: i64,
    pub order_id: i64,
    pub trader_id: i64,
    pub trade_pair: String,
    pub asset_type: AssetType,
    pub entry_price: f64,
    pub cumulative_leverage: f64,
    pub cumulative_order_type: OrderType,
    pub cumulative_stop_loss: f64,
    pub cumulative_take_profit: f64,
}

/// trader -> venue account mapping
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraderAccount {
    pub trader_id: i64,
    pub hot_key: String,
    pub venue: Venue,
    pub email: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_strings_round_trip() {
        for status in [
            PositionStatus::Pending,
            PositionStatus::Processing,
            PositionStatus::Open,
            PositionStatus::AdjustProcessing,
            PositionStatus::CloseProcessing,
            PositionStatus::Closed,
        ] {
            assert_eq!(status.as_str().parse::<PositionStatus>(), Ok(status));
        }
        assert!("open".parse::<PositionStatus>().is_err());
        assert_eq!(
            serde_json::to_string(&PositionStatus::CloseProcessing).unwrap(),
            "\"CLOSE-PROCESSING\""
        );
    }

    #[test]
    fn test_status_classification() {
        assert!(PositionStatus::Closed.is_terminal());
        assert!(!PositionStatus::Open.is_terminal());
        assert!(PositionStatus::AdjustProcessing.is_processing());
        assert!(!PositionStatus::Pending.is_processing());
    }

    #[test]
    fn test_venue_parse_defaults_to_test() {
        assert_eq!("MAIN".parse::<Venue>(), Ok(Venue::Main));
        assert_eq!("testnet".parse::<Venue>(), Ok(Venue::Test));
    }

    #[test]
    fn test_cache_key_format() {
        let position = Position {
            trader_id: 42,
            trade_pair: "BTCUSD".to_string(),
            ..Default::default()
        };
        assert_eq!(position.cache_key(), "BTCUSD-42");
    }

    #[test]
    fn test_order_type_opposite() {
        assert_eq!(OrderType::Long.opposite(), OrderType::Short);
        assert_eq!(OrderType::Flat.opposite(), OrderType::Flat);
    }
}
