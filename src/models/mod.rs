use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// One historical observation of a symbol
///
/// The ledger returns full OHLCV rows; replay only needs the open.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub open: f64,
}

impl PricePoint {
    pub fn new(date: NaiveDate, open: f64) -> Self {
        Self { date, open }
    }
}

/// Clock position: how many ticks have fired and the simulated date they reached
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClockState {
    pub tick_index: u64,
    pub current_date: Option<NaiveDate>,
}

/// Prices produced by a single tick
///
/// Symbols without a point for the tick are absent, never zero-filled.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceSnapshot {
    pub tick_index: u64,
    pub current_date: Option<NaiveDate>,
    pub prices: BTreeMap<String, f64>,
}

impl PriceSnapshot {
    pub fn price(&self, symbol: &str) -> Option<f64> {
        self.prices.get(symbol).copied()
    }

    pub fn state(&self) -> ClockState {
        ClockState {
            tick_index: self.tick_index,
            current_date: self.current_date,
        }
    }
}

/// Qualitative direction between the last two points of a window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trend {
    Up,
    Down,
    Flat,
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trend::Up => write!(f, "up"),
            Trend::Down => write!(f, "down"),
            Trend::Flat => write!(f, "flat"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

impl std::str::FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "buy" => Ok(Side::Buy),
            "sell" => Ok(Side::Sell),
            other => Err(format!("unknown side: {}", other)),
        }
    }
}

/// Order as entered by the user, before it has a simulated date
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub symbol: String,
    pub side: Side,
    pub quantity: u32,
}

impl Order {
    pub fn new(symbol: impl Into<String>, side: Side, quantity: u32) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            quantity,
        }
    }
}

/// Order stamped with simulated market time, ready for `POST /trades`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatedOrder {
    pub symbol: String,
    pub side: Side,
    pub quantity: u32,
    pub date: NaiveDate,
}

/// Trade as recorded by the ledger
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TradeRecord {
    pub id: i64,
    pub symbol: String,
    pub side: Side,
    pub quantity: i64,
    pub price: f64,
    /// Kept as the ledger formats it
    pub timestamp: String,
}

/// Unrealized PnL row for one open position
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UnrealizedPnl {
    pub quantity: i64,
    pub avg_cost: f64,
    pub current_price: f64,
    pub market_value: f64,
    pub cost_basis: f64,
    pub unrealized_pnl: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RealizedTrade {
    pub id: i64,
    pub symbol: String,
    pub quantity_sold: i64,
    pub avg_buy_price: f64,
    pub sell_price: f64,
    pub realized_pnl: f64,
}

/// Net quantity per symbol
pub type Positions = BTreeMap<String, i64>;
