//! Core data model: markets, books, positions, quotes, fills, and the
//! persistence root.
//!
//! Everything here is plain data. Mutation logic lives in the owning
//! components (orderbook maintainer, inventory tracker, state manager).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Round to 4 decimal places — the wire precision for prices and sizes.
pub fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}

// ─────────────────────────────────────────────────────────
// Outcome / Side
// ─────────────────────────────────────────────────────────

/// Binary market outcome. Each market has exactly one YES and one NO token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    #[serde(rename = "YES")]
    Yes,
    #[serde(rename = "NO")]
    No,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Yes => "YES",
            Outcome::No => "NO",
        }
    }

    pub fn partner(&self) -> Outcome {
        match self {
            Outcome::Yes => Outcome::No,
            Outcome::No => Outcome::Yes,
        }
    }
}

/// Order side. The quoting pipeline only ever emits BUY; SELL exists so
/// fill records can represent protocol violations faithfully.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    #[serde(rename = "BUY")]
    Buy,
    #[serde(rename = "SELL")]
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }
}

// ─────────────────────────────────────────────────────────
// Market identity
// ─────────────────────────────────────────────────────────

/// Identity of a tradeable market, created on discovery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketInfo {
    pub condition_id: String,
    pub question: String,
    pub yes_token_id: String,
    pub no_token_id: String,
    #[serde(default = "default_tick")]
    pub min_tick_size: f64,
    #[serde(default = "default_true")]
    pub active: bool,
    /// Last-known mid prices from discovery, used only for eligibility.
    #[serde(default)]
    pub yes_price: f64,
    #[serde(default)]
    pub no_price: f64,
}

fn default_tick() -> f64 {
    0.01
}

fn default_true() -> bool {
    true
}

impl MarketInfo {
    pub fn token_id(&self, outcome: Outcome) -> &str {
        match outcome {
            Outcome::Yes => &self.yes_token_id,
            Outcome::No => &self.no_token_id,
        }
    }

    /// Both outcomes priced inside the tradeable band.
    pub fn is_in_price_range(&self, min_price: f64, max_price: f64) -> bool {
        (min_price..=max_price).contains(&self.yes_price)
            && (min_price..=max_price).contains(&self.no_price)
    }
}

// ─────────────────────────────────────────────────────────
// Order book
// ─────────────────────────────────────────────────────────

/// Single `(price, size)` level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrderBookLevel {
    pub price: f64,
    pub size: f64,
}

impl OrderBookLevel {
    pub fn new(price: f64, size: f64) -> Self {
        Self {
            price: round4(price),
            size: round4(size),
        }
    }
}

/// L2 book for one token. Bids sorted descending, asks ascending.
/// Mutated exclusively by the order-book maintainer.
#[derive(Debug, Clone)]
pub struct OrderBook {
    pub token_id: String,
    pub bids: Vec<OrderBookLevel>,
    pub asks: Vec<OrderBookLevel>,
    pub timestamp: DateTime<Utc>,
}

impl OrderBook {
    pub fn new(token_id: impl Into<String>) -> Self {
        Self {
            token_id: token_id.into(),
            bids: Vec::new(),
            asks: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn best_bid(&self) -> Option<f64> {
        self.bids.first().map(|l| l.price)
    }

    pub fn best_ask(&self) -> Option<f64> {
        self.asks.first().map(|l| l.price)
    }

    pub fn best_bid_size(&self) -> f64 {
        self.bids.first().map(|l| l.size).unwrap_or(0.0)
    }

    pub fn best_ask_size(&self) -> f64 {
        self.asks.first().map(|l| l.size).unwrap_or(0.0)
    }

    pub fn midpoint(&self) -> Option<f64> {
        match (self.best_bid(), self.best_ask()) {
            (Some(b), Some(a)) => Some((b + a) / 2.0),
            _ => None,
        }
    }

    pub fn spread(&self) -> Option<f64> {
        match (self.best_bid(), self.best_ask()) {
            (Some(b), Some(a)) => Some(a - b),
            _ => None,
        }
    }
}

// ─────────────────────────────────────────────────────────
// Positions
// ─────────────────────────────────────────────────────────

/// Running position in one token: shares owned and cumulative USDC spent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub token_id: String,
    pub outcome: Outcome,
    #[serde(default)]
    pub quantity: f64,
    #[serde(default)]
    pub total_cost: f64,
}

impl Position {
    pub fn new(token_id: impl Into<String>, outcome: Outcome) -> Self {
        Self {
            token_id: token_id.into(),
            outcome,
            quantity: 0.0,
            total_cost: 0.0,
        }
    }

    pub fn avg_cost(&self) -> f64 {
        if self.quantity > 0.0 {
            self.total_cost / self.quantity
        } else {
            0.0
        }
    }

    pub fn add_fill(&mut self, qty: f64, price: f64) {
        self.total_cost += qty * price;
        self.quantity += qty;
    }
}

/// Paired YES + NO positions for one market.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketPosition {
    pub condition_id: String,
    pub yes_position: Position,
    pub no_position: Position,
}

impl MarketPosition {
    pub fn new(
        condition_id: impl Into<String>,
        yes_token_id: impl Into<String>,
        no_token_id: impl Into<String>,
    ) -> Self {
        Self {
            condition_id: condition_id.into(),
            yes_position: Position::new(yes_token_id, Outcome::Yes),
            no_position: Position::new(no_token_id, Outcome::No),
        }
    }

    /// YES/NO quantity ratio. `x/0 → +inf` so the heavy predicate fires
    /// immediately; `0/0 → 1.0` (balanced, not NaN).
    pub fn skew_ratio(&self) -> f64 {
        if self.no_position.quantity == 0.0 {
            if self.yes_position.quantity > 0.0 {
                f64::INFINITY
            } else {
                1.0
            }
        } else {
            self.yes_position.quantity / self.no_position.quantity
        }
    }

    /// NO/YES quantity ratio, symmetric to `skew_ratio`.
    pub fn inverse_skew_ratio(&self) -> f64 {
        if self.yes_position.quantity == 0.0 {
            if self.no_position.quantity > 0.0 {
                f64::INFINITY
            } else {
                1.0
            }
        } else {
            self.no_position.quantity / self.yes_position.quantity
        }
    }

    /// Cost of 1 YES + 1 NO at current average costs. The controlling
    /// invariant of the whole strategy is `box_cost < effective target`.
    pub fn box_cost(&self) -> f64 {
        self.yes_position.avg_cost() + self.no_position.avg_cost()
    }

    pub fn total_usdc_spent(&self) -> f64 {
        self.yes_position.total_cost + self.no_position.total_cost
    }
}

// ─────────────────────────────────────────────────────────
// Quotes / fills
// ─────────────────────────────────────────────────────────

/// A bid instruction. Becomes "active" once the exchange assigns an id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    pub token_id: String,
    pub outcome: Outcome,
    pub side: Side,
    pub price: f64,
    pub size: f64,
    #[serde(default)]
    pub order_id: Option<String>,
}

impl Quote {
    pub fn is_active(&self) -> bool {
        self.order_id.is_some()
    }

    pub fn notional(&self) -> f64 {
        self.price * self.size
    }
}

/// A confirmed execution against one of our orders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fill {
    pub order_id: String,
    pub token_id: String,
    pub outcome: Outcome,
    pub side: Side,
    pub price: f64,
    pub size: f64,
    pub timestamp: DateTime<Utc>,
    /// Should always be true — a taker fill is a protocol violation,
    /// logged but still recorded.
    #[serde(default = "default_true")]
    pub maker: bool,
}

impl Fill {
    pub fn notional(&self) -> f64 {
        self.price * self.size
    }
}

// ─────────────────────────────────────────────────────────
// Persistence root
// ─────────────────────────────────────────────────────────

/// Cap on the fills history kept in the durable state document.
pub const MAX_TRACKED_FILLS: usize = 1000;

/// The single durable JSON document. `open_orders` is always written
/// empty — open orders are reconstructed from the exchange, never from
/// disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotState {
    #[serde(default)]
    pub positions: HashMap<String, MarketPosition>,
    #[serde(default)]
    pub open_orders: HashMap<String, Quote>,
    #[serde(default)]
    pub fills: Vec<Fill>,
    #[serde(default)]
    pub total_maker_volume: f64,
    #[serde(default)]
    pub total_rebates_estimate: f64,
    #[serde(default = "Utc::now")]
    pub last_updated: DateTime<Utc>,
}

impl Default for BotState {
    fn default() -> Self {
        Self {
            positions: HashMap::new(),
            open_orders: HashMap::new(),
            fills: Vec::new(),
            total_maker_volume: 0.0,
            total_rebates_estimate: 0.0,
            last_updated: Utc::now(),
        }
    }
}

impl BotState {
    /// Append a fill, trimming oldest-first past the cap, and accumulate
    /// maker volume.
    pub fn push_fill(&mut self, fill: Fill) {
        if fill.maker {
            self.total_maker_volume += fill.notional();
        }
        self.fills.push(fill);
        if self.fills.len() > MAX_TRACKED_FILLS {
            let excess = self.fills.len() - MAX_TRACKED_FILLS;
            self.fills.drain(..excess);
        }
    }
}

// ─────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────
