//! Order-book maintainer — reconstructs live L2 books from the feed.
//!
//! `book` snapshots replace the whole book; `price_change` deltas update
//! individual levels. Trade prints never mutate the book. Price matching
//! uses an absolute 1e-4 tolerance so float re-encoding on the wire
//! cannot split a level in two.

use std::collections::HashMap;

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, error, info};

use crate::types::{OrderBook, OrderBookLevel};

const PRICE_TOLERANCE: f64 = 1e-4;

/// Parse a JSON field as f64, accepting both `0.42` and `"0.42"` — the
/// feed uses string encoding for prices, numbers for some sizes.
pub fn parse_f64_field(val: &Value, field: &str) -> Option<f64> {
    val.get(field).and_then(|v| {
        v.as_f64()
            .or_else(|| v.as_str().and_then(|s| s.parse::<f64>().ok()))
    })
}

#[derive(Default)]
pub struct OrderBookManager {
    books: HashMap<String, OrderBook>,
}

impl OrderBookManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route one decoded feed message. Unknown kinds are ignored.
    pub fn handle_message(&mut self, message: &Value) {
        let msg_type = message
            .get("type")
            .or_else(|| message.get("event_type"))
            .and_then(|v| v.as_str())
            .unwrap_or_default();

        match msg_type {
            "book" => self.handle_snapshot(message),
            "price_change" => self.handle_price_change(message),
            // Trade prints do not mutate the book.
            "trade" => {}
            "subscribed" => info!("feed subscription confirmed: {}", message),
            "error" => error!("feed error message: {}", message),
            _ => {}
        }
    }

    fn token_of(message: &Value) -> Option<String> {
        message
            .get("asset_id")
            .or_else(|| message.get("market"))
            .and_then(|v| v.as_str())
            .map(str::to_string)
    }

    fn handle_snapshot(&mut self, message: &Value) {
        let Some(token_id) = Self::token_of(message) else {
            return;
        };

        let mut bids = parse_levels(message.get("bids"));
        let mut asks = parse_levels(message.get("asks"));
        bids.sort_by(|a, b| b.price.partial_cmp(&a.price).unwrap_or(std::cmp::Ordering::Equal));
        asks.sort_by(|a, b| a.price.partial_cmp(&b.price).unwrap_or(std::cmp::Ordering::Equal));

        debug!(
            "book snapshot {}: {} bids, {} asks",
            &token_id[..8.min(token_id.len())],
            bids.len(),
            asks.len()
        );

        let mut book = OrderBook::new(token_id.clone());
        book.bids = bids;
        book.asks = asks;
        book.timestamp = Utc::now();
        self.books.insert(token_id, book);
    }

    fn handle_price_change(&mut self, message: &Value) {
        let Some(token_id) = Self::token_of(message) else {
            return;
        };

        let book = self
            .books
            .entry(token_id.clone())
            .or_insert_with(|| OrderBook::new(token_id));

        let changes = message
            .get("changes")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();

        for change in &changes {
            let side = change.get("side").and_then(|v| v.as_str()).unwrap_or("");
            let Some(price) = parse_f64_field(change, "price") else {
                continue;
            };
            let size = parse_f64_field(change, "size").unwrap_or(0.0);

            match side.to_ascii_uppercase().as_str() {
                "BUY" => update_level(&mut book.bids, price, size, false),
                "SELL" => update_level(&mut book.asks, price, size, true),
                _ => {}
            }
        }

        book.timestamp = Utc::now();
    }

    pub fn get(&self, token_id: &str) -> Option<&OrderBook> {
        self.books.get(token_id)
    }

    pub fn best_bid(&self, token_id: &str) -> Option<f64> {
        self.books.get(token_id).and_then(|b| b.best_bid())
    }

    pub fn best_ask(&self, token_id: &str) -> Option<f64> {
        self.books.get(token_id).and_then(|b| b.best_ask())
    }

    pub fn midpoint(&self, token_id: &str) -> Option<f64> {
        self.books.get(token_id).and_then(|b| b.midpoint())
    }
}

fn parse_levels(raw: Option<&Value>) -> Vec<OrderBookLevel> {
    raw.and_then(|v| v.as_array())
        .map(|levels| {
            levels
                .iter()
                .filter_map(|lvl| {
                    let price = parse_f64_field(lvl, "price")?;
                    let size = parse_f64_field(lvl, "size")?;
                    Some(OrderBookLevel::new(price, size))
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Overwrite, remove, or insert one level, keeping the side sorted.
fn update_level(levels: &mut Vec<OrderBookLevel>, price: f64, size: f64, ascending: bool) {
    if let Some(i) = levels
        .iter()
        .position(|l| (l.price - price).abs() < PRICE_TOLERANCE)
    {
        if size <= 0.0 {
            levels.remove(i);
        } else {
            levels[i].size = crate::types::round4(size);
        }
        return;
    }

    if size > 0.0 {
        levels.push(OrderBookLevel::new(price, size));
        if ascending {
            levels.sort_by(|a, b| a.price.partial_cmp(&b.price).unwrap_or(std::cmp::Ordering::Equal));
        } else {
            levels.sort_by(|a, b| b.price.partial_cmp(&a.price).unwrap_or(std::cmp::Ordering::Equal));
        }
    }
}

// ─────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────
