//! Inventory tracker — per-market YES/NO positions and the skew engine
//! that turns imbalance into quote-placement tilt.
//!
//! Owns the `MarketPosition` map. Fills flow in from the feed dispatcher;
//! the trading loop and state writer only read.

use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::breakeven::BoxSnapshot;
use crate::types::{Fill, MarketPosition, Outcome, Side};

pub struct InventoryTracker {
    positions: HashMap<String, MarketPosition>,
    skew_threshold: f64,
}

impl InventoryTracker {
    pub fn new(skew_threshold: f64) -> Self {
        Self {
            positions: HashMap::new(),
            skew_threshold,
        }
    }

    /// Idempotent lookup; constructs zeroed YES/NO positions on miss.
    pub fn get_or_create(
        &mut self,
        condition_id: &str,
        yes_token_id: &str,
        no_token_id: &str,
    ) -> &MarketPosition {
        self.positions
            .entry(condition_id.to_string())
            .or_insert_with(|| MarketPosition::new(condition_id, yes_token_id, no_token_id))
    }

    pub fn get(&self, condition_id: &str) -> Option<&MarketPosition> {
        self.positions.get(condition_id)
    }

    /// Apply a confirmed BUY fill. Unknown markets and SELL fills are
    /// invariant violations: warn and drop.
    pub fn record_fill(&mut self, condition_id: &str, fill: &Fill) {
        let Some(position) = self.positions.get_mut(condition_id) else {
            warn!(
                "no position for {}, cannot record fill {}",
                condition_id, fill.order_id
            );
            return;
        };

        if fill.side != Side::Buy {
            warn!("ignoring non-BUY fill {} (accumulation only)", fill.order_id);
            return;
        }

        match fill.outcome {
            Outcome::Yes => {
                position.yes_position.add_fill(fill.size, fill.price);
                info!(
                    "📦 YES fill {:.2}@{:.4} | avg={:.4} qty={:.2}",
                    fill.size,
                    fill.price,
                    position.yes_position.avg_cost(),
                    position.yes_position.quantity,
                );
            }
            Outcome::No => {
                position.no_position.add_fill(fill.size, fill.price);
                info!(
                    "📦 NO fill {:.2}@{:.4} | avg={:.4} qty={:.2}",
                    fill.size,
                    fill.price,
                    position.no_position.avg_cost(),
                    position.no_position.quantity,
                );
            }
        }

        let ratio = position.skew_ratio();
        let status = if ratio > self.skew_threshold {
            "YES_HEAVY"
        } else if ratio < 1.0 / self.skew_threshold {
            "NO_HEAVY"
        } else {
            "BALANCED"
        };
        debug!(
            "skew YES={:.2} NO={:.2} ratio={:.3} box={:.4} {}",
            position.yes_position.quantity,
            position.no_position.quantity,
            ratio,
            position.box_cost(),
            status,
        );
    }

    // ─────────────────────────────────────────────────
    // Getters
    // ─────────────────────────────────────────────────

    pub fn yes_quantity(&self, condition_id: &str) -> f64 {
        self.get(condition_id)
            .map(|p| p.yes_position.quantity)
            .unwrap_or(0.0)
    }

    pub fn no_quantity(&self, condition_id: &str) -> f64 {
        self.get(condition_id)
            .map(|p| p.no_position.quantity)
            .unwrap_or(0.0)
    }

    pub fn yes_avg(&self, condition_id: &str) -> f64 {
        self.get(condition_id)
            .map(|p| p.yes_position.avg_cost())
            .unwrap_or(0.0)
    }

    pub fn no_avg(&self, condition_id: &str) -> f64 {
        self.get(condition_id)
            .map(|p| p.no_position.avg_cost())
            .unwrap_or(0.0)
    }

    pub fn box_cost(&self, condition_id: &str) -> f64 {
        self.get(condition_id).map(|p| p.box_cost()).unwrap_or(0.0)
    }

    pub fn total_spent(&self, condition_id: &str) -> f64 {
        self.get(condition_id)
            .map(|p| p.total_usdc_spent())
            .unwrap_or(0.0)
    }

    pub fn total_spent_all_markets(&self) -> f64 {
        self.positions.values().map(|p| p.total_usdc_spent()).sum()
    }

    pub fn skew_ratio(&self, condition_id: &str) -> f64 {
        self.get(condition_id).map(|p| p.skew_ratio()).unwrap_or(1.0)
    }

    /// Snapshot the calculator consumes. Zeroed for unknown markets.
    pub fn snapshot(&self, condition_id: &str) -> BoxSnapshot {
        match self.get(condition_id) {
            Some(p) => BoxSnapshot {
                yes_qty: p.yes_position.quantity,
                yes_spend: p.yes_position.total_cost,
                yes_avg: p.yes_position.avg_cost(),
                no_qty: p.no_position.quantity,
                no_spend: p.no_position.total_cost,
                no_avg: p.no_position.avg_cost(),
            },
            None => BoxSnapshot::default(),
        }
    }

    // ─────────────────────────────────────────────────
    // Skew predicates + tilt
    // ─────────────────────────────────────────────────

    pub fn is_yes_heavy(&self, condition_id: &str) -> bool {
        self.skew_ratio(condition_id) > self.skew_threshold
    }

    pub fn is_no_heavy(&self, condition_id: &str) -> bool {
        self.get(condition_id)
            .map(|p| p.inverse_skew_ratio() > self.skew_threshold)
            .unwrap_or(false)
    }

    /// `(yes_tick_adj, no_tick_adj)`:
    /// YES heavy → `(-1, +1)` (back off YES, join top of book on NO),
    /// NO heavy → `(+1, -1)`, balanced → `(0, 0)`.
    pub fn adjustment_direction(&self, condition_id: &str) -> (i8, i8) {
        if self.is_yes_heavy(condition_id) {
            (-1, 1)
        } else if self.is_no_heavy(condition_id) {
            (1, -1)
        } else {
            (0, 0)
        }
    }

    // ─────────────────────────────────────────────────
    // Persistence plumbing
    // ─────────────────────────────────────────────────

    /// Wholesale replace, used once at startup from the loaded state.
    pub fn load_from_positions(&mut self, positions: HashMap<String, MarketPosition>) {
        info!("loaded {} positions from state", positions.len());
        self.positions = positions;
    }

    /// Shallow copy for the state writer.
    pub fn export_positions(&self) -> HashMap<String, MarketPosition> {
        self.positions.clone()
    }
}

// ─────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────
