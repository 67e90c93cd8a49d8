//! Breakeven box calculator.
//!
//! Goal: keep the post-fill box cost (YES avg + NO avg) strictly below
//! the effective target, so a matched box pays out regardless of outcome.
//!
//! Max YES bid derivation:
//!   (spend_yes + p·q) / (qty_yes + q) + avg_no < effective_target
//!   p < ((effective_target − avg_no)·(qty_yes + q) − spend_yes) / q
//!
//! The NO side is symmetric.

use tracing::warn;

use crate::types::Outcome;

/// Per-market inventory snapshot the calculator operates on.
/// Pure input — the tracker produces these, nothing here mutates.
#[derive(Debug, Clone, Copy, Default)]
pub struct BoxSnapshot {
    pub yes_qty: f64,
    pub yes_spend: f64,
    pub yes_avg: f64,
    pub no_qty: f64,
    pub no_spend: f64,
    pub no_avg: f64,
}

#[derive(Debug, Clone)]
pub struct BreakevenCalculator {
    pub breakeven_target: f64,
    pub safety_margin: f64,
    pub effective_target: f64,
}

impl Default for BreakevenCalculator {
    fn default() -> Self {
        Self::new(0.99, 0.005)
    }
}

impl BreakevenCalculator {
    pub fn new(breakeven_target: f64, safety_margin: f64) -> Self {
        Self {
            breakeven_target,
            safety_margin,
            effective_target: breakeven_target - safety_margin,
        }
    }

    /// Largest price at which buying `new_qty` more shares of `outcome`
    /// keeps the box cost under the effective target. Clamped to
    /// `[0.01, 0.99]`; returns exactly `0.0` when there is no room at
    /// all (partner average already at or past the target) or when
    /// `new_qty <= 0`. Callers must skip the side on `0.0`, not quote
    /// the floor.
    pub fn max_bid(&self, outcome: Outcome, new_qty: f64, snap: &BoxSnapshot) -> f64 {
        if new_qty <= 0.0 {
            return 0.0;
        }
        match outcome {
            Outcome::Yes => self.max_side_bid(snap.yes_spend, snap.yes_qty, snap.no_avg, new_qty),
            Outcome::No => self.max_side_bid(snap.no_spend, snap.no_qty, snap.yes_avg, new_qty),
        }
    }

    fn max_side_bid(&self, spend: f64, qty: f64, partner_avg: f64, new_qty: f64) -> f64 {
        let headroom = self.effective_target - partner_avg;
        if headroom <= 0.0 {
            warn!(
                "no bid room: partner_avg={:.4} >= target={:.4}",
                partner_avg, self.effective_target
            );
            return 0.0;
        }

        let new_total_qty = qty + new_qty;
        let max_total_spend = headroom * new_total_qty;
        let max_price = (max_total_spend - spend) / new_qty;

        max_price.clamp(0.01, 0.99)
    }

    /// `price <= max_bid` for the same inputs.
    pub fn is_bid_valid(
        &self,
        outcome: Outcome,
        price: f64,
        new_qty: f64,
        snap: &BoxSnapshot,
    ) -> bool {
        let max = self.max_bid(outcome, new_qty, snap);
        let valid = price <= max;
        if !valid {
            warn!(
                "bid {} {:.2}@{:.4} exceeds max {:.4}",
                outcome.as_str(),
                new_qty,
                price,
                max
            );
        }
        valid
    }

    /// Box cost after a hypothetical fill at `(price, new_qty)` on
    /// `outcome`, with the partner side unchanged.
    pub fn projected_box_cost(
        &self,
        outcome: Outcome,
        price: f64,
        new_qty: f64,
        snap: &BoxSnapshot,
    ) -> f64 {
        let (yes_spend, yes_qty, no_spend, no_qty) = match outcome {
            Outcome::Yes => (
                snap.yes_spend + price * new_qty,
                snap.yes_qty + new_qty,
                snap.no_spend,
                snap.no_qty,
            ),
            Outcome::No => (
                snap.yes_spend,
                snap.yes_qty,
                snap.no_spend + price * new_qty,
                snap.no_qty + new_qty,
            ),
        };
        let yes_avg = if yes_qty > 0.0 { yes_spend / yes_qty } else { 0.0 };
        let no_avg = if no_qty > 0.0 { no_spend / no_qty } else { 0.0 };
        yes_avg + no_avg
    }

    /// Guaranteed payout margin of the current box: `1 − (yes_avg + no_avg)`.
    pub fn profit_margin(&self, yes_avg: f64, no_avg: f64) -> f64 {
        1.0 - (yes_avg + no_avg)
    }
}

// ─────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────
