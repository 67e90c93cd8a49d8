//! Quote generator — turns book snapshots, skew tilt, and breakeven caps
//! into concrete post-only bids.
//!
//! Placement rule per side: one tick behind best bid, tilted by the skew
//! adjustment (+1 joins the top of book, −1 backs off one further tick),
//! snapped to the tick grid, capped by the breakeven max bid, and gated
//! by the configured trading band.

use tracing::{debug, warn};

use crate::config::TradingConfig;
use crate::types::{Outcome, OrderBook, Quote, Side};

/// Snap to the tick grid (nearest). The epsilon absorbs binary-float
/// artifacts on the 0.01 grid.
fn snap_to_tick(price: f64, tick: f64) -> f64 {
    ((price / tick) + 1e-9).round() * tick
}

/// Snap downward to the tick grid, for enforcing caps.
fn floor_to_tick(price: f64, tick: f64) -> f64 {
    ((price / tick) + 1e-9).floor() * tick
}

pub struct QuoteGenerator {
    tick_size: f64,
    base_size: f64,
    skew_threshold: f64,
    min_price: f64,
    max_price: f64,
}

impl QuoteGenerator {
    pub fn new(cfg: &TradingConfig) -> Self {
        Self {
            tick_size: cfg.tick_size,
            base_size: cfg.base_quote_size,
            skew_threshold: cfg.skew_threshold,
            min_price: cfg.min_price,
            max_price: cfg.max_price,
        }
    }

    /// Generate 0, 1, or 2 BUY quotes for one market cycle.
    #[allow(clippy::too_many_arguments)]
    pub fn generate_quotes(
        &self,
        yes_token_id: &str,
        no_token_id: &str,
        yes_book: Option<&OrderBook>,
        no_book: Option<&OrderBook>,
        yes_qty: f64,
        no_qty: f64,
        max_yes_bid: f64,
        max_no_bid: f64,
    ) -> Vec<Quote> {
        let skew_ratio = skew_ratio(yes_qty, no_qty);
        let (yes_adj, no_adj) = self.skew_adjustments(skew_ratio);

        let mut quotes = Vec::with_capacity(2);

        if let Some(q) = self.single_quote(yes_token_id, Outcome::Yes, yes_book, yes_adj, max_yes_bid)
        {
            quotes.push(q);
        }
        if let Some(q) = self.single_quote(no_token_id, Outcome::No, no_book, no_adj, max_no_bid) {
            quotes.push(q);
        }

        for q in &quotes {
            debug!(
                "quote {} BID {:.2}@{:.4} | skew={:.3} adj=({},{})",
                q.outcome.as_str(),
                q.size,
                q.price,
                skew_ratio,
                yes_adj,
                no_adj,
            );
        }

        quotes
    }

    fn single_quote(
        &self,
        token_id: &str,
        outcome: Outcome,
        book: Option<&OrderBook>,
        tick_adjustment: i8,
        max_price: f64,
    ) -> Option<Quote> {
        let best_bid = book?.best_bid()?;

        // Base placement: one tick behind best bid.
        let base_price = best_bid - self.tick_size;
        let mut price = if tick_adjustment > 0 {
            best_bid // join level 1
        } else if tick_adjustment < 0 {
            base_price + f64::from(tick_adjustment) * self.tick_size
        } else {
            base_price
        };

        price = snap_to_tick(price, self.tick_size);

        // Breakeven cap. A cap of 0 floors the price out of range below,
        // so an exhausted side never emits a quote.
        if price > max_price {
            debug!(
                "{} quote {:.4} above breakeven cap {:.4}, clamping",
                outcome.as_str(),
                price,
                max_price
            );
            price = floor_to_tick(max_price, self.tick_size);
        }

        if price < self.min_price || price > self.max_price {
            debug!(
                "{} quote {:.4} outside band [{:.2}, {:.2}]",
                outcome.as_str(),
                price,
                self.min_price,
                self.max_price
            );
            return None;
        }

        if price <= 0.0 || price >= 1.0 {
            return None;
        }

        Some(Quote {
            token_id: token_id.to_string(),
            outcome,
            side: Side::Buy,
            price: crate::types::round4(price),
            size: self.base_size,
            order_id: None,
        })
    }

    fn skew_adjustments(&self, skew_ratio: f64) -> (i8, i8) {
        if skew_ratio > self.skew_threshold {
            (-1, 1)
        } else if skew_ratio < 1.0 / self.skew_threshold {
            (1, -1)
        } else {
            (0, 0)
        }
    }

    /// Shrink (or drop) a candidate so cumulative spend stays under the
    /// global position cap.
    pub fn adjust_size_for_position_limit(
        &self,
        mut quote: Quote,
        total_spent: f64,
        max_position: f64,
    ) -> Option<Quote> {
        let remaining = max_position - total_spent;
        if remaining <= 0.0 {
            warn!(
                "position limit reached ({:.2} >= {:.2}), dropping {} quote",
                total_spent,
                max_position,
                quote.outcome.as_str()
            );
            return None;
        }

        if quote.notional() > remaining {
            let new_size = (remaining / quote.price * 100.0).round() / 100.0;
            if new_size < 0.1 {
                return None;
            }
            debug!(
                "resized {} quote {:.2} -> {:.2} (remaining ${:.2})",
                quote.outcome.as_str(),
                quote.size,
                new_size,
                remaining
            );
            quote.size = new_size;
        }

        Some(quote)
    }
}

fn skew_ratio(yes_qty: f64, no_qty: f64) -> f64 {
    if no_qty == 0.0 {
        if yes_qty > 0.0 {
            f64::INFINITY
        } else {
            1.0
        }
    } else {
        yes_qty / no_qty
    }
}

// ─────────────────────────────────────────────────────────
// Batch builder
// ─────────────────────────────────────────────────────────

/// Groups quotes across markets for batch submission.
#[derive(Debug)]
pub struct BatchQuoteBuilder {
    max_batch_size: usize,
    quotes: Vec<Quote>,
}

impl BatchQuoteBuilder {
    pub fn new(max_batch_size: usize) -> Self {
        Self {
            max_batch_size,
            quotes: Vec::new(),
        }
    }

    pub fn add(&mut self, quote: Quote) -> bool {
        if self.quotes.len() < self.max_batch_size {
            self.quotes.push(quote);
            true
        } else {
            false
        }
    }

    pub fn is_full(&self) -> bool {
        self.quotes.len() >= self.max_batch_size
    }

    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.quotes.len()
    }

    /// Return and clear the accumulated batch.
    pub fn take(&mut self) -> Vec<Quote> {
        std::mem::take(&mut self.quotes)
    }
}

// ─────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::OrderBookLevel;

    fn generator() -> QuoteGenerator {
        QuoteGenerator::new(&TradingConfig::default())
    }

    fn book_with_bid(best_bid: f64) -> OrderBook {
        let mut b = OrderBook::new("tok");
        b.bids = vec![OrderBookLevel::new(best_bid, 5.0)];
        b.asks = vec![OrderBookLevel::new(best_bid + 0.02, 5.0)];
        b
    }

    fn yes_quote(
        g: &QuoteGenerator,
        book: &OrderBook,
        yes_qty: f64,
        no_qty: f64,
        cap: f64,
    ) -> Option<Quote> {
        g.generate_quotes("y", "n", Some(book), None, yes_qty, no_qty, cap, 0.0)
            .into_iter()
            .next()
    }

    #[test]
    fn test_passive_placement_one_tick_behind() {
        let g = generator();
        let q = yes_quote(&g, &book_with_bid(0.42), 0.0, 0.0, 0.50).unwrap();
        assert!((q.price - 0.41).abs() < 1e-9);
        assert_eq!(q.side, Side::Buy);
        assert!((q.size - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_aggressive_adjustment_joins_top_of_book() {
        let g = generator();
        // NO-heavy inventory → YES gets +1
        let q = yes_quote(&g, &book_with_bid(0.42), 10.0, 15.0, 0.50).unwrap();
        assert!((q.price - 0.42).abs() < 1e-9);
    }

    #[test]
    fn test_backoff_adjustment_moves_further_back() {
        let g = generator();
        // YES-heavy inventory → YES gets −1
        let q = yes_quote(&g, &book_with_bid(0.42), 15.0, 10.0, 0.50).unwrap();
        assert!((q.price - 0.40).abs() < 1e-9);
    }

    #[test]
    fn test_breakeven_cap_clamps_price() {
        let g = generator();
        let q = yes_quote(&g, &book_with_bid(0.42), 0.0, 0.0, 0.39).unwrap();
        assert!((q.price - 0.39).abs() < 1e-9);
    }

    #[test]
    fn test_zero_cap_skips_side_entirely() {
        let g = generator();
        assert!(yes_quote(&g, &book_with_bid(0.42), 0.0, 0.0, 0.0).is_none());
    }

    #[test]
    fn test_price_outside_band_is_skipped() {
        let g = generator();
        assert!(yes_quote(&g, &book_with_bid(0.15), 0.0, 0.0, 0.50).is_none());
        assert!(yes_quote(&g, &book_with_bid(0.95), 0.0, 0.0, 0.99).is_none());
    }

    #[test]
    fn test_missing_book_is_skipped() {
        let g = generator();
        let quotes = g.generate_quotes("y", "n", None, None, 0.0, 0.0, 0.5, 0.5);
        assert!(quotes.is_empty());
    }

    #[test]
    fn test_both_sides_emitted_when_both_books_present() {
        let g = generator();
        let yes_book = book_with_bid(0.42);
        let no_book = book_with_bid(0.55);
        let quotes =
            g.generate_quotes("y", "n", Some(&yes_book), Some(&no_book), 0.0, 0.0, 0.9, 0.9);
        assert_eq!(quotes.len(), 2);
        assert_eq!(quotes[0].outcome, Outcome::Yes);
        assert_eq!(quotes[1].outcome, Outcome::No);
    }

    #[test]
    fn test_position_limit_resize() {
        let g = generator();
        let quote = Quote {
            token_id: "y".into(),
            outcome: Outcome::Yes,
            side: Side::Buy,
            price: 0.50,
            size: 20.0,
            order_id: None,
        };

        // $5 remaining at 0.50 → 10 shares
        let resized = g
            .adjust_size_for_position_limit(quote.clone(), 95.0, 100.0)
            .unwrap();
        assert!((resized.size - 10.0).abs() < 1e-9);

        // $0.05 remaining → exactly the 0.1 minimum
        let tiny = g
            .adjust_size_for_position_limit(quote.clone(), 99.95, 100.0)
            .unwrap();
        assert!((tiny.size - 0.1).abs() < 1e-9);

        // Below minimum → dropped
        assert!(g
            .adjust_size_for_position_limit(quote.clone(), 99.99, 100.0)
            .is_none());

        // Cap already consumed → dropped
        assert!(g
            .adjust_size_for_position_limit(quote, 100.0, 100.0)
            .is_none());
    }

    #[test]
    fn test_position_limit_leaves_small_quotes_alone() {
        let g = generator();
        let quote = Quote {
            token_id: "y".into(),
            outcome: Outcome::Yes,
            side: Side::Buy,
            price: 0.50,
            size: 5.0,
            order_id: None,
        };
        let kept = g.adjust_size_for_position_limit(quote, 10.0, 100.0).unwrap();
        assert!((kept.size - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_batch_builder_caps_and_drains() {
        let mut b = BatchQuoteBuilder::new(2);
        let q = Quote {
            token_id: "y".into(),
            outcome: Outcome::Yes,
            side: Side::Buy,
            price: 0.5,
            size: 5.0,
            order_id: None,
        };
        assert!(b.add(q.clone()));
        assert!(b.add(q.clone()));
        assert!(b.is_full());
        assert!(!b.add(q));
        assert_eq!(b.take().len(), 2);
        assert!(b.is_empty());
    }

    #[test]
    fn test_tick_snapping_on_uneven_prices() {
        let g = generator();
        let mut book = OrderBook::new("tok");
        // best bid slightly off-grid from float accumulation
        book.bids = vec![OrderBookLevel::new(0.4200, 5.0)];
        let q = yes_quote(&g, &book, 0.0, 0.0, 0.39).unwrap();
        // floor(0.39 / 0.01) must land on 0.39, not 0.38
        assert!((q.price - 0.39).abs() < 1e-9);
    }
}
