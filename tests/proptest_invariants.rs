//! Property-based tests for the breakeven calculator, skew rule, and
//! order-book maintainer.

use pm_box_mm::breakeven::{BoxSnapshot, BreakevenCalculator};
use pm_box_mm::orderbook::OrderBookManager;
use pm_box_mm::types::Outcome;
use proptest::prelude::*;
use serde_json::json;

/// Average cost in the tradeable range.
fn avg_strategy() -> impl Strategy<Value = f64> {
    0.0f64..1.0f64
}

/// Held quantity.
fn qty_strategy() -> impl Strategy<Value = f64> {
    0.0f64..500.0f64
}

/// Quantity for a new bid (strictly positive).
fn new_qty_strategy() -> impl Strategy<Value = f64> {
    0.1f64..100.0f64
}

fn snapshot_strategy() -> impl Strategy<Value = BoxSnapshot> {
    (qty_strategy(), avg_strategy(), qty_strategy(), avg_strategy()).prop_map(
        |(yes_qty, yes_avg, no_qty, no_avg)| BoxSnapshot {
            yes_qty,
            yes_spend: yes_qty * yes_avg,
            yes_avg: if yes_qty > 0.0 { yes_avg } else { 0.0 },
            no_qty,
            no_spend: no_qty * no_avg,
            no_avg: if no_qty > 0.0 { no_avg } else { 0.0 },
        },
    )
}

fn outcome_strategy() -> impl Strategy<Value = Outcome> {
    prop_oneof![Just(Outcome::Yes), Just(Outcome::No)]
}

/// A price on the 0.01 tick grid.
fn tick_strategy() -> impl Strategy<Value = f64> {
    (1u32..99u32).prop_map(|t| f64::from(t) * 0.01)
}

proptest! {
    #![proptest_config(ProptestConfig {
        max_global_rejects: 65536,
        ..ProptestConfig::with_cases(1000)
    })]

    // ========================================================================
    // BREAKEVEN INVARIANTS
    // ========================================================================

    /// A fill at the returned price keeps the projected box cost at or
    /// under the effective target (within float tolerance), whenever the
    /// calculator returns an unclamped price.
    #[test]
    fn max_bid_respects_target(
        snap in snapshot_strategy(),
        outcome in outcome_strategy(),
        new_qty in new_qty_strategy(),
    ) {
        let calc = BreakevenCalculator::new(0.99, 0.005);
        let max = calc.max_bid(outcome, new_qty, &snap);

        // Skip the clamp region: at the 0.01 floor the formula's exact
        // solution may be below the clamp.
        prop_assume!(max > 0.01 + 1e-9);

        let projected = calc.projected_box_cost(outcome, max, new_qty, &snap);
        prop_assert!(
            projected <= calc.effective_target + 1e-6,
            "projected {} > target {} (max_bid {})",
            projected, calc.effective_target, max
        );
    }

    /// Any price strictly above an unclamped max bid violates the target.
    #[test]
    fn price_above_max_bid_violates_target(
        snap in snapshot_strategy(),
        outcome in outcome_strategy(),
        new_qty in new_qty_strategy(),
        bump in 0.001f64..0.2f64,
    ) {
        let calc = BreakevenCalculator::new(0.99, 0.005);
        let max = calc.max_bid(outcome, new_qty, &snap);
        prop_assume!(max > 0.01 + 1e-9 && max < 0.99 - 1e-9);

        let projected = calc.projected_box_cost(outcome, max + bump, new_qty, &snap);
        prop_assert!(projected > calc.effective_target - 1e-9);
    }

    /// The max bid never increases as the partner side's average rises.
    #[test]
    fn max_bid_monotone_in_partner_avg(
        snap in snapshot_strategy(),
        new_qty in new_qty_strategy(),
        higher_avg in avg_strategy(),
    ) {
        let calc = BreakevenCalculator::new(0.99, 0.005);
        prop_assume!(higher_avg > snap.no_avg);

        let base = calc.max_bid(Outcome::Yes, new_qty, &snap);
        let mut worse = snap;
        worse.no_avg = higher_avg;
        let tightened = calc.max_bid(Outcome::Yes, new_qty, &worse);

        prop_assert!(tightened <= base + 1e-9);
    }

    /// Partner average at or past the effective target leaves no room.
    #[test]
    fn exhausted_partner_returns_zero(
        mut snap in snapshot_strategy(),
        outcome in outcome_strategy(),
        new_qty in new_qty_strategy(),
        over in 0.0f64..0.5f64,
    ) {
        let calc = BreakevenCalculator::new(0.99, 0.005);
        match outcome {
            Outcome::Yes => snap.no_avg = calc.effective_target + over,
            Outcome::No => snap.yes_avg = calc.effective_target + over,
        }
        prop_assert_eq!(calc.max_bid(outcome, new_qty, &snap), 0.0);
    }

    /// Clamp law: the result is 0 or inside [0.01, 0.99].
    #[test]
    fn max_bid_clamp_law(
        snap in snapshot_strategy(),
        outcome in outcome_strategy(),
        new_qty in new_qty_strategy(),
    ) {
        let calc = BreakevenCalculator::new(0.99, 0.005);
        let max = calc.max_bid(outcome, new_qty, &snap);
        prop_assert!(max == 0.0 || (0.01..=0.99).contains(&max));
    }

    // ========================================================================
    // ORDER BOOK INVARIANTS
    // ========================================================================

    /// Applying the same snapshot twice yields the same book, and a
    /// zero-size delta for an absent price changes nothing.
    #[test]
    fn snapshot_idempotent_and_noop_delta(
        levels in prop::collection::vec((tick_strategy(), 0.1f64..50.0f64), 0..12),
        absent_price in tick_strategy(),
    ) {
        let snapshot = json!({
            "event_type": "book",
            "asset_id": "tok",
            "bids": levels.iter()
                .map(|(p, s)| json!({"price": format!("{p:.4}"), "size": format!("{s:.4}")}))
                .collect::<Vec<_>>(),
            "asks": []
        });

        let mut a = OrderBookManager::new();
        a.handle_message(&snapshot);
        let mut b = OrderBookManager::new();
        b.handle_message(&snapshot);
        b.handle_message(&snapshot);

        let book_a = a.get("tok").unwrap();
        let book_b = b.get("tok").unwrap();
        prop_assert_eq!(&book_a.bids, &book_b.bids);

        // No-op delta: zero size at a price not in the book
        let on_grid = book_a.bids.iter().any(|l| (l.price - absent_price).abs() < 1e-4);
        prop_assume!(!on_grid);
        let before = book_a.bids.clone();
        a.handle_message(&json!({
            "event_type": "price_change",
            "asset_id": "tok",
            "changes": [{"side": "BUY", "price": format!("{absent_price:.4}"), "size": "0"}]
        }));
        prop_assert_eq!(&a.get("tok").unwrap().bids, &before);
    }

    /// Bids stay sorted descending through any sequence of deltas.
    #[test]
    fn deltas_preserve_bid_ordering(
        updates in prop::collection::vec((tick_strategy(), 0.0f64..50.0f64), 1..30),
    ) {
        let mut mgr = OrderBookManager::new();
        for (price, size) in &updates {
            mgr.handle_message(&json!({
                "event_type": "price_change",
                "asset_id": "tok",
                "changes": [{"side": "BUY", "price": format!("{price:.4}"), "size": format!("{size:.4}")}]
            }));
        }
        if let Some(book) = mgr.get("tok") {
            for pair in book.bids.windows(2) {
                prop_assert!(pair[0].price >= pair[1].price);
            }
            // No duplicate prices within tolerance
            for (i, a) in book.bids.iter().enumerate() {
                for b in &book.bids[i + 1..] {
                    prop_assert!((a.price - b.price).abs() >= 1e-4);
                }
            }
        }
    }
}

// ============================================================================
// SKEW SYMMETRY
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// `adjustment(yes, no) = −adjustment(no, yes)` componentwise.
    #[test]
    fn skew_adjustment_symmetry(yes_qty in 0.0f64..100.0f64, no_qty in 0.0f64..100.0f64) {
        use pm_box_mm::inventory::InventoryTracker;
        use pm_box_mm::types::{Fill, Side};

        fn tracker(yes: f64, no: f64) -> InventoryTracker {
            let mut t = InventoryTracker::new(1.2);
            t.get_or_create("m", "y", "n");
            let fill = |outcome, size| Fill {
                order_id: "o".into(),
                token_id: "t".into(),
                outcome,
                side: Side::Buy,
                price: 0.5,
                size,
                timestamp: chrono::Utc::now(),
                maker: true,
            };
            if yes > 0.0 {
                t.record_fill("m", &fill(Outcome::Yes, yes));
            }
            if no > 0.0 {
                t.record_fill("m", &fill(Outcome::No, no));
            }
            t
        }

        let (ay, an) = tracker(yes_qty, no_qty).adjustment_direction("m");
        let (by, bn) = tracker(no_qty, yes_qty).adjustment_direction("m");
        prop_assert_eq!((ay, an), (-by, -bn));
    }
}
