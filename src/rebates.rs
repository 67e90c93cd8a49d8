//! Maker-rebate accounting — per-day maker volume and estimated rebate,
//! keyed by UTC date.

use std::collections::BTreeMap;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyRebateStats {
    pub date: NaiveDate,
    pub maker_volume: f64,
    pub estimated_rebate: f64,
    pub fill_count: u64,
}

impl DailyRebateStats {
    fn new(date: NaiveDate) -> Self {
        Self {
            date,
            maker_volume: 0.0,
            estimated_rebate: 0.0,
            fill_count: 0,
        }
    }
}

pub struct RebateTracker {
    /// Rebate rate as a decimal (10 bps → 0.001).
    rebate_rate: f64,
    daily_stats: BTreeMap<NaiveDate, DailyRebateStats>,
    total_maker_volume: f64,
    total_estimated_rebates: f64,
}

impl RebateTracker {
    pub fn new(rebate_rate_bps: f64) -> Self {
        Self {
            rebate_rate: rebate_rate_bps / 10_000.0,
            daily_stats: BTreeMap::new(),
            total_maker_volume: 0.0,
            total_estimated_rebates: 0.0,
        }
    }

    /// Record one fill's notional against today's bucket. Taker fills
    /// earn nothing.
    pub fn record_fill(&mut self, notional: f64, is_maker: bool) {
        if !is_maker {
            debug!("taker fill, no rebate");
            return;
        }
        self.record_fill_on(Utc::now().date_naive(), notional);
    }

    fn record_fill_on(&mut self, date: NaiveDate, notional: f64) {
        let stats = self
            .daily_stats
            .entry(date)
            .or_insert_with(|| DailyRebateStats::new(date));

        let rebate = notional * self.rebate_rate;
        stats.maker_volume += notional;
        stats.estimated_rebate += rebate;
        stats.fill_count += 1;

        self.total_maker_volume += notional;
        self.total_estimated_rebates += rebate;

        debug!(
            "fill ${:.2} | rebate est ${:.4} | today ${:.4}",
            notional, rebate, stats.estimated_rebate
        );
    }

    pub fn today_stats(&self) -> DailyRebateStats {
        let today = Utc::now().date_naive();
        self.daily_stats
            .get(&today)
            .cloned()
            .unwrap_or_else(|| DailyRebateStats::new(today))
    }

    pub fn stats_for_date(&self, date: NaiveDate) -> Option<&DailyRebateStats> {
        self.daily_stats.get(&date)
    }

    pub fn total_volume(&self) -> f64 {
        self.total_maker_volume
    }

    pub fn total_rebates(&self) -> f64 {
        self.total_estimated_rebates
    }

    /// Multi-line shutdown report.
    pub fn summary(&self) -> String {
        let mut lines = vec![
            "=".repeat(50),
            "MAKER REBATE SUMMARY".to_string(),
            "=".repeat(50),
            format!("Total Maker Volume: ${:.2}", self.total_maker_volume),
            format!("Estimated Total Rebates: ${:.4}", self.total_estimated_rebates),
            format!("Rebate Rate: {:.2}%", self.rebate_rate * 100.0),
            "-".repeat(50),
            "Daily Breakdown:".to_string(),
        ];
        for stats in self.daily_stats.values() {
            lines.push(format!(
                "  {}: ${:.2} volume, ${:.4} rebate, {} fills",
                stats.date, stats.maker_volume, stats.estimated_rebate, stats.fill_count
            ));
        }
        lines.push("=".repeat(50));
        lines.join("\n")
    }
}

impl Default for RebateTracker {
    fn default() -> Self {
        // 10 bps of maker volume
        Self::new(10.0)
    }
}

// ─────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────
