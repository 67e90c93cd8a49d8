//! Market eligibility filter.
//!
//! A market qualifies when its question names a target asset and a target
//! timeframe, both outcome prices sit inside the tradeable band, and the
//! market is active.

use regex::Regex;
use tracing::{debug, info};

use crate::types::MarketInfo;

pub struct MarketFilter {
    min_price: f64,
    max_price: f64,
    asset_pattern: Regex,
    timeframe_pattern: Regex,
}

impl MarketFilter {
    pub fn new(
        target_assets: &[String],
        target_timeframes: &[String],
        min_price: f64,
        max_price: f64,
    ) -> Self {
        Self {
            min_price,
            max_price,
            asset_pattern: build_asset_pattern(target_assets),
            timeframe_pattern: build_timeframe_pattern(target_timeframes),
        }
    }

    pub fn is_eligible(&self, market: &MarketInfo) -> bool {
        if !market.active {
            debug!(
                "market {} inactive, skipping",
                &market.condition_id[..8.min(market.condition_id.len())]
            );
            return false;
        }

        if !self.asset_pattern.is_match(&market.question) {
            return false;
        }

        if !self.timeframe_pattern.is_match(&market.question) {
            return false;
        }

        if !market.is_in_price_range(self.min_price, self.max_price) {
            debug!(
                "market {} out of range: YES={:.4} NO={:.4}",
                &market.condition_id[..8.min(market.condition_id.len())],
                market.yes_price,
                market.no_price
            );
            return false;
        }

        true
    }

    pub fn filter_markets<'a>(&self, markets: &'a [MarketInfo]) -> Vec<&'a MarketInfo> {
        let eligible: Vec<&MarketInfo> = markets.iter().filter(|m| self.is_eligible(m)).collect();
        info!("filtered {} markets to {} eligible", markets.len(), eligible.len());
        eligible
    }

    pub fn extract_asset(&self, question: &str) -> Option<String> {
        self.asset_pattern
            .captures(question)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_uppercase())
    }

    pub fn extract_timeframe(&self, question: &str) -> Option<String> {
        let m = self.timeframe_pattern.captures(question)?.get(1)?;
        let tf = m.as_str().to_lowercase().replace(' ', "");
        // Normalize "15min"/"15minute" → "15m", "1hr"/"1hour" → "1h"
        if tf.contains("min") {
            Some(tf.replace("minute", "m").replace("min", "m"))
        } else if tf.contains("hour") || tf.contains("hr") {
            Some(tf.replace("hour", "h").replace("hr", "h"))
        } else {
            Some(tf)
        }
    }
}

fn build_asset_pattern(assets: &[String]) -> Regex {
    let joined = assets
        .iter()
        .map(|a| regex::escape(&a.to_uppercase()))
        .collect::<Vec<_>>()
        .join("|");
    // A pattern that matches nothing when no assets are configured.
    let body = if joined.is_empty() { "$^".to_string() } else { format!(r"\b({joined})\b") };
    Regex::new(&format!("(?i){body}")).expect("asset pattern")
}

fn build_timeframe_pattern(timeframes: &[String]) -> Regex {
    let mut parts = Vec::new();
    for tf in timeframes {
        let tf = tf.to_lowercase();
        if let Some(mins) = tf.strip_suffix('m') {
            parts.push(format!(r"{mins}\s*(?:m|min|minute)"));
        } else if let Some(hours) = tf.strip_suffix('h') {
            parts.push(format!(r"{hours}\s*(?:h|hr|hour)"));
        }
    }
    let body = if parts.is_empty() {
        "$^".to_string()
    } else {
        format!("({})", parts.join("|"))
    };
    Regex::new(&format!("(?i){body}")).expect("timeframe pattern")
}

// ─────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────
