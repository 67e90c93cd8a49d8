//! Passive box market maker for binary-outcome prediction markets.
//!
//! Accumulates matched YES/NO share pairs ("boxes") with post-only bids,
//! keeping the combined average cost strictly below the breakeven target
//! so every completed box pays out at resolution regardless of outcome.

pub mod bot;
pub mod breakeven;
pub mod config;
pub mod dashboard;
pub mod exchange;
pub mod inventory;
pub mod market_filter;
pub mod orderbook;
pub mod quoting;
pub mod rebates;
pub mod state;
pub mod types;
pub mod ws;
