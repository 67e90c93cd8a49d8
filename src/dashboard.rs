//! Read-only status API for dashboard integration.
//!
//! Serves summary stats, recent fills, positions, and the active market
//! set over localhost. Strictly an observer — nothing here mutates bot
//! state.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::state::StateManager;
use crate::types::MarketInfo;

#[derive(Clone)]
pub struct DashboardContext {
    pub state: Arc<StateManager>,
    pub markets: Arc<Mutex<HashMap<String, MarketInfo>>>,
}

pub fn router(ctx: DashboardContext) -> Router {
    Router::new()
        .route("/api/stats", get(handle_stats))
        .route("/api/fills", get(handle_fills))
        .route("/api/positions", get(handle_positions))
        .route("/api/markets", get(handle_markets))
        .with_state(ctx)
}

/// Bind and serve until the shutdown signal flips. Bind failure is
/// logged, not fatal — the bot trades without a dashboard.
pub async fn serve(port: u16, ctx: DashboardContext, mut shutdown: watch::Receiver<bool>) {
    let listener = match tokio::net::TcpListener::bind(("127.0.0.1", port)).await {
        Ok(l) => l,
        Err(e) => {
            warn!("dashboard bind failed on port {port}: {e}");
            return;
        }
    };
    info!("dashboard API listening on http://127.0.0.1:{port}");

    let app = router(ctx);
    let result = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            while shutdown.changed().await.is_ok() {
                if *shutdown.borrow() {
                    break;
                }
            }
        })
        .await;

    if let Err(e) = result {
        warn!("dashboard server error: {e}");
    }
}

async fn handle_stats(State(ctx): State<DashboardContext>) -> Json<Value> {
    let state = ctx.state.snapshot();
    let markets_count = ctx.markets.lock().expect("markets lock").len();
    Json(json!({
        "total_maker_volume": state.total_maker_volume,
        "total_rebates_estimate": state.total_rebates_estimate,
        "last_updated": state.last_updated.to_rfc3339(),
        "active_markets_count": markets_count,
        "fills_count": state.fills.len(),
        "positions_count": state.positions.len(),
    }))
}

async fn handle_fills(State(ctx): State<DashboardContext>) -> Json<Value> {
    let state = ctx.state.snapshot();
    let start = state.fills.len().saturating_sub(100);
    Json(json!({ "fills": &state.fills[start..] }))
}

async fn handle_positions(State(ctx): State<DashboardContext>) -> Json<Value> {
    let state = ctx.state.snapshot();
    Json(json!({ "positions": state.positions }))
}

async fn handle_markets(State(ctx): State<DashboardContext>) -> Json<Value> {
    let markets = ctx.markets.lock().expect("markets lock");
    let list: Vec<Value> = markets
        .values()
        .map(|m| {
            json!({
                "condition_id": m.condition_id,
                "question": m.question,
                "yes_price": m.yes_price,
                "no_price": m.no_price,
            })
        })
        .collect();
    Json(json!({ "markets": list }))
}

// ─────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PersistenceConfig;
    use crate::types::{Fill, Outcome, Side};
    use chrono::Utc;

    fn ctx() -> DashboardContext {
        let cfg = PersistenceConfig {
            state_file: "unused.json".into(),
            save_interval_seconds: 5.0,
            enable_persistence: false,
        };
        DashboardContext {
            state: Arc::new(StateManager::new(cfg)),
            markets: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    #[tokio::test]
    async fn test_stats_reflect_state() {
        let ctx = ctx();
        ctx.state.record_fill(Fill {
            order_id: "o-1".into(),
            token_id: "tok".into(),
            outcome: Outcome::Yes,
            side: Side::Buy,
            price: 0.5,
            size: 10.0,
            timestamp: Utc::now(),
            maker: true,
        });
        ctx.markets.lock().unwrap().insert(
            "cond".into(),
            MarketInfo {
                condition_id: "cond".into(),
                question: "q".into(),
                yes_token_id: "y".into(),
                no_token_id: "n".into(),
                min_tick_size: 0.01,
                active: true,
                yes_price: 0.5,
                no_price: 0.5,
            },
        );

        let Json(stats) = handle_stats(State(ctx.clone())).await;
        assert_eq!(stats["fills_count"], 1);
        assert_eq!(stats["active_markets_count"], 1);
        assert!((stats["total_maker_volume"].as_f64().unwrap() - 5.0).abs() < 1e-9);

        let Json(markets) = handle_markets(State(ctx)).await;
        assert_eq!(markets["markets"].as_array().unwrap().len(), 1);
    }
}
