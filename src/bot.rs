//! Bot orchestration — the periodic cancel-replace trading loop, the
//! feed dispatcher, and graceful shutdown.
//!
//! Data flow:
//!   feed → WsSession → dispatcher → (order books | fill handler)
//!   trading loop → breakeven + quoting → exchange client
//!   persistence reads inventory and appended fills transversally.
//!
//! The loop keeps ticking as long as the process lives: per-cycle errors
//! are logged, the cycle pauses briefly, and the next cycle is the retry.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::Utc;
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use crate::breakeven::BreakevenCalculator;
use crate::config::Config;
use crate::dashboard::{self, DashboardContext};
use crate::exchange::{parse_market, ClobClient};
use crate::inventory::InventoryTracker;
use crate::market_filter::MarketFilter;
use crate::orderbook::{parse_f64_field, OrderBookManager};
use crate::quoting::{BatchQuoteBuilder, QuoteGenerator};
use crate::rebates::RebateTracker;
use crate::state::StateManager;
use crate::types::{Fill, MarketInfo, Outcome, Quote};
use crate::ws::WsSession;

/// Re-fetch the eligible market set this often.
const MARKET_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

// ─────────────────────────────────────────────────────────
// Feed dispatcher
// ─────────────────────────────────────────────────────────

/// Routes decoded feed messages to the book maintainer and the fill
/// handler. Cloneable bundle of the shared maps.
#[derive(Clone)]
struct FeedDispatcher {
    books: Arc<Mutex<OrderBookManager>>,
    inventory: Arc<Mutex<InventoryTracker>>,
    rebates: Arc<Mutex<RebateTracker>>,
    state: Arc<StateManager>,
    token_index: Arc<Mutex<HashMap<String, String>>>,
    pending_quotes: Arc<Mutex<HashMap<String, Quote>>>,
}

impl FeedDispatcher {
    fn dispatch(&self, message: &Value) {
        // The feed batches events as arrays.
        if let Some(batch) = message.as_array() {
            for item in batch {
                self.dispatch_one(item);
            }
        } else {
            self.dispatch_one(message);
        }
    }

    fn dispatch_one(&self, message: &Value) {
        let msg_type = message
            .get("type")
            .or_else(|| message.get("event_type"))
            .and_then(|v| v.as_str())
            .unwrap_or_default();

        match msg_type {
            "book" | "price_change" => {
                self.books.lock().expect("books lock").handle_message(message);
            }
            "trade" | "fill" => {
                // Market-channel trade prints carry no order_id and fall
                // through harmlessly; owned-order events match.
                self.handle_fill(message);
                self.books.lock().expect("books lock").handle_message(message);
            }
            "subscribed" | "error" => {
                self.books.lock().expect("books lock").handle_message(message);
            }
            _ => {}
        }
    }

    /// Match a fill notification against the pending-quote map and apply
    /// it to inventory, durable state, and rebate accounting. Unmatched
    /// fills belong to cancelled orders or another session — drop them.
    fn handle_fill(&self, message: &Value) {
        let Some(order_id) = message
            .get("order_id")
            .or_else(|| message.get("orderId"))
            .and_then(|v| v.as_str())
        else {
            return;
        };

        let Some(quote) = self
            .pending_quotes
            .lock()
            .expect("pending lock")
            .get(order_id)
            .cloned()
        else {
            debug!("unmatched fill for order {order_id}, ignoring");
            return;
        };

        let size = parse_f64_field(message, "size").unwrap_or(0.0);
        let price = parse_f64_field(message, "price").unwrap_or(0.0);
        if size <= 0.0 || price <= 0.0 {
            return;
        }

        let maker = message.get("maker").and_then(|v| v.as_bool()).unwrap_or(true);
        if !maker {
            warn!("taker fill on order {order_id} — post-only violation");
        }

        let Some(condition_id) = self
            .token_index
            .lock()
            .expect("index lock")
            .get(&quote.token_id)
            .cloned()
        else {
            warn!("no market for token {}, dropping fill", quote.token_id);
            return;
        };

        let fill = Fill {
            order_id: order_id.to_string(),
            token_id: quote.token_id.clone(),
            outcome: quote.outcome,
            side: quote.side,
            price,
            size,
            timestamp: Utc::now(),
            maker,
        };

        let box_cost = {
            let mut inventory = self.inventory.lock().expect("inventory lock");
            inventory.record_fill(&condition_id, &fill);
            self.state.update_positions(inventory.export_positions());
            inventory.box_cost(&condition_id)
        };

        let total_rebates = {
            let mut rebates = self.rebates.lock().expect("rebates lock");
            rebates.record_fill(fill.notional(), fill.maker);
            rebates.total_rebates()
        };

        info!(
            "💰 FILL {} {:.2}@{:.4} = ${:.2} | box {:.4}",
            fill.outcome.as_str(),
            fill.size,
            fill.price,
            fill.notional(),
            box_cost,
        );

        self.state.record_fill(fill);
        self.state.update_rebates(total_rebates);
    }
}

// ─────────────────────────────────────────────────────────
// Bot
// ─────────────────────────────────────────────────────────

pub struct MarketMakingBot {
    cfg: Config,
    client: ClobClient,
    breakeven: BreakevenCalculator,
    quoter: QuoteGenerator,
    filter: MarketFilter,

    books: Arc<Mutex<OrderBookManager>>,
    inventory: Arc<Mutex<InventoryTracker>>,
    rebates: Arc<Mutex<RebateTracker>>,
    state: Arc<StateManager>,
    active_markets: Arc<Mutex<HashMap<String, MarketInfo>>>,
    /// token_id → condition_id, built as markets are registered.
    token_index: Arc<Mutex<HashMap<String, String>>>,
    pending_quotes: Arc<Mutex<HashMap<String, Quote>>>,

    shutdown_tx: watch::Sender<bool>,
}

impl MarketMakingBot {
    pub fn new(cfg: Config) -> Self {
        let client = ClobClient::new(&cfg.api, cfg.paper_trading);
        let breakeven =
            BreakevenCalculator::new(cfg.trading.breakeven_target, cfg.trading.safety_margin);
        let quoter = QuoteGenerator::new(&cfg.trading);
        let filter = MarketFilter::new(
            &cfg.trading.target_assets,
            &cfg.trading.target_timeframes,
            cfg.trading.min_price,
            cfg.trading.max_price,
        );
        let state = Arc::new(StateManager::new(cfg.persistence.clone()));
        let (shutdown_tx, _) = watch::channel(false);

        Self {
            client,
            breakeven,
            quoter,
            filter,
            books: Arc::new(Mutex::new(OrderBookManager::new())),
            inventory: Arc::new(Mutex::new(InventoryTracker::new(cfg.trading.skew_threshold))),
            rebates: Arc::new(Mutex::new(RebateTracker::new(cfg.trading.rebate_rate_bps))),
            state,
            active_markets: Arc::new(Mutex::new(HashMap::new())),
            token_index: Arc::new(Mutex::new(HashMap::new())),
            pending_quotes: Arc::new(Mutex::new(HashMap::new())),
            shutdown_tx,
            cfg,
        }
    }

    /// Handle for the signal task: flipping this to true stops every
    /// activity.
    pub fn shutdown_sender(&self) -> watch::Sender<bool> {
        self.shutdown_tx.clone()
    }

    fn dispatcher(&self) -> FeedDispatcher {
        FeedDispatcher {
            books: self.books.clone(),
            inventory: self.inventory.clone(),
            rebates: self.rebates.clone(),
            state: self.state.clone(),
            token_index: self.token_index.clone(),
            pending_quotes: self.pending_quotes.clone(),
        }
    }

    pub async fn run(&mut self) -> anyhow::Result<()> {
        info!("════════════════════════════════════════════════");
        info!("  BOX MARKET MAKER STARTING");
        info!("════════════════════════════════════════════════");
        if self.cfg.paper_trading {
            info!("📝 PAPER TRADING MODE — orders will not be submitted");
        }

        // Configuration errors abort here; everything later survives.
        self.client.ensure_creds().await?;

        if self.state.load() {
            let positions = self.state.positions();
            self.inventory
                .lock()
                .expect("inventory lock")
                .load_from_positions(positions);
        }

        let mut tasks = Vec::new();

        tasks.push(tokio::spawn(
            self.state.clone().run_periodic(self.shutdown_tx.subscribe()),
        ));

        if self.cfg.dashboard_port != 0 {
            let ctx = DashboardContext {
                state: self.state.clone(),
                markets: self.active_markets.clone(),
            };
            tasks.push(tokio::spawn(dashboard::serve(
                self.cfg.dashboard_port,
                ctx,
                self.shutdown_tx.subscribe(),
            )));
        }

        if let Err(e) = self.refresh_markets().await {
            warn!("initial market refresh failed: {e:#}");
        }
        if self.active_markets.lock().expect("markets lock").is_empty() {
            warn!("no eligible markets found, waiting for market refresh...");
        }

        let ws_handle = self.spawn_feed();

        self.main_loop().await;

        self.shutdown(ws_handle, tasks).await;
        Ok(())
    }

    fn spawn_feed(&self) -> tokio::task::JoinHandle<()> {
        let (msg_tx, mut msg_rx) = mpsc::channel::<Value>(1024);
        let mut session = WsSession::new(
            self.cfg.api.ws_url.clone(),
            self.cfg.websocket.clone(),
            msg_tx,
            self.shutdown_tx.subscribe(),
        );

        let token_ids: Vec<String> = {
            let markets = self.active_markets.lock().expect("markets lock");
            markets
                .values()
                .flat_map(|m| [m.yes_token_id.clone(), m.no_token_id.clone()])
                .collect()
        };
        session.subscribe_market(&token_ids);

        if let Some(creds) = self.client.api_creds() {
            session.subscribe_user(creds);
        }

        let dispatcher = self.dispatcher();
        tokio::spawn(async move {
            while let Some(message) = msg_rx.recv().await {
                dispatcher.dispatch(&message);
            }
            debug!("feed dispatcher stopped");
        });

        tokio::spawn(session.run())
    }

    // ─────────────────────────────────────────────────
    // Market discovery
    // ─────────────────────────────────────────────────

    /// Fetch the market listing and register eligible newcomers. Markets
    /// that disappear from the listing are retained in inventory but no
    /// longer quoted when their books go stale.
    async fn refresh_markets(&self) -> anyhow::Result<()> {
        info!("fetching markets...");
        let page = self.client.list_markets("").await?;
        info!("fetched {} markets", page.data.len());

        let mut eligible = 0usize;
        for raw in &page.data {
            let Some(market) = parse_market(raw) else {
                continue;
            };
            if !self.filter.is_eligible(&market) {
                continue;
            }
            eligible += 1;

            self.inventory.lock().expect("inventory lock").get_or_create(
                &market.condition_id,
                &market.yes_token_id,
                &market.no_token_id,
            );
            {
                let mut index = self.token_index.lock().expect("index lock");
                index.insert(market.yes_token_id.clone(), market.condition_id.clone());
                index.insert(market.no_token_id.clone(), market.condition_id.clone());
            }
            let mut markets = self.active_markets.lock().expect("markets lock");
            if markets
                .insert(market.condition_id.clone(), market.clone())
                .is_none()
            {
                info!("  + {}", truncate(&market.question, 60));
            }
        }

        info!("{} eligible markets", eligible);
        Ok(())
    }

    // ─────────────────────────────────────────────────
    // Trading loop
    // ─────────────────────────────────────────────────

    async fn main_loop(&self) {
        info!("starting main trading loop...");
        let mut shutdown = self.shutdown_tx.subscribe();
        let mut last_refresh = Instant::now();
        let cycle_interval = Duration::from_secs_f64(self.cfg.trading.quote_refresh_seconds);

        while !*shutdown.borrow() {
            let cycle_start = Instant::now();

            if last_refresh.elapsed() >= MARKET_REFRESH_INTERVAL {
                if let Err(e) = self.refresh_markets().await {
                    error!("market refresh failed: {e:#}");
                }
                last_refresh = Instant::now();
            }

            if let Err(e) = self.run_cycle().await {
                // Never crash the process on a cycle error.
                error!("error in trading cycle: {e:#}");
                tokio::time::sleep(Duration::from_secs(1)).await;
            }

            let sleep = cycle_interval.saturating_sub(cycle_start.elapsed());
            tokio::select! {
                _ = tokio::time::sleep(sleep) => {}
                _ = shutdown.changed() => {}
            }
        }
    }

    /// One cancel-replace cycle: cancel everything, regenerate quotes
    /// from fresh books and inventory, submit survivors in batches.
    async fn run_cycle(&self) -> anyhow::Result<()> {
        // Cancel-all must complete before any submit this cycle.
        if let Err(e) = self.client.cancel_all().await {
            warn!("failed to cancel orders: {e:#}");
        }
        self.pending_quotes.lock().expect("pending lock").clear();

        let markets: Vec<MarketInfo> = {
            let markets = self.active_markets.lock().expect("markets lock");
            markets.values().cloned().collect()
        };

        let mut batch = BatchQuoteBuilder::new(self.cfg.trading.batch_size);
        for market in &markets {
            let (snap, yes_qty, no_qty, total_spent) = {
                let inventory = self.inventory.lock().expect("inventory lock");
                (
                    inventory.snapshot(&market.condition_id),
                    inventory.yes_quantity(&market.condition_id),
                    inventory.no_quantity(&market.condition_id),
                    inventory.total_spent_all_markets(),
                )
            };

            let new_qty = self.cfg.trading.base_quote_size;
            let max_yes_bid = self.breakeven.max_bid(Outcome::Yes, new_qty, &snap);
            let max_no_bid = self.breakeven.max_bid(Outcome::No, new_qty, &snap);

            let (yes_book, no_book) = {
                let books = self.books.lock().expect("books lock");
                (
                    books.get(&market.yes_token_id).cloned(),
                    books.get(&market.no_token_id).cloned(),
                )
            };

            let quotes = self.quoter.generate_quotes(
                &market.yes_token_id,
                &market.no_token_id,
                yes_book.as_ref(),
                no_book.as_ref(),
                yes_qty,
                no_qty,
                max_yes_bid,
                max_no_bid,
            );

            for quote in quotes {
                let Some(quote) = self.quoter.adjust_size_for_position_limit(
                    quote,
                    total_spent,
                    self.cfg.trading.max_position_usdc,
                ) else {
                    continue;
                };
                if batch.is_full() {
                    self.submit_quotes(batch.take()).await;
                }
                batch.add(quote);
            }
        }

        if !batch.is_empty() {
            self.submit_quotes(batch.take()).await;
        }
        Ok(())
    }

    /// Submit one batch, recording returned order ids in the pending map.
    async fn submit_quotes(&self, quotes: Vec<Quote>) {
        if quotes.is_empty() {
            return;
        }

        let orders: Vec<_> = quotes.iter().map(|q| self.client.create_order(q)).collect();

        let ids = if orders.len() == 1 {
            match self.client.post_order(&orders[0], "GTC").await {
                Ok(id) => vec![id],
                Err(e) => {
                    warn!("failed to submit quote: {e:#}");
                    return;
                }
            }
        } else {
            match self.client.post_orders(&orders, "GTC").await {
                Ok(ids) => ids,
                Err(e) => {
                    warn!("failed to submit quotes: {e:#}");
                    return;
                }
            }
        };

        let submitted = quotes.len();
        let mut pending = self.pending_quotes.lock().expect("pending lock");
        for (mut quote, id) in quotes.into_iter().zip(ids) {
            if id.is_empty() {
                continue;
            }
            debug!("order placed: {} - {}", truncate(&id, 8), quote.outcome.as_str());
            quote.order_id = Some(id.clone());
            pending.insert(id, quote);
        }
        info!("submitted {submitted} quotes");
    }

    // ─────────────────────────────────────────────────
    // Shutdown
    // ─────────────────────────────────────────────────

    async fn shutdown(
        &self,
        ws_handle: tokio::task::JoinHandle<()>,
        tasks: Vec<tokio::task::JoinHandle<()>>,
    ) {
        info!("shutting down...");
        let _ = self.shutdown_tx.send(true);

        if let Err(e) = self.client.cancel_all().await {
            error!("error cancelling orders on shutdown: {e:#}");
        } else {
            info!("cancelled all open orders");
        }

        // Bounded feed teardown: a stuck socket is abandoned.
        if tokio::time::timeout(Duration::from_secs(5), ws_handle).await.is_err() {
            warn!("ws session did not stop in time, abandoning");
        }
        for task in tasks {
            let _ = tokio::time::timeout(Duration::from_secs(5), task).await;
        }

        if let Err(e) = self.state.save().await {
            error!("final state save failed: {e:#}");
        }

        info!("\n{}", self.rebates.lock().expect("rebates lock").summary());
        info!("shutdown complete");
    }
}

fn truncate(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

// ─────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PersistenceConfig;
    use crate::types::Side;
    use serde_json::json;

    fn paper_config() -> Config {
        let mut cfg = Config::default();
        cfg.paper_trading = true;
        cfg.dashboard_port = 0;
        cfg.persistence = PersistenceConfig {
            state_file: "unused.json".into(),
            save_interval_seconds: 5.0,
            enable_persistence: false,
        };
        cfg
    }

    fn market() -> MarketInfo {
        MarketInfo {
            condition_id: "cond-1".into(),
            question: "Will BTC be up in 15m?".into(),
            yes_token_id: "tok-yes".into(),
            no_token_id: "tok-no".into(),
            min_tick_size: 0.01,
            active: true,
            yes_price: 0.48,
            no_price: 0.52,
        }
    }

    fn bot_with_market() -> MarketMakingBot {
        let bot = MarketMakingBot::new(paper_config());
        let m = market();
        bot.inventory.lock().unwrap().get_or_create(
            &m.condition_id,
            &m.yes_token_id,
            &m.no_token_id,
        );
        bot.token_index
            .lock()
            .unwrap()
            .insert(m.yes_token_id.clone(), m.condition_id.clone());
        bot.token_index
            .lock()
            .unwrap()
            .insert(m.no_token_id.clone(), m.condition_id.clone());
        bot.active_markets
            .lock()
            .unwrap()
            .insert(m.condition_id.clone(), m);
        bot
    }

    fn seed_books(bot: &MarketMakingBot) {
        let mut books = bot.books.lock().unwrap();
        books.handle_message(&json!({
            "event_type": "book",
            "asset_id": "tok-yes",
            "bids": [{"price": "0.42", "size": "10"}],
            "asks": [{"price": "0.44", "size": "10"}]
        }));
        books.handle_message(&json!({
            "event_type": "book",
            "asset_id": "tok-no",
            "bids": [{"price": "0.55", "size": "10"}],
            "asks": [{"price": "0.57", "size": "10"}]
        }));
    }

    #[tokio::test]
    async fn test_cycle_places_quotes_on_both_sides() {
        let bot = bot_with_market();
        seed_books(&bot);

        bot.run_cycle().await.unwrap();

        let pending = bot.pending_quotes.lock().unwrap();
        assert_eq!(pending.len(), 2);
        let prices: Vec<f64> = pending.values().map(|q| q.price).collect();
        // One tick behind each best bid
        assert!(prices.iter().any(|p| (p - 0.41).abs() < 1e-9));
        assert!(prices.iter().any(|p| (p - 0.54).abs() < 1e-9));
        assert!(pending.values().all(|q| q.side == Side::Buy));
        assert!(pending.values().all(|q| q.is_active()));
    }

    #[tokio::test]
    async fn test_cycle_without_books_places_nothing() {
        let bot = bot_with_market();
        bot.run_cycle().await.unwrap();
        assert!(bot.pending_quotes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cycle_clears_previous_pending() {
        let bot = bot_with_market();
        bot.pending_quotes.lock().unwrap().insert(
            "stale".into(),
            Quote {
                token_id: "tok-yes".into(),
                outcome: Outcome::Yes,
                side: Side::Buy,
                price: 0.4,
                size: 5.0,
                order_id: Some("stale".into()),
            },
        );

        bot.run_cycle().await.unwrap();
        assert!(!bot.pending_quotes.lock().unwrap().contains_key("stale"));
    }

    #[tokio::test]
    async fn test_fill_dispatch_updates_inventory_and_state() {
        let bot = bot_with_market();
        bot.pending_quotes.lock().unwrap().insert(
            "ord-1".into(),
            Quote {
                token_id: "tok-yes".into(),
                outcome: Outcome::Yes,
                side: Side::Buy,
                price: 0.41,
                size: 5.0,
                order_id: Some("ord-1".into()),
            },
        );

        let dispatcher = bot.dispatcher();
        dispatcher.dispatch(&json!({
            "event_type": "fill",
            "order_id": "ord-1",
            "size": "5",
            "price": "0.41"
        }));

        assert!((bot.inventory.lock().unwrap().yes_quantity("cond-1") - 5.0).abs() < 1e-9);
        let state = bot.state.snapshot();
        assert_eq!(state.fills.len(), 1);
        assert!((state.total_maker_volume - 2.05).abs() < 1e-9);
        assert!(state.total_rebates_estimate > 0.0);
        assert_eq!(state.positions.len(), 1);
        assert!((bot.rebates.lock().unwrap().total_volume() - 2.05).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_unmatched_fill_ignored() {
        let bot = bot_with_market();
        let dispatcher = bot.dispatcher();
        dispatcher.dispatch(&json!({
            "event_type": "fill",
            "order_id": "ghost",
            "size": "5",
            "price": "0.41"
        }));
        assert_eq!(bot.inventory.lock().unwrap().yes_quantity("cond-1"), 0.0);
        assert!(bot.state.snapshot().fills.is_empty());
    }

    #[tokio::test]
    async fn test_zero_size_fill_ignored() {
        let bot = bot_with_market();
        bot.pending_quotes.lock().unwrap().insert(
            "ord-1".into(),
            Quote {
                token_id: "tok-yes".into(),
                outcome: Outcome::Yes,
                side: Side::Buy,
                price: 0.41,
                size: 5.0,
                order_id: Some("ord-1".into()),
            },
        );
        let dispatcher = bot.dispatcher();
        dispatcher.dispatch(&json!({
            "event_type": "fill",
            "order_id": "ord-1",
            "size": "0",
            "price": "0.41"
        }));
        assert!(bot.state.snapshot().fills.is_empty());
    }

    #[tokio::test]
    async fn test_dispatch_routes_book_messages_and_batches() {
        let bot = bot_with_market();
        let dispatcher = bot.dispatcher();
        dispatcher.dispatch(&json!([
            {
                "event_type": "book",
                "asset_id": "tok-yes",
                "bids": [{"price": "0.42", "size": "10"}],
                "asks": []
            },
            {
                "event_type": "price_change",
                "asset_id": "tok-yes",
                "changes": [{"side": "BUY", "price": "0.43", "size": "1"}]
            }
        ]));
        assert_eq!(bot.books.lock().unwrap().best_bid("tok-yes"), Some(0.43));
    }

    #[tokio::test]
    async fn test_taker_fill_recorded_with_warning() {
        let bot = bot_with_market();
        bot.pending_quotes.lock().unwrap().insert(
            "ord-1".into(),
            Quote {
                token_id: "tok-no".into(),
                outcome: Outcome::No,
                side: Side::Buy,
                price: 0.54,
                size: 5.0,
                order_id: Some("ord-1".into()),
            },
        );
        let dispatcher = bot.dispatcher();
        dispatcher.dispatch(&json!({
            "event_type": "fill",
            "order_id": "ord-1",
            "size": "5",
            "price": "0.54",
            "maker": false
        }));

        // Recorded, but earns no rebate
        assert!((bot.inventory.lock().unwrap().no_quantity("cond-1") - 5.0).abs() < 1e-9);
        assert_eq!(bot.state.snapshot().fills.len(), 1);
        assert_eq!(bot.rebates.lock().unwrap().total_rebates(), 0.0);
    }

    #[tokio::test]
    async fn test_position_limit_respected_across_cycle() {
        let bot = bot_with_market();
        seed_books(&bot);
        // Exhaust the global cap
        {
            let mut inventory = bot.inventory.lock().unwrap();
            let fill = Fill {
                order_id: "pre".into(),
                token_id: "tok-yes".into(),
                outcome: Outcome::Yes,
                side: Side::Buy,
                price: 0.50,
                size: 200.0,
                timestamp: Utc::now(),
                maker: true,
            };
            inventory.record_fill("cond-1", &fill);
        }

        bot.run_cycle().await.unwrap();
        assert!(bot.pending_quotes.lock().unwrap().is_empty());
    }
}
