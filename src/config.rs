//! Configuration, loaded from environment variables (with `.env` support
//! in the binary). Every section has sane defaults; `from_env` applies
//! overrides on top.

use anyhow::{bail, Context};

// ─────────────────────────────────────────────────────────
// API endpoints + credentials
// ─────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// CLOB REST base URL.
    pub rest_url: String,
    /// Market-data WebSocket URL.
    pub ws_url: String,
    /// Funder / signer address sent in auth headers.
    pub address: String,
    /// L2 API credentials. Derived from the REST endpoint when absent.
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    pub api_passphrase: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            rest_url: "https://clob.polymarket.com".into(),
            ws_url: "wss://ws-subscriptions-clob.polymarket.com/ws/market".into(),
            address: String::new(),
            api_key: None,
            api_secret: None,
            api_passphrase: None,
        }
    }
}

impl ApiConfig {
    pub fn from_env() -> Self {
        let mut c = Self::default();
        if let Ok(v) = std::env::var("POLYMARKET_REST_URL") {
            c.rest_url = v;
        }
        if let Ok(v) = std::env::var("POLYMARKET_WS_URL") {
            c.ws_url = v;
        }
        if let Ok(v) = std::env::var("POLYMARKET_FUNDER_ADDRESS") {
            c.address = v;
        }
        c.api_key = std::env::var("POLYMARKET_API_KEY").ok();
        c.api_secret = std::env::var("POLYMARKET_API_SECRET").ok();
        c.api_passphrase = std::env::var("POLYMARKET_API_PASSPHRASE").ok();
        c
    }

    pub fn has_creds(&self) -> bool {
        self.api_key.is_some() && self.api_secret.is_some() && self.api_passphrase.is_some()
    }
}

// ─────────────────────────────────────────────────────────
// Trading parameters
// ─────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct TradingConfig {
    /// Uppercase asset symbols the market filter accepts.
    pub target_assets: Vec<String>,
    /// Timeframes the market filter accepts, e.g. "15m", "1h".
    pub target_timeframes: Vec<String>,

    /// Quoting band. Quotes priced outside are skipped.
    pub min_price: f64,
    pub max_price: f64,

    /// Global USDC spend cap across all markets.
    pub max_position_usdc: f64,
    /// Per-market cap. Parsed but not consulted by the quote pipeline.
    pub max_position_per_market: f64,

    pub tick_size: f64,
    pub base_quote_size: f64,

    /// YES+NO average-cost ceiling and the buffer subtracted from it.
    pub breakeven_target: f64,
    pub safety_margin: f64,

    /// Skew ratio past which quoting tilts.
    pub skew_threshold: f64,

    pub quote_refresh_seconds: f64,
    pub batch_size: usize,

    /// Maker rebate rate in basis points.
    pub rebate_rate_bps: f64,
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            target_assets: vec!["BTC".into(), "ETH".into(), "SOL".into()],
            target_timeframes: vec!["15m".into(), "1h".into()],
            min_price: 0.20,
            max_price: 0.80,
            max_position_usdc: 100.0,
            max_position_per_market: 50.0,
            tick_size: 0.01,
            base_quote_size: 5.0,
            breakeven_target: 0.99,
            safety_margin: 0.005,
            skew_threshold: 1.2,
            quote_refresh_seconds: 0.5,
            batch_size: 10,
            rebate_rate_bps: 10.0,
        }
    }
}

impl TradingConfig {
    pub fn from_env() -> Self {
        let mut c = Self::default();
        if let Ok(v) = std::env::var("PM_TARGET_ASSETS") {
            c.target_assets = split_list(&v);
        }
        if let Ok(v) = std::env::var("PM_TARGET_TIMEFRAMES") {
            c.target_timeframes = split_list(&v);
        }
        env_f64("PM_MIN_PRICE", &mut c.min_price);
        env_f64("PM_MAX_PRICE", &mut c.max_price);
        env_f64("MAX_POSITION_USDC", &mut c.max_position_usdc);
        env_f64("MAX_POSITION_PER_MARKET", &mut c.max_position_per_market);
        env_f64("PM_TICK_SIZE", &mut c.tick_size);
        env_f64("PM_BASE_QUOTE_SIZE", &mut c.base_quote_size);
        env_f64("PM_BREAKEVEN_TARGET", &mut c.breakeven_target);
        env_f64("PM_SAFETY_MARGIN", &mut c.safety_margin);
        env_f64("PM_SKEW_THRESHOLD", &mut c.skew_threshold);
        env_f64("PM_QUOTE_REFRESH_SECONDS", &mut c.quote_refresh_seconds);
        env_f64("PM_REBATE_RATE_BPS", &mut c.rebate_rate_bps);
        if let Ok(v) = std::env::var("PM_BATCH_SIZE") {
            if let Ok(n) = v.parse() {
                c.batch_size = n;
            }
        }
        c
    }
}

// ─────────────────────────────────────────────────────────
// WebSocket
// ─────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct WebSocketConfig {
    pub reconnect_base_delay: f64,
    pub reconnect_max_delay: f64,
    pub reconnect_multiplier: f64,
    pub heartbeat_interval: f64,
    pub connection_timeout: f64,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            reconnect_base_delay: 1.0,
            reconnect_max_delay: 30.0,
            reconnect_multiplier: 2.0,
            heartbeat_interval: 30.0,
            connection_timeout: 10.0,
        }
    }
}

impl WebSocketConfig {
    pub fn from_env() -> Self {
        let mut c = Self::default();
        env_f64("PM_WS_RECONNECT_BASE_DELAY", &mut c.reconnect_base_delay);
        env_f64("PM_WS_RECONNECT_MAX_DELAY", &mut c.reconnect_max_delay);
        env_f64("PM_WS_RECONNECT_MULTIPLIER", &mut c.reconnect_multiplier);
        env_f64("PM_WS_HEARTBEAT_INTERVAL", &mut c.heartbeat_interval);
        env_f64("PM_WS_CONNECTION_TIMEOUT", &mut c.connection_timeout);
        c
    }
}

// ─────────────────────────────────────────────────────────
// Persistence
// ─────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct PersistenceConfig {
    pub state_file: String,
    pub save_interval_seconds: f64,
    pub enable_persistence: bool,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            state_file: "state.json".into(),
            save_interval_seconds: 5.0,
            enable_persistence: true,
        }
    }
}

impl PersistenceConfig {
    pub fn from_env() -> Self {
        let mut c = Self::default();
        if let Ok(v) = std::env::var("STATE_FILE") {
            c.state_file = v;
        }
        env_f64("PM_SAVE_INTERVAL_SECONDS", &mut c.save_interval_seconds);
        if let Ok(v) = std::env::var("PM_ENABLE_PERSISTENCE") {
            c.enable_persistence = truthy(&v);
        }
        c
    }
}

// ─────────────────────────────────────────────────────────
// Root config
// ─────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Config {
    pub api: ApiConfig,
    pub trading: TradingConfig,
    pub websocket: WebSocketConfig,
    pub persistence: PersistenceConfig,
    /// Orders are logged but never submitted; credentials not required.
    pub paper_trading: bool,
    /// Dashboard bind port. 0 disables the dashboard.
    pub dashboard_port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            trading: TradingConfig::default(),
            websocket: WebSocketConfig::default(),
            persistence: PersistenceConfig::default(),
            paper_trading: false,
            dashboard_port: 8080,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let mut c = Self {
            api: ApiConfig::from_env(),
            trading: TradingConfig::from_env(),
            websocket: WebSocketConfig::from_env(),
            persistence: PersistenceConfig::from_env(),
            paper_trading: false,
            dashboard_port: 8080,
        };
        if let Ok(v) = std::env::var("PAPER_TRADING_MODE") {
            c.paper_trading = truthy(&v);
        }
        if let Ok(v) = std::env::var("PM_DASHBOARD_PORT") {
            if let Ok(p) = v.parse() {
                c.dashboard_port = p;
            }
        }
        c
    }

    /// Configuration errors abort at startup; everything else is
    /// survivable at runtime.
    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.paper_trading && self.api.address.is_empty() {
            // API key/secret/passphrase may still be derived at startup;
            // the address cannot.
            bail!("POLYMARKET_FUNDER_ADDRESS is required unless PAPER_TRADING_MODE=true");
        }
        if self.trading.min_price >= self.trading.max_price {
            bail!(
                "invalid quoting band: min_price {} >= max_price {}",
                self.trading.min_price,
                self.trading.max_price
            );
        }
        if self.trading.tick_size <= 0.0 {
            bail!("tick_size must be positive");
        }
        url::Url::parse(&self.api.ws_url).context("invalid POLYMARKET_WS_URL")?;
        url::Url::parse(&self.api.rest_url).context("invalid POLYMARKET_REST_URL")?;
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────

fn env_f64(key: &str, slot: &mut f64) {
    if let Ok(v) = std::env::var(key) {
        if let Ok(f) = v.parse() {
            *slot = f;
        }
    }
}

fn truthy(v: &str) -> bool {
    v == "1" || v.eq_ignore_ascii_case("true")
}

fn split_list(v: &str) -> Vec<String> {
    v.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
