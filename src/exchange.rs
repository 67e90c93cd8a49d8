//! CLOB exchange client — market discovery and order REST calls with
//! L2 (HMAC-SHA256) request signing.
//!
//! Every order goes out post-only GTC. In paper mode nothing leaves the
//! process: submissions are logged and answered with synthetic ids, so
//! the rest of the bot runs unchanged.
//!
//! The bot treats every call here as transient-failable — errors are
//! logged by the caller and the next cycle is the retry.

use anyhow::{bail, Context};
use base64::engine::general_purpose::{STANDARD as BASE64_STANDARD, URL_SAFE as BASE64_URL_SAFE};
use base64::Engine;
use chrono::Utc;
use hmac::{Hmac, Mac};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::Sha256;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::ApiConfig;
use crate::orderbook::parse_f64_field;
use crate::types::{MarketInfo, Quote};

type HmacSha256 = Hmac<Sha256>;

// ─────────────────────────────────────────────────────────
// Credentials + L2 signing
// ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiCreds {
    pub api_key: String,
    /// Base64-encoded HMAC secret.
    pub secret: String,
    pub passphrase: String,
}

/// Signature over `{timestamp}{method}{path}{body}` with the
/// base64-decoded secret, URL-safe base64 output.
fn compute_hmac(secret: &str, timestamp: &str, method: &str, path: &str, body: &str) -> anyhow::Result<String> {
    let secret_bytes = BASE64_URL_SAFE
        .decode(secret)
        .or_else(|_| BASE64_STANDARD.decode(secret))
        .context("invalid base64 api secret")?;

    let mut message = format!("{timestamp}{method}{path}");
    if !body.is_empty() {
        message.push_str(body);
    }

    let mut mac = HmacSha256::new_from_slice(&secret_bytes).context("invalid hmac key length")?;
    mac.update(message.as_bytes());
    Ok(BASE64_URL_SAFE.encode(mac.finalize().into_bytes()))
}

// ─────────────────────────────────────────────────────────
// Wire types
// ─────────────────────────────────────────────────────────

/// One page of the market listing.
#[derive(Debug, Default, Deserialize)]
pub struct MarketsPage {
    #[serde(default)]
    pub data: Vec<Value>,
    #[serde(default)]
    pub next_cursor: String,
}

/// Order ready for submission. `create_order` builds it, `post_order`
/// ships it.
#[derive(Debug, Clone, Serialize)]
pub struct SignedOrder {
    #[serde(rename = "tokenId")]
    pub token_id: String,
    pub price: f64,
    pub size: f64,
    pub side: String,
    pub salt: u64,
    #[serde(rename = "clientId")]
    pub client_id: String,
    pub owner: String,
}

#[derive(Debug, Clone, Serialize)]
struct PostOrderRequest<'a> {
    order: &'a SignedOrder,
    #[serde(rename = "orderType")]
    order_type: &'a str,
    #[serde(rename = "postOnly")]
    post_only: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderResponse {
    #[serde(rename = "orderID", alias = "order_id", default)]
    pub order_id: String,
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub error_msg: Option<String>,
}

// ─────────────────────────────────────────────────────────
// Client
// ─────────────────────────────────────────────────────────

pub struct ClobClient {
    http: reqwest::Client,
    rest_url: String,
    address: String,
    creds: Option<ApiCreds>,
    paper: bool,
}

impl ClobClient {
    pub fn new(api: &ApiConfig, paper: bool) -> Self {
        let creds = match (&api.api_key, &api.api_secret, &api.api_passphrase) {
            (Some(k), Some(s), Some(p)) => Some(ApiCreds {
                api_key: k.clone(),
                secret: s.clone(),
                passphrase: p.clone(),
            }),
            _ => None,
        };
        Self {
            http: reqwest::Client::new(),
            rest_url: api.rest_url.trim_end_matches('/').to_string(),
            address: api.address.clone(),
            creds,
            paper,
        }
    }

    pub fn is_paper(&self) -> bool {
        self.paper
    }

    pub fn api_creds(&self) -> Option<&ApiCreds> {
        self.creds.as_ref()
    }

    /// Ensure L2 credentials exist: env-provided ones win, otherwise
    /// derive from the REST endpoint. Missing credentials in live mode
    /// is a configuration error — abort at startup.
    pub async fn ensure_creds(&mut self) -> anyhow::Result<()> {
        if self.paper {
            return Ok(());
        }
        if self.creds.is_some() {
            info!("🔑 using API credentials from environment");
            return Ok(());
        }
        let creds = self.derive_api_creds().await.context(
            "no API credentials and derivation failed; set POLYMARKET_API_KEY / \
             POLYMARKET_API_SECRET / POLYMARKET_API_PASSPHRASE or PAPER_TRADING_MODE=true",
        )?;
        info!(
            "🔑 derived L2 API key {}...",
            &creds.api_key[..8.min(creds.api_key.len())]
        );
        self.creds = Some(creds);
        Ok(())
    }

    /// `GET /auth/derive-api-key` — create-or-derive the L2 credentials
    /// for this address.
    pub async fn derive_api_creds(&self) -> anyhow::Result<ApiCreds> {
        let url = format!("{}/auth/derive-api-key", self.rest_url);
        let resp = self
            .http
            .get(&url)
            .header("POLY_ADDRESS", &self.address)
            .send()
            .await
            .context("derive-api-key request")?;
        if !resp.status().is_success() {
            bail!("derive-api-key returned status {}", resp.status());
        }
        resp.json::<ApiCreds>().await.context("parse derive-api-key response")
    }

    fn l2_headers(
        &self,
        method: &str,
        path: &str,
        body: &str,
    ) -> anyhow::Result<Vec<(&'static str, String)>> {
        let creds = self
            .creds
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("no API credentials"))?;
        let timestamp = Utc::now().timestamp().to_string();
        let signature = compute_hmac(&creds.secret, &timestamp, method, path, body)?;
        Ok(vec![
            ("POLY_ADDRESS", self.address.clone()),
            ("POLY_SIGNATURE", signature),
            ("POLY_TIMESTAMP", timestamp),
            ("POLY_API_KEY", creds.api_key.clone()),
            ("POLY_PASSPHRASE", creds.passphrase.clone()),
        ])
    }

    // ─────────────────────────────────────────────────
    // Market discovery
    // ─────────────────────────────────────────────────

    /// One page of `GET /markets`. Unauthenticated.
    pub async fn list_markets(&self, cursor: &str) -> anyhow::Result<MarketsPage> {
        let url = format!("{}/markets?next_cursor={}", self.rest_url, cursor);
        let resp = self.http.get(&url).send().await.context("list markets")?;
        if !resp.status().is_success() {
            bail!("markets endpoint returned status {}", resp.status());
        }
        resp.json::<MarketsPage>().await.context("parse markets page")
    }

    // ─────────────────────────────────────────────────
    // Orders
    // ─────────────────────────────────────────────────

    /// Build the order payload for a quote.
    pub fn create_order(&self, quote: &Quote) -> SignedOrder {
        SignedOrder {
            token_id: quote.token_id.clone(),
            price: quote.price,
            size: quote.size,
            side: quote.side.as_str().to_string(),
            salt: rand::thread_rng().gen(),
            client_id: Uuid::new_v4().to_string(),
            owner: self.address.clone(),
        }
    }

    /// `POST /order` — submit one post-only GTC order, returning the
    /// exchange order id.
    pub async fn post_order(&self, order: &SignedOrder, order_type: &str) -> anyhow::Result<String> {
        if self.paper {
            let fake_id = format!("paper-{}", Uuid::new_v4());
            info!(
                "📝 [PAPER] would place {} {:.2}@{:.4} ({})",
                order.side, order.size, order.price, fake_id
            );
            return Ok(fake_id);
        }

        let request = PostOrderRequest {
            order,
            order_type,
            post_only: true,
        };
        let body = serde_json::to_string(&request).context("serialize order")?;
        let path = "/order";
        let headers = self.l2_headers("POST", path, &body)?;

        let mut req = self
            .http
            .post(format!("{}{}", self.rest_url, path))
            .header("Content-Type", "application/json")
            .body(body);
        for (k, v) in headers {
            req = req.header(k, v);
        }

        let resp = req.send().await.context("post order")?;
        let status = resp.status();
        let parsed: OrderResponse = resp.json().await.context("parse order response")?;

        if !status.is_success() || !parsed.success {
            bail!(
                "post_order rejected: status={} error={}",
                status,
                parsed.error_msg.unwrap_or_default()
            );
        }
        Ok(parsed.order_id)
    }

    /// `POST /orders` — batch submit; falls back to nothing clever, the
    /// caller handles per-order errors by skipping.
    pub async fn post_orders(
        &self,
        orders: &[SignedOrder],
        order_type: &str,
    ) -> anyhow::Result<Vec<String>> {
        if self.paper {
            let mut ids = Vec::with_capacity(orders.len());
            for order in orders {
                ids.push(self.post_order(order, order_type).await?);
            }
            return Ok(ids);
        }

        let requests: Vec<PostOrderRequest> = orders
            .iter()
            .map(|order| PostOrderRequest {
                order,
                order_type,
                post_only: true,
            })
            .collect();
        let body = serde_json::to_string(&requests).context("serialize order batch")?;
        let path = "/orders";
        let headers = self.l2_headers("POST", path, &body)?;

        let mut req = self
            .http
            .post(format!("{}{}", self.rest_url, path))
            .header("Content-Type", "application/json")
            .body(body);
        for (k, v) in headers {
            req = req.header(k, v);
        }

        let resp = req.send().await.context("post order batch")?;
        if !resp.status().is_success() {
            bail!("batch order endpoint returned status {}", resp.status());
        }
        let parsed: Vec<OrderResponse> = resp.json().await.context("parse batch response")?;

        let mut ids = Vec::with_capacity(parsed.len());
        for r in parsed {
            if r.success {
                ids.push(r.order_id);
            } else {
                warn!("order in batch rejected: {}", r.error_msg.unwrap_or_default());
                ids.push(String::new());
            }
        }
        Ok(ids)
    }

    /// `DELETE /cancel-all` — cancel every open order for this account.
    pub async fn cancel_all(&self) -> anyhow::Result<()> {
        if self.paper {
            return Ok(());
        }

        let path = "/cancel-all";
        let headers = self.l2_headers("DELETE", path, "")?;
        let mut req = self.http.delete(format!("{}{}", self.rest_url, path));
        for (k, v) in headers {
            req = req.header(k, v);
        }

        let resp = req.send().await.context("cancel all")?;
        if !resp.status().is_success() {
            bail!("cancel-all returned status {}", resp.status());
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────
// Discovery payload parsing
// ─────────────────────────────────────────────────────────

/// Parse one raw market object from the listing. Markets that are
/// inactive, closed, or missing either outcome token are dropped.
pub fn parse_market(raw: &Value) -> Option<MarketInfo> {
    if !raw.get("active").and_then(|v| v.as_bool()).unwrap_or(false) {
        return None;
    }
    if raw.get("closed").and_then(|v| v.as_bool()).unwrap_or(false) {
        return None;
    }

    let tokens = raw.get("tokens").and_then(|v| v.as_array())?;
    if tokens.len() < 2 {
        return None;
    }

    let find_token = |label: &str| {
        tokens
            .iter()
            .find(|t| t.get("outcome").and_then(|v| v.as_str()) == Some(label))
    };
    let yes = find_token("Yes")?;
    let no = find_token("No")?;

    let token_id = |t: &Value| {
        t.get("token_id")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .filter(|s| !s.is_empty())
    };

    Some(MarketInfo {
        condition_id: raw
            .get("condition_id")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string(),
        question: raw
            .get("question")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string(),
        yes_token_id: token_id(yes)?,
        no_token_id: token_id(no)?,
        min_tick_size: parse_f64_field(raw, "minimum_tick_size").unwrap_or(0.01),
        active: true,
        yes_price: parse_f64_field(yes, "price").unwrap_or(0.0),
        no_price: parse_f64_field(no, "price").unwrap_or(0.0),
    })
}

// ─────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────
