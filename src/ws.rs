//! WebSocket session — single auto-reconnecting connection to the feed.
//!
//! Lifecycle: DISCONNECTED → CONNECTING → OPEN → (CLOSING | FAILED) →
//! WAITING → CONNECTING … Subscriptions are remembered and replayed on
//! every (re)connect. Reconnects back off exponentially (base 1s, ×2,
//! capped at 30s) and a successful open resets the delay.
//!
//! Every inbound frame is parsed as JSON and forwarded to the message
//! channel; a malformed frame is logged and skipped, never fatal.

use std::time::{Duration, Instant};

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use crate::config::WebSocketConfig;
use crate::exchange::ApiCreds;

// ─────────────────────────────────────────────────────────
// Backoff
// ─────────────────────────────────────────────────────────

/// Exponential reconnect delay: base × multiplier per failure, capped.
#[derive(Debug, Clone)]
pub struct Backoff {
    delay: f64,
    base: f64,
    multiplier: f64,
    max: f64,
}

impl Backoff {
    pub fn new(base: f64, multiplier: f64, max: f64) -> Self {
        Self {
            delay: base,
            base,
            multiplier,
            max,
        }
    }

    /// Current delay, advancing the schedule for the next failure.
    pub fn next_delay(&mut self) -> Duration {
        let current = self.delay;
        self.delay = (self.delay * self.multiplier).min(self.max);
        Duration::from_secs_f64(current)
    }

    pub fn reset(&mut self) {
        self.delay = self.base;
    }
}

// ─────────────────────────────────────────────────────────
// Session
// ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Open,
    Waiting,
    Closing,
    Failed,
}

enum SessionEnd {
    /// External disconnect — terminal.
    Shutdown,
    /// Socket close, I/O error, or connect failure — retry after backoff.
    Failed,
}

pub struct WsSession {
    url: String,
    cfg: WebSocketConfig,
    subscriptions: Vec<Value>,
    msg_tx: mpsc::Sender<Value>,
    shutdown: watch::Receiver<bool>,
    state: SessionState,
}

impl WsSession {
    pub fn new(
        url: impl Into<String>,
        cfg: WebSocketConfig,
        msg_tx: mpsc::Sender<Value>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            url: url.into(),
            cfg,
            subscriptions: Vec::new(),
            msg_tx,
            shutdown,
            state: SessionState::Disconnected,
        }
    }

    /// Register a market-channel subscription (unauthenticated). Replayed
    /// on every connect.
    pub fn subscribe_market(&mut self, token_ids: &[String]) {
        if token_ids.is_empty() {
            return;
        }
        self.subscriptions.push(json!({
            "type": "subscribe",
            "channel": "market",
            "assets_ids": token_ids,
        }));
        info!("subscribed market channel for {} tokens", token_ids.len());
    }

    /// Register the authenticated user-channel subscription. All three
    /// credentials are required.
    pub fn subscribe_user(&mut self, creds: &ApiCreds) {
        if creds.api_key.is_empty() || creds.secret.is_empty() || creds.passphrase.is_empty() {
            warn!("cannot subscribe to user channel: missing credentials");
            return;
        }
        self.subscriptions.push(json!({
            "type": "subscribe",
            "channel": "user",
            "auth": {
                "apiKey": creds.api_key,
                "secret": creds.secret,
                "passphrase": creds.passphrase,
            },
        }));
        info!("subscribed user channel");
    }

    fn set_state(&mut self, next: SessionState) {
        if self.state != next {
            debug!("ws state {:?} -> {:?}", self.state, next);
            self.state = next;
        }
    }

    /// Session main loop. Runs until the shutdown signal flips.
    pub async fn run(mut self) {
        let mut backoff = Backoff::new(
            self.cfg.reconnect_base_delay,
            self.cfg.reconnect_multiplier,
            self.cfg.reconnect_max_delay,
        );
        let mut shutdown = self.shutdown.clone();

        loop {
            if *shutdown.borrow() {
                break;
            }

            self.set_state(SessionState::Connecting);
            match self.connect_and_listen(&mut backoff, &mut shutdown).await {
                SessionEnd::Shutdown => {
                    self.set_state(SessionState::Closing);
                    break;
                }
                SessionEnd::Failed => {
                    self.set_state(SessionState::Failed);
                    warn!("📡 feed disconnected");
                }
            }

            self.set_state(SessionState::Waiting);
            let delay = backoff.next_delay();
            info!("🔄 reconnecting in {:.1}s...", delay.as_secs_f64());
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        self.set_state(SessionState::Disconnected);
        info!("📡 ws session stopped");
    }

    async fn connect_and_listen(
        &mut self,
        backoff: &mut Backoff,
        shutdown: &mut watch::Receiver<bool>,
    ) -> SessionEnd {
        info!("📡 connecting {}", self.url);

        let connect = tokio::time::timeout(
            Duration::from_secs_f64(self.cfg.connection_timeout),
            connect_async(&self.url),
        )
        .await;

        let ws = match connect {
            Ok(Ok((ws, response))) => {
                info!("✅ ws connected (status={:?})", response.status());
                ws
            }
            Ok(Err(e)) => {
                warn!("ws connect error: {e:?}");
                return SessionEnd::Failed;
            }
            Err(_) => {
                warn!("⏱️ ws connection timeout");
                return SessionEnd::Failed;
            }
        };

        self.set_state(SessionState::Open);
        backoff.reset();

        let (mut write, mut read) = ws.split();

        // Replay all remembered subscriptions before reading.
        for sub in &self.subscriptions {
            if let Err(e) = write.send(Message::Text(sub.to_string())).await {
                warn!("subscription replay failed: {e:?}");
                return SessionEnd::Failed;
            }
            debug!(
                "resubscribed {} channel",
                sub.get("channel").and_then(|v| v.as_str()).unwrap_or("?")
            );
        }

        let heartbeat = Duration::from_secs_f64(self.cfg.heartbeat_interval);
        let mut ping_timer = tokio::time::interval(heartbeat);
        ping_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        ping_timer.tick().await; // first tick fires immediately
        let mut last_message = Instant::now();

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        let _ = write.send(Message::Close(None)).await;
                        return SessionEnd::Shutdown;
                    }
                }
                _ = ping_timer.tick() => {
                    // Staleness check rides the same cadence as the
                    // transport ping; the pong timeout belongs to the
                    // transport layer.
                    let silence = last_message.elapsed();
                    if silence > heartbeat * 2 {
                        warn!(
                            "no messages for {:.0}s, connection may be stale",
                            silence.as_secs_f64()
                        );
                    }
                    if write.send(Message::Ping(Vec::new())).await.is_err() {
                        return SessionEnd::Failed;
                    }
                }
                frame = read.next() => {
                    match frame {
                        Some(Ok(Message::Text(text))) => {
                            if let Some(value) = parse_frame(&text) {
                                last_message = Instant::now();
                                if self.msg_tx.send(value).await.is_err() {
                                    // Receiver gone — the bot is shutting down.
                                    return SessionEnd::Shutdown;
                                }
                            }
                        }
                        Some(Ok(Message::Ping(payload))) => {
                            let _ = write.send(Message::Pong(payload)).await;
                        }
                        Some(Ok(Message::Close(_))) => {
                            warn!("ws closed by server");
                            return SessionEnd::Failed;
                        }
                        Some(Err(e)) => {
                            warn!("ws read error: {e:?}");
                            return SessionEnd::Failed;
                        }
                        None => return SessionEnd::Failed,
                        _ => {}
                    }
                }
            }
        }
    }
}

/// Parse one frame. Failures are logged and skipped, never fatal.
fn parse_frame(text: &str) -> Option<Value> {
    match serde_json::from_str::<Value>(text) {
        Ok(v) => Some(v),
        Err(_) => {
            let head: String = text.chars().take(100).collect();
            warn!("failed to parse ws frame: {head}");
            None
        }
    }
}

// ─────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_sequence_and_cap() {
        let mut b = Backoff::new(1.0, 2.0, 30.0);
        let delays: Vec<f64> = (0..7).map(|_| b.next_delay().as_secs_f64()).collect();
        assert_eq!(delays, vec![1.0, 2.0, 4.0, 8.0, 16.0, 30.0, 30.0]);
    }

    #[test]
    fn test_backoff_reset_on_success() {
        let mut b = Backoff::new(1.0, 2.0, 30.0);
        b.next_delay();
        b.next_delay();
        b.reset();
        assert!((b.next_delay().as_secs_f64() - 1.0).abs() < 1e-12);
    }

    fn session() -> WsSession {
        let (tx, _rx) = mpsc::channel(8);
        let (_stx, srx) = watch::channel(false);
        WsSession::new("wss://example/ws", WebSocketConfig::default(), tx, srx)
    }

    #[test]
    fn test_market_subscription_payload() {
        let mut s = session();
        s.subscribe_market(&["tok-1".into(), "tok-2".into()]);
        assert_eq!(s.subscriptions.len(), 1);
        let sub = &s.subscriptions[0];
        assert_eq!(sub["type"], "subscribe");
        assert_eq!(sub["channel"], "market");
        assert_eq!(sub["assets_ids"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_empty_market_subscription_ignored() {
        let mut s = session();
        s.subscribe_market(&[]);
        assert!(s.subscriptions.is_empty());
    }

    #[test]
    fn test_user_subscription_requires_all_creds() {
        let mut s = session();
        s.subscribe_user(&ApiCreds {
            api_key: "k".into(),
            secret: String::new(),
            passphrase: "p".into(),
        });
        assert!(s.subscriptions.is_empty());

        s.subscribe_user(&ApiCreds {
            api_key: "k".into(),
            secret: "s".into(),
            passphrase: "p".into(),
        });
        assert_eq!(s.subscriptions.len(), 1);
        assert_eq!(s.subscriptions[0]["channel"], "user");
        assert_eq!(s.subscriptions[0]["auth"]["apiKey"], "k");
    }

    #[test]
    fn test_parse_frame_skips_garbage() {
        assert!(parse_frame("{not json").is_none());
        let v = parse_frame(r#"{"event_type":"book"}"#).unwrap();
        assert_eq!(v["event_type"], "book");
    }
}
