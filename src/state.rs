//! Durable state — a single JSON document written atomically
//! (temp file + rename) and refreshed by a background task.
//!
//! Readers take the in-memory state without coordination; only the save
//! path is serialized, and it snapshots under the lock before touching
//! disk. A corrupted file on load is renamed `.bak` and the bot starts
//! clean. Open orders are never restored from disk.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use tokio::sync::{watch, Mutex as AsyncMutex};
use tracing::{debug, error, info, warn};

use crate::config::PersistenceConfig;
use crate::types::{BotState, Fill, MarketPosition};

pub struct StateManager {
    cfg: PersistenceConfig,
    state_file: PathBuf,
    state: Mutex<BotState>,
    save_lock: AsyncMutex<()>,
}

impl StateManager {
    pub fn new(cfg: PersistenceConfig) -> Self {
        let state_file = PathBuf::from(&cfg.state_file);
        Self {
            cfg,
            state_file,
            state: Mutex::new(BotState::default()),
            save_lock: AsyncMutex::new(()),
        }
    }

    // ─────────────────────────────────────────────────
    // Load
    // ─────────────────────────────────────────────────

    /// Load the state file if it exists. Returns true when state was
    /// restored. A parse failure renames the file to `.bak` and starts
    /// clean.
    pub fn load(&self) -> bool {
        if !self.cfg.enable_persistence {
            return false;
        }
        if !self.state_file.exists() {
            info!("no existing state file, starting fresh");
            return false;
        }

        let raw = match std::fs::read_to_string(&self.state_file) {
            Ok(s) => s,
            Err(e) => {
                error!("failed to read state file: {e}");
                return false;
            }
        };

        match serde_json::from_str::<BotState>(&raw) {
            Ok(mut state) => {
                // Open orders are reconstructed from the exchange.
                state.open_orders.clear();
                info!(
                    "state loaded: {} positions, {} fills, last updated {}",
                    state.positions.len(),
                    state.fills.len(),
                    state.last_updated
                );
                *self.state.lock().expect("state lock") = state;
                true
            }
            Err(e) => {
                error!("failed to parse state file: {e}");
                let backup = self.state_file.with_extension("json.bak");
                if let Err(re) = std::fs::rename(&self.state_file, &backup) {
                    error!("failed to back up corrupted state: {re}");
                } else {
                    info!("corrupted state backed up to {}", backup.display());
                }
                false
            }
        }
    }

    // ─────────────────────────────────────────────────
    // Save
    // ─────────────────────────────────────────────────

    /// Serialize a snapshot and atomically replace the state file.
    pub async fn save(&self) -> anyhow::Result<()> {
        if !self.cfg.enable_persistence {
            return Ok(());
        }
        let _guard = self.save_lock.lock().await;

        let snapshot = {
            let mut state = self.state.lock().expect("state lock");
            state.last_updated = Utc::now();
            let mut snap = state.clone();
            snap.open_orders.clear();
            snap
        };

        let json = serde_json::to_string_pretty(&snapshot).context("serialize state")?;

        let dir = self
            .state_file
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        let tmp = dir.join(format!(
            ".{}.tmp",
            self.state_file
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("state.json")
        ));

        let result = write_and_rename(&tmp, &self.state_file, &json).await;
        if let Err(e) = &result {
            let _ = tokio::fs::remove_file(&tmp).await;
            error!("failed to save state: {e:#}");
        } else {
            debug!("state saved: {} positions", snapshot.positions.len());
        }
        result
    }

    /// Background writer. Saves every `save_interval_seconds` until the
    /// shutdown signal flips; the final save is the caller's job.
    pub async fn run_periodic(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        if !self.cfg.enable_persistence {
            info!("state persistence disabled");
            return;
        }
        info!("state manager saving to {}", self.state_file.display());

        let interval = Duration::from_secs_f64(self.cfg.save_interval_seconds);
        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {
                    let _ = self.save().await;
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        debug!("periodic state writer stopped");
    }

    // ─────────────────────────────────────────────────
    // In-memory mutation / access
    // ─────────────────────────────────────────────────

    pub fn record_fill(&self, fill: Fill) {
        if !fill.maker {
            warn!("recording non-maker fill {} (protocol violation)", fill.order_id);
        }
        self.state.lock().expect("state lock").push_fill(fill);
    }

    pub fn update_positions(&self, positions: HashMap<String, MarketPosition>) {
        self.state.lock().expect("state lock").positions = positions;
    }

    pub fn update_rebates(&self, total_estimate: f64) {
        self.state.lock().expect("state lock").total_rebates_estimate = total_estimate;
    }

    pub fn positions(&self) -> HashMap<String, MarketPosition> {
        self.state.lock().expect("state lock").positions.clone()
    }

    pub fn snapshot(&self) -> BotState {
        self.state.lock().expect("state lock").clone()
    }
}

async fn write_and_rename(tmp: &Path, dest: &Path, json: &str) -> anyhow::Result<()> {
    use tokio::io::AsyncWriteExt;

    let mut file = tokio::fs::File::create(tmp)
        .await
        .with_context(|| format!("create {}", tmp.display()))?;
    file.write_all(json.as_bytes()).await.context("write state")?;
    file.flush().await.context("flush state")?;
    file.sync_all().await.context("fsync state")?;
    drop(file);

    tokio::fs::rename(tmp, dest)
        .await
        .with_context(|| format!("rename {} -> {}", tmp.display(), dest.display()))?;
    Ok(())
}

// ─────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────
