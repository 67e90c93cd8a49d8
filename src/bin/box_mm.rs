//! Box market maker entrypoint.
//!
//! Usage:
//!   box_mm                          # live mode (needs credentials)
//!   PAPER_TRADING_MODE=true box_mm  # paper trading

use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use pm_box_mm::bot::MarketMakingBot;
use pm_box_mm::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    // Console + daily-rolling file output; the guard must outlive main.
    let file_appender = tracing_appender::rolling::daily("logs", "box_mm.log");
    let (file_writer, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(file_writer))
        .init();

    let config = Config::from_env();
    config.validate()?;

    let mut bot = MarketMakingBot::new(config);

    // SIGINT / SIGTERM flip the shutdown flag; every activity observes it.
    let shutdown_tx = bot.shutdown_sender();
    tokio::spawn(async move {
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(s) => s,
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => info!("received SIGINT, shutting down..."),
            _ = sigterm.recv() => info!("received SIGTERM, shutting down..."),
        }
        let _ = shutdown_tx.send(true);
    });

    if let Err(e) = bot.run().await {
        error!("fatal error: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
