//! Headless sentiment monitor
//!
//! Connects to the volume feed and logs the sentiment view once per second.
//! Configured through `FEED_*` and `SENTIMENT_*` environment variables, log level
//! through `RUST_LOG`.

use rustls::crypto::ring::default_provider;
use std::{error::Error, time::Duration};
use tracing::{info, warn};
use volume_feed::{FeedClient, FeedConfig};
use volume_sentiment::{EngineConfig, SentimentEngine, SentimentView, Window};

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn log_view(view: &SentimentView) {
    if view.is_stale {
        warn!(
            status = %view.status,
            error = view.last_error.as_deref().unwrap_or("-"),
            "Sentiment data is stale"
        );
    }

    for window in &view.windows {
        info!(
            window = %window.window,
            buy_pct = %format!("{:.1}", window.buy_percent),
            buy_vol = %format!("{:.4}", window.metrics.buy_volume_total),
            sell_vol = %format!("{:.4}", window.metrics.sell_volume_total),
            avg = %format!("{:.2}", window.metrics.avg_price),
            low = %format!("{:.2}", window.metrics.min_price),
            high = %format!("{:.2}", window.metrics.max_price),
            "Window"
        );
    }

    let trend = match view.window(Window::TenSeconds) {
        Some(ten) if ten.volume_diff.sign < 0 => "down",
        _ => "up",
    };
    info!(
        status = %view.status,
        snapshots = view.snapshot_count,
        trades_buy = view.trade_counts_10s.buy,
        trades_sell = view.trade_counts_10s.sell,
        vs_30s_pct = %format!("{:+.3}", view.price_10s_vs_30s_pct),
        trend,
        complete_5m = %format!("{:.0}", view.completeness.five_minutes),
        "Sentiment"
    );

    for venue in view.exchanges.iter().take(5) {
        info!(
            exchange = %venue.rollup.name,
            volume = %format!("{:.4}", venue.rollup.total_volume),
            price = %format!("{:.2}", venue.rollup.last_price),
            diff_pct = %format!("{:+.3}", venue.rollup.diff_from_global_pct),
            buy_pct_30s = %format!("{:.1}", venue.buy_percent_30s),
            "Exchange"
        );
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let _ = default_provider().install_default();
    init_logging();

    let feed_config = FeedConfig::from_env();
    let engine_config = EngineConfig::from_env();
    info!(url = %feed_config.url, ?engine_config, "Starting sentiment monitor");

    let mut engine = SentimentEngine::new(engine_config);
    let (mut events, handle) = FeedClient::with_config(feed_config).start();
    let mut tick = tokio::time::interval(Duration::from_secs(1));

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(event) => engine.apply(event, now_ms()),
                None => {
                    warn!("Feed task stopped");
                    break;
                }
            },
            _ = tick.tick() => log_view(&engine.view(now_ms())),
            result = tokio::signal::ctrl_c() => {
                if let Err(error) = result {
                    warn!(%error, "Failed to listen for ctrl-c");
                }
                info!("Shutting down");
                break;
            }
        }
    }

    handle.disconnect().await;
    Ok(())
}
