//! Sentiment engine
//!
//! Single owner of the snapshot store, window cache and session state. Feed events are
//! applied in channel order; the presentation layer pulls a [`SentimentView`] on its own
//! tick.

use crate::{
    calc::{
        CenterBar, RangeBand, VolumeDiff, buy_percent, center_bar, count_bar, marker_position,
        percent_diff, price_centered_diff, range_band, volume_diff,
    },
    config::EngineConfig,
    exchange::{ExchangeRollup, buy_percent_for, rollup},
    store::SnapshotStore,
    trades::{Trade, extract_trades, limit, max_volume},
    window::{TradeCounts, Window, WindowAggregator, WindowMetrics},
};
use std::sync::Arc;
use tracing::{debug, info, warn};
use volume_feed::{ConnectionStatus, FeedEvent, Side, Snapshot};

/// Share of each longer window already covered by the current session, in percent
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Completeness {
    pub thirty_seconds: f64,
    pub two_minutes: f64,
    pub five_minutes: f64,
}

/// Everything derived for one window
#[derive(Debug, Clone, PartialEq)]
pub struct WindowView {
    pub window: Window,
    pub metrics: WindowMetrics,
    pub buy_percent: f64,
    pub volume_diff: VolumeDiff,
    /// `buy_percent - 50`
    pub volume_bar_diff: f64,
    pub volume_bar: CenterBar,
    /// Average price position inside the window's own range
    pub price_diff: f64,
    pub price_bar: CenterBar,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExchangeView {
    pub rollup: ExchangeRollup,
    pub buy_percent_30s: f64,
    pub buy_percent_2m: f64,
    pub buy_percent_5m: f64,
}

/// Read-only snapshot of the engine for display
#[derive(Debug, Clone, PartialEq)]
pub struct SentimentView {
    pub now: i64,
    pub status: ConnectionStatus,
    pub is_stale: bool,
    pub last_error: Option<String>,
    pub snapshot_count: usize,
    /// 10s, 30s, 2m and 5m, in that order
    pub windows: Vec<WindowView>,
    pub trade_counts_10s: TradeCounts,
    pub trade_count_bar: CenterBar,
    /// 10s average price against the 30s one, in percent
    pub price_10s_vs_30s_pct: f64,
    /// 10s traded range placed on the 2m range
    pub range_10s_in_2m: RangeBand,
    /// 10s average price placed on the 2m range
    pub price_marker_pct: f64,
    pub buy_trades: Vec<Trade>,
    pub sell_trades: Vec<Trade>,
    pub max_trade_volume: f64,
    pub exchanges: Vec<ExchangeView>,
    pub completeness: Completeness,
}

impl SentimentView {
    pub fn window(&self, window: Window) -> Option<&WindowView> {
        self.windows.iter().find(|view| view.window == window)
    }
}

#[derive(Debug)]
pub struct SentimentEngine {
    config: EngineConfig,
    store: SnapshotStore,
    aggregator: WindowAggregator,
    status: ConnectionStatus,
    first_message_at: Option<i64>,
    last_message_at: Option<i64>,
    last_error: Option<String>,
}

impl Default for SentimentEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl SentimentEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            store: SnapshotStore::new(config.retention_ms, config.store_capacity),
            aggregator: WindowAggregator::new(config.cache_capacity, config.price_averaging),
            config,
            status: ConnectionStatus::Disconnected,
            first_message_at: None,
            last_message_at: None,
            last_error: None,
        }
    }

    /// Apply one feed event at wall-clock `now` (ms).
    pub fn apply(&mut self, event: FeedEvent, now: i64) {
        match event {
            FeedEvent::Snapshot(snapshot) => self.admit(snapshot, now),
            FeedEvent::Status(status) => {
                if status != self.status {
                    info!(%status, "Feed status changed");
                }
                self.status = status;
                if status == ConnectionStatus::Connected {
                    self.reset_session();
                }
            }
            FeedEvent::Error(error) => {
                warn!(%error, "Feed reported error");
                self.last_error = Some(error.to_string());
            }
        }
    }

    pub fn admit(&mut self, snapshot: Snapshot, now: i64) {
        self.last_message_at = Some(now);
        self.first_message_at.get_or_insert(now);
        self.store.admit(snapshot, now);
        self.aggregator.invalidate();
    }

    /// Fresh session: drop every snapshot, cached window and timing marker.
    pub fn reset_session(&mut self) {
        debug!(dropped = self.store.len(), "Resetting sentiment session");
        self.store.reset();
        self.aggregator.invalidate();
        self.first_message_at = None;
        self.last_message_at = None;
        self.last_error = None;
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// True when nothing has arrived yet or the last message is older than the threshold.
    pub fn is_data_stale(&self, now: i64) -> bool {
        match self.last_message_at {
            None => true,
            Some(last) => now - last > self.config.stale_after_ms,
        }
    }

    pub fn metrics_for(&mut self, window_secs: u64, now: i64) -> Arc<WindowMetrics> {
        self.aggregator.metrics_for(&self.store, window_secs, now)
    }

    pub fn metrics(&mut self, window: Window, now: i64) -> Arc<WindowMetrics> {
        self.aggregator.window(&self.store, window, now)
    }

    pub fn cached_windows(&self) -> usize {
        self.aggregator.cached_len()
    }

    pub fn trade_counts(&self, window: Window, now: i64) -> TradeCounts {
        TradeCounts::from_snapshots(self.store.since(now - window.millis()))
    }

    pub fn completeness(&self, now: i64) -> Completeness {
        let Some(start) = self.first_message_at else {
            return Completeness::default();
        };
        let elapsed = (now - start).max(0) as f64;
        let covered = |window: Window| (elapsed / window.millis() as f64 * 100.0).min(100.0);
        Completeness {
            thirty_seconds: covered(Window::ThirtySeconds),
            two_minutes: covered(Window::TwoMinutes),
            five_minutes: covered(Window::FiveMinutes),
        }
    }

    /// Trades of the 5m window
    pub fn trades(&self, now: i64) -> Vec<Trade> {
        extract_trades(self.store.since(now - Window::FiveMinutes.millis()))
    }

    pub fn exchanges(&mut self, now: i64) -> Vec<ExchangeRollup> {
        let global_avg = self.metrics(Window::FiveMinutes, now).avg_price;
        rollup(self.store.since(now - Window::FiveMinutes.millis()), global_avg)
    }

    pub fn buy_percent_for(&self, exchange: &str, window: Window, now: i64) -> f64 {
        buy_percent_for(&self.store, exchange, window.seconds(), now)
    }

    pub fn view(&mut self, now: i64) -> SentimentView {
        let windows: Vec<WindowView> = Window::ALL
            .into_iter()
            .map(|window| {
                let metrics = *self.metrics(window, now);
                let buy_percent = buy_percent(metrics.buy_volume_total, metrics.sell_volume_total);
                let price_diff =
                    price_centered_diff(metrics.min_price, metrics.max_price, metrics.avg_price);
                WindowView {
                    window,
                    metrics,
                    buy_percent,
                    volume_diff: volume_diff(metrics.buy_volume_total, metrics.sell_volume_total),
                    volume_bar_diff: buy_percent - 50.0,
                    volume_bar: center_bar(buy_percent - 50.0),
                    price_diff,
                    price_bar: center_bar(price_diff),
                }
            })
            .collect();

        let ten = *self.metrics(Window::TenSeconds, now);
        let thirty = *self.metrics(Window::ThirtySeconds, now);
        let two_minutes = *self.metrics(Window::TwoMinutes, now);

        let trade_counts_10s = self.trade_counts(Window::TenSeconds, now);
        let trades = self.trades(now);
        let limit_n = self.config.trade_limit;

        let exchanges = self
            .exchanges(now)
            .into_iter()
            .map(|rollup| ExchangeView {
                buy_percent_30s: self.buy_percent_for(&rollup.name, Window::ThirtySeconds, now),
                buy_percent_2m: self.buy_percent_for(&rollup.name, Window::TwoMinutes, now),
                buy_percent_5m: self.buy_percent_for(&rollup.name, Window::FiveMinutes, now),
                rollup,
            })
            .collect();

        SentimentView {
            now,
            status: self.status,
            is_stale: self.is_data_stale(now),
            last_error: self.last_error.clone(),
            snapshot_count: self.store.len(),
            windows,
            trade_counts_10s,
            trade_count_bar: count_bar(trade_counts_10s.buy, trade_counts_10s.sell),
            price_10s_vs_30s_pct: percent_diff(ten.avg_price, thirty.avg_price),
            range_10s_in_2m: range_band(
                ten.min_price,
                ten.max_price,
                two_minutes.min_price,
                two_minutes.max_price,
            ),
            price_marker_pct: marker_position(
                ten.avg_price,
                two_minutes.min_price,
                two_minutes.max_price,
            ),
            buy_trades: limit(&trades, Side::Buy, limit_n),
            sell_trades: limit(&trades, Side::Sell, limit_n),
            max_trade_volume: max_volume(&trades),
            exchanges,
            completeness: self.completeness(now),
        }
    }
}
