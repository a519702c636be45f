//! Rolling-window statistics over the snapshot store
//!
//! Results are memoized per `(window, wall-clock second)` in a small insertion-ordered
//! cache. The cache is dropped wholesale whenever the store changes.

use crate::{calc::calculate_vwap, config::PriceAveraging, store::SnapshotStore};
use derive_more::Display;
use indexmap::IndexMap;
use std::sync::Arc;
use tracing::trace;
use volume_feed::{Side, Snapshot};

/// Display windows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum Window {
    #[display("10s")]
    TenSeconds,
    #[display("30s")]
    ThirtySeconds,
    #[display("2m")]
    TwoMinutes,
    #[display("5m")]
    FiveMinutes,
}

impl Window {
    pub const ALL: [Window; 4] = [
        Window::TenSeconds,
        Window::ThirtySeconds,
        Window::TwoMinutes,
        Window::FiveMinutes,
    ];

    pub fn seconds(&self) -> u64 {
        match self {
            Window::TenSeconds => 10,
            Window::ThirtySeconds => 30,
            Window::TwoMinutes => 120,
            Window::FiveMinutes => 300,
        }
    }

    pub fn millis(&self) -> i64 {
        self.seconds() as i64 * 1_000
    }
}

/// Aggregate of every snapshot inside one window. All zero when the window is empty.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WindowMetrics {
    pub buy_volume_total: f64,
    pub sell_volume_total: f64,
    pub avg_price: f64,
    pub min_price: f64,
    pub max_price: f64,
}

impl WindowMetrics {
    pub fn total_volume(&self) -> f64 {
        self.buy_volume_total + self.sell_volume_total
    }
}

/// Aggregate `snapshots` into window metrics.
///
/// Only sides with positive volume and positive price contribute prices.
pub fn aggregate<'a>(
    snapshots: impl IntoIterator<Item = &'a Snapshot>,
    averaging: PriceAveraging,
) -> WindowMetrics {
    let mut metrics = WindowMetrics::default();
    let mut prices = Vec::new();
    let mut volumes = Vec::new();
    let mut range_prices = Vec::new();

    for snapshot in snapshots {
        metrics.buy_volume_total += snapshot.buy_volume;
        metrics.sell_volume_total += snapshot.sell_volume;

        for side in [Side::Buy, Side::Sell] {
            if let Some(price) = snapshot.valid_price(side) {
                prices.push(price);
                volumes.push(snapshot.volume(side));
            }
            if let Some((min, max)) = snapshot.price_range(side) {
                range_prices.extend([min, max]);
            }
        }
    }

    if prices.is_empty() {
        return metrics;
    }

    metrics.avg_price = match averaging {
        PriceAveraging::Mean => prices.iter().sum::<f64>() / prices.len() as f64,
        PriceAveraging::VolumeWeighted => calculate_vwap(&prices, &volumes).unwrap_or(0.0),
    };

    // The older protocol reports the traded range directly
    let bounds = match averaging {
        PriceAveraging::VolumeWeighted if !range_prices.is_empty() => &range_prices,
        _ => &prices,
    };
    metrics.min_price = bounds.iter().copied().fold(f64::INFINITY, f64::min);
    metrics.max_price = bounds.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    metrics
}

/// Buy/sell trade counts inside a window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TradeCounts {
    pub buy: u64,
    pub sell: u64,
}

impl TradeCounts {
    pub fn from_snapshots<'a>(snapshots: impl IntoIterator<Item = &'a Snapshot>) -> Self {
        snapshots
            .into_iter()
            .fold(Self::default(), |counts, snapshot| Self {
                buy: counts.buy.saturating_add(snapshot.buy_count),
                sell: counts.sell.saturating_add(snapshot.sell_count),
            })
    }

    pub fn total(&self) -> u64 {
        self.buy.saturating_add(self.sell)
    }

    /// Buy minus sell count, saturating at the `i64` bounds
    pub fn diff(&self) -> i64 {
        let diff = i128::from(self.buy) - i128::from(self.sell);
        diff.clamp(i128::from(i64::MIN), i128::from(i64::MAX)) as i64
    }
}

/// Memoizing window aggregator.
#[derive(Debug, Clone)]
pub struct WindowAggregator {
    capacity: usize,
    averaging: PriceAveraging,
    cache: IndexMap<(u64, i64), Arc<WindowMetrics>>,
}

impl WindowAggregator {
    pub fn new(capacity: usize, averaging: PriceAveraging) -> Self {
        Self {
            capacity: capacity.max(1),
            averaging,
            cache: IndexMap::with_capacity(capacity.saturating_add(1).min(64)),
        }
    }

    /// Metrics for the last `window_secs` seconds before `now` (ms).
    ///
    /// Repeated calls inside the same wall-clock second return the same `Arc`
    /// until [`Self::invalidate`] is called.
    pub fn metrics_for(
        &mut self,
        store: &SnapshotStore,
        window_secs: u64,
        now: i64,
    ) -> Arc<WindowMetrics> {
        let key = (window_secs, now.div_euclid(1_000));
        if let Some(metrics) = self.cache.get(&key) {
            return Arc::clone(metrics);
        }

        let cutoff = now - window_secs as i64 * 1_000;
        let metrics = Arc::new(aggregate(store.since(cutoff), self.averaging));
        self.cache.insert(key, Arc::clone(&metrics));

        // Insertion order, not LRU
        if self.cache.len() > self.capacity {
            if let Some((evicted, _)) = self.cache.shift_remove_index(0) {
                trace!(?evicted, "Evicted window metrics");
            }
        }

        metrics
    }

    pub fn window(&mut self, store: &SnapshotStore, window: Window, now: i64) -> Arc<WindowMetrics> {
        self.metrics_for(store, window.seconds(), now)
    }

    pub fn invalidate(&mut self) {
        self.cache.clear();
    }

    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }
}
