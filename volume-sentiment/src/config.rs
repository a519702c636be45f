//! Engine configuration
use std::str::FromStr;

/// How a window's `avg_price` combines the per-snapshot side prices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PriceAveraging {
    /// Arithmetic mean of every valid side price
    #[default]
    Mean,
    /// Side prices weighted by their side volume
    VolumeWeighted,
}

impl FromStr for PriceAveraging {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mean" => Ok(Self::Mean),
            "vwap" | "volume_weighted" => Ok(Self::VolumeWeighted),
            other => Err(format!("unknown price averaging mode: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Snapshots older than this relative to the latest admission are pruned (ms)
    pub retention_ms: i64,
    /// Maximum number of stored snapshots
    pub store_capacity: usize,
    /// Maximum number of memoized window results
    pub cache_capacity: usize,
    /// No message for longer than this marks the data stale (ms)
    pub stale_after_ms: i64,
    /// Trades shown per side
    pub trade_limit: usize,
    pub price_averaging: PriceAveraging,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            retention_ms: 300_000,
            store_capacity: 1_000,
            cache_capacity: 10,
            stale_after_ms: 10_000,
            trade_limit: 25,
            price_averaging: PriceAveraging::Mean,
        }
    }
}

impl EngineConfig {
    /// Defaults overridden by `SENTIMENT_TRADE_LIMIT` and `SENTIMENT_PRICE_AVERAGING`
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            trade_limit: std::env::var("SENTIMENT_TRADE_LIMIT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.trade_limit),
            price_averaging: std::env::var("SENTIMENT_PRICE_AVERAGING")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.price_averaging),
            ..defaults
        }
    }

    pub fn with_trade_limit(mut self, limit: usize) -> Self {
        self.trade_limit = limit;
        self
    }

    pub fn with_price_averaging(mut self, mode: PriceAveraging) -> Self {
        self.price_averaging = mode;
        self
    }
}
