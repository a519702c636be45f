/// Volume Sentiment - Rolling-window aggregation engine
///
/// Turns the snapshot stream of `volume-feed` into buy/sell sentiment:
/// - Bounded snapshot store with a 5 minute retention horizon
/// - 10s / 30s / 2m / 5m window metrics with per-second memoization
/// - Trade lists, per-venue rollups and centered diff bars
/// - A read-only view for the presentation layer
pub mod calc;
pub mod config;
pub mod engine;
pub mod exchange;
pub mod store;
pub mod trades;
pub mod window;

// Re-export commonly used types for convenience
pub use calc::{CenterBar, RangeBand, VolumeDiff, buy_percent, center_bar, calculate_vwap};
pub use config::{EngineConfig, PriceAveraging};
pub use engine::{Completeness, ExchangeView, SentimentEngine, SentimentView, WindowView};
pub use exchange::ExchangeRollup;
pub use store::SnapshotStore;
pub use trades::{Trade, extract_trades};
pub use window::{TradeCounts, Window, WindowAggregator, WindowMetrics};
