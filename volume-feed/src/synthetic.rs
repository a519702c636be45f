//! Synthetic snapshot generation used while the real feed is unavailable.

use crate::snapshot::SnapshotMessage;
use rand::{Rng, SeedableRng, rngs::StdRng};
use smol_str::SmolStr;

/// Venues the synthetic generator picks from.
pub const SYNTHETIC_EXCHANGES: [&str; 5] = ["binance", "coinbase", "kraken", "bybit", "okx"];

/// Source of fallback snapshots. Implemented for closures so tests can inject a
/// deterministic generator.
pub trait SnapshotSource: Send + 'static {
    fn next_message(&mut self, now_ms: i64) -> SnapshotMessage;
}

impl<F> SnapshotSource for F
where
    F: FnMut(i64) -> SnapshotMessage + Send + 'static,
{
    fn next_message(&mut self, now_ms: i64) -> SnapshotMessage {
        self(now_ms)
    }
}

/// Plausible random snapshots around a 27,000-28,000 price level.
#[derive(Debug, Clone)]
pub struct RandomSnapshotSource {
    rng: StdRng,
}

impl RandomSnapshotSource {
    pub fn new() -> Self {
        Self::from_seed(rand::random())
    }

    /// Reproducible sequence for a given seed.
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for RandomSnapshotSource {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotSource for RandomSnapshotSource {
    fn next_message(&mut self, now_ms: i64) -> SnapshotMessage {
        let rng = &mut self.rng;
        let base_price = 27_000.0 + rng.random::<f64>() * 1_000.0;
        let volume = rng.random::<f64>() * 3.0;
        let exchange = SYNTHETIC_EXCHANGES[rng.random_range(0..SYNTHETIC_EXCHANGES.len())];

        let buy_volume = if rng.random_bool(0.5) { volume } else { 0.0 };
        let sell_volume = if rng.random_bool(0.5) { volume } else { 0.0 };

        SnapshotMessage {
            exchange: Some(SmolStr::new_static(exchange)),
            timestamp: Some(now_ms as f64),
            buy_volume: Some(buy_volume),
            sell_volume: Some(sell_volume),
            buy_avg_price: Some(base_price + rng.random::<f64>() * 10.0),
            sell_avg_price: Some(base_price - rng.random::<f64>() * 10.0),
            buy_count: Some(rng.random_range(0..5u32) as f64),
            sell_count: Some(rng.random_range(0..5u32) as f64),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::Snapshot;

    #[test]
    fn test_random_snapshots_always_validate() {
        let mut source = RandomSnapshotSource::from_seed(7);
        for i in 0..500 {
            let now = 1_700_000_000_000 + i * 1_000;
            let snapshot = Snapshot::try_from(source.next_message(now)).unwrap();

            assert_eq!(snapshot.timestamp, now);
            assert!(SYNTHETIC_EXCHANGES.contains(&snapshot.exchange.as_str()));
            assert!((26_990.0..28_010.0).contains(&snapshot.buy_avg_price));
            assert!((26_990.0..28_010.0).contains(&snapshot.sell_avg_price));
            assert!(snapshot.buy_volume < 3.0 && snapshot.sell_volume < 3.0);
            assert!(snapshot.buy_count < 5 && snapshot.sell_count < 5);
        }
    }

    #[test]
    fn test_seeded_sources_repeat() {
        let mut a = RandomSnapshotSource::from_seed(42);
        let mut b = RandomSnapshotSource::from_seed(42);
        assert_eq!(a.next_message(1), b.next_message(1));
    }

    #[test]
    fn test_closure_source() {
        let mut source = |now: i64| SnapshotMessage {
            exchange: Some("test".into()),
            timestamp: Some(now as f64),
            buy_volume: Some(1.0),
            buy_avg_price: Some(100.0),
            ..Default::default()
        };
        let message = SnapshotSource::next_message(&mut source, 10);
        assert_eq!(message.timestamp, Some(10.0));
    }
}
