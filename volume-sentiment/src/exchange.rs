//! Per-venue rollups
use crate::{calc::buy_percent, store::SnapshotStore};
use fnv::FnvBuildHasher;
use indexmap::IndexMap;
use smol_str::SmolStr;
use volume_feed::{Side, Snapshot};

/// One venue's activity over the rollup window
#[derive(Debug, Clone, PartialEq)]
pub struct ExchangeRollup {
    pub name: SmolStr,
    pub total_volume: f64,
    /// Latest valid average price, 0 when the venue never reported one
    pub last_price: f64,
    /// `last_price` against the global average, in percent
    pub diff_from_global_pct: f64,
}

#[derive(Default)]
struct VenueAccumulator {
    total_volume: f64,
    last_price: f64,
    last_price_ts: i64,
}

/// Group `snapshots` by venue, sorted by total volume descending.
///
/// Venues with equal volume keep the order they were first seen in.
pub fn rollup<'a>(
    snapshots: impl IntoIterator<Item = &'a Snapshot>,
    global_avg: f64,
) -> Vec<ExchangeRollup> {
    let mut venues: IndexMap<SmolStr, VenueAccumulator, FnvBuildHasher> = IndexMap::default();

    for snapshot in snapshots {
        let venue = venues.entry(snapshot.exchange.clone()).or_default();
        venue.total_volume += snapshot.total_volume();

        if snapshot.timestamp > venue.last_price_ts {
            // Buy side wins when both are valid
            let price = snapshot
                .valid_price(Side::Buy)
                .or_else(|| snapshot.valid_price(Side::Sell));
            if let Some(price) = price {
                venue.last_price = price;
                venue.last_price_ts = snapshot.timestamp;
            }
        }
    }

    let mut rollups: Vec<ExchangeRollup> = venues
        .into_iter()
        .map(|(name, venue)| {
            let diff_from_global_pct = if global_avg != 0.0 && venue.last_price != 0.0 {
                (venue.last_price - global_avg) / global_avg * 100.0
            } else {
                0.0
            };
            ExchangeRollup {
                name,
                total_volume: venue.total_volume,
                last_price: venue.last_price,
                diff_from_global_pct,
            }
        })
        .collect();

    rollups.sort_by(|a, b| b.total_volume.total_cmp(&a.total_volume));
    rollups
}

/// Buy percent of one venue over the last `window_secs`, read straight from the store.
pub fn buy_percent_for(store: &SnapshotStore, exchange: &str, window_secs: u64, now: i64) -> f64 {
    let cutoff = now - window_secs as i64 * 1_000;
    let (buy, sell) = store
        .since(cutoff)
        .filter(|snapshot| snapshot.exchange == exchange)
        .fold((0.0, 0.0), |(buy, sell), snapshot| {
            (buy + snapshot.buy_volume, sell + snapshot.sell_volume)
        });
    buy_percent(buy, sell)
}

#[cfg(test)]
mod tests {
    use super::*;

    const T: i64 = 1_700_000_000_000;

    #[test]
    fn test_rollup_groups_and_sorts() {
        let snapshots = vec![
            Snapshot::new("kraken", T).with_buy(1.0, 100.0, 1),
            Snapshot::new("binance", T).with_buy(2.0, 110.0, 1).with_sell(3.0, 90.0, 1),
            Snapshot::new("kraken", T + 1).with_sell(0.5, 95.0, 1),
        ];

        let rollups = rollup(&snapshots, 100.0);
        assert_eq!(rollups.len(), 2);

        assert_eq!(rollups[0].name, "binance");
        assert_eq!(rollups[0].total_volume, 5.0);
        assert_eq!(rollups[0].last_price, 110.0);
        assert_eq!(rollups[0].diff_from_global_pct, 10.0);

        assert_eq!(rollups[1].name, "kraken");
        assert_eq!(rollups[1].total_volume, 1.5);
        assert_eq!(rollups[1].last_price, 95.0);
        assert_eq!(rollups[1].diff_from_global_pct, -5.0);
    }

    #[test]
    fn test_rollup_ties_keep_first_seen_order() {
        let snapshots = vec![
            Snapshot::new("okx", T).with_buy(1.0, 100.0, 1),
            Snapshot::new("bybit", T).with_sell(1.0, 100.0, 1),
            Snapshot::new("binance", T).with_buy(4.0, 100.0, 1),
            Snapshot::new("bitget", T + 1).with_buy(1.0, 100.0, 1),
            Snapshot::new("okx", T + 2).with_sell(0.0, 0.0, 0),
        ];

        let names: Vec<String> = rollup(&snapshots, 100.0)
            .into_iter()
            .map(|venue| venue.name.to_string())
            .collect();
        assert_eq!(names, vec!["binance", "okx", "bybit", "bitget"]);
    }

    #[test]
    fn test_later_snapshot_without_price_keeps_last_price() {
        let snapshots = vec![
            Snapshot::new("okx", T).with_sell(1.0, 120.0, 1),
            Snapshot::new("okx", T + 5).with_buy(0.0, 0.0, 0),
        ];
        let rollups = rollup(&snapshots, 0.0);
        assert_eq!(rollups[0].last_price, 120.0);
        assert_eq!(rollups[0].diff_from_global_pct, 0.0);
    }

    #[test]
    fn test_buy_percent_for() {
        let mut store = SnapshotStore::new(300_000, 1_000);
        store.admit(Snapshot::new("okx", T).with_buy(3.0, 100.0, 1), T);
        store.admit(Snapshot::new("okx", T + 1_000).with_sell(1.0, 100.0, 1), T + 1_000);
        store.admit(Snapshot::new("bybit", T + 1_000).with_sell(9.0, 100.0, 1), T + 1_000);

        assert_eq!(buy_percent_for(&store, "okx", 30, T + 2_000), 75.0);
        assert_eq!(buy_percent_for(&store, "okx", 2, T + 2_000), 0.0);
        assert_eq!(buy_percent_for(&store, "kraken", 30, T + 2_000), 50.0);
    }
}
