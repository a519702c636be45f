use smol_str::SmolStr;
use volume_feed::{Side, Snapshot};

/// One side of a snapshot presented as a trade
#[derive(Debug, Clone, PartialEq)]
pub struct Trade {
    pub side: Side,
    pub volume: f64,
    /// Number of fills, never zero
    pub count: u64,
    pub price: f64,
    pub timestamp: i64,
    pub exchange: SmolStr,
}

impl Trade {
    fn from_side(snapshot: &Snapshot, side: Side) -> Option<Self> {
        let price = snapshot.valid_price(side)?;
        Some(Self {
            side,
            volume: snapshot.volume(side),
            count: snapshot.count(side).max(1),
            price,
            timestamp: snapshot.timestamp,
            exchange: snapshot.exchange.clone(),
        })
    }

    /// Volume relative to the largest trade, in `[0, 1]`
    pub fn size_ratio(&self, max_volume: f64) -> f64 {
        if max_volume > 0.0 {
            (self.volume / max_volume).min(1.0)
        } else {
            0.0
        }
    }
}

/// Trades of every traded side, newest first. Ties keep insertion order.
pub fn extract_trades<'a>(snapshots: impl IntoIterator<Item = &'a Snapshot>) -> Vec<Trade> {
    let mut trades: Vec<Trade> = snapshots
        .into_iter()
        .flat_map(|snapshot| {
            [Side::Buy, Side::Sell]
                .into_iter()
                .filter_map(move |side| Trade::from_side(snapshot, side))
        })
        .collect();

    trades.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    trades
}

/// At most `n` trades of `side`, preserving order
pub fn limit(trades: &[Trade], side: Side, n: usize) -> Vec<Trade> {
    trades
        .iter()
        .filter(|trade| trade.side == side)
        .take(n)
        .cloned()
        .collect()
}

/// Largest single trade volume, 0 when there are none
pub fn max_volume(trades: &[Trade]) -> f64 {
    trades
        .iter()
        .map(|trade| trade.volume)
        .fold(0.0, f64::max)
}
