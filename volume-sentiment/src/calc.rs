//! Pure sentiment calculations over window aggregates
//!
//! Percentages are in `[0, 100]`, signed diffs in `[-100, 100]`.

/// Volume-Weighted Average Price (VWAP)
///
/// VWAP = Σ(Price × Volume) / Σ(Volume)
pub fn calculate_vwap(prices: &[f64], volumes: &[f64]) -> Option<f64> {
    if prices.is_empty() || volumes.is_empty() || prices.len() != volumes.len() {
        return None;
    }

    let (sum_pv, sum_v) = prices
        .iter()
        .zip(volumes)
        .fold((0.0, 0.0), |(pv, v), (price, volume)| {
            (pv + price * volume, v + volume)
        });

    (sum_v > 0.0).then(|| sum_pv / sum_v)
}

/// Share of buy volume, 50 when nothing traded
pub fn buy_percent(buy: f64, sell: f64) -> f64 {
    if buy.is_nan() || sell.is_nan() {
        return 50.0;
    }
    match (buy == f64::INFINITY, sell == f64::INFINITY) {
        (true, false) => return 100.0,
        (false, true) => return 0.0,
        (true, true) => return 50.0,
        (false, false) => {}
    }

    // Halving keeps the sum of two finite totals finite
    let (buy, sell) = if (buy + sell).is_finite() {
        (buy, sell)
    } else {
        (buy / 2.0, sell / 2.0)
    };
    let total = buy + sell;
    if total > 0.0 {
        (buy / total * 100.0).clamp(0.0, 100.0)
    } else {
        50.0
    }
}

/// Absolute buy/sell difference and its direction
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct VolumeDiff {
    pub magnitude: f64,
    /// -1, 0 or 1
    pub sign: i8,
}

pub fn volume_diff(buy: f64, sell: f64) -> VolumeDiff {
    let diff = buy - sell;
    let sign = if diff > 0.0 {
        1
    } else if diff < 0.0 {
        -1
    } else {
        0
    };
    VolumeDiff {
        magnitude: diff.abs(),
        sign,
    }
}

/// Horizontal bar growing out of the 50% midpoint, both fields in percent of the track
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CenterBar {
    pub offset_pct: f64,
    pub width_pct: f64,
}

impl CenterBar {
    /// Zero-width bar parked at the midpoint
    pub const EMPTY: Self = Self {
        offset_pct: 50.0,
        width_pct: 0.0,
    };

    pub fn is_positive(&self) -> bool {
        self.offset_pct >= 50.0
    }
}

impl Default for CenterBar {
    fn default() -> Self {
        Self::EMPTY
    }
}

/// Bar for a signed diff, clamped to ±100
pub fn center_bar(diff: f64) -> CenterBar {
    let clamped = diff.clamp(-100.0, 100.0);
    CenterBar {
        offset_pct: if clamped >= 0.0 { 50.0 } else { 50.0 + clamped },
        width_pct: clamped.abs(),
    }
}

/// Bar for a buy/sell trade-count difference, empty when there were no trades
pub fn count_bar(buy_count: u64, sell_count: u64) -> CenterBar {
    if buy_count == 0 && sell_count == 0 {
        return CenterBar::EMPTY;
    }
    let (buy, sell) = (buy_count as f64, sell_count as f64);
    center_bar((buy - sell) / (buy + sell) * 100.0)
}

/// Position of `current` inside `[min, max]` mapped to `[-100, 100]`, 0 for an empty range
pub fn price_centered_diff(min: f64, max: f64, current: f64) -> f64 {
    if max <= 0.0 || max <= min {
        return 0.0;
    }
    let mid = (min + max) / 2.0;
    let half_range = (max - min) / 2.0;
    ((current - mid) / half_range * 100.0).clamp(-100.0, 100.0)
}

/// Percentage change from `base` to `current`, 0 when `base` is 0
pub fn percent_diff(current: f64, base: f64) -> f64 {
    if base == 0.0 {
        return 0.0;
    }
    (current - base) / base * 100.0
}

/// Sub-range of an outer price range, as percentages of the outer track
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RangeBand {
    pub left_pct: f64,
    pub width_pct: f64,
}

/// Place `[inner_min, inner_max]` on the `[outer_min, outer_max]` track
pub fn range_band(inner_min: f64, inner_max: f64, outer_min: f64, outer_max: f64) -> RangeBand {
    let range = outer_max - outer_min;
    if range == 0.0 || inner_min == 0.0 || inner_max == 0.0 {
        return RangeBand::default();
    }

    let left = inner_min.max(outer_min);
    let right = inner_max.min(outer_max);
    let left_pct = ((left - outer_min) / range * 100.0).clamp(0.0, 100.0);
    let width_pct = ((right - left) / range * 100.0).clamp(0.0, 100.0 - left_pct);

    RangeBand {
        left_pct,
        width_pct,
    }
}

/// Position of `price` on the `[min, max]` track in percent, clamped to the track
pub fn marker_position(price: f64, min: f64, max: f64) -> f64 {
    let range = max - min;
    if range == 0.0 {
        return 0.0;
    }
    (price.max(min).min(max) - min) / range * 100.0
}
