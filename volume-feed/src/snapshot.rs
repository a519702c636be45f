//! Snapshot wire format and validation.
//!
//! The feed publishes one JSON object per venue per interval. Two protocol shapes are
//! in circulation: the base shape with per-side volume, average price and trade count,
//! and an older shape that also carries per-side min/max prices. Both deserialize into
//! [`SnapshotMessage`]; [`Snapshot`] is the validated form admitted downstream.

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Aggressor side of a snapshot half or a derived trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Convert to display string
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Raw inbound message, every field optional so validation can name what is missing.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct SnapshotMessage {
    /// Frame type, only set on control frames such as the welcome greeting.
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<SmolStr>,
    #[serde(default)]
    pub exchange: Option<SmolStr>,
    #[serde(default)]
    pub timestamp: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buy_volume: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sell_volume: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buy_avg_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sell_avg_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buy_count: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sell_count: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buy_min_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buy_max_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sell_min_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sell_max_price: Option<f64>,
}

impl SnapshotMessage {
    pub fn is_welcome(&self) -> bool {
        self.kind.as_deref() == Some("welcome")
    }
}

/// One validated observation from one venue at one instant.
///
/// Prices of `0.0` mean "absent". Missing optional wire fields are stored as zero.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub exchange: SmolStr,
    /// Milliseconds since the Unix epoch, always positive.
    pub timestamp: i64,
    pub buy_volume: f64,
    pub sell_volume: f64,
    pub buy_avg_price: f64,
    pub sell_avg_price: f64,
    pub buy_count: u64,
    pub sell_count: u64,
    pub buy_min_price: f64,
    pub buy_max_price: f64,
    pub sell_min_price: f64,
    pub sell_max_price: f64,
}

impl Snapshot {
    /// Empty snapshot for `exchange` at `timestamp`; fill sides with [`Self::with_buy`]
    /// and [`Self::with_sell`].
    pub fn new(exchange: impl Into<SmolStr>, timestamp: i64) -> Self {
        Self {
            exchange: exchange.into(),
            timestamp,
            buy_volume: 0.0,
            sell_volume: 0.0,
            buy_avg_price: 0.0,
            sell_avg_price: 0.0,
            buy_count: 0,
            sell_count: 0,
            buy_min_price: 0.0,
            buy_max_price: 0.0,
            sell_min_price: 0.0,
            sell_max_price: 0.0,
        }
    }

    pub fn with_buy(mut self, volume: f64, avg_price: f64, count: u64) -> Self {
        self.buy_volume = volume;
        self.buy_avg_price = avg_price;
        self.buy_count = count;
        self
    }

    pub fn with_sell(mut self, volume: f64, avg_price: f64, count: u64) -> Self {
        self.sell_volume = volume;
        self.sell_avg_price = avg_price;
        self.sell_count = count;
        self
    }

    /// Attach the older protocol's per-side price range.
    pub fn with_price_range(mut self, side: Side, min: f64, max: f64) -> Self {
        match side {
            Side::Buy => {
                self.buy_min_price = min;
                self.buy_max_price = max;
            }
            Side::Sell => {
                self.sell_min_price = min;
                self.sell_max_price = max;
            }
        }
        self
    }

    pub fn volume(&self, side: Side) -> f64 {
        match side {
            Side::Buy => self.buy_volume,
            Side::Sell => self.sell_volume,
        }
    }

    pub fn avg_price(&self, side: Side) -> f64 {
        match side {
            Side::Buy => self.buy_avg_price,
            Side::Sell => self.sell_avg_price,
        }
    }

    pub fn count(&self, side: Side) -> u64 {
        match side {
            Side::Buy => self.buy_count,
            Side::Sell => self.sell_count,
        }
    }

    /// Min/max range for `side` when the older protocol supplied one.
    pub fn price_range(&self, side: Side) -> Option<(f64, f64)> {
        let (min, max) = match side {
            Side::Buy => (self.buy_min_price, self.buy_max_price),
            Side::Sell => (self.sell_min_price, self.sell_max_price),
        };
        (min > 0.0).then_some((min, max))
    }

    /// Average price of `side`, only when that side traded at a positive price.
    pub fn valid_price(&self, side: Side) -> Option<f64> {
        let volume = self.volume(side);
        let price = self.avg_price(side);
        (volume > 0.0 && price > 0.0).then_some(price)
    }

    pub fn total_volume(&self) -> f64 {
        self.buy_volume + self.sell_volume
    }
}

impl TryFrom<SnapshotMessage> for Snapshot {
    type Error = ValidationError;

    fn try_from(message: SnapshotMessage) -> Result<Self, Self::Error> {
        let exchange = message
            .exchange
            .filter(|exchange| !exchange.is_empty())
            .ok_or(ValidationError::MissingExchange)?;
        let raw_timestamp = message.timestamp.ok_or(ValidationError::MissingTimestamp)?;

        // At least one side must be present and plausible: volume > 0 implies price > 0
        let sides = [
            (Side::Buy, message.buy_volume, message.buy_avg_price),
            (Side::Sell, message.sell_volume, message.sell_avg_price),
        ];
        let mut first_rejection = None;
        let mut plausible = false;
        for (side, volume, price) in sides {
            let Some(volume) = volume else {
                continue;
            };
            if volume < 0.0 {
                return Err(ValidationError::NegativeVolume { side, volume });
            }
            if volume == 0.0 || price.unwrap_or(0.0) > 0.0 {
                plausible = true;
            } else if first_rejection.is_none() {
                first_rejection = Some(ValidationError::ImplausibleSide { side, volume });
            }
        }
        if !plausible {
            return Err(first_rejection.unwrap_or(ValidationError::NoVolume));
        }

        let timestamp = raw_timestamp.trunc() as i64;
        if timestamp <= 0 {
            return Err(ValidationError::InvalidTimestamp(raw_timestamp));
        }

        let non_negative = |value: Option<f64>| value.unwrap_or(0.0).max(0.0);
        let count = |value: Option<f64>| value.unwrap_or(0.0).max(0.0) as u64;

        Ok(Self {
            exchange,
            timestamp,
            buy_volume: non_negative(message.buy_volume),
            sell_volume: non_negative(message.sell_volume),
            buy_avg_price: non_negative(message.buy_avg_price),
            sell_avg_price: non_negative(message.sell_avg_price),
            buy_count: count(message.buy_count),
            sell_count: count(message.sell_count),
            buy_min_price: non_negative(message.buy_min_price),
            buy_max_price: non_negative(message.buy_max_price),
            sell_min_price: non_negative(message.sell_min_price),
            sell_max_price: non_negative(message.sell_max_price),
        })
    }
}

/// Parse and validate one text frame from the feed.
pub fn parse_snapshot(text: &str) -> Result<Snapshot, ValidationError> {
    let message = serde_json::from_str::<SnapshotMessage>(text)?;
    Snapshot::try_from(message)
}

/// Greeting frames some feed servers send right after the handshake.
///
/// Loose check for frames that do not deserialize as a [`SnapshotMessage`].
pub fn is_welcome_frame(text: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(text)
        .ok()
        .and_then(|value| {
            value
                .get("type")
                .and_then(|kind| kind.as_str())
                .map(|kind| kind == "welcome")
        })
        .unwrap_or(false)
}
