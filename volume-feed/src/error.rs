use crate::snapshot::Side;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reasons an inbound payload is rejected before it reaches the snapshot store.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Error)]
pub enum ValidationError {
    #[error("payload is not a valid snapshot object: {0}")]
    Json(String),

    #[error("snapshot is missing a non-empty exchange")]
    MissingExchange,

    #[error("snapshot is missing a timestamp")]
    MissingTimestamp,

    #[error("snapshot timestamp must be positive, got {0}")]
    InvalidTimestamp(f64),

    #[error("snapshot carries neither buy_volume nor sell_volume")]
    NoVolume,

    #[error("{side} volume {volume} must not be negative")]
    NegativeVolume { side: Side, volume: f64 },

    #[error("{side} volume {volume} has no positive average price")]
    ImplausibleSide { side: Side, volume: f64 },
}

impl From<serde_json::Error> for ValidationError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value.to_string())
    }
}

/// All errors generated in `volume-feed`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Error)]
pub enum FeedError {
    #[error("invalid feed url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("failed to connect: {0}")]
    Connect(String),

    #[error("SocketError: {0}")]
    Socket(String),

    #[error("malformed payload: {0}")]
    Validation(#[from] ValidationError),

    #[error("gave up reconnecting after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },
}

impl FeedError {
    /// Determine if an error ends the current transport session and requires a reconnect.
    #[allow(clippy::match_like_matches_macro)]
    pub fn is_terminal(&self) -> bool {
        match self {
            FeedError::Connect(_) | FeedError::Socket(_) => true,
            _ => false,
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for FeedError {
    fn from(value: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Socket(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feed_error_is_terminal() {
        struct TestCase {
            input: FeedError,
            expected: bool,
        }

        let tests = vec![
            TestCase {
                // TC0: connection refused ends the session
                input: FeedError::Connect("connection refused".to_string()),
                expected: true,
            },
            TestCase {
                // TC1: socket error ends the session
                input: FeedError::Socket("Io(Kind(UnexpectedEof))".to_string()),
                expected: true,
            },
            TestCase {
                // TC2: malformed payload keeps the socket open
                input: FeedError::from(ValidationError::MissingExchange),
                expected: false,
            },
            TestCase {
                // TC3: a bad url never opened a session
                input: FeedError::InvalidUrl {
                    url: "nope".to_string(),
                    reason: "relative URL without a base".to_string(),
                },
                expected: false,
            },
            TestCase {
                // TC4: exhausted retries is reported, not escalated
                input: FeedError::RetriesExhausted { attempts: 5 },
                expected: false,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = test.input.is_terminal();
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_validation_error_display_names_side() {
        let error = ValidationError::ImplausibleSide {
            side: Side::Sell,
            volume: 2.5,
        };
        assert_eq!(
            error.to_string(),
            "SELL volume 2.5 has no positive average price"
        );
    }
}
