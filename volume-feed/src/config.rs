use std::time::Duration;

/// Default public volume feed endpoint.
pub const DEFAULT_FEED_URL: &str = "wss://trumpws.coinybubble.com/ws/trump";

/// Shortest synthetic snapshot period accepted.
pub const MIN_MOCK_INTERVAL: Duration = Duration::from_millis(1);

/// Feed connection configuration
#[derive(Debug, Clone, PartialEq)]
pub struct FeedConfig {
    /// WebSocket server URL
    pub url: String,
    /// Log raw payloads and every lifecycle step
    pub debug: bool,
    /// Reconnect attempts before staying on synthetic data for good
    pub max_reconnect_attempts: u32,
    /// First reconnect delay, doubled on every further attempt
    pub base_backoff: Duration,
    /// Period of the synthetic snapshot generator while in fallback
    pub mock_interval: Duration,
    /// Maximum channel buffer size for events
    pub channel_buffer_size: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_FEED_URL.to_string(),
            debug: false,
            max_reconnect_attempts: 5,
            base_backoff: Duration::from_millis(1_000),
            mock_interval: Duration::from_secs(1),
            channel_buffer_size: 1_000,
        }
    }
}

impl FeedConfig {
    /// Create a new configuration with custom URL
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Build from environment variables, falling back to defaults:
    /// `FEED_URL`, `FEED_DEBUG`, `FEED_MAX_RECONNECTS`, `FEED_BACKOFF_MS`, `FEED_BUFFER_SIZE`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            url: std::env::var("FEED_URL").unwrap_or(defaults.url),
            debug: std::env::var("FEED_DEBUG")
                .map(|v| matches!(v.trim(), "1" | "true" | "yes"))
                .unwrap_or(defaults.debug),
            max_reconnect_attempts: env_parse("FEED_MAX_RECONNECTS")
                .unwrap_or(defaults.max_reconnect_attempts),
            base_backoff: env_parse("FEED_BACKOFF_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.base_backoff),
            mock_interval: defaults.mock_interval,
            channel_buffer_size: env_parse("FEED_BUFFER_SIZE")
                .unwrap_or(defaults.channel_buffer_size),
        }
    }

    /// Enable verbose payload logging
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Set maximum reconnect attempts
    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    /// Set base backoff delay
    pub fn with_base_backoff(mut self, delay: Duration) -> Self {
        self.base_backoff = delay;
        self
    }

    /// Set synthetic snapshot period, at least [`MIN_MOCK_INTERVAL`]
    pub fn with_mock_interval(mut self, interval: Duration) -> Self {
        self.mock_interval = interval.max(MIN_MOCK_INTERVAL);
        self
    }

    /// Set channel buffer size
    pub fn with_channel_buffer_size(mut self, size: usize) -> Self {
        self.channel_buffer_size = size;
        self
    }

    /// Delay before reconnect `attempt` (1-based): `base * 2^(attempt - 1)`.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base_backoff.saturating_mul(1u32 << exponent)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}
