//! Connection manager for the volume feed
//!
//! Owns the transport, validates inbound payloads and drives reconnect/fallback:
//!
//! ```text
//! Disconnected -> Connecting -> Connected -> (Closed | Errored) -> Reconnecting -> Connecting ...
//! ```
//!
//! Synthetic fallback is orthogonal to the state above. It starts on close, error,
//! malformed payload or an unusable url, and stops the moment a real connection opens.
//! All transitions run on a single task; timers are owned values dropped on teardown.

use crate::{
    config::{FeedConfig, MIN_MOCK_INTERVAL},
    error::FeedError,
    snapshot::{Snapshot, SnapshotMessage, is_welcome_frame},
    synthetic::{RandomSnapshotSource, SnapshotSource},
    transport::{BoxConnection, ConnectFuture, Transport, WebSocketTransport, parse_feed_url},
};
use derive_more::Display;
use std::{collections::VecDeque, future, pin::Pin};
use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{Instant, Interval, MissedTickBehavior, Sleep},
};
use tracing::{debug, error, info, warn};

/// Lifecycle of the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Closed,
    Errored,
    Reconnecting { attempt: u32 },
}

impl ConnectionState {
    /// Coarse status shown to the presentation layer.
    pub fn status(&self) -> ConnectionStatus {
        match self {
            ConnectionState::Connecting => ConnectionStatus::Connecting,
            ConnectionState::Connected => ConnectionStatus::Connected,
            _ => ConnectionStatus::Disconnected,
        }
    }
}

/// Connection status updates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display)]
pub enum ConnectionStatus {
    #[default]
    #[display("disconnected")]
    Disconnected,
    #[display("connecting")]
    Connecting,
    #[display("connected")]
    Connected,
}

/// Everything the feed reports to its consumer, in delivery order.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    /// Validated snapshot, real or synthetic.
    Snapshot(Snapshot),
    Status(ConnectionStatus),
    Error(FeedError),
}

/// Connection state machine. Construct through [`FeedClient`], or directly with
/// [`ConnectionManager::new`] when the caller wants to own the loop.
pub struct ConnectionManager<T, S> {
    config: FeedConfig,
    transport: T,
    source: S,
    state: ConnectionState,
    retry_count: u32,
    pending_connect: Option<ConnectFuture>,
    connection: Option<BoxConnection>,
    reconnect_at: Option<Pin<Box<Sleep>>>,
    fallback: Option<Interval>,
    outbox: VecDeque<FeedEvent>,
}

impl<T, S> ConnectionManager<T, S>
where
    T: Transport,
    S: SnapshotSource,
{
    pub fn new(config: FeedConfig, transport: T, source: S) -> Self {
        Self {
            config,
            transport,
            source,
            state: ConnectionState::Disconnected,
            retry_count: 0,
            pending_connect: None,
            connection: None,
            reconnect_at: None,
            fallback: None,
            outbox: VecDeque::new(),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn is_fallback_active(&self) -> bool {
        self.fallback.is_some()
    }

    pub fn has_pending_reconnect(&self) -> bool {
        self.reconnect_at.is_some()
    }

    /// Take the events produced by transitions so far.
    pub fn drain_events(&mut self) -> Vec<FeedEvent> {
        self.outbox.drain(..).collect()
    }

    /// Open the transport. No-op while connecting or connected.
    pub fn connect(&mut self) {
        if matches!(
            self.state,
            ConnectionState::Connecting | ConnectionState::Connected
        ) {
            self.trace(format_args!("connect ignored, state {:?}", self.state));
            return;
        }

        // A manual connect supersedes any scheduled one
        self.reconnect_at = None;

        let url = match parse_feed_url(&self.config.url) {
            Ok(url) => url,
            Err(error) => {
                error!(%error, "Failed to create feed transport");
                self.emit(FeedEvent::Error(error));
                self.fallback_to_synthetic();
                return;
            }
        };

        info!(url = %url, attempt = self.retry_count, "Connecting to volume feed");
        self.state = ConnectionState::Connecting;
        self.pending_connect = Some(self.transport.connect(url));
        self.emit(FeedEvent::Status(ConnectionStatus::Connecting));
    }

    /// Schedule the next connect with exponential backoff. No-op while connecting, while
    /// a reconnect is already pending, or once the retry budget is spent.
    pub fn reconnect(&mut self) {
        if self.state == ConnectionState::Connecting || self.reconnect_at.is_some() {
            return;
        }

        if self.retry_count >= self.config.max_reconnect_attempts {
            warn!(
                attempts = self.retry_count,
                "Max reconnection attempts reached, staying on synthetic data"
            );
            self.emit(FeedEvent::Error(FeedError::RetriesExhausted {
                attempts: self.retry_count,
            }));
            return;
        }

        self.retry_count += 1;
        let delay = self.config.backoff_delay(self.retry_count);
        info!(
            attempt = self.retry_count,
            delay_ms = delay.as_millis() as u64,
            "Scheduling reconnect"
        );
        self.state = ConnectionState::Reconnecting {
            attempt: self.retry_count,
        };
        self.reconnect_at = Some(Box::pin(tokio::time::sleep(delay)));
    }

    /// Stop everything and close the transport. Terminal for this manager.
    pub async fn disconnect(&mut self) {
        self.stop_synthetic();
        self.reconnect_at = None;
        self.pending_connect = None;

        if let Some(mut connection) = self.connection.take() {
            connection.close().await;
        }

        if self.state != ConnectionState::Disconnected {
            info!("Disconnected from volume feed");
            self.state = ConnectionState::Disconnected;
            self.emit(FeedEvent::Status(ConnectionStatus::Disconnected));
        }
    }

    fn on_open(&mut self, connection: BoxConnection) {
        info!(url = %self.config.url, "Connected to volume feed");
        self.state = ConnectionState::Connected;
        self.retry_count = 0;
        self.connection = Some(connection);
        self.emit(FeedEvent::Status(ConnectionStatus::Connected));
        self.stop_synthetic();
    }

    fn on_text(&mut self, text: &str) {
        match serde_json::from_str::<SnapshotMessage>(text) {
            Ok(message) if message.is_welcome() => debug!("Received welcome message"),
            Ok(message) => self.admit(message),
            Err(_) if is_welcome_frame(text) => debug!("Received welcome message"),
            Err(error) => {
                self.trace(format_args!("raw message: {text}"));
                self.reject(FeedError::Validation(error.into()));
            }
        }
    }

    /// Terminal errors end the session, anything else only poisons the payload.
    fn on_error(&mut self, error: FeedError) {
        if error.is_terminal() {
            self.on_transport_error(error);
        } else {
            self.reject(error);
        }
    }

    fn on_transport_closed(&mut self) {
        info!("Volume feed connection closed");
        self.connection = None;
        self.state = ConnectionState::Closed;
        self.emit(FeedEvent::Status(ConnectionStatus::Disconnected));
        self.fallback_to_synthetic();
        self.reconnect();
    }

    fn on_transport_error(&mut self, error: FeedError) {
        error!(%error, "Volume feed transport error");
        self.connection = None;
        self.pending_connect = None;
        self.state = ConnectionState::Errored;
        self.emit(FeedEvent::Error(error));
        self.emit(FeedEvent::Status(ConnectionStatus::Disconnected));
        self.fallback_to_synthetic();
        self.reconnect();
    }

    fn on_synthetic_tick(&mut self) {
        let message = self.source.next_message(chrono::Utc::now().timestamp_millis());
        self.admit(message);
    }

    /// Shared path for real and synthetic payloads.
    fn admit(&mut self, message: SnapshotMessage) {
        match Snapshot::try_from(message) {
            Ok(snapshot) => self.emit(FeedEvent::Snapshot(snapshot)),
            Err(error) => self.reject(FeedError::Validation(error)),
        }
    }

    /// A malformed payload means the feed is unusable for this session.
    fn reject(&mut self, error: FeedError) {
        warn!(%error, "Dropping malformed feed payload");
        self.emit(FeedEvent::Error(error));
        self.fallback_to_synthetic();
    }

    fn fallback_to_synthetic(&mut self) {
        if self.fallback.is_some() {
            return;
        }
        let period = self.config.mock_interval.max(MIN_MOCK_INTERVAL);
        info!(
            period_ms = period.as_millis() as u64,
            "Falling back to synthetic data"
        );
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.fallback = Some(interval);
    }

    fn stop_synthetic(&mut self) {
        if self.fallback.take().is_some() {
            info!("Stopped synthetic data");
        }
    }

    fn emit(&mut self, event: FeedEvent) {
        self.outbox.push_back(event);
    }

    fn trace(&self, args: std::fmt::Arguments<'_>) {
        if self.config.debug {
            debug!("[feed] {}", args);
        }
    }

    /// Deliver queued events. Returns false once the receiver has gone away.
    async fn flush(&mut self, event_tx: &mpsc::Sender<FeedEvent>) -> bool {
        while let Some(event) = self.outbox.pop_front() {
            if event_tx.send(event).await.is_err() {
                return false;
            }
        }
        true
    }

    /// Drive the state machine until shutdown is requested, the shutdown sender is
    /// dropped, or the event receiver goes away.
    pub async fn run(
        mut self,
        event_tx: mpsc::Sender<FeedEvent>,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        info!("Starting volume feed for {}", self.config.url);
        self.connect();

        loop {
            if !self.flush(&event_tx).await {
                warn!("Event receiver dropped, stopping feed");
                self.disconnect().await;
                break;
            }

            tokio::select! {
                biased;

                _ = shutdown_rx.recv() => {
                    self.disconnect().await;
                    let _ = self.flush(&event_tx).await;
                    break;
                }
                result = wait_connect(&mut self.pending_connect) => {
                    self.pending_connect = None;
                    match result {
                        Ok(connection) => self.on_open(connection),
                        Err(error) => self.on_transport_error(error),
                    }
                }
                frame = next_frame(&mut self.connection) => match frame {
                    Some(Ok(text)) => self.on_text(&text),
                    Some(Err(error)) => self.on_error(error),
                    None => self.on_transport_closed(),
                },
                _ = wait_deadline(&mut self.reconnect_at) => {
                    self.reconnect_at = None;
                    self.connect();
                }
                _ = wait_tick(&mut self.fallback) => self.on_synthetic_tick(),
            }
        }

        debug!("Volume feed task finished");
    }
}

async fn wait_connect(pending: &mut Option<ConnectFuture>) -> Result<BoxConnection, FeedError> {
    match pending {
        Some(connect) => connect.await,
        None => future::pending().await,
    }
}

async fn next_frame(connection: &mut Option<BoxConnection>) -> Option<Result<String, FeedError>> {
    match connection {
        Some(connection) => connection.next_frame().await,
        None => future::pending().await,
    }
}

async fn wait_deadline(deadline: &mut Option<Pin<Box<Sleep>>>) {
    match deadline {
        Some(sleep) => sleep.as_mut().await,
        None => future::pending().await,
    }
}

async fn wait_tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => future::pending().await,
    }
}

/// Feed client: spawns a [`ConnectionManager`] and hands back its event stream.
pub struct FeedClient<T = WebSocketTransport, S = RandomSnapshotSource> {
    config: FeedConfig,
    transport: T,
    source: S,
}

impl FeedClient {
    /// Create a new feed client with default configuration
    pub fn new() -> Self {
        Self::with_config(FeedConfig::default())
    }

    /// Create a new feed client with custom configuration
    pub fn with_config(config: FeedConfig) -> Self {
        Self {
            config,
            transport: WebSocketTransport,
            source: RandomSnapshotSource::new(),
        }
    }
}

impl Default for FeedClient {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, S> FeedClient<T, S>
where
    T: Transport,
    S: SnapshotSource,
{
    /// Replace the transport
    pub fn with_transport<U: Transport>(self, transport: U) -> FeedClient<U, S> {
        FeedClient {
            config: self.config,
            transport,
            source: self.source,
        }
    }

    /// Replace the synthetic snapshot source
    pub fn with_source<U: SnapshotSource>(self, source: U) -> FeedClient<T, U> {
        FeedClient {
            config: self.config,
            transport: self.transport,
            source,
        }
    }

    /// Start the feed task
    ///
    /// Returns a receiver for feed events and a handle to tear the feed down
    pub fn start(self) -> (mpsc::Receiver<FeedEvent>, FeedHandle) {
        let (event_tx, event_rx) = mpsc::channel(self.config.channel_buffer_size.max(1));
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let manager = ConnectionManager::new(self.config, self.transport, self.source);
        let task = tokio::spawn(manager.run(event_tx, shutdown_rx));

        (event_rx, FeedHandle { shutdown_tx, task })
    }
}

/// Owner handle of a running feed task.
pub struct FeedHandle {
    shutdown_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl FeedHandle {
    /// Stop synthetic data, cancel any scheduled reconnect and close the transport.
    /// Returns once the feed task has exited, so no timer outlives this call.
    pub async fn disconnect(self) {
        let _ = self.shutdown_tx.send(()).await;
        if let Err(error) = self.task.await {
            error!(%error, "Volume feed task failed");
        }
    }
}
