/// Volume Feed
///
/// Resilient client for a WebSocket feed of per-venue trade-volume snapshots.
///
/// The crate provides:
/// - Wire format and validation of snapshot payloads
/// - A transport seam with a tokio-tungstenite implementation and an in-memory one
/// - A connection manager with exponential backoff reconnects
/// - Synthetic snapshot fallback while the real feed is unavailable
pub mod config;
pub mod connection;
pub mod error;
pub mod snapshot;
pub mod synthetic;
pub mod transport;

// Re-export commonly used types for convenience
pub use config::{DEFAULT_FEED_URL, FeedConfig};
pub use connection::{
    ConnectionManager, ConnectionState, ConnectionStatus, FeedClient, FeedEvent, FeedHandle,
};
pub use error::{FeedError, ValidationError};
pub use snapshot::{Side, Snapshot, SnapshotMessage, parse_snapshot};
pub use synthetic::{RandomSnapshotSource, SnapshotSource};
pub use transport::{ChannelTransport, FrameSender, Transport, WebSocketTransport};
