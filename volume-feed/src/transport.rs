//! Transport seam between the connection manager and the network.
//!
//! [`WebSocketTransport`] is the production implementation. [`ChannelTransport`] is an
//! in-memory, scriptable transport used to replay captured frames and to drive the
//! connection manager deterministically.

use crate::error::FeedError;
use async_trait::async_trait;
use futures::{StreamExt, future::BoxFuture};
use parking_lot::Mutex;
use std::{collections::VecDeque, sync::Arc, time::Duration};
use tokio::{net::TcpStream, sync::mpsc, time::Instant};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tracing::{debug, info};
use url::Url;

/// An open feed session yielding text frames.
#[async_trait]
pub trait Connection: Send {
    /// Next text frame. `Some(Err(_))` is a transport failure, `None` means the peer closed.
    async fn next_frame(&mut self) -> Option<Result<String, FeedError>>;

    /// Close the session, performing a close handshake where the transport has one.
    async fn close(&mut self);
}

pub type BoxConnection = Box<dyn Connection>;

/// Pending connection attempt, owned by the connection manager across loop iterations.
pub type ConnectFuture = BoxFuture<'static, Result<BoxConnection, FeedError>>;

/// Opens feed sessions.
pub trait Transport: Send + 'static {
    fn connect(&self, url: Url) -> ConnectFuture;
}

/// Parse and check a feed url. Failure here means the transport cannot be created at all.
pub fn parse_feed_url(raw: &str) -> Result<Url, FeedError> {
    let url = Url::parse(raw).map_err(|error| FeedError::InvalidUrl {
        url: raw.to_string(),
        reason: error.to_string(),
    })?;

    match url.scheme() {
        "ws" | "wss" => Ok(url),
        scheme => Err(FeedError::InvalidUrl {
            url: raw.to_string(),
            reason: format!("unsupported scheme {scheme}"),
        }),
    }
}

/// tokio-tungstenite backed transport.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketTransport;

impl Transport for WebSocketTransport {
    fn connect(&self, url: Url) -> ConnectFuture {
        Box::pin(async move {
            let (stream, _) = connect_async(url.as_str())
                .await
                .map_err(|error| FeedError::Connect(error.to_string()))?;
            Ok(Box::new(WebSocketConnection { stream }) as BoxConnection)
        })
    }
}

struct WebSocketConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl Connection for WebSocketConnection {
    async fn next_frame(&mut self) -> Option<Result<String, FeedError>> {
        while let Some(message) = self.stream.next().await {
            match message {
                Ok(Message::Text(text)) => return Some(Ok(text.as_str().to_owned())),
                Ok(Message::Binary(bytes)) => match String::from_utf8(bytes.to_vec()) {
                    Ok(text) => return Some(Ok(text)),
                    Err(_) => debug!("Skipping non UTF-8 binary frame"),
                },
                Ok(Message::Close(frame)) => {
                    info!(?frame, "Server closed connection");
                    return None;
                }
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) | Ok(Message::Frame(_)) => {
                    // Heartbeat messages - tungstenite handles these automatically
                }
                Err(error) => return Some(Err(FeedError::from(error))),
            }
        }
        None
    }

    async fn close(&mut self) {
        if let Err(error) = self.stream.close(None).await {
            debug!(%error, "Close handshake did not complete");
        }
    }
}

/// Outcome scripted for the next [`ChannelTransport::connect`] call.
enum ScriptedConnect {
    Refuse(FeedError),
    Accept {
        latency: Duration,
        frames: mpsc::UnboundedReceiver<Result<String, FeedError>>,
    },
}

#[derive(Default)]
struct ChannelTransportState {
    script: VecDeque<ScriptedConnect>,
    attempts: Vec<Instant>,
}

/// In-memory transport. Each `connect` consumes the next scripted outcome; with an
/// empty script the attempt is refused.
#[derive(Clone, Default)]
pub struct ChannelTransport {
    state: Arc<Mutex<ChannelTransportState>>,
}

impl ChannelTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse the next connection attempt with `error`.
    pub fn refuse_next(&self, error: FeedError) {
        self.state
            .lock()
            .script
            .push_back(ScriptedConnect::Refuse(error));
    }

    /// Accept the next connection attempt immediately.
    pub fn accept_next(&self) -> FrameSender {
        self.accept_next_after(Duration::ZERO)
    }

    /// Accept the next connection attempt once `latency` has elapsed.
    pub fn accept_next_after(&self, latency: Duration) -> FrameSender {
        let (tx, frames) = mpsc::unbounded_channel();
        self.state
            .lock()
            .script
            .push_back(ScriptedConnect::Accept { latency, frames });
        FrameSender { tx }
    }

    /// Instants at which `connect` was called, oldest first.
    pub fn attempts(&self) -> Vec<Instant> {
        self.state.lock().attempts.clone()
    }
}

impl Transport for ChannelTransport {
    fn connect(&self, _url: Url) -> ConnectFuture {
        let next = {
            let mut state = self.state.lock();
            state.attempts.push(Instant::now());
            state.script.pop_front()
        };

        Box::pin(async move {
            match next {
                Some(ScriptedConnect::Accept { latency, frames }) => {
                    if !latency.is_zero() {
                        tokio::time::sleep(latency).await;
                    }
                    Ok(Box::new(ChannelConnection { frames }) as BoxConnection)
                }
                Some(ScriptedConnect::Refuse(error)) => Err(error),
                None => Err(FeedError::Connect("no scripted connection".to_string())),
            }
        })
    }
}

/// Feeds frames into a [`ChannelTransport`] session. Dropping it closes the session.
#[derive(Debug, Clone)]
pub struct FrameSender {
    tx: mpsc::UnboundedSender<Result<String, FeedError>>,
}

impl FrameSender {
    /// Deliver a text frame. Returns false once the session has been closed.
    pub fn send_text(&self, text: impl Into<String>) -> bool {
        self.tx.send(Ok(text.into())).is_ok()
    }

    /// Fail the session with a transport error.
    pub fn fail(&self, error: FeedError) -> bool {
        self.tx.send(Err(error)).is_ok()
    }

    /// True once the manager has dropped the session.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

struct ChannelConnection {
    frames: mpsc::UnboundedReceiver<Result<String, FeedError>>,
}

#[async_trait]
impl Connection for ChannelConnection {
    async fn next_frame(&mut self) -> Option<Result<String, FeedError>> {
        self.frames.recv().await
    }

    async fn close(&mut self) {
        self.frames.close();
    }
}
