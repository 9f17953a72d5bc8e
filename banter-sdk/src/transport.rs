//! WebSocket transport: one persistent connection to one server endpoint,
//! connect-with-retry, frame send, and the process-lifetime receive loop.
//!
//! Connection loss is not fatal here — it is fanned out to the disconnect
//! listeners, and the loop parks until one of them re-establishes the
//! connection. A malformed frame on an established connection is fatal:
//! the message stream contract is violated and recovery is not attempted.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::net::TcpStream;
use tokio::sync::{Mutex, mpsc};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::error::ProtocolError;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{error, info};

use crate::bus::EventBus;
use crate::clock::Clock;
use crate::error::TransportError;
use crate::message::Envelope;

/// Fixed delay between connection attempts and before a reconnect.
pub const RETRY_DELAY: Duration = Duration::from_secs(5);

/// Path the chat endpoint lives under on the server.
const ENDPOINT_PATH: &str = "/chat";

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

/// Outbound seam the session layer talks through. [`Transport`] is the
/// production implementation; tests substitute a recording fake.
#[async_trait]
pub trait ServerLink: Send + Sync {
    /// Serialize one message as a text frame and write it.
    async fn send_json(&self, message: serde_json::Value) -> Result<(), TransportError>;

    /// (Re-)establish the connection, retrying until it succeeds.
    async fn connect(&self);
}

/// The single logical connection to the chat server.
pub struct Transport {
    url: String,
    bus: Arc<EventBus>,
    clock: Arc<dyn Clock>,
    sink: Mutex<Option<WsSink>>,
    source_tx: mpsc::UnboundedSender<WsSource>,
    source_rx: Mutex<Option<mpsc::UnboundedReceiver<WsSource>>>,
}

impl Transport {
    /// `addr` is `host:port`; `tls` selects `wss` over `ws`.
    pub fn new(bus: Arc<EventBus>, clock: Arc<dyn Clock>, tls: bool, addr: &str) -> Self {
        let scheme = if tls { "wss" } else { "ws" };
        let url = format!("{scheme}://{addr}{ENDPOINT_PATH}");
        let (source_tx, source_rx) = mpsc::unbounded_channel();
        Self {
            url,
            bus,
            clock,
            sink: Mutex::new(None),
            source_tx,
            source_rx: Mutex::new(Some(source_rx)),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// Dial the server until a connection is established.
    ///
    /// Each failure is logged and followed by a fixed [`RETRY_DELAY`]; there
    /// is no retry limit and no cancellation path. On success the write half
    /// replaces the stored sink and the read half is handed to the receive
    /// loop.
    pub async fn connect(&self) {
        loop {
            match connect_async(self.url.as_str()).await {
                Ok((stream, _)) => {
                    let (sink, source) = stream.split();
                    *self.sink.lock().await = Some(sink);
                    let _ = self.source_tx.send(source);
                    info!(url = %self.url, "connected to server");
                    return;
                }
                Err(e) => {
                    error!(error = %e, "connect to server failed, retrying in 5 seconds");
                    self.clock.sleep(RETRY_DELAY).await;
                }
            }
        }
    }

    /// Serialize `message` and write it as one text frame.
    ///
    /// Fails when no connection is open or the write fails; errors are
    /// surfaced to the caller, never retried here.
    pub async fn send<T: Serialize>(&self, message: &T) -> Result<(), TransportError> {
        let json = serde_json::to_string(message).map_err(TransportError::Encode)?;
        let mut guard = self.sink.lock().await;
        let sink = guard.as_mut().ok_or(TransportError::NotConnected)?;
        sink.send(Message::Text(json.into())).await?;
        Ok(())
    }

    /// Send a close frame and drop the connection. Best-effort: failures are
    /// logged, never returned.
    pub async fn close(&self) {
        let mut guard = self.sink.lock().await;
        if let Some(sink) = guard.as_mut() {
            if let Err(e) = sink.send(Message::Close(None)).await {
                error!(error = %e, "write close frame");
            }
            if let Err(e) = sink.close().await {
                error!(error = %e, "close connection");
            }
        }
        *guard = None;
    }

    /// Read frames for the life of the process.
    ///
    /// Each text frame is decoded into an [`Envelope`] and fanned out to the
    /// response listeners, synchronously and in registration order. On
    /// connection loss the disconnect listeners run, then the loop parks
    /// until a listener-triggered [`Transport::connect`] delivers a fresh
    /// read half. Any other error terminates the loop and is fatal to the
    /// process.
    pub async fn receive_loop(&self) -> Result<(), TransportError> {
        let mut source_rx = self
            .source_rx
            .lock()
            .await
            .take()
            .ok_or(TransportError::AlreadyListening)?;

        let Some(mut source) = source_rx.recv().await else {
            return Ok(());
        };

        loop {
            match source.next().await {
                Some(Ok(Message::Text(text))) => match Envelope::from_json(text.as_str()) {
                    Ok(envelope) => self.bus.dispatch_response(&envelope).await,
                    Err(e) => return Err(TransportError::Desync(e)),
                },
                Some(Ok(Message::Close(_))) => {
                    source = match self.next_source(TransportError::Closed, &mut source_rx).await {
                        Some(s) => s,
                        None => return Ok(()),
                    };
                }
                // Binary, ping and pong frames carry no chat messages.
                Some(Ok(_)) => {}
                Some(Err(e)) if is_disconnect(&e) => {
                    source = match self.next_source(e.into(), &mut source_rx).await {
                        Some(s) => s,
                        None => return Ok(()),
                    };
                }
                Some(Err(e)) => return Err(e.into()),
                None => {
                    source = match self.next_source(TransportError::Closed, &mut source_rx).await {
                        Some(s) => s,
                        None => return Ok(()),
                    };
                }
            }
        }
    }

    /// Fan the disconnect out, then park until a reconnect replaces the
    /// read half.
    async fn next_source(
        &self,
        error: TransportError,
        source_rx: &mut mpsc::UnboundedReceiver<WsSource>,
    ) -> Option<WsSource> {
        self.bus.dispatch_disconnect(Arc::new(error)).await;
        source_rx.recv().await
    }
}

#[async_trait]
impl ServerLink for Transport {
    async fn send_json(&self, message: serde_json::Value) -> Result<(), TransportError> {
        self.send(&message).await
    }

    async fn connect(&self) {
        Transport::connect(self).await;
    }
}

/// Connection-loss classification: these errors feed the disconnect
/// listeners; anything else read from an established connection is treated
/// as protocol desync and is fatal.
fn is_disconnect(error: &tokio_tungstenite::tungstenite::Error) -> bool {
    use tokio_tungstenite::tungstenite::Error;
    matches!(
        error,
        Error::ConnectionClosed
            | Error::AlreadyClosed
            | Error::Io(_)
            | Error::Protocol(ProtocolError::ResetWithoutClosingHandshake)
    )
}
