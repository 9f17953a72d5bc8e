//! Error types for the SDK.

use thiserror::Error;

/// Failures encoding or decoding wire messages.
#[derive(Debug, Error)]
pub enum ProtoError {
    #[error("message is not a JSON object")]
    NotAnObject,

    #[error("unknown message type {0}")]
    UnknownType(u8),

    #[error("unknown status code {0}")]
    UnknownStatus(u8),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Failures of the WebSocket transport.
///
/// Connection loss is never returned from the receive loop; it is converted
/// into disconnect events. The variants below surface through `send`, or —
/// for [`TransportError::Desync`] — terminate the receive loop for good.
#[derive(Debug, Error)]
pub enum TransportError {
    /// No connection is currently open.
    #[error("not connected to server")]
    NotConnected,

    /// The server closed the connection.
    #[error("connection closed by server")]
    Closed,

    /// An outgoing message could not be serialized.
    #[error("encode outgoing message: {0}")]
    Encode(#[source] serde_json::Error),

    /// A frame on an established connection violated the message contract.
    /// Unrecoverable without a restart.
    #[error("protocol desync: {0}")]
    Desync(#[source] ProtoError),

    /// The receive loop was started twice.
    #[error("receive loop is already running")]
    AlreadyListening,

    #[error(transparent)]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}

/// Failures of session-level operations.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("encode request: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("login hand-off dropped before a token was delivered")]
    HandoffDropped,
}
