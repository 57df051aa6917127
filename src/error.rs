use thiserror::Error;

/// Errors returned by `Client` and `Session` operations.
#[derive(Error, Debug)]
pub enum StompError {
    /// A JSON body could not be serialized; nothing was sent.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// The background client task has stopped.
    #[error("client closed: background task is no longer running")]
    Closed,
    /// A timer was requested with a zero period.
    #[error("invalid interval: {0} must be non-zero")]
    InvalidInterval(&'static str),
}

/// Errors raised by the WebSocket transport while opening a connection.
///
/// These never reach the caller directly; they are reported through
/// `TransportEvent::Error` and from there to the session observer.
#[cfg(feature = "websocket")]
#[derive(Error, Debug)]
pub enum TransportError {
    /// The URL, a handshake header or a cookie could not be turned into an
    /// HTTP request.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// The WebSocket handshake or a later socket operation failed.
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    /// The handshake did not complete within the configured timeout.
    #[error("handshake timed out")]
    Timeout,
}
